//! Pure projection from session state into render-ready values
//!
//! Nothing here performs I/O or reads the clock: given the same history,
//! current reading and timezone, [`project`] always yields the same
//! [`ViewModel`]. The timezone is an explicit input for that reason.

use std::collections::VecDeque;
use std::fmt::Display;

use chrono::{Local, TimeZone};

use super::types::Sample;

/// Placeholder shown for any value that is not known yet
pub const PLACEHOLDER: &str = "--";

/// Chart axis label format (hour:minute, 24h)
const AXIS_TIME_FORMAT: &str = "%H:%M";
/// Full timestamp shown under the temperature card
const CARD_TIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Parallel series for the dual-axis chart, in history order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub temperature: Vec<f64>,
    pub humidity: Vec<f64>,
}

impl ChartSeries {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Y bounds for the temperature axis, padded by 1°C
    pub fn temperature_bounds(&self) -> Option<[f64; 2]> {
        padded_bounds(&self.temperature, 1.0)
    }

    /// Y bounds for the humidity axis, padded by 5% and kept inside 0..=100
    /// when the data allows it
    pub fn humidity_bounds(&self) -> Option<[f64; 2]> {
        padded_bounds(&self.humidity, 5.0).map(|[lo, hi]| {
            let lo = if lo < 0.0 && self.humidity.iter().all(|h| *h >= 0.0) { 0.0 } else { lo };
            let hi = if hi > 100.0 && self.humidity.iter().all(|h| *h <= 100.0) { 100.0 } else { hi };
            [lo, hi]
        })
    }
}

/// Everything the presentation layer needs, already formatted
#[derive(Debug, Clone, PartialEq)]
pub struct ViewModel {
    pub chart: ChartSeries,
    /// Current temperature, one decimal
    pub temperature: String,
    /// Current humidity, as received
    pub humidity: String,
    /// Local date and time of the current reading
    pub observed_at: String,
    pub sensor: String,
    pub device: String,
    pub location: String,
    pub source: String,
}

impl ViewModel {
    /// True when at least one sample has been observed
    pub fn has_reading(&self) -> bool {
        self.temperature != PLACEHOLDER
    }
}

/// Project history + current reading into a [`ViewModel`] using `tz` for
/// every displayed time.
pub fn project<Tz>(history: &VecDeque<Sample>, current: Option<&Sample>, tz: &Tz) -> ViewModel
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut chart = ChartSeries {
        labels: Vec::with_capacity(history.len()),
        temperature: Vec::with_capacity(history.len()),
        humidity: Vec::with_capacity(history.len()),
    };
    for sample in history {
        chart.labels.push(
            sample
                .timestamp
                .with_timezone(tz)
                .format(AXIS_TIME_FORMAT)
                .to_string(),
        );
        chart.temperature.push(sample.temperature);
        chart.humidity.push(sample.humidity);
    }

    let label = |f: fn(&Sample) -> Option<&String>| -> String {
        current
            .and_then(f)
            .cloned()
            .unwrap_or_else(|| PLACEHOLDER.to_string())
    };

    ViewModel {
        chart,
        temperature: current
            .map(|s| format!("{:.1}", s.temperature))
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
        humidity: current
            .map(|s| s.humidity.to_string())
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
        observed_at: current
            .map(|s| s.timestamp.with_timezone(tz).format(CARD_TIME_FORMAT).to_string())
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
        sensor: label(|s| s.sensor.as_ref()),
        device: label(|s| s.device.as_ref()),
        location: label(|s| s.location.as_ref()),
        source: label(|s| s.source.as_ref()),
    }
}

/// [`project`] in the host's local timezone
pub fn project_local(history: &VecDeque<Sample>, current: Option<&Sample>) -> ViewModel {
    project(history, current, &Local)
}

fn padded_bounds(values: &[f64], pad: f64) -> Option<[f64; 2]> {
    let (min, max) = values.iter().fold(None, |acc: Option<(f64, f64)>, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })?;
    Some([min - pad, max + pad])
}
