/// Core data types for environmental readings
///
/// These types match the JSON format served by the backend REST API and
/// published on the `/topic/environment` STOMP topic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single environmental reading from one sensor
///
/// Immutable once received: newer data arrives as new samples, never as
/// mutations of existing ones.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Sample {
    /// Opaque identifier assigned by the backend
    pub id: String,
    /// Time the reading was taken
    pub timestamp: DateTime<Utc>,
    /// Temperature in degrees Celsius
    #[serde(rename = "temperatureCelsius")]
    pub temperature: f64,
    /// Relative humidity in percent (not range checked)
    #[serde(rename = "humidityPercent")]
    pub humidity: f64,
    /// Sensor model (e.g., "DHT22")
    #[serde(default)]
    pub sensor: Option<String>,
    /// Device the sensor is attached to
    #[serde(default)]
    pub device: Option<String>,
    /// Physical location label
    #[serde(default)]
    pub location: Option<String>,
    /// Upstream data source label
    #[serde(rename = "dataSource", default)]
    pub source: Option<String>,
}

/// Errors produced while decoding a [`Sample`] payload
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("invalid sample payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("non-finite {field} value: {value}")]
    NonFinite { field: &'static str, value: f64 },
}

impl Sample {
    /// Decode a sample from a JSON payload, rejecting it as a whole if any
    /// required field is missing, null or not a finite number.
    pub fn from_json(payload: &str) -> Result<Self, SampleError> {
        let sample: Sample = serde_json::from_str(payload)?;
        sample.validate()?;
        Ok(sample)
    }

    /// Same as [`Sample::from_json`] for an already parsed JSON value
    pub fn from_value(value: serde_json::Value) -> Result<Self, SampleError> {
        let sample: Sample = serde_json::from_value(value)?;
        sample.validate()?;
        Ok(sample)
    }

    fn validate(&self) -> Result<(), SampleError> {
        if !self.temperature.is_finite() {
            return Err(SampleError::NonFinite {
                field: "temperature",
                value: self.temperature,
            });
        }
        if !self.humidity.is_finite() {
            return Err(SampleError::NonFinite {
                field: "humidity",
                value: self.humidity,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    /// Sample at `secs` seconds past 2024-01-01T00:00:00Z
    pub fn sample(id: &str, secs: i64) -> Sample {
        Sample {
            id: id.to_string(),
            timestamp: Utc.timestamp_opt(1_704_067_200 + secs, 0).unwrap(),
            temperature: 20.0 + secs as f64 / 10.0,
            humidity: 40.0 + secs as f64,
            sensor: Some("DHT22".to_string()),
            device: Some("esp32-salon".to_string()),
            location: Some("Salon".to_string()),
            source: Some("mqtt".to_string()),
        }
    }
}
