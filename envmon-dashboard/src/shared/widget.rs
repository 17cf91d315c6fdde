//! Ratatui rendering of the dashboard view model

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

use super::projector::{ChartSeries, ViewModel};
use super::websocket::ConnectionStatus;

const C_TEMP: Color = Color::Rgb(230, 120, 80);
const C_HUMIDITY: Color = Color::Rgb(100, 180, 220);
const C_OK: Color = Color::Rgb(100, 220, 100);
const C_WARN: Color = Color::Rgb(180, 180, 100);
const C_ERR: Color = Color::Rgb(220, 100, 100);
const C_DIM: Color = Color::Rgb(120, 120, 120);
const C_BRIGHT: Color = Color::Rgb(220, 220, 220);

/// Draw the whole dashboard into the frame
pub fn render_dashboard(f: &mut Frame, vm: &ViewModel, status: ConnectionStatus) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(f.area());

    render_header(f, rows[0], status);

    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[1]);
    render_card(
        f,
        cards[0],
        " TEMPERATURE ",
        format!("{} °C", vm.temperature),
        vm.observed_at.clone(),
        C_TEMP,
    );
    render_card(
        f,
        cards[1],
        " HUMIDITY ",
        format!("{} %", vm.humidity),
        format!("Sensor: {}", vm.sensor),
        C_HUMIDITY,
    );

    render_chart(f, rows[2], &vm.chart);
    render_info(f, rows[3], vm);

    let footer = Paragraph::new(Line::from(vec![
        Span::styled(" q", Style::default().fg(C_BRIGHT)),
        Span::styled(" quit  ", Style::default().fg(C_DIM)),
        Span::styled("r", Style::default().fg(C_BRIGHT)),
        Span::styled(" reload history", Style::default().fg(C_DIM)),
    ]));
    f.render_widget(footer, rows[4]);
}

fn render_header(f: &mut Frame, area: Rect, status: ConnectionStatus) {
    let (badge, color) = match status {
        ConnectionStatus::Connected => ("● LIVE", C_OK),
        ConnectionStatus::Reconnecting => ("↻ CONNECTING", C_WARN),
        ConnectionStatus::Disconnected => ("○ OFFLINE", C_ERR),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_DIM));
    let line = Line::from(vec![
        Span::styled(
            "ENVIRONMENT MONITOR  ",
            Style::default().fg(C_BRIGHT).add_modifier(Modifier::BOLD),
        ),
        Span::styled(badge, Style::default().fg(color).add_modifier(Modifier::BOLD)),
    ]);
    f.render_widget(Paragraph::new(line).block(block), area);
}

fn render_card(
    f: &mut Frame,
    area: Rect,
    title: &str,
    value: String,
    detail: String,
    color: Color,
) {
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color));
    let lines = vec![
        Line::from(Span::styled(
            value,
            Style::default().fg(C_BRIGHT).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(detail, Style::default().fg(C_DIM))),
    ];
    f.render_widget(
        Paragraph::new(lines).block(block).alignment(Alignment::Center),
        area,
    );
}

fn render_chart(f: &mut Frame, area: Rect, series: &ChartSeries) {
    let block = Block::default()
        .title(Line::from(vec![
            Span::raw(" "),
            Span::styled("Temperature °C", Style::default().fg(C_TEMP)),
            Span::raw(" / "),
            Span::styled("Humidity %", Style::default().fg(C_HUMIDITY)),
            Span::raw(" "),
        ]))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_DIM));

    let (Some(temp_bounds), Some(hum_bounds)) =
        (series.temperature_bounds(), series.humidity_bounds())
    else {
        let placeholder = Paragraph::new(Line::from(Span::styled(
            "Waiting for data...",
            Style::default().fg(C_DIM),
        )))
        .alignment(Alignment::Center)
        .block(block);
        f.render_widget(placeholder, area);
        return;
    };

    // Single Y axis: humidity is drawn rescaled into the temperature range
    let temperature: Vec<(f64, f64)> = series
        .temperature
        .iter()
        .enumerate()
        .map(|(i, &t)| (i as f64, t))
        .collect();
    let humidity: Vec<(f64, f64)> = series
        .humidity
        .iter()
        .enumerate()
        .map(|(i, &h)| (i as f64, rescale(h, hum_bounds, temp_bounds)))
        .collect();

    let datasets = vec![
        Dataset::default()
            .name("°C")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(C_TEMP))
            .data(&temperature),
        Dataset::default()
            .name("%")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(C_HUMIDITY))
            .data(&humidity),
    ];

    let x_max = (series.len().saturating_sub(1) as f64).max(1.0);
    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(C_DIM))
                .bounds([0.0, x_max])
                .labels(x_labels(&series.labels)),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(C_DIM))
                .bounds(temp_bounds)
                .labels(y_labels(temp_bounds, hum_bounds)),
        );

    f.render_widget(chart, area);
}

fn render_info(f: &mut Frame, area: Rect, vm: &ViewModel) {
    let field = |name: &'static str, value: &str| {
        vec![
            Span::styled(format!("{}: ", name), Style::default().fg(C_DIM)),
            Span::styled(value.to_string(), Style::default().fg(C_BRIGHT)),
            Span::raw("   "),
        ]
    };

    let mut spans = Vec::new();
    spans.extend(field("Device", &vm.device));
    spans.extend(field("Sensor", &vm.sensor));
    spans.extend(field("Location", &vm.location));
    spans.extend(field("Source", &vm.source));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_DIM));
    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

/// Linear map of `value` from the `from` range onto the `to` range.
/// A degenerate `from` range maps to the middle of `to`.
pub fn rescale(value: f64, from: [f64; 2], to: [f64; 2]) -> f64 {
    let span = from[1] - from[0];
    if span.abs() < f64::EPSILON {
        return (to[0] + to[1]) / 2.0;
    }
    to[0] + (value - from[0]) / span * (to[1] - to[0])
}

/// First, middle and last time labels
fn x_labels(labels: &[String]) -> Vec<String> {
    match labels.len() {
        0 => Vec::new(),
        1 | 2 => labels.to_vec(),
        n => vec![
            labels[0].clone(),
            labels[n / 2].clone(),
            labels[n - 1].clone(),
        ],
    }
}

/// Bottom, middle and top labels carrying both units
fn y_labels(temp: [f64; 2], humidity: [f64; 2]) -> Vec<String> {
    [0.0, 0.5, 1.0]
        .iter()
        .map(|t| {
            let c = temp[0] + (temp[1] - temp[0]) * t;
            let h = humidity[0] + (humidity[1] - humidity[0]) * t;
            format!("{:.1}°C · {:.0}%", c, h)
        })
        .collect()
}
