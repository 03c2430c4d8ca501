use serde::{Deserialize, Serialize};

use crate::wia::{WaveType, WiaData};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub dash: Option<[f32; 2]>,
    pub color: Color,
}

/// `0xRRGGBB`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

/// Shaded vertical band between two X positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanSeries {
    pub name: String,
    pub x_range: [f64; 2],
    pub color: Color,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    Span(SpanSeries),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis { label: None },
            y: Axis { label: None },
            series: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// `(x_min, x_max, y_min, y_max)` over every series, or `None` for an empty figure.
    /// Spans widen the X range only.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for series in &self.series {
            match series {
                Series::Line(line) => {
                    xs.extend(line.points.iter().map(|p| p[0]));
                    ys.extend(line.points.iter().map(|p| p[1]));
                }
                Series::Span(span) => xs.extend(span.x_range),
            }
        }
        let (x_min, x_max) = extent(&xs)?;
        let (y_min, y_max) = extent(&ys)?;
        Some((x_min, x_max, y_min, y_max))
    }
}

fn extent(values: &[f64]) -> Option<(f64, f64)> {
    let mut finite = values.iter().copied().filter(|v| v.is_finite());
    let first = finite.next()?;
    Some(finite.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
}

pub trait PlotBackend {
    fn draw(&mut self, fig: &Figure) -> anyhow::Result<()>;
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    let mut result = Vec::with_capacity(max_points);
    for i in 0..max_points {
        let start = (i as f64 * bucket_size).floor() as usize;
        if start >= points.len() {
            break;
        }
        result.push(points[start]);
    }
    result
}

pub const FORWARD_COLOR: Color = Color(0x1F77B4);
pub const BACKWARD_COLOR: Color = Color(0xD62728);

/// Fill colour of a wave span in figures.
pub fn wave_color(wave_type: WaveType) -> Color {
    match wave_type {
        WaveType::EarlyForwardCompression => Color(0x2CA02C),
        WaveType::LateForwardCompression => Color(0x98DF8A),
        WaveType::LateForwardExpansion => Color(0x17BECF),
        WaveType::EarlyBackwardCompression => Color(0xFF7F0E),
        WaveType::LateBackwardCompression => Color(0xFFBB78),
        WaveType::LateBackwardExpansion => Color(0x9467BD),
        WaveType::Other => Color(0x7F7F7F),
    }
}

pub fn figure_from_wia_limit(wia: &WiaData, max_points: usize) -> Figure {
    let mut fig = Figure::new(Some(format!("Separated wave intensity: {}", wia.name())));
    fig.x.label = Some("Time (ms)".into());
    fig.y.label = Some("Intensity (W/m²/s²)".into());

    for wave in wia.waves() {
        fig.add_series(Series::Span(SpanSeries {
            name: wave.name().to_string(),
            x_range: [wave.start_time() * 1000.0, wave.end_time() * 1000.0],
            color: wave_color(wave.wave_type()),
        }));
    }

    let time_ms: Vec<f64> = wia.time().iter().map(|t| t * 1000.0).collect();
    let line = |name: &str, values: &[f64], color: Color| {
        let points: Vec<[f64; 2]> = time_ms
            .iter()
            .zip(values)
            .map(|(t, v)| [*t, *v])
            .collect();
        Series::Line(LineSeries {
            name: name.into(),
            points: decimate_points(&points, max_points),
            style: Style {
                width: 1.6,
                dash: None,
                color,
            },
        })
    };
    fig.add_series(line("Forward", wia.forward_intensity(), FORWARD_COLOR));
    fig.add_series(line("Backward", wia.backward_intensity(), BACKWARD_COLOR));
    fig
}

pub fn figure_from_wia(wia: &WiaData) -> Figure {
    figure_from_wia_limit(wia, 2048)
}
