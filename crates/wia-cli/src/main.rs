use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use plotters::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use wia_lib::{
    beats::BeatAggregator,
    config::AnalysisConfig,
    detectors::{detect_qrs_in, find_r_waves, QrsMarker, RWave, RWaveConfig},
    io::{load_wia, read_csv_store, save_wia, write_csv_file},
    plot::{figure_from_wia, Figure, PlotBackend, Series},
    resample::{Interpolation, LogProgress},
    wia::{CmdInputs, WiaData, WiaSummary},
    CycleLengths, EnsembleMode, Fiducials, Flag, HemoData, SignalKind, Unit,
};

#[derive(Parser)]
#[command(name = "wia", version, about = "Wave intensity analysis command-line tools")]
struct Cli {
    /// TOML file with analysis defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum MarkerArg {
    Peak,
    #[value(name = "pre-peak")]
    PrePeak,
    Onset,
}

impl From<MarkerArg> for QrsMarker {
    fn from(value: MarkerArg) -> Self {
        match value {
            MarkerArg::Peak => QrsMarker::Peak,
            MarkerArg::PrePeak => QrsMarker::PrePeak,
            MarkerArg::Onset => QrsMarker::Onset,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ModeArg {
    Trim,
    Scale,
}

impl From<ModeArg> for EnsembleMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Trim => EnsembleMode::Trim,
            ModeArg::Scale => EnsembleMode::Scale,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Detect QRS complexes in an ECG column
    DetectQrs {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        ecg: String,
        #[arg(long)]
        marker: Option<MarkerArg>,
        /// Unit of the first (domain) column: s or ms
        #[arg(long)]
        x_unit: Option<String>,
    },
    /// Locate R-waves by second-derivative energy
    RWaves {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        ecg: String,
        #[arg(long, default_value_t = 0.0)]
        min_relative_energy: f64,
        #[arg(long, default_value_t = 75)]
        neighborhood: usize,
    },
    /// Resample every column onto an evenly spaced grid
    Resample {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// Grid spacing in domain units
        #[arg(long)]
        rate: Option<f64>,
        #[arg(long)]
        linear: bool,
    },
    /// Split a recording into beats at QRS complexes and ensemble pressure and flow
    Ensemble {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        ecg: String,
        #[arg(long)]
        pressure: String,
        #[arg(long)]
        flow: String,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        mode: Option<ModeArg>,
        #[arg(long)]
        x_unit: Option<String>,
    },
    /// Run wave intensity analysis on one beat
    Analyze {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        pressure: String,
        #[arg(long)]
        flow: String,
        #[arg(long)]
        pressure_unit: Option<String>,
        #[arg(long)]
        flow_unit: Option<String>,
        #[arg(long)]
        x_unit: Option<String>,
        /// Write the analysis snapshot (JSON) here
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Write the analysed data (CSV export layout) here
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Add the suggested dominant waves before summarising
        #[arg(long)]
        suggest_waves: bool,
        #[arg(long)]
        cfr: Option<f64>,
        #[arg(long)]
        hmr: Option<f64>,
        #[arg(long)]
        ach: Option<f64>,
    },
    /// Render separated wave intensity from a snapshot to a PNG
    Plot {
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Serialize)]
struct QrsOutput {
    fiducials: Fiducials,
    cycle_lengths_ms: Vec<f64>,
    cycle_duration_ms: Option<f64>,
}

#[derive(Serialize)]
struct ResampleOutput {
    samples: usize,
    rate: f64,
    interpolation: Interpolation,
    filtered: bool,
}

#[derive(Serialize)]
struct EnsembleOutput {
    beats: usize,
    samples: usize,
    mode: EnsembleMode,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();
    let config = match &cli.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    match cli.command {
        Commands::DetectQrs {
            input,
            ecg,
            marker,
            x_unit,
        } => cmd_detect_qrs(&config, &input, &ecg, marker, x_unit.as_deref())?,
        Commands::RWaves {
            input,
            ecg,
            min_relative_energy,
            neighborhood,
        } => cmd_r_waves(&input, &ecg, min_relative_energy, neighborhood)?,
        Commands::Resample {
            input,
            out,
            rate,
            linear,
        } => cmd_resample(&config, &input, &out, rate, linear)?,
        Commands::Ensemble {
            input,
            ecg,
            pressure,
            flow,
            out,
            mode,
            x_unit,
        } => cmd_ensemble(
            &config,
            &input,
            &ecg,
            (&pressure, &flow),
            &out,
            mode,
            x_unit.as_deref(),
        )?,
        Commands::Analyze {
            input,
            pressure,
            flow,
            pressure_unit,
            flow_unit,
            x_unit,
            snapshot,
            csv,
            suggest_waves,
            cfr,
            hmr,
            ach,
        } => {
            let units = [x_unit, pressure_unit, flow_unit];
            let cmd = CmdInputs {
                cfr,
                hmr,
                ach_percent: ach,
            };
            let (wia, summary) =
                cmd_analyze(&config, &input, (&pressure, &flow), &units, cmd, suggest_waves)?;
            if let Some(path) = snapshot {
                save_wia(&path, &wia)?;
            }
            if let Some(path) = csv {
                write_csv_file(wia.analyzed_data(), &path)?;
            }
            println!("{}", serde_json::to_string(&summary)?);
        }
        Commands::Plot { snapshot, out } => cmd_plot(&snapshot, &out)?,
    }
    Ok(())
}

fn parse_unit(text: &str) -> Result<Unit> {
    text.parse::<Unit>().map_err(|e| anyhow!(e))
}

/// Read `path` and tag its domain with `x_unit` when given.
fn load_input(path: &Path, x_unit: Option<&str>) -> Result<HemoData> {
    let mut data = read_csv_store(path, None)?;
    if let Some(unit) = x_unit {
        let unit = parse_unit(unit)?;
        let header = data
            .x_header()
            .map(|h| h.name().to_string())
            .ok_or_else(|| anyhow!("{} has no domain column", path.display()))?;
        data.add_flags(&header, [Flag::Unit(unit)])?;
    }
    Ok(data)
}

fn tag(data: &mut HemoData, header: &str, kind: SignalKind, unit: Option<&str>) -> Result<()> {
    data.add_flags(header, [Flag::Kind(kind)])
        .with_context(|| format!("column '{header}'"))?;
    if let Some(unit) = unit {
        data.add_flags(header, [Flag::Unit(parse_unit(unit)?)])?;
    }
    Ok(())
}

fn cmd_detect_qrs(
    config: &AnalysisConfig,
    input: &Path,
    ecg: &str,
    marker: Option<MarkerArg>,
    x_unit: Option<&str>,
) -> Result<()> {
    let mut data = load_input(input, x_unit)?;
    tag(&mut data, ecg, SignalKind::Ecg, None)?;
    let marker = marker.map(QrsMarker::from).unwrap_or(config.qrs.marker);
    let fiducials = detect_qrs_in(&data, ecg, marker)?;
    let cycles = CycleLengths::from_fiducials(&fiducials, data.sample_rate_hz()?);
    let out = QrsOutput {
        cycle_duration_ms: cycles.cycle_duration(),
        cycle_lengths_ms: cycles.ms,
        fiducials,
    };
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}

fn cmd_r_waves(
    input: &Path,
    ecg: &str,
    min_relative_energy: f64,
    neighborhood: usize,
) -> Result<()> {
    let data = read_csv_store(input, None)?;
    let cfg = RWaveConfig {
        neighborhood,
        min_relative_energy,
    };
    let waves: Vec<RWave> = find_r_waves(data.y(ecg)?, &cfg);
    println!("{}", serde_json::to_string(&waves)?);
    Ok(())
}

fn cmd_resample(
    config: &AnalysisConfig,
    input: &Path,
    out: &Path,
    rate: Option<f64>,
    linear: bool,
) -> Result<()> {
    let mut data = read_csv_store(input, None)?;
    let rate = rate.unwrap_or(config.resample.rate);
    let interpolation = if linear {
        Interpolation::Linear
    } else {
        config.resample.interpolation
    };
    data.resample(
        rate,
        config.resample.shift_to_zero,
        interpolation,
        Some(&mut LogProgress),
    )
    .with_context(|| format!("resampling {}", input.display()))?;

    let smoother = config.filter.smoother()?;
    if let Some(smoother) = &smoother {
        let headers: Vec<String> = data.headers().map(|h| h.name().to_string()).collect();
        for header in headers {
            data.apply_filter(&header, smoother)?;
        }
    }
    write_csv_file(&data, out)?;
    let summary = ResampleOutput {
        samples: data.len(),
        rate,
        interpolation,
        filtered: smoother.is_some(),
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn cmd_ensemble(
    config: &AnalysisConfig,
    input: &Path,
    ecg: &str,
    (pressure, flow): (&str, &str),
    out: &Path,
    mode: Option<ModeArg>,
    x_unit: Option<&str>,
) -> Result<()> {
    let mut data = load_input(input, x_unit)?;
    tag(&mut data, ecg, SignalKind::Ecg, None)?;
    tag(&mut data, pressure, SignalKind::Pressure, None)?;
    tag(&mut data, flow, SignalKind::Flow, None)?;
    let mode = mode.map(EnsembleMode::from).unwrap_or(config.ensemble.mode);

    let fiducials = detect_qrs_in(&data, ecg, config.qrs.marker)?;
    let mut aggregator = BeatAggregator::new();
    let beats = aggregator.crop_all(&data, &fiducials);
    if beats.is_empty() {
        return Err(anyhow!(
            "no complete beats between the {} QRS complexes found in '{}'",
            fiducials.len(),
            ecg
        ));
    }
    log::info!("ensembling {} beats of {}", beats.len(), input.display());
    let name = format!("Ensemble of {} beats", beats.len());
    let ensemble = aggregator.ensemble_flow_pressure(&beats, mode, &name)?;
    write_csv_file(ensemble.data(), out)?;
    let summary = EnsembleOutput {
        beats: beats.len(),
        samples: ensemble.len(),
        mode,
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn cmd_analyze(
    config: &AnalysisConfig,
    input: &Path,
    (pressure, flow): (&str, &str),
    [x_unit, pressure_unit, flow_unit]: &[Option<String>; 3],
    cmd: CmdInputs,
    suggest_waves: bool,
) -> Result<(WiaData, WiaSummary)> {
    let mut data = load_input(input, x_unit.as_deref())?;
    tag(&mut data, pressure, SignalKind::Pressure, pressure_unit.as_deref())?;
    tag(&mut data, flow, SignalKind::Flow, flow_unit.as_deref())?;
    if let Some(smoother) = config.filter.smoother()? {
        data.apply_filter(pressure, &smoother)?;
        data.apply_filter(flow, &smoother)?;
    }

    let name = data.name().to_string();
    let mut wia = WiaData::with_density(name, data, config.wia.density)
        .with_context(|| format!("analysing {}", input.display()))?;
    wia.set_cmd_inputs(cmd);
    if suggest_waves {
        for wave in wia.suggest_waves() {
            wia.add_wave(wave)?;
        }
    }
    let summary = wia.summary();
    Ok((wia, summary))
}

fn cmd_plot(snapshot: &Path, out: &Path) -> Result<()> {
    let wia = load_wia(snapshot)?;
    let fig = figure_from_wia(&wia);
    PngBackend { path: out }.draw(&fig)
}

struct PngBackend<'a> {
    path: &'a Path,
}

impl PlotBackend for PngBackend<'_> {
    fn draw(&mut self, fig: &Figure) -> Result<()> {
        let root = BitMapBackend::new(self.path, (800, 480)).into_drawing_area();
        root.fill(&WHITE)?;
        let (x_min, mut x_max, mut y_min, mut y_max) = fig.bounds().unwrap_or((0.0, 1.0, 0.0, 1.0));
        if x_max <= x_min {
            x_max = x_min + 1.0;
        }
        if y_max <= y_min {
            y_min -= 1.0;
            y_max += 1.0;
        }
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(
                fig.title.clone().unwrap_or_else(|| "Plot".into()),
                ("sans-serif", 24),
            )
            .x_label_area_size(30)
            .y_label_area_size(60)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
        let mut mesh = chart.configure_mesh();
        if let Some(label) = &fig.x.label {
            mesh.x_desc(label.as_str());
        }
        if let Some(label) = &fig.y.label {
            mesh.y_desc(label.as_str());
        }
        mesh.draw()?;
        for series in &fig.series {
            match series {
                Series::Span(span) => {
                    let (r, g, b) = span.color.rgb();
                    chart.draw_series(std::iter::once(Rectangle::new(
                        [(span.x_range[0], y_min), (span.x_range[1], y_max)],
                        RGBColor(r, g, b).mix(0.25).filled(),
                    )))?;
                }
                Series::Line(line) => {
                    let (r, g, b) = line.style.color.rgb();
                    chart.draw_series(LineSeries::new(
                        line.points.iter().map(|p| (p[0], p[1])),
                        &RGBColor(r, g, b),
                    ))?;
                }
            }
        }
        root.present()?;
        Ok(())
    }
}
