use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use labtrend_core::{loess_series, parse_date, DashboardConfig, DataSet, SampleValue};
use labtrend_normalize::{check_integrity, import_report, load_dataset_str};
use labtrend_view::{
    derive_view, export_file_name, format_with_unit, partition_indicators, ExportFormat,
    ViewParams,
};
use log::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "labtrend-cli",
    about = "Summarize, pivot and smooth chemotherapy lab results from a dataset JSON."
)]
struct Args {
    /// Path to the dataset JSON file; every command except `import` needs it.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Dashboard config JSON; missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Cycle length used when the dataset has none.
    #[arg(long)]
    cycle_length: Option<u32>,

    /// LOESS neighbourhood fraction.
    #[arg(long)]
    span: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dataset overview and integrity findings.
    Summary,
    /// Export the pivot table of core plus selected indicators.
    Pivot {
        #[arg(long, default_value = "csv")]
        format: ExportFormat,
        /// One row per date instead of one row per indicator.
        #[arg(long)]
        transpose: bool,
        /// Extended indicator to include; may be repeated.
        #[arg(long = "indicator")]
        indicators: Vec<String>,
        /// Write to this file instead of stdout. A directory gets
        /// `pivot-<today>.<ext>` inside it.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// LOESS trend of one indicator.
    Trend {
        #[arg(long)]
        indicator: String,
    },
    /// Convert a lab-report CSV into dataset JSON.
    Import {
        #[arg(long)]
        csv: PathBuf,
        /// First treatment day, `YYYY-MM-DD` or `YYYY.MM.DD`.
        #[arg(long, value_parser = parse_start_date)]
        start_date: NaiveDate,
        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => DashboardConfig::default(),
    };
    apply_overrides(&mut config, args.cycle_length, args.span)?;

    if let Command::Import {
        csv,
        start_date,
        output,
    } = &args.command
    {
        return import_csv(csv, *start_date, &config, output.as_deref());
    }

    let input = args
        .input
        .as_deref()
        .context("--input is required for this command")?;
    let dataset = read_dataset(input, &config)?;

    match args.command {
        Command::Summary => print_summary(&dataset, &config),
        Command::Pivot {
            format,
            transpose,
            indicators,
            output,
        } => export_pivot(&dataset, &config, format, transpose, indicators, output.as_deref())?,
        Command::Trend { indicator } => print_trend(&dataset, &config, &indicator)?,
        Command::Import { .. } => {}
    }

    Ok(())
}

fn read_dataset(path: &Path, config: &DashboardConfig) -> anyhow::Result<DataSet> {
    let data = std::fs::read_to_string(path).with_context(|| format!("could not read {path:?}"))?;
    let dataset = load_dataset_str(&data, config)?;
    info!(
        "loaded {} indicators over {} dates",
        dataset.indicators.len(),
        dataset.dates.len()
    );
    Ok(dataset)
}

fn parse_start_date(value: &str) -> Result<NaiveDate, String> {
    parse_date(value)
        .map(|date| date.date())
        .ok_or_else(|| format!("{value:?} is not a date"))
}

fn read_config(path: &Path) -> anyhow::Result<DashboardConfig> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("could not read config {path:?}"))?;
    serde_json::from_str(&text).with_context(|| format!("invalid config {path:?}"))
}

fn apply_overrides(
    config: &mut DashboardConfig,
    cycle_length: Option<u32>,
    span: Option<f64>,
) -> anyhow::Result<()> {
    if let Some(days) = cycle_length {
        if days == 0 {
            bail!("--cycle-length must be at least 1");
        }
        config.default_cycle_length_days = days;
    }
    if let Some(span) = span {
        if !(span.is_finite() && span > 0.0) {
            bail!("--span must be a positive number, got {span}");
        }
        config.loess_span = span;
    }
    Ok(())
}

fn print_summary(dataset: &DataSet, config: &DashboardConfig) {
    let (core, extended) = partition_indicators(dataset, config);

    println!(
        "Start date: {} (cycle length {} days)",
        dataset.start_date, dataset.cycle_length_days
    );
    match (dataset.dates.first(), dataset.dates.last()) {
        (Some(first), Some(last)) => println!(
            "Report dates: {} ({first} .. {last})",
            dataset.dates.len()
        ),
        _ => println!("Report dates: 0"),
    }
    println!("Max cycle: {}", dataset.max_cycle());
    println!(
        "Indicators: {} (core {}, extended {})",
        dataset.indicators.len(),
        core.len(),
        extended.len()
    );

    let issues = check_integrity(dataset);
    println!("Integrity issues: {}", issues.len());
    for issue in issues {
        println!("  - {issue}");
    }
}

fn export_pivot(
    dataset: &DataSet,
    config: &DashboardConfig,
    format: ExportFormat,
    transpose: bool,
    indicators: Vec<String>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let params = ViewParams {
        selected: indicators,
        transposed: transpose,
        ..ViewParams::default()
    };
    let view = derive_view(dataset, &params, config);
    for name in params.selected.iter().filter(|name| !view.selected.contains(*name)) {
        warn!("{name} is not an extended indicator of this dataset; skipped");
    }

    let text = format.render(&view.pivot)?;
    match output {
        Some(path) => {
            let path = pivot_destination(path, format, Local::now().date_naive());
            std::fs::write(&path, text).with_context(|| format!("could not write {path:?}"))?;
            info!("pivot written to {path:?}");
        }
        None => print!("{text}"),
    }
    Ok(())
}

/// `output` itself, or the dated export name inside it when it is a directory.
fn pivot_destination(output: &Path, format: ExportFormat, today: NaiveDate) -> PathBuf {
    if output.is_dir() {
        output.join(export_file_name(format, today))
    } else {
        output.to_path_buf()
    }
}

fn import_csv(
    csv: &Path,
    start_date: NaiveDate,
    config: &DashboardConfig,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let file = File::open(csv).with_context(|| format!("could not open {csv:?}"))?;
    let dataset = import_report(file, start_date, config)
        .with_context(|| format!("could not import {csv:?}"))?;
    let json = serde_json::to_string_pretty(&dataset)?;

    match output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("could not write {path:?}"))?;
            info!("dataset written to {path:?}");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn print_trend(dataset: &DataSet, config: &DashboardConfig, name: &str) -> anyhow::Result<()> {
    let record = dataset
        .indicator(name)
        .with_context(|| format!("indicator {name} is not in the dataset"))?;
    let trend = loess_series(&record.series, config.loess_span);

    for (point, estimate) in record.series.iter().zip(&trend) {
        let phase = dataset
            .phase_of(&point.date)
            .map(|phase| phase.label(&config.labels))
            .unwrap_or_default();
        let value = match &point.value {
            SampleValue::Number(v) => format_with_unit(Some(*v), &record.unit),
            SampleValue::Text(text) => text.clone(),
            SampleValue::Missing => "-".to_string(),
        };
        let estimate = estimate
            .estimate
            .map(|e| format!("{e:.3}"))
            .unwrap_or_else(|| "-".to_string());
        println!("{}\t{phase}\t{value}\t{estimate}", point.date);
    }
    Ok(())
}
