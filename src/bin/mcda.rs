#![forbid(unsafe_code)]

use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

use mcda_harness::forecast::{forecast, ForecastConfig, ForecastMethod};
use mcda_harness::pipeline::{run_analysis, sample_request, AnalysisRequest};

#[derive(Parser)]
#[command(name = "mcda", version, about = "Multi-criteria decision analysis CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full analysis from a JSON request
    Analyze {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Forecast a single series
    Forecast {
        /// Comma-separated history, e.g. 1,2,4,8
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        history: Vec<f64>,
        #[arg(long, default_value_t = 0)]
        steps: usize,
        #[arg(long, value_enum, default_value_t = MethodArg::Logistic)]
        method: MethodArg,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Write a request over the built-in reference dataset
    SampleRequest {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    Grey,
    Logistic,
}

impl From<MethodArg> for ForecastMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Grey => ForecastMethod::Grey,
            MethodArg::Logistic => ForecastMethod::Logistic,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_writer(io::stderr).with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze { input, out } => {
            let req: AnalysisRequest = read_json(&input)?;
            let report = run_analysis(&req)?;
            emit(out.as_ref(), &report)?;
            if let Some(path) = out {
                eprintln!("[analyze] report written to {}", path.display());
            }
        }
        Commands::Forecast {
            history,
            steps,
            method,
            out,
        } => {
            let result = forecast(&history, steps, method.into(), &ForecastConfig::default())?;
            if let Some(reason) = &result.fallback_reason {
                eprintln!("[forecast] logistic fit rejected, used grey model: {reason}");
            }
            emit(out.as_ref(), &result)?;
        }
        Commands::SampleRequest { out } => {
            emit(out.as_ref(), &sample_request())?;
        }
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(
    path: &PathBuf,
) -> Result<T, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_json<T: serde::Serialize>(path: &PathBuf, value: &T) -> Result<(), io::Error> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    std::fs::write(path, json)
}

/// Write to `out` when given, otherwise pretty-print to stdout.
fn emit<T: serde::Serialize>(out: Option<&PathBuf>, value: &T) -> Result<(), io::Error> {
    match out {
        Some(path) => write_json(path, value),
        None => {
            let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
            println!("{json}");
            Ok(())
        }
    }
}
