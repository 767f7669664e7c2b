//! Command-line parsing.

use std::path::PathBuf;

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    Version,
    Forecast(ForecastArgs),
}

#[derive(Debug, PartialEq, Eq)]
pub struct ForecastArgs {
    pub file: PathBuf,
    /// Falls back to the configured default when absent.
    pub horizon: Option<usize>,
    pub json: bool,
}

/// Parse arguments after the program name.
pub fn parse(args: &[String]) -> Result<Command, String> {
    let Some(first) = args.first() else {
        return Ok(Command::Help);
    };
    match first.as_str() {
        "--help" | "-h" | "help" => Ok(Command::Help),
        "--version" | "version" => Ok(Command::Version),
        "forecast" => parse_forecast(&args[1..]).map(Command::Forecast),
        other => Err(format!(
            "Unknown command: {}. Use 'rforecast help' for usage.",
            other
        )),
    }
}

fn parse_forecast(args: &[String]) -> Result<ForecastArgs, String> {
    let mut json = false;
    let mut positional = Vec::new();
    for arg in args {
        match arg.as_str() {
            "--json" => json = true,
            flag if flag.starts_with("--") => return Err(format!("Unknown option: {}", flag)),
            _ => positional.push(arg),
        }
    }

    let file = positional
        .first()
        .map(|f| PathBuf::from(f.as_str()))
        .ok_or_else(|| "Usage: rforecast forecast <file> [horizon] [--json]".to_string())?;
    let horizon = match positional.get(1) {
        Some(h) => match h.parse::<usize>() {
            Ok(0) | Err(_) => return Err(format!("Horizon must be a positive integer: {}", h)),
            Ok(n) => Some(n),
        },
        None => None,
    };
    if positional.len() > 2 {
        return Err(format!("Unexpected argument: {}", positional[2]));
    }

    Ok(ForecastArgs {
        file,
        horizon,
        json,
    })
}

pub fn print_help() {
    println!("rforecast — auto-ARIMA forecasts computed by a remote Rserve session");
    println!();
    println!("Usage: rforecast <command>");
    println!();
    println!("Commands:");
    println!("  version                          Print the remote R version");
    println!("  forecast <file> [horizon] [--json]");
    println!("                                   Forecast the series in <file>");
    println!("  help                             Show this help message");
    println!();
    println!("Environment:");
    println!("  RSERVE_HOST, RSERVE_PORT         Rserve endpoint (127.0.0.1:6311)");
    println!("  RSERVE_USER, RSERVE_PASSWORD     Credentials when the server requires login");
    println!("  RFORECAST_REPO_URL               Package source for installing the library");
    println!("  RFORECAST_LIBRARY                Forecasting library (forecast)");
    println!("  RFORECAST_HORIZON                Default horizon (20)");
    println!("  RFORECAST_CONFIG                 JSON config file (rforecast.json)");
    println!("  RUST_LOG                         Log filter (info)");
}
