//! rforecast — auto-ARIMA forecasts computed by a remote Rserve session.

use anyhow::Context;
use rforecast_core::{Error, ForecastConfig};
use rforecast_rserve::RserveConnection;
use rforecast_runtime::{ForecastOrchestrator, ForecastReport, ForecastRequest};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod args;

use args::{Command, ForecastArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only results
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let command = match args::parse(&argv) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{}", msg);
            std::process::exit(1);
        }
    };

    match command {
        Command::Help => {
            args::print_help();
            Ok(())
        }
        Command::Version => print_version().await,
        Command::Forecast(forecast) => match run_forecast(forecast).await? {
            0 => Ok(()),
            code => std::process::exit(code),
        },
    }
}

async fn connect(config: &ForecastConfig) -> anyhow::Result<RserveConnection> {
    RserveConnection::open(config)
        .await
        .with_context(|| format!("Failed to connect to Rserve at {}", config.addr()))
}

async fn print_version() -> anyhow::Result<()> {
    let config = ForecastConfig::from_env()?;
    let orchestrator = ForecastOrchestrator::from_config(&config)?;
    let mut conn = connect(&config).await?;

    let version = orchestrator.server_version(&mut conn).await?;
    println!("{}", version);

    conn.close().await?;
    Ok(())
}

/// Exit status for a failed forecast: 2 when the remote side failed, 1 for
/// local problems such as an unreadable input file.
fn failure_exit_code(error: &Error) -> i32 {
    if error.is_remote() {
        2
    } else {
        1
    }
}

/// Returns the process exit status.
async fn run_forecast(args: ForecastArgs) -> anyhow::Result<i32> {
    let config = ForecastConfig::from_env()?;
    let orchestrator = ForecastOrchestrator::from_config(&config)?;
    let horizon = args.horizon.unwrap_or(config.default_horizon);

    let mut conn = connect(&config).await?;
    let version = orchestrator.server_version(&mut conn).await?;
    info!("Remote session: {}", version);

    // Preload once per connection; each run re-checks cheaply
    let status = orchestrator
        .ensure_library_loaded(&mut conn)
        .await
        .with_context(|| format!("Failed to load R library {}", orchestrator.library().name))?;
    info!("Library {}: {:?}", orchestrator.library().name, status);

    let request = ForecastRequest::new(&args.file, horizon);
    let outcome = orchestrator.run_forecast(&request, &mut conn).await;

    for problem in &outcome.cleanup_errors {
        warn!("Cleanup: {}", problem);
    }
    if let Err(e) = conn.close().await {
        warn!("Closing connection: {}", e);
    }

    if args.json {
        let report = ForecastReport::from_outcome(horizon, &outcome);
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if let Ok(values) = &outcome.result {
        for v in values {
            println!("{}", v);
        }
    }

    match &outcome.result {
        Ok(_) => Ok(0),
        Err(e) => {
            let side = if e.is_remote() { "remote" } else { "local" };
            eprintln!("Forecast failed ({}): {}", side, e);
            Ok(failure_exit_code(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_exit_codes() {
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "sales.csv");
        assert_eq!(failure_exit_code(&Error::from(missing)), 1);
        assert_eq!(failure_exit_code(&Error::Eval("series too short".into())), 2);
        assert_eq!(
            failure_exit_code(&Error::InvalidRequest("horizon must be positive".into())),
            1
        );
    }
}
