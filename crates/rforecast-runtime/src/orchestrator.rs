//! Orchestrator — sequences one forecast run against a compute session.

use std::path::Path;

use rforecast_core::{r_string_literal, Error, ForecastConfig, Result};
use rforecast_session::{ComputeSession, RemoteFileHandle};
use tracing::{debug, error, info, warn};

use crate::types::*;

/// Expression holding the point forecast of the last run.
pub const MEAN_EXPRESSION: &str = "result$mean";
/// Expression reporting the remote R version.
pub const VERSION_EXPRESSION: &str = "R.version.string";

/// Fit an auto-ARIMA model over the uploaded series (no header lines).
pub fn fit_expression(handle: &RemoteFileHandle) -> String {
    format!(
        "fit <- auto.arima(scan(file={}, skip = 0))",
        r_string_literal(handle.name())
    )
}

pub fn forecast_expression(horizon: usize) -> String {
    format!("result <- forecast(fit, h = {})", horizon)
}

/// Sequences library preload, upload, fit, forecast and cleanup.
///
/// Holds no session state: the caller owns the `ComputeSession` and may
/// reuse it for any number of sequential runs.
pub struct ForecastOrchestrator {
    library: LibraryRequirement,
}

impl ForecastOrchestrator {
    pub fn new(library: LibraryRequirement) -> Self {
        Self { library }
    }

    pub fn from_config(config: &ForecastConfig) -> Result<Self> {
        Ok(Self::new(LibraryRequirement::from_config(config)?))
    }

    pub fn library(&self) -> &LibraryRequirement {
        &self.library
    }

    /// Report the remote R version string.
    pub async fn server_version<S: ComputeSession>(&self, session: &mut S) -> Result<String> {
        session.evaluate(VERSION_EXPRESSION).await?.as_string()
    }

    /// Make sure the forecasting library is attached in the session.
    ///
    /// One `require` call when the library is already available. Otherwise
    /// install from the configured repository and attach with `library`.
    /// The install is best-effort: an R error there is logged and the load
    /// is attempted anyway; a failing load is `LibraryUnavailable`.
    pub async fn ensure_library_loaded<S: ComputeSession>(
        &self,
        session: &mut S,
    ) -> Result<LibraryStatus> {
        let lib = &self.library;
        let available = session
            .evaluate(&lib.require_expression())
            .await?
            .is_truthy()?;
        if available {
            debug!("Library {} already available", lib.name);
            return Ok(LibraryStatus::AlreadyLoaded);
        }

        info!("Installing {} from {}", lib.name, lib.repo_url);
        match session.evaluate(&lib.install_expression()).await {
            Ok(_) => {}
            Err(Error::Eval(msg)) => warn!("Install of {} reported an error: {}", lib.name, msg),
            Err(e) => return Err(e),
        }

        match session.evaluate(&lib.load_expression()).await {
            Ok(_) => {
                info!("Library {} installed and loaded", lib.name);
                Ok(LibraryStatus::Installed)
            }
            Err(Error::Eval(reason)) => {
                error!("Library {} could not be loaded: {}", lib.name, reason);
                Err(Error::LibraryUnavailable {
                    name: lib.name.clone(),
                    reason,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Copy a local file into the session under a fresh unique name.
    ///
    /// The local file is read completely before any remote call, so a
    /// missing or unreadable file never touches the session. When the
    /// write or close fails the partial file is removed; a failure of that
    /// removal is only logged here, and `run_forecast` records it in
    /// `cleanup_errors`.
    pub async fn upload_data_file<S: ComputeSession>(
        &self,
        local_path: &Path,
        session: &mut S,
    ) -> Result<RemoteFileHandle> {
        let mut cleanup_errors = Vec::new();
        upload(local_path, session, &mut cleanup_errors).await
    }

    /// Run the whole pipeline for one request.
    ///
    /// The uploaded file is removed before this returns, whether or not the
    /// forecast succeeded. A failed removal is logged and recorded in
    /// `cleanup_errors`; it never replaces the primary result.
    pub async fn run_forecast<S: ComputeSession>(
        &self,
        request: &ForecastRequest,
        session: &mut S,
    ) -> ForecastOutcome {
        let mut outcome = self.run_stages(request, session).await;
        debug!("Run {} -> {}", outcome.reached, RunStage::CleanedUp);
        outcome.stage = RunStage::CleanedUp;
        outcome
    }

    async fn run_stages<S: ComputeSession>(
        &self,
        request: &ForecastRequest,
        session: &mut S,
    ) -> ForecastOutcome {
        let mut outcome = ForecastOutcome::new();

        if request.horizon == 0 {
            error!("Rejected forecast request with horizon 0");
            outcome.result = Err(Error::InvalidRequest("horizon must be positive".into()));
            return outcome;
        }

        if let Err(e) = self.ensure_library_loaded(session).await {
            error!("Library check failed: {}", e);
            outcome.result = Err(e);
            return outcome;
        }
        outcome.reached = RunStage::LibraryReady;

        let handle =
            match upload(&request.data_file, session, &mut outcome.cleanup_errors).await {
                Ok(h) => h,
                Err(e) => {
                    outcome.result = Err(e);
                    return outcome;
                }
            };
        outcome.reached = RunStage::Uploaded;
        outcome.remote_file = Some(handle.clone());

        let result =
            fit_and_forecast(&handle, request.horizon, session, &mut outcome.reached).await;
        if let Err(e) = &result {
            error!("Forecast failed at stage {}: {}", outcome.reached, e);
        }

        if let Err(e) = session.remove_file(handle.name()).await {
            warn!("Failed to remove remote file {}: {}", handle, e);
            outcome.cleanup_errors.push(format!("removing {}: {}", handle, e));
        }
        if let Ok(values) = &result {
            info!(
                "Forecast of {} points from {} complete",
                values.len(),
                request.data_file.display()
            );
        }
        outcome.result = result;
        outcome
    }
}

async fn upload<S: ComputeSession>(
    local_path: &Path,
    session: &mut S,
    cleanup_errors: &mut Vec<String>,
) -> Result<RemoteFileHandle> {
    let data = tokio::fs::read(local_path).await.map_err(|e| {
        error!("Cannot read {}: {}", local_path.display(), e);
        Error::Io(e)
    })?;

    let handle = RemoteFileHandle::generate();
    session.create_file(handle.name()).await.map_err(|e| {
        error!("Cannot create remote file {}: {}", handle, e);
        e
    })?;

    let written = match session.write_file(&data).await {
        Ok(()) => session.close_file().await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        error!("Upload to {} failed: {}", handle, e);
        // the file exists remotely even though it is incomplete
        if let Err(ce) = session.remove_file(handle.name()).await {
            warn!("Failed to remove partial upload {}: {}", handle, ce);
            cleanup_errors.push(format!("removing {}: {}", handle, ce));
        }
        return Err(e);
    }

    debug!(
        "Uploaded {} ({} bytes) as {}",
        local_path.display(),
        data.len(),
        handle
    );
    Ok(handle)
}

async fn fit_and_forecast<S: ComputeSession>(
    handle: &RemoteFileHandle,
    horizon: usize,
    session: &mut S,
    reached: &mut RunStage,
) -> Result<Vec<f64>> {
    session.evaluate(&fit_expression(handle)).await?;
    *reached = RunStage::Fitted;

    session.evaluate(&forecast_expression(horizon)).await?;
    *reached = RunStage::Forecasted;

    let mean = session.evaluate(MEAN_EXPRESSION).await?.as_doubles()?;
    if mean.len() != horizon {
        return Err(Error::UnexpectedResult(format!(
            "expected {} forecast values, got {}",
            horizon,
            mean.len()
        )));
    }
    Ok(mean)
}
