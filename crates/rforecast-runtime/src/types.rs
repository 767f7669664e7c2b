//! Runtime types.

use std::path::PathBuf;

use rforecast_core::{r_string_literal, Error, ForecastConfig, Result};
use rforecast_session::RemoteFileHandle;
use serde::Serialize;

/// Input for one forecast run.
#[derive(Debug, Clone)]
pub struct ForecastRequest {
    /// Newline-delimited, single-column numeric file without a header.
    pub data_file: PathBuf,
    /// Number of future points to forecast.
    pub horizon: usize,
}

impl ForecastRequest {
    pub fn new(data_file: impl Into<PathBuf>, horizon: usize) -> Self {
        Self {
            data_file: data_file.into(),
            horizon,
        }
    }
}

/// Library that must be loadable in the remote session, and where to
/// install it from when it is not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryRequirement {
    pub name: String,
    pub repo_url: String,
}

impl LibraryRequirement {
    pub fn new(name: &str, repo_url: &str) -> Result<Self> {
        if !rforecast_core::is_valid_package_name(name) {
            return Err(Error::InvalidRequest(format!(
                "'{}' is not a valid R package name",
                name
            )));
        }
        Ok(Self {
            name: name.to_string(),
            repo_url: repo_url.to_string(),
        })
    }

    pub fn from_config(config: &ForecastConfig) -> Result<Self> {
        Self::new(&config.library, &config.repo_url)
    }

    pub fn require_expression(&self) -> String {
        format!("require({})", r_string_literal(&self.name))
    }

    pub fn install_expression(&self) -> String {
        format!(
            "install.packages({}, repos={})",
            r_string_literal(&self.name),
            r_string_literal(&self.repo_url)
        )
    }

    pub fn load_expression(&self) -> String {
        format!("library({})", r_string_literal(&self.name))
    }
}

/// How the library check concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LibraryStatus {
    /// `require` succeeded; nothing was installed.
    AlreadyLoaded,
    /// `require` failed; the library was installed and then loaded.
    Installed,
}

/// Pipeline stage of a forecast run.
///
/// Runs move `Idle → LibraryReady → Uploaded → Fitted → Forecasted` and
/// always end in `CleanedUp`, from whichever stage they reached.
/// `ForecastOutcome::reached` keeps the last stage before cleanup;
/// `ForecastOutcome::stage` is the terminal one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Idle,
    LibraryReady,
    Uploaded,
    Fitted,
    Forecasted,
    CleanedUp,
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::LibraryReady => write!(f, "library_ready"),
            Self::Uploaded => write!(f, "uploaded"),
            Self::Fitted => write!(f, "fitted"),
            Self::Forecasted => write!(f, "forecasted"),
            Self::CleanedUp => write!(f, "cleaned_up"),
        }
    }
}

/// Everything a forecast run produced.
///
/// `result` is the primary answer. Cleanup problems never change it; they
/// are reported separately in `cleanup_errors`.
#[derive(Debug)]
pub struct ForecastOutcome {
    /// Mean forecast, one value per horizon step.
    pub result: Result<Vec<f64>>,
    /// Furthest stage reached before cleanup.
    pub reached: RunStage,
    /// Stage the run is in; `CleanedUp` once `run_forecast` returns.
    pub stage: RunStage,
    /// Remote file used by this run, if the upload got that far.
    pub remote_file: Option<RemoteFileHandle>,
    pub cleanup_errors: Vec<String>,
}

impl ForecastOutcome {
    pub(crate) fn new() -> Self {
        Self {
            result: Err(Error::InvalidRequest("run did not start".into())),
            reached: RunStage::Idle,
            stage: RunStage::Idle,
            remote_file: None,
            cleanup_errors: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<Vec<f64>> {
        self.result
    }
}

/// Serializable summary for `--json` output.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastReport {
    pub horizon: usize,
    pub mean: Option<Vec<f64>>,
    pub error: Option<String>,
    pub reached: RunStage,
    pub stage: RunStage,
    #[serde(rename = "remoteFile")]
    pub remote_file: Option<RemoteFileHandle>,
    #[serde(rename = "cleanupErrors")]
    pub cleanup_errors: Vec<String>,
}

impl ForecastReport {
    pub fn from_outcome(horizon: usize, outcome: &ForecastOutcome) -> Self {
        let (mean, error) = match &outcome.result {
            Ok(values) => (Some(values.clone()), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            horizon,
            mean,
            error,
            reached: outcome.reached,
            stage: outcome.stage,
            remote_file: outcome.remote_file.clone(),
            cleanup_errors: outcome.cleanup_errors.clone(),
        }
    }
}
