//! Forecast runtime — sequences a remote auto-ARIMA run.
//!
//! Ensures the forecasting library is present in the remote session,
//! uploads the local series, fits and forecasts remotely, fetches the mean
//! forecast, and always removes the uploaded file before returning.

pub mod orchestrator;
pub mod types;

pub use orchestrator::ForecastOrchestrator;
pub use types::*;
