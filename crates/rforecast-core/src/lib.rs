//! rforecast core — error type, configuration, R literal helpers.

pub mod config;
pub mod error;
pub mod literal;

pub use config::ForecastConfig;
pub use error::{Error, Result};
pub use literal::{is_valid_package_name, r_string_literal};
