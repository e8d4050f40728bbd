//! Shared building blocks for epicurve: the observation and series models,
//! the error type, date parsing, defaults and command-line settings.

pub mod dates;
pub mod defaults;
pub mod error;
pub mod models;
pub mod settings;

pub use error::{EpicurveError, Result};
