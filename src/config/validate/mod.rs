//! Configuration validation
//!
//! Validates run specifications before any rendering or training starts.

mod error;
mod validator;

#[cfg(test)]
mod proptests;

pub use error::ValidationError;
pub use validator::{validate_config, validate_fonts, validate_values};
