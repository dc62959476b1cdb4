//! Domain layer for the model validation client
//!
//! CDD Principle: Domain Model - Pure value objects describing server validation state
//! - Result items, filters and facet constraints are immutable values
//! - Independent of the transport used to obtain them
//! - Expresses the ubiquitous language of diagnostics, severities and sources

pub mod constraints;
pub mod results;

// Re-export main domain types for convenience
pub use constraints::*;
pub use results::*;
