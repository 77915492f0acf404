//! Core business logic for eventix.

pub mod ledger;
pub mod pricing;
pub mod services;

pub use services::*;
