//! Macro implementations

pub mod model;

pub use model::derive_model;
