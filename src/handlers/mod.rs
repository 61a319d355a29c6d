//! HTTP handlers for model and association CRUD.

pub mod footprint;
pub use footprint::*;
