//! Router builders.

pub mod common;
pub mod footprint;

pub use common::common_routes;
pub use footprint::footprint_routes;
