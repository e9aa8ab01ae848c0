//! API layer
//!
//! HTTP handlers for:
//! - The gated private page
//! - Metrics (Prometheus)

pub mod metrics;
mod private_area;

pub use metrics::metrics_router;
pub use private_area::private_area_router;
