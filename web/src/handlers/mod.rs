//! HTTP request handlers.

pub mod event;
pub mod health;
pub mod metrics;

pub use event::handle_event;
pub use health::health_check;
pub use metrics::render_metrics;
