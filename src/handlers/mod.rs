mod fallback;
mod health;

pub use fallback::not_found;
pub use health::{health_check, performance_metrics, system_status};
