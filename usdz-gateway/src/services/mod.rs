pub mod metrics;
pub mod storage;
pub mod workspace;

pub use metrics::{get_metrics, init_metrics, record_conversion};
pub use storage::{GcsStorage, Storage};
pub use workspace::ConversionWorkspace;
