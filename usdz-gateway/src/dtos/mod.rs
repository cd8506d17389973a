pub mod conversion;

pub use conversion::{CloudConvertResponse, ConvertResponse, DownloadParams};
