mod executor;
mod usdz;

pub use executor::CommandExecutor;
pub use usdz::UsdzConverter;
