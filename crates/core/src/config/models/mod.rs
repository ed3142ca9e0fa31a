pub mod app_config;
pub mod backends;
pub mod dispatch;
pub mod logging;
pub mod storage;

pub use app_config::*;
pub use backends::*;
pub use dispatch::*;
pub use logging::*;
pub use storage::*;
