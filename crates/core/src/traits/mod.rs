pub mod backend;
pub mod event_sink;

pub use backend::*;
pub use event_sink::*;
