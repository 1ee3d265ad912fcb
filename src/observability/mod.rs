pub mod logger;

pub use logger::{init_logging, shutdown_logging};
