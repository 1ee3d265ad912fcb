pub mod recovery;
pub mod signals;

pub use recovery::RecoveryManager;
pub use signals::setup_shutdown_handler;
