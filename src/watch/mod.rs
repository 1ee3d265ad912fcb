pub mod tracker;
pub mod watcher;

pub use tracker::ChangeTracker;
pub use watcher::FileWatcher;
