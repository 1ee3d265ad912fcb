pub mod paths;
pub mod traits;

pub use paths::{normalize_path, HomePathNormalizer};
pub use traits::PathNormalizer;
