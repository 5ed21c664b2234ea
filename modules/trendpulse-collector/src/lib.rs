pub mod cache;
pub mod circuit;
pub mod collector;
pub mod health;
pub mod rate_limit;
pub mod sources;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
