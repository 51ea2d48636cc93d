//! Types, errors and seams shared across the engine

pub mod channels;
pub mod errors;
pub mod latency;
pub mod traits;
pub mod types;
