//! Process supervisor for the external encoder.

pub mod executor;
pub mod progress;

pub use executor::{execute, ExecutionRequest};
pub use progress::{ProgressParser, ProgressUpdate};
