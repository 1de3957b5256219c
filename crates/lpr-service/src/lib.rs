pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod state;

pub use config::LprServiceConfig;
pub use error::ApiError;
pub use state::{load_model, LprServiceState, RecognitionOutput, ServiceLimits};
