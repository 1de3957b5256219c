use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct LprServiceConfig {
    /// Address to bind the HTTP server to
    pub bind_addr: String,

    /// Recognition model configuration file (JSON)
    pub model_config: Option<PathBuf>,

    /// Node ID for this service instance
    pub node_id: String,

    /// Largest accepted request body
    pub max_upload_bytes: usize,

    /// Wall-clock limit for one recognition
    pub recognition_timeout: Option<Duration>,

    /// Exit at startup instead of serving 503 when the model fails to load
    pub fail_fast: bool,
}

impl LprServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("LPR_SERVICE_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string());

        let model_config = lookup("LPR_MODEL_CONFIG")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        let node_id = lookup("NODE_ID").unwrap_or_else(|| {
            format!(
                "lpr-service-{}",
                hostname::get()
                    .ok()
                    .and_then(|h| h.into_string().ok())
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
            )
        });

        let max_upload_bytes = lookup("LPR_MAX_UPLOAD_BYTES")
            .map(|v| v.trim().parse::<usize>())
            .transpose()
            .context("Invalid LPR_MAX_UPLOAD_BYTES")?
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        let recognition_timeout = lookup("LPR_RECOGNITION_TIMEOUT_MS")
            .map(|v| v.trim().parse::<u64>())
            .transpose()
            .context("Invalid LPR_RECOGNITION_TIMEOUT_MS")?
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        let fail_fast = lookup("LPR_FAIL_FAST")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            bind_addr,
            model_config,
            node_id,
            max_upload_bytes,
            recognition_timeout,
            fail_fast,
        })
    }
}
