use crate::config::{LprServiceConfig, DEFAULT_MAX_UPLOAD_BYTES};
use crate::error::ApiError;
use common::plates::{ModelInfo, PlateResult};
use recognition::{Image, ModelLoadError, RecognitionConfig, RecognitionModel};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Read the model configuration (defaults when `path` is `None`) and build the model
pub fn load_model(path: Option<&Path>) -> Result<RecognitionModel, ModelLoadError> {
    let config = RecognitionConfig::load(path)?;
    recognition::initialize(config)
}

/// Outcome of one recognition request
#[derive(Debug, Clone)]
pub struct RecognitionOutput {
    pub result: PlateResult,
    pub candidates_evaluated: usize,
    pub elapsed: Duration,
}

/// Per-request limits taken from the service configuration
#[derive(Debug, Clone, Copy)]
pub struct ServiceLimits {
    pub recognition_timeout: Option<Duration>,
    pub max_upload_bytes: usize,
}

impl Default for ServiceLimits {
    fn default() -> Self {
        Self {
            recognition_timeout: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl From<&LprServiceConfig> for ServiceLimits {
    fn from(config: &LprServiceConfig) -> Self {
        Self {
            recognition_timeout: config.recognition_timeout,
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

#[derive(Clone)]
pub struct LprServiceState {
    inner: Arc<LprServiceStateInner>,
}

struct LprServiceStateInner {
    node_id: String,
    model: Option<Arc<RecognitionModel>>,
    load_error: Option<String>,
    limits: ServiceLimits,
}

impl LprServiceState {
    pub fn new(node_id: String, model: Arc<RecognitionModel>, limits: ServiceLimits) -> Self {
        telemetry::metrics::LPR_MODEL_LOADED.set(1);
        Self {
            inner: Arc::new(LprServiceStateInner {
                node_id,
                model: Some(model),
                load_error: None,
                limits,
            }),
        }
    }

    /// State for a service whose model failed to load; recognition answers 503
    pub fn unavailable(node_id: String, load_error: impl Into<String>, limits: ServiceLimits) -> Self {
        telemetry::metrics::LPR_MODEL_LOADED.set(0);
        Self {
            inner: Arc::new(LprServiceStateInner {
                node_id,
                model: None,
                load_error: Some(load_error.into()),
                limits,
            }),
        }
    }

    /// Load the model named by `config` on the blocking pool.
    ///
    /// A load failure is fatal when `fail_fast` is set; otherwise the service
    /// starts without a model and reports not ready.
    pub async fn load(config: &LprServiceConfig) -> anyhow::Result<Self> {
        let path = config.model_config.clone();
        let limits = ServiceLimits::from(config);
        let started = Instant::now();
        let loaded = tokio::task::spawn_blocking(move || load_model(path.as_deref())).await?;

        match loaded {
            Ok(model) => {
                let elapsed = started.elapsed().as_secs_f64();
                telemetry::metrics::LPR_MODEL_LOAD_SECONDS.observe(elapsed);
                info!(elapsed_secs = elapsed, "Recognition model ready");
                Ok(Self::new(config.node_id.clone(), Arc::new(model), limits))
            }
            Err(e) if config.fail_fast => {
                Err(anyhow::Error::new(e).context("Failed to load recognition model"))
            }
            Err(e) => {
                error!("Failed to load recognition model, serving 503: {}", e);
                Ok(Self::unavailable(config.node_id.clone(), e.to_string(), limits))
            }
        }
    }

    pub fn node_id(&self) -> &str {
        &self.inner.node_id
    }

    pub fn is_ready(&self) -> bool {
        self.inner.model.is_some()
    }

    pub fn load_error(&self) -> Option<&str> {
        self.inner.load_error.as_deref()
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.inner.limits.max_upload_bytes
    }

    /// 503 with the load error when no model is loaded
    pub fn ensure_ready(&self) -> Result<(), ApiError> {
        self.model().map(|_| ())
    }

    fn model(&self) -> Result<Arc<RecognitionModel>, ApiError> {
        self.inner.model.clone().ok_or_else(|| {
            ApiError::unavailable(
                self.inner
                    .load_error
                    .clone()
                    .unwrap_or_else(|| "recognition model not loaded".to_string()),
            )
        })
    }

    pub fn model_info(&self) -> Result<ModelInfo, ApiError> {
        Ok(self.model()?.info())
    }

    /// Decode `bytes` and run recognition on the blocking pool
    pub async fn recognize(&self, bytes: Vec<u8>) -> Result<RecognitionOutput, ApiError> {
        let model = self.model()?;
        let started = Instant::now();

        let task = tokio::task::spawn_blocking(move || {
            let image = Image::decode(&bytes).map_err(|e| ApiError::bad_request(e.to_string()))?;
            model.recognize(&image).map_err(|e| {
                error!("Recognition failed: {}", e);
                ApiError::internal(e.to_string())
            })
        });

        let joined = match self.inner.limits.recognition_timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(timeout_ms = limit.as_millis() as u64, "Recognition timed out");
                    telemetry::metrics::record_recognition("timeout", started.elapsed().as_secs_f64(), 0);
                    return Err(ApiError::Timeout(limit.as_millis()));
                }
            },
            None => task.await,
        };

        let recognition = joined.map_err(|e| ApiError::internal(format!("recognition task failed: {e}")))??;
        let elapsed = started.elapsed();
        let outcome = if recognition.result.is_plate() {
            "plate"
        } else {
            "no_plate"
        };
        telemetry::metrics::record_recognition(
            outcome,
            elapsed.as_secs_f64(),
            recognition.candidates_evaluated(),
        );

        Ok(RecognitionOutput {
            candidates_evaluated: recognition.candidates_evaluated(),
            result: recognition.result,
            elapsed,
        })
    }
}
