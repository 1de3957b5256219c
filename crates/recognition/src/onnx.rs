//! ONNX Runtime session setup shared by the learned backends.

use crate::config::RuntimeConfig;
use anyhow::{Context, Result};
use ndarray::{Array, IxDyn};
use ort::{
    execution_providers::{
        CPUExecutionProvider, CUDAExecutionProvider, ExecutionProviderDispatch,
        TensorRTExecutionProvider,
    },
    session::{builder::GraphOptimizationLevel, Session},
    value::Value,
};
use std::path::Path;
use std::sync::Mutex;

/// Execution provider tiers, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    TensorRt,
    Cuda,
    Cpu,
}

impl Provider {
    /// Case-insensitive; anything unrecognised runs on the CPU
    pub fn from_name(name: &str) -> Self {
        match name.to_uppercase().as_str() {
            "TENSORRT" => Provider::TensorRt,
            "CUDA" => Provider::Cuda,
            _ => Provider::Cpu,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Provider::TensorRt => "TensorRT",
            Provider::Cuda => "CUDA",
            Provider::Cpu => "CPU",
        }
    }

    /// Tier to retry on when this one cannot build a session
    pub fn fallback(self) -> Option<Provider> {
        match self {
            Provider::TensorRt => Some(Provider::Cuda),
            Provider::Cuda => Some(Provider::Cpu),
            Provider::Cpu => None,
        }
    }

    /// Providers registered with the session, this tier and every tier below
    fn dispatch(self, device_id: i32) -> Vec<ExecutionProviderDispatch> {
        let mut providers = Vec::with_capacity(3);
        if self == Provider::TensorRt {
            providers.push(TensorRTExecutionProvider::default().with_device_id(device_id).build());
        }
        if self != Provider::Cpu {
            providers.push(CUDAExecutionProvider::default().with_device_id(device_id).build());
        }
        providers.push(CPUExecutionProvider::default().build());
        providers
    }
}

/// A loaded model. `Session::run` needs exclusive access, so each session
/// sits behind its own lock for the length of one inference.
pub struct OnnxModel {
    session: Mutex<Session>,
    provider: Provider,
}

impl OnnxModel {
    pub fn load(model_path: &Path, runtime: &RuntimeConfig) -> Result<Self> {
        let (session, provider) = create_session(model_path, runtime)?;
        Ok(Self {
            session: Mutex::new(session),
            provider,
        })
    }

    /// Execution provider the session ended up on
    pub fn provider(&self) -> &str {
        self.provider.label()
    }

    /// Run the model on one f32 tensor and return the first output found
    /// under `output_names`
    pub fn run(&self, input: Array<f32, IxDyn>, output_names: &[&str]) -> Result<Array<f32, IxDyn>> {
        let input_tensor = Value::from_array(input)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("Failed to lock ONNX session: {}", e))?;
        let outputs = session.run(ort::inputs![input_tensor])?;

        let output_value = output_names
            .iter()
            .find_map(|name| outputs.get(*name))
            .with_context(|| format!("No output tensor found (tried: {})", output_names.join(", ")))?;
        let (shape, data) = output_value.try_extract_tensor::<f32>()?;

        let shape_usize: Vec<usize> = shape.as_ref().iter().map(|&x| x as usize).collect();
        let output = Array::from_shape_vec(IxDyn(&shape_usize), data.to_vec())?;
        Ok(output)
    }
}

/// Create an ONNX session on the configured provider, stepping down
/// TensorRT -> CUDA -> CPU until one loads the model
pub fn create_session(model_path: &Path, runtime: &RuntimeConfig) -> Result<(Session, Provider)> {
    let mut provider = Provider::from_name(&runtime.execution_provider);
    loop {
        tracing::info!(
            model = %model_path.display(),
            provider = provider.label(),
            "Creating ONNX session"
        );
        match build_session(model_path, runtime, provider.dispatch(runtime.device_id)) {
            Ok(session) => return Ok((session, provider)),
            Err(e) => match provider.fallback() {
                Some(next) => {
                    tracing::warn!("{} failed, trying {}: {:#}", provider.label(), next.label(), e);
                    provider = next;
                }
                None => return Err(e),
            },
        }
    }
}

fn build_session(
    model_path: &Path,
    runtime: &RuntimeConfig,
    providers: Vec<ExecutionProviderDispatch>,
) -> Result<Session> {
    Session::builder()
        .context("Failed to create session builder")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(runtime.intra_threads)
        .context("Failed to set intra threads")?
        .with_inter_threads(runtime.inter_threads)
        .context("Failed to set inter threads")?
        .with_execution_providers(providers)
        .context("Failed to set execution providers")?
        .commit_from_file(model_path)
        .context("Failed to load model from file")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_invalid_model_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.onnx");
        std::fs::write(&path, b"not a protobuf").unwrap();

        let runtime = RuntimeConfig {
            execution_provider: "CPU".to_string(),
            ..RuntimeConfig::default()
        };
        assert!(OnnxModel::load(&path, &runtime).is_err());
    }

    #[test]
    fn test_provider_names_and_fallback_chain() {
        assert_eq!(Provider::from_name("tensorrt"), Provider::TensorRt);
        assert_eq!(Provider::from_name("CUDA"), Provider::Cuda);
        assert_eq!(Provider::from_name("cpu"), Provider::Cpu);
        assert_eq!(Provider::from_name("rocm"), Provider::Cpu);

        let mut chain = vec![Provider::TensorRt];
        while let Some(next) = chain.last().and_then(|p| p.fallback()) {
            chain.push(next);
        }
        let labels: Vec<&str> = chain.iter().map(|p| p.label()).collect();
        assert_eq!(labels, ["TensorRT", "CUDA", "CPU"]);
    }

    #[test]
    fn test_dispatch_registers_lower_tiers() {
        assert_eq!(Provider::TensorRt.dispatch(0).len(), 3);
        assert_eq!(Provider::Cuda.dispatch(0).len(), 2);
        assert_eq!(Provider::Cpu.dispatch(0).len(), 1);
    }
}
