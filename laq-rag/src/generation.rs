//! Text generation trait used for extraction and chat.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Sampling parameters for a single generation call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Upper bound on generated tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

impl GenerationOptions {
    /// Options with only the temperature set.
    pub fn with_temperature(temperature: f32) -> Self {
        Self { temperature: Some(temperature), ..Self::default() }
    }
}

/// A text-completion backend.
///
/// Implementations block until the full completion is available; the
/// pipeline never streams.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete `prompt` and return the generated text.
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;
}
