/*!
 * Provider implementations for the external text-generation service.
 *
 * This module contains the client seam the pipeline talks through:
 * - Gemini: Google Gemini generateContent API
 * - Mock: scriptable in-memory generator for tests
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::ProviderError;

/// A single text-generation request.
///
/// The pipeline always asks for a JSON response; the concrete provider is
/// responsible for wiring that through its API surface.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Model identifier
    pub model: String,

    /// System instruction guiding the generation
    pub system_prompt: String,

    /// User payload
    pub prompt: String,

    /// Sampling temperature
    pub temperature: f32,
}

impl GenerationRequest {
    /// Create a new generation request
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: String::new(),
            prompt: prompt.into(),
            temperature: 0.1,
        }
    }

    /// Set the system instruction
    pub fn system(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Common trait for text generators
///
/// This is the seam between the pipeline and the external service: given a
/// prompt and a payload it returns text (ideally JSON) or fails. The
/// orchestrator and call wrapper are written against this trait so tests can
/// substitute a scripted mock.
#[async_trait]
pub trait TextGenerator: Send + Sync + Debug {
    /// Complete a request, returning the generated text
    async fn generate(&self, request: GenerationRequest) -> Result<String, ProviderError>;
}

pub mod gemini;
pub mod mock;
