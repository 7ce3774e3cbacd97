//! Trait definitions for external interactions
//!
//! These traits define the boundaries between domain logic and infrastructure.
//! Infrastructure implementations live in other crates.

/// Trait for the inference backend that executes prompts
///
/// Implemented by the infrastructure layer (papelada-llm). The returned text
/// is free-form and untrusted; callers parse and validate it.
pub trait InferenceBackend {
    /// Error type for backend operations
    type Error;

    /// Execute a rendered prompt and return the raw response text
    fn infer(&self, prompt: &str) -> Result<String, Self::Error>;

    /// Model or backend identifier, for logs
    fn model_name(&self) -> &str {
        "backend"
    }
}
