//! The content provider port.
//!
//! The generator talks to a generative model only through this trait, so the
//! loop can run against the OpenAI-compatible adapter in production and a
//! scripted provider in tests.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::prompt::PromptPayload;

/// A black-box source of structured lesson text.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Runs one whole-lesson request and returns the raw response text.
    ///
    /// The text is expected to be a JSON lesson object; the generator treats
    /// anything else as a parse failure.
    async fn generate_content(&self, payload: &PromptPayload) -> Result<String, ProviderError>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "provider"
    }
}
