//! The generative AI collaborator that can turn a single noun into an icon.

mod gemini;

pub use gemini::GeminiClient;

use async_trait::async_trait;

use crate::error::Result;

/// Decides whether text can be drawn, and draws it.
///
/// Both calls are single-shot request/response. Callers own the fallback
/// when either fails.
#[async_trait]
pub trait IconGenerator: Send + Sync {
    /// Is `text` a single depictable noun phrase?
    async fn classify(&self, text: &str) -> Result<bool>;

    /// An icon for `text`, as a `data:` URI.
    async fn generate_icon(&self, text: &str) -> Result<String>;
}
