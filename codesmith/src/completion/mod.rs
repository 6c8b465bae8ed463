//! Text completion provider used to generate code.
//!
//! The provider is hidden behind [`CompletionProvider`] so the generation workflow can be
//! exercised against a mock in tests.

pub mod gemini;

use crate::billing::cost::Complexity;
use thiserror::Error;

pub use gemini::GeminiProvider;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("no completion API key is configured")]
    MissingApiKey,

    #[error("completion request timed out")]
    Timeout,

    #[error("completion provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("completion provider returned no text")]
    EmptyResponse,

    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// One prompt sent to the provider
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub prompt: String,
}

#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Model identifier recorded alongside each generation
    fn model(&self) -> &str;

    /// Returns the generated text, never empty on success
    async fn complete(&self, api_key: &str, request: &CompletionRequest) -> Result<String, CompletionError>;
}

/// Options that shape the system instruction
#[derive(Debug, Clone, Copy)]
pub struct PromptOptions<'a> {
    pub language: &'a str,
    pub framework: Option<&'a str>,
    pub complexity: Complexity,
    pub include_tests: bool,
    pub include_comments: bool,
}

pub fn build_system_prompt(options: &PromptOptions<'_>) -> String {
    let mut prompt = format!(
        "You are an expert software engineer. Write {} {} code",
        options.complexity,
        options.language.trim()
    );
    if let Some(framework) = options.framework.map(str::trim).filter(|f| !f.is_empty()) {
        prompt.push_str(&format!(" using the {framework} framework"));
    }
    prompt.push_str(" that fulfils the user's request.\n");

    prompt.push_str(match options.complexity {
        Complexity::Simple => "Keep the solution short and direct.\n",
        Complexity::Intermediate => "Structure the solution into small functions and handle common errors.\n",
        Complexity::Advanced => "Produce production-quality code with thorough error handling and clear module boundaries.\n",
    });
    if options.include_comments {
        prompt.push_str("Explain non-obvious parts of the code with comments.\n");
    } else {
        prompt.push_str("Do not add comments.\n");
    }
    if options.include_tests {
        prompt.push_str("Include unit tests for the main functionality.\n");
    }
    prompt.push_str("Respond with a single fenced code block and nothing else.");
    prompt
}

/// Strip a surrounding markdown code fence, if present.
///
/// Only the first fenced block is kept; text without fences is returned trimmed.
pub fn extract_code(text: &str) -> String {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed.to_string();
    };

    // Skip the opening fence line, including any language tag
    let after_fence = &trimmed[start + 3..];
    let body = match after_fence.find('\n') {
        Some(newline) => &after_fence[newline + 1..],
        None => return trimmed.to_string(),
    };
    let body = match body.find("```") {
        Some(end) => &body[..end],
        None => body,
    };

    let code = body.trim_end();
    if code.trim().is_empty() {
        trimmed.to_string()
    } else {
        code.to_string()
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    /// Provider double returning a canned reply and recording calls
    pub struct MockProvider {
        reply: Option<String>,
        calls: AtomicUsize,
        last_request: Mutex<Option<(String, CompletionRequest)>>,
    }

    impl MockProvider {
        pub fn returning(text: impl Into<String>) -> Self {
            Self {
                reply: Some(text.into()),
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            }
        }

        pub fn failing() -> Self {
            Self {
                reply: None,
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// API key and request of the most recent call
        pub fn last_request(&self) -> Option<(String, CompletionRequest)> {
            self.last_request.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl CompletionProvider for MockProvider {
        fn model(&self) -> &str {
            "mock-model"
        }

        async fn complete(&self, api_key: &str, request: &CompletionRequest) -> Result<String, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some((api_key.to_string(), request.clone()));
            match &self.reply {
                Some(text) if !text.trim().is_empty() => Ok(text.clone()),
                Some(_) => Err(CompletionError::EmptyResponse),
                None => Err(CompletionError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_code_strips_fence_and_language_tag() {
        let text = "Here you go:\n```python\nprint('hi')\n```\nEnjoy!";
        assert_eq!(extract_code(text), "print('hi')");
    }

    #[test]
    fn test_extract_code_without_fence() {
        assert_eq!(extract_code("  let x = 1;\n"), "let x = 1;");
    }

    #[test]
    fn test_extract_code_unterminated_fence() {
        assert_eq!(extract_code("```rust\nfn main() {}\n"), "fn main() {}");
    }

    #[test]
    fn test_extract_code_keeps_first_block_only() {
        let text = "```js\nconst a = 1;\n```\n```js\nconst b = 2;\n```";
        assert_eq!(extract_code(text), "const a = 1;");
    }

    #[test]
    fn test_system_prompt_reflects_options() {
        let prompt = build_system_prompt(&PromptOptions {
            language: "rust",
            framework: Some("axum"),
            complexity: Complexity::Advanced,
            include_tests: true,
            include_comments: false,
        });
        assert!(prompt.contains("advanced rust code using the axum framework"));
        assert!(prompt.contains("unit tests"));
        assert!(prompt.contains("Do not add comments"));

        let prompt = build_system_prompt(&PromptOptions {
            language: "go",
            framework: Some(" "),
            complexity: Complexity::Simple,
            include_tests: false,
            include_comments: true,
        });
        assert!(!prompt.contains("framework"));
        assert!(!prompt.contains("unit tests"));
        assert!(prompt.contains("comments"));
    }
}
