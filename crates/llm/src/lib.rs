use std::time::Duration;

use serde_json::json;
use thiserror::Error;

/// Default chat-completions endpoint for KR rewriting.
pub const DEFAULT_API_URL: &str = "https://api.siliconflow.cn/v1/chat/completions";
/// Default model asked to do the rewriting.
pub const DEFAULT_MODEL: &str = "Pro/deepseek-ai/DeepSeek-V3";
/// Default bound on one rewrite round trip.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const DEFAULT_TEMPERATURE: f64 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 2000;

/// Connection settings for the rewrite endpoint.  Usually mapped from the
/// `[rewriter]` config section; the defaults here make a bare `Rewriter`
/// usable with just a key.
#[derive(Debug, Clone)]
pub struct RewriterSettings {
    pub api_url: String,
    /// Bearer credential.  Empty means not configured: rewriting is skipped
    /// with a warning instead of failing.
    pub api_key: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for RewriterSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Failure modes of one rewrite call.  None of them abort the enclosing
/// save: callers report the error and keep the original wording.
#[derive(Debug, Error)]
pub enum RewriteError {
    /// The endpoint rejected the credential (HTTP 401).  Reported
    /// distinctly so the user knows to fix the key rather than retry.
    #[error("rewrite credential rejected, check the configured API key")]
    Unauthorized,

    #[error("rewrite endpoint failed: {0}")]
    Transport(String),

    #[error("rewrite response carried no text")]
    EmptyResponse,
}

/// What one rewrite call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    /// Improved wording from the endpoint.
    Improved(String),
    /// No credential configured; the input stands.  A warning, not an
    /// error: the save flow proceeds with the original text.
    SkippedNoCredential,
}

/// Client for the optional KR rewriting call.
///
/// Stateless request/response: the prompt asks the model to tighten one key
/// result's wording along SMART lines and reply with the rewritten text
/// only.  Every failure path is recoverable and the call is bounded by
/// `settings.timeout`, so a slow endpoint can never wedge a save.
#[derive(Debug, Clone)]
pub struct Rewriter {
    client: reqwest::Client,
    settings: RewriterSettings,
}

impl Rewriter {
    pub fn new(settings: RewriterSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    pub fn has_credential(&self) -> bool {
        !self.settings.api_key.trim().is_empty()
    }

    /// Rewrite one key result's wording.  Returns the improved text, or
    /// [`Rewrite::SkippedNoCredential`] when no key is configured.
    pub async fn rewrite(&self, text: &str) -> Result<Rewrite, RewriteError> {
        if !self.has_credential() {
            return Ok(Rewrite::SkippedNoCredential);
        }

        let payload = json!({
            "model": self.settings.model,
            "messages": [
                {"role": "user", "content": build_prompt(text)}
            ],
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
        });

        let response = self
            .client
            .post(&self.settings.api_url)
            .bearer_auth(self.settings.api_key.trim())
            .timeout(self.settings.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|err| RewriteError::Transport(err.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(RewriteError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RewriteError::Transport(format!("{status}: {}", body.trim())));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|err| RewriteError::Transport(err.to_string()))?;
        match extract_content(&body) {
            Some(content) => {
                tracing::debug!(chars = content.len(), "key result rewritten");
                Ok(Rewrite::Improved(content))
            }
            None => Err(RewriteError::EmptyResponse),
        }
    }
}

/// Wrap a key result in the fixed rewrite instruction.
fn build_prompt(text: &str) -> String {
    format!(
        "作为OKR专家，请直接优化以下关键结果(KR)的描述，使其更符合SMART原则（具体、可衡量、可实现、相关性、时限性）。\n只需返回优化后的描述，不要包含任何分析或解释。如果原描述已经足够好，可以保持不变。\n\n原关键结果：\n{text}"
    )
}

/// Top choice's message text, trimmed.  `None` when the response shape is
/// missing or the text is blank.
fn extract_content(body: &serde_json::Value) -> Option<String> {
    let content = body
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(|content| content.as_str())?
        .trim();
    if content.is_empty() {
        return None;
    }
    Some(content.to_string())
}

// ── Tests ────────────────────────────────────────────────────────────────────
