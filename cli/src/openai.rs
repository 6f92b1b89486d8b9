//! OpenAI-compatible chat-completions backend for the core `Generator` trait.
//!
//! Each configured model becomes one backend. The backends share an HTTP client and a
//! current-thread runtime; calls block until the response arrives.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use daybook_core::error::Error;
use daybook_core::generator::{DecodeMode, Generator};

use crate::config::LlmSettings;

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiGenerator {
    model: String,
    endpoint: String,
    api_key: String,
    temperature: f64,
    http: reqwest::Client,
    runtime: Arc<tokio::runtime::Runtime>,
}

/// Build one backend per model in `settings.models`, in order.
pub fn backends(settings: &LlmSettings, api_key: &str) -> Result<Vec<Box<dyn Generator>>> {
    let runtime = Arc::new(
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to build tokio runtime")?,
    );
    let http = reqwest::Client::builder()
        .user_agent(format!("daybook/{}", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")?;
    let endpoint = format!(
        "{}/chat/completions",
        settings.base_url.trim_end_matches('/')
    );

    Ok(settings
        .models
        .iter()
        .map(|model| {
            Box::new(OpenAiGenerator {
                model: model.clone(),
                endpoint: endpoint.clone(),
                api_key: api_key.to_string(),
                temperature: settings.temperature,
                http: http.clone(),
                runtime: Arc::clone(&runtime),
            }) as Box<dyn Generator>
        })
        .collect())
}

fn request_body(
    model: &str,
    temperature: f64,
    system: &str,
    user: &str,
    mode: DecodeMode,
) -> Value {
    let mut body = json!({
        "model": model,
        "temperature": temperature,
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": user},
        ],
    });
    if mode == DecodeMode::Structured {
        body["response_format"] = json!({"type": "json_object"});
    }
    body
}

/// The first choice's message text. A missing or null message comes back empty and is left to
/// the decode step.
fn message_text(body: &str) -> serde_json::Result<String> {
    let response: ChatResponse = serde_json::from_str(body)?;
    Ok(response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default())
}

impl OpenAiGenerator {
    fn unavailable(&self, message: String) -> Error {
        Error::GeneratorUnavailable {
            backend: self.model.clone(),
            message,
        }
    }

    async fn generate_async(
        &self,
        system: &str,
        user: &str,
        mode: DecodeMode,
    ) -> Result<String, Error> {
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request_body(&self.model, self.temperature, system, user, mode))
            .send()
            .await
            .map_err(|e| self.unavailable(format!("request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| self.unavailable(format!("failed to read response body: {e}")))?;
        if !status.is_success() {
            return Err(self.unavailable(format!("HTTP {}: {}", status.as_u16(), body.trim())));
        }

        debug!(model = %self.model, %mode, bytes = body.len(), "chat completion received");
        message_text(&body).map_err(|e| self.unavailable(format!("unreadable response: {e}")))
    }
}

impl Generator for OpenAiGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    fn generate(&self, system: &str, user: &str, mode: DecodeMode) -> daybook_core::Result<String> {
        self.runtime.block_on(self.generate_async(system, user, mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_mode_requests_json_object() {
        let body = request_body("gpt-4o-mini", 0.1, "sys", "entry", DecodeMode::Structured);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "entry");

        let body = request_body("gpt-4o-mini", 0.1, "sys", "entry", DecodeMode::Freeform);
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_message_text() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"gym\":true}"}}]}"#;
        assert_eq!(message_text(body).unwrap(), r#"{"gym":true}"#);
        assert_eq!(message_text(r#"{"choices":[]}"#).unwrap(), "");
        assert_eq!(
            message_text(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap(),
            ""
        );
        assert!(message_text("<html>bad gateway</html>").is_err());
    }

    #[test]
    fn test_one_backend_per_model() {
        let settings = LlmSettings::default();
        let backends = backends(&settings, "sk-test").unwrap();
        let names: Vec<_> = backends.iter().map(|b| b.name().to_string()).collect();
        assert_eq!(names, settings.models);
    }

    #[test]
    fn test_unreachable_endpoint_is_unavailable() {
        let settings = LlmSettings {
            base_url: "http://127.0.0.1:9".to_string(),
            models: vec!["m".to_string()],
            timeout_secs: 2,
            ..LlmSettings::default()
        };
        let backends = backends(&settings, "sk-test").unwrap();
        let err = backends[0]
            .generate("sys", "user", DecodeMode::Freeform)
            .unwrap_err();
        assert!(matches!(err, Error::GeneratorUnavailable { .. }));
    }

    #[test]
    #[ignore = "calls the OpenAI API; needs OPENAI_API_KEY"]
    fn test_live_structured_completion() {
        let key = std::env::var("OPENAI_API_KEY").unwrap();
        let backends = backends(&LlmSettings::default(), &key).unwrap();
        let text = backends[0]
            .generate(
                "Reply with a JSON object.",
                r#"Return {"ok": true}"#,
                DecodeMode::Structured,
            )
            .unwrap();
        assert!(text.contains("ok"));
    }
}
