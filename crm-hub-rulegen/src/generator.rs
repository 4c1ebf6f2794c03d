//! Rule generator clients and the validate-after-generate entry point

use async_trait::async_trait;
use crm_hub_core::RuleSet;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::RuleGenError;

/// Longest prompt forwarded upstream
pub const MAX_PROMPT_CHARS: usize = 2000;

/// Source of rule candidates for a free-text prompt
#[async_trait]
pub trait RuleGenerator: Send + Sync {
    /// Return the raw candidate; callers must validate it
    async fn generate(&self, prompt: &str) -> Result<serde_json::Value, RuleGenError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    rules: serde_json::Value,
}

/// Calls an HTTP service that answers `{prompt}` with `{rules}`
pub struct HttpRuleGenerator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRuleGenerator {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, RuleGenError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RuleGenError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl RuleGenerator for HttpRuleGenerator {
    async fn generate(&self, prompt: &str) -> Result<serde_json::Value, RuleGenError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest { prompt })
            .send()
            .await
            .map_err(|e| {
                RuleGenError::Unavailable(format!("Request to {} failed: {}", self.endpoint, e))
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RuleGenError::Unavailable(format!(
                "{} answered with status {}",
                self.endpoint, status
            )));
        }

        let body: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| RuleGenError::Unavailable(format!("Malformed response: {}", e)))?;

        Ok(body.rules)
    }
}

/// Used when no generation service is configured
#[derive(Debug, Default)]
pub struct DisabledRuleGenerator;

#[async_trait]
impl RuleGenerator for DisabledRuleGenerator {
    async fn generate(&self, _prompt: &str) -> Result<serde_json::Value, RuleGenError> {
        Err(RuleGenError::Unavailable(
            "no rule generation service configured (set RULEGEN_URL)".to_string(),
        ))
    }
}

/// Check the prompt, ask the generator, and validate what comes back
pub async fn generate_rules(
    generator: &dyn RuleGenerator,
    prompt: &str,
) -> Result<RuleSet, RuleGenError> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(RuleGenError::InvalidPrompt("prompt is required".to_string()));
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(RuleGenError::InvalidPrompt(format!(
            "prompt exceeds {} characters",
            MAX_PROMPT_CHARS
        )));
    }

    let candidate = generator.generate(prompt).await?;
    let rules = RuleSet::from_json(&candidate).map_err(|e| {
        tracing::warn!("Generator returned unusable rules {}: {}", candidate, e);
        RuleGenError::from(e)
    })?;

    tracing::info!("Generated rules [{}] for prompt '{}'", rules.describe(), prompt);
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FixedGenerator {
        output: Value,
        calls: AtomicUsize,
    }

    impl FixedGenerator {
        fn new(output: Value) -> Self {
            Self {
                output,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RuleGenerator for FixedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<Value, RuleGenError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.output.clone())
        }
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_valid_candidate_accepted() {
        let generator =
            FixedGenerator::new(json!({ "totalSpend": { "gt": 5000 }, "visits": { "lt": 3 } }));
        let rules = generate_rules(&generator, "big spenders who rarely visit").await.unwrap();
        assert_eq!(rules.describe(), "Total Spend > 5000 AND Number of Visits < 3");
    }

    #[tokio::test]
    async fn test_untrusted_candidate_validated() {
        for output in [
            json!({}),
            json!(null),
            json!({ "age": { "gt": 30 } }),
            json!({ "visits": { "gt": "often" } }),
        ] {
            let generator = FixedGenerator::new(output);
            let err = generate_rules(&generator, "anything").await.unwrap_err();
            assert!(matches!(err, RuleGenError::InvalidRules(_)), "{:?}", err);
        }
    }

    #[tokio::test]
    async fn test_blank_prompt_never_reaches_generator() {
        let generator = FixedGenerator::new(json!({ "visits": { "gt": 1 } }));
        let err = generate_rules(&generator, "   ").await.unwrap_err();
        assert!(matches!(err, RuleGenError::InvalidPrompt(_)));

        let long = "x".repeat(MAX_PROMPT_CHARS + 1);
        assert!(matches!(
            generate_rules(&generator, &long).await,
            Err(RuleGenError::InvalidPrompt(_))
        ));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disabled_generator_is_unavailable() {
        let err = generate_rules(&DisabledRuleGenerator, "vip").await.unwrap_err();
        assert!(matches!(err, RuleGenError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_http_generator_round_trip() {
        let seen = Arc::new(std::sync::Mutex::new(String::new()));
        let seen_in_handler = seen.clone();
        let app = Router::new().route(
            "/generate-rules",
            post(move |Json(body): Json<Value>| {
                let seen = seen_in_handler.clone();
                async move {
                    *seen.lock().unwrap() = body["prompt"].as_str().unwrap_or_default().to_string();
                    Json(json!({ "rules": { "visits": { "gte": 10 } } }))
                }
            }),
        );
        let base = serve(app).await;

        let generator =
            HttpRuleGenerator::new(format!("{}/generate-rules", base), Duration::from_secs(5))
                .unwrap();
        let rules = generate_rules(&generator, "  loyal regulars ").await.unwrap();

        assert_eq!(rules.describe(), "Number of Visits >= 10");
        assert_eq!(*seen.lock().unwrap(), "loyal regulars");
    }

    #[tokio::test]
    async fn test_http_generator_upstream_error() {
        let app = Router::new().route(
            "/generate-rules",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model overloaded") }),
        );
        let base = serve(app).await;

        let generator =
            HttpRuleGenerator::new(format!("{}/generate-rules", base), Duration::from_secs(5))
                .unwrap();
        let err = generator.generate("vip").await.unwrap_err();
        assert!(matches!(err, RuleGenError::Unavailable(msg) if msg.contains("500")));
    }

    #[tokio::test]
    async fn test_http_generator_unreachable() {
        // Bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{}/generate-rules", addr);
        let generator = HttpRuleGenerator::new(url, Duration::from_secs(2)).unwrap();
        assert!(matches!(
            generator.generate("vip").await,
            Err(RuleGenError::Unavailable(_))
        ));
    }
}
