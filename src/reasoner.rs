// src/reasoner.rs
//
// Text-generation capability for violation explanations. The pipeline only
// depends on the `Explainer` trait; the Ollama-backed client below is the
// production implementation.

use crate::error::AuditError;
use crate::types::{ReasonerConfig, ViolationKind};
use crate::violations::SafetyContext;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

#[async_trait]
pub trait Explainer: Send + Sync {
    /// Explains one aggregated violation kind given how often it occurred.
    async fn explain_violation(
        &self,
        kind: ViolationKind,
        occurrences: usize,
    ) -> Result<String, AuditError>;

    /// Explains a single frame or image given detected vs. missing PPE.
    async fn explain_context(&self, context: &SafetyContext) -> Result<String, AuditError>;
}

// ============================================================================
// OLLAMA CLIENT
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct OllamaExplainer {
    base_url: String,
    model: String,
    temperature: f32,
    http_client: reqwest::Client,
}

impl OllamaExplainer {
    pub fn new(config: &ReasonerConfig) -> Result<Self, AuditError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AuditError::ExplanationUnavailable(e.to_string()))?;

        info!(
            "✓ Reasoner client ready: {} ({})",
            config.base_url, config.model
        );

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            http_client,
        })
    }

    async fn generate(&self, prompt: String) -> Result<String, AuditError> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        let resp = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AuditError::ExplanationUnavailable(format!("connection error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!("Reasoner server error {}: {}", status, body);
            return Err(AuditError::ExplanationUnavailable(format!(
                "HTTP {status}: {body}"
            )));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| AuditError::ExplanationUnavailable(format!("parse error: {e}")))?;

        Ok(parsed.response.trim().to_string())
    }
}

#[async_trait]
impl Explainer for OllamaExplainer {
    async fn explain_violation(
        &self,
        kind: ViolationKind,
        occurrences: usize,
    ) -> Result<String, AuditError> {
        let prompt = aggregated_prompt(kind, occurrences);
        self.generate(prompt).await
    }

    async fn explain_context(&self, context: &SafetyContext) -> Result<String, AuditError> {
        let prompt = context_prompt(context);
        self.generate(prompt).await
    }
}

// ============================================================================
// PROMPTS
// ============================================================================

fn aggregated_prompt(kind: ViolationKind, occurrences: usize) -> String {
    format!(
        "You are a workplace safety assistant.\n\
         \n\
         Violation detected: {}\n\
         Occurrences across frames: {}\n\
         \n\
         Rules:\n\
         - Explain the safety risk clearly\n\
         - Explain what should be done immediately\n\
         - Do NOT mention punishment or law\n\
         - Be precise and professional\n",
        kind.label(),
        occurrences
    )
}

fn context_prompt(context: &SafetyContext) -> String {
    let detected = if context.detected_ppe.is_empty() {
        "None".to_string()
    } else {
        format!("- {}", context.detected_ppe.join("\n- "))
    };
    let missing = if context.missing_ppe.is_empty() {
        "None".to_string()
    } else {
        format!("- {}", context.missing_ppe.join("\n- "))
    };

    format!(
        "You are a workplace safety assistant.\n\
         \n\
         A worker has been detected at a worksite.\n\
         \n\
         Detected PPE:\n\
         {detected}\n\
         \n\
         Missing PPE:\n\
         {missing}\n\
         \n\
         Rules:\n\
         - Acknowledge PPE that is correctly worn\n\
         - Explain risks ONLY for missing PPE\n\
         - Do NOT invent violations\n\
         - Do NOT mention punishment, law, or compliance codes\n\
         - Be concise, clear, and professional\n\
         \n\
         Provide:\n\
         1. Safety compliance summary\n\
         2. Why missing PPE is a safety risk\n\
         3. What should be done immediately\n"
    )
}
