use async_trait::async_trait;
use serde_json::Value;

use super::{GenerationError, TextGenerator, describe_ureq_error, run_blocking};
use crate::config::GenerationCredentials;

/// Chat-completions client for OpenAI-compatible endpoints.
#[derive(Clone)]
pub struct OpenAiGenerator {
    agent: ureq::Agent,
    credentials: GenerationCredentials,
}

impl OpenAiGenerator {
    pub fn new(agent: ureq::Agent, credentials: GenerationCredentials) -> Self {
        Self { agent, credentials }
    }

    fn complete_blocking(
        agent: &ureq::Agent,
        credentials: &GenerationCredentials,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, GenerationError> {
        let response: Value = agent
            .post(&credentials.api_url)
            .set("Authorization", &format!("Bearer {}", credentials.api_key))
            .send_json(request_body(&credentials.model, prompt, max_tokens))
            .map_err(|err| GenerationError::Request(describe_ureq_error(err)))?
            .into_json()
            .map_err(|err| GenerationError::InvalidResponse(err.to_string()))?;
        completion_text(&response)
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, GenerationError> {
        let agent = self.agent.clone();
        let credentials = self.credentials.clone();
        let prompt = prompt.to_string();
        run_blocking(
            move || Self::complete_blocking(&agent, &credentials, &prompt, max_tokens),
            GenerationError::Request,
        )
        .await
    }
}

fn request_body(model: &str, prompt: &str, max_tokens: u32) -> Value {
    serde_json::json!({
        "model": model,
        "messages": [
            {
                "role": "user",
                "content": prompt,
            },
        ],
        "max_tokens": max_tokens,
    })
}

fn completion_text(response: &Value) -> Result<String, GenerationError> {
    let content = response["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| {
            GenerationError::InvalidResponse(format!("no completion content in {response}"))
        })?;
    Ok(content.trim().to_string())
}
