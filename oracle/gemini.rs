/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Gemini `generateContent` client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{OracleError, Suggestion, SuggestionOracle};

/// Gemini-backed oracle over the REST API.
pub struct GeminiOracle {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl GeminiOracle {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| OracleError::Setup(error.to_string()))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    async fn generate(&self, body: Value) -> Result<String, OracleError> {
        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|error| OracleError::Network(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::HttpStatus(status.as_u16()));
        }
        let payload: GenerateContentResponse = response
            .json()
            .await
            .map_err(|error| OracleError::Malformed(error.to_string()))?;
        payload.text().ok_or(OracleError::EmptyResponse)
    }
}

#[async_trait]
impl SuggestionOracle for GeminiOracle {
    async fn expand(
        &self,
        content: &str,
        existing: &[String],
    ) -> Result<Vec<Suggestion>, OracleError> {
        let text = self.generate(expand_request_body(content, existing)).await?;
        parse_expansion(&text)
    }

    async fn suggest_label(&self, from: &str, to: &str) -> Result<String, OracleError> {
        let text = self.generate(label_request_body(from, to)).await?;
        Ok(text.trim().to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate, if there are any.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        (!text.is_empty()).then_some(text)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExpansionPayload {
    nodes: Vec<Suggestion>,
}

/// Decode the JSON-mode answer of an expansion request.
fn parse_expansion(text: &str) -> Result<Vec<Suggestion>, OracleError> {
    serde_json::from_str::<ExpansionPayload>(text)
        .map(|payload| payload.nodes)
        .map_err(|error| OracleError::Malformed(error.to_string()))
}

fn expand_request_body(content: &str, existing: &[String]) -> Value {
    let prompt = format!(
        "You are a helpful visual thinking assistant.\n\
         The user has a thought: \"{content}\".\n\
         Generate 3 to 5 distinctly related sub-concepts or follow-up questions to expand this thought map.\n\
         Keep the content concise (under 6 words).\n\
         Avoid duplicates from this list: {}.",
        existing.join(", ")
    );
    json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "nodes": {
                        "type": "ARRAY",
                        "items": {
                            "type": "OBJECT",
                            "properties": {
                                "content": { "type": "STRING" },
                                "type": { "type": "STRING", "enum": ["concept"] }
                            },
                            "required": ["content", "type"]
                        }
                    }
                },
                "required": ["nodes"]
            }
        }
    })
}

fn label_request_body(from: &str, to: &str) -> Value {
    let prompt = format!(
        "What is a short, logical linking verb or phrase (max 3 words) that connects \"{from}\" to \"{to}\"? \
         e.g., \"causes\", \"leads to\", \"requires\". Return only the phrase."
    );
    json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "thinkingConfig": { "thinkingBudget": 0 }
        }
    })
}
