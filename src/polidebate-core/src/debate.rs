//! Two-sided analysis of a political topic.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::completion::{ChatMessage, CompletionClient};
use crate::error::PolidebateError;
use crate::persona::Side;
use crate::protocol::decode_json;

/// One side of the debate as returned by the analyst.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebateSide {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Liberal and conservative positions on a topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebateAnalysis {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub sides: Vec<DebateSide>,
}

impl DebateAnalysis {
    /// First side whose label mentions `side`, ignoring case.
    pub fn side(&self, side: Side) -> Option<&DebateSide> {
        self.sides
            .iter()
            .find(|s| s.label.to_lowercase().contains(side.label()))
    }

    pub fn liberal(&self) -> Option<&DebateSide> {
        self.side(Side::Liberal)
    }

    pub fn conservative(&self) -> Option<&DebateSide> {
        self.side(Side::Conservative)
    }

    /// Arguments for `side`, empty if the side is missing.
    pub fn arguments(&self, side: Side) -> &[String] {
        self.side(side).map(|s| s.arguments.as_slice()).unwrap_or(&[])
    }

    /// Sources of both sides, liberal first.
    pub fn sources(&self) -> Vec<&str> {
        [self.liberal(), self.conservative()]
            .into_iter()
            .flatten()
            .flat_map(|s| s.sources.iter().map(String::as_str))
            .collect()
    }
}

/// Asks a search-backed model for both sides of a topic.
pub struct DebateAnalyst {
    client: Arc<dyn CompletionClient>,
    temperature: f32,
}

impl DebateAnalyst {
    pub fn new(client: Arc<dyn CompletionClient>, temperature: f32) -> Self {
        Self {
            client,
            temperature,
        }
    }

    /// Analyze `topic`. A blank topic is rejected before any call is made.
    pub async fn analyze(&self, topic: &str) -> Result<DebateAnalysis, PolidebateError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(PolidebateError::Config("Topic is required".to_string()));
        }

        info!(topic = %topic, "analyzing topic");
        let reply = self
            .client
            .complete(&[ChatMessage::user(analysis_prompt(topic))], self.temperature)
            .await?;

        let mut analysis: DebateAnalysis = serde_json::from_value(decode_json(&reply)?)?;
        if analysis.topic.trim().is_empty() {
            analysis.topic = topic.to_string();
        }
        info!(sides = analysis.sides.len(), "analysis complete");
        Ok(analysis)
    }
}

fn analysis_prompt(topic: &str) -> String {
    format!(
        r#"Explain the current debate between liberals and conservatives on the topic: "{topic}". Don't be afraid to be opinionated.
Return **only valid JSON** describing both sides of the issue, with explicit stance labels. Use this schema exactly:
{{
"topic": "{topic}",
"sides": [
    {{
    "id": "A",
    "label": "liberal",
    "arguments": ["arguments for a liberal side", ...],
    "sources": ["url1", "url2", ...]
    }},
    {{
    "id": "B",
    "label": "conservative",
    "arguments": ["arguments for a conservative side", ...],
    "sources": ["url1", "url2", ...]
    }}
]
}}
Make sure all arguments are concise and supported by citations from RECENT sources."#
    )
}
