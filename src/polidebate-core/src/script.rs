//! Turning an analysis into a Carnegie and Mellon dialogue, and back into lines.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tracing::info;

use crate::completion::{ChatMessage, CompletionClient};
use crate::debate::DebateAnalysis;
use crate::error::PolidebateError;
use crate::persona::{Persona, Side};

const PERSONA_PROMPT: &str = "You are a news content creator who likes to present information on how two sides of the political spectrum view a topic in the world. There are two sides, Carnegie and Mellon where Mellon represents a conservative side and Carnegie represents the liberal side. Create a transcript that mimics a conversation between Carnegie and Mellon debating this topic from the file inputted in the previous step. Make the points snappy and short, easy to digest for general audiences.";

/// Writes a dialogue script from a debate analysis.
pub struct ScriptWriter {
    client: Arc<dyn CompletionClient>,
    temperature: f32,
}

impl ScriptWriter {
    pub fn new(client: Arc<dyn CompletionClient>, temperature: f32) -> Self {
        Self {
            client,
            temperature,
        }
    }

    pub async fn write_script(&self, analysis: &DebateAnalysis) -> Result<String, PolidebateError> {
        info!(topic = %analysis.topic, "generating debate script");
        let messages = [
            ChatMessage::system(PERSONA_PROMPT),
            ChatMessage::user(script_prompt(analysis)),
        ];
        let script = self.client.complete(&messages, self.temperature).await?;

        if script.trim().is_empty() {
            return Err(PolidebateError::Script("model returned an empty script".to_string()));
        }
        Ok(script)
    }
}

fn script_prompt(analysis: &DebateAnalysis) -> String {
    let topic = if analysis.topic.trim().is_empty() {
        "political topic"
    } else {
        analysis.topic.as_str()
    };
    let bullets = |side: Side| {
        analysis
            .arguments(side)
            .iter()
            .map(|a| format!("- {}", a))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "{PERSONA_PROMPT}

Topic: {topic}

Liberal (Carnegie) Arguments:
{liberal}

Conservative (Mellon) Arguments:
{conservative}

Create a natural, engaging conversation transcript between Carnegie and Mellon. Format it clearly with speaker labels. Make it conversational, with back-and-forth exchanges. Keep each point concise and easy to understand.",
        liberal = bullets(Side::Liberal),
        conservative = bullets(Side::Conservative),
    )
}

/// One spoken turn of the script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptLine {
    pub speaker: Persona,
    pub text: String,
}

fn speaker_label() -> Option<&'static Regex> {
    static LABEL: OnceLock<Option<Regex>> = OnceLock::new();
    LABEL
        .get_or_init(|| {
            Regex::new(r"(?i)^\*{0,2}(carnegie|mellon)(?::\*\*|\*\*:|:)\s*(.*)$").ok()
        })
        .as_ref()
}

/// Split a script into speaker turns.
///
/// A line starting with `**Carnegie:**`, `**Carnegie**:` or `Carnegie:` (any
/// case, same for Mellon) opens a turn; following lines are joined into it
/// with `**` removed. Text before the first label and turns with no text are
/// dropped.
pub fn parse_script(text: &str) -> Vec<ScriptLine> {
    let Some(label) = speaker_label() else {
        return Vec::new();
    };

    let mut lines = Vec::new();
    let mut current: Option<(Persona, Vec<String>)> = None;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let opened = label.captures(line).and_then(|caps| {
            let speaker = Persona::from_name(caps.get(1)?.as_str())?;
            let first = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
            Some((speaker, first.to_string()))
        });

        if let Some((speaker, first)) = opened {
            flush(&mut lines, current.take());
            let parts = if first.is_empty() { Vec::new() } else { vec![first] };
            current = Some((speaker, parts));
        } else if let Some((_, parts)) = current.as_mut() {
            let clean = line.replace("**", "");
            let clean = clean.trim();
            if !clean.is_empty() {
                parts.push(clean.to_string());
            }
        }
    }
    flush(&mut lines, current);

    lines
}

fn flush(lines: &mut Vec<ScriptLine>, turn: Option<(Persona, Vec<String>)>) {
    if let Some((speaker, parts)) = turn.filter(|(_, parts)| !parts.is_empty()) {
        lines.push(ScriptLine {
            speaker,
            text: parts.join(" "),
        });
    }
}
