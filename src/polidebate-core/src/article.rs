//! News articles as returned by the news API.
//!
//! Only a handful of fields are interpreted; everything else the API sends is
//! kept in `extra` and written back out untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Publisher of an article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A single news article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source: Option<Source>,
    #[serde(default, rename = "publishedAt")]
    pub published_at: Option<String>,
    /// Passthrough fields not interpreted by this crate.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Article {
    /// Create an article with just a title and description.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            description: Some(description.into()),
            ..Self::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Title for prompts and display.
    pub fn display_title(&self) -> &str {
        non_empty(&self.title).unwrap_or("No title")
    }

    /// Description for prompts; "No description" when absent.
    pub fn display_description(&self) -> &str {
        non_empty(&self.description).unwrap_or("No description")
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source.as_ref().and_then(|s| s.name.as_deref())
    }

    /// Format for the category generator: title plus the first 500 characters
    /// of the content, or of the description when there is no content.
    pub fn format_for_categorization(&self) -> String {
        let body = non_empty(&self.content)
            .or_else(|| non_empty(&self.description))
            .unwrap_or("");
        format!(
            "Title: {}\nDescription: {}",
            self.display_title(),
            truncate_chars(body, 500)
        )
    }

    /// Numbered block used by the assignment-style prompts.
    pub(crate) fn prompt_entry(&self, number: usize, description_chars: usize) -> String {
        format!(
            "Article {}:\nTitle: {}\nDescription: {}",
            number,
            self.display_title(),
            truncate_chars(self.display_description(), description_chars)
        )
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
