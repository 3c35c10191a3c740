//! Dynamic categorization of news articles.
//!
//! Categories are generated from the articles themselves, articles are
//! assigned in batches, weak categories are dropped and their articles given
//! a second chance, and the survivors are renamed to match what they hold.
//! Every model call sits behind a local fallback so a bad reply degrades the
//! result instead of aborting the run.

mod assign;
mod generate;
mod pipeline;
mod prefilter;
mod recollect;
mod rename;
mod validate;

pub use assign::AssignmentReport;
pub use generate::FALLBACK_CATEGORIES;
pub use pipeline::CategorizationReport;
pub use prefilter::PrefilterOutcome;
pub use recollect::RecollectionReport;

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::article::Article;
use crate::completion::{ChatMessage, CompletionClient};
use crate::config::CategorizerConfig;
use crate::error::PolidebateError;
use crate::protocol::decode_json;

/// A named group of articles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    pub name: String,
    pub articles: Vec<Article>,
}

/// Category name to articles, with unique names and stable insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CategorizedArticles {
    categories: Vec<Category>,
}

impl CategorizedArticles {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty category for every distinct name, in order.
    pub fn with_categories<S: AsRef<str>>(names: &[S]) -> Self {
        let mut mapping = Self::new();
        for name in names {
            mapping.insert(name.as_ref(), Vec::new());
        }
        mapping
    }

    /// Add articles under `name`, appending to an existing category of that name.
    pub fn insert(&mut self, name: impl Into<String>, articles: Vec<Article>) {
        let name = name.into();
        match self.get_mut(&name) {
            Some(existing) => existing.extend(articles),
            None => self.categories.push(Category { name, articles }),
        }
    }

    /// Append one article to an existing category. Returns false if unknown.
    pub fn push(&mut self, name: &str, article: Article) -> bool {
        match self.get_mut(name) {
            Some(articles) => {
                articles.push(article);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&[Article]> {
        self.categories
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.articles.as_slice())
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Vec<Article>> {
        self.categories
            .iter_mut()
            .find(|c| c.name == name)
            .map(|c| &mut c.articles)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.categories.iter().any(|c| c.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Total number of articles across all categories.
    pub fn article_count(&self) -> usize {
        self.categories.iter().map(|c| c.articles.len()).sum()
    }

    /// Relabel categories. Names missing from `renames` (or mapped to a blank
    /// name) are kept; categories that end up with the same name are merged.
    pub fn renamed(&self, renames: &HashMap<String, String>) -> (Self, Vec<(String, String)>) {
        let mut result = Self::new();
        let mut applied = Vec::new();
        for category in &self.categories {
            let new_name = renames
                .get(&category.name)
                .map(|n| n.trim())
                .filter(|n| !n.is_empty())
                .unwrap_or(category.name.as_str())
                .to_string();
            if new_name != category.name {
                applied.push((category.name.clone(), new_name.clone()));
            }
            if result.contains(&new_name) {
                tracing::warn!(category = %new_name, "rename collision, merging categories");
            }
            result.insert(new_name, category.articles.clone());
        }
        (result, applied)
    }
}

impl IntoIterator for CategorizedArticles {
    type Item = Category;
    type IntoIter = std::vec::IntoIter<Category>;

    fn into_iter(self) -> Self::IntoIter {
        self.categories.into_iter()
    }
}

impl FromIterator<Category> for CategorizedArticles {
    fn from_iter<I: IntoIterator<Item = Category>>(iter: I) -> Self {
        let mut mapping = Self::new();
        for category in iter {
            mapping.insert(category.name, category.articles);
        }
        mapping
    }
}

/// Pipeline stage, for progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Prefilter,
    Generate,
    Assign,
    Validate,
    Recollect,
    Rename,
}

impl Stage {
    pub fn display_name(&self) -> &str {
        match self {
            Stage::Prefilter => "Filtering foreign local politics",
            Stage::Generate => "Generating dynamic categories",
            Stage::Assign => "Categorizing articles",
            Stage::Validate => "Validating categories",
            Stage::Recollect => "Recategorizing orphaned articles and renaming categories",
            Stage::Rename => "Renaming categories to better match their articles",
        }
    }
}

/// Why a category was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    TooSmall,
    Irrelevant,
}

/// Events emitted while categorizing.
#[derive(Debug, Clone)]
pub enum CategorizerEvent {
    StageStart { stage: Stage },
    CategoriesGenerated { categories: Vec<String> },
    CategoryRemoved {
        name: String,
        articles: usize,
        reason: RemovalReason,
    },
    CategoryRenamed { from: String, to: String },
    Finished { categories: usize, articles: usize },
}

/// Callback for categorizer events.
pub type CategorizerCallback = Box<dyn Fn(CategorizerEvent) + Send + Sync>;

/// Generates categories from articles and sorts the articles into them.
pub struct DynamicCategorizer {
    client: Arc<dyn CompletionClient>,
    config: CategorizerConfig,
    callback: Option<CategorizerCallback>,
}

impl DynamicCategorizer {
    pub fn new(client: Arc<dyn CompletionClient>, config: CategorizerConfig) -> Self {
        Self {
            client,
            config,
            callback: None,
        }
    }

    /// Set a callback for categorizer events.
    pub fn with_callback(mut self, callback: CategorizerCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// One system + user exchange, decoded as JSON.
    async fn ask_json(
        &self,
        system: &str,
        prompt: String,
        temperature: f32,
    ) -> Result<Value, PolidebateError> {
        let text = self.ask_text(system, prompt, temperature).await?;
        decode_json(&text)
    }

    async fn ask_text(
        &self,
        system: &str,
        prompt: String,
        temperature: f32,
    ) -> Result<String, PolidebateError> {
        let messages = [ChatMessage::system(system), ChatMessage::user(prompt)];
        self.client.complete(&messages, temperature).await
    }

    fn emit_event(&self, event: CategorizerEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }
}

/// "  - title" lines for the first `limit` articles, titles cut to `title_chars`.
fn title_lines(articles: &[Article], limit: usize, title_chars: usize) -> String {
    articles
        .iter()
        .take(limit)
        .map(|a| format!("  - {}", crate::article::truncate_chars(a.display_title(), title_chars)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Numbered article blocks for batch prompts.
fn article_blocks(articles: &[Article], description_chars: usize) -> String {
    articles
        .iter()
        .enumerate()
        .map(|(i, a)| a.prompt_entry(i + 1, description_chars))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str) -> Article {
        Article::new(title, "")
    }

    #[test]
    fn test_with_categories_dedupes_names() {
        let mapping = CategorizedArticles::with_categories(&["A", "B", "A"]);
        assert_eq!(mapping.names(), vec!["A", "B"]);
        assert_eq!(mapping.article_count(), 0);
    }

    #[test]
    fn test_push_into_unknown_category_is_rejected() {
        let mut mapping = CategorizedArticles::with_categories(&["A"]);
        assert!(mapping.push("A", article("one")));
        assert!(!mapping.push("Z", article("two")));
        assert_eq!(mapping.article_count(), 1);
    }

    #[test]
    fn test_renamed_keeps_missing_and_blank_names() {
        let mut mapping = CategorizedArticles::new();
        mapping.insert("A", vec![article("a1")]);
        mapping.insert("B", vec![article("b1")]);
        mapping.insert("C", vec![article("c1")]);

        let renames = HashMap::from([
            ("A".to_string(), "Alpha".to_string()),
            ("B".to_string(), "   ".to_string()),
        ]);
        let (renamed, applied) = mapping.renamed(&renames);

        assert_eq!(renamed.names(), vec!["Alpha", "B", "C"]);
        assert_eq!(applied, vec![("A".to_string(), "Alpha".to_string())]);
        assert_eq!(renamed.get("Alpha").unwrap()[0].display_title(), "a1");
    }

    #[test]
    fn test_renamed_merges_collisions() {
        let mut mapping = CategorizedArticles::new();
        mapping.insert("A", vec![article("a1"), article("a2")]);
        mapping.insert("B", vec![article("b1")]);

        let renames = HashMap::from([
            ("A".to_string(), "Same".to_string()),
            ("B".to_string(), "Same".to_string()),
        ]);
        let (renamed, _) = mapping.renamed(&renames);

        assert_eq!(renamed.len(), 1);
        let titles: Vec<_> = renamed
            .get("Same")
            .unwrap()
            .iter()
            .map(|a| a.display_title())
            .collect();
        assert_eq!(titles, vec!["a1", "a2", "b1"]);
    }

    #[test]
    fn test_title_lines_truncate_and_limit() {
        let articles: Vec<_> = (0..7)
            .map(|i| article(&format!("title {i} {}", "x".repeat(200))))
            .collect();
        let lines = title_lines(&articles, 5, 10);
        assert_eq!(lines.lines().count(), 5);
        assert_eq!(lines.lines().next().unwrap(), "  - title 0 xx");
    }
}
