//! Second chance for articles whose category was dropped.

use std::collections::HashMap;
use tracing::{info, warn};

use super::rename::categories_overview;
use super::{CategorizedArticles, CategorizerEvent, DynamicCategorizer, article_blocks};
use crate::article::Article;
use crate::error::PolidebateError;
use crate::protocol::{CombinedReply, NONE, decode_combined, decode_recategorizations};

const SYSTEM_PROMPT: &str = "You are a helpful assistant that categorizes news articles. Always respond with only a valid JSON array.";
const COMBINED_SYSTEM_PROMPT: &str = "You are a helpful assistant that recategorizes articles and renames categories. Always respond with only a valid JSON object.";

/// Outcome of recollecting orphans into the surviving categories.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecollectionReport {
    /// Surviving categories with recollected articles, after renaming.
    pub categorized: CategorizedArticles,
    pub recollected: usize,
    pub discarded: usize,
    /// Applied renames, old name to new name.
    pub renames: Vec<(String, String)>,
}

impl DynamicCategorizer {
    /// Fit each orphan into one of `categories`, or `None` if nothing fits.
    ///
    /// A failed call discards the whole batch.
    pub async fn recategorize_batch(
        &self,
        batch: &[Article],
        categories: &[String],
    ) -> Vec<Option<String>> {
        match self.try_recategorize_batch(batch, categories).await {
            Ok(assignments) => assignments,
            Err(e) => {
                warn!(batch = batch.len(), error = %e, "error recategorizing batch, discarding it");
                vec![None; batch.len()]
            }
        }
    }

    async fn try_recategorize_batch(
        &self,
        batch: &[Article],
        categories: &[String],
    ) -> Result<Vec<Option<String>>, PolidebateError> {
        let value = self
            .ask_json(
                SYSTEM_PROMPT,
                recategorize_prompt(batch, categories),
                self.config.assignment_temperature,
            )
            .await?;
        decode_recategorizations(&value, batch.len())
    }

    /// Recategorize the final orphan batch and rename every category in one call.
    ///
    /// When the combined call fails, falls back to a plain recategorization
    /// and keeps all names.
    pub async fn recategorize_and_rename(
        &self,
        batch: &[Article],
        categories: &[String],
        mapping: &CategorizedArticles,
    ) -> CombinedReply {
        let attempt = async {
            let value = self
                .ask_json(
                    COMBINED_SYSTEM_PROMPT,
                    combined_prompt(batch, categories, mapping),
                    self.config.assignment_temperature,
                )
                .await?;
            decode_combined(&value, batch.len())
        };

        match attempt.await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "error in combined recategorize and rename, recategorizing only");
                CombinedReply {
                    recategorizations: self.recategorize_batch(batch, categories).await,
                    renames: HashMap::new(),
                }
            }
        }
    }

    /// Put orphans back into `surviving`, renaming the categories along the way.
    ///
    /// Orphans are processed in batches; the last batch also carries the
    /// rename. Assignments always resolve against the pre-rename names, and
    /// the rename is applied once they have been placed.
    pub async fn recollect_orphans(
        &self,
        orphans: &[Article],
        surviving: CategorizedArticles,
    ) -> RecollectionReport {
        let existing = surviving.names();
        let mut categorized = surviving;
        let mut report = RecollectionReport::default();
        let mut renames = HashMap::new();

        let batch_size = self.config.recollect_batch_size.max(1);
        let total_batches = orphans.len().div_ceil(batch_size);

        for (batch_idx, batch) in orphans.chunks(batch_size).enumerate() {
            let assignments = if batch_idx + 1 == total_batches {
                let reply = self.recategorize_and_rename(batch, &existing, &categorized).await;
                renames = reply.renames;
                reply.recategorizations
            } else {
                self.recategorize_batch(batch, &existing).await
            };

            for (article, assigned) in batch.iter().zip(assignments) {
                let placed = match assigned {
                    Some(name) => categorized.push(&name, article.clone()),
                    None => false,
                };
                if placed {
                    report.recollected += 1;
                } else {
                    report.discarded += 1;
                }
            }
        }

        let (renamed, applied) = categorized.renamed(&renames);
        for (from, to) in &applied {
            info!(from = %from, to = %to, "renamed category");
            self.emit_event(CategorizerEvent::CategoryRenamed {
                from: from.clone(),
                to: to.clone(),
            });
        }

        report.categorized = renamed;
        report.renames = applied;
        report
    }
}

fn recategorize_prompt(batch: &[Article], categories: &[String]) -> String {
    format!(
        r#"You are categorizing news articles. For each article below, assign it to ONE of these existing categories:

Categories: {categories}

Articles:
{articles}

For each article, if it fits well into one of these categories, return the category name exactly as shown.
If an article does NOT fit well into any category, return "{NONE}".

Return a JSON array with one category name (or "{NONE}") for each article in order.
Example format: ["Category Name", "{NONE}", "Category Name", ...]

Return ONLY the JSON array, nothing else."#,
        categories = categories.join(", "),
        articles = article_blocks(batch, 300),
    )
}

fn combined_prompt(
    batch: &[Article],
    categories: &[String],
    mapping: &CategorizedArticles,
) -> String {
    format!(
        r#"You are performing two tasks:

TASK 1: Recategorize articles
For each article below, assign it to ONE of these existing categories: {categories}
If an article does NOT fit well into any category, return "{NONE}".

TASK 2: Rename categories
For each category below, suggest a better, more specific category name that accurately describes the articles in that category. The new name should be specific, descriptive, concise (2-5 words), and include relevant names/organizations/policies if appropriate.

Articles to recategorize:
{articles}

Current categories and their articles:
{overview}

Return a JSON object with two keys:
1. "recategorizations": An array with one category name (or "{NONE}") for each article in order
   Example: ["Category Name", "{NONE}", "Category Name", ...]
2. "renames": An object mapping old category names to new category names
   Example: {{"Old Category 1": "New Category 1", "Old Category 2": "New Category 2", ...}}
   If a category name is already good, keep it the same in the mapping.

Example format:
{{
  "recategorizations": ["Category Name", "{NONE}", "Category Name"],
  "renames": {{"Old Category 1": "New Category 1", "Old Category 2": "Old Category 2"}}
}}

Return ONLY the JSON object, nothing else."#,
        categories = categories.join(", "),
        articles = article_blocks(batch, 300),
        overview = categories_overview(mapping),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::testing::ScriptedCompletion;
    use crate::config::CategorizerConfig;
    use std::sync::Arc;

    fn articles(prefix: &str, n: usize) -> Vec<Article> {
        (1..=n).map(|i| Article::new(format!("{prefix} {i}"), "")).collect()
    }

    fn surviving() -> CategorizedArticles {
        let mut mapping = CategorizedArticles::new();
        mapping.insert("Trade Policy", articles("trade", 2));
        mapping.insert("Healthcare", articles("health", 2));
        mapping
    }

    fn categories() -> Vec<String> {
        vec!["Trade Policy".to_string(), "Healthcare".to_string()]
    }

    #[tokio::test]
    async fn test_recategorize_maps_none_and_fails_to_discard() {
        let client = Arc::new(
            ScriptedCompletion::new()
                .reply(r#"["Healthcare", "none"]"#)
                .reply("garbage"),
        );
        let categorizer = DynamicCategorizer::new(client, CategorizerConfig::default());
        let batch = articles("orphan", 2);

        assert_eq!(
            categorizer.recategorize_batch(&batch, &categories()).await,
            vec![Some("Healthcare".to_string()), None]
        );
        assert_eq!(
            categorizer.recategorize_batch(&batch, &categories()).await,
            vec![None, None]
        );
    }

    #[tokio::test]
    async fn test_combined_failure_falls_back_to_plain_recategorization() {
        let client = Arc::new(
            ScriptedCompletion::new()
                .fail("timeout")
                .reply(r#"["Trade Policy"]"#),
        );
        let categorizer = DynamicCategorizer::new(client.clone(), CategorizerConfig::default());

        let reply = categorizer
            .recategorize_and_rename(&articles("orphan", 1), &categories(), &surviving())
            .await;

        assert_eq!(client.call_count(), 2);
        assert_eq!(reply.recategorizations, vec![Some("Trade Policy".to_string())]);
        assert!(reply.renames.is_empty());
    }

    #[tokio::test]
    async fn test_recollect_resolves_before_renaming() {
        let client = Arc::new(
            ScriptedCompletion::new()
                .reply(r#"["Healthcare", "NONE", "Trade Policy", "Healthcare", "Unknown"]"#)
                .reply(
                    r#"{"recategorizations": ["Trade Policy", "NONE"],
                        "renames": {"Trade Policy": "US-China Tariffs", "Healthcare": "Healthcare"}}"#,
                ),
        );
        let categorizer = DynamicCategorizer::new(client.clone(), CategorizerConfig::default());

        let report = categorizer
            .recollect_orphans(&articles("orphan", 7), surviving())
            .await;

        assert_eq!(client.call_count(), 2);
        assert_eq!(report.recollected, 4);
        assert_eq!(report.discarded, 3);
        assert_eq!(report.categorized.names(), vec!["US-China Tariffs", "Healthcare"]);
        assert_eq!(report.categorized.get("US-China Tariffs").unwrap().len(), 4);
        assert_eq!(report.categorized.get("Healthcare").unwrap().len(), 4);
        assert_eq!(
            report.renames,
            vec![("Trade Policy".to_string(), "US-China Tariffs".to_string())]
        );

        // The combined call sees the state after the first batch was placed.
        let combined_prompt = client.calls()[1].prompt().to_string();
        assert!(combined_prompt.contains("Current Category Name: Healthcare\nArticles (4):"));
    }

    #[tokio::test]
    async fn test_single_batch_is_combined() {
        let client = Arc::new(ScriptedCompletion::new().reply(
            r#"{"recategorizations": ["Healthcare"], "renames": {"Healthcare": "ACA Subsidies"}}"#,
        ));
        let categorizer = DynamicCategorizer::new(client.clone(), CategorizerConfig::default());

        let report = categorizer
            .recollect_orphans(&articles("orphan", 1), surviving())
            .await;

        assert_eq!(client.call_count(), 1);
        assert_eq!(report.recollected, 1);
        assert_eq!(report.categorized.get("ACA Subsidies").unwrap().len(), 3);
    }
}
