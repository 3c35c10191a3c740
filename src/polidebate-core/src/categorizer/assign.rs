//! Batch assignment of articles to categories.

use tracing::{info, warn};

use super::{CategorizedArticles, DynamicCategorizer, article_blocks};
use crate::article::Article;
use crate::error::PolidebateError;
use crate::protocol::{Assignment, FILTER_OUT, decode_assignments};

const SYSTEM_PROMPT: &str = "You are a helpful assistant that categorizes news articles. Always respond with valid JSON objects.";

/// Result of sorting every article into the initial categories.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentReport {
    pub categorized: CategorizedArticles,
    /// Articles the model marked as foreign local politics.
    pub filtered_out: usize,
    /// Articles placed in the first category because the reply was unusable.
    pub fallbacks: usize,
    /// Articles that could not be placed because there were no categories.
    pub unplaced: usize,
}

impl DynamicCategorizer {
    /// Ask the model to place each article of one batch.
    ///
    /// The result is aligned with `batch`.
    pub async fn assign_batch(
        &self,
        batch: &[Article],
        categories: &[String],
    ) -> Result<Vec<Assignment>, PolidebateError> {
        let prompt = assignment_prompt(batch, categories);
        let value = self
            .ask_json(SYSTEM_PROMPT, prompt, self.config.assignment_temperature)
            .await?;
        decode_assignments(&value, batch.len())
    }

    /// Sort all articles into `categories`, batch by batch.
    ///
    /// Filtered articles are counted and dropped. Anything the model fails to
    /// place, including a whole batch whose call failed, goes to the first
    /// category so no article is lost.
    pub async fn categorize_articles(
        &self,
        articles: &[Article],
        categories: &[String],
    ) -> AssignmentReport {
        let mut report = AssignmentReport {
            categorized: CategorizedArticles::with_categories(categories),
            ..AssignmentReport::default()
        };

        let Some(first) = categories.first() else {
            warn!(articles = articles.len(), "no categories to assign articles to");
            report.unplaced = articles.len();
            return report;
        };

        let batch_size = self.config.assign_batch_size.max(1);
        for (batch_idx, batch) in articles.chunks(batch_size).enumerate() {
            let assignments = match self.assign_batch(batch, categories).await {
                Ok(assignments) => assignments,
                Err(e) => {
                    warn!(
                        batch = batch_idx + 1,
                        error = %e,
                        "error categorizing batch, using first category"
                    );
                    vec![Assignment::Unassignable; batch.len()]
                }
            };

            for (article, assignment) in batch.iter().zip(assignments) {
                match assignment {
                    Assignment::Filtered => report.filtered_out += 1,
                    Assignment::Assigned(name) if report.categorized.contains(&name) => {
                        report.categorized.push(&name, article.clone());
                    }
                    Assignment::Assigned(_) | Assignment::Unassignable => {
                        report.fallbacks += 1;
                        report.categorized.push(first, article.clone());
                    }
                }
            }
        }

        if report.filtered_out > 0 {
            info!(
                filtered = report.filtered_out,
                "filtered out foreign local politics articles during categorization"
            );
        }

        report
    }
}

fn assignment_prompt(batch: &[Article], categories: &[String]) -> String {
    format!(
        r#"You are categorizing politics news articles. For each article below, assign it to ONE of these categories:

Categories: {categories}

IMPORTANT FILTERING RULE:
- If an article is about LOCAL POLITICS in a FOREIGN COUNTRY that is NOT directly related to international affairs or US politics, assign it to "{FILTER_OUT}" instead of a category.
- Examples to {FILTER_OUT}: Local elections in Hungary/Poland/other foreign countries, local political opposition movements in foreign countries, municipal politics in foreign cities, regional politics in foreign countries.
- Examples to KEEP: International relations, US foreign policy, global political events, US politics, major international conflicts, trade agreements.

Articles:
{articles}

For each article, return a JSON object mapping article numbers to category names (or "{FILTER_OUT}").
Example format: {{"1": "Category Name", "2": "{FILTER_OUT}", "3": "Category Name", ...}}

Return ONLY the JSON object, nothing else."#,
        categories = categories.join(", "),
        articles = article_blocks(batch, 300),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::testing::ScriptedCompletion;
    use crate::config::CategorizerConfig;
    use std::sync::Arc;

    fn articles(n: usize) -> Vec<Article> {
        (1..=n).map(|i| Article::new(format!("Story {i}"), "desc")).collect()
    }

    fn categories() -> Vec<String> {
        vec!["Trade Policy".to_string(), "Healthcare".to_string()]
    }

    fn titles(report: &AssignmentReport, name: &str) -> Vec<String> {
        report
            .categorized
            .get(name)
            .unwrap()
            .iter()
            .map(|a| a.display_title().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_assignment_policy_per_article() {
        let client = Arc::new(ScriptedCompletion::new().reply(
            r#"{"1": "Healthcare", "2": "FILTER_OUT", "3": "Made Up", "5": "Trade Policy"}"#,
        ));
        let categorizer = DynamicCategorizer::new(client.clone(), CategorizerConfig::default());

        let report = categorizer.categorize_articles(&articles(5), &categories()).await;

        assert_eq!(report.filtered_out, 1);
        assert_eq!(report.fallbacks, 2);
        assert_eq!(titles(&report, "Healthcare"), vec!["Story 1"]);
        assert_eq!(titles(&report, "Trade Policy"), vec!["Story 3", "Story 4", "Story 5"]);
        assert_eq!(client.calls()[0].temperature, 0.3);
    }

    #[tokio::test]
    async fn test_batch_failure_assigns_whole_batch_to_first_category() {
        let client = Arc::new(
            ScriptedCompletion::new()
                .reply(r#"{"1": "FILTER_OUT", "2": "Healthcare"}"#)
                .reply("not json at all"),
        );
        let config = CategorizerConfig {
            assign_batch_size: 2,
            ..CategorizerConfig::default()
        };
        let categorizer = DynamicCategorizer::new(client.clone(), config);

        let report = categorizer.categorize_articles(&articles(4), &categories()).await;

        assert_eq!(client.call_count(), 2);
        assert_eq!(report.filtered_out, 1);
        assert_eq!(titles(&report, "Trade Policy"), vec!["Story 3", "Story 4"]);
        assert_eq!(titles(&report, "Healthcare"), vec!["Story 2"]);
    }

    #[tokio::test]
    async fn test_every_article_is_placed_or_counted() {
        let client = Arc::new(
            ScriptedCompletion::new()
                .reply(r#"{"1": "FILTER_OUT", "2": "Healthcare", "3": "FILTER_OUT"}"#)
                .fail("connection reset")
                .reply(r#"["wrong", "shape"]"#),
        );
        let config = CategorizerConfig {
            assign_batch_size: 3,
            ..CategorizerConfig::default()
        };
        let categorizer = DynamicCategorizer::new(client, config);

        let report = categorizer.categorize_articles(&articles(8), &categories()).await;

        assert_eq!(report.filtered_out, 2);
        assert_eq!(report.categorized.article_count() + report.filtered_out, 8);
    }

    #[tokio::test]
    async fn test_no_categories_makes_no_calls() {
        let client = Arc::new(ScriptedCompletion::new());
        let categorizer = DynamicCategorizer::new(client.clone(), CategorizerConfig::default());

        let report = categorizer.categorize_articles(&articles(3), &[]).await;

        assert_eq!(client.call_count(), 0);
        assert_eq!(report.unplaced, 3);
        assert!(report.categorized.is_empty());
    }

    #[test]
    fn test_prompt_numbers_articles_from_one() {
        let prompt = assignment_prompt(&articles(2), &categories());
        assert!(prompt.contains("Categories: Trade Policy, Healthcare"));
        assert!(prompt.contains("Article 1:\nTitle: Story 1\nDescription: desc"));
        assert!(prompt.contains("Article 2:"));
        assert!(prompt.contains(r#"{"1": "Category Name", "2": "FILTER_OUT""#));
    }
}
