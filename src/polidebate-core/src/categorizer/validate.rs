//! Relevance validation of categories.

use tracing::{debug, warn};

use super::{CategorizedArticles, Category, DynamicCategorizer, article_blocks, title_lines};
use crate::article::Article;
use crate::error::PolidebateError;
use crate::protocol::decode_relevance;

const SINGLE_SYSTEM_PROMPT: &str = "You are a helpful assistant that analyzes article-category relevance. Always respond with only 'true' or 'false'.";
const BATCH_SYSTEM_PROMPT: &str = "You are a helpful assistant that analyzes article-category relevance. Always respond with only a valid JSON array of booleans.";

const SAMPLE_TITLES: usize = 5;
const TITLE_CHARS: usize = 100;

impl DynamicCategorizer {
    /// Whether the articles of a single category are actually on-topic.
    ///
    /// An empty category is never relevant and costs no call; a failed call
    /// keeps the category.
    pub async fn is_relevant(&self, category: &str, articles: &[Article]) -> bool {
        if articles.is_empty() {
            return false;
        }

        let prompt = single_prompt(category, articles);
        match self
            .ask_text(SINGLE_SYSTEM_PROMPT, prompt, self.config.assignment_temperature)
            .await
        {
            Ok(answer) => answer.trim().eq_ignore_ascii_case("true"),
            Err(e) => {
                warn!(category, error = %e, "error checking category relevance, keeping it");
                true
            }
        }
    }

    /// Check several categories in one call; the result is aligned with `pairs`.
    ///
    /// Any failure keeps the whole batch.
    pub async fn check_batch(&self, pairs: &[Category]) -> Vec<bool> {
        if pairs.is_empty() {
            return Vec::new();
        }

        match self.try_check_batch(pairs).await {
            Ok(verdicts) => verdicts,
            Err(e) => {
                warn!(
                    batch = pairs.len(),
                    error = %e,
                    "error checking batch category relevance, keeping all categories"
                );
                vec![true; pairs.len()]
            }
        }
    }

    async fn try_check_batch(&self, pairs: &[Category]) -> Result<Vec<bool>, PolidebateError> {
        let value = self
            .ask_json(
                BATCH_SYSTEM_PROMPT,
                batch_prompt(pairs),
                self.config.assignment_temperature,
            )
            .await?;
        decode_relevance(&value, pairs.len())
    }

    /// Split `mapping` into relevant and irrelevant categories, batch by batch.
    pub async fn validate_relevance(
        &self,
        mapping: CategorizedArticles,
    ) -> (CategorizedArticles, CategorizedArticles) {
        let categories: Vec<Category> = mapping.into_iter().collect();
        let mut relevant = CategorizedArticles::new();
        let mut irrelevant = CategorizedArticles::new();

        let batch_size = self.config.validate_batch_size.max(1);
        for batch in categories.chunks(batch_size) {
            let verdicts = self.check_batch(batch).await;
            for (category, keep) in batch.iter().zip(verdicts) {
                debug!(category = %category.name, keep, "relevance verdict");
                let target = if keep { &mut relevant } else { &mut irrelevant };
                target.insert(category.name.clone(), category.articles.clone());
            }
        }

        (relevant, irrelevant)
    }
}

fn single_prompt(category: &str, articles: &[Article]) -> String {
    format!(
        r#"You are analyzing whether articles are actually on-topic for their assigned category.

Category: "{category}"

Articles assigned to this category:
{articles}

Determine if these articles are actually relevant and on-topic for the category "{category}".

Return "true" if at least 2 articles are clearly relevant to the category.
Return "false" if the articles are not relevant, too niche, or the category doesn't make sense for these articles.

Return ONLY "true" or "false" (lowercase, no quotes, no explanation)."#,
        articles = article_blocks(articles, 200),
    )
}

fn batch_prompt(pairs: &[Category]) -> String {
    let categories_text = pairs
        .iter()
        .map(|c| {
            format!(
                "Category: {}\nArticles ({}):\n{}",
                c.name,
                c.articles.len(),
                title_lines(&c.articles, SAMPLE_TITLES, TITLE_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"You are analyzing whether articles are actually on-topic for their assigned categories.

Categories and their articles:
{categories_text}

For each category above, determine if the articles are actually relevant and on-topic for that category.

Return "true" if at least 2 articles are clearly relevant to the category.
Return "false" if the articles are not relevant, too niche, or the category doesn't make sense for these articles.

Return a JSON array of booleans, one for each category in order (true = relevant, false = not relevant).
Example format: [true, false, true, true, false]

Return ONLY the JSON array, nothing else."#
    )
}
