//! Optional pre-filter dropping foreign local politics before categorization.
//!
//! Batch assignment already drops these articles through its own sentinel;
//! this stage does the same job up front so category generation only sees
//! relevant summaries. It is independent and off by default.

use tracing::{info, warn};

use super::{DynamicCategorizer, article_blocks};
use crate::article::Article;
use crate::error::PolidebateError;
use crate::protocol::{FILTER_OUT, KEEP, decode_keep_flags};

const SYSTEM_PROMPT: &str = "You are a helpful assistant that screens politics news articles. Always respond with only a valid JSON array.";

/// Articles split by the pre-filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrefilterOutcome {
    pub kept: Vec<Article>,
    pub removed: Vec<Article>,
}

impl DynamicCategorizer {
    /// Remove local politics of foreign countries. A failed batch is kept whole.
    pub async fn filter_foreign_local_politics(&self, articles: &[Article]) -> PrefilterOutcome {
        let mut outcome = PrefilterOutcome::default();

        let batch_size = self.config.prefilter_batch_size.max(1);
        for (batch_idx, batch) in articles.chunks(batch_size).enumerate() {
            let flags = match self.screen_batch(batch).await {
                Ok(flags) => flags,
                Err(e) => {
                    warn!(batch = batch_idx + 1, error = %e, "error screening batch, keeping it");
                    vec![true; batch.len()]
                }
            };

            for (article, keep) in batch.iter().zip(flags) {
                if keep {
                    outcome.kept.push(article.clone());
                } else {
                    outcome.removed.push(article.clone());
                }
            }
        }

        info!(
            kept = outcome.kept.len(),
            removed = outcome.removed.len(),
            "pre-filtered foreign local politics"
        );
        outcome
    }

    async fn screen_batch(&self, batch: &[Article]) -> Result<Vec<bool>, PolidebateError> {
        let value = self
            .ask_json(
                SYSTEM_PROMPT,
                prefilter_prompt(batch),
                self.config.assignment_temperature,
            )
            .await?;
        decode_keep_flags(&value, batch.len())
    }
}

fn prefilter_prompt(batch: &[Article]) -> String {
    format!(
        r#"You are screening politics news articles before they are categorized.

For each article below, decide whether it should be kept.
- Return "{FILTER_OUT}" if the article is about LOCAL POLITICS in a FOREIGN COUNTRY that is NOT directly related to international affairs or US politics (local elections, opposition movements, municipal or regional politics abroad).
- Return "{KEEP}" for international relations, US foreign policy, global political events, US politics, major international conflicts and trade agreements.

Articles:
{articles}

Return a JSON array with one entry ("{KEEP}" or "{FILTER_OUT}") for each article in order.
Example format: ["{KEEP}", "{FILTER_OUT}", "{KEEP}"]

Return ONLY the JSON array, nothing else."#,
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
        (1..=n).map(|i| Article::new(format!("Story {i}"), "")).collect()
    }

    #[tokio::test]
    async fn test_prefilter_splits_and_fails_open() {
        let client = Arc::new(
            ScriptedCompletion::new()
                .reply(r#"["KEEP", "FILTER_OUT"]"#)
                .fail("502"),
        );
        let config = CategorizerConfig {
            prefilter_batch_size: 2,
            ..CategorizerConfig::default()
        };
        let categorizer = DynamicCategorizer::new(client, config);

        let outcome = categorizer.filter_foreign_local_politics(&articles(4)).await;

        let kept: Vec<_> = outcome.kept.iter().map(|a| a.display_title()).collect();
        assert_eq!(kept, vec!["Story 1", "Story 3", "Story 4"]);
        assert_eq!(outcome.removed.len(), 1);
        assert_eq!(outcome.removed[0].display_title(), "Story 2");
    }
}
