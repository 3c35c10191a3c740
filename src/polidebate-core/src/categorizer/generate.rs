//! Initial category generation.

use tracing::{info, warn};

use super::DynamicCategorizer;
use crate::protocol::decode_category_list;

/// Used whenever the model cannot produce a usable category list.
pub const FALLBACK_CATEGORIES: [&str; 5] = [
    "General Politics",
    "Elections",
    "Policy",
    "International Relations",
    "Domestic Affairs",
];

const SYSTEM_PROMPT: &str = "You are a helpful assistant that analyzes news articles and creates logical categories. Always respond with valid JSON arrays.";

impl DynamicCategorizer {
    /// Generate category names from article summaries.
    ///
    /// Never fails: any transport, decode or shape problem yields
    /// [`FALLBACK_CATEGORIES`].
    pub async fn generate_categories(
        &self,
        summaries: &[String],
        desired_count: Option<usize>,
    ) -> Vec<String> {
        let prompt = generation_prompt(summaries, self.config.generation_sample, desired_count);

        let result = self
            .ask_json(SYSTEM_PROMPT, prompt, self.config.generation_temperature)
            .await
            .and_then(|value| decode_category_list(&value));

        match result {
            Ok(categories) => {
                info!(count = categories.len(), "generated categories");
                categories
            }
            Err(e) => {
                warn!(error = %e, "error generating categories, using fallback");
                FALLBACK_CATEGORIES.iter().map(|c| c.to_string()).collect()
            }
        }
    }
}

fn generation_prompt(summaries: &[String], sample: usize, desired_count: Option<usize>) -> String {
    let articles_text = summaries
        .iter()
        .take(sample)
        .enumerate()
        .map(|(i, summary)| format!("Article {}:\n{}", i + 1, summary))
        .collect::<Vec<_>>()
        .join("\n\n");

    let count_instruction = match desired_count {
        Some(n) => format!("Generate approximately {} categories", n),
        None => "Generate an appropriate number of categories".to_string(),
    };

    format!(
        r#"You are analyzing recent politics-related news articles. Based on the following articles, {count_instruction} that best organize these articles.

Articles:
{articles_text}

Please:
1. Identify the main themes and topics
2. Create clear, SPECIFIC category names (e.g., "Trump Tariffs", "Decreasing Housing Cost", "SNAP Payments")
3. It is encouraged to include relevant names of people, organizations, or policies, but make sure to be specific.
4. Return ONLY a JSON array of category names, nothing else

Example format: ["Category 1", "Category 2", "Category 3"]
"#
    )
}
