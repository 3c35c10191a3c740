//! Renaming categories to fit their final membership.

use tracing::{info, warn};

use super::{CategorizedArticles, CategorizerEvent, DynamicCategorizer, title_lines};
use crate::error::PolidebateError;
use crate::protocol::decode_renames;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that renames categories to better match their content. Always respond with only a valid JSON object.";

const SAMPLE_TITLES: usize = 10;
const TITLE_CHARS: usize = 150;

impl DynamicCategorizer {
    /// Relabel every category in one call; membership is carried over as is.
    ///
    /// Returns the input unchanged if the call fails.
    pub async fn rename_categories(&self, mapping: CategorizedArticles) -> CategorizedArticles {
        self.rename_tracked(mapping).await.0
    }

    /// [`Self::rename_categories`], also returning the renames that were applied.
    pub(super) async fn rename_tracked(
        &self,
        mapping: CategorizedArticles,
    ) -> (CategorizedArticles, Vec<(String, String)>) {
        match self.try_rename(&mapping).await {
            Ok(renamed) => renamed,
            Err(e) => {
                warn!(error = %e, "error renaming categories, keeping names");
                (mapping, Vec::new())
            }
        }
    }

    async fn try_rename(
        &self,
        mapping: &CategorizedArticles,
    ) -> Result<(CategorizedArticles, Vec<(String, String)>), PolidebateError> {
        let value = self
            .ask_json(
                SYSTEM_PROMPT,
                rename_prompt(mapping),
                self.config.assignment_temperature,
            )
            .await?;
        let renames = decode_renames(&value)?;

        let (renamed, applied) = mapping.renamed(&renames);
        for (from, to) in &applied {
            info!(from = %from, to = %to, "renamed category");
            self.emit_event(CategorizerEvent::CategoryRenamed {
                from: from.clone(),
                to: to.clone(),
            });
        }
        Ok((renamed, applied))
    }
}

/// Every category with a sample of its titles, for rename prompts.
pub(super) fn categories_overview(mapping: &CategorizedArticles) -> String {
    mapping
        .iter()
        .map(|c| {
            format!(
                "Current Category Name: {}\nArticles ({}):\n{}",
                c.name,
                c.articles.len(),
                title_lines(&c.articles, SAMPLE_TITLES, TITLE_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn rename_prompt(mapping: &CategorizedArticles) -> String {
    format!(
        r#"You are renaming categories to better match the articles they contain.

Categories and their articles:
{overview}

For each category above, suggest a better, more specific category name that accurately describes the articles in that category. The new name should:
- Be specific and descriptive
- Accurately reflect the common theme of the articles
- Be concise (preferably 2-5 words)
- Include relevant names, organizations, or policies if appropriate

Return a JSON object mapping old category names to new category names.
Example format: {{"Old Category 1": "New Category 1", "Old Category 2": "New Category 2", ...}}

If a category name is already good and doesn't need changing, keep it the same in the mapping.

Return ONLY the JSON object, nothing else."#,
        overview = categories_overview(mapping),
    )
}
