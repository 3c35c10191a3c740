//! The full categorization flow.

use tracing::info;

use super::{CategorizedArticles, CategorizerEvent, DynamicCategorizer, RemovalReason, Stage};
use crate::article::Article;

/// Final categories plus an account of every article that did not make it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategorizationReport {
    pub categories: CategorizedArticles,
    /// Removed by the optional pre-filter.
    pub prefiltered: usize,
    /// Marked as foreign local politics during assignment.
    pub filtered_out: usize,
    /// Could not be assigned because no category existed.
    pub unplaced: usize,
    pub removed_small: Vec<String>,
    pub removed_irrelevant: Vec<String>,
    /// Articles of removed categories.
    pub orphans: usize,
    pub recollected: usize,
    pub discarded: usize,
    /// Applied renames, old name to new name.
    pub renames: Vec<(String, String)>,
}

impl DynamicCategorizer {
    /// Generate, assign, validate, recollect and rename.
    ///
    /// Model failures are absorbed by each stage; the run itself cannot fail.
    /// No articles means no calls and an empty report.
    pub async fn run(&self, articles: &[Article]) -> CategorizationReport {
        let mut report = CategorizationReport::default();
        if articles.is_empty() {
            self.finish(&report);
            return report;
        }

        let articles = if self.config.prefilter {
            self.emit_event(CategorizerEvent::StageStart {
                stage: Stage::Prefilter,
            });
            let outcome = self.filter_foreign_local_politics(articles).await;
            report.prefiltered = outcome.removed.len();
            outcome.kept
        } else {
            articles.to_vec()
        };
        if articles.is_empty() {
            self.finish(&report);
            return report;
        }

        self.emit_event(CategorizerEvent::StageStart {
            stage: Stage::Generate,
        });
        let summaries: Vec<String> = articles
            .iter()
            .take(self.config.generation_sample)
            .map(Article::format_for_categorization)
            .collect();
        let categories = self.generate_categories(&summaries, None).await;
        self.emit_event(CategorizerEvent::CategoriesGenerated {
            categories: categories.clone(),
        });

        self.emit_event(CategorizerEvent::StageStart {
            stage: Stage::Assign,
        });
        let assignment = self.categorize_articles(&articles, &categories).await;
        report.filtered_out = assignment.filtered_out;
        report.unplaced = assignment.unplaced;

        self.emit_event(CategorizerEvent::StageStart {
            stage: Stage::Validate,
        });
        let (sized, small) = self.split_small(assignment.categorized);
        let (relevant, irrelevant) = self.validate_relevance(sized).await;
        for category in irrelevant.iter() {
            self.emit_event(CategorizerEvent::CategoryRemoved {
                name: category.name.clone(),
                articles: category.articles.len(),
                reason: RemovalReason::Irrelevant,
            });
        }
        report.removed_small = small.names();
        report.removed_irrelevant = irrelevant.names();

        let orphans: Vec<Article> = small
            .into_iter()
            .chain(irrelevant)
            .flat_map(|c| c.articles)
            .collect();
        report.orphans = orphans.len();
        info!(
            kept = relevant.len(),
            removed_small = report.removed_small.len(),
            removed_irrelevant = report.removed_irrelevant.len(),
            orphans = report.orphans,
            "validated categories"
        );

        if relevant.is_empty() {
            report.discarded = orphans.len();
        } else if !orphans.is_empty() {
            self.emit_event(CategorizerEvent::StageStart {
                stage: Stage::Recollect,
            });
            let recollection = self.recollect_orphans(&orphans, relevant).await;
            report.categories = recollection.categorized;
            report.recollected = recollection.recollected;
            report.discarded = recollection.discarded;
            report.renames = recollection.renames;
        } else {
            self.emit_event(CategorizerEvent::StageStart {
                stage: Stage::Rename,
            });
            let (renamed, applied) = self.rename_tracked(relevant).await;
            report.categories = renamed;
            report.renames = applied;
        }

        self.finish(&report);
        report
    }

    /// Drop categories below the minimum size, before any relevance check.
    fn split_small(
        &self,
        mapping: CategorizedArticles,
    ) -> (CategorizedArticles, CategorizedArticles) {
        let threshold = self.config.size_threshold();
        let (sized, small): (Vec<_>, Vec<_>) = mapping
            .into_iter()
            .partition(|c| c.articles.len() >= threshold);

        for category in &small {
            info!(
                category = %category.name,
                articles = category.articles.len(),
                "removed small category"
            );
            self.emit_event(CategorizerEvent::CategoryRemoved {
                name: category.name.clone(),
                articles: category.articles.len(),
                reason: RemovalReason::TooSmall,
            });
        }

        (sized.into_iter().collect(), small.into_iter().collect())
    }

    fn finish(&self, report: &CategorizationReport) {
        info!(
            categories = report.categories.len(),
            articles = report.categories.article_count(),
            filtered = report.filtered_out,
            discarded = report.discarded,
            "categorization complete"
        );
        self.emit_event(CategorizerEvent::Finished {
            categories: report.categories.len(),
            articles: report.categories.article_count(),
        });
    }
}
