//! Trending topic labels derived from recent headlines.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::article::Article;
use crate::categorizer::DynamicCategorizer;
use crate::config::TrendingConfig;
use crate::news::NewsClient;

/// Source of recent political articles.
#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn recent_politics_articles(&self, days_back: i64, max_articles: usize) -> Vec<Article>;
}

#[async_trait]
impl NewsSource for NewsClient {
    async fn recent_politics_articles(&self, days_back: i64, max_articles: usize) -> Vec<Article> {
        self.fetch_recent_politics_articles(days_back, max_articles)
            .await
    }
}

/// A handful of topic labels for what is in the news right now.
///
/// Falls back to the configured fixed list when no articles come back or the
/// generator returns nothing.
pub async fn trending_topics(
    news: &dyn NewsSource,
    categorizer: &DynamicCategorizer,
    config: &TrendingConfig,
) -> Vec<String> {
    let articles = news
        .recent_politics_articles(config.days_back, config.max_articles)
        .await;
    if articles.is_empty() {
        warn!("no articles found, using fallback topics");
        return config.fallback_topics.clone();
    }

    let summaries: Vec<String> = articles
        .iter()
        .take(config.summaries)
        .map(Article::format_for_categorization)
        .collect();
    let topics = categorizer
        .generate_categories(&summaries, Some(config.topic_count))
        .await;

    if topics.is_empty() {
        return config.fallback_topics.clone();
    }
    info!(topics = topics.len(), "generated trending topics");
    topics
}
