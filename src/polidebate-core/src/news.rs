//! Client for the news API used to find recent political coverage.

use chrono::{Duration as ChronoDuration, Local, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

use crate::article::Article;
use crate::config::NewsConfig;
use crate::error::PolidebateError;

const MAX_PAGE_SIZE: usize = 100;

/// Envelope returned by `/everything` and `/top-headlines`.
#[derive(Debug, Deserialize)]
struct ArticlesResponse {
    status: String,
    #[serde(default)]
    articles: Vec<Article>,
}

/// Fetches politics articles from a NewsAPI-compatible service.
#[derive(Debug, Clone)]
pub struct NewsClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl NewsClient {
    pub fn new(config: &NewsConfig) -> Result<Self, PolidebateError> {
        if config.api_key.trim().is_empty() {
            warn!("news API key not set, requests will likely be rejected");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PolidebateError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Recent politics articles, deduplicated by URL, at most `max_articles`.
    ///
    /// Tries several `/everything` queries, then tops up from
    /// `/top-headlines`. A failing query is logged and skipped.
    pub async fn fetch_recent_politics_articles(
        &self,
        days_back: i64,
        max_articles: usize,
    ) -> Vec<Article> {
        let to_date = Local::now().date_naive();
        let from_date = to_date - ChronoDuration::days(days_back);

        let queries: [(&str, &str); 3] = [
            ("q", "politics"),
            ("q", "political"),
            ("category", "politics"),
        ];

        let mut collector = Collector::new(max_articles);
        for (key, value) in queries {
            if collector.is_full() {
                break;
            }
            match self
                .everything(key, value, collector.remaining(), from_date, to_date)
                .await
            {
                Ok(articles) => collector.extend(articles),
                Err(e) => warn!(key, value, error = %e, "error fetching articles"),
            }
        }

        if !collector.is_full() {
            match self.top_headlines(collector.remaining()).await {
                Ok(articles) => collector.extend(articles),
                Err(e) => warn!(error = %e, "error fetching top headlines"),
            }
        }

        collector.finish()
    }

    async fn everything(
        &self,
        key: &str,
        value: &str,
        remaining: usize,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Article>, PolidebateError> {
        let page_size = remaining.min(MAX_PAGE_SIZE).to_string();
        let from = from.format("%Y-%m-%d").to_string();
        let to = to.format("%Y-%m-%d").to_string();
        self.get(
            "everything",
            &[
                (key, value),
                ("language", "en"),
                ("sortBy", "publishedAt"),
                ("pageSize", page_size.as_str()),
                ("from", from.as_str()),
                ("to", to.as_str()),
            ],
        )
        .await
    }

    async fn top_headlines(&self, remaining: usize) -> Result<Vec<Article>, PolidebateError> {
        let page_size = remaining.min(MAX_PAGE_SIZE).to_string();
        self.get(
            "top-headlines",
            &[
                ("category", "politics"),
                ("language", "en"),
                ("pageSize", page_size.as_str()),
            ],
        )
        .await
    }

    async fn get(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<Article>, PolidebateError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(url = %url, "requesting articles");

        let response: ArticlesResponse = self
            .client
            .get(&url)
            .query(params)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.status != "ok" {
            return Err(PolidebateError::News(format!(
                "unexpected status '{}' from {}",
                response.status, endpoint
            )));
        }
        Ok(response.articles)
    }
}

/// Accumulates articles in arrival order, skipping URL-less and duplicate ones.
struct Collector {
    articles: Vec<Article>,
    seen: HashSet<String>,
    max: usize,
}

impl Collector {
    fn new(max: usize) -> Self {
        Self {
            articles: Vec::new(),
            seen: HashSet::new(),
            max,
        }
    }

    fn is_full(&self) -> bool {
        self.articles.len() >= self.max
    }

    fn remaining(&self) -> usize {
        self.max.saturating_sub(self.articles.len())
    }

    fn extend(&mut self, articles: Vec<Article>) {
        for article in articles {
            let Some(url) = article.url.clone().filter(|u| !u.is_empty()) else {
                continue;
            };
            if self.seen.insert(url) {
                self.articles.push(article);
            }
        }
    }

    fn finish(mut self) -> Vec<Article> {
        self.articles.truncate(self.max);
        self.articles
    }
}
