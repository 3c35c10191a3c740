//! Files written at the end of a run.

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::categorizer::CategorizationReport;
use crate::debate::DebateAnalysis;
use crate::error::PolidebateError;

const MAX_FILENAME_CHARS: usize = 100;

/// Lowercased topic with every non-alphanumeric character replaced by `_`.
pub fn safe_filename(topic: &str) -> String {
    topic
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .take(MAX_FILENAME_CHARS)
        .collect()
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PolidebateError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Save an analysis as `<dir>/<safe topic>.json`.
pub fn save_debate_result(
    dir: &Path,
    topic: &str,
    analysis: &DebateAnalysis,
) -> Result<PathBuf, PolidebateError> {
    let path = dir.join(format!("{}.json", safe_filename(topic)));
    write_json(&path, analysis)?;
    info!(path = %path.display(), "saved debate analysis");
    Ok(path)
}

pub fn save_script(path: &Path, script: &str) -> Result<(), PolidebateError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, script)?;
    info!(path = %path.display(), "saved script");
    Ok(())
}

/// JSON document for a categorization run: `generated_at` plus category name
/// to article summaries.
pub fn categorized_json(report: &CategorizationReport, generated_at: DateTime<Local>) -> Value {
    let categories: Map<String, Value> = report
        .categories
        .iter()
        .map(|category| {
            let articles = category
                .articles
                .iter()
                .map(|article| {
                    json!({
                        "title": article.title,
                        "source": article.source_name(),
                        "publishedAt": article.published_at,
                        "url": article.url,
                        "description": article.description,
                    })
                })
                .collect();
            (category.name.clone(), Value::Array(articles))
        })
        .collect();

    json!({
        "generated_at": generated_at.to_rfc3339(),
        "categories": categories,
    })
}

/// Write `categorized_articles_YYYYmmdd_HHMMSS.json` into `dir`.
pub fn write_categorized_json(
    dir: &Path,
    report: &CategorizationReport,
    generated_at: DateTime<Local>,
) -> Result<PathBuf, PolidebateError> {
    let path = dir.join(format!(
        "categorized_articles_{}.json",
        generated_at.format("%Y%m%d_%H%M%S")
    ));
    write_json(&path, &categorized_json(report, generated_at))?;
    info!(path = %path.display(), "saved categorized articles");
    Ok(path)
}
