//! Polidebate CLI - political news categorization and two-sided debates
//!
//! Fetches recent political news and groups it into dynamic categories, or
//! turns a topic into a Carnegie (liberal) vs Mellon (conservative) script
//! with optional narration.

use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use polidebate_core::article::truncate_chars;
use polidebate_core::config::Config;
use polidebate_core::output::{save_debate_result, save_script, write_categorized_json};
use polidebate_core::{
    CategorizationReport, CategorizerEvent, DebateAnalysis, DebateAnalyst, DynamicCategorizer,
    KokoroSynthesizer, Narrator, NewsClient, OpenAiCompletion, Persona, RemovalReason, ScriptLine,
    ScriptWriter, default_config, parse_script, trending_topics,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_FILE: &str = "polidebate.toml";
const RULE_WIDTH: usize = 80;

#[derive(Parser)]
#[command(
    name = "polidebate",
    version,
    about = "Political news categorizer and two-sided debate generator",
    long_about = "Categorizes recent political news into dynamic topics and turns a topic into a liberal vs conservative debate script using OpenAI-compatible APIs."
)]
struct Cli {
    /// TOML config file (defaults to ./polidebate.toml when present)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a topic from both sides and write a Carnegie vs Mellon script
    Debate {
        /// The topic to analyze
        #[arg(value_name = "TOPIC")]
        topic: String,

        /// Narrate the script to WAV files
        #[arg(long)]
        audio: bool,

        /// Also write all lines into a single debate.wav
        #[arg(long, requires = "audio")]
        combine: bool,

        /// Directory for narrated lines
        #[arg(long, default_value = "audio_output", value_name = "DIR")]
        audio_dir: PathBuf,

        /// Directory for the saved analysis
        #[arg(long, default_value = "results", value_name = "DIR")]
        results_dir: PathBuf,

        /// Where to save the generated script
        #[arg(long, default_value = "new_script.txt", value_name = "FILE")]
        script_path: PathBuf,
    },

    /// Fetch recent political news and group it into dynamic categories
    Categorize {
        /// How many days of news to fetch
        #[arg(long, value_name = "DAYS")]
        days_back: Option<i64>,

        /// Maximum number of articles to fetch
        #[arg(long, value_name = "N")]
        max_articles: Option<usize>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Both)]
        format: OutputFormat,

        /// Drop foreign local politics before categorizing
        #[arg(long)]
        prefilter: bool,

        /// Directory for the JSON output
        #[arg(long, default_value = ".", value_name = "DIR")]
        output_dir: PathBuf,
    },

    /// Print trending political topics
    Trending,

    /// List available narration voices
    Voices,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Console,
    Json,
    Both,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?.with_env();

    match cli.command {
        Command::Debate {
            topic,
            audio,
            combine,
            audio_dir,
            results_dir,
            script_path,
        } => {
            let options = DebateOptions {
                audio,
                combine,
                audio_dir,
                results_dir,
                script_path,
            };
            run_debate(&config, &topic, &options).await?
        }
        Command::Categorize {
            days_back,
            max_articles,
            format,
            prefilter,
            output_dir,
        } => {
            let mut config = config;
            if let Some(days) = days_back {
                config.news.days_back = days;
            }
            if let Some(max) = max_articles {
                config.news.max_articles = max;
            }
            config.categorizer.prefilter |= prefilter;
            run_categorize(&config, format, &output_dir).await?
        }
        Command::Trending => run_trending(&config).await?,
        Command::Voices => run_voices(&config).await?,
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` overrides the default `info` level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(Config::load(path)?),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => Ok(Config::load(DEFAULT_CONFIG_FILE)?),
        None => Ok(default_config()),
    }
}

fn warn_missing_key(key: &str, name: &str) {
    if key.trim().is_empty() {
        eprintln!(
            "{}",
            format!("Warning: {} not set. API calls may fail.", name).yellow()
        );
    }
}

struct DebateOptions {
    audio: bool,
    combine: bool,
    audio_dir: PathBuf,
    results_dir: PathBuf,
    script_path: PathBuf,
}

async fn run_debate(
    config: &Config,
    topic: &str,
    options: &DebateOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    warn_missing_key(&config.completion.api_key, "OPENROUTER_API_KEY");

    print_banner("Polidebate - Two Sides", |s| s.bright_blue());
    println!("{} {}", "Topic:".bold(), topic.bright_white());
    println!();

    let analyst = DebateAnalyst::new(
        Arc::new(OpenAiCompletion::new(&config.analysis_completion())?),
        config.debate.analysis_temperature,
    );
    let analysis = analyst.analyze(topic).await?;
    let saved = save_debate_result(&options.results_dir, topic, &analysis)?;
    print_analysis(&analysis);
    println!("{} {}", "Analysis saved to".dimmed(), saved.display());

    let writer = ScriptWriter::new(
        Arc::new(OpenAiCompletion::new(&config.script_completion())?),
        config.debate.script_temperature,
    );
    let script = writer.write_script(&analysis).await?;
    save_script(&options.script_path, &script)?;

    let lines = parse_script(&script);
    print_script(&lines);
    println!(
        "{} {}",
        "Script saved to".dimmed(),
        options.script_path.display()
    );

    if options.audio {
        if lines.is_empty() {
            eprintln!(
                "{}",
                "Warning: no speaker lines found in the script, skipping narration.".yellow()
            );
        } else {
            println!();
            println!(
                "{}",
                "Narrating script (first run downloads the voice model)...".dimmed()
            );
            let mut narrator =
                Narrator::new(KokoroSynthesizer::new().await?, config.voices.clone());
            let narration = narrator.narrate(&lines, &options.audio_dir, options.combine)?;
            println!(
                "{} {} files in {}",
                "Wrote".bright_green(),
                narration.files.len(),
                options.audio_dir.display()
            );
            if let Some(combined) = narration.combined {
                println!("{} {}", "Combined:".bright_green(), combined.display());
            }
        }
    }

    print_banner("Done.", |s| s.bright_green());
    Ok(())
}

async fn run_categorize(
    config: &Config,
    format: OutputFormat,
    output_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    warn_missing_key(&config.news.api_key, "NEWS_API_KEY");
    warn_missing_key(&config.completion.api_key, "OPENROUTER_API_KEY");

    println!("{}", "Starting Politics News Scraper and Categorizer...".bold());
    println!("{}", "─".repeat(RULE_WIDTH).dimmed());
    println!("{}", "Fetching recent politics articles...".bright_cyan());

    let news = NewsClient::new(&config.news)?;
    let articles = news
        .fetch_recent_politics_articles(config.news.days_back, config.news.max_articles)
        .await;
    if articles.is_empty() {
        eprintln!(
            "{} No articles found. Please check your News API key and connection.",
            "Error:".red().bold()
        );
        return Ok(());
    }
    println!("{} Fetched {} articles", "✓".bright_green(), articles.len());

    let categorizer = DynamicCategorizer::new(
        Arc::new(OpenAiCompletion::new(&config.completion)?),
        config.categorizer.clone(),
    )
    .with_callback(create_console_callback(config.categorizer.size_threshold()));
    let report = categorizer.run(&articles).await;

    if matches!(format, OutputFormat::Console | OutputFormat::Both) {
        print_report(&report);
    }
    if matches!(format, OutputFormat::Json | OutputFormat::Both) {
        let path = write_categorized_json(output_dir, &report, Local::now())?;
        println!("{} {}", "JSON output saved to:".bright_green(), path.display());
    }

    Ok(())
}

async fn run_trending(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let news = NewsClient::new(&config.news)?;
    let categorizer = DynamicCategorizer::new(
        Arc::new(OpenAiCompletion::new(&config.completion)?),
        config.categorizer.clone(),
    );

    let topics = trending_topics(&news, &categorizer, &config.trending).await;

    println!("{}", "Trending topics:".bold());
    for (i, topic) in topics.iter().enumerate() {
        println!("  {}. {}", i + 1, topic.bright_cyan());
    }
    Ok(())
}

async fn run_voices(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let narrator = Narrator::new(KokoroSynthesizer::new().await?, config.voices.clone());

    println!("{}", "Available English voices:".bold());
    println!("{}", narrator.format_available_voices());
    println!();
    for persona in Persona::ALL {
        println!(
            "{} {}",
            format!("{}:", persona.display_name_with_side()).bright_cyan(),
            persona.voice(&config.voices)
        );
    }
    if let Err(e) = narrator.validate_all_voices() {
        eprintln!("{} {}", "Warning:".yellow().bold(), e);
    }
    Ok(())
}

/// Create a callback that prints categorizer progress to the console.
fn create_console_callback(min_size: usize) -> Box<dyn Fn(CategorizerEvent) + Send + Sync> {
    Box::new(move |event| match event {
        CategorizerEvent::StageStart { stage } => {
            println!();
            println!(
                "{} {}...",
                "▶".bright_cyan(),
                stage.display_name().bright_cyan().bold()
            );
        }
        CategorizerEvent::CategoriesGenerated { categories } => {
            println!(
                "{} Generated {} categories: {}",
                "✓".bright_green(),
                categories.len(),
                categories.join(", ")
            );
        }
        CategorizerEvent::CategoryRemoved {
            name,
            articles,
            reason,
        } => {
            let why = match reason {
                RemovalReason::TooSmall => format!("fewer than {} articles", min_size),
                RemovalReason::Irrelevant => "not relevant".to_string(),
            };
            println!(
                "  {} Removed '{}' ({} articles): {}",
                "✗".yellow(),
                name,
                articles,
                why.dimmed()
            );
        }
        CategorizerEvent::CategoryRenamed { from, to } => {
            println!("  {} -> {}", from.dimmed(), to.bright_white());
        }
        CategorizerEvent::Finished { .. } => {
            println!("{} Categorization complete", "✓".bright_green());
        }
    })
}

fn print_banner(title: &str, paint: impl Fn(String) -> colored::ColoredString) {
    println!();
    println!("{}", paint("═".repeat(RULE_WIDTH)));
    println!("{}", paint(format!("  {}", title)).bold());
    println!("{}", paint("═".repeat(RULE_WIDTH)));
    println!();
}

fn print_analysis(analysis: &DebateAnalysis) {
    for persona in Persona::ALL {
        let side = persona.side();
        println!(
            "{}",
            format!("{} arguments", side.label().to_uppercase()).bold()
        );
        for argument in analysis.arguments(side) {
            for (i, line) in textwrap(argument, RULE_WIDTH - 6).lines().enumerate() {
                let bullet = if i == 0 { "-" } else { " " };
                println!("  {} {}", bullet, line);
            }
        }
        println!();
    }
}

fn print_script(lines: &[ScriptLine]) {
    println!("{}", "─".repeat(RULE_WIDTH).dimmed());
    for line in lines {
        let name = match line.speaker {
            Persona::Carnegie => line.speaker.display_name().bright_blue().bold(),
            Persona::Mellon => line.speaker.display_name().bright_red().bold(),
        };
        println!("{} {}", "▶".dimmed(), name);
        for wrapped in textwrap(&line.text, RULE_WIDTH - 4).lines() {
            println!("  {}", wrapped);
        }
        println!();
    }
    println!("{}", "─".repeat(RULE_WIDTH).dimmed());
}

fn print_report(report: &CategorizationReport) {
    println!();
    println!("{}", "=".repeat(RULE_WIDTH));
    println!("{}", "POLITICS NEWS - CATEGORIZED ARTICLES".bold());
    println!("{}", "=".repeat(RULE_WIDTH));
    println!(
        "Generated at: {}",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    for category in report.categories.iter().filter(|c| !c.articles.is_empty()) {
        println!();
        println!("{}", "─".repeat(RULE_WIDTH).dimmed());
        println!(
            "{}",
            format!("CATEGORY: {}", category.name.to_uppercase())
                .bright_magenta()
                .bold()
        );
        println!("{}", "─".repeat(RULE_WIDTH).dimmed());
        println!("Articles: {}", category.articles.len());
        println!();

        for (i, article) in category.articles.iter().enumerate() {
            println!("  {}. {}", i + 1, article.display_title().bright_white());
            println!(
                "     Source: {} | Published: {}",
                article.source_name().unwrap_or("Unknown source"),
                article.published_at.as_deref().unwrap_or("Unknown date")
            );
            if let Some(description) = article.description.as_deref().filter(|d| !d.is_empty()) {
                println!("     {}...", truncate_chars(description, 150));
            }
            if let Some(url) = article.url.as_deref().filter(|u| !u.is_empty()) {
                println!("     URL: {}", url.dimmed());
            }
            println!();
        }
    }

    println!("{}", "=".repeat(RULE_WIDTH));
    println!("Total categories: {}", report.categories.len());
    println!("Total articles: {}", report.categories.article_count());
    if report.filtered_out + report.prefiltered + report.discarded + report.unplaced > 0 {
        println!(
            "{}",
            format!(
                "Dropped: {} foreign local politics, {} orphaned, {} unplaced",
                report.filtered_out + report.prefiltered,
                report.discarded,
                report.unplaced
            )
            .dimmed()
        );
    }
    println!("{}", "=".repeat(RULE_WIDTH));
}

/// Simple text wrapping function.
fn textwrap(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut current_line_len = 0;

    for word in text.split_whitespace() {
        if current_line_len + word.len() + 1 > width && current_line_len > 0 {
            result.push('\n');
            current_line_len = 0;
        }
        if current_line_len > 0 {
            result.push(' ');
            current_line_len += 1;
        }
        result.push_str(word);
        current_line_len += word.len();
    }

    result
}
