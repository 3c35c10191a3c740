//! Polidebate Core Library
//!
//! Dynamic categorization of political news, two-sided topic analysis,
//! Carnegie/Mellon script generation and narration.

pub mod article;
pub mod categorizer;
pub mod completion;
pub mod config;
pub mod debate;
pub mod error;
pub mod news;
pub mod output;
pub mod persona;
pub mod protocol;
pub mod script;
pub mod trending;
pub mod tts;

pub use article::{Article, Source};
pub use categorizer::{
    CategorizationReport, CategorizedArticles, Category, CategorizerEvent, DynamicCategorizer,
    RemovalReason, Stage,
};
pub use completion::{ChatMessage, CompletionClient, OpenAiCompletion, Role};
pub use config::{Config, default_config};
pub use debate::{DebateAnalysis, DebateAnalyst, DebateSide};
pub use error::PolidebateError;
pub use news::NewsClient;
pub use persona::{Persona, Side};
pub use script::{ScriptLine, ScriptWriter, parse_script};
pub use trending::{NewsSource, trending_topics};
pub use tts::{KokoroSynthesizer, Narration, Narrator, SpeechSynthesizer};
