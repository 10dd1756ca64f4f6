//! Conversation Analyzer and Principle Engine: the per-turn classification
//! and persuasion-strategy selection layer between transcript and prompt
//! builder (spec §4.5, §4.6).

pub mod analyzer;
pub mod principle;

pub use analyzer::{AnalyzerResult, ConversationAnalyzer};
pub use principle::{PrincipleEngine, PrincipleSelection};
