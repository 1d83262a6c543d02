//! LLM integration module

pub mod client;
pub mod prompts;

pub use client::{Completion, CompletionClient};
pub use prompts::{PromptParams, PromptTemplates, TypesetPrompt};
