//! Configuration module for slidesearch.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AnswerPrompts, DescribePrompts, Prompts};
pub use settings::{
    AnswerSettings, ConvertSettings, EmbeddingSettings, GeneralSettings, PathSettings,
    PromptSettings, SearchSettings, ServerSettings, Settings, VectorStoreSettings,
    VisionSettings, ENV_PREFIX,
};
