mod config;
mod error;
mod manager;
mod resolver;
mod template;

pub use config::{
    ConfigFormat, PROMPT_CONFIG_KEY, PromptConfig, load_prompt_config, load_prompt_config_as,
};
pub use error::PmError;
pub use manager::PromptManager;
pub use resolver::{PromptResolver, UndefinedPolicy};
pub use template::{DOC_TYPE_KEY, Metadata, PromptOverrides, PromptTemplate, RenderedPrompts};
