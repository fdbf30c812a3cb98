use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use docprompt_pm::{Metadata, PromptManager, PromptOverrides, UndefinedPolicy};
use serde_json::Value;
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "docprompt",
    about = "Resolve and render document prompts from a template config"
)]
pub struct Cli {
    /// Also write JSON logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Render the system and user prompts for one item
    Render {
        /// Prompt config file (YAML if it ends in .yaml/.yml, JSON otherwise)
        #[arg(short, long)]
        config: PathBuf,

        /// Item metadata as a JSON object, or `@path` to read it from a file
        #[arg(short, long, default_value = "{}")]
        metadata: String,

        /// Render context as a JSON object or `@path` (defaults to the metadata)
        #[arg(long)]
        context: Option<String>,

        /// Use this system prompt verbatim
        #[arg(long)]
        fixed_system_prompt: Option<String>,

        /// Use this user prompt verbatim
        #[arg(long)]
        fixed_prompt: Option<String>,

        /// Fail on variables missing from the render context
        #[arg(long)]
        strict: bool,
    },

    /// Validate a prompt config and list its document types
    Check {
        /// Prompt config file
        #[arg(short, long)]
        config: PathBuf,
    },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        self.command.execute(&mut stdout)
    }
}

impl Commands {
    fn execute(self, out: &mut impl Write) -> Result<()> {
        match self {
            Commands::Render {
                config,
                metadata,
                context,
                fixed_system_prompt,
                fixed_prompt,
                strict,
            } => {
                let policy = if strict {
                    UndefinedPolicy::Strict
                } else {
                    UndefinedPolicy::Lenient
                };
                let manager = load_manager(&config)?.with_undefined_policy(policy);
                let metadata = parse_object("metadata", &metadata)?;
                let context = context
                    .map(|raw| parse_object("context", &raw))
                    .transpose()?;
                let overrides = PromptOverrides {
                    fixed_system_prompt,
                    fixed_prompt,
                };

                let prompts = manager
                    .get_prompts(&metadata, Some(&overrides), context.as_ref())
                    .context("failed to render prompts")?;
                serde_json::to_writer_pretty(&mut *out, &prompts)?;
                writeln!(out)?;
            }
            Commands::Check { config } => {
                let manager = load_manager(&config)?;
                let doc_types = manager.config().doc_types();
                info!(path = %config.display(), doc_types = doc_types.len(), "config is valid");

                writeln!(out, "{}: ok ({} doc types)", config.display(), doc_types.len())?;
                for doc_type in doc_types {
                    writeln!(out, "  {doc_type}")?;
                }
            }
        }
        Ok(())
    }
}

fn load_manager(path: &Path) -> Result<PromptManager> {
    PromptManager::from_file(path)
        .with_context(|| format!("failed to load prompt config: {}", path.display()))
}

/// Parse a JSON object given inline or as `@path`.
fn parse_object(what: &str, arg: &str) -> Result<Metadata> {
    let raw = match arg.strip_prefix('@') {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {what} file: {path}"))?,
        None => arg.to_owned(),
    };
    let value: Value =
        serde_json::from_str(&raw).with_context(|| format!("{what} is not valid JSON"))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => bail!("{what} must be a JSON object"),
    }
}
