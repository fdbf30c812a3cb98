use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::config::{self, ConfigFormat, PromptConfig};
use crate::error::PmError;
use crate::resolver::{PromptResolver, UndefinedPolicy};
use crate::template::{Metadata, PromptOverrides, RenderedPrompts};

/// Entry point for prompt lookup: owns one config and one resolver.
///
/// Output priority, highest first: per-call overrides, type-specific
/// templates, default templates.
///
/// # Examples
///
/// ```
/// use docprompt_pm::{PromptManager, PromptOverrides};
/// use serde_json::json;
///
/// let manager = PromptManager::from_value(json!({
///     "system_prompt": "Default System",
///     "user_prompt": "Default User: {{ name }}"
/// }))
/// .expect("valid config");
///
/// let metadata = json!({ "name": "John" }).as_object().cloned().unwrap_or_default();
/// let prompts = manager.get_prompts(&metadata, None, None).expect("renders");
/// assert_eq!(prompts.user_prompt, "Default User: John");
///
/// let overrides = PromptOverrides::builder().fixed_prompt("Overridden User").build();
/// let prompts = manager
///     .get_prompts(&metadata, Some(&overrides), None)
///     .expect("renders");
/// assert_eq!(prompts.user_prompt, "Overridden User");
/// ```
#[derive(Debug)]
pub struct PromptManager {
    resolver: PromptResolver,
}

impl PromptManager {
    /// Create a manager from an already-built config.
    pub fn new(config: PromptConfig) -> Self {
        Self {
            resolver: PromptResolver::new(config),
        }
    }

    /// Create a manager from a JSON object of the config shape.
    ///
    /// # Errors
    ///
    /// Returns `PmError::ConfigValidation` if the value has the wrong shape.
    pub fn from_value(value: Value) -> Result<Self, PmError> {
        Ok(Self::new(PromptConfig::from_value(value)?))
    }

    /// Load the config from a JSON file, optionally wrapped in `prompt_config`.
    ///
    /// # Errors
    ///
    /// Returns `PmError::ConfigNotFound`, `PmError::ConfigParse`,
    /// `PmError::ConfigValidation` or `PmError::Io`.
    pub fn from_json(path: impl AsRef<Path>) -> Result<Self, PmError> {
        let config = config::load_prompt_config_as(path.as_ref(), ConfigFormat::Json)?;
        Ok(Self::new(config))
    }

    /// Load the config from a YAML file, optionally wrapped in `prompt_config`.
    ///
    /// # Errors
    ///
    /// Same as [`PromptManager::from_json`].
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self, PmError> {
        let config = config::load_prompt_config_as(path.as_ref(), ConfigFormat::Yaml)?;
        Ok(Self::new(config))
    }

    /// Load the config from a file, choosing JSON or YAML by extension.
    ///
    /// # Errors
    ///
    /// Same as [`PromptManager::from_json`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PmError> {
        Ok(Self::new(config::load_prompt_config(path.as_ref())?))
    }

    /// Switch the undefined-variable policy used when rendering.
    pub fn with_undefined_policy(self, policy: UndefinedPolicy) -> Self {
        let config = self.resolver.config().clone();
        Self {
            resolver: PromptResolver::with_policy(config, policy),
        }
    }

    /// Returns the loaded configuration.
    pub fn config(&self) -> &PromptConfig {
        self.resolver.config()
    }

    /// Returns the underlying resolver.
    pub fn resolver(&self) -> &PromptResolver {
        &self.resolver
    }

    /// Resolve, render and override the prompts for one item.
    ///
    /// `context` defaults to `metadata`. Prompts present in `overrides`
    /// replace the rendered output verbatim.
    ///
    /// # Errors
    ///
    /// Returns `PmError::TemplateRender` if a selected template fails to render.
    pub fn get_prompts(
        &self,
        metadata: &Metadata,
        overrides: Option<&PromptOverrides>,
        context: Option<&Metadata>,
    ) -> Result<RenderedPrompts, PmError> {
        let mut prompts = self.resolver.resolve_and_render(metadata, context)?;

        if let Some(overrides) = overrides.filter(|o| !o.is_empty()) {
            debug!(
                system = overrides.fixed_system_prompt.is_some(),
                user = overrides.fixed_prompt.is_some(),
                "applying prompt overrides"
            );
            overrides.apply(&mut prompts);
        }

        Ok(prompts)
    }
}

impl From<PromptConfig> for PromptManager {
    fn from(config: PromptConfig) -> Self {
        Self::new(config)
    }
}
