//! Value types shared by the resolver and the manager.
//!
//! Defines [`PromptTemplate`] (a pair of template sources), [`RenderedPrompts`]
//! (the final output of a lookup) and [`PromptOverrides`] (caller-supplied
//! fixed prompts that bypass rendering).

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Per-item metadata and render context: a JSON object keyed by variable name.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Metadata key used to select a type-specific template pair.
pub const DOC_TYPE_KEY: &str = "doc_type";

/// A pair of raw Jinja2 template sources.
///
/// Either side may be absent. When a pair is overlaid on another, only the
/// present fields replace the underlying ones.
///
/// # Examples
///
/// ```
/// use docprompt_pm::PromptTemplate;
///
/// let defaults = PromptTemplate::builder()
///     .system_prompt("Default System")
///     .user_prompt("Default User: {{ name }}")
///     .build();
/// let invoice = PromptTemplate::builder()
///     .user_prompt("Invoice User: {{ amount }}")
///     .build();
///
/// let merged = defaults.overlay(&invoice);
/// assert_eq!(merged.system_prompt.as_deref(), Some("Default System"));
/// assert_eq!(merged.user_prompt.as_deref(), Some("Invoice User: {{ amount }}"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(deny_unknown_fields)]
pub struct PromptTemplate {
    /// System prompt template source.
    #[builder(default, setter(strip_option, into))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// User prompt template source.
    #[builder(default, setter(strip_option, into))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_prompt: Option<String>,
}

impl PromptTemplate {
    /// Returns a new pair where every field present in `other` replaces the
    /// corresponding field of `self`.
    pub fn overlay(&self, other: &PromptTemplate) -> PromptTemplate {
        PromptTemplate {
            system_prompt: other
                .system_prompt
                .clone()
                .or_else(|| self.system_prompt.clone()),
            user_prompt: other
                .user_prompt
                .clone()
                .or_else(|| self.user_prompt.clone()),
        }
    }
}

/// Fully rendered prompts for one item. Both fields are always present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedPrompts {
    pub system_prompt: String,
    pub user_prompt: String,
}

/// Caller-supplied prompts that replace rendered output verbatim.
///
/// Deserializes from an arbitrary mapping; keys other than
/// `fixed_system_prompt` and `fixed_prompt` are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct PromptOverrides {
    /// Replaces the rendered system prompt.
    #[builder(default, setter(strip_option, into))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_system_prompt: Option<String>,

    /// Replaces the rendered user prompt.
    #[builder(default, setter(strip_option, into))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_prompt: Option<String>,
}

impl PromptOverrides {
    /// Returns `true` if neither prompt is overridden.
    pub fn is_empty(&self) -> bool {
        self.fixed_system_prompt.is_none() && self.fixed_prompt.is_none()
    }

    /// Replace the fields of `prompts` that this value overrides.
    ///
    /// An empty string is a present value and still overrides.
    pub fn apply(&self, prompts: &mut RenderedPrompts) {
        if let Some(system) = &self.fixed_system_prompt {
            prompts.system_prompt.clone_from(system);
        }
        if let Some(user) = &self.fixed_prompt {
            prompts.user_prompt.clone_from(user);
        }
    }
}
