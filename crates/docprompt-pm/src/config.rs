//! Prompt configuration model and loading.
//!
//! [`PromptConfig`] holds the default template pair and the `doc_type` → [`PromptTemplate`] mapping. A config is built once,
//! either programmatically, from an in-memory JSON value, or from a JSON/YAML
//! file, and is read-only afterwards.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};
use typed_builder::TypedBuilder;

use crate::error::PmError;
use crate::template::PromptTemplate;

/// Optional top-level key wrapping the config section inside a larger file.
pub const PROMPT_CONFIG_KEY: &str = "prompt_config";

const PROMPT_FIELDS: [&str; 2] = ["system_prompt", "user_prompt"];
const TYPE_MAPPING_FIELD: &str = "type_mapping";

// ── Prompt Configuration ─────────────────────────────────────

/// Default and per-document-type prompt templates.
///
/// # Examples
///
/// ```
/// use docprompt_pm::{PromptConfig, PromptTemplate};
///
/// let config = PromptConfig::builder()
///     .system_prompt("Default System")
///     .user_prompt("Default User: {{ name }}")
///     .type_mapping([(
///         "invoice".to_owned(),
///         PromptTemplate::builder().user_prompt("Invoice User: {{ amount }}").build(),
///     )])
///     .build();
///
/// assert_eq!(config.doc_types(), vec!["invoice"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(deny_unknown_fields)]
pub struct PromptConfig {
    /// Default system prompt template.
    #[builder(default, setter(strip_option, into))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    system_prompt: Option<String>,

    /// Default user prompt template.
    #[builder(default, setter(strip_option, into))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_prompt: Option<String>,

    /// Template pairs keyed by `doc_type`.
    #[builder(default, setter(into))]
    #[serde(default)]
    type_mapping: BTreeMap<String, PromptTemplate>,
}

impl PromptConfig {
    /// Build a config from a JSON object of the config shape.
    ///
    /// Unknown fields are rejected, both at the top level and inside
    /// `type_mapping` entries.
    ///
    /// # Errors
    ///
    /// Returns `PmError::ConfigValidation` naming the first offending field.
    pub fn from_value(value: Value) -> Result<Self, PmError> {
        validate_config(&value)?;
        serde_json::from_value(value).map_err(|e| PmError::ConfigValidation {
            field: "<root>".to_owned(),
            reason: e.to_string(),
        })
    }

    /// Returns the default template pair.
    pub fn defaults(&self) -> PromptTemplate {
        PromptTemplate {
            system_prompt: self.system_prompt.clone(),
            user_prompt: self.user_prompt.clone(),
        }
    }

    /// Returns the default system prompt template, if set.
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    /// Returns the default user prompt template, if set.
    pub fn user_prompt(&self) -> Option<&str> {
        self.user_prompt.as_deref()
    }

    /// Returns the template pair mapped to `doc_type`, if any.
    pub fn template_for(&self, doc_type: &str) -> Option<&PromptTemplate> {
        self.type_mapping.get(doc_type)
    }

    /// Returns the mapped document types in sorted order.
    pub fn doc_types(&self) -> Vec<&str> {
        self.type_mapping.keys().map(String::as_str).collect()
    }
}

// ── Validation ───────────────────────────────────────────────

fn validate_config(value: &Value) -> Result<(), PmError> {
    let Some(fields) = value.as_object() else {
        return Err(invalid("<root>", "expected an object"));
    };

    for (key, field) in fields {
        if PROMPT_FIELDS.contains(&key.as_str()) {
            expect_optional_string(key, field)?;
        } else if key == TYPE_MAPPING_FIELD {
            validate_type_mapping(field)?;
        } else {
            return Err(invalid(key, "unknown field"));
        }
    }
    Ok(())
}

fn validate_type_mapping(value: &Value) -> Result<(), PmError> {
    let Some(entries) = value.as_object() else {
        return Err(invalid(TYPE_MAPPING_FIELD, "expected an object"));
    };

    for (doc_type, entry) in entries {
        let path = format!("{TYPE_MAPPING_FIELD}.{doc_type}");
        let Some(fields) = entry.as_object() else {
            return Err(invalid(&path, "expected an object"));
        };
        for (key, field) in fields {
            let field_path = format!("{path}.{key}");
            if !PROMPT_FIELDS.contains(&key.as_str()) {
                return Err(invalid(&field_path, "unknown field"));
            }
            expect_optional_string(&field_path, field)?;
        }
    }
    Ok(())
}

fn expect_optional_string(field: &str, value: &Value) -> Result<(), PmError> {
    match value {
        Value::Null | Value::String(_) => Ok(()),
        _ => Err(invalid(field, "expected a string or null")),
    }
}

fn invalid(field: &str, reason: &str) -> PmError {
    PmError::ConfigValidation {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
}

// ── Config loading ───────────────────────────────────────────

/// On-disk format of a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Pick the format from the file extension: `.yaml`/`.yml` are YAML,
    /// everything else is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Json,
        }
    }

    fn parse(self, content: &str) -> Result<Value, String> {
        match self {
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        }
    }
}

/// Load a [`PromptConfig`] from a file, picking the format by extension.
///
/// # Errors
///
/// See [`load_prompt_config_as`].
pub fn load_prompt_config(path: &Path) -> Result<PromptConfig, PmError> {
    load_prompt_config_as(path, ConfigFormat::from_path(path))
}

/// Load a [`PromptConfig`] from a file in the given format.
///
/// If the top-level object has a `prompt_config` key, its value is the
/// config and sibling keys are ignored; otherwise the top-level object is
/// the config.
///
/// # Errors
///
/// Returns `PmError::ConfigNotFound` if the file does not exist.
/// Returns `PmError::Io` if the file exists but cannot be read.
/// Returns `PmError::ConfigParse` if the content is malformed or does not
/// resolve to an object.
/// Returns `PmError::ConfigValidation` if the object has the wrong shape.
#[instrument(skip_all, fields(path = %path.display(), format = ?format))]
pub fn load_prompt_config_as(path: &Path, format: ConfigFormat) -> Result<PromptConfig, PmError> {
    if !path.exists() {
        return Err(PmError::ConfigNotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)?;
    let parse_error = |reason: String| PmError::ConfigParse {
        path: path.to_path_buf(),
        reason,
    };

    let value = format.parse(&content).map_err(parse_error)?;
    let section = unwrap_config_section(value).map_err(|reason| parse_error(reason.to_owned()))?;
    let config = PromptConfig::from_value(section)?;
    debug!(doc_types = config.type_mapping.len(), "loaded prompt config");
    Ok(config)
}

fn unwrap_config_section(value: Value) -> Result<Value, &'static str> {
    let Value::Object(mut top) = value else {
        return Err("top level is not an object");
    };
    match top.remove(PROMPT_CONFIG_KEY) {
        Some(section @ Value::Object(_)) => Ok(section),
        Some(_) => Err("`prompt_config` is not an object"),
        None => Ok(Value::Object(top)),
    }
}
