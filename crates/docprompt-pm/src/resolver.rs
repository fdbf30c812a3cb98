//! Template selection and rendering.
//!
//! [`PromptResolver`] picks the template pair for an item from its `doc_type`
//! and renders both sides with minijinja. Templates are compiled per render;
//! nothing is cached, so a resolver is safe to share between threads.

use std::fmt;

use minijinja::{Environment, UndefinedBehavior};
use serde_json::Value;
use tracing::debug;

use crate::config::PromptConfig;
use crate::error::PmError;
use crate::template::{DOC_TYPE_KEY, Metadata, PromptTemplate, RenderedPrompts};

/// How templates treat variables missing from the render context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UndefinedPolicy {
    /// Missing variables render as an empty string (Jinja2's default).
    #[default]
    Lenient,
    /// Missing variables fail the render.
    Strict,
}

impl From<UndefinedPolicy> for UndefinedBehavior {
    fn from(policy: UndefinedPolicy) -> Self {
        match policy {
            UndefinedPolicy::Lenient => UndefinedBehavior::Lenient,
            UndefinedPolicy::Strict => UndefinedBehavior::Strict,
        }
    }
}

/// Resolves and renders prompt templates against a [`PromptConfig`].
pub struct PromptResolver {
    config: PromptConfig,
    policy: UndefinedPolicy,
    env: Environment<'static>,
}

impl PromptResolver {
    /// Create a resolver with lenient undefined-variable handling.
    pub fn new(config: PromptConfig) -> Self {
        Self::with_policy(config, UndefinedPolicy::default())
    }

    /// Create a resolver with the given undefined-variable policy.
    pub fn with_policy(config: PromptConfig, policy: UndefinedPolicy) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(policy.into());
        Self {
            config,
            policy,
            env,
        }
    }

    /// Returns the configuration this resolver reads from.
    pub fn config(&self) -> &PromptConfig {
        &self.config
    }

    /// Returns the undefined-variable policy.
    pub fn policy(&self) -> UndefinedPolicy {
        self.policy
    }

    /// Select the template pair for an item.
    ///
    /// Starts from the config defaults. If `metadata` carries a non-empty
    /// string `doc_type` that is mapped, the mapped pair is overlaid field
    /// by field. Unknown or missing types fall back to the defaults.
    pub fn resolve(&self, metadata: &Metadata) -> PromptTemplate {
        let defaults = self.config.defaults();
        let Some(doc_type) = metadata
            .get(DOC_TYPE_KEY)
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
        else {
            return defaults;
        };

        match self.config.template_for(doc_type) {
            Some(mapped) => {
                debug!(doc_type, "using type-specific templates");
                defaults.overlay(mapped)
            }
            None => {
                debug!(doc_type, "doc type not mapped, using defaults");
                defaults
            }
        }
    }

    /// Render a single template with `context`.
    ///
    /// An absent or empty template renders to an empty string.
    ///
    /// # Errors
    ///
    /// Returns `PmError::TemplateRender` on a syntax error, or on an undefined
    /// variable under [`UndefinedPolicy::Strict`].
    pub fn render(&self, template: Option<&str>, context: &Metadata) -> Result<String, PmError> {
        self.render_as("template", template, context)
    }

    /// Resolve the template pair for `metadata` and render both sides.
    ///
    /// When `context` is `None`, `metadata` is the render context.
    ///
    /// # Errors
    ///
    /// Returns `PmError::TemplateRender` naming the field that failed.
    pub fn resolve_and_render(
        &self,
        metadata: &Metadata,
        context: Option<&Metadata>,
    ) -> Result<RenderedPrompts, PmError> {
        let templates = self.resolve(metadata);
        let context = context.unwrap_or(metadata);

        Ok(RenderedPrompts {
            system_prompt: self.render_as(
                "system_prompt",
                templates.system_prompt.as_deref(),
                context,
            )?,
            user_prompt: self.render_as("user_prompt", templates.user_prompt.as_deref(), context)?,
        })
    }

    fn render_as(
        &self,
        target: &str,
        template: Option<&str>,
        context: &Metadata,
    ) -> Result<String, PmError> {
        let Some(src) = template.filter(|s| !s.is_empty()) else {
            return Ok(String::new());
        };
        self.env
            .render_str(src, context)
            .map_err(|source| PmError::TemplateRender {
                target: target.to_owned(),
                source,
            })
    }
}

impl fmt::Debug for PromptResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptResolver")
            .field("config", &self.config)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn meta(value: Value) -> Metadata {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    fn resolver() -> PromptResolver {
        let config = PromptConfig::from_value(json!({
            "system_prompt": "Default System",
            "user_prompt": "Default User: {{ name }}",
            "type_mapping": {
                "passport": {
                    "system_prompt": "Passport System",
                    "user_prompt": "Passport User: {{ number }}"
                },
                "invoice": {
                    "user_prompt": "Invoice User: {{ amount }}"
                }
            }
        }))
        .expect("should build config");
        PromptResolver::new(config)
    }

    #[test]
    fn test_should_resolve_defaults_without_doc_type() {
        let templates = resolver().resolve(&meta(json!({ "name": "John" })));
        assert_eq!(templates.system_prompt.as_deref(), Some("Default System"));
        assert_eq!(
            templates.user_prompt.as_deref(),
            Some("Default User: {{ name }}")
        );
    }

    #[test]
    fn test_should_resolve_full_type_mapping() {
        let templates = resolver().resolve(&meta(json!({ "doc_type": "passport" })));
        assert_eq!(templates.system_prompt.as_deref(), Some("Passport System"));
        assert_eq!(
            templates.user_prompt.as_deref(),
            Some("Passport User: {{ number }}")
        );
    }

    #[test]
    fn test_should_fall_back_to_default_for_unmapped_field() {
        let templates = resolver().resolve(&meta(json!({ "doc_type": "invoice" })));
        assert_eq!(templates.system_prompt.as_deref(), Some("Default System"));
        assert_eq!(
            templates.user_prompt.as_deref(),
            Some("Invoice User: {{ amount }}")
        );
    }

    #[test]
    fn test_should_ignore_unknown_null_empty_and_non_string_doc_types() {
        let resolver = resolver();
        let defaults = resolver.config().defaults();

        for doc_type in [json!("receipt"), json!(null), json!(""), json!(7)] {
            let templates = resolver.resolve(&meta(json!({ "doc_type": doc_type })));
            assert_eq!(templates, defaults);
        }
    }

    #[test]
    fn test_should_resolve_absent_pair_when_nothing_configured() {
        let resolver = PromptResolver::new(PromptConfig::default());
        let prompts = resolver
            .resolve_and_render(&meta(json!({ "doc_type": "passport" })), None)
            .expect("should render");
        assert_eq!(prompts, RenderedPrompts::default());
    }

    #[test]
    fn test_should_render_empty_string_for_missing_template() {
        let resolver = resolver();
        let ctx = Metadata::new();
        assert_eq!(resolver.render(None, &ctx).expect("should render"), "");
        assert_eq!(resolver.render(Some(""), &ctx).expect("should render"), "");
    }

    #[test]
    fn test_should_render_undefined_variable_as_empty_when_lenient() {
        let rendered = resolver()
            .render(Some("Hello {{ missing }}!"), &Metadata::new())
            .expect("should render");
        assert_eq!(rendered, "Hello !");
    }

    #[test]
    fn test_should_default_to_lenient_policy() {
        assert_eq!(UndefinedPolicy::default(), UndefinedPolicy::Lenient);
        assert_eq!(resolver().policy(), UndefinedPolicy::Lenient);
    }

    #[test]
    fn test_should_fail_on_undefined_variable_when_strict() {
        let resolver =
            PromptResolver::with_policy(PromptConfig::default(), UndefinedPolicy::Strict);
        assert_eq!(resolver.policy(), UndefinedPolicy::Strict);

        let result = resolver.render(Some("Hello {{ missing }}!"), &Metadata::new());
        assert!(matches!(result, Err(PmError::TemplateRender { .. })));
    }

    #[test]
    fn test_should_fail_on_syntax_error() {
        let result = resolver().render(Some("Hello {{ name "), &Metadata::new());
        match result {
            Err(PmError::TemplateRender { target, .. }) => assert_eq!(target, "template"),
            other => panic!("expected render error, got {other:?}"),
        }
    }

    #[test]
    fn test_should_name_failing_field_in_render_error() {
        let config = PromptConfig::builder()
            .system_prompt("fine")
            .user_prompt("{% if %}")
            .build();
        let result = PromptResolver::new(config).resolve_and_render(&Metadata::new(), None);
        match result {
            Err(PmError::TemplateRender { target, .. }) => assert_eq!(target, "user_prompt"),
            other => panic!("expected render error, got {other:?}"),
        }
    }

    #[test]
    fn test_should_render_conditionals_and_loops() {
        let ctx = meta(json!({ "urgent": true, "fields": ["name", "date"] }));
        let rendered = resolver()
            .render(
                Some("{% if urgent %}URGENT: {% endif %}extract {{ fields | join(', ') }}"),
                &ctx,
            )
            .expect("should render");
        assert_eq!(rendered, "URGENT: extract name, date");

        let rendered = resolver()
            .render(Some("{% for f in fields %}[{{ f }}]{% endfor %}"), &ctx)
            .expect("should render");
        assert_eq!(rendered, "[name][date]");
    }

    #[test]
    fn test_should_use_metadata_as_context_by_default() {
        let prompts = resolver()
            .resolve_and_render(&meta(json!({ "doc_type": "passport", "number": "123" })), None)
            .expect("should render");
        assert_eq!(prompts.system_prompt, "Passport System");
        assert_eq!(prompts.user_prompt, "Passport User: 123");
    }

    #[test]
    fn test_should_prefer_explicit_context_over_metadata() {
        let metadata = meta(json!({ "doc_type": "invoice", "amount": "100" }));
        let context = meta(json!({ "amount": "250" }));
        let prompts = resolver()
            .resolve_and_render(&metadata, Some(&context))
            .expect("should render");
        assert_eq!(prompts.system_prompt, "Default System");
        assert_eq!(prompts.user_prompt, "Invoice User: 250");
    }

    #[test]
    fn test_should_render_deterministically_without_touching_config() {
        let resolver = resolver();
        let before = resolver.config().clone();
        let ctx = meta(json!({ "name": "John" }));

        let first = resolver.render(Some("Hi {{ name }}"), &ctx).expect("should render");
        let second = resolver.render(Some("Hi {{ name }}"), &ctx).expect("should render");

        assert_eq!(first, second);
        assert_eq!(resolver.config(), &before);
    }

    #[test]
    fn test_should_be_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PromptResolver>();
    }
}
