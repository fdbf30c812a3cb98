use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PmError {
    #[error("config not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("failed to parse config {}: {reason}", path.display())]
    ConfigParse { path: PathBuf, reason: String },

    #[error("invalid config field `{field}`: {reason}")]
    ConfigValidation { field: String, reason: String },

    #[error("failed to render {target}: {source}")]
    TemplateRender {
        target: String,
        #[source]
        source: minijinja::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
