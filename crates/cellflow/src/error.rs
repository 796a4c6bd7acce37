use crate::parser::Span;
use crate::runtime::RuntimeError;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The parsed cell tree is missing something the visitors rely on.
    #[error("{message}")]
    Syntax { message: String, span: Option<Span> },
    #[error("invalid function source `{code}`: {reason}")]
    FunctionSource { code: String, reason: String },
    #[error("cannot compile cell `{name}`: {reason}")]
    Compile { name: String, reason: String },
    #[error("cannot resolve import from `{module}`: {reason}")]
    Resolve { module: String, reason: String },
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] toml::de::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn syntax(message: impl Into<String>, span: Option<Span>) -> Self {
        Self::Syntax {
            message: message.into(),
            span,
        }
    }

    pub fn resolve(module: impl Into<String>, reason: impl ToString) -> Self {
        Self::Resolve {
            module: module.into(),
            reason: reason.to_string(),
        }
    }

    /// Span of the offending node, for errors raised while visiting a cell.
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Syntax { span, .. } => *span,
            _ => None,
        }
    }
}
