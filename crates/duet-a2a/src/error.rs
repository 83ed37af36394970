//! Error types for the A2A protocol layer

use thiserror::Error;

/// A wire payload that does not match the message schema.
///
/// `path` names the offending field, e.g. `turns[0].sender.agent_name`;
/// `$` is the document root.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation error at {path}: {kind}")]
pub struct ValidationError {
    pub path: String,
    pub kind: ValidationErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationErrorKind {
    #[error("field required")]
    Missing,
    #[error("expected {expected}, found {found}")]
    InvalidType {
        expected: &'static str,
        found: &'static str,
    },
    #[error("unknown role '{0}' (expected one of: user, assistant, system, tool)")]
    UnknownRole(String),
    #[error("must not be empty")]
    Empty,
    #[error("malformed JSON: {0}")]
    Syntax(String),
    #[error("{0}")]
    Decode(String),
}

impl ValidationError {
    pub fn new(path: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub(crate) fn syntax(err: serde_json::Error) -> Self {
        Self::new("$", ValidationErrorKind::Syntax(err.to_string()))
    }

    pub(crate) fn decode(err: serde_json::Error) -> Self {
        Self::new("$", ValidationErrorKind::Decode(err.to_string()))
    }
}

/// Failure of a single tool invocation on the receiving agent.
///
/// Never aborts a batch: the responder turns each variant into an
/// error-flagged tool response.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Required parameter missing or of the wrong shape in `tool_input`
    #[error("{0}")]
    InvalidInput(String),
    /// The capability behind the tool failed
    #[error("{0}")]
    Failed(String),
}

impl ToolError {
    pub fn missing_param(name: &str) -> Self {
        Self::InvalidInput(format!("Missing '{}' in tool_input", name))
    }
}

impl From<anyhow::Error> for ToolError {
    fn from(err: anyhow::Error) -> Self {
        Self::Failed(format!("{:#}", err))
    }
}
