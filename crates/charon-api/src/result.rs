//! Per-target invocation outcomes

use crate::error::InvocationShapeError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Structured value parsed from a remote RPC payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcValue {
    /// Result of a single-value procedure
    Single(String),

    /// Result of an array, word-processing or global-array procedure
    Lines(Vec<String>),
}

impl RpcValue {
    /// Render the value as text; lines are joined with `\n`
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            RpcValue::Single(value) => Cow::Borrowed(value),
            RpcValue::Lines(lines) => Cow::Owned(lines.join("\n")),
        }
    }

    pub fn lines(&self) -> Vec<&str> {
        match self {
            RpcValue::Single(value) => vec![value.as_str()],
            RpcValue::Lines(lines) => lines.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RpcValue::Single(value) => value.is_empty(),
            RpcValue::Lines(lines) => lines.is_empty(),
        }
    }
}

impl fmt::Display for RpcValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

/// Category of a per-target failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credential handshake rejected or could not complete
    Authentication,
    /// Handshake or exchange exceeded its bound
    Timeout,
    /// Connection-level failure while sending or receiving
    Transport,
    /// Remote replied with something the protocol does not allow here
    Protocol,
    /// Remote payload could not be parsed
    Parse,
    /// Remote host reported an application-level fault
    Remote,
    /// Invoker failed unexpectedly
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Authentication => "authentication",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Transport => "transport",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Parse => "parse",
            ErrorKind::Remote => "remote",
            ErrorKind::Internal => "internal",
        };
        f.write_str(label)
    }
}

/// Description of why one target failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorDescriptor {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

/// Outcome of one RPC against one target
///
/// Exactly one of `response` and `error` is populated. This is enforced by the
/// constructors and when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "InvocationResultRepr", try_from = "InvocationResultRepr")]
pub struct RpcInvocationResult {
    target_id: String,
    outcome: Result<RpcValue, ErrorDescriptor>,
}

impl RpcInvocationResult {
    pub fn success(target_id: impl Into<String>, response: RpcValue) -> Self {
        Self {
            target_id: target_id.into(),
            outcome: Ok(response),
        }
    }

    pub fn failure(target_id: impl Into<String>, error: ErrorDescriptor) -> Self {
        Self {
            target_id: target_id.into(),
            outcome: Err(error),
        }
    }

    /// Logical id of the target that produced this result
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn response(&self) -> Option<&RpcValue> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&ErrorDescriptor> {
        self.outcome.as_ref().err()
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn outcome(&self) -> &Result<RpcValue, ErrorDescriptor> {
        &self.outcome
    }

    pub fn into_parts(self) -> (String, Result<RpcValue, ErrorDescriptor>) {
        (self.target_id, self.outcome)
    }
}

#[derive(Serialize, Deserialize)]
struct InvocationResultRepr {
    vista: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    response: Option<RpcValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ErrorDescriptor>,
}

impl From<RpcInvocationResult> for InvocationResultRepr {
    fn from(result: RpcInvocationResult) -> Self {
        let (vista, outcome) = result.into_parts();
        match outcome {
            Ok(response) => Self {
                vista,
                response: Some(response),
                error: None,
            },
            Err(error) => Self {
                vista,
                response: None,
                error: Some(error),
            },
        }
    }
}

impl TryFrom<InvocationResultRepr> for RpcInvocationResult {
    type Error = InvocationShapeError;

    fn try_from(repr: InvocationResultRepr) -> Result<Self, Self::Error> {
        match (repr.response, repr.error) {
            (Some(response), None) => Ok(Self::success(repr.vista, response)),
            (None, Some(error)) => Ok(Self::failure(repr.vista, error)),
            (Some(_), Some(_)) => Err(InvocationShapeError::BothPopulated { vista: repr.vista }),
            (None, None) => Err(InvocationShapeError::NeitherPopulated { vista: repr.vista }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_xor_failure() {
        let ok = RpcInvocationResult::success("500", RpcValue::Single("OK".into()));
        assert!(ok.is_success());
        assert!(ok.error().is_none());
        assert_eq!(ok.response().unwrap().as_text(), "OK");

        let failed = RpcInvocationResult::failure(
            "600",
            ErrorDescriptor::new(ErrorKind::Authentication, "Failed to login."),
        );
        assert!(!failed.is_success());
        assert!(failed.response().is_none());
        assert_eq!(failed.error().unwrap().kind, ErrorKind::Authentication);
    }

    #[test]
    fn test_json_uses_vista_field() {
        let ok = RpcInvocationResult::success("500", RpcValue::Single("OK".into()));
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json, serde_json::json!({"vista": "500", "response": "OK"}));
    }

    #[test]
    fn test_deserialize_rejects_both_and_neither() {
        let both = serde_json::from_str::<RpcInvocationResult>(
            r#"{"vista":"1","response":"x","error":{"kind":"remote","message":"m"}}"#,
        );
        assert!(both.is_err());

        let neither = serde_json::from_str::<RpcInvocationResult>(r#"{"vista":"1"}"#);
        assert!(neither.is_err());

        let lines: RpcInvocationResult =
            serde_json::from_str(r#"{"vista":"1","response":["a","b"]}"#).unwrap();
        assert_eq!(
            lines.response(),
            Some(&RpcValue::Lines(vec!["a".into(), "b".into()]))
        );
    }

    #[test]
    fn test_lines_render_as_text() {
        let value = RpcValue::Lines(vec!["1^MEDICARE".into(), "2^TRICARE".into()]);
        assert_eq!(value.as_text(), "1^MEDICARE\n2^TRICARE");
        assert_eq!(value.lines(), vec!["1^MEDICARE", "2^TRICARE"]);
        assert!(!value.is_empty());
    }
}
