use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::{Display, Formatter};

/// A status reported by a worker, either numeric (like an HTTP status) or a free text token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum StatusValue {
    Number(serde_json::Number),
    Token(String),
}

impl StatusValue {
    pub fn code(code: i64) -> Self {
        StatusValue::Number(code.into())
    }

    pub fn token(token: impl Into<String>) -> Self {
        StatusValue::Token(token.into())
    }

    /// Whether this status counts as a successful action.
    ///
    /// Only the number `200` and the tokens `complete` and `ok` are successes.
    pub fn is_success(&self) -> bool {
        match self {
            StatusValue::Number(n) => n.as_f64() == Some(200.0),
            StatusValue::Token(t) => t == "complete" || t == "ok",
        }
    }
}

impl Display for StatusValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusValue::Number(n) => write!(f, "{n}"),
            StatusValue::Token(t) => write!(f, "{t}"),
        }
    }
}

impl From<serde_json::Value> for StatusValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Number(n) => StatusValue::Number(n),
            serde_json::Value::String(s) => StatusValue::Token(s),
            other => StatusValue::Token(other.to_string()),
        }
    }
}

// Workers are loosely typed, so anything that isn't a number is kept as its text form rather than
// failing the whole payload.
impl<'de> Deserialize<'de> for StatusValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(serde_json::Value::deserialize(deserializer)?.into())
    }
}

/// One sub-step reported by a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    #[serde(rename = "action", default)]
    pub name: String,
    #[serde(rename = "duration", default)]
    pub duration_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusValue>,
}

impl ActionRecord {
    pub fn new(name: impl Into<String>, duration_ms: f64, status: StatusValue) -> Self {
        Self {
            name: name.into(),
            duration_ms,
            status: Some(status),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.as_ref().is_some_and(StatusValue::is_success)
    }
}

/// The JSON object a worker writes to stdout once it is done.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusValue>,
    #[serde(default)]
    pub actions: Vec<ActionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
}

/// What came out of a run's stdout once the protocol markers were removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutput {
    Parsed(WorkerResult),
    /// The payload could not be read as a worker result. The text is kept as it was received.
    Invalid { raw: String, error: String },
}

impl RunOutput {
    pub fn is_parsed(&self) -> bool {
        matches!(self, RunOutput::Parsed(_))
    }

    pub fn actions(&self) -> &[ActionRecord] {
        match self {
            RunOutput::Parsed(result) => &result.actions,
            RunOutput::Invalid { .. } => &[],
        }
    }

    /// The run level status to count, with placeholders where the worker did not give one.
    pub fn status(&self) -> StatusValue {
        match self {
            RunOutput::Parsed(WorkerResult {
                status: Some(status),
                ..
            }) => status.clone(),
            RunOutput::Parsed(_) => StatusValue::token("missing"),
            RunOutput::Invalid { .. } => StatusValue::token("error"),
        }
    }
}

/// Everything known about one completed run, as handed to the report collectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// 1-based run index
    pub run_index: usize,
    pub flow: usize,
    pub success: bool,
    pub duration_ms: f64,
    /// `None` if the process was killed by a signal or never started.
    pub exit_code: Option<i32>,
    pub output: RunOutput,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn read_loose_worker_result() {
        let result: WorkerResult = serde_json::from_str(
            r#"{"status":"ok","actions":[{"action":"login","duration":12.5,"status":200},{"action":"search","duration":40}],"extra":true}"#,
        )
        .unwrap();

        assert_eq!(result.status, Some(StatusValue::token("ok")));
        assert_eq!(result.actions.len(), 2);
        assert_eq!(
            result.actions[0],
            ActionRecord::new("login", 12.5, StatusValue::code(200))
        );
        assert_eq!(result.actions[1].status, None);
        assert!(result.log.is_none());
    }

    #[test]
    fn odd_statuses_are_kept_as_tokens() {
        let result: WorkerResult =
            serde_json::from_str(r#"{"status":null,"actions":[{"action":"a","duration":1,"status":true}]}"#)
                .unwrap();

        assert_eq!(result.status, None);
        assert_eq!(result.actions[0].status, Some(StatusValue::token("true")));
    }

    #[test]
    fn success_statuses() {
        assert!(StatusValue::code(200).is_success());
        assert!(StatusValue::Number(serde_json::Number::from_f64(200.0).unwrap()).is_success());
        assert!(StatusValue::token("complete").is_success());
        assert!(StatusValue::token("ok").is_success());

        assert!(!StatusValue::code(201).is_success());
        assert!(!StatusValue::token("200").is_success());
        assert!(!StatusValue::token("timeout").is_success());
        assert!(!ActionRecord {
            name: "a".to_string(),
            duration_ms: 1.0,
            status: None
        }
        .is_success());
    }

    #[test]
    fn run_status_placeholders() {
        assert_eq!(
            RunOutput::Parsed(WorkerResult::default()).status(),
            StatusValue::token("missing")
        );
        assert_eq!(
            RunOutput::Invalid {
                raw: "oops".to_string(),
                error: "expected value".to_string()
            }
            .status(),
            StatusValue::token("error")
        );
    }

    #[test]
    fn status_serializes_untagged() {
        assert_eq!(
            serde_json::to_string(&vec![StatusValue::code(404), StatusValue::token("ok")]).unwrap(),
            r#"[404,"ok"]"#
        );
    }
}
