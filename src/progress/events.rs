use crate::errors::{AppError, Result};
use serde::Deserialize;
use serde_json::Value;

/// One status message from the worker, or the stop signal sent to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Progress { completed: u64, total: u64 },
    TrackTitle(String),
    /// `label` is carried through untouched; only `remaining_seconds` is displayed.
    EtaUpdate { label: String, remaining_seconds: u64 },
    Terminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Progress,
    TrackTitle,
    EtaUpdate,
    Terminate,
}

impl Event {
    pub fn progress(completed: u64, total: u64) -> Self {
        Event::Progress { completed, total }
    }

    pub fn track_title(title: impl Into<String>) -> Self {
        Event::TrackTitle(title.into())
    }

    pub fn eta_update(label: impl Into<String>, remaining_seconds: u64) -> Self {
        Event::EtaUpdate { label: label.into(), remaining_seconds }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::Progress { .. } => EventKind::Progress,
            Event::TrackTitle(_) => EventKind::TrackTitle,
            Event::EtaUpdate { .. } => EventKind::EtaUpdate,
            Event::Terminate => EventKind::Terminate,
        }
    }

    /// Checks the payload invariants of the variant.
    pub fn validate(&self) -> Result<()> {
        match self {
            Event::Progress { total: 0, .. } => Err(AppError::MalformedEvent(
                "progress total must be greater than zero".to_string(),
            )),
            Event::Progress { completed, total } if completed > total => Err(AppError::MalformedEvent(format!(
                "progress {} exceeds total {}",
                completed, total
            ))),
            _ => Ok(()),
        }
    }

    /// Decodes one line of helper output, e.g. `{"type": "progress", "contents": [3, 12]}`.
    ///
    /// Only the message shape is checked here; payload invariants are left to
    /// [`Event::validate`] so the consumer can count the rejection.
    pub fn from_json_line(line: &str) -> Result<Self> {
        let raw: RawMessage = serde_json::from_str(line.trim())
            .map_err(|e| AppError::MalformedEvent(format!("undecodable message: {}", e)))?;

        match raw.kind.as_str() {
            "progress" => {
                let pair = as_pair(&raw.contents, "progress")?;
                let completed = pair[0]
                    .as_u64()
                    .ok_or_else(|| malformed("progress", "completed must be a non-negative integer"))?;
                let total = pair[1]
                    .as_u64()
                    .ok_or_else(|| malformed("progress", "total must be a non-negative integer"))?;
                Ok(Event::Progress { completed, total })
            }
            "song_title" | "track_title" => match &raw.contents {
                Value::String(title) => Ok(Event::TrackTitle(title.clone())),
                _ => Err(malformed("song_title", "contents must be a string")),
            },
            "eta_update" => {
                let pair = as_pair(&raw.contents, "eta_update")?;
                let label = match &pair[0] {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let remaining_seconds = seconds_from(&pair[1])
                    .ok_or_else(|| malformed("eta_update", "remaining seconds must be a non-negative number"))?;
                Ok(Event::EtaUpdate { label, remaining_seconds })
            }
            "KILL" | "terminate" => Ok(Event::Terminate),
            other => Err(AppError::MalformedEvent(format!("unknown message type '{}'", other))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    contents: Value,
}

fn malformed(kind: &str, reason: &str) -> AppError {
    AppError::MalformedEvent(format!("{}: {}", kind, reason))
}

fn as_pair<'a>(contents: &'a Value, kind: &str) -> Result<&'a [Value]> {
    match contents {
        Value::Array(items) if items.len() == 2 => Ok(items.as_slice()),
        _ => Err(malformed(kind, "contents must be a two-element array")),
    }
}

fn seconds_from(value: &Value) -> Option<u64> {
    if let Some(secs) = value.as_u64() {
        return Some(secs);
    }
    value
        .as_f64()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| secs.floor() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_invariants() {
        assert!(Event::progress(0, 10).validate().is_ok());
        assert!(Event::progress(10, 10).validate().is_ok());
        assert!(matches!(Event::progress(11, 10).validate(), Err(AppError::MalformedEvent(_))));
        assert!(matches!(Event::progress(0, 0).validate(), Err(AppError::MalformedEvent(_))));
    }

    #[test]
    fn decodes_helper_messages() {
        assert_eq!(
            Event::from_json_line(r#"{"type": "progress", "contents": [3, 12]}"#).unwrap(),
            Event::progress(3, 12)
        );
        assert_eq!(
            Event::from_json_line(r#"{"type": "song_title", "contents": "Song A"}"#).unwrap(),
            Event::track_title("Song A")
        );
        assert_eq!(
            Event::from_json_line(r#"{"type": "eta_update", "contents": ["eta", 120.7]}"#).unwrap(),
            Event::eta_update("eta", 120)
        );
        assert_eq!(
            Event::from_json_line(r#"{"type": "KILL", "contents": null}"#).unwrap(),
            Event::Terminate
        );
    }

    #[test]
    fn eta_label_is_opaque() {
        let event = Event::from_json_line(r#"{"type": "eta_update", "contents": [7, 30]}"#).unwrap();
        assert_eq!(event, Event::eta_update("7", 30));
        assert_eq!(event.kind(), EventKind::EtaUpdate);
    }

    #[test]
    fn rejects_unknown_or_misshapen_messages() {
        for line in [
            r#"{"type": "volume", "contents": 3}"#,
            r#"{"type": "progress", "contents": [1]}"#,
            r#"{"type": "progress", "contents": [-1, 4]}"#,
            r#"{"type": "song_title", "contents": 5}"#,
            r#"{"type": "eta_update", "contents": ["x", -3]}"#,
            "not json",
        ] {
            assert!(
                matches!(Event::from_json_line(line), Err(AppError::MalformedEvent(_))),
                "accepted {}",
                line
            );
        }
    }

    #[test]
    fn invariant_violations_survive_decoding() {
        let event = Event::from_json_line(r#"{"type": "progress", "contents": [5, 4]}"#).unwrap();
        assert!(event.validate().is_err());
    }
}
