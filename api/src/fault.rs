use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Marker texts the control plane uses to report a rejected `If-Match`
/// precondition. Checked in one place so new markers only need adding here.
const CONFLICT_MARKERS: &[&str] = &[
    "If-Match header value passed",
    "VM_ETAG_MISMATCH",
    "VMM-30303",
];

pub(crate) fn is_conflict_marker(message: &str, code: Option<&str>) -> bool {
    CONFLICT_MARKERS
        .iter()
        .any(|marker| message.contains(marker) || code.is_some_and(|code| code.contains(marker)))
}

/// Error codes may arrive as strings or bare numbers; normalize both to a
/// string.
pub(crate) fn deserialize_code<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match value {
        Value::String(code) => Some(code),
        Value::Number(code) => Some(code.to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }))
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    data: Option<EnvelopeData>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    #[serde(default)]
    error: Option<ErrorField>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorField {
    Entries(Vec<EnvelopeEntry>),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct EnvelopeEntry {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, deserialize_with = "deserialize_code")]
    code: Option<String>,
}

/// One normalized message from a remote error envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultMessage {
    pub message: String,
    pub code: Option<String>,
}

/// Parsed form of the control plane's opaque error body:
/// `{ "data": { "error": [ { "message", "code"? } ] } }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFault {
    // Non-empty: `parse` refuses envelopes with no usable entries.
    messages: Vec<FaultMessage>,
}

impl RemoteFault {
    /// Parse defensively: malformed JSON, a missing `data.error` field, or
    /// entries carrying neither message nor code all yield `None` rather
    /// than a panic, so the caller can fall back to the raw body.
    pub fn parse(raw: &str) -> Option<Self> {
        let envelope: ErrorEnvelope = serde_json::from_str(raw).ok()?;
        let messages = match envelope.data?.error? {
            ErrorField::Text(message) => vec![FaultMessage {
                message,
                code: None,
            }],
            ErrorField::Entries(entries) => entries
                .into_iter()
                .filter_map(|entry| match (entry.message, entry.code) {
                    (Some(message), code) => Some(FaultMessage { message, code }),
                    (None, Some(code)) => Some(FaultMessage {
                        message: code.clone(),
                        code: Some(code),
                    }),
                    (None, None) => None,
                })
                .collect(),
        };
        if messages.is_empty() {
            return None;
        }
        Some(RemoteFault { messages })
    }

    /// Whether any reported message or code matches a known precondition
    /// rejection marker.
    pub fn is_conflict(&self) -> bool {
        self.messages
            .iter()
            .any(|entry| is_conflict_marker(&entry.message, entry.code.as_deref()))
    }

    pub fn primary(&self) -> &FaultMessage {
        &self.messages[0]
    }

    pub fn entries(&self) -> &[FaultMessage] {
        &self.messages
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages
            .iter()
            .map(|entry| entry.message.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_error_envelope() {
        let fault = RemoteFault::parse(
            r#"{"data":{"error":[{"message":"vm not powered on","code":"VMM-5001"}]}}"#,
        )
        .unwrap();
        assert_eq!(fault.primary().message, "vm not powered on");
        assert_eq!(fault.primary().code.as_deref(), Some("VMM-5001"));
        assert!(!fault.is_conflict());
    }

    #[test]
    fn keeps_every_entry() {
        let fault = RemoteFault::parse(
            r#"{"data":{"error":[{"message":"disk full"},{"message":"retry later"}]}}"#,
        )
        .unwrap();
        assert_eq!(fault.messages(), vec!["disk full", "retry later"]);
    }

    #[test]
    fn numeric_codes_are_stringified() {
        let fault =
            RemoteFault::parse(r#"{"data":{"error":[{"message":"boom","code":30303}]}}"#).unwrap();
        assert_eq!(fault.primary().code.as_deref(), Some("30303"));
    }

    #[test]
    fn code_only_entries_survive() {
        let fault = RemoteFault::parse(r#"{"data":{"error":[{"code":"VMM-9"}]}}"#).unwrap();
        assert_eq!(fault.messages(), vec!["VMM-9"]);
    }

    #[test]
    fn malformed_bodies_parse_to_none() {
        assert!(RemoteFault::parse("<html>502 Bad Gateway</html>").is_none());
        assert!(RemoteFault::parse(r#"{"data":{}}"#).is_none());
        assert!(RemoteFault::parse(r#"{"data":{"error":[]}}"#).is_none());
        assert!(RemoteFault::parse(r#"{"data":{"error":[{}]}}"#).is_none());
    }

    #[test]
    fn recognizes_conflict_markers() {
        let by_message = RemoteFault::parse(
            r#"{"data":{"error":[{"message":"The If-Match header value passed is stale"}]}}"#,
        )
        .unwrap();
        assert!(by_message.is_conflict());

        let by_code = RemoteFault::parse(
            r#"{"data":{"error":[{"message":"precondition failed","code":"VMM-30303"}]}}"#,
        )
        .unwrap();
        assert!(by_code.is_conflict());

        let etag_mismatch =
            RemoteFault::parse(r#"{"data":{"error":[{"message":"VM_ETAG_MISMATCH"}]}}"#).unwrap();
        assert!(etag_mismatch.is_conflict());
    }
}
