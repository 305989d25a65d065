//! Core data models: agent turn results, draft identifications, and
//! persisted collection records.
//!
//! Serialized field names are camelCase so `collection.json` and the
//! agent wire schema stay compatible with the browser client.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ═══════════════════════════════════════════════════════════════════════
// Agent turn results
// ═══════════════════════════════════════════════════════════════════════

/// Status tag of an [`AgentResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Complete,
    ClarificationNeeded,
    Error,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Complete => "complete",
            ResponseStatus::ClarificationNeeded => "clarification_needed",
            ResponseStatus::Error => "error",
        }
    }
}

/// The payload of one turn. Exactly one of record, question or error
/// exists, and it always matches the status.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Complete(DraftRecord),
    ClarificationNeeded(AgentQuestion),
    Error(String),
}

/// Result of a single agent turn. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentResponse {
    /// Human-readable trace of the reasoning step, in order.
    pub logs: Vec<String>,
    pub outcome: Outcome,
}

impl AgentResponse {
    pub fn complete(logs: Vec<String>, record: DraftRecord) -> Self {
        Self {
            logs,
            outcome: Outcome::Complete(record),
        }
    }

    pub fn clarification(logs: Vec<String>, question: AgentQuestion) -> Self {
        Self {
            logs,
            outcome: Outcome::ClarificationNeeded(question),
        }
    }

    /// An error turn whose single log line mirrors the message.
    pub fn error(context: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            logs: vec![format!("{}: {}", context, message)],
            outcome: Outcome::Error(message),
        }
    }

    pub fn status(&self) -> ResponseStatus {
        match self.outcome {
            Outcome::Complete(_) => ResponseStatus::Complete,
            Outcome::ClarificationNeeded(_) => ResponseStatus::ClarificationNeeded,
            Outcome::Error(_) => ResponseStatus::Error,
        }
    }

    pub fn record(&self) -> Option<&DraftRecord> {
        match &self.outcome {
            Outcome::Complete(record) => Some(record),
            _ => None,
        }
    }

    pub fn question(&self) -> Option<&AgentQuestion> {
        match &self.outcome {
            Outcome::ClarificationNeeded(question) => Some(question),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// Flat wire shape shared by the backend schema and `--json` output.
#[derive(Serialize)]
struct AgentResponseWire<'a> {
    logs: &'a [String],
    status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    question: Option<&'a AgentQuestion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<&'a DraftRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl Serialize for AgentResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        AgentResponseWire {
            logs: &self.logs,
            status: self.status(),
            question: self.question(),
            record: self.record(),
            error: self.error_message(),
        }
        .serialize(serializer)
    }
}

/// How the user is expected to answer a clarification question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Text,
    Choice,
    ImageRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub label: String,
    pub value: String,
}

/// A disambiguating question from the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentQuestion {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub options: Vec<QuestionOption>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub allow_image_upload: bool,
}

// ═══════════════════════════════════════════════════════════════════════
// Records
// ═══════════════════════════════════════════════════════════════════════

/// The agent's proposed identification, not yet persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub artist: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub year: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub label: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub catalog_number: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub country: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub format: String,
    /// Free-text range, e.g. `"$25 – $300 (Median: $60)"`.
    #[serde(default, deserialize_with = "lenient_string")]
    pub estimated_price: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub discogs_url: String,
    #[serde(
        default,
        deserialize_with = "lenient_release_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub discogs_release_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_warning: Option<String>,
}

/// A persisted collection entry. Never edited after creation; only
/// removed as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VinylRecord {
    pub id: String,
    pub artist: String,
    pub title: String,
    pub year: String,
    pub label: String,
    pub catalog_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    pub estimated_price: String,
    pub discogs_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discogs_release_id: Option<u64>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub images: Vec<String>,
    /// Creation time in milliseconds since the Unix epoch.
    pub date_added: i64,
}

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_PRICE: &str = "N/A";

impl VinylRecord {
    /// Finalize a confirmed draft into a collection record.
    ///
    /// This is the only place optional fields get their defaults:
    /// artist `"Unknown Artist"`, title `"Unknown Title"`, estimated price
    /// `"N/A"`, and an empty string for every other missing text field.
    /// Country, format and condition become `None` when blank.
    pub fn from_draft(draft: DraftRecord, images: Vec<String>, condition: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            artist: or_default(draft.artist, UNKNOWN_ARTIST),
            title: or_default(draft.title, UNKNOWN_TITLE),
            year: draft.year.trim().to_string(),
            label: draft.label.trim().to_string(),
            catalog_number: draft.catalog_number.trim().to_string(),
            country: non_blank(draft.country),
            condition: condition.and_then(non_blank),
            estimated_price: or_default(draft.estimated_price, UNKNOWN_PRICE),
            discogs_url: draft.discogs_url.trim().to_string(),
            discogs_release_id: draft.discogs_release_id,
            description: draft.description.trim().to_string(),
            format: non_blank(draft.format),
            images,
            date_added: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// `"Artist - Title"`, used for display and export folder names.
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }
}

fn or_default(value: String, default: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// ═══════════════════════════════════════════════════════════════════════
// Lenient decoding: models emit years and release ids as strings or numbers
// ═══════════════════════════════════════════════════════════════════════

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Str(String),
    Int(i64),
    Float(f64),
}

/// Models send `null` for fields they could not read; treat it like an
/// absent key.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Option::<StringOrNumber>::deserialize(deserializer)? {
        None => String::new(),
        Some(StringOrNumber::Str(s)) => s,
        Some(StringOrNumber::Int(n)) => n.to_string(),
        Some(StringOrNumber::Float(f)) => f.to_string(),
    })
}

fn lenient_release_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Ok(match Option::<StringOrNumber>::deserialize(deserializer)? {
        None => None,
        Some(StringOrNumber::Int(n)) => u64::try_from(n).ok().filter(|id| *id > 0),
        Some(StringOrNumber::Float(f)) if f >= 1.0 && f.fract() == 0.0 => Some(f as u64),
        Some(StringOrNumber::Float(_)) => None,
        Some(StringOrNumber::Str(s)) => s
            .trim()
            .trim_start_matches('r')
            .parse::<u64>()
            .ok()
            .filter(|id| *id > 0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_draft_applies_defaults() {
        let draft = DraftRecord {
            artist: "  ".to_string(),
            country: "".to_string(),
            format: "LP, Album".to_string(),
            ..Default::default()
        };
        let record = VinylRecord::from_draft(draft, vec!["https://i.example/1.jpg".into()], None);

        assert_eq!(record.artist, UNKNOWN_ARTIST);
        assert_eq!(record.title, UNKNOWN_TITLE);
        assert_eq!(record.estimated_price, UNKNOWN_PRICE);
        assert_eq!(record.label, "");
        assert_eq!(record.catalog_number, "");
        assert_eq!(record.country, None);
        assert_eq!(record.format.as_deref(), Some("LP, Album"));
        assert_eq!(record.images.len(), 1);
        assert!(record.date_added > 0);
        assert!(uuid::Uuid::parse_str(&record.id).is_ok());
    }

    #[test]
    fn test_from_draft_assigns_unique_ids() {
        let a = VinylRecord::from_draft(DraftRecord::default(), vec![], None);
        let b = VinylRecord::from_draft(DraftRecord::default(), vec![], None);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_blank_condition_is_dropped() {
        let r = VinylRecord::from_draft(DraftRecord::default(), vec![], Some(" ".into()));
        assert_eq!(r.condition, None);
        let r = VinylRecord::from_draft(DraftRecord::default(), vec![], Some("VG+".into()));
        assert_eq!(r.condition.as_deref(), Some("VG+"));
    }

    #[test]
    fn test_draft_accepts_numeric_year_and_string_release_id() {
        let draft: DraftRecord = serde_json::from_str(
            r#"{"artist":"Can","title":"Tago Mago","year":1971,"discogsReleaseId":"r123456","isValid":true}"#,
        )
        .unwrap();
        assert_eq!(draft.year, "1971");
        assert_eq!(draft.discogs_release_id, Some(123456));
        assert!(draft.is_valid);
    }

    #[test]
    fn test_draft_null_release_id() {
        let draft: DraftRecord =
            serde_json::from_str(r#"{"artist":"Can","discogsReleaseId":null,"year":null}"#).unwrap();
        assert_eq!(draft.discogs_release_id, None);
        assert_eq!(draft.year, "");
    }

    #[test]
    fn test_response_serializes_flat_wire_shape() {
        let resp = AgentResponse::error("Error processing reply", "timeout");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "timeout");
        assert!(json.get("question").is_none());
        assert!(json.get("record").is_none());
        assert_eq!(json["logs"][0], "Error processing reply: timeout");
    }

    #[test]
    fn test_vinyl_record_json_uses_camel_case() {
        let record = VinylRecord::from_draft(
            DraftRecord {
                catalog_number: "SHVL 804".into(),
                ..Default::default()
            },
            vec![],
            None,
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["catalogNumber"], "SHVL 804");
        assert!(json["dateAdded"].is_i64());
    }
}
