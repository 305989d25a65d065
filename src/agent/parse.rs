//! Decoding of backend replies into [`AgentResponse`] values.
//!
//! Models sometimes wrap the JSON in a markdown code fence despite the
//! instructions, so the first fenced block is unwrapped before parsing.
//! The decoded object is then checked against the variant its `status`
//! names; a reply that fits none of the three variants is a
//! [`SchemaError`].

use serde::Deserialize;

use crate::error::SchemaError;
use crate::models::{AgentQuestion, AgentResponse, DraftRecord, QuestionKind, ResponseStatus};

const FENCE: &str = "```";

/// Message used when the backend reported an error without text.
const UNSPECIFIED_ERROR: &str = "The agent reported an error without a message";

#[derive(Deserialize)]
struct RawAgentResponse {
    #[serde(default, deserialize_with = "crate::models::null_as_default")]
    logs: Vec<String>,
    status: ResponseStatus,
    #[serde(default)]
    question: Option<AgentQuestion>,
    #[serde(default)]
    record: Option<DraftRecord>,
    #[serde(default)]
    error: Option<String>,
}

/// Return the contents of the first fenced block, or the whole text
/// trimmed when there is no complete fence.
///
/// A language tag after the opening fence (`json`, `JSON`, `jsonc`) is
/// dropped.
pub fn strip_fence(text: &str) -> &str {
    let Some(open) = text.find(FENCE) else {
        return text.trim();
    };
    let after_open = &text[open + FENCE.len()..];
    let tag_len = after_open
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(after_open.len());
    let body = &after_open[tag_len..];
    match body.find(FENCE) {
        Some(close) => body[..close].trim(),
        None => text.trim(),
    }
}

/// Parse a backend reply (fenced or not) into a validated response.
pub fn parse_response(text: &str) -> Result<AgentResponse, SchemaError> {
    let raw: RawAgentResponse = serde_json::from_str(strip_fence(text))?;

    match raw.status {
        ResponseStatus::Complete => {
            let record = raw.record.ok_or(SchemaError::MissingPayload {
                status: "complete",
                field: "record",
            })?;
            Ok(AgentResponse::complete(raw.logs, record))
        }
        ResponseStatus::ClarificationNeeded => {
            let question = raw.question.ok_or(SchemaError::MissingPayload {
                status: "clarification_needed",
                field: "question",
            })?;
            validate_question(&question)?;
            Ok(AgentResponse::clarification(raw.logs, question))
        }
        ResponseStatus::Error => {
            let message = raw
                .error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| UNSPECIFIED_ERROR.to_string());
            Ok(AgentResponse {
                logs: raw.logs,
                outcome: crate::models::Outcome::Error(message),
            })
        }
    }
}

fn validate_question(question: &AgentQuestion) -> Result<(), SchemaError> {
    if question.text.trim().is_empty() {
        return Err(SchemaError::InvalidQuestion("question text is empty".into()));
    }
    if question.kind == QuestionKind::Choice && question.options.is_empty() {
        return Err(SchemaError::InvalidQuestion(
            "choice question has no options".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLARIFY: &str = r#"{"status":"clarification_needed","logs":["Read SHVL 804 on the spine"],"question":{"text":"Which pressing?","type":"choice","options":[{"label":"1973 UK","value":"UK-1973-SHVL804"},{"label":"Not sure","value":"unsure"}]}}"#;

    #[test]
    fn test_strip_fence_plain_text() {
        assert_eq!(strip_fence("  {\"a\":1}\n"), "{\"a\":1}");
    }

    #[test]
    fn test_strip_fence_json_tag() {
        assert_eq!(strip_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn test_strip_fence_uppercase_tag() {
        assert_eq!(strip_fence("```JSON\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fence("```jsonc\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn test_strip_fence_bare_fence_with_prose() {
        let text = "Here you go:\n```\n{\"a\":1}\n```\nThanks!";
        assert_eq!(strip_fence(text), "{\"a\":1}");
    }

    #[test]
    fn test_strip_fence_unterminated_keeps_text() {
        assert_eq!(strip_fence("```json\n{\"a\":1}"), "```json\n{\"a\":1}");
    }

    #[test]
    fn test_fenced_and_plain_parse_identically() {
        let fenced = format!("```json\n{}\n```", CLARIFY);
        assert_eq!(
            parse_response(&fenced).unwrap(),
            parse_response(CLARIFY).unwrap()
        );
    }

    #[test]
    fn test_parse_clarification() {
        let resp = parse_response(CLARIFY).unwrap();
        assert_eq!(resp.status(), ResponseStatus::ClarificationNeeded);
        let q = resp.question().unwrap();
        assert_eq!(q.kind, QuestionKind::Choice);
        assert_eq!(q.options.len(), 2);
        assert!(resp.record().is_none());
        assert!(resp.error_message().is_none());
    }

    #[test]
    fn test_parse_complete() {
        let resp = parse_response(
            r#"{"status":"complete","logs":["done"],"record":{"artist":"Pink Floyd","title":"The Dark Side of the Moon","isValid":true}}"#,
        )
        .unwrap();
        assert_eq!(resp.record().unwrap().artist, "Pink Floyd");
        assert_eq!(resp.logs, vec!["done".to_string()]);
    }

    #[test]
    fn test_complete_without_record_is_rejected() {
        let err = parse_response(r#"{"status":"complete","logs":[]}"#).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::MissingPayload { field: "record", .. }
        ));
    }

    #[test]
    fn test_choice_without_options_is_rejected() {
        let err = parse_response(
            r#"{"status":"clarification_needed","question":{"text":"Which?","type":"choice"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidQuestion(_)));
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!(parse_response(r#"{"status":"thinking","logs":[]}"#).is_err());
    }

    #[test]
    fn test_prose_is_rejected() {
        assert!(parse_response("I think this is Dark Side of the Moon.").is_err());
        assert!(parse_response("```json\nnot json\n```").is_err());
    }

    #[test]
    fn test_null_record_fields_read_as_empty() {
        let resp = parse_response(
            r#"{"status":"complete","logs":null,"record":{"artist":"Pink Floyd","title":"Animals","country":null,"catalogNumber":null,"year":null,"discogsReleaseId":null,"isValid":null}}"#,
        )
        .unwrap();
        let record = resp.record().unwrap();
        assert_eq!(record.artist, "Pink Floyd");
        assert_eq!(record.country, "");
        assert_eq!(record.catalog_number, "");
        assert_eq!(record.year, "");
        assert_eq!(record.discogs_release_id, None);
        assert!(!record.is_valid);
        assert!(resp.logs.is_empty());
    }

    #[test]
    fn test_text_question_with_null_options() {
        let resp = parse_response(
            r#"{"status":"clarification_needed","logs":["Label is worn"],"question":{"text":"What is printed on the runout?","type":"text","options":null,"allowImageUpload":null}}"#,
        )
        .unwrap();
        let q = resp.question().unwrap();
        assert_eq!(q.kind, QuestionKind::Text);
        assert!(q.options.is_empty());
        assert!(!q.allow_image_upload);
    }

    #[test]
    fn test_choice_with_null_options_is_rejected() {
        let err = parse_response(
            r#"{"status":"clarification_needed","question":{"text":"Which?","type":"choice","options":null}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidQuestion(_)));
    }

    #[test]
    fn test_error_without_message_gets_default() {
        let resp = parse_response(r#"{"status":"error"}"#).unwrap();
        assert_eq!(resp.error_message(), Some(UNSPECIFIED_ERROR));
        assert!(resp.logs.is_empty());
    }
}
