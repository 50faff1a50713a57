//! Parse raw model output into a validated label and confidence

use paperclerk_domain::{Confidence, Label};
use serde_json::Value;

/// Model response after validation at the boundary
///
/// Raw payloads are never trusted: either they yield a normalized label and a
/// clamped confidence, or they are a parse error carrying the reason.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    /// A usable answer
    Label {
        /// Normalized label text (`unclear` when the model gave up)
        label: String,
        /// Confidence clamped into `[0, 1]`
        confidence: Confidence,
    },
    /// The payload could not be turned into an answer
    ParseError(String),
}

const LABEL_KEYS: [&str; 3] = ["label", "sender_canonical", "sender"];

const UNCLEAR_ALIASES: [&str; 5] = ["unclear", "unknown", "none", "n/a", "unbekannt"];

/// Parse a raw model response
pub fn parse_response(raw: &str) -> ParsedResponse {
    let Some(json) = extract_json(raw) else {
        return ParsedResponse::ParseError("no JSON object in response".to_string());
    };

    let value: Value = match serde_json::from_str(json) {
        Ok(value) => value,
        Err(e) => return ParsedResponse::ParseError(format!("JSON parse error: {}", e)),
    };

    let Some(obj) = value.as_object() else {
        return ParsedResponse::ParseError("expected a JSON object".to_string());
    };

    let Some(raw_label) = LABEL_KEYS
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str))
    else {
        return ParsedResponse::ParseError("missing or invalid 'label'".to_string());
    };

    let label = normalize_label(raw_label);
    if label.is_empty() {
        return ParsedResponse::ParseError("empty label".to_string());
    }

    let confidence = match obj.get("confidence") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let Some(confidence) = confidence.filter(|c| c.is_finite()) else {
        return ParsedResponse::ParseError("missing or invalid 'confidence'".to_string());
    };

    ParsedResponse::Label {
        label,
        confidence: Confidence::clamped(confidence),
    }
}

/// Normalize a proposed label
///
/// Collapses whitespace, strips surrounding quotes and punctuation, and maps
/// the model's ways of giving up onto the unclear sentinel.
pub fn normalize_label(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '.' | '-' | '_' | '“' | '”' | '„' | ' '))
        .to_string();

    if UNCLEAR_ALIASES
        .iter()
        .any(|alias| trimmed.eq_ignore_ascii_case(alias))
    {
        return Label::UNCLEAR.to_string();
    }
    trimmed
}

/// Locate the JSON object in a response
///
/// Handles markdown code fences and leading or trailing chatter by taking the
/// first balanced `{...}` span.
fn extract_json(response: &str) -> Option<&str> {
    let trimmed = response.trim();
    let body = if trimmed.starts_with("```") {
        let after_fence = trimmed.find('\n').map(|i| &trimmed[i + 1..])?;
        after_fence.trim_end().trim_end_matches("```")
    } else {
        trimmed
    };

    let start = body.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in body[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&body[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(label: &str, confidence: f64) -> ParsedResponse {
        ParsedResponse::Label {
            label: label.to_string(),
            confidence: Confidence::clamped(confidence),
        }
    }

    #[test]
    fn test_parse_valid_json() {
        let parsed = parse_response(r#"{"label": "Stadtwerke", "confidence": 0.92}"#);
        assert_eq!(parsed, label("Stadtwerke", 0.92));
    }

    #[test]
    fn test_parse_json_with_markdown_wrapper() {
        let response = "```json\n{\"label\": \"Finanzamt\", \"confidence\": 0.7}\n```";
        assert_eq!(parse_response(response), label("Finanzamt", 0.7));
    }

    #[test]
    fn test_parse_json_with_chatter() {
        let response = r#"Sure! Here is the answer: {"label": "AOK {Bayern}", "confidence": "0.8"} Hope it helps."#;
        assert_eq!(parse_response(response), label("AOK {Bayern}", 0.8));
    }

    #[test]
    fn test_original_schema_key_accepted() {
        let response = r#"{"sender_canonical": "Telekom", "confidence": 0.9, "evidence": []}"#;
        assert_eq!(parse_response(response), label("Telekom", 0.9));
    }

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(
            parse_response(r#"{"label": "X", "confidence": 7}"#),
            label("X", 1.0)
        );
        assert_eq!(
            parse_response(r#"{"label": "X", "confidence": -1}"#),
            label("X", 0.0)
        );
    }

    #[test]
    fn test_unclear_aliases() {
        assert_eq!(
            parse_response(r#"{"label": " Unknown ", "confidence": 0.1}"#),
            label("unclear", 0.1)
        );
        assert_eq!(normalize_label("\"  Deutsche   Bahn. \""), "Deutsche Bahn");
    }

    #[test]
    fn test_malformed_responses() {
        for raw in [
            "",
            "I think it is an invoice",
            "[1, 2, 3]",
            r#"{"label": "X"}"#,
            r#"{"confidence": 0.5}"#,
            r#"{"label": "  ", "confidence": 0.5}"#,
            r#"{"label": "X", "confidence": "high"}"#,
            r#"{"label": "X", "confidence": 0.5"#,
        ] {
            assert!(
                matches!(parse_response(raw), ParsedResponse::ParseError(_)),
                "expected parse error for {:?}",
                raw
            );
        }
    }
}
