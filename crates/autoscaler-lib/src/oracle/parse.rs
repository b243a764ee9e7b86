//! Reply extraction and decision validation

use crate::models::{Action, Decision};
use serde_json::Value;

/// Pull the model's text out of a response envelope.
///
/// Tries `choices[0].message.content`, `choices[0].text`, a `content` list of
/// text blocks, then a flat `completion`. Falls back to the raw body so the
/// parser still gets to see whatever arrived.
pub fn extract_text(body: &str) -> String {
    let Ok(envelope) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };

    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
    let choice = envelope.pointer("/choices/0");

    choice
        .and_then(|c| c.pointer("/message/content"))
        .and_then(Value::as_str)
        .and_then(non_empty)
        .or_else(|| {
            choice
                .and_then(|c| c.get("text"))
                .and_then(Value::as_str)
                .and_then(non_empty)
        })
        .or_else(|| content_blocks(&envelope))
        .or_else(|| {
            envelope
                .get("completion")
                .and_then(Value::as_str)
                .and_then(non_empty)
        })
        .unwrap_or_else(|| body.to_string())
}

fn content_blocks(envelope: &Value) -> Option<String> {
    let text: String = envelope
        .get("content")?
        .as_array()?
        .iter()
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect();
    (!text.is_empty()).then_some(text)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = match rest.split_once('\n') {
        Some((tag, body)) if !tag.contains('{') => body,
        // Body starts on the fence line: drop an optional language tag glued to it
        _ => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    let body = body.trim();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Parse oracle text into a validated decision.
///
/// Returns `None` when the text is not a JSON object at all; schema problems
/// inside an object still produce a `noop` decision.
pub fn try_parse_decision(text: &str) -> Option<Decision> {
    let cleaned = strip_code_fence(text.trim());
    match serde_json::from_str::<Value>(cleaned) {
        Ok(value @ Value::Object(_)) => Some(decision_from_value(&value)),
        _ => None,
    }
}

/// Parse oracle text into a validated decision; never fails
pub fn parse_decision(text: &str) -> Decision {
    try_parse_decision(text).unwrap_or_else(Decision::bad_json)
}

/// Whole-number replica count, saturated into `i64`; bounds clamp it later
fn integer_replicas(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_u64().map(|n| i64::try_from(n).unwrap_or(i64::MAX)))
        .or_else(|| {
            value
                .as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        })
}

fn decision_from_value(value: &Value) -> Decision {
    let raw_action = value.get("action");
    let Some(action) = raw_action.and_then(Value::as_str).and_then(Action::parse) else {
        let shown = raw_action.map_or_else(|| "missing".to_string(), Value::to_string);
        return Decision::noop(format!("invalid-action: {}", shown));
    };

    Decision {
        action,
        replicas: value.get("replicas").and_then(integer_replicas),
        reason: value
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        confidence: value
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.0),
    }
    .validated()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_choices() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"action\":\"noop\"}"}}]}"#;
        assert_eq!(extract_text(body), r#"{"action":"noop"}"#);
    }

    #[test]
    fn test_extract_from_content_blocks() {
        let body = r#"{"id":"msg_1","content":[{"type":"text","text":"{\"action\":"},{"type":"text","text":"\"restart\"}"}]}"#;
        assert_eq!(extract_text(body), r#"{"action":"restart"}"#);
    }

    #[test]
    fn test_extract_from_completion() {
        let body = r#"{"completion":"{\"action\":\"noop\"}","stop_reason":"stop_sequence"}"#;
        assert_eq!(extract_text(body), r#"{"action":"noop"}"#);
    }

    #[test]
    fn test_choices_take_precedence_over_completion() {
        let body = r#"{"choices":[{"message":{"content":"first"}}],"completion":"second"}"#;
        assert_eq!(extract_text(body), "first");
    }

    #[test]
    fn test_extract_falls_back_to_raw_body() {
        assert_eq!(extract_text("plain words"), "plain words");
        let body = r#"{"action":"scale","replicas":3}"#;
        assert_eq!(extract_text(body), body);
    }

    #[test]
    fn test_parse_scale_decision() {
        let decision = parse_decision(
            r#"{"action":"scale","replicas":4,"reason":"high load","confidence":0.9}"#,
        );
        assert_eq!(decision.action, Action::Scale);
        assert_eq!(decision.replicas, Some(4));
        assert_eq!(decision.reason, "high load");
        assert_eq!(decision.confidence, 0.9);
    }

    #[test]
    fn test_parse_failure_is_bad_json_noop() {
        let decision = parse_decision("I think you should scale up to 4 replicas.");
        assert_eq!(decision, Decision::bad_json());
        assert_eq!(decision.action, Action::Noop);
        assert_eq!(decision.reason, "bad-json");
        assert_eq!(decision.confidence, 0.0);
        assert_eq!(decision.replicas, None);
    }

    #[test]
    fn test_non_object_json_is_bad_json() {
        assert_eq!(parse_decision("[1, 2]"), Decision::bad_json());
        assert_eq!(parse_decision("\"scale\""), Decision::bad_json());
    }

    #[test]
    fn test_code_fence_is_stripped() {
        let decision = parse_decision("```json\n{\"action\":\"restart\",\"reason\":\"stuck\",\"confidence\":0.7}\n```");
        assert_eq!(decision.action, Action::Restart);
        assert_eq!(decision.reason, "stuck");
    }

    #[test]
    fn test_single_line_code_fence_is_stripped() {
        let decision = parse_decision(r#"```{"action":"noop","reason":"steady"}```"#);
        assert_eq!(decision.action, Action::Noop);
        assert_eq!(decision.reason, "steady");

        let decision = parse_decision(r#"```json{"action":"restart","reason":"stuck"}```"#);
        assert_eq!(decision.action, Action::Restart);

        let decision = parse_decision("```{\"action\":\"restart\"}\n```");
        assert_eq!(decision.action, Action::Restart);
    }

    #[test]
    fn test_reason_text_bad_json_is_not_a_parse_failure() {
        let reply = r#"{"action":"noop","reason":"bad-json","confidence":0.4}"#;
        let decision = try_parse_decision(reply).expect("valid object");
        assert_eq!(decision.reason, "bad-json");
        assert_eq!(decision.confidence, 0.4);

        assert_eq!(try_parse_decision("not json"), None);
    }

    #[test]
    fn test_unknown_action_becomes_noop() {
        let decision = parse_decision(r#"{"action":"explode","replicas":3,"confidence":1}"#);
        assert_eq!(decision.action, Action::Noop);
        assert_eq!(decision.reason, r#"invalid-action: "explode""#);
        assert_eq!(decision.confidence, 0.0);

        let decision = parse_decision(r#"{"replicas":3}"#);
        assert_eq!(decision.reason, "invalid-action: missing");
    }

    #[test]
    fn test_scale_with_non_integer_replicas_becomes_noop() {
        for body in [
            r#"{"action":"scale","replicas":4.5,"confidence":0.9}"#,
            r#"{"action":"scale","replicas":"4","confidence":0.9}"#,
            r#"{"action":"scale","replicas":null,"confidence":0.9}"#,
            r#"{"action":"scale","confidence":0.9}"#,
        ] {
            let decision = parse_decision(body);
            assert_eq!(decision.action, Action::Noop, "{}", body);
            assert_eq!(decision.reason, "invalid-replicas", "{}", body);
        }
    }

    #[test]
    fn test_whole_number_replicas_are_accepted() {
        let decision = parse_decision(r#"{"action":"scale","replicas":4.0,"confidence":0.9}"#);
        assert_eq!(decision.action, Action::Scale);
        assert_eq!(decision.replicas, Some(4));

        let decision = parse_decision(
            r#"{"action":"scale","replicas":18446744073709551615,"confidence":0.9}"#,
        );
        assert_eq!(decision.action, Action::Scale);
        assert_eq!(decision.replicas, Some(i64::MAX));

        let decision = parse_decision(r#"{"action":"scale","replicas":1e30,"confidence":0.9}"#);
        assert_eq!(decision.replicas, Some(i64::MAX));

        let decision = parse_decision(r#"{"action":"scale","replicas":-3,"confidence":0.9}"#);
        assert_eq!(decision.replicas, Some(-3));
    }

    #[test]
    fn test_missing_confidence_defaults_to_zero() {
        let decision = parse_decision(r#"{"action":"noop","reason":"steady"}"#);
        assert_eq!(decision.confidence, 0.0);
        assert_eq!(decision.reason, "steady");
    }
}
