//! HTTP security headers

use audit_graph::{EvidenceItem, Severity};
use serde_json::{Map, Value};

use super::{origin_of, FindingCandidate, FindingExtractor, MalformedPayload};
use crate::catalog::{TestRef, ToolKind};

/// Missing security headers
pub struct HeadersExtractor;

impl FindingExtractor for HeadersExtractor {
    fn tool(&self) -> ToolKind {
        ToolKind::Headers
    }

    fn extract(&self, payload: &Value, fallback_target: &str) -> Result<Vec<FindingCandidate>, MalformedPayload> {
        let Some(object) = payload.as_object() else {
            return Err(MalformedPayload("header payload is not an object".into()));
        };
        let headers = match object.get("headers") {
            Some(Value::Object(headers)) => lowercase(headers),
            Some(_) => return Err(MalformedPayload("headers is not an object".into())),
            None => lowercase(object),
        };

        let origin = pick_origin(payload, &headers)
            .or_else(|| origin_of(fallback_target))
            .ok_or_else(|| MalformedPayload("header payload has no usable url or host".into()))?;

        let csp = header(&headers, "content-security-policy");
        let xfo = header(&headers, "x-frame-options");
        let xcto = header(&headers, "x-content-type-options");
        let referrer = header(&headers, "referrer-policy");

        let mut problems = Vec::new();
        if csp.is_none() {
            problems.push("Content-Security-Policy missing".to_string());
        }
        if xfo.is_none() {
            problems.push("X-Frame-Options missing".to_string());
        }
        match &xcto {
            Some(value) if value.trim().eq_ignore_ascii_case("nosniff") => {}
            Some(value) => problems.push(format!("X-Content-Type-Options is '{}', expected nosniff", value)),
            None => problems.push("X-Content-Type-Options missing".to_string()),
        }
        if referrer.is_none() {
            problems.push("Referrer-Policy missing".to_string());
        }

        if problems.is_empty() {
            return Ok(Vec::new());
        }

        let or_missing = |value: Option<String>| value.unwrap_or_else(|| "missing".into());
        Ok(vec![FindingCandidate {
            id: format!("headers:{}", origin),
            test: TestRef::ToolDefault,
            title: "Missing or weak security headers".into(),
            severity: Severity::Moderate,
            reason: problems.join("; "),
            evidence: vec![
                EvidenceItem::new("csp_present", csp.is_some().to_string()),
                EvidenceItem::new("xfo_value", or_missing(xfo)),
                EvidenceItem::new("xcto_value", or_missing(xcto)),
                EvidenceItem::new("referrer_policy_value", or_missing(referrer)),
                EvidenceItem::new("host", origin),
            ],
        }])
    }
}

fn lowercase(headers: &Map<String, Value>) -> Map<String, Value> {
    headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
        .collect()
}

/// Header value as text; repeated headers are joined with `, `
fn header(headers: &Map<String, Value>, name: &str) -> Option<String> {
    match headers.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Array(values) => Some(
            values
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn pick_origin(payload: &Value, headers: &Map<String, Value>) -> Option<String> {
    let request = payload.get("request");
    let candidates = [
        payload.get("url"),
        payload.get("finalUrl"),
        payload.get("requestUrl"),
        payload.get("origin"),
        payload.get("host"),
        payload.get("target"),
        request.and_then(|r| r.get("url")),
        request.and_then(|r| r.get("host")),
        headers.get("host"),
    ];
    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .find_map(origin_of)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_headers_create_one_finding() {
        let payload = json!({
            "url": "https://example.com/landing",
            "headers": { "X-Content-Type-Options": "nosniff", "X-Frame-Options": "DENY" }
        });

        let candidates = HeadersExtractor.extract(&payload, "https://fallback.example/").unwrap();

        assert_eq!(candidates.len(), 1);
        let finding = &candidates[0];
        assert_eq!(finding.id, "headers:https://example.com");
        assert_eq!(finding.reason, "Content-Security-Policy missing; Referrer-Policy missing");
        let csp = finding.evidence.iter().find(|e| e.key == "csp_present").unwrap();
        assert_eq!(csp.value, "false");
        let xfo = finding.evidence.iter().find(|e| e.key == "xfo_value").unwrap();
        assert_eq!(xfo.value, "DENY");
    }

    #[test]
    fn test_flat_header_map_uses_fallback_origin() {
        let payload = json!({
            "content-security-policy": "default-src 'self'",
            "x-frame-options": "SAMEORIGIN",
            "x-content-type-options": "sniff",
            "referrer-policy": "no-referrer"
        });

        let candidates = HeadersExtractor.extract(&payload, "https://shop.example/cart").unwrap();

        assert_eq!(candidates[0].id, "headers:https://shop.example");
        assert!(candidates[0].reason.contains("expected nosniff"));
    }

    #[test]
    fn test_all_headers_present_is_clean() {
        let payload = json!({
            "url": "https://example.com",
            "headers": {
                "content-security-policy": "default-src 'self'",
                "x-frame-options": "DENY",
                "x-content-type-options": "nosniff",
                "referrer-policy": "strict-origin"
            }
        });
        assert!(HeadersExtractor.extract(&payload, "").unwrap().is_empty());
    }

    #[test]
    fn test_no_origin_is_malformed() {
        assert!(HeadersExtractor.extract(&json!({ "headers": {} }), "").is_err());
        assert!(HeadersExtractor.extract(&json!([1, 2]), "").is_err());
    }
}
