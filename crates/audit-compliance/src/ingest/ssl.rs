//! SSL Labs analysis

use audit_graph::{EvidenceItem, Severity};
use serde_json::Value;

use super::{str_field, FindingCandidate, FindingExtractor, MalformedPayload};
use crate::catalog::{TestRef, ToolKind};

/// One finding per endpoint when no endpoint reaches A
pub struct SslExtractor;

impl FindingExtractor for SslExtractor {
    fn tool(&self) -> ToolKind {
        ToolKind::Ssl
    }

    fn extract(&self, payload: &Value, fallback_target: &str) -> Result<Vec<FindingCandidate>, MalformedPayload> {
        if !payload.is_object() {
            return Err(MalformedPayload("SSL Labs payload is not an object".into()));
        }
        let endpoints = match payload.get("endpoints") {
            Some(Value::Array(endpoints)) => endpoints,
            Some(_) => return Err(MalformedPayload("SSL Labs endpoints is not an array".into())),
            None => return Err(MalformedPayload("SSL Labs payload has no endpoints".into())),
        };

        // PASS when any endpoint is graded A or A+
        let passes = endpoints
            .iter()
            .filter_map(|e| str_field(e, &["grade"]))
            .any(|grade| matches!(grade.trim(), "A" | "A+"));
        if passes {
            return Ok(Vec::new());
        }

        let host = str_field(payload, &["host"]).unwrap_or(fallback_target);
        let mut candidates = Vec::new();
        for endpoint in endpoints {
            let Some(ip) = str_field(endpoint, &["ipAddress", "ip", "host"]) else {
                continue;
            };
            let grade = str_field(endpoint, &["grade"]).or_else(|| str_field(payload, &["grade"]));
            let details = endpoint.get("details");
            let protocols = details.map(protocols_of).unwrap_or_default();
            let hsts_present = details.and_then(|d| d.get("hstsPolicy")).is_some_and(|hsts| {
                hsts.get("status")
                    .and_then(Value::as_str)
                    .is_some_and(|s| s.eq_ignore_ascii_case("present"))
                    || hsts.get("maxAge").and_then(Value::as_i64).is_some_and(|age| age > 0)
            });

            let mut evidence = vec![
                EvidenceItem::new("host", host),
                EvidenceItem::new("grade", grade.unwrap_or("N/A")),
                EvidenceItem::new(
                    "protocols",
                    if protocols.is_empty() { "unknown".to_string() } else { protocols.clone() },
                ),
                EvidenceItem::new("hsts_present", hsts_present.to_string()),
                EvidenceItem::new("https_supported", (!protocols.is_empty()).to_string()),
            ];
            let strength = details
                .and_then(|d| d.get("keyStrength").or_else(|| d.get("key").and_then(|k| k.get("size"))))
                .filter(|v| !v.is_null());
            if let Some(bits) = strength {
                evidence.push(EvidenceItem::new("encryption_strength", super::scalar_text(Some(bits))));
            }

            let (title, reason) = match grade {
                Some(grade) => (
                    format!("Weak TLS configuration (grade {})", grade),
                    format!("TLS endpoint {} graded {}; no endpoint reached A or A+", ip, grade),
                ),
                None => (
                    "TLS grade unavailable".to_string(),
                    format!("TLS endpoint {} returned no grade", ip),
                ),
            };

            candidates.push(FindingCandidate {
                id: format!("ssl:{}", ip),
                test: TestRef::ToolDefault,
                title,
                severity: grade_severity(grade),
                reason,
                evidence,
            });
        }
        Ok(candidates)
    }
}

/// A-/B → moderate, C/D → serious, E/F/T/M → critical, none → info
pub fn grade_severity(grade: Option<&str>) -> Severity {
    let Some(grade) = grade.map(str::trim).filter(|g| !g.is_empty()) else {
        return Severity::Info;
    };
    match grade.chars().next().map(|c| c.to_ascii_uppercase()) {
        Some('A') | Some('B') => Severity::Moderate,
        Some('C') | Some('D') => Severity::Serious,
        Some('E') | Some('F') | Some('T') | Some('M') => Severity::Critical,
        _ => Severity::Info,
    }
}

fn protocols_of(details: &Value) -> String {
    details
        .get("protocols")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|p| {
            let name = p.get("name").and_then(Value::as_str).unwrap_or("").trim();
            let version = p.get("version").and_then(Value::as_str).unwrap_or("").trim();
            let joined = [name, version]
                .iter()
                .filter(|s| !s.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join(" ");
            (!joined.is_empty()).then_some(joined)
        })
        .collect::<Vec<_>>()
        .join(", ")
}
