//! Nikto results
//!
//! Accepts nikto's JSON report (`vulnerabilities[]`, possibly one object per
//! host) or plain-text output wrapped as `{"raw": "..."}`.

use audit_graph::{EvidenceItem, Severity};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use super::{scalar_text, short_hash, str_field, FindingCandidate, FindingExtractor, MalformedPayload};
use crate::catalog::{TestRef, ToolKind};

/// Nikto JSON or text report items
pub struct NiktoExtractor;

struct Patterns {
    significant_json: Regex,
    significant_text: Regex,
    boilerplate: Regex,
    line_parts: Regex,
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(Patterns {
                significant_json: Regex::new(
                    r"(?i)vuln|cve-|exploit|xss|sql|clickjack|dir(ectory)? list|insecure|outdated|deprecated",
                )
                .ok()?,
                significant_text: Regex::new(
                    r"(?i)vulnerab|cve-\d{4}-\d+|osvdb|exploit|xss|sql|clickjack|frame-?options|content-?security-?policy|x-content-type-options|x-xss-protection|server leaks|directory (index|list)|trace method|allowed http methods|insecure|outdated|deprecated",
                )
                .ok()?,
                boilerplate: Regex::new(r"(?i)^\+\s*(Target|Start Time|End Time|OK)\b").ok()?,
                line_parts: Regex::new(
                    r"^\+\s*(?:(?P<code>OSVDB-\d+|CVE-\d{4}-\d+):\s*)?(?:(?P<path>/\S*?):\s)?",
                )
                .ok()?,
            })
        })
        .as_ref()
}

impl FindingExtractor for NiktoExtractor {
    fn tool(&self) -> ToolKind {
        ToolKind::Nikto
    }

    fn extract(&self, payload: &Value, _fallback_target: &str) -> Result<Vec<FindingCandidate>, MalformedPayload> {
        let patterns = patterns().ok_or_else(|| MalformedPayload("nikto patterns failed to compile".into()))?;
        if let Some(raw) = payload.get("raw") {
            let text = raw
                .as_str()
                .ok_or_else(|| MalformedPayload("nikto raw output is not text".into()))?;
            return Ok(from_text(patterns, text));
        }

        let mut items = Vec::new();
        collect_vulnerabilities(payload, &mut items)?;
        Ok(items.into_iter().map(|item| from_json(patterns, item)).collect())
    }
}

fn collect_vulnerabilities<'a>(payload: &'a Value, out: &mut Vec<&'a Value>) -> Result<(), MalformedPayload> {
    match payload {
        Value::Array(hosts) => {
            for host in hosts {
                collect_vulnerabilities(host, out)?;
            }
            Ok(())
        }
        Value::Object(_) => {
            let list = payload.get("vulnerabilities").or_else(|| payload.get("issues"));
            match list {
                Some(Value::Array(items)) => {
                    out.extend(items.iter().filter(|item| item.is_object()));
                    Ok(())
                }
                Some(_) => Err(MalformedPayload("nikto vulnerabilities is not an array".into())),
                None => Err(MalformedPayload("nikto payload has no vulnerabilities".into())),
            }
        }
        _ => Err(MalformedPayload("nikto payload is not an object or array".into())),
    }
}

fn from_json(patterns: &Patterns, item: &Value) -> FindingCandidate {
    let message = str_field(item, &["msg", "message", "description"]).unwrap_or("Nikto finding");
    let code = ["id", "osvdb"]
        .iter()
        .filter_map(|key| item.get(*key))
        .find(|v| !v.is_null() && v.as_str().map_or(true, |s| !s.is_empty()))
        .map(|v| scalar_text(Some(v)));
    let path = str_field(item, &["url", "path", "uri"]).unwrap_or("");

    let severity = match item.get("severity") {
        Some(Value::Number(n)) => n.as_u64().map(numeric_severity),
        Some(Value::String(s)) => Severity::parse(s),
        _ => None,
    }
    .unwrap_or_else(|| {
        if patterns.significant_json.is_match(message) {
            Severity::Moderate
        } else {
            Severity::Info
        }
    });

    let id = code
        .clone()
        .unwrap_or_else(|| short_hash(&format!("{}|{}", path, message)));

    FindingCandidate {
        id: format!("nikto:{}", id),
        test: TestRef::ToolDefault,
        title: message.to_string(),
        severity,
        reason: message.to_string(),
        evidence: vec![
            EvidenceItem::new("finding_code", code.unwrap_or_else(|| "unknown".into())),
            EvidenceItem::new("path", path),
        ],
    }
}

/// Nikto numeric scale 0..4
fn numeric_severity(level: u64) -> Severity {
    match level {
        0 => Severity::Info,
        1 => Severity::Minor,
        2 => Severity::Moderate,
        3 => Severity::Serious,
        _ => Severity::Critical,
    }
}

fn from_text(patterns: &Patterns, text: &str) -> Vec<FindingCandidate> {
    text.lines()
        .map(str::trim)
        .filter(|line| line.starts_with('+') && !patterns.boilerplate.is_match(line))
        .map(|line| {
            let message = line.trim_start_matches('+').trim();
            let captures = patterns.line_parts.captures(line);
            let code = captures
                .as_ref()
                .and_then(|c| c.name("code"))
                .map(|m| m.as_str().to_string());
            let path = captures
                .as_ref()
                .and_then(|c| c.name("path"))
                .map(|m| m.as_str())
                .unwrap_or("");
            let severity = if patterns.significant_text.is_match(line) {
                Severity::Moderate
            } else {
                Severity::Info
            };
            FindingCandidate {
                id: format!("nikto:{}", short_hash(message)),
                test: TestRef::ToolDefault,
                title: message.to_string(),
                severity,
                reason: message.to_string(),
                evidence: vec![
                    EvidenceItem::new("finding_code", code.unwrap_or_else(|| "text".into())),
                    EvidenceItem::new("path", path),
                ],
            }
        })
        .collect()
}
