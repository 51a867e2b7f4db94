//! axe-core results

use audit_graph::{EvidenceItem, Severity};
use serde_json::Value;

use super::{str_field, FindingCandidate, FindingExtractor, MalformedPayload};
use crate::catalog::{TestRef, ToolKind};

/// One finding per violated rule and node
pub struct AxeExtractor;

impl FindingExtractor for AxeExtractor {
    fn tool(&self) -> ToolKind {
        ToolKind::Axe
    }

    fn extract(&self, payload: &Value, _fallback_target: &str) -> Result<Vec<FindingCandidate>, MalformedPayload> {
        let mut candidates = Vec::new();
        for violation in violations(payload)? {
            let Some(rule) = str_field(violation, &["id"]) else {
                continue;
            };
            let title = str_field(violation, &["help", "description"]).unwrap_or(rule);
            let reason = str_field(violation, &["description", "help"]).unwrap_or(title);

            for node in violation.get("nodes").and_then(Value::as_array).into_iter().flatten() {
                let selector = selector_of(node);
                let severity = str_field(node, &["impact"])
                    .or_else(|| str_field(violation, &["impact"]))
                    .and_then(Severity::parse)
                    .unwrap_or(Severity::Moderate);

                let mut evidence = vec![
                    EvidenceItem::new("axerule", rule),
                    EvidenceItem::new("selector", selector.clone()),
                ];
                if let Some(html) = str_field(node, &["html"]) {
                    evidence.push(EvidenceItem::new("html", html));
                }

                candidates.push(FindingCandidate {
                    id: format!("axe:{}:{}", rule, selector),
                    test: TestRef::Check(rule.to_string()),
                    title: title.to_string(),
                    severity,
                    reason: reason.to_string(),
                    evidence,
                });
            }
        }
        Ok(candidates)
    }
}

/// `{violations}`, `{results: {violations}}` or an array of either
fn violations(payload: &Value) -> Result<Vec<&Value>, MalformedPayload> {
    match payload {
        Value::Array(pages) => {
            let mut all = Vec::new();
            for page in pages {
                all.extend(violations(page)?);
            }
            Ok(all)
        }
        Value::Object(_) => {
            let list = payload
                .get("violations")
                .or_else(|| payload.get("results").and_then(|r| r.get("violations")));
            match list {
                Some(Value::Array(items)) => Ok(items.iter().collect()),
                Some(_) => Err(MalformedPayload("axe violations is not an array".into())),
                None => Err(MalformedPayload("axe payload has no violations".into())),
            }
        }
        _ => Err(MalformedPayload("axe payload is not an object or array".into())),
    }
}

/// Node selectors joined with `,`; iframe paths are flattened
fn selector_of(node: &Value) -> String {
    fn collect(value: &Value, out: &mut Vec<String>) {
        match value {
            Value::String(s) => out.push(s.clone()),
            Value::Array(items) => items.iter().for_each(|item| collect(item, out)),
            _ => {}
        }
    }
    let mut parts = Vec::new();
    if let Some(target) = node.get("target") {
        collect(target, &mut parts);
    }
    parts.join(",")
}
