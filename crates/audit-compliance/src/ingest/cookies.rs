//! Cookie and privacy policy observations

use audit_graph::{EvidenceItem, Severity};
use serde_json::Value;
use std::collections::BTreeMap;

use super::{scalar_text, short_hash, str_field, FindingCandidate, FindingExtractor, MalformedPayload};
use crate::catalog::{TestRef, ToolKind};

/// Cookie flag, consent and policy findings
pub struct CookiesExtractor;

#[derive(Debug, Clone, Default)]
struct CookieObservation {
    category: Option<String>,
    set_before_consent: Option<bool>,
    secure: Option<bool>,
    http_only: Option<bool>,
}

impl FindingExtractor for CookiesExtractor {
    fn tool(&self) -> ToolKind {
        ToolKind::Cookies
    }

    fn extract(&self, payload: &Value, _fallback_target: &str) -> Result<Vec<FindingCandidate>, MalformedPayload> {
        let Some(object) = payload.as_object() else {
            return Err(MalformedPayload("cookie payload is not an object".into()));
        };
        let issues = payload
            .get("complianceIssues")
            .or_else(|| payload.get("geminiAnalysis").and_then(|g| g.get("compliance_issues")));
        let recognized = ["cookies", "insecureCookies", "privacyPolicyLink", "cookieBannerFound"]
            .iter()
            .any(|key| object.contains_key(*key))
            || issues.is_some();
        if !recognized {
            return Err(MalformedPayload("cookie payload has no cookie or policy fields".into()));
        }

        let mut candidates = Vec::new();
        for (name, cookie) in observations(payload)? {
            if let Some(candidate) = cookie_candidate(&name, &cookie) {
                candidates.push(candidate);
            }
        }

        let page = str_field(payload, &["url", "pageUrl"]);

        if object.contains_key("privacyPolicyLink") && str_field(payload, &["privacyPolicyLink"]).is_none() {
            candidates.push(policy_candidate(
                "privacy-policy-link",
                "No privacy policy link detected",
                vec![EvidenceItem::new("privacy_policy_link", "missing")],
                page,
            ));
        }

        if payload.get("cookieBannerFound").and_then(Value::as_bool) == Some(false) {
            candidates.push(policy_candidate(
                "cookie-banner",
                "No cookie consent banner detected",
                vec![EvidenceItem::new("cookie_banner_found", "false")],
                page,
            ));
        }

        if let Some(issues) = issues {
            let Some(issues) = issues.as_array() else {
                return Err(MalformedPayload("compliance issues is not an array".into()));
            };
            let summary = payload
                .get("geminiAnalysis")
                .and_then(|g| g.get("summary"))
                .and_then(Value::as_str);
            for issue in issues.iter().filter_map(Value::as_str).filter(|s| !s.trim().is_empty()) {
                let mut evidence = vec![EvidenceItem::new("policy_issue", issue)];
                if let Some(summary) = summary {
                    evidence.push(EvidenceItem::new("analysis_summary", summary));
                }
                candidates.push(policy_candidate(
                    &format!("issue-{}", short_hash(issue)),
                    issue,
                    evidence,
                    page,
                ));
            }
        }

        Ok(candidates)
    }
}

/// Cookies from `cookies[]` and `insecureCookies[]`, keyed by name
fn observations(payload: &Value) -> Result<BTreeMap<String, CookieObservation>, MalformedPayload> {
    let mut cookies = BTreeMap::new();

    if let Some(list) = payload.get("cookies") {
        let list = list
            .as_array()
            .ok_or_else(|| MalformedPayload("cookies is not an array".into()))?;
        for cookie in list {
            let Some(name) = str_field(cookie, &["name"]) else {
                continue;
            };
            cookies.insert(
                name.to_string(),
                CookieObservation {
                    category: str_field(cookie, &["category"]).map(str::to_string),
                    set_before_consent: flag(cookie, &["setBeforeConsent", "set_before_consent"]),
                    secure: flag(cookie, &["secure"]),
                    http_only: flag(cookie, &["httpOnly", "httponly", "http_only"]),
                },
            );
        }
    }

    if let Some(list) = payload.get("insecureCookies") {
        let list = list
            .as_array()
            .ok_or_else(|| MalformedPayload("insecureCookies is not an array".into()))?;
        for cookie in list {
            let (name, secure, http_only) = match cookie {
                Value::String(name) => (name.as_str(), Some(false), Some(false)),
                Value::Object(_) => {
                    let Some(name) = str_field(cookie, &["name"]) else {
                        continue;
                    };
                    let secure = flag(cookie, &["secure"]);
                    let http_only = flag(cookie, &["httpOnly", "httponly", "http_only"]);
                    if secure.is_none() && http_only.is_none() {
                        (name, Some(false), Some(false))
                    } else {
                        (name, secure, http_only)
                    }
                }
                _ => continue,
            };
            let entry = cookies.entry(name.to_string()).or_default();
            entry.secure = entry.secure.or(secure);
            entry.http_only = entry.http_only.or(http_only);
        }
    }

    Ok(cookies)
}

fn flag(value: &Value, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|key| value.get(*key).and_then(Value::as_bool))
}

fn cookie_candidate(name: &str, cookie: &CookieObservation) -> Option<FindingCandidate> {
    let mut problems = Vec::new();
    if cookie.set_before_consent == Some(true) {
        problems.push("set before consent");
    }
    if cookie.secure == Some(false) {
        problems.push("missing Secure flag");
    }
    if cookie.http_only == Some(false) {
        problems.push("missing HttpOnly flag");
    }
    if problems.is_empty() {
        return None;
    }

    let severity = if cookie.set_before_consent == Some(true) {
        Severity::Serious
    } else {
        Severity::Minor
    };
    let as_text = |value: Option<bool>| scalar_text(value.map(Value::Bool).as_ref());

    Some(FindingCandidate {
        id: format!("cookies:cookie:{}", name),
        test: TestRef::ToolDefault,
        title: format!("Non-compliant cookie {}", name),
        severity,
        reason: format!("Cookie {} {}", name, problems.join(", ")),
        evidence: vec![
            EvidenceItem::new("cookie_name", name),
            EvidenceItem::new("cookie_category", cookie.category.as_deref().unwrap_or("unknown")),
            EvidenceItem::new("set_before_consent", as_text(cookie.set_before_consent)),
            EvidenceItem::new("secure_flag", as_text(cookie.secure)),
            EvidenceItem::new("httponly_flag", as_text(cookie.http_only)),
        ],
    })
}

fn policy_candidate(
    check: &str,
    message: &str,
    mut evidence: Vec<EvidenceItem>,
    page: Option<&str>,
) -> FindingCandidate {
    if let Some(page) = page {
        evidence.push(EvidenceItem::new("page_url", page));
    }
    FindingCandidate {
        id: format!("cookies:policy:{}", check),
        test: TestRef::PolicyCheck(check.to_string()),
        title: message.to_string(),
        severity: Severity::Moderate,
        reason: message.to_string(),
        evidence,
    }
}
