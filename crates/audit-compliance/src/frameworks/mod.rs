//! Built-in Regulatory Ontology
//!
//! Used when no seed directory is configured.

/// ePrivacy Directive
pub mod eprivacy;
/// General Data Protection Regulation
pub mod gdpr;
/// Web Content Accessibility Guidelines 2.1
pub mod wcag;

use crate::ontology::{
    OntologySeed, RegulationRecord, RequirementRecord, RuleRecord, TestRecord,
};

/// Full built-in seed: GDPR, ePrivacy Directive and WCAG 2.1
pub fn builtin_seed() -> OntologySeed {
    let mut seed = OntologySeed {
        tests: tests(),
        ..Default::default()
    };
    seed.extend(gdpr::get_seed());
    seed.extend(eprivacy::get_seed());
    seed.extend(wcag::get_seed());
    seed
}

/// Scanner checks shared by every framework
pub fn tests() -> Vec<TestRecord> {
    vec![
        test("ssl-labs", "SSL Labs TLS assessment", "ssl", Some("GET api.ssllabs.com/api/v3/analyze")),
        test("curl-headers", "HTTP security headers", "headers", Some("curl -I -L")),
        test("nikto", "Nikto web server scan", "nikto", Some("nikto -h <target> -Tuning b")),
        test("cookies", "Cookie flags and consent", "cookies", None),
        test("privacy-policy", "Privacy policy and cookie banner", "cookies", None),
        test("axe-core", "axe-core accessibility scan", "axe", Some("axe --stdout")),
        test("image-alt", "Images must have alternate text", "axe", None),
        test("color-contrast", "Elements must meet minimum color contrast", "axe", None),
        test("label", "Form elements must have labels", "axe", None),
        test("html-has-lang", "<html> element must have a lang attribute", "axe", None),
        test("link-name", "Links must have discernible text", "axe", None),
        test("button-name", "Buttons must have discernible text", "axe", None),
        test("document-title", "Documents must have a <title> element", "axe", None),
    ]
}

fn test(id: &str, name: &str, tool: &str, command: Option<&str>) -> TestRecord {
    TestRecord {
        id: id.into(),
        name: Some(name.into()),
        tool: Some(tool.into()),
        command: command.map(Into::into),
        requirement_ids: Vec::new(),
    }
}

pub(crate) fn regulation(id: &str, name: &str, jurisdiction: &str, version: &str, description: &str) -> RegulationRecord {
    RegulationRecord {
        id: id.into(),
        name: name.into(),
        jurisdiction: Some(jurisdiction.into()),
        version: Some(version.into()),
        description: Some(description.into()),
    }
}

pub(crate) fn rule(id: &str, regulation_id: &str, article: &str, title: &str, description: &str) -> RuleRecord {
    RuleRecord {
        id: id.into(),
        regulation_id: regulation_id.into(),
        article_number: Some(article.into()),
        title: Some(title.into()),
        description: Some(description.into()),
        requirement_ids: Vec::new(),
    }
}

pub(crate) struct RequirementDef<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub description: &'a str,
    pub fix: &'a str,
    pub severity: &'a str,
    pub rules: &'a [&'a str],
    pub tests: &'a [&'a str],
}

pub(crate) fn requirement(def: RequirementDef<'_>) -> RequirementRecord {
    RequirementRecord {
        id: def.id.into(),
        name: Some(def.name.into()),
        description: def.description.into(),
        fix_suggestion: Some(def.fix.into()),
        severity_default: Some(def.severity.into()),
        rule_ids: def.rules.iter().map(|r| r.to_string()).collect(),
        test_ids: def.tests.iter().map(|t| t.to_string()).collect(),
    }
}
