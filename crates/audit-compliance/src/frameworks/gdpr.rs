//! GDPR Framework

use super::{regulation, requirement, rule, RequirementDef};
use crate::ontology::OntologySeed;

/// Get GDPR ontology records
pub fn get_seed() -> OntologySeed {
    OntologySeed {
        regulations: vec![regulation(
            "gdpr",
            "General Data Protection Regulation",
            "EU",
            "2016/679",
            "Regulation on the protection of natural persons with regard to the processing of personal data",
        )],
        rules: vec![
            // Article 5 - Principles
            rule(
                "gdpr-art-5-1-f",
                "gdpr",
                "Art.5(1)(f)",
                "Integrity and confidentiality",
                "Personal data shall be processed in a manner that ensures appropriate security",
            ),
            rule(
                "gdpr-art-7",
                "gdpr",
                "Art.7",
                "Conditions for consent",
                "The controller shall be able to demonstrate that the data subject has consented",
            ),
            rule(
                "gdpr-art-13",
                "gdpr",
                "Art.13",
                "Information to be provided",
                "Information to be provided where personal data are collected from the data subject",
            ),
            rule(
                "gdpr-art-25",
                "gdpr",
                "Art.25",
                "Data protection by design and by default",
                "Appropriate technical and organisational measures designed to implement data-protection principles",
            ),
            // Article 32 - Security of Processing
            rule(
                "gdpr-art-32-1-a",
                "gdpr",
                "Art.32(1)(a)",
                "Pseudonymisation and encryption",
                "The pseudonymisation and encryption of personal data",
            ),
            rule(
                "gdpr-art-32-1-b",
                "gdpr",
                "Art.32(1)(b)",
                "Confidentiality and integrity",
                "Ability to ensure ongoing confidentiality, integrity, availability and resilience",
            ),
            rule(
                "gdpr-art-32-1-d",
                "gdpr",
                "Art.32(1)(d)",
                "Testing and evaluation",
                "Regular testing, assessing and evaluating the effectiveness of security measures",
            ),
        ],
        requirements: vec![
            requirement(RequirementDef {
                id: "req-transport-encryption",
                name: "Encrypt personal data in transit",
                description: "All endpoints must serve strong TLS (grade A or better)",
                fix: "Disable legacy protocols and weak ciphers, enable HSTS and renew the certificate chain",
                severity: "serious",
                rules: &["gdpr-art-5-1-f", "gdpr-art-32-1-a"],
                tests: &["ssl-labs"],
            }),
            requirement(RequirementDef {
                id: "req-security-headers",
                name: "Harden HTTP responses",
                description: "Responses must carry CSP, X-Frame-Options, X-Content-Type-Options and Referrer-Policy",
                fix: "Add Content-Security-Policy, X-Frame-Options: DENY, X-Content-Type-Options: nosniff and a Referrer-Policy",
                severity: "moderate",
                rules: &["gdpr-art-32-1-b"],
                tests: &["curl-headers"],
            }),
            requirement(RequirementDef {
                id: "req-vulnerability-management",
                name: "Remediate known web server vulnerabilities",
                description: "The web server must not expose known vulnerabilities or misconfigurations",
                fix: "Patch the server software, remove default files and disable directory listing",
                severity: "serious",
                rules: &["gdpr-art-32-1-d"],
                tests: &["nikto"],
            }),
            requirement(RequirementDef {
                id: "req-privacy-notice",
                name: "Publish a privacy notice",
                description: "A privacy policy must be reachable from the page",
                fix: "Link the privacy policy from every page footer",
                severity: "moderate",
                rules: &["gdpr-art-13"],
                tests: &["privacy-policy"],
            }),
            requirement(RequirementDef {
                id: "req-secure-cookies",
                name: "Protect cookies",
                description: "Cookies must be set with the Secure and HttpOnly flags",
                fix: "Set Secure and HttpOnly on every cookie that does not need script access",
                severity: "minor",
                rules: &["gdpr-art-25", "gdpr-art-32-1-a"],
                tests: &["cookies"],
            }),
        ],
        tests: Vec::new(),
    }
}
