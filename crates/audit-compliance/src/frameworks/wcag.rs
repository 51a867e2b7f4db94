//! WCAG 2.1 Framework

use super::{regulation, requirement, rule, RequirementDef};
use crate::ontology::OntologySeed;

/// Get WCAG 2.1 ontology records
pub fn get_seed() -> OntologySeed {
    let wcag = "wcag-2.1";
    OntologySeed {
        regulations: vec![regulation(
            wcag,
            "Web Content Accessibility Guidelines",
            "W3C",
            "2.1",
            "Success criteria referenced by EN 301 549 and the European Accessibility Act",
        )],
        rules: vec![
            rule("wcag-1-1-1", wcag, "1.1.1", "Non-text Content", "All non-text content has a text alternative"),
            rule("wcag-1-3-1", wcag, "1.3.1", "Info and Relationships", "Structure and relationships can be programmatically determined"),
            rule("wcag-1-4-3", wcag, "1.4.3", "Contrast (Minimum)", "Text has a contrast ratio of at least 4.5:1"),
            rule("wcag-2-4-2", wcag, "2.4.2", "Page Titled", "Web pages have titles that describe topic or purpose"),
            rule("wcag-2-4-4", wcag, "2.4.4", "Link Purpose (In Context)", "The purpose of each link can be determined"),
            rule("wcag-3-1-1", wcag, "3.1.1", "Language of Page", "The default human language of each page can be determined"),
            rule("wcag-4-1-2", wcag, "4.1.2", "Name, Role, Value", "User interface components expose name and role"),
        ],
        requirements: vec![
            requirement(RequirementDef {
                id: "req-text-alternatives",
                name: "Provide text alternatives for images",
                description: "Every informative image exposes alternate text",
                fix: "Add a meaningful alt attribute, or alt=\"\" for decorative images",
                severity: "critical",
                rules: &["wcag-1-1-1"],
                tests: &["image-alt"],
            }),
            requirement(RequirementDef {
                id: "req-color-contrast",
                name: "Maintain sufficient color contrast",
                description: "Foreground and background colors meet the minimum contrast ratio",
                fix: "Darken text or lighten backgrounds until the ratio reaches 4.5:1",
                severity: "serious",
                rules: &["wcag-1-4-3"],
                tests: &["color-contrast"],
            }),
            requirement(RequirementDef {
                id: "req-form-labels",
                name: "Label form controls",
                description: "Every form control has an accessible label",
                fix: "Associate a <label> element or aria-label with each input",
                severity: "critical",
                rules: &["wcag-1-3-1", "wcag-4-1-2"],
                tests: &["label"],
            }),
            requirement(RequirementDef {
                id: "req-page-language",
                name: "Declare the page language",
                description: "The <html> element declares a valid lang attribute",
                fix: "Add lang=\"en\" (or the page language) to the <html> element",
                severity: "serious",
                rules: &["wcag-3-1-1"],
                tests: &["html-has-lang"],
            }),
            requirement(RequirementDef {
                id: "req-link-purpose",
                name: "Give links discernible text",
                description: "Every link has text that describes its destination",
                fix: "Add link text or an aria-label to icon-only links",
                severity: "serious",
                rules: &["wcag-2-4-4", "wcag-4-1-2"],
                tests: &["link-name"],
            }),
            requirement(RequirementDef {
                id: "req-button-names",
                name: "Give buttons discernible text",
                description: "Every button exposes an accessible name",
                fix: "Add visible text, aria-label or aria-labelledby to each button",
                severity: "critical",
                rules: &["wcag-4-1-2"],
                tests: &["button-name"],
            }),
            requirement(RequirementDef {
                id: "req-page-title",
                name: "Title every page",
                description: "The document has a non-empty <title> element",
                fix: "Add a descriptive <title> to the document head",
                severity: "serious",
                rules: &["wcag-2-4-2"],
                tests: &["document-title"],
            }),
            requirement(RequirementDef {
                id: "req-accessibility-general",
                name: "Resolve remaining accessibility violations",
                description: "No other automated accessibility rule fails",
                fix: "Review the reported axe-core rules and follow their remediation guidance",
                severity: "moderate",
                rules: &["wcag-4-1-2"],
                tests: &["axe-core"],
            }),
        ],
        tests: Vec::new(),
    }
}
