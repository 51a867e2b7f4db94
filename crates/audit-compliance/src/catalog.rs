//! Test Catalog
//!
//! Resolves the Test a finding is `DETECTED_BY` and records which tool owns
//! each Test. Built once from the ontology plus configured defaults.

use audit_graph::OntologySnapshot;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Scanner family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// axe-core accessibility rules
    Axe,
    /// SSL Labs TLS grading
    Ssl,
    /// HTTP security headers
    Headers,
    /// Cookie flags, consent and privacy policy checks
    Cookies,
    /// Nikto server scan
    Nikto,
}

impl ToolKind {
    /// Every tool, in report order
    pub const ALL: [ToolKind; 5] = [
        ToolKind::Axe,
        ToolKind::Ssl,
        ToolKind::Headers,
        ToolKind::Cookies,
        ToolKind::Nikto,
    ];

    /// Canonical name, used as the config and ToolRun key
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Axe => "axe",
            Self::Ssl => "ssl",
            Self::Headers => "headers",
            Self::Cookies => "cookies",
            Self::Nikto => "nikto",
        }
    }

    /// Accepts the tool names and the aliases seed files use in `Test.tool`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "axe" | "axe-core" | "axe_core" => Some(Self::Axe),
            "ssl" | "tls" | "ssl-labs" | "ssllabs" | "ssl_labs" => Some(Self::Ssl),
            "headers" | "curl" | "curl-headers" | "http-headers" => Some(Self::Headers),
            "cookies" | "cookie" | "policy" | "privacy-policy" | "puppeteer" => Some(Self::Cookies),
            "nikto" => Some(Self::Nikto),
            _ => None,
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which Test a finding candidate points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestRef {
    /// The tool's default Test
    ToolDefault,
    /// A named check (e.g. an axe rule id), falling back to the tool default
    Check(String),
    /// A privacy policy check, falling back to the policy default
    PolicyCheck(String),
}

/// Default Test ids per tool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Default Test for axe findings
    pub axe: String,
    /// Default Test for TLS findings
    pub ssl: String,
    /// Default Test for header findings
    pub headers: String,
    /// Default Test for cookie findings
    pub cookies: String,
    /// Default Test for nikto findings
    pub nikto: String,
    /// Fallback Test for privacy policy checks
    pub policy: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            axe: "axe-core".into(),
            ssl: "ssl-labs".into(),
            headers: "curl-headers".into(),
            cookies: "cookies".into(),
            nikto: "nikto".into(),
            policy: "privacy-policy".into(),
        }
    }
}

impl CatalogConfig {
    /// Configured default Test id of `tool`
    pub fn default_for(&self, tool: ToolKind) -> &str {
        match tool {
            ToolKind::Axe => &self.axe,
            ToolKind::Ssl => &self.ssl,
            ToolKind::Headers => &self.headers,
            ToolKind::Cookies => &self.cookies,
            ToolKind::Nikto => &self.nikto,
        }
    }
}

/// Static Test lookup table
#[derive(Debug, Clone)]
pub struct TestCatalog {
    config: CatalogConfig,
    known: BTreeSet<String>,
    owners: BTreeMap<String, ToolKind>,
}

impl TestCatalog {
    /// Index the ontology Tests and their owning tools
    pub fn build(ontology: &OntologySnapshot, config: CatalogConfig) -> Self {
        let known: BTreeSet<String> = ontology.tests.iter().map(|t| t.id.clone()).collect();

        let mut owners = BTreeMap::new();
        for test in &ontology.tests {
            if let Some(tool) = test.tool.as_deref().and_then(ToolKind::parse) {
                owners.insert(test.id.clone(), tool);
            }
        }
        for tool in ToolKind::ALL {
            let id = config.default_for(tool);
            if known.contains(id) {
                owners.entry(id.to_string()).or_insert(tool);
            }
        }
        if known.contains(&config.policy) {
            owners.entry(config.policy.clone()).or_insert(ToolKind::Cookies);
        }

        Self {
            config,
            known,
            owners,
        }
    }

    /// Default Test id of `tool`, whether or not the ontology declares it
    pub fn default_test(&self, tool: ToolKind) -> &str {
        self.config.default_for(tool)
    }

    /// Exact id when the ontology declares it, otherwise the fallback default
    pub fn resolve(&self, tool: ToolKind, test: &TestRef) -> String {
        let default = self.config.default_for(tool);
        match test {
            TestRef::ToolDefault => default.to_string(),
            TestRef::Check(check) if self.known.contains(check) => check.clone(),
            TestRef::Check(_) => default.to_string(),
            TestRef::PolicyCheck(check) if self.known.contains(check) => check.clone(),
            TestRef::PolicyCheck(_) if self.known.contains(&self.config.policy) => {
                self.config.policy.clone()
            }
            TestRef::PolicyCheck(_) => default.to_string(),
        }
    }

    /// Tool whose failure turns this Test into ERROR
    pub fn owner(&self, test_id: &str) -> Option<ToolKind> {
        self.owners.get(test_id).copied()
    }

    /// Whether the ontology declares `test_id`
    pub fn contains(&self, test_id: &str) -> bool {
        self.known.contains(test_id)
    }
}
