//! Regulatory ontology: seed records, seeding and the lookup index

use audit_graph::{
    GraphStore, OntologySnapshot, Regulation, Requirement, Rule, Severity, StoreError, Test,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Ontology loading errors
#[derive(Debug, Error)]
pub enum OntologyError {
    /// Seed file unreadable
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Seed file is not valid JSON for its record type
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Write to the graph store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============ Seed records ============

/// `regulations.json` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegulationRecord {
    /// Stable id; `_id` is accepted
    #[serde(alias = "_id")]
    pub id: String,
    /// Display name
    pub name: String,
    /// Issuing jurisdiction
    #[serde(default)]
    pub jurisdiction: Option<String>,
    /// Version label
    #[serde(default)]
    pub version: Option<String>,
    /// Free-text description
    #[serde(default)]
    pub description: Option<String>,
}

/// `rules.json` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleRecord {
    /// Stable id; `_id` is accepted
    #[serde(alias = "_id")]
    pub id: String,
    /// `UNDER` edge
    pub regulation_id: String,
    /// Article or clause number
    #[serde(default)]
    pub article_number: Option<String>,
    /// Short title
    #[serde(default)]
    pub title: Option<String>,
    /// Free-text description
    #[serde(default)]
    pub description: Option<String>,
    /// Extra `PART_OF` edges declared from the rule side
    #[serde(default)]
    pub requirement_ids: Vec<String>,
}

/// `requirements.json` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementRecord {
    /// Stable id; `_id` is accepted
    #[serde(alias = "_id")]
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Free-text description
    #[serde(default)]
    pub description: String,
    /// Remediation text
    #[serde(default)]
    pub fix_suggestion: Option<String>,
    /// Severity name; unknown values fall back to moderate
    #[serde(default)]
    pub severity_default: Option<String>,
    /// `PART_OF` targets
    #[serde(default)]
    pub rule_ids: Vec<String>,
    /// `TESTED_BY` targets
    #[serde(default)]
    pub test_ids: Vec<String>,
}

/// `tests.json` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRecord {
    /// Stable id; `_id` is accepted
    #[serde(alias = "_id")]
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Tool family name or alias
    #[serde(default)]
    pub tool: Option<String>,
    /// Invocation, informational only
    #[serde(default)]
    pub command: Option<String>,
    /// Extra `TESTED_BY` edges declared from the test side
    #[serde(default)]
    pub requirement_ids: Vec<String>,
}

/// A full set of seed records
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OntologySeed {
    /// Regulations
    pub regulations: Vec<RegulationRecord>,
    /// Rules
    pub rules: Vec<RuleRecord>,
    /// Requirements
    pub requirements: Vec<RequirementRecord>,
    /// Tests
    pub tests: Vec<TestRecord>,
}

impl OntologySeed {
    /// Load `regulations.json`, `rules.json`, `requirements.json` and `tests.json`.
    ///
    /// A missing file contributes nothing.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, OntologyError> {
        let dir = dir.as_ref();
        Ok(Self {
            regulations: load_records(&dir.join("regulations.json"))?,
            rules: load_records(&dir.join("rules.json"))?,
            requirements: load_records(&dir.join("requirements.json"))?,
            tests: load_records(&dir.join("tests.json"))?,
        })
    }

    /// Append every record of `other`
    pub fn extend(&mut self, other: OntologySeed) {
        self.regulations.extend(other.regulations);
        self.rules.extend(other.rules);
        self.requirements.extend(other.requirements);
        self.tests.extend(other.tests);
    }
}

fn load_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, OntologyError> {
    if !path.exists() {
        warn!("Seed file {} not found, skipping", path.display());
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path).map_err(|source| OntologyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| OntologyError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

// ============ Seeding ============

/// Counts from one seeding pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Regulations
    pub regulations: usize,
    /// Rules
    pub rules: usize,
    /// Requirements
    pub requirements: usize,
    /// Tests
    pub tests: usize,
    /// New edges
    pub links: usize,
    /// References to unknown nodes
    pub skipped: usize,
}

/// Idempotently upsert the seed into the store.
///
/// Dangling references are logged and skipped.
pub async fn seed_ontology(
    store: &dyn GraphStore,
    seed: OntologySeed,
) -> Result<SeedReport, OntologyError> {
    let mut report = SeedReport::default();

    for record in seed.regulations {
        store
            .upsert_regulation(Regulation {
                id: record.id,
                name: record.name,
                jurisdiction: record.jurisdiction,
                version: record.version,
                description: record.description,
            })
            .await?;
        report.regulations += 1;
    }

    let known_regulations: BTreeSet<String> = store
        .ontology()
        .await?
        .regulations
        .into_iter()
        .map(|r| r.id)
        .collect();

    for record in &seed.tests {
        store
            .upsert_test(Test {
                id: record.id.clone(),
                name: record.name.clone().unwrap_or_else(|| record.id.clone()),
                tool: record.tool.clone(),
                command: record.command.clone(),
            })
            .await?;
        report.tests += 1;
    }

    for record in &seed.rules {
        if !known_regulations.contains(&record.regulation_id) {
            warn!(
                "Rule {} references unknown regulation {}, skipping",
                record.id, record.regulation_id
            );
            report.skipped += 1;
            continue;
        }
        let title = record
            .title
            .clone()
            .or_else(|| record.article_number.clone())
            .unwrap_or_else(|| record.id.clone());
        store
            .upsert_rule(Rule {
                id: record.id.clone(),
                regulation_id: record.regulation_id.clone(),
                article_number: record.article_number.clone(),
                title,
                description: record.description.clone(),
            })
            .await?;
        report.rules += 1;
    }

    for record in &seed.requirements {
        let severity_default = record
            .severity_default
            .as_deref()
            .and_then(Severity::parse)
            .unwrap_or(Severity::Moderate);
        store
            .upsert_requirement(Requirement {
                id: record.id.clone(),
                name: record.name.clone().unwrap_or_else(|| record.id.clone()),
                description: record.description.clone(),
                fix_suggestion: record.fix_suggestion.clone(),
                severity_default,
                rule_ids: BTreeSet::new(),
                test_ids: BTreeSet::new(),
            })
            .await?;
        report.requirements += 1;
    }

    let mut part_of: Vec<(String, String)> = Vec::new();
    let mut tested_by: Vec<(String, String)> = Vec::new();
    for record in &seed.requirements {
        part_of.extend(record.rule_ids.iter().map(|rule| (record.id.clone(), rule.clone())));
        tested_by.extend(record.test_ids.iter().map(|test| (record.id.clone(), test.clone())));
    }
    for record in &seed.rules {
        part_of.extend(record.requirement_ids.iter().map(|req| (req.clone(), record.id.clone())));
    }
    for record in &seed.tests {
        tested_by.extend(record.requirement_ids.iter().map(|req| (req.clone(), record.id.clone())));
    }

    for (requirement_id, rule_id) in part_of {
        match store.link_part_of(&requirement_id, &rule_id).await {
            Ok(added) => report.links += usize::from(added),
            Err(StoreError::NotFound { entity, id }) => {
                warn!(
                    "Skipping PART_OF {} -> {}: {} {} not found",
                    requirement_id, rule_id, entity, id
                );
                report.skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    for (requirement_id, test_id) in tested_by {
        match store.link_tested_by(&requirement_id, &test_id).await {
            Ok(added) => report.links += usize::from(added),
            Err(StoreError::NotFound { entity, id }) => {
                warn!(
                    "Skipping TESTED_BY {} -> {}: {} {} not found",
                    requirement_id, test_id, entity, id
                );
                report.skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        "Seeded ontology: {} regulations, {} rules, {} requirements, {} tests, {} new links ({} skipped)",
        report.regulations, report.rules, report.requirements, report.tests, report.links, report.skipped
    );
    Ok(report)
}

// ============ Index ============

/// Read-only lookup structure over an ontology snapshot
#[derive(Debug, Clone, Default)]
pub struct OntologyIndex {
    /// Regulations
    pub regulations: BTreeMap<String, Regulation>,
    /// Rules
    pub rules: BTreeMap<String, Rule>,
    /// Requirements
    pub requirements: BTreeMap<String, Requirement>,
    /// Tests
    pub tests: BTreeMap<String, Test>,
    requirements_by_test: BTreeMap<String, BTreeSet<String>>,
}

impl OntologyIndex {
    /// Index a snapshot by id
    pub fn build(snapshot: &OntologySnapshot) -> Self {
        let mut requirements_by_test: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for requirement in &snapshot.requirements {
            for test_id in &requirement.test_ids {
                requirements_by_test
                    .entry(test_id.clone())
                    .or_default()
                    .insert(requirement.id.clone());
            }
        }

        Self {
            regulations: by_id(&snapshot.regulations, |r| &r.id),
            rules: by_id(&snapshot.rules, |r| &r.id),
            requirements: by_id(&snapshot.requirements, |r| &r.id),
            tests: by_id(&snapshot.tests, |t| &t.id),
            requirements_by_test,
        }
    }

    /// Requirements `TESTED_BY` the given Test
    pub fn requirements_for_test(&self, test_id: &str) -> impl Iterator<Item = &Requirement> {
        self.requirements_by_test
            .get(test_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.requirements.get(id))
    }

    /// Rules a requirement is `PART_OF`, ordered by id
    pub fn rules_of(&self, requirement: &Requirement) -> Vec<&Rule> {
        requirement
            .rule_ids
            .iter()
            .filter_map(|id| self.rules.get(id))
            .collect()
    }

    /// Regulation a rule is `UNDER`
    pub fn regulation_of(&self, rule: &Rule) -> Option<&Regulation> {
        self.regulations.get(&rule.regulation_id)
    }

    /// Distinct regulations reachable via `PART_OF`/`UNDER`
    pub fn regulations_of(&self, requirement: &Requirement) -> BTreeSet<&str> {
        self.rules_of(requirement)
            .into_iter()
            .filter_map(|rule| self.regulation_of(rule))
            .map(|regulation| regulation.id.as_str())
            .collect()
    }
}

fn by_id<T: Clone>(items: &[T], key: impl Fn(&T) -> &String) -> BTreeMap<String, T> {
    items.iter().map(|item| (key(item).clone(), item.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit_graph::InMemoryGraphStore;

    fn seed() -> OntologySeed {
        serde_json::from_value(serde_json::json!({
            "regulations": [{ "_id": "gdpr", "name": "GDPR", "jurisdiction": "EU" }],
            "rules": [
                { "_id": "art-32", "regulation_id": "gdpr", "article_number": "32", "title": "Security of processing" },
                { "_id": "art-5", "regulation_id": "gdpr", "article_number": "5(1)(f)", "requirement_ids": ["req-tls"] },
                { "_id": "orphan", "regulation_id": "ccpa", "title": "Orphan" }
            ],
            "requirements": [
                { "_id": "req-tls", "description": "Encrypt transport", "rule_ids": ["art-32", "missing-rule"] }
            ],
            "tests": [
                { "id": "ssl-labs", "name": "SSL Labs", "tool": "ssl", "requirement_ids": ["req-tls"] }
            ]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_seed_honors_reverse_links_and_skips_dangling() {
        let store = InMemoryGraphStore::new();
        let report = seed_ontology(&store, seed()).await.unwrap();

        assert_eq!(report.rules, 2);
        assert_eq!(report.links, 3);
        assert_eq!(report.skipped, 2);

        let ontology = store.ontology().await.unwrap();
        let requirement = &ontology.requirements[0];
        assert_eq!(requirement.severity_default, Severity::Moderate);
        assert!(requirement.rule_ids.contains("art-5"));
        assert!(requirement.test_ids.contains("ssl-labs"));
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = InMemoryGraphStore::new();
        seed_ontology(&store, seed()).await.unwrap();
        let second = seed_ontology(&store, seed()).await.unwrap();

        assert_eq!(second.links, 0);
        let ontology = store.ontology().await.unwrap();
        assert_eq!(ontology.rules.len(), 2);
        assert_eq!(ontology.requirements.len(), 1);
    }

    #[tokio::test]
    async fn test_index_lookups() {
        let store = InMemoryGraphStore::new();
        seed_ontology(&store, seed()).await.unwrap();
        let index = OntologyIndex::build(&store.ontology().await.unwrap());

        let requirements: Vec<_> = index.requirements_for_test("ssl-labs").collect();
        assert_eq!(requirements.len(), 1);
        assert_eq!(index.rules_of(requirements[0]).len(), 2);
        assert_eq!(index.regulations_of(requirements[0]).len(), 1);
        assert_eq!(index.requirements_for_test("nikto").count(), 0);
    }

    #[test]
    fn test_load_dir_with_missing_files() {
        let dir = std::env::temp_dir().join(format!("seed-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("regulations.json"),
            r#"[{"_id": "wcag-2.1", "name": "WCAG 2.1"}]"#,
        )
        .unwrap();

        let seed = OntologySeed::load_dir(&dir).unwrap();
        assert_eq!(seed.regulations.len(), 1);
        assert!(seed.rules.is_empty());

        std::fs::remove_dir_all(dir).ok();
    }
}
