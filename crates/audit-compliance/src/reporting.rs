//! Compliance Reporting
//!
//! The report is a pure function of one scan's stored graph and the
//! ontology. Every collection is ordered by id so two reports over the same
//! state serialize identically.

use audit_graph::{GraphStore, ScanGraph, Severity, StoredFinding, ToolRun};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use utoipa::ToSchema;

use crate::catalog::{TestCatalog, ToolKind};
use crate::ontology::OntologyIndex;
use crate::ComplianceError;

const EXECUTION_FAILURE_FIX: &str =
    "Verify domain reachability and external tool availability. Some sites block scanners (WAF/CDN).";

/// PASS/FAIL/ERROR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Nothing detected
    Pass,
    /// At least one finding
    Fail,
    /// The tool could not evaluate it
    Error,
}

/// Full compliance report for one scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Scan id
    pub scan_id: String,
    /// Scanned URL
    pub target: String,
    /// Headline counts
    pub summary: ReportSummary,
    /// Every requirement, ordered by id
    pub requirement_statuses: Vec<RequirementStatus>,
    /// Failing requirements, then execution failures
    pub violations: Vec<Violation>,
    /// Every Test, ordered by id
    pub tests: Vec<TestStatus>,
}

/// Headline counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    /// Number of Test nodes in the ontology
    pub total_tests: usize,
    /// Distinct failing requirements
    pub total_failures: usize,
    /// Every regulation, keyed by id
    pub regulation_breakdown: BTreeMap<String, RegulationBreakdown>,
}

/// Failures under one regulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegulationBreakdown {
    /// Display name
    pub name: String,
    /// Failing requirements reachable from the regulation
    pub failures: usize,
}

/// Status of one requirement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequirementStatus {
    /// Requirement id
    pub requirement_id: String,
    /// Requirement name
    pub requirement_name: String,
    /// PASS, FAIL or ERROR
    pub status: Status,
    /// Distinct matching findings
    pub failure_count: usize,
}

/// What produced a violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum ViolationKind {
    /// A requirement with matching findings
    Requirement,
    /// An adapter that failed
    ExecutionFailure,
}

/// One failing requirement or failed adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Violation source
    pub kind: ViolationKind,
    /// Violated requirement, or the synthetic one of a failed adapter
    pub requirement: RequirementSummary,
    /// Failed tool, only for execution failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Rules the requirement is part of
    pub rules: Vec<RuleRef>,
    /// Matching findings ordered by id
    pub findings: Vec<FindingRef>,
    /// Finding reasons, deduplicated case-insensitively
    pub reasons: Vec<String>,
}

/// Requirement fields copied into a violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequirementSummary {
    /// Stable id
    pub id: String,
    /// Display name
    pub name: String,
    /// Free-text description
    pub description: String,
    /// Remediation text
    pub fix_suggestion: Option<String>,
    /// Requirement default severity
    #[schema(value_type = String)]
    pub severity_default: Severity,
}

/// Rule cited by a violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RuleRef {
    /// Stable id
    pub id: String,
    /// Article or clause number
    pub article_number: Option<String>,
    /// Short title
    pub title: String,
    /// Free-text description
    pub description: Option<String>,
    /// Regulation the rule falls under
    pub regulation: Option<RegulationRef>,
}

/// Regulation a rule falls under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegulationRef {
    /// Stable id
    pub id: String,
    /// Display name
    pub name: String,
}

/// Finding cited by a violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FindingRef {
    /// Finding id
    pub finding_id: String,
    /// Tool family name
    pub tool: String,
    /// Short title
    pub title: String,
    /// Normalized severity
    #[schema(value_type = String)]
    pub severity: Severity,
    /// Reason recorded on the `MATCHES` edge
    pub reason: Option<String>,
    /// Evidence trail
    pub evidence: Vec<EvidenceRef>,
}

/// Evidence key and value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EvidenceRef {
    /// Evidence key
    pub key: String,
    /// Evidence value
    pub value: String,
}

/// Status of one Test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TestStatus {
    /// Test id
    pub test_id: String,
    /// Display name
    pub name: String,
    /// Tool family name
    pub tool: Option<String>,
    /// PASS, FAIL or ERROR
    pub status: Status,
    /// Findings `DETECTED_BY` this test in the scan
    pub failure_count: usize,
    /// Reasons of the failed adapters covering this Test
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Report rendering switches
#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    /// Add an execution-failure violation per failed adapter
    pub synthetic_failures: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            synthetic_failures: true,
        }
    }
}

/// Report generator
pub struct ReportGenerator;

impl ReportGenerator {
    /// Read the scan's graph and aggregate it
    pub async fn build_report(
        store: &dyn GraphStore,
        scan_id: &str,
        index: &OntologyIndex,
        catalog: &TestCatalog,
        options: ReportOptions,
    ) -> Result<Report, ComplianceError> {
        let graph = store.scan_graph(scan_id).await?;
        Ok(aggregate(&graph, index, catalog, options))
    }
}

/// Aggregate one scan graph into a report
pub fn aggregate(
    graph: &ScanGraph,
    index: &OntologyIndex,
    catalog: &TestCatalog,
    options: ReportOptions,
) -> Report {
    // requirement id -> matching findings (ordered by finding id)
    let mut matches: BTreeMap<&str, Vec<(&StoredFinding, Option<&str>)>> = BTreeMap::new();
    for stored in &graph.findings {
        for edge in &stored.matches {
            if index.requirements.contains_key(&edge.requirement_id) {
                matches
                    .entry(edge.requirement_id.as_str())
                    .or_default()
                    .push((stored, edge.reason.as_deref()));
            }
        }
    }

    let requirement_statuses: Vec<RequirementStatus> = index
        .requirements
        .values()
        .map(|requirement| {
            let failure_count = matches.get(requirement.id.as_str()).map_or(0, Vec::len);
            RequirementStatus {
                requirement_id: requirement.id.clone(),
                requirement_name: requirement.name.clone(),
                status: if failure_count > 0 { Status::Fail } else { Status::Pass },
                failure_count,
            }
        })
        .collect();

    let mut regulation_breakdown: BTreeMap<String, RegulationBreakdown> = index
        .regulations
        .values()
        .map(|regulation| {
            (
                regulation.id.clone(),
                RegulationBreakdown {
                    name: regulation.name.clone(),
                    failures: 0,
                },
            )
        })
        .collect();

    let mut violations = Vec::new();
    for (requirement_id, found) in &matches {
        let Some(requirement) = index.requirements.get(*requirement_id) else {
            continue;
        };

        for regulation_id in index.regulations_of(requirement) {
            if let Some(entry) = regulation_breakdown.get_mut(regulation_id) {
                entry.failures += 1;
            }
        }

        let rules = index
            .rules_of(requirement)
            .into_iter()
            .map(|rule| RuleRef {
                id: rule.id.clone(),
                article_number: rule.article_number.clone(),
                title: rule.title.clone(),
                description: rule.description.clone(),
                regulation: index.regulation_of(rule).map(|regulation| RegulationRef {
                    id: regulation.id.clone(),
                    name: regulation.name.clone(),
                }),
            })
            .collect();

        let findings: Vec<FindingRef> = found
            .iter()
            .map(|(stored, reason)| FindingRef {
                finding_id: stored.finding.id.clone(),
                tool: stored.finding.tool.clone(),
                title: stored.finding.title.clone(),
                severity: stored.finding.severity,
                reason: reason.map(str::to_string),
                evidence: stored
                    .evidence
                    .iter()
                    .map(|e| EvidenceRef {
                        key: e.key.clone(),
                        value: e.value.clone(),
                    })
                    .collect(),
            })
            .collect();

        let reasons = dedupe_reasons(findings.iter().filter_map(|f| f.reason.as_deref()));

        violations.push(Violation {
            kind: ViolationKind::Requirement,
            requirement: RequirementSummary {
                id: requirement.id.clone(),
                name: requirement.name.clone(),
                description: requirement.description.clone(),
                fix_suggestion: requirement.fix_suggestion.clone(),
                severity_default: requirement.severity_default,
            },
            tool: None,
            rules,
            findings,
            reasons,
        });
    }
    let total_failures = violations.len();

    let failed_runs: Vec<&ToolRun> = graph
        .tool_runs
        .iter()
        .filter(|run| run.outcome.is_error())
        .collect();

    if options.synthetic_failures {
        for run in &failed_runs {
            violations.push(execution_failure(run));
        }
    }

    let mut detected: BTreeMap<&str, usize> = BTreeMap::new();
    for stored in &graph.findings {
        *detected.entry(stored.finding.test_id.as_str()).or_default() += 1;
    }

    let tests = index
        .tests
        .values()
        .map(|test| {
            let failure_count = detected.get(test.id.as_str()).copied().unwrap_or(0);
            let error = failure_reason(graph, &failed_runs, catalog, &test.id);
            // findings that did come back still count as a failure
            let status = if failure_count > 0 {
                Status::Fail
            } else if error.is_some() {
                Status::Error
            } else {
                Status::Pass
            };
            TestStatus {
                test_id: test.id.clone(),
                name: test.name.clone(),
                tool: test.tool.clone(),
                status,
                failure_count,
                error,
            }
        })
        .collect();

    Report {
        scan_id: graph.scan.id.clone(),
        target: graph.scan.target.clone(),
        summary: ReportSummary {
            total_tests: index.tests.len(),
            total_failures,
            regulation_breakdown,
        },
        requirement_statuses,
        violations,
        tests,
    }
}

fn run_reason(run: &ToolRun) -> String {
    run.reason
        .clone()
        .unwrap_or_else(|| format!("{} did not complete", run.tool))
}

/// Reasons of the failed runs covering `test_id`, joined.
///
/// A run covers the Test it names. A run naming its tool's default Test,
/// or no Test at all, also covers the other Tests its tool owns unless a
/// sibling run of that tool names them.
fn failure_reason(
    graph: &ScanGraph,
    failed_runs: &[&ToolRun],
    catalog: &TestCatalog,
    test_id: &str,
) -> Option<String> {
    let owner = catalog.owner(test_id);
    let claimed_by_sibling = |tool: &str| {
        graph
            .tool_runs
            .iter()
            .any(|run| run.tool == tool && run.test_id.as_deref() == Some(test_id))
    };

    let reasons: Vec<String> = failed_runs
        .iter()
        .filter(|run| {
            if run.test_id.as_deref() == Some(test_id) {
                return true;
            }
            let Some(tool) = ToolKind::parse(&run.tool) else {
                return false;
            };
            let tool_wide = run
                .test_id
                .as_deref()
                .map_or(true, |id| id == catalog.default_test(tool));
            tool_wide && owner == Some(tool) && !claimed_by_sibling(run.tool.as_str())
        })
        .map(|run| run_reason(run))
        .collect();

    let reasons = dedupe_reasons(reasons.iter().map(String::as_str));
    (!reasons.is_empty()).then(|| reasons.join("; "))
}

fn execution_failure(run: &ToolRun) -> Violation {
    let tool = run.tool.as_str();
    let source = if run.adapter.is_empty() { tool } else { run.adapter.as_str() };
    let reason = run_reason(run);
    Violation {
        kind: ViolationKind::ExecutionFailure,
        requirement: RequirementSummary {
            id: format!("execution-failure:{}", source),
            name: "Test execution failed".into(),
            description: format!("{} could not be evaluated: {}", source, reason),
            fix_suggestion: Some(EXECUTION_FAILURE_FIX.into()),
            severity_default: Severity::Info,
        },
        tool: Some(tool.to_string()),
        rules: Vec::new(),
        findings: Vec::new(),
        reasons: vec![reason],
    }
}

/// Keep the first wording of each reason, compared case-insensitively
pub fn dedupe_reasons<'a>(reasons: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    reasons
        .into_iter()
        .filter(|reason| !reason.trim().is_empty())
        .filter(|reason| seen.insert(reason.trim().to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Ids of failing requirements, for callers that only need the set
pub fn failing_requirements(report: &Report) -> BTreeSet<&str> {
    report
        .requirement_statuses
        .iter()
        .filter(|s| s.status == Status::Fail)
        .map(|s| s.requirement_id.as_str())
        .collect()
}
