//! JSON snapshots of the in-memory store

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::memory::{InMemoryGraphStore, OntologyState, ScanState};
use crate::model::{OntologySnapshot, ScanGraph};
use crate::store::StoreResult;

/// Serialized form of the whole graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Whole ontology
    pub ontology: OntologySnapshot,
    /// Every scan, ordered by id
    pub scans: Vec<ScanGraph>,
}

impl InMemoryGraphStore {
    /// Copy the current graph, scans ordered by id
    pub fn snapshot(&self) -> GraphSnapshot {
        let ontology = {
            let state = self.ontology.read();
            OntologySnapshot {
                regulations: state.regulations.values().cloned().collect(),
                rules: state.rules.values().cloned().collect(),
                requirements: state.requirements.values().cloned().collect(),
                tests: state.tests.values().cloned().collect(),
            }
        };
        let mut scans: Vec<ScanGraph> = self.scans.iter().map(|entry| entry.value().to_graph()).collect();
        scans.sort_by(|a, b| a.scan.id.cmp(&b.scan.id));
        GraphSnapshot { ontology, scans }
    }

    /// Rebuild a store from a snapshot
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        let store = Self::new();
        {
            let mut state = store.ontology.write();
            *state = OntologyState {
                regulations: by_id(snapshot.ontology.regulations, |r| r.id.clone()),
                rules: by_id(snapshot.ontology.rules, |r| r.id.clone()),
                requirements: by_id(snapshot.ontology.requirements, |r| r.id.clone()),
                tests: by_id(snapshot.ontology.tests, |t| t.id.clone()),
            };
        }
        for graph in snapshot.scans {
            store.scans.insert(graph.scan.id.clone(), ScanState::from_graph(graph));
        }
        store
    }

    /// Write the graph as pretty JSON
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        let path = path.as_ref();
        let snapshot = self.snapshot();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(path, json)?;
        info!(
            "Saved graph snapshot to {} ({} scans)",
            path.display(),
            snapshot.scans.len()
        );
        Ok(())
    }

    /// Load a store from a snapshot file. A missing file yields an empty store.
    pub fn load_snapshot(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No snapshot at {}, starting empty", path.display());
            return Ok(Self::new());
        }
        let json = std::fs::read_to_string(path)?;
        let snapshot: GraphSnapshot = serde_json::from_str(&json)?;
        info!(
            "Loaded graph snapshot from {} ({} scans)",
            path.display(),
            snapshot.scans.len()
        );
        Ok(Self::from_snapshot(snapshot))
    }
}

fn by_id<T>(items: Vec<T>, key: impl Fn(&T) -> String) -> std::collections::BTreeMap<String, T> {
    items.into_iter().map(|item| (key(&item), item)).collect()
}
