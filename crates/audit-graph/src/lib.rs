//! AutoAudit Knowledge Graph
//!
//! Storage layer for the compliance audit engine.
//!
//! # Architecture
//!
//! ```text
//! Regulation ◄──UNDER── Rule ◄──PART_OF── Requirement ──TESTED_BY──► Test
//!                                              ▲                      ▲
//!                                           MATCHES              DETECTED_BY
//!                                              │                      │
//! Scan ──FOUND──► Finding ─────────────────────┴──────────────────────┘
//!                    │
//!               HAS_EVIDENCE
//!                    ▼
//!                 Evidence
//! ```
//!
//! Ontology nodes are global; findings, evidence and tool runs are stored per scan.

#![warn(missing_docs)]
#![allow(dead_code)]

/// In-memory store
pub mod memory;
/// Node and edge types
pub mod model;
/// JSON persistence for the in-memory store
pub mod snapshot;
/// Storage trait and errors
pub mod store;

pub use memory::{tool_run, InMemoryGraphStore};
pub use model::*;
pub use snapshot::GraphSnapshot;
pub use store::{GraphStore, StoreError, StoreResult};
