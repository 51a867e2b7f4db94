//! API Routes

/// Liveness
pub mod health;
/// Scan submission and reports
pub mod scans;
