//! Migration registry and runner

#![allow(clippy::result_large_err)]

use super::steps;
use crate::errors::{from_rusqlite, migration_error, Result};
use crate::metadata::set_format_version;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Instant;
use wiretuner_core::errors::ExError;
use wiretuner_core::version::{VersionStatus, CURRENT_FORMAT_VERSION};
use wiretuner_core::{log_op_end, log_op_error, log_op_start};
use wiretuner_core_types::DocumentId;

type StepFn = fn(&Transaction<'_>, &DocumentId) -> rusqlite::Result<usize>;

/// One single-version hop
#[derive(Clone, Copy)]
pub struct FormatMigration {
    pub from: i64,
    pub to: i64,
    pub name: &'static str,
    apply: StepFn,
}

impl std::fmt::Debug for FormatMigration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatMigration")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("name", &self.name)
            .finish()
    }
}

/// Every known step, ordered by `from`
pub fn registry() -> Vec<FormatMigration> {
    vec![
        FormatMigration {
            from: 1,
            to: 2,
            name: "dotted_event_tags",
            apply: steps::rename_event_tags,
        },
        FormatMigration {
            from: 2,
            to: 3,
            name: "framed_snapshots",
            apply: steps::frame_snapshots,
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub name: &'static str,
    pub from: i64,
    pub to: i64,
    pub rows_changed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub from: i64,
    pub to: i64,
    pub steps: Vec<StepReport>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Bring a document from `stored_version` to the current format
///
/// All steps and the final `formatVersion` update run in one transaction;
/// on any failure nothing is changed.
///
/// # Errors
///
/// - `SchemaTooNew` if `stored_version` is newer than this build
/// - `InvalidFormatVersion` for versions below 1
/// - `MigrationFailed` if a step fails or is missing from the registry
pub fn migrate_document(
    conn: &mut Connection,
    document_id: &DocumentId,
    stored_version: i64,
) -> Result<MigrationReport> {
    let status = VersionStatus::check(stored_version)
        .and_then(VersionStatus::require_readable)
        .map_err(|e| ExError::from(e).with_document_id(document_id.as_str()))?;

    let hops = status.steps();
    if hops.is_empty() {
        return Ok(MigrationReport {
            from: stored_version,
            to: stored_version,
            steps: Vec::new(),
        });
    }

    log_op_start!(
        "migrate_format",
        document_id = %document_id,
        from = stored_version,
        to = CURRENT_FORMAT_VERSION
    );
    let start = Instant::now();

    let result = run_chain(conn, document_id, &hops).map_err(|e| {
        let e = e.with_document_id(document_id.as_str());
        log_op_error!(
            "migrate_format",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    log_op_end!(
        "migrate_format",
        duration_ms = start.elapsed().as_millis() as u64,
        steps = result.len() as u64
    );

    Ok(MigrationReport {
        from: stored_version,
        to: CURRENT_FORMAT_VERSION,
        steps: result,
    })
}

fn run_chain(
    conn: &mut Connection,
    document_id: &DocumentId,
    hops: &[(i64, i64)],
) -> Result<Vec<StepReport>> {
    let known = registry();
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(from_rusqlite)?;

    let mut reports = Vec::with_capacity(hops.len());
    for (from, to) in hops {
        let step = known
            .iter()
            .find(|m| m.from == *from && m.to == *to)
            .ok_or_else(|| {
                migration_error(&format!("v{}->v{}", from, to), "no migration registered")
            })?;

        let rows_changed = (step.apply)(&tx, document_id)
            .map_err(|e| migration_error(step.name, &e.to_string()))?;

        tracing::info!(
            document_id = %document_id,
            step = step.name,
            from = step.from,
            to = step.to,
            rows_changed = rows_changed as u64,
            "Applied format migration step"
        );
        reports.push(StepReport {
            name: step.name,
            from: step.from,
            to: step.to,
            rows_changed,
        });
    }

    set_format_version(&tx, document_id, CURRENT_FORMAT_VERSION)
        .map_err(|e| migration_error("format_version", &e.to_string()))?;

    tx.commit().map_err(from_rusqlite)?;
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_is_contiguous_single_steps() {
        let steps = registry();
        assert_eq!(steps.first().map(|s| s.from), Some(1));
        assert_eq!(steps.last().map(|s| s.to), Some(CURRENT_FORMAT_VERSION));
        for pair in steps.windows(2) {
            assert_eq!(pair[0].to, pair[1].from);
        }
        assert!(steps.iter().all(|s| s.to == s.from + 1));
    }
}
