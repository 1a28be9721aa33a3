use std::collections::{HashMap, HashSet};

use crate::action::{ActionId, BodyOutcome, ExecutionContext};
use crate::record::{Disposition, ExecutionRecord};
use crate::registry::ActionRegistry;
use crate::session::{LifecycleFlags, PropertyAccess, PropertySnapshot};

// ---------------------------------------------------------------------------
// RollbackCoordinator
// ---------------------------------------------------------------------------

/// Session-level rollback phase. Strictly one-way: once a session enters
/// `Compensating` it never resumes forward work, and `Compensated` is
/// terminal regardless of how individual compensations fared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackPhase {
    Normal,
    Compensating,
    Compensated,
}

/// Drives compensation after a forward abort: scans the execution record
/// in reverse and invokes the paired rollback action for each forward
/// action that actually succeeded. Best-effort throughout; a failing
/// compensation is recorded and the scan continues.
#[derive(Debug)]
pub struct RollbackCoordinator {
    phase: RollbackPhase,
}

impl Default for RollbackCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RollbackCoordinator {
    pub fn new() -> Self {
        Self {
            phase: RollbackPhase::Normal,
        }
    }

    pub fn phase(&self) -> RollbackPhase {
        self.phase
    }

    /// Compensate every successful forward action, newest first. Each
    /// rollback body sees only its own frozen snapshot; rollback actions
    /// whose forward partner was skipped or failed are never invoked.
    pub fn compensate(
        &mut self,
        registry: &ActionRegistry,
        record: &mut ExecutionRecord,
        flags: &LifecycleFlags,
        snapshots: &HashMap<ActionId, PropertySnapshot>,
    ) {
        self.phase = RollbackPhase::Compensating;
        tracing::warn!("session aborted, compensating in reverse order");

        let successes: Vec<ActionId> = record.successes().map(|e| e.action.clone()).collect();
        // A forward action can appear twice across sequences; compensate
        // it once, at its most recent success.
        let mut compensated: HashSet<ActionId> = HashSet::new();

        for forward in successes.iter().rev() {
            if !compensated.insert(forward.clone()) {
                continue;
            }
            let Some(comp) = registry.compensation_for(forward) else {
                continue;
            };

            let snapshot = snapshots
                .get(&comp.id)
                .cloned()
                .unwrap_or_else(PropertySnapshot::empty);

            if !comp.condition.evaluate(flags, &snapshot) {
                tracing::debug!(action = %comp.id, "compensation condition false, skipping");
                record.append(comp.id.clone(), ExecutionContext::Rollback, Disposition::Skipped);
                continue;
            }

            tracing::info!(action = %comp.id, compensates = %forward, "compensating");
            match comp.body.run(PropertyAccess::Snapshot(&snapshot)) {
                BodyOutcome::Succeeded => {
                    record.append(
                        comp.id.clone(),
                        ExecutionContext::Rollback,
                        Disposition::Compensated,
                    );
                }
                BodyOutcome::Failed(reason) => {
                    tracing::warn!(action = %comp.id, %reason, "compensation failed, continuing");
                    record.append(
                        comp.id.clone(),
                        ExecutionContext::Rollback,
                        Disposition::CompensationFailed { reason },
                    );
                }
            }
        }

        self.phase = RollbackPhase::Compensated;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
