use std::collections::{HashMap, HashSet};

use crate::action::{ActionId, BodyOutcome, ExecutionContext, ReturnPolicy};
use crate::checkpoint::Checkpoint;
use crate::record::{Disposition, ExecutionRecord, SessionOutcome, SessionReport};
use crate::registry::ActionRegistry;
use crate::rollback::RollbackCoordinator;
use crate::sequencer::{Plan, PlanEntry};
use crate::session::{PropertyAccess, PropertySnapshot, SessionState};

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Walks one or more plans for a session, strictly sequentially. Each body
/// runs to completion before the next entry is considered; the only
/// cancellation path is session abort, which hands the record to the
/// rollback coordinator.
pub struct Executor<'a> {
    registry: &'a ActionRegistry,
}

impl<'a> Executor<'a> {
    pub fn new(registry: &'a ActionRegistry) -> Self {
        Self { registry }
    }

    /// Run the session: walk the given plans in order, sharing one record
    /// and one property bag. Returns the final report; body failures never
    /// escape as errors.
    pub fn run(&self, plans: &[Plan], session: &mut SessionState) -> SessionReport {
        let flags = *session.flags();
        let mut record = ExecutionRecord::new();
        let mut coordinator = RollbackCoordinator::new();
        // Input snapshots for deferred/rollback bodies, frozen when the
        // walk reaches the make-changes boundary.
        let mut snapshots: HashMap<ActionId, PropertySnapshot> = HashMap::new();
        // Actions already invoked, for first-sequence-only membership.
        let mut ran: HashSet<ActionId> = HashSet::new();

        for plan in plans {
            tracing::debug!(sequence = %plan.sequence, "walking sequence");
            for entry in plan.entries() {
                let id = match entry {
                    PlanEntry::Checkpoint(cp) => {
                        tracing::debug!(checkpoint = %cp, "checkpoint");
                        if *cp == Checkpoint::make_changes_boundary() {
                            self.freeze_snapshots(plan, session, &mut snapshots);
                        }
                        continue;
                    }
                    PlanEntry::Action(id) => id,
                };
                let Some(def) = self.registry.get(id) else {
                    continue;
                };

                // Rollback entries hold a plan position but never run
                // forward; only the coordinator invokes them.
                if def.context == ExecutionContext::Rollback {
                    continue;
                }

                if def.first_sequence_only && ran.contains(id) {
                    tracing::debug!(action = %id, "already ran in an earlier sequence");
                    record.append(id.clone(), def.context, Disposition::Skipped);
                    continue;
                }

                if !def.condition.evaluate(&flags, &session.properties) {
                    tracing::debug!(action = %id, "condition false, skipping");
                    record.append(id.clone(), def.context, Disposition::Skipped);
                    continue;
                }

                if def.hide_input_values {
                    tracing::debug!(action = %id, inputs = ?def.declared_inputs, "invoking (values hidden)");
                } else {
                    let inputs: Vec<(String, String)> = def
                        .declared_inputs
                        .iter()
                        .map(|n| (n.clone(), session.properties.get(n).to_string()))
                        .collect();
                    tracing::debug!(action = %id, ?inputs, "invoking");
                }

                let outcome = match def.context {
                    ExecutionContext::Immediate => {
                        def.body.run(PropertyAccess::Live(&mut session.properties))
                    }
                    ExecutionContext::Deferred => {
                        let snap = snapshots.get(id).cloned().unwrap_or_default();
                        def.body.run(PropertyAccess::Snapshot(&snap))
                    }
                    ExecutionContext::Rollback => unreachable!("filtered above"),
                };
                ran.insert(id.clone());

                match outcome {
                    BodyOutcome::Succeeded => {
                        record.append(id.clone(), def.context, Disposition::Succeeded);
                    }
                    BodyOutcome::Failed(reason) => match def.return_policy {
                        ReturnPolicy::Ignore => {
                            tracing::warn!(action = %id, %reason, "failure ignored");
                            record.append(
                                id.clone(),
                                def.context,
                                Disposition::FailedIgnored { reason },
                            );
                        }
                        ReturnPolicy::Check | ReturnPolicy::CheckLogged => {
                            if def.return_policy == ReturnPolicy::CheckLogged {
                                tracing::error!(action = %id, %reason, "action failed, aborting session");
                            } else {
                                tracing::error!(action = %id, "action failed, aborting session");
                            }
                            record.append(id.clone(), def.context, Disposition::Failed { reason });
                            coordinator.compensate(self.registry, &mut record, &flags, &snapshots);
                            return SessionReport {
                                outcome: SessionOutcome::RolledBack,
                                record,
                            };
                        }
                    },
                }
            }
        }

        let outcome = if record.any_ignored_failures() {
            SessionOutcome::CompletedWithIgnoredFailures
        } else {
            SessionOutcome::Completed
        };
        SessionReport { outcome, record }
    }

    fn freeze_snapshots(
        &self,
        plan: &Plan,
        session: &SessionState,
        snapshots: &mut HashMap<ActionId, PropertySnapshot>,
    ) {
        for entry in plan.entries() {
            let PlanEntry::Action(id) = entry else {
                continue;
            };
            let Some(def) = self.registry.get(id) else {
                continue;
            };
            if def.context == ExecutionContext::Immediate || snapshots.contains_key(id) {
                continue;
            }
            snapshots.insert(id.clone(), session.properties.snapshot(&def.declared_inputs));
        }
        tracing::debug!(count = snapshots.len(), "froze deferred input snapshots");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
