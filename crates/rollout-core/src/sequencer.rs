use std::collections::HashSet;

use crate::action::{
    ActionId, AnchorPosition, AnchorTarget, ExecutionContext, SequenceKind,
};
use crate::checkpoint::Checkpoint;
use crate::error::{Result, RolloutError};
use crate::registry::ActionRegistry;

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanEntry {
    Checkpoint(Checkpoint),
    Action(ActionId),
}

impl PlanEntry {
    pub fn describe(&self) -> String {
        match self {
            PlanEntry::Checkpoint(cp) => format!("[{cp}]"),
            PlanEntry::Action(id) => id.to_string(),
        }
    }
}

/// A fully resolved, totally ordered sequence. Built once at configuration
/// time and immutable afterward; the executor only ever walks it.
#[derive(Debug)]
pub struct Plan {
    pub sequence: SequenceKind,
    entries: Vec<PlanEntry>,
    warnings: Vec<String>,
}

impl Plan {
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// Action ids in plan order, checkpoints elided.
    pub fn action_ids(&self) -> Vec<&ActionId> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                PlanEntry::Action(id) => Some(id),
                PlanEntry::Checkpoint(_) => None,
            })
            .collect()
    }

    pub fn position(&self, id: &ActionId) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| matches!(e, PlanEntry::Action(a) if a == id))
    }

    /// Non-fatal configuration findings (currently: forward/compensation
    /// condition drift).
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

// ---------------------------------------------------------------------------
// Plan building
// ---------------------------------------------------------------------------

struct Placed {
    entry: PlanEntry,
    // Anchor that put this entry here; None for skeleton checkpoints.
    anchored: Option<(AnchorPosition, AnchorTarget)>,
}

/// Order all registered actions for one sequence.
///
/// The checkpoint skeleton is fixed; each action is inserted immediately
/// before/after its anchor, recursively resolved, with ties broken by
/// registration order. Any unresolved anchor, anchor cycle, or invalid
/// rollback pairing refuses the whole plan — a partially ordered plan is
/// never produced.
pub fn build_plan(registry: &ActionRegistry, kind: SequenceKind) -> Result<Plan> {
    let warnings = validate_pairings(registry)?;

    let members: Vec<_> = registry.members(kind).collect();
    let member_ids: HashSet<&ActionId> = members.iter().map(|a| &a.id).collect();
    let skeleton: HashSet<Checkpoint> = kind.skeleton().iter().copied().collect();

    // Anchors that can never resolve fail up front.
    for def in &members {
        match &def.anchor.target {
            AnchorTarget::Checkpoint(cp) if !skeleton.contains(cp) => {
                return Err(unresolved(def.id.as_str(), &def.anchor.target, kind));
            }
            AnchorTarget::Action(target) if !member_ids.contains(target) => {
                return Err(unresolved(def.id.as_str(), &def.anchor.target, kind));
            }
            _ => {}
        }
    }

    let mut placed: Vec<Placed> = kind
        .skeleton()
        .iter()
        .map(|cp| Placed {
            entry: PlanEntry::Checkpoint(*cp),
            anchored: None,
        })
        .collect();

    // Multi-pass placement: an action anchored to another action can only
    // be placed once its target is. A pass that places nothing while work
    // remains means the remaining anchors form a cycle.
    let mut pending = members;
    while !pending.is_empty() {
        let before = pending.len();
        pending.retain(|def| {
            let Some(target_idx) = target_index(&placed, &def.anchor.target) else {
                return true;
            };
            let at = insertion_index(&placed, target_idx, &def.anchor);
            placed.insert(
                at,
                Placed {
                    entry: PlanEntry::Action(def.id.clone()),
                    anchored: Some((def.anchor.position, def.anchor.target.clone())),
                },
            );
            false
        });
        if pending.len() == before {
            let ids: Vec<&str> = pending.iter().map(|d| d.id.as_str()).collect();
            return Err(RolloutError::AnchorCycle(ids.join(", ")));
        }
    }

    let entries: Vec<PlanEntry> = placed.into_iter().map(|p| p.entry).collect();
    validate_make_changes_region(registry, &entries)?;

    for warning in &warnings {
        tracing::warn!(sequence = %kind, "{warning}");
    }
    tracing::debug!(
        sequence = %kind,
        entries = entries.len(),
        "plan built"
    );

    Ok(Plan {
        sequence: kind,
        entries,
        warnings,
    })
}

fn unresolved(action: &str, target: &AnchorTarget, kind: SequenceKind) -> RolloutError {
    RolloutError::UnresolvedAnchor {
        action: action.to_string(),
        target: target.describe(),
        sequence: kind.to_string(),
    }
}

fn target_index(placed: &[Placed], target: &AnchorTarget) -> Option<usize> {
    placed.iter().position(|p| match (&p.entry, target) {
        (PlanEntry::Checkpoint(cp), AnchorTarget::Checkpoint(t)) => cp == t,
        (PlanEntry::Action(id), AnchorTarget::Action(t)) => id == t,
        _ => false,
    })
}

fn insertion_index(placed: &[Placed], target_idx: usize, anchor: &crate::action::Anchor) -> usize {
    match anchor.position {
        // Inserting at the target's index lands after anything already
        // placed before it, preserving registration order among ties.
        AnchorPosition::Before => target_idx,
        // Skip past everything already hanging off the same target so
        // earlier registrations keep their relative order. That block is
        // not just direct `(After, target)` siblings: an entry anchored to
        // a sibling (a rollback placed before its forward action, or a
        // chained action) belongs to the block too.
        AnchorPosition::After => {
            let mut at = target_idx + 1;
            while at < placed.len() && in_after_block(placed, &placed[at], &anchor.target) {
                at += 1;
            }
            at
        }
    }
}

/// Whether `entry` transitively belongs to the block of entries placed
/// after `target`: either directly anchored `(After, target)`, or anchored
/// (on either side) to an action that does. Placed entries form a DAG by
/// construction, so the chain always terminates.
fn in_after_block(placed: &[Placed], entry: &Placed, target: &AnchorTarget) -> bool {
    match &entry.anchored {
        None => false,
        Some((AnchorPosition::After, t)) if t == target => true,
        Some((_, AnchorTarget::Action(id))) => placed
            .iter()
            .find(|p| matches!(&p.entry, PlanEntry::Action(a) if a == id))
            .is_some_and(|p| in_after_block(placed, p, target)),
        Some(_) => false,
    }
}

/// Deferred and rollback actions must sit inside the make-changes phase:
/// their snapshots are frozen at the boundary and their bodies belong to
/// the transacted part of the run.
fn validate_make_changes_region(registry: &ActionRegistry, entries: &[PlanEntry]) -> Result<()> {
    let boundary = entries
        .iter()
        .position(|e| matches!(e, PlanEntry::Checkpoint(cp) if *cp == Checkpoint::make_changes_boundary()));
    let finalize = entries
        .iter()
        .position(|e| matches!(e, PlanEntry::Checkpoint(Checkpoint::InstallFinalize)));

    for (idx, entry) in entries.iter().enumerate() {
        let PlanEntry::Action(id) = entry else {
            continue;
        };
        let Some(def) = registry.get(id) else {
            continue;
        };
        if def.context == ExecutionContext::Immediate {
            continue;
        }
        let inside = match (boundary, finalize) {
            (Some(b), Some(f)) => idx > b && idx < f,
            _ => false,
        };
        if !inside {
            return Err(RolloutError::OutsideMakeChangesPhase {
                action: id.to_string(),
                context: def.context.to_string(),
            });
        }
    }
    Ok(())
}

/// Registry-wide rollback pairing checks. Invalid pairings are
/// configuration errors; forward/compensation condition drift is reported
/// as a warning because the source domain drifts intentionally in places.
pub fn validate_pairings(registry: &ActionRegistry) -> Result<Vec<String>> {
    let mut warnings = Vec::new();
    let mut seen: Vec<(&ActionId, &ActionId)> = Vec::new();

    for def in registry.iter() {
        if def.context != ExecutionContext::Rollback {
            continue;
        }
        // The builder guarantees compensates is present for rollback actions.
        let Some(target) = &def.compensates else {
            continue;
        };
        let Some(forward) = registry.get(target) else {
            return Err(RolloutError::UnknownCompensationTarget {
                action: def.id.to_string(),
                target: target.to_string(),
            });
        };
        if forward.context == ExecutionContext::Rollback {
            return Err(RolloutError::InvalidCompensationTarget {
                action: def.id.to_string(),
                target: target.to_string(),
            });
        }
        if let Some((_, first)) = seen.iter().find(|(t, _)| *t == target) {
            return Err(RolloutError::DuplicateCompensation {
                target: target.to_string(),
                first: first.to_string(),
                second: def.id.to_string(),
            });
        }
        seen.push((target, &def.id));

        if forward.condition != def.condition {
            warnings.push(format!(
                "rollback action '{}' is gated differently than the forward action '{}' it compensates",
                def.id, forward.id
            ));
        }
    }
    Ok(warnings)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
