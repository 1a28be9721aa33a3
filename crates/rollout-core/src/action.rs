use serde::{Deserialize, Serialize};
use std::fmt;

use crate::checkpoint::Checkpoint;
use crate::condition::Condition;
use crate::error::{Result, RolloutError};
use crate::session::PropertyAccess;

// ---------------------------------------------------------------------------
// ActionId
// ---------------------------------------------------------------------------

/// Unique, stable identifier for a registered action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActionId {
    fn from(s: &str) -> Self {
        ActionId::new(s)
    }
}

// ---------------------------------------------------------------------------
// ReturnPolicy / ExecutionContext / SequenceKind
// ---------------------------------------------------------------------------

/// What a failure of the action's body means for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnPolicy {
    /// Abort the session's forward phase and hand control to rollback.
    Check,
    /// Record the failure and continue.
    Ignore,
    /// Like `Check`, but the failure reason is also emitted to the log
    /// before the abort.
    CheckLogged,
}

impl ReturnPolicy {
    pub fn aborts_on_failure(self) -> bool {
        matches!(self, ReturnPolicy::Check | ReturnPolicy::CheckLogged)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReturnPolicy::Check => "check",
            ReturnPolicy::Ignore => "ignore",
            ReturnPolicy::CheckLogged => "check_logged",
        }
    }
}

/// When and against which property view the body runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionContext {
    /// Runs synchronously at its plan position with live bag access.
    Immediate,
    /// Queued into the make-changes phase; runs at its plan position
    /// against a snapshot frozen at the phase boundary.
    Deferred,
    /// Never runs forward; invoked only by the rollback coordinator.
    Rollback,
}

impl ExecutionContext {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionContext::Immediate => "immediate",
            ExecutionContext::Deferred => "deferred",
            ExecutionContext::Rollback => "rollback",
        }
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level sequences an action may belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceKind {
    Install,
    Ui,
}

impl SequenceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SequenceKind::Install => "install",
            SequenceKind::Ui => "ui",
        }
    }

    pub fn skeleton(self) -> &'static [Checkpoint] {
        match self {
            SequenceKind::Install => Checkpoint::install_skeleton(),
            SequenceKind::Ui => Checkpoint::ui_skeleton(),
        }
    }
}

impl fmt::Display for SequenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SequenceKind {
    type Err = RolloutError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "install" => Ok(SequenceKind::Install),
            "ui" => Ok(SequenceKind::Ui),
            _ => Err(RolloutError::UnknownSequence(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Anchor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorPosition {
    Before,
    After,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorTarget {
    Checkpoint(Checkpoint),
    Action(ActionId),
}

impl AnchorTarget {
    pub fn describe(&self) -> String {
        match self {
            AnchorTarget::Checkpoint(cp) => format!("checkpoint {cp}"),
            AnchorTarget::Action(id) => format!("action {id}"),
        }
    }
}

impl From<Checkpoint> for AnchorTarget {
    fn from(cp: Checkpoint) -> Self {
        AnchorTarget::Checkpoint(cp)
    }
}

impl From<ActionId> for AnchorTarget {
    fn from(id: ActionId) -> Self {
        AnchorTarget::Action(id)
    }
}

impl From<&str> for AnchorTarget {
    fn from(id: &str) -> Self {
        AnchorTarget::Action(ActionId::new(id))
    }
}

/// Where an action sits in a sequence: immediately before or after a
/// checkpoint or another registered action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub position: AnchorPosition,
    pub target: AnchorTarget,
}

impl Anchor {
    pub fn before(target: impl Into<AnchorTarget>) -> Self {
        Self {
            position: AnchorPosition::Before,
            target: target.into(),
        }
    }

    pub fn after(target: impl Into<AnchorTarget>) -> Self {
        Self {
            position: AnchorPosition::After,
            target: target.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionBody
// ---------------------------------------------------------------------------

/// Result of invoking an action body. Bodies report failure as data;
/// nothing an external collaborator does may propagate past the executor
/// as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyOutcome {
    Succeeded,
    Failed(String),
}

/// An opaque action body supplied by an external collaborator (config
/// writer, service manager, account manager, package installer). The
/// orchestrator guarantees at-most-once forward invocation per run, plus
/// at most one invocation of its paired rollback action.
pub trait ActionBody {
    fn run(&self, props: PropertyAccess<'_>) -> BodyOutcome;
}

impl<F> ActionBody for F
where
    F: Fn(PropertyAccess<'_>) -> BodyOutcome,
{
    fn run(&self, props: PropertyAccess<'_>) -> BodyOutcome {
        self(props)
    }
}

// ---------------------------------------------------------------------------
// ActionDefinition
// ---------------------------------------------------------------------------

/// Immutable descriptor for one registered action. Built through
/// [`ActionBuilder`], which validates the definition at configuration time.
pub struct ActionDefinition {
    pub id: ActionId,
    pub body: Box<dyn ActionBody>,
    pub return_policy: ReturnPolicy,
    pub condition: Condition,
    pub context: ExecutionContext,
    pub anchor: Anchor,
    /// Ordered property names captured into this action's snapshot for
    /// deferred/rollback execution. The action's entire contract with the
    /// property namespace.
    pub declared_inputs: Vec<String>,
    pub sequences: Vec<SequenceKind>,
    /// Run in whichever member sequence executes first, then skip.
    pub first_sequence_only: bool,
    /// Body requires elevated (non-impersonated) execution. Recorded for
    /// the host; the engine does not alter behavior on it.
    pub elevated: bool,
    /// Never log this action's property values, only their names.
    pub hide_input_values: bool,
    /// For `Rollback`-context actions: the forward action this compensates.
    pub compensates: Option<ActionId>,
}

impl fmt::Debug for ActionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDefinition")
            .field("id", &self.id)
            .field("return_policy", &self.return_policy)
            .field("context", &self.context)
            .field("anchor", &self.anchor)
            .field("sequences", &self.sequences)
            .field("compensates", &self.compensates)
            .finish_non_exhaustive()
    }
}

impl ActionDefinition {
    pub fn builder(id: impl Into<ActionId>, body: impl ActionBody + 'static) -> ActionBuilder {
        ActionBuilder::new(id, body)
    }

    pub fn in_sequence(&self, kind: SequenceKind) -> bool {
        self.sequences.contains(&kind)
    }
}

impl From<String> for ActionId {
    fn from(s: String) -> Self {
        ActionId::new(s)
    }
}

// ---------------------------------------------------------------------------
// ActionBuilder
// ---------------------------------------------------------------------------

/// Validating builder for [`ActionDefinition`]. Defaults mirror the most
/// common registration: immediate context, `Check` policy, `Always`
/// condition, install sequence only.
pub struct ActionBuilder {
    id: ActionId,
    body: Box<dyn ActionBody>,
    return_policy: ReturnPolicy,
    condition: Condition,
    context: ExecutionContext,
    anchor: Option<Anchor>,
    declared_inputs: Vec<String>,
    sequences: Vec<SequenceKind>,
    first_sequence_only: bool,
    elevated: bool,
    hide_input_values: bool,
    compensates: Option<ActionId>,
}

impl ActionBuilder {
    pub fn new(id: impl Into<ActionId>, body: impl ActionBody + 'static) -> Self {
        Self {
            id: id.into(),
            body: Box::new(body),
            return_policy: ReturnPolicy::Check,
            condition: Condition::Always,
            context: ExecutionContext::Immediate,
            anchor: None,
            declared_inputs: Vec::new(),
            sequences: vec![SequenceKind::Install],
            first_sequence_only: false,
            elevated: false,
            hide_input_values: false,
            compensates: None,
        }
    }

    pub fn return_policy(mut self, policy: ReturnPolicy) -> Self {
        self.return_policy = policy;
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    pub fn anchor(mut self, anchor: Anchor) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn inputs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.declared_inputs = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn sequences<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = SequenceKind>,
    {
        self.sequences = kinds.into_iter().collect();
        self
    }

    pub fn first_sequence_only(mut self) -> Self {
        self.first_sequence_only = true;
        self
    }

    pub fn elevated(mut self) -> Self {
        self.elevated = true;
        self
    }

    pub fn hide_input_values(mut self) -> Self {
        self.hide_input_values = true;
        self
    }

    pub fn compensates(mut self, target: impl Into<ActionId>) -> Self {
        self.compensates = Some(target.into());
        self
    }

    pub fn build(self) -> Result<ActionDefinition> {
        if self.id.as_str().is_empty() {
            return Err(RolloutError::EmptyActionId);
        }
        let anchor = self.anchor.ok_or_else(|| RolloutError::MissingAnchor {
            action: self.id.to_string(),
        })?;
        match (self.context, &self.compensates) {
            (ExecutionContext::Rollback, None) => {
                return Err(RolloutError::MissingCompensationTarget {
                    action: self.id.to_string(),
                });
            }
            (ExecutionContext::Immediate | ExecutionContext::Deferred, Some(_)) => {
                return Err(RolloutError::CompensationOnForwardAction {
                    action: self.id.to_string(),
                });
            }
            _ => {}
        }

        Ok(ActionDefinition {
            id: self.id,
            body: self.body,
            return_policy: self.return_policy,
            condition: self.condition,
            context: self.context,
            anchor,
            declared_inputs: self.declared_inputs,
            sequences: self.sequences,
            first_sequence_only: self.first_sequence_only,
            elevated: self.elevated,
            hide_input_values: self.hide_input_values,
            compensates: self.compensates,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::PropertyAccess;

    fn noop(_: PropertyAccess<'_>) -> BodyOutcome {
        BodyOutcome::Succeeded
    }

    #[test]
    fn builder_defaults() {
        let def = ActionDefinition::builder("read_config", noop)
            .anchor(Anchor::after(Checkpoint::CostFinalize))
            .build()
            .unwrap();
        assert_eq!(def.return_policy, ReturnPolicy::Check);
        assert_eq!(def.context, ExecutionContext::Immediate);
        assert_eq!(def.condition, Condition::Always);
        assert_eq!(def.sequences, vec![SequenceKind::Install]);
        assert!(!def.elevated);
        assert!(!def.first_sequence_only);
    }

    #[test]
    fn empty_id_rejected() {
        let err = ActionDefinition::builder("", noop)
            .anchor(Anchor::after(Checkpoint::AppSearch))
            .build()
            .unwrap_err();
        assert!(matches!(err, RolloutError::EmptyActionId));
    }

    #[test]
    fn missing_anchor_rejected() {
        let err = ActionDefinition::builder("write_config", noop)
            .build()
            .unwrap_err();
        assert!(matches!(err, RolloutError::MissingAnchor { .. }));
    }

    #[test]
    fn rollback_requires_pairing() {
        let err = ActionDefinition::builder("cleanup_rollback", noop)
            .context(ExecutionContext::Rollback)
            .anchor(Anchor::before(Checkpoint::InstallFiles))
            .build()
            .unwrap_err();
        assert!(matches!(err, RolloutError::MissingCompensationTarget { .. }));
    }

    #[test]
    fn forward_action_cannot_compensate() {
        let err = ActionDefinition::builder("write_config", noop)
            .context(ExecutionContext::Deferred)
            .anchor(Anchor::before(Checkpoint::InstallServices))
            .compensates("other")
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            RolloutError::CompensationOnForwardAction { .. }
        ));
    }

    #[test]
    fn closure_body_runs() {
        let def = ActionDefinition::builder("set_flavor", |mut props: PropertyAccess<'_>| {
            props.set("flavor", "base");
            BodyOutcome::Succeeded
        })
        .anchor(Anchor::after(Checkpoint::AppSearch))
        .build()
        .unwrap();

        let mut bag = crate::session::PropertyBag::new();
        let outcome = def.body.run(PropertyAccess::Live(&mut bag));
        assert_eq!(outcome, BodyOutcome::Succeeded);
        assert_eq!(bag.get("flavor"), "base");
    }

    #[test]
    fn anchor_constructors() {
        let a = Anchor::before(Checkpoint::InstallServices);
        assert_eq!(a.position, AnchorPosition::Before);
        assert_eq!(
            a.target,
            AnchorTarget::Checkpoint(Checkpoint::InstallServices)
        );

        let b = Anchor::after("write_config");
        assert_eq!(b.target, AnchorTarget::Action(ActionId::new("write_config")));
    }
}
