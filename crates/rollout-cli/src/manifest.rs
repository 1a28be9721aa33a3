use anyhow::{bail, Context};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use rollout_core::action::{
    ActionBody, ActionDefinition, Anchor, AnchorTarget, BodyOutcome, ExecutionContext,
    ReturnPolicy, SequenceKind,
};
use rollout_core::checkpoint::Checkpoint;
use rollout_core::condition::Condition;
use rollout_core::registry::ActionRegistry;
use rollout_core::session::{PropertyAccess, PropertyBag};

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// A YAML run manifest: initial properties plus the action definitions to
/// register. Bodies are simulated so that plans can be exercised end to end
/// without touching the host system.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    pub actions: Vec<ActionSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActionSpec {
    pub id: String,
    pub body: BodySpec,
    #[serde(default)]
    pub return_policy: Option<ReturnPolicy>,
    #[serde(default)]
    pub context: Option<ExecutionContext>,
    #[serde(default)]
    pub condition: Option<Condition>,
    pub anchor: AnchorSpec,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub sequences: Option<Vec<SequenceKind>>,
    #[serde(default)]
    pub first_sequence_only: bool,
    #[serde(default)]
    pub elevated: bool,
    #[serde(default)]
    pub hide_input_values: bool,
    #[serde(default)]
    pub compensates: Option<String>,
}

/// `before:` / `after:` with a target that is either a checkpoint name or
/// another action's id. Exactly one of the two keys must be present.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnchorSpec {
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub after: Option<String>,
}

impl AnchorSpec {
    fn resolve(&self, action_id: &str) -> anyhow::Result<Anchor> {
        let anchor = match (&self.before, &self.after) {
            (Some(target), None) => Anchor::before(parse_target(target)),
            (None, Some(target)) => Anchor::after(parse_target(target)),
            _ => bail!("action '{action_id}': anchor needs exactly one of 'before' or 'after'"),
        };
        Ok(anchor)
    }
}

fn parse_target(s: &str) -> AnchorTarget {
    // Checkpoint names win; anything else is taken as an action id and
    // validated when the plan is built.
    match Checkpoint::from_str(s) {
        Ok(cp) => AnchorTarget::Checkpoint(cp),
        Err(_) => AnchorTarget::from(s),
    }
}

// ---------------------------------------------------------------------------
// Simulated bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum BodySpec {
    /// Log a message and succeed.
    Log { message: String },
    /// Write a session property (a no-op under a snapshot view) and succeed.
    SetProperty { name: String, value: String },
    /// Fail with the given reason.
    Fail { reason: String },
}

struct SimulatedBody {
    id: String,
    spec: BodySpec,
}

impl ActionBody for SimulatedBody {
    fn run(&self, mut props: PropertyAccess<'_>) -> BodyOutcome {
        match &self.spec {
            BodySpec::Log { message } => {
                tracing::info!(action = %self.id, "{message}");
                BodyOutcome::Succeeded
            }
            BodySpec::SetProperty { name, value } => {
                props.set(name, value.clone());
                BodyOutcome::Succeeded
            }
            BodySpec::Fail { reason } => BodyOutcome::Failed(reason.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Manifest {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        let manifest: Manifest = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse manifest {}", path.display()))?;
        Ok(manifest)
    }

    /// Build the action registry from the manifest, in file order.
    pub fn registry(&self) -> anyhow::Result<ActionRegistry> {
        let mut registry = ActionRegistry::new();
        for spec in &self.actions {
            let body = SimulatedBody {
                id: spec.id.clone(),
                spec: spec.body.clone(),
            };
            let mut builder = ActionDefinition::builder(spec.id.as_str(), body)
                .anchor(spec.anchor.resolve(&spec.id)?)
                .inputs(spec.inputs.iter().cloned());
            if let Some(policy) = spec.return_policy {
                builder = builder.return_policy(policy);
            }
            if let Some(context) = spec.context {
                builder = builder.context(context);
            }
            if let Some(condition) = &spec.condition {
                builder = builder.condition(condition.clone());
            }
            if let Some(sequences) = &spec.sequences {
                builder = builder.sequences(sequences.iter().copied());
            }
            if spec.first_sequence_only {
                builder = builder.first_sequence_only();
            }
            if spec.elevated {
                builder = builder.elevated();
            }
            if spec.hide_input_values {
                builder = builder.hide_input_values();
            }
            if let Some(target) = &spec.compensates {
                builder = builder.compensates(target.as_str());
            }
            registry
                .register(builder.build()?)
                .with_context(|| format!("failed to register action '{}'", spec.id))?;
        }
        Ok(registry)
    }

    /// The top-level sequences any registered action belongs to, UI first.
    pub fn sequences(&self) -> Vec<SequenceKind> {
        let mut kinds = Vec::new();
        for kind in [SequenceKind::Ui, SequenceKind::Install] {
            let member = self.actions.iter().any(|a| match &a.sequences {
                Some(s) => s.contains(&kind),
                None => kind == SequenceKind::Install,
            });
            if member {
                kinds.push(kind);
            }
        }
        kinds
    }

    pub fn initial_properties(&self) -> PropertyBag {
        self.properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
properties:
  install_dir: /opt/app
actions:
  - id: write_config
    body:
      type: log
      message: writing config
    context: deferred
    inputs: [install_dir]
    anchor:
      after: install_files
  - id: write_config_rollback
    body:
      type: log
      message: removing config
    context: rollback
    compensates: write_config
    anchor:
      before: write_config
"#;

    #[test]
    fn sample_manifest_parses_and_registers() {
        let manifest: Manifest = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(manifest.properties["install_dir"], "/opt/app");
        let registry = manifest.registry().unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn anchor_target_prefers_checkpoint_names() {
        assert_eq!(
            parse_target("install_files"),
            AnchorTarget::Checkpoint(Checkpoint::InstallFiles)
        );
        assert_eq!(parse_target("write_config"), AnchorTarget::from("write_config"));
    }

    #[test]
    fn anchor_with_both_keys_rejected() {
        let spec = AnchorSpec {
            before: Some("install_files".to_string()),
            after: Some("install_validate".to_string()),
        };
        assert!(spec.resolve("x").is_err());
    }

    #[test]
    fn unknown_manifest_key_rejected() {
        let err = serde_yaml::from_str::<Manifest>("actions: []\nbogus: 1\n").unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn default_sequences_is_install_only() {
        let manifest: Manifest = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(manifest.sequences(), vec![SequenceKind::Install]);
    }
}
