use std::path::Path;

use crate::manifest::Manifest;
use crate::output::{print_json, Listing};
use rollout_core::sequencer::{build_plan, PlanEntry};
use rollout_core::SequenceKind;

pub fn run(manifest_path: &Path, sequence: SequenceKind, json: bool) -> anyhow::Result<()> {
    let manifest = Manifest::load(manifest_path)?;
    let registry = manifest.registry()?;
    let plan = build_plan(&registry, sequence)?;

    if json {
        #[derive(serde::Serialize)]
        struct PlanRow {
            kind: &'static str,
            name: String,
            context: Option<&'static str>,
        }

        #[derive(serde::Serialize)]
        struct PlanOutput<'a> {
            sequence: &'static str,
            entries: Vec<PlanRow>,
            warnings: &'a [String],
        }

        let entries: Vec<PlanRow> = plan
            .entries()
            .iter()
            .map(|entry| match entry {
                PlanEntry::Checkpoint(cp) => PlanRow {
                    kind: "checkpoint",
                    name: cp.to_string(),
                    context: None,
                },
                PlanEntry::Action(id) => PlanRow {
                    kind: "action",
                    name: id.to_string(),
                    context: registry.get(id).map(|d| d.context.as_str()),
                },
            })
            .collect();
        return print_json(&PlanOutput {
            sequence: sequence.as_str(),
            entries,
            warnings: plan.warnings(),
        });
    }

    let mut listing = Listing::new(&["KIND", "NAME", "CONTEXT"]);
    for entry in plan.entries() {
        match entry {
            PlanEntry::Checkpoint(cp) => listing.row(["checkpoint".to_string(), cp.to_string()]),
            PlanEntry::Action(id) => {
                let context = registry
                    .get(id)
                    .map(|d| d.context.as_str().to_string())
                    .unwrap_or_default();
                listing.row(["action".to_string(), id.to_string(), context]);
            }
        }
    }
    for warning in plan.warnings() {
        listing.footnote(format!("warning: {warning}"));
    }
    listing.print();
    Ok(())
}
