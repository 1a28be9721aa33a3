use anyhow::Context;
use std::path::Path;

use crate::manifest::Manifest;
use crate::output::{print_json, Listing};
use rollout_core::executor::Executor;
use rollout_core::record::SessionOutcome;
use rollout_core::sequencer::{build_plan, Plan};
use rollout_core::session::{LifecycleFlags, SessionState};

pub fn run(
    manifest_path: &Path,
    flags: LifecycleFlags,
    overrides: &[(String, String)],
    json: bool,
) -> anyhow::Result<()> {
    let manifest = Manifest::load(manifest_path)?;
    let registry = manifest.registry()?;

    let plans: Vec<Plan> = manifest
        .sequences()
        .into_iter()
        .map(|kind| build_plan(&registry, kind))
        .collect::<rollout_core::Result<_>>()
        .context("failed to build plans")?;

    let mut properties = manifest.initial_properties();
    for (name, value) in overrides {
        properties.set(name, value.clone());
    }
    let mut session = SessionState::with_properties(flags, properties);

    let report = Executor::new(&registry).run(&plans, &mut session);

    if json {
        print_json(&report)?;
    } else {
        let mut listing = Listing::new(&["ACTION", "CONTEXT", "DISPOSITION"]);
        for e in report.record.entries() {
            listing.row([
                e.action.to_string(),
                e.context.to_string(),
                e.disposition.to_string(),
            ]);
        }
        listing.footnote(format!("outcome: {}", report.outcome));
        listing.print();
    }

    if report.outcome == SessionOutcome::RolledBack {
        anyhow::bail!("session rolled back");
    }
    Ok(())
}
