use crate::output::{print_json, Listing};
use rollout_core::checkpoint::Checkpoint;
use rollout_core::SequenceKind;

pub fn run(sequence: SequenceKind, json: bool) -> anyhow::Result<()> {
    let skeleton = sequence.skeleton();

    if json {
        #[derive(serde::Serialize)]
        struct CheckpointRow {
            index: usize,
            checkpoint: &'static str,
            make_changes_boundary: bool,
        }

        let rows: Vec<CheckpointRow> = skeleton
            .iter()
            .map(|cp| CheckpointRow {
                index: cp.index(),
                checkpoint: cp.as_str(),
                make_changes_boundary: *cp == Checkpoint::make_changes_boundary(),
            })
            .collect();
        return print_json(&rows);
    }

    let mut listing = Listing::new(&["#", "CHECKPOINT", ""]);
    for cp in skeleton {
        if *cp == Checkpoint::make_changes_boundary() {
            listing.row([
                cp.index().to_string(),
                cp.to_string(),
                "make-changes boundary".to_string(),
            ]);
        } else {
            listing.row([cp.index().to_string(), cp.to_string()]);
        }
    }
    listing.print();
    Ok(())
}
