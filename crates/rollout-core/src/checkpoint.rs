use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Checkpoint
// ---------------------------------------------------------------------------

/// A fixed ordering landmark inside an installation sequence.
///
/// Checkpoints are the wire contract between the engine and the host that
/// embeds it: host sequence definitions anchor actions against these names.
/// The set is closed and the relative order below is never changed at run
/// time; only registered actions are inserted between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkpoint {
    AppSearch,
    CostInitialize,
    CostFinalize,
    InstallValidate,
    InstallInitialize,
    StopServices,
    RemoveRegistryValues,
    RemoveFiles,
    CreateFolders,
    InstallFiles,
    InstallServices,
    StartServices,
    InstallFinalize,
}

impl Checkpoint {
    pub fn all() -> &'static [Checkpoint] {
        &[
            Checkpoint::AppSearch,
            Checkpoint::CostInitialize,
            Checkpoint::CostFinalize,
            Checkpoint::InstallValidate,
            Checkpoint::InstallInitialize,
            Checkpoint::StopServices,
            Checkpoint::RemoveRegistryValues,
            Checkpoint::RemoveFiles,
            Checkpoint::CreateFolders,
            Checkpoint::InstallFiles,
            Checkpoint::InstallServices,
            Checkpoint::StartServices,
            Checkpoint::InstallFinalize,
        ]
    }

    /// Skeleton for the install (execute) sequence: every checkpoint.
    pub fn install_skeleton() -> &'static [Checkpoint] {
        Self::all()
    }

    /// Skeleton for the UI sequence: the acquisition-phase checkpoints only.
    /// The UI sequence never makes changes to the host, so everything from
    /// the make-changes boundary onward is absent.
    pub fn ui_skeleton() -> &'static [Checkpoint] {
        &[
            Checkpoint::AppSearch,
            Checkpoint::CostInitialize,
            Checkpoint::CostFinalize,
            Checkpoint::InstallValidate,
        ]
    }

    /// The boundary between the acquisition phase and the make-changes
    /// phase. Input snapshots for deferred and rollback actions are frozen
    /// when forward execution reaches this checkpoint.
    pub fn make_changes_boundary() -> Checkpoint {
        Checkpoint::InstallInitialize
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Checkpoint::AppSearch => "app_search",
            Checkpoint::CostInitialize => "cost_initialize",
            Checkpoint::CostFinalize => "cost_finalize",
            Checkpoint::InstallValidate => "install_validate",
            Checkpoint::InstallInitialize => "install_initialize",
            Checkpoint::StopServices => "stop_services",
            Checkpoint::RemoveRegistryValues => "remove_registry_values",
            Checkpoint::RemoveFiles => "remove_files",
            Checkpoint::CreateFolders => "create_folders",
            Checkpoint::InstallFiles => "install_files",
            Checkpoint::InstallServices => "install_services",
            Checkpoint::StartServices => "start_services",
            Checkpoint::InstallFinalize => "install_finalize",
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Checkpoint {
    type Err = crate::error::RolloutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Checkpoint::all()
            .iter()
            .find(|c| c.as_str() == s)
            .copied()
            .ok_or_else(|| crate::error::RolloutError::UnknownCheckpoint(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
