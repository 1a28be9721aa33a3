use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// PrimaryIntent / LifecycleFlag / LifecycleFlags
// ---------------------------------------------------------------------------

/// The one thing a session is fundamentally doing. Exactly one intent
/// characterizes a run; encoding it as an enum makes the "exactly one of
/// four" invariant structural instead of a runtime check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryIntent {
    FirstInstall,
    Upgrading,
    Maintenance,
    Uninstalling,
}

impl PrimaryIntent {
    pub fn as_str(self) -> &'static str {
        match self {
            PrimaryIntent::FirstInstall => "first_install",
            PrimaryIntent::Upgrading => "upgrading",
            PrimaryIntent::Maintenance => "maintenance",
            PrimaryIntent::Uninstalling => "uninstalling",
        }
    }
}

impl fmt::Display for PrimaryIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single lifecycle flag as referenced by conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleFlag {
    FirstInstall,
    Upgrading,
    Maintenance,
    Uninstalling,
    RemovingForUpgrade,
    BeingReinstalled,
}

/// Lifecycle flags for one session: a primary intent plus two orthogonal
/// modifiers. Immutable for the lifetime of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleFlags {
    pub intent: PrimaryIntent,
    #[serde(default)]
    pub removing_for_upgrade: bool,
    #[serde(default)]
    pub being_reinstalled: bool,
}

impl LifecycleFlags {
    pub fn new(intent: PrimaryIntent) -> Self {
        Self {
            intent,
            removing_for_upgrade: false,
            being_reinstalled: false,
        }
    }

    pub fn with_removing_for_upgrade(mut self) -> Self {
        self.removing_for_upgrade = true;
        self
    }

    pub fn with_being_reinstalled(mut self) -> Self {
        self.being_reinstalled = true;
        self
    }

    pub fn is_set(&self, flag: LifecycleFlag) -> bool {
        match flag {
            LifecycleFlag::FirstInstall => self.intent == PrimaryIntent::FirstInstall,
            LifecycleFlag::Upgrading => self.intent == PrimaryIntent::Upgrading,
            LifecycleFlag::Maintenance => self.intent == PrimaryIntent::Maintenance,
            LifecycleFlag::Uninstalling => self.intent == PrimaryIntent::Uninstalling,
            LifecycleFlag::RemovingForUpgrade => self.removing_for_upgrade,
            LifecycleFlag::BeingReinstalled => self.being_reinstalled,
        }
    }
}

// ---------------------------------------------------------------------------
// PropertyLookup
// ---------------------------------------------------------------------------

/// Read access to a property namespace. An unset property reads as the
/// empty string, never an error.
pub trait PropertyLookup {
    fn value(&self, name: &str) -> &str;

    fn is_set(&self, name: &str) -> bool {
        !self.value(name).is_empty()
    }
}

// ---------------------------------------------------------------------------
// PropertyBag
// ---------------------------------------------------------------------------

/// The live, mutable property bag for one session. Keys are
/// case-insensitive; values may be empty. Single-writer within a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyBag {
    values: HashMap<String, String>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> &str {
        self.values
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Capture `names` (in declared order) into an immutable snapshot.
    pub fn snapshot(&self, names: &[String]) -> PropertySnapshot {
        PropertySnapshot {
            values: names
                .iter()
                .map(|n| (n.clone(), self.get(n).to_string()))
                .collect(),
        }
    }
}

impl PropertyLookup for PropertyBag {
    fn value(&self, name: &str) -> &str {
        self.get(name)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertyBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bag = PropertyBag::new();
        for (k, v) in iter {
            bag.set(&k.into(), v);
        }
        bag
    }
}

// ---------------------------------------------------------------------------
// PropertySnapshot
// ---------------------------------------------------------------------------

/// An immutable capture of an action's declared input properties, frozen
/// at the make-changes boundary. The only view deferred and rollback
/// bodies ever get: a property the action did not declare is not present,
/// and late mutation of the live bag is invisible here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySnapshot {
    values: Vec<(String, String)>,
}

impl PropertySnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> &str {
        self.values
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl PropertyLookup for PropertySnapshot {
    fn value(&self, name: &str) -> &str {
        self.get(name)
    }
}

// ---------------------------------------------------------------------------
// PropertyAccess
// ---------------------------------------------------------------------------

/// The property view handed to an action body. Immediate actions get live
/// read/write access; deferred and rollback actions only ever see their
/// frozen snapshot.
#[derive(Debug)]
pub enum PropertyAccess<'a> {
    Live(&'a mut PropertyBag),
    Snapshot(&'a PropertySnapshot),
}

impl PropertyAccess<'_> {
    pub fn get(&self, name: &str) -> &str {
        match self {
            PropertyAccess::Live(bag) => bag.get(name),
            PropertyAccess::Snapshot(snap) => snap.get(name),
        }
    }

    /// Write a property. Writes through a snapshot view are discarded:
    /// deferred and rollback bodies have no mutation access to the session.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        match self {
            PropertyAccess::Live(bag) => bag.set(name, value),
            PropertyAccess::Snapshot(_) => {
                tracing::debug!(property = name, "write through snapshot view discarded");
            }
        }
    }
}

impl PropertyLookup for PropertyAccess<'_> {
    fn value(&self, name: &str) -> &str {
        self.get(name)
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Mutable state for one installation session: the immutable lifecycle
/// flags plus the live property bag. Created per run, destroyed at run end.
#[derive(Debug, Clone)]
pub struct SessionState {
    flags: LifecycleFlags,
    pub properties: PropertyBag,
}

impl SessionState {
    pub fn new(flags: LifecycleFlags) -> Self {
        Self {
            flags,
            properties: PropertyBag::new(),
        }
    }

    pub fn with_properties(flags: LifecycleFlags, properties: PropertyBag) -> Self {
        Self { flags, properties }
    }

    pub fn flags(&self) -> &LifecycleFlags {
        &self.flags
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_primary_intent_is_exclusive() {
        let flags = LifecycleFlags::new(PrimaryIntent::Upgrading);
        assert!(flags.is_set(LifecycleFlag::Upgrading));
        assert!(!flags.is_set(LifecycleFlag::FirstInstall));
        assert!(!flags.is_set(LifecycleFlag::Maintenance));
        assert!(!flags.is_set(LifecycleFlag::Uninstalling));
    }

    #[test]
    fn flags_modifiers_are_orthogonal() {
        let flags = LifecycleFlags::new(PrimaryIntent::Uninstalling).with_removing_for_upgrade();
        assert!(flags.is_set(LifecycleFlag::Uninstalling));
        assert!(flags.is_set(LifecycleFlag::RemovingForUpgrade));
        assert!(!flags.is_set(LifecycleFlag::BeingReinstalled));
    }

    #[test]
    fn bag_keys_are_case_insensitive() {
        let mut bag = PropertyBag::new();
        bag.set("ApiKey", "abc123");
        assert_eq!(bag.get("APIKEY"), "abc123");
        assert_eq!(bag.get("apikey"), "abc123");
    }

    #[test]
    fn unset_property_reads_empty() {
        let bag = PropertyBag::new();
        assert_eq!(bag.get("missing"), "");
        assert!(!bag.is_set("missing"));
    }

    #[test]
    fn snapshot_captures_declared_names_only() {
        let bag: PropertyBag = [("install_dir", "/opt/app"), ("api_key", "k")]
            .into_iter()
            .collect();
        let snap = bag.snapshot(&["install_dir".to_string()]);
        assert_eq!(snap.get("install_dir"), "/opt/app");
        assert_eq!(snap.get("api_key"), "");
    }

    #[test]
    fn snapshot_is_isolated_from_later_writes() {
        let mut bag = PropertyBag::new();
        bag.set("install_dir", "/opt/app");
        let snap = bag.snapshot(&["install_dir".to_string()]);
        bag.set("install_dir", "/tmp/elsewhere");
        assert_eq!(snap.get("install_dir"), "/opt/app");
        assert_eq!(bag.get("install_dir"), "/tmp/elsewhere");
    }

    #[test]
    fn snapshot_access_discards_writes() {
        let snap = PropertySnapshot::empty();
        let mut access = PropertyAccess::Snapshot(&snap);
        access.set("anything", "value");
        assert_eq!(access.get("anything"), "");
    }

    #[test]
    fn live_access_writes_through() {
        let mut bag = PropertyBag::new();
        let mut access = PropertyAccess::Live(&mut bag);
        access.set("port", "8125");
        assert_eq!(access.get("port"), "8125");
        assert_eq!(bag.get("PORT"), "8125");
    }
}
