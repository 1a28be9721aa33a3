use serde::{Deserialize, Serialize};

use crate::session::{LifecycleFlag, LifecycleFlags, PropertyLookup};

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

/// A boolean predicate over session state, evaluated before an action's
/// body is invoked. Pure and total: evaluation never fails and has no side
/// effects. Composite forms short-circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    Always,
    Never,
    Flag { flag: LifecycleFlag },
    PropertySet { name: String },
    PropertyEquals { name: String, value: String },
    Not { inner: Box<Condition> },
    AllOf { conditions: Vec<Condition> },
    AnyOf { conditions: Vec<Condition> },
}

impl Condition {
    pub fn flag(flag: LifecycleFlag) -> Self {
        Condition::Flag { flag }
    }

    pub fn property_set(name: impl Into<String>) -> Self {
        Condition::PropertySet { name: name.into() }
    }

    pub fn property_equals(name: impl Into<String>, value: impl Into<String>) -> Self {
        Condition::PropertyEquals {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Conjunction, flattening nested `AllOf`s.
    pub fn and(self, other: Condition) -> Self {
        match (self, other) {
            (Condition::AllOf { mut conditions }, Condition::AllOf { conditions: more }) => {
                conditions.extend(more);
                Condition::AllOf { conditions }
            }
            (Condition::AllOf { mut conditions }, other) => {
                conditions.push(other);
                Condition::AllOf { conditions }
            }
            (a, b) => Condition::AllOf {
                conditions: vec![a, b],
            },
        }
    }

    /// Disjunction, flattening nested `AnyOf`s.
    pub fn or(self, other: Condition) -> Self {
        match (self, other) {
            (Condition::AnyOf { mut conditions }, Condition::AnyOf { conditions: more }) => {
                conditions.extend(more);
                Condition::AnyOf { conditions }
            }
            (Condition::AnyOf { mut conditions }, other) => {
                conditions.push(other);
                Condition::AnyOf { conditions }
            }
            (a, b) => Condition::AnyOf {
                conditions: vec![a, b],
            },
        }
    }

    pub fn negate(self) -> Self {
        Condition::Not {
            inner: Box::new(self),
        }
    }

    /// Evaluate against the session's lifecycle flags and a property view.
    pub fn evaluate(&self, flags: &LifecycleFlags, props: &dyn PropertyLookup) -> bool {
        match self {
            Condition::Always => true,
            Condition::Never => false,
            Condition::Flag { flag } => flags.is_set(*flag),
            Condition::PropertySet { name } => props.is_set(name),
            Condition::PropertyEquals { name, value } => props.value(name) == value,
            Condition::Not { inner } => !inner.evaluate(flags, props),
            Condition::AllOf { conditions } => {
                conditions.iter().all(|c| c.evaluate(flags, props))
            }
            Condition::AnyOf { conditions } => {
                conditions.iter().any(|c| c.evaluate(flags, props))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
