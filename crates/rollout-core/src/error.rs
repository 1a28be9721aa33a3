use thiserror::Error;

#[derive(Debug, Error)]
pub enum RolloutError {
    #[error("action id must not be empty")]
    EmptyActionId,

    #[error("duplicate action id: {0}")]
    DuplicateAction(String),

    #[error("action '{action}' has no anchor")]
    MissingAnchor { action: String },

    #[error("action '{action}' anchors to unknown target '{target}' in the {sequence} sequence")]
    UnresolvedAnchor {
        action: String,
        target: String,
        sequence: String,
    },

    #[error("anchor cycle among actions: {0}")]
    AnchorCycle(String),

    #[error("rollback action '{action}' must declare the forward action it compensates")]
    MissingCompensationTarget { action: String },

    #[error("action '{action}' declares a compensation target but is not a rollback action")]
    CompensationOnForwardAction { action: String },

    #[error("rollback action '{action}' compensates unknown action '{target}'")]
    UnknownCompensationTarget { action: String, target: String },

    #[error("rollback action '{action}' compensates '{target}', which is itself a rollback action")]
    InvalidCompensationTarget { action: String, target: String },

    #[error("forward action '{target}' is compensated by both '{first}' and '{second}'")]
    DuplicateCompensation {
        target: String,
        first: String,
        second: String,
    },

    #[error("{context} action '{action}' is sequenced outside the make-changes phase")]
    OutsideMakeChangesPhase { action: String, context: String },

    #[error("invalid checkpoint: {0}")]
    UnknownCheckpoint(String),

    #[error("invalid sequence: {0}")]
    UnknownSequence(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, RolloutError>;
