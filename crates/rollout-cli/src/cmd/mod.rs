pub mod checkpoints;
pub mod plan;
pub mod run;
