use std::io;

use thiserror::Error;

use crate::skill_tree::ItemId;

pub type Result<T> = std::result::Result<T, PlannerError>;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("Unknown skill '{skill_id}'")]
    UnknownSkill { skill_id: String },
    #[error("Circular prerequisite chain detected: {}", chain.join(" -> "))]
    CyclicDependency { chain: Vec<String> },
    #[error("Level {level} of skill '{skill_id}' is not in the plan")]
    NotPlanned { skill_id: String, level: i64 },
    #[error("Invalid training data: {reason}")]
    DataError { reason: String },
    #[error("Cannot optimize attributes for an empty plan")]
    EmptyPlan,
    #[error("Skill level must be between 1 and 5, got {level}")]
    InvalidLevel { level: i64 },
    #[error("Skill plan {plan} not found")]
    PlanNotFound { plan: ItemId },
    #[error("Skill item {id} not found")]
    UnknownItem { id: ItemId },
    #[error("Could not parse skill catalog line {line}: {source}")]
    CatalogParse {
        line: usize,
        source: serde_json::Error,
    },
    #[error("Could not read skill catalog: {source}")]
    CatalogIo { source: io::Error },
    #[error("Could not load configuration: {reason}")]
    Configuration { reason: String },
}

impl PlannerError {
    pub(crate) fn data(reason: impl Into<String>) -> Self {
        PlannerError::DataError {
            reason: reason.into(),
        }
    }
}
