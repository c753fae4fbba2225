pub mod character;
pub mod config;
pub mod errors;
pub mod sde;
pub mod skill_plans;
pub mod skill_tree;
pub mod utils;

#[cfg(test)]
mod testdata;

pub use character::{Character, CharacterData, KnownSkillData};
pub use config::{OptimizerConfig, OptimizerStart, PlannerConfig};
pub use errors::{PlannerError, Result};
pub use sde::{Attribute, Prerequisite, SkillCatalog, SkillDefinition};
pub use skill_plans::graph::{PlanDag, PlanNode, ValidationEntry, ValidationResult};
pub use skill_plans::history::{OperationKind, PlanHistory, PlanOperation};
pub use skill_plans::optimization::{AttributeOptimizer, OptimizationResult};
pub use skill_plans::simulation::{ScheduleSegment, TrainingSchedule};
pub use skill_plans::{
    Attributes, PlanEvent, PlanId, PlanRef, SkillPlan, SkillPlanList, SubscriptionId,
};
pub use skill_tree::{DetachedSubtree, ItemId, SkillItem, SkillLevel, SkillPoints, SkillTree};
