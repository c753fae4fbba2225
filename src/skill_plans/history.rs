use strum_macros::Display;

use crate::skill_tree::{DetachedSubtree, ItemId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum OperationKind {
    AddSkill,
    RemoveSkill,
    CreatePlan,
    DeletePlan,
    RenamePlan,
}

/// A mutation together with the data needed to reverse it.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanOperation {
    AddSkill {
        plan: ItemId,
        inserted: Vec<ItemId>,
    },
    RemoveSkill {
        plan: ItemId,
        removed: DetachedSubtree,
    },
    CreatePlan {
        plan: ItemId,
    },
    DeletePlan {
        removed: DetachedSubtree,
    },
    RenamePlan {
        plan: ItemId,
        previous_name: String,
    },
}

impl PlanOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            PlanOperation::AddSkill { .. } => OperationKind::AddSkill,
            PlanOperation::RemoveSkill { .. } => OperationKind::RemoveSkill,
            PlanOperation::CreatePlan { .. } => OperationKind::CreatePlan,
            PlanOperation::DeletePlan { .. } => OperationKind::DeletePlan,
            PlanOperation::RenamePlan { .. } => OperationKind::RenamePlan,
        }
    }
}

/// Unbounded undo log, most recent last.
#[derive(Debug, Clone, Default)]
pub struct PlanHistory {
    records: Vec<PlanOperation>,
}

impl PlanHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, operation: PlanOperation) {
        self.records.push(operation);
    }

    pub fn pop(&mut self) -> Option<PlanOperation> {
        self.records.pop()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
