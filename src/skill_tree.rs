use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{PlannerError, Result};
use crate::sde::SkillDefinition;
use crate::skill_plans::SkillPlan;
use crate::utils;

/// Index of a node in a [`SkillTree`]. Ids are never reused within a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(usize);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillPoints {
    FullyTrained,
    Trained(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillLevel {
    skill: Arc<SkillDefinition>,
    level: i64,
    points: SkillPoints,
    points_needed: i64,
}

impl SkillLevel {
    pub fn new(skill: Arc<SkillDefinition>, level: i64, points: SkillPoints) -> Result<Self> {
        if !utils::is_valid_level(level) {
            return Err(PlannerError::InvalidLevel { level });
        }
        let points_needed = utils::calculate_sp_for_single_level(skill.rank, level);
        let points = match points {
            SkillPoints::Trained(p) if p >= points_needed => SkillPoints::FullyTrained,
            SkillPoints::Trained(p) => SkillPoints::Trained(p.max(0)),
            SkillPoints::FullyTrained => SkillPoints::FullyTrained,
        };
        Ok(Self {
            skill,
            level,
            points,
            points_needed,
        })
    }

    pub fn untrained(skill: Arc<SkillDefinition>, level: i64) -> Result<Self> {
        Self::new(skill, level, SkillPoints::Trained(0))
    }

    pub fn skill(&self) -> &Arc<SkillDefinition> {
        &self.skill
    }

    pub fn skill_id(&self) -> &str {
        &self.skill.id
    }

    pub fn level(&self) -> i64 {
        self.level
    }

    pub fn points(&self) -> SkillPoints {
        self.points
    }

    pub fn skill_points_needed(&self) -> i64 {
        self.points_needed
    }

    pub fn skill_points_trained(&self) -> i64 {
        match self.points {
            SkillPoints::FullyTrained => self.points_needed,
            SkillPoints::Trained(p) => p,
        }
    }

    pub fn remaining_points(&self) -> i64 {
        match self.points {
            SkillPoints::FullyTrained => 0,
            SkillPoints::Trained(p) => (self.points_needed - p).max(0),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.remaining_points() == 0
    }

    pub(crate) fn set_trained(&mut self, points: i64) {
        self.points = if points >= self.points_needed {
            SkillPoints::FullyTrained
        } else {
            SkillPoints::Trained(points.max(0))
        };
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillGroup {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkillItem {
    Group(SkillGroup),
    Level(SkillLevel),
    Plan(SkillPlan),
    PlanList,
}

impl SkillItem {
    pub fn group(name: impl Into<String>) -> Self {
        SkillItem::Group(SkillGroup { name: name.into() })
    }

    pub fn as_level(&self) -> Option<&SkillLevel> {
        match self {
            SkillItem::Level(level) => Some(level),
            _ => None,
        }
    }

    pub fn as_plan(&self) -> Option<&SkillPlan> {
        match self {
            SkillItem::Plan(plan) => Some(plan),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            SkillItem::Group(group) => Some(&group.name),
            SkillItem::Level(level) => Some(&level.skill.name),
            SkillItem::Plan(plan) => Some(plan.name()),
            SkillItem::PlanList => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct SkillNode {
    parent: Option<ItemId>,
    children: Vec<ItemId>,
    item: SkillItem,
}

/// A node and its descendants after removal from the arena, with enough
/// position data to put them back exactly where they were.
#[derive(Debug, Clone, PartialEq)]
pub struct DetachedSubtree {
    root: ItemId,
    parent: Option<ItemId>,
    index: usize,
    nodes: Vec<(ItemId, SkillNode)>,
}

impl DetachedSubtree {
    pub fn root(&self) -> ItemId {
        self.root
    }
}

/// Arena owning every node. Children are owned top-down through the
/// arena; parents are plain ids used for path queries.
#[derive(Debug, Clone)]
pub struct SkillTree {
    /// Indexed by `ItemId`. Detached slots stay `None` and ids are never
    /// reused, so the arena only grows.
    nodes: Vec<Option<SkillNode>>,
    root: ItemId,
}

impl SkillTree {
    pub fn new(root: SkillItem) -> Self {
        Self {
            nodes: vec![Some(SkillNode {
                parent: None,
                children: Vec::new(),
                item: root,
            })],
            root: ItemId(0),
        }
    }

    pub fn root(&self) -> ItemId {
        self.root
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.node(id).is_some()
    }

    pub fn get(&self, id: ItemId) -> Option<&SkillItem> {
        self.node(id).map(|node| &node.item)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut SkillItem> {
        self.node_mut(id).map(|node| &mut node.item)
    }

    pub fn parent(&self, id: ItemId) -> Option<ItemId> {
        self.node(id).and_then(|node| node.parent)
    }

    pub fn children(&self, id: ItemId) -> &[ItemId] {
        self.node(id).map(|node| node.children.as_slice()).unwrap_or(&[])
    }

    pub fn child_items(&self, id: ItemId) -> Vec<&SkillItem> {
        self.children(id)
            .iter()
            .filter_map(|child| self.get(*child))
            .collect()
    }

    /// Ids from the root down to `id`, inclusive.
    pub fn path(&self, id: ItemId) -> Vec<ItemId> {
        let mut path = Vec::new();
        let mut current = self.contains(id).then_some(id);
        while let Some(node_id) = current {
            path.push(node_id);
            current = self.parent(node_id);
        }
        path.reverse();
        path
    }

    /// Preorder walk below `id`, excluding `id` itself.
    pub fn descendants(&self, id: ItemId) -> Vec<ItemId> {
        let mut result = Vec::new();
        let mut stack: Vec<ItemId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            result.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        result
    }

    pub fn append(&mut self, parent: ItemId, item: SkillItem) -> Result<ItemId> {
        let index = self.children(parent).len();
        self.insert(parent, index, item)
    }

    pub fn insert(&mut self, parent: ItemId, index: usize, item: SkillItem) -> Result<ItemId> {
        if !self.contains(parent) {
            return Err(PlannerError::UnknownItem { id: parent });
        }
        let id = ItemId(self.nodes.len());
        self.nodes.push(Some(SkillNode {
            parent: Some(parent),
            children: Vec::new(),
            item,
        }));
        if let Some(node) = self.node_mut(parent) {
            let index = index.min(node.children.len());
            node.children.insert(index, id);
        }
        Ok(id)
    }

    /// Removes `id` and everything below it. The root cannot be detached.
    pub fn detach(&mut self, id: ItemId) -> Result<DetachedSubtree> {
        let parent = match self.node(id) {
            Some(node) => node.parent,
            None => return Err(PlannerError::UnknownItem { id }),
        };
        let Some(parent) = parent else {
            return Err(PlannerError::UnknownItem { id });
        };

        let mut index = 0;
        if let Some(parent_node) = self.node_mut(parent) {
            if let Some(position) = parent_node.children.iter().position(|c| *c == id) {
                parent_node.children.remove(position);
                index = position;
            }
        }

        let mut ids = vec![id];
        ids.extend(self.descendants(id));
        let nodes = ids
            .into_iter()
            .filter_map(|node_id| {
                self.nodes
                    .get_mut(node_id.0)
                    .and_then(Option::take)
                    .map(|node| (node_id, node))
            })
            .collect();

        Ok(DetachedSubtree {
            root: id,
            parent: Some(parent),
            index,
            nodes,
        })
    }

    /// Puts a detached subtree back under its old parent at its old position.
    pub fn restore(&mut self, subtree: DetachedSubtree) -> Result<ItemId> {
        let parent = subtree
            .parent
            .filter(|p| self.contains(*p))
            .ok_or(PlannerError::UnknownItem { id: subtree.root })?;
        for (node_id, node) in subtree.nodes {
            if let Some(slot) = self.nodes.get_mut(node_id.0) {
                *slot = Some(node);
            }
        }
        if let Some(parent_node) = self.node_mut(parent) {
            let index = subtree.index.min(parent_node.children.len());
            parent_node.children.insert(index, subtree.root);
        }
        Ok(subtree.root)
    }

    fn node(&self, id: ItemId) -> Option<&SkillNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: ItemId) -> Option<&mut SkillNode> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    fn subtree_eq(&self, id: ItemId, other: &SkillTree, other_id: ItemId) -> bool {
        if self.get(id) != other.get(other_id) {
            return false;
        }
        let mine = self.children(id);
        let theirs = other.children(other_id);
        mine.len() == theirs.len()
            && mine
                .iter()
                .zip(theirs)
                .all(|(a, b)| self.subtree_eq(*a, other, *b))
    }
}

/// Structural equality: same items in the same shape, regardless of ids.
impl PartialEq for SkillTree {
    fn eq(&self, other: &Self) -> bool {
        self.subtree_eq(self.root, other, other.root)
    }
}
