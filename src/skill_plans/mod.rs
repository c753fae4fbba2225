pub mod builder;
pub mod graph;
pub mod history;
pub mod optimization;
pub mod simulation;

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, info, warn};

use crate::errors::{PlannerError, Result};
use crate::sde::{SkillCatalog, SkillDefinition};
use crate::skill_tree::{ItemId, SkillItem, SkillLevel, SkillTree};
use crate::utils;

use builder::PlanResolver;
use graph::{PlanDag, ValidationResult};
use history::{PlanHistory, PlanOperation};

pub use simulation::Attributes;

pub type PlanId = ItemId;

/// Plan-level data. The ordered training queue itself lives in the
/// owning tree as the plan node's children.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillPlan {
    name: String,
    known_skills: BTreeMap<String, SkillLevel>,
    planned_skills: BTreeMap<String, i64>,
}

impl SkillPlan {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            known_skills: BTreeMap::new(),
            planned_skills: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Highest known level per skill id, complete or in progress.
    pub fn known_skills(&self) -> &BTreeMap<String, SkillLevel> {
        &self.known_skills
    }

    /// Highest planned level per skill id.
    pub fn planned_skills(&self) -> &BTreeMap<String, i64> {
        &self.planned_skills
    }

    /// Highest fully trained level of a skill, 0 when unknown.
    pub fn known_level(&self, skill_id: &str) -> i64 {
        match self.known_skills.get(skill_id) {
            Some(level) if level.is_complete() => level.level(),
            Some(level) => level.level() - 1,
            None => 0,
        }
    }

    /// Points already invested in `level` when it is the known level in progress.
    pub fn known_partial(&self, skill_id: &str, level: i64) -> Option<i64> {
        self.known_skills
            .get(skill_id)
            .filter(|known| !known.is_complete() && known.level() == level)
            .map(SkillLevel::skill_points_trained)
    }

    pub(crate) fn set_known<'a>(&mut self, levels: impl IntoIterator<Item = &'a SkillLevel>) {
        let mut known: BTreeMap<String, SkillLevel> = BTreeMap::new();
        for level in levels {
            let replace = match known.get(level.skill_id()) {
                Some(existing) => {
                    level.level() > existing.level()
                        || (level.level() == existing.level()
                            && level.skill_points_trained() > existing.skill_points_trained())
                }
                None => true,
            };
            if replace {
                known.insert(level.skill_id().to_string(), level.clone());
            }
        }
        self.known_skills = known;
    }
}

/// Borrowed view of one plan and its ordered entries.
#[derive(Debug, Clone, Copy)]
pub struct PlanRef<'a> {
    tree: &'a SkillTree,
    id: PlanId,
    plan: &'a SkillPlan,
}

impl<'a> PlanRef<'a> {
    pub fn id(&self) -> PlanId {
        self.id
    }

    pub fn name(&self) -> &'a str {
        self.plan.name()
    }

    pub fn plan(&self) -> &'a SkillPlan {
        self.plan
    }

    pub fn entry_ids(&self) -> &'a [ItemId] {
        self.tree.children(self.id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &'a SkillLevel> + 'a {
        let tree = self.tree;
        self.entry_ids()
            .iter()
            .filter_map(move |id| tree.get(*id).and_then(SkillItem::as_level))
    }

    pub fn children(&self) -> Vec<&'a SkillItem> {
        self.tree.child_items(self.id)
    }

    pub fn len(&self) -> usize {
        self.entry_ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry_ids().is_empty()
    }

    pub fn find_entry(&self, skill_id: &str, level: i64) -> Option<ItemId> {
        let tree = self.tree;
        self.entry_ids().iter().copied().find(|id| {
            tree.get(*id)
                .and_then(SkillItem::as_level)
                .is_some_and(|entry| entry.skill_id() == skill_id && entry.level() == level)
        })
    }

    pub fn position(&self, skill_id: &str, level: i64) -> Option<usize> {
        self.entries()
            .position(|entry| entry.skill_id() == skill_id && entry.level() == level)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanEvent {
    PlanCreated(PlanId),
    PlanDeleted(PlanId),
    PlanRenamed(PlanId),
    PlanChanged(PlanId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(usize);

type Observer = Box<dyn FnMut(&PlanEvent)>;

/// Owns every plan of a character, the undo log for them and the
/// observers notified after each mutation.
pub struct SkillPlanList {
    tree: SkillTree,
    history: PlanHistory,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: usize,
}

impl fmt::Debug for SkillPlanList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkillPlanList")
            .field("tree", &self.tree)
            .field("history", &self.history)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for SkillPlanList {
    fn default() -> Self {
        Self::new()
    }
}

impl SkillPlanList {
    pub fn new() -> Self {
        Self {
            tree: SkillTree::new(SkillItem::PlanList),
            history: PlanHistory::new(),
            observers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn tree(&self) -> &SkillTree {
        &self.tree
    }

    pub fn history(&self) -> &PlanHistory {
        &self.history
    }

    pub fn children(&self) -> Vec<&SkillItem> {
        self.tree.child_items(self.tree.root())
    }

    pub fn plans(&self) -> Vec<PlanRef<'_>> {
        self.tree
            .children(self.tree.root())
            .iter()
            .filter_map(|id| self.plan(*id).ok())
            .collect()
    }

    pub fn plan(&self, id: PlanId) -> Result<PlanRef<'_>> {
        self.tree
            .get(id)
            .and_then(SkillItem::as_plan)
            .map(|plan| PlanRef {
                tree: &self.tree,
                id,
                plan,
            })
            .ok_or(PlannerError::PlanNotFound { plan: id })
    }

    pub fn find_plan_by_name(&self, name: &str) -> Option<PlanRef<'_>> {
        self.plans().into_iter().find(|plan| plan.name() == name)
    }

    pub fn plan_names(&self) -> Vec<String> {
        self.plans()
            .iter()
            .map(|plan| plan.name().to_string())
            .collect()
    }

    pub fn create_plan(&mut self, name: &str) -> Result<PlanId> {
        let root = self.tree.root();
        let id = self
            .tree
            .append(root, SkillItem::Plan(SkillPlan::new(name)))?;
        debug!("Created skill plan '{}' ({})", name, id);
        self.history.push(PlanOperation::CreatePlan { plan: id });
        self.notify(PlanEvent::PlanCreated(id));
        Ok(id)
    }

    pub fn delete_plan(&mut self, plan: PlanId) -> Result<()> {
        self.plan(plan)?;
        let removed = self.tree.detach(plan)?;
        debug!("Deleted skill plan {}", plan);
        self.history.push(PlanOperation::DeletePlan { removed });
        self.notify(PlanEvent::PlanDeleted(plan));
        Ok(())
    }

    pub fn rename_plan(&mut self, plan: PlanId, name: &str) -> Result<()> {
        let target = self.plan_mut(plan)?;
        let previous_name = std::mem::replace(&mut target.name, name.to_string());
        debug!("Renamed skill plan {} from '{}' to '{}'", plan, previous_name, name);
        self.history.push(PlanOperation::RenamePlan {
            plan,
            previous_name,
        });
        self.notify(PlanEvent::PlanRenamed(plan));
        Ok(())
    }

    /// Plans `skill` up to `level`, pulling in missing prerequisites first.
    /// Returns `false` when the level is already known or planned.
    pub fn add_skill(
        &mut self,
        catalog: &SkillCatalog,
        plan: PlanId,
        skill: &SkillDefinition,
        level: i64,
    ) -> Result<bool> {
        let definition = catalog.lookup(&skill.id)?;
        let insertions = {
            let target = self.plan(plan)?;
            PlanResolver::new(catalog, target.plan()).resolve(&definition, level)?
        };
        if insertions.is_empty() {
            return Ok(false);
        }

        let anchors = self.insertion_anchors(plan, &insertions);
        let mut inserted = Vec::with_capacity(insertions.len());
        for (entry, anchor) in insertions.into_iter().zip(anchors) {
            debug!("Planning {} {} in {}", entry.skill_id(), entry.level(), plan);
            let position = anchor.and_then(|anchor| {
                self.tree
                    .children(plan)
                    .iter()
                    .position(|id| *id == anchor)
            });
            let id = match position {
                Some(index) => self.tree.insert(plan, index, SkillItem::Level(entry))?,
                None => self.tree.append(plan, SkillItem::Level(entry))?,
            };
            inserted.push(id);
        }
        self.refresh_planned(plan);
        self.history.push(PlanOperation::AddSkill { plan, inserted });
        self.notify(PlanEvent::PlanChanged(plan));
        Ok(true)
    }

    /// Plans one level above what is currently known or planned.
    pub fn add_next_level(
        &mut self,
        catalog: &SkillCatalog,
        plan: PlanId,
        skill: &SkillDefinition,
    ) -> Result<bool> {
        let next = {
            let target = self.plan(plan)?.plan();
            let planned = target.planned_skills().get(&skill.id).copied().unwrap_or(0);
            target.known_level(&skill.id).max(planned) + 1
        };
        if next > utils::MAX_SKILL_LEVEL {
            return Ok(false);
        }
        self.add_skill(catalog, plan, skill, next)
    }

    /// Removes exactly one planned level. Entries depending on it stay in
    /// place; use [`SkillPlanList::validate`] to find them.
    pub fn remove_skill(&mut self, plan: PlanId, skill_id: &str, level: i64) -> Result<()> {
        let entry = self
            .plan(plan)?
            .find_entry(skill_id, level)
            .ok_or_else(|| PlannerError::NotPlanned {
                skill_id: skill_id.to_string(),
                level,
            })?;
        let removed = self.tree.detach(entry)?;
        self.refresh_planned(plan);
        debug!("Removed {} {} from {}", skill_id, level, plan);
        self.history.push(PlanOperation::RemoveSkill { plan, removed });
        self.notify(PlanEvent::PlanChanged(plan));
        Ok(())
    }

    /// Replaces the plan's known skills with the levels found in `known`
    /// and drops planned entries that are now trained.
    pub fn set_known_skills(&mut self, plan: PlanId, known: &SkillTree) -> Result<()> {
        let levels: Vec<&SkillLevel> = std::iter::once(known.root())
            .chain(known.descendants(known.root()))
            .filter_map(|id| known.get(id).and_then(SkillItem::as_level))
            .collect();
        self.plan_mut(plan)?.set_known(levels);

        let mut stale = Vec::new();
        let mut progress = Vec::new();
        {
            let target = self.plan(plan)?;
            for id in target.entry_ids() {
                let Some(entry) = self.tree.get(*id).and_then(SkillItem::as_level) else {
                    continue;
                };
                if entry.level() <= target.plan().known_level(entry.skill_id()) {
                    stale.push(*id);
                } else if let Some(points) =
                    target.plan().known_partial(entry.skill_id(), entry.level())
                {
                    progress.push((*id, points));
                }
            }
        }

        for id in &stale {
            self.tree.detach(*id)?;
        }
        for (id, points) in progress {
            if let Some(SkillItem::Level(entry)) = self.tree.get_mut(id) {
                entry.set_trained(points);
            }
        }
        self.refresh_planned(plan);
        debug!(
            "Applied known skills to {}, dropped {} trained entries",
            plan,
            stale.len()
        );
        self.notify(PlanEvent::PlanChanged(plan));
        Ok(())
    }

    /// Checks the queue order against the catalog's prerequisites.
    pub fn validate(&self, catalog: &SkillCatalog, plan: PlanId) -> Result<ValidationResult> {
        let target = self.plan(plan)?;
        let (dag, order) = PlanDag::build_from_plan(catalog, &target)?;
        Ok(dag.validate(&order))
    }

    /// Reverts the most recent recorded mutation. Returns `false` when
    /// there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(operation) = self.history.pop() else {
            return false;
        };
        info!("Undoing {}", operation.kind());

        let event = match operation {
            PlanOperation::AddSkill { plan, inserted } => {
                for id in inserted.into_iter().rev() {
                    // Entries pruned by set_known_skills are already gone.
                    if self.tree.contains(id) {
                        if let Err(e) = self.tree.detach(id) {
                            warn!("Could not remove planned entry {}: {}", id, e);
                        }
                    }
                }
                self.refresh_planned(plan);
                PlanEvent::PlanChanged(plan)
            }
            PlanOperation::RemoveSkill { plan, removed } => {
                if let Err(e) = self.tree.restore(removed) {
                    warn!("Could not restore entry into {}: {}", plan, e);
                }
                self.refresh_planned(plan);
                PlanEvent::PlanChanged(plan)
            }
            PlanOperation::CreatePlan { plan } => {
                if let Err(e) = self.tree.detach(plan) {
                    warn!("Could not remove plan {}: {}", plan, e);
                }
                PlanEvent::PlanDeleted(plan)
            }
            PlanOperation::DeletePlan { removed } => {
                let plan = removed.root();
                if let Err(e) = self.tree.restore(removed) {
                    warn!("Could not restore plan {}: {}", plan, e);
                }
                PlanEvent::PlanCreated(plan)
            }
            PlanOperation::RenamePlan {
                plan,
                previous_name,
            } => {
                match self.plan_mut(plan) {
                    Ok(target) => target.name = previous_name,
                    Err(e) => warn!("Could not rename plan {}: {}", plan, e),
                }
                PlanEvent::PlanRenamed(plan)
            }
        };
        self.notify(event);
        true
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&PlanEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, subscription: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(id, _)| *id != subscription);
        self.observers.len() != before
    }

    fn notify(&mut self, event: PlanEvent) {
        for (_, observer) in self.observers.iter_mut() {
            observer(&event);
        }
    }

    /// For each new level, the first queued entry it has to precede: one
    /// that requires it directly, or through a later new level.
    fn insertion_anchors(&self, plan: PlanId, insertions: &[SkillLevel]) -> Vec<Option<ItemId>> {
        let entries = self.tree.children(plan);
        let mut first_dependent: Vec<Option<usize>> = vec![None; insertions.len()];
        for (i, needed) in insertions.iter().enumerate().rev() {
            let direct = entries.iter().position(|id| {
                self.tree
                    .get(*id)
                    .and_then(SkillItem::as_level)
                    .is_some_and(|queued| requires(queued, needed))
            });
            let through_new = insertions
                .iter()
                .enumerate()
                .skip(i + 1)
                .filter(|(_, later)| requires(later, needed))
                .filter_map(|(j, _)| first_dependent[j])
                .min();
            first_dependent[i] = match (direct, through_new) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        }
        first_dependent
            .into_iter()
            .map(|index| index.map(|index| entries[index]))
            .collect()
    }

    fn plan_mut(&mut self, id: PlanId) -> Result<&mut SkillPlan> {
        match self.tree.get_mut(id) {
            Some(SkillItem::Plan(plan)) => Ok(plan),
            _ => Err(PlannerError::PlanNotFound { plan: id }),
        }
    }

    fn refresh_planned(&mut self, plan: PlanId) {
        let planned = match self.plan(plan) {
            Ok(target) => {
                let mut planned: BTreeMap<String, i64> = BTreeMap::new();
                for entry in target.entries() {
                    let highest = planned.entry(entry.skill_id().to_string()).or_insert(0);
                    *highest = (*highest).max(entry.level());
                }
                planned
            }
            Err(_) => return,
        };
        if let Ok(target) = self.plan_mut(plan) {
            target.planned_skills = planned;
        }
    }
}

/// Whether `entry` can only be trained once `needed` is.
fn requires(entry: &SkillLevel, needed: &SkillLevel) -> bool {
    if entry.skill_id() == needed.skill_id() {
        return entry.level() > needed.level();
    }
    entry
        .skill()
        .prerequisites
        .iter()
        .any(|prerequisite| {
            prerequisite.skill == needed.skill_id() && prerequisite.level >= needed.level()
        })
}
