use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::errors::{PlannerError, Result};
use crate::sde::{self, Attribute, SkillCatalog, SkillDefinition};
use crate::skill_plans::{Attributes, PlanId, SkillPlanList};
use crate::skill_tree::{ItemId, SkillItem, SkillLevel, SkillPoints, SkillTree};
use crate::utils;

/// On-disk character snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterData {
    pub name: String,
    pub attributes: Attributes,
    #[serde(default)]
    pub implants: Attributes,
    #[serde(default)]
    pub skills: Vec<KnownSkillData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownSkillData {
    pub skill: String,
    pub level: i64,
    /// Total skill points in the skill, including progress towards the next level.
    #[serde(default)]
    pub points: i64,
}

#[derive(Debug)]
pub struct Character {
    name: String,
    attributes: Attributes,
    implants: Attributes,
    known_skills: SkillTree,
    plans: SkillPlanList,
}

impl Character {
    pub fn new(name: impl Into<String>, attributes: Attributes, implants: Attributes) -> Self {
        Self {
            name: name.into(),
            attributes,
            implants,
            known_skills: SkillTree::new(SkillItem::group("Skills")),
            plans: SkillPlanList::new(),
        }
    }

    pub fn from_data(catalog: &SkillCatalog, data: CharacterData) -> Result<Self> {
        let mut character = Self::new(data.name, data.attributes, data.implants);
        for known in &data.skills {
            let definition = catalog.lookup(&known.skill)?;
            character.set_known_skill(definition, known.level, known.points)?;
        }
        debug!(
            "Loaded character '{}' with {} known skills",
            character.name,
            data.skills.len()
        );
        Ok(character)
    }

    /// Hypothetical character with every attribute at `base_floor` plus
    /// `allocation`, wearing `implants`.
    pub fn with_allocation(base_floor: i64, allocation: &Attributes, implants: &Attributes) -> Self {
        Self::new(
            "",
            Attributes::uniform(base_floor) + *allocation,
            *implants,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn implants(&self) -> &Attributes {
        &self.implants
    }

    pub fn set_attribute(&mut self, attribute: Attribute, value: i64) {
        self.attributes.set(attribute, value);
    }

    pub fn set_implant(&mut self, attribute: Attribute, value: i64) {
        self.implants.set(attribute, value);
    }

    pub fn attr_value(&self, attribute: Attribute) -> i64 {
        self.attributes.get(attribute) + self.implants.get(attribute)
    }

    pub fn effective_attributes(&self) -> Attributes {
        self.attributes + self.implants
    }

    pub fn known_skills(&self) -> &SkillTree {
        &self.known_skills
    }

    pub fn plans(&self) -> &SkillPlanList {
        &self.plans
    }

    pub fn plans_mut(&mut self) -> &mut SkillPlanList {
        &mut self.plans
    }

    /// Highest fully trained level of a skill, 0 when unknown.
    pub fn known_level(&self, skill_id: &str) -> i64 {
        self.known_entries()
            .filter(|level| level.skill_id() == skill_id && level.is_complete())
            .map(SkillLevel::level)
            .max()
            .unwrap_or(0)
    }

    fn known_entries(&self) -> impl Iterator<Item = &SkillLevel> {
        let tree = &self.known_skills;
        tree.descendants(tree.root())
            .into_iter()
            .filter_map(move |id| tree.get(id).and_then(SkillItem::as_level))
    }

    /// Records `skill` as trained to `level` with `points_in_skill` total
    /// points. Points beyond `level` become an in-progress next level.
    /// Every plan is refreshed against the new known set.
    pub fn set_known_skill(
        &mut self,
        skill: Arc<SkillDefinition>,
        level: i64,
        points_in_skill: i64,
    ) -> Result<()> {
        if !(0..=utils::MAX_SKILL_LEVEL).contains(&level) {
            return Err(PlannerError::InvalidLevel { level });
        }
        let group = self.group_node(sde::group_name(&skill))?;

        let stale: Vec<ItemId> = self
            .known_skills
            .children(group)
            .iter()
            .copied()
            .filter(|id| {
                self.known_skills
                    .get(*id)
                    .and_then(SkillItem::as_level)
                    .is_some_and(|known| known.skill_id() == skill.id)
            })
            .collect();
        for id in stale {
            self.known_skills.detach(id)?;
        }

        if level > 0 {
            let trained = SkillLevel::new(skill.clone(), level, SkillPoints::FullyTrained)?;
            self.known_skills.append(group, SkillItem::Level(trained))?;
        }
        let progress = points_in_skill - utils::calculate_sp_for_level(skill.rank, level);
        if level < utils::MAX_SKILL_LEVEL && progress > 0 {
            let partial = SkillLevel::new(skill.clone(), level + 1, SkillPoints::Trained(progress))?;
            if partial.is_complete() {
                warn!(
                    "{} points in '{}' exceed level {}; treating level {} as trained",
                    points_in_skill,
                    skill.id,
                    level,
                    level + 1
                );
            }
            self.known_skills.append(group, SkillItem::Level(partial))?;
        }

        self.refresh_plans()
    }

    /// Creates a plan that already knows this character's skills.
    pub fn create_plan(&mut self, name: &str) -> Result<PlanId> {
        let plan = self.plans.create_plan(name)?;
        self.plans.set_known_skills(plan, &self.known_skills)?;
        Ok(plan)
    }

    fn refresh_plans(&mut self) -> Result<()> {
        let ids: Vec<PlanId> = self.plans.plans().iter().map(|plan| plan.id()).collect();
        for id in ids {
            self.plans.set_known_skills(id, &self.known_skills)?;
        }
        Ok(())
    }

    /// Group node named `name`, created in name order when missing.
    fn group_node(&mut self, name: &str) -> Result<ItemId> {
        let root = self.known_skills.root();
        let mut index = 0;
        for id in self.known_skills.children(root) {
            match self.known_skills.get(*id) {
                Some(SkillItem::Group(group)) if group.name == name => return Ok(*id),
                Some(SkillItem::Group(group)) if group.name.as_str() < name => index += 1,
                _ => break,
            }
        }
        self.known_skills.insert(root, index, SkillItem::group(name))
    }
}
