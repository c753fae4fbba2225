use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use log::trace;

use crate::errors::{PlannerError, Result};
use crate::sde::{SkillCatalog, SkillDefinition};
use crate::skill_tree::SkillLevel;
use crate::utils;

use super::SkillPlan;

/// Computes the levels `add_skill` has to insert, dependencies first,
/// without touching the plan. A failure therefore never leaves a plan
/// half-updated.
pub(crate) struct PlanResolver<'a> {
    catalog: &'a SkillCatalog,
    plan: &'a SkillPlan,
    planned: BTreeMap<String, i64>,
    visiting: Vec<String>,
    visiting_set: HashSet<String>,
    insertions: Vec<SkillLevel>,
}

impl<'a> PlanResolver<'a> {
    pub(crate) fn new(catalog: &'a SkillCatalog, plan: &'a SkillPlan) -> Self {
        Self {
            catalog,
            plan,
            planned: plan.planned_skills().clone(),
            visiting: Vec::new(),
            visiting_set: HashSet::new(),
            insertions: Vec::new(),
        }
    }

    pub(crate) fn resolve(
        mut self,
        skill: &Arc<SkillDefinition>,
        target_level: i64,
    ) -> Result<Vec<SkillLevel>> {
        if !utils::is_valid_level(target_level) {
            return Err(PlannerError::InvalidLevel {
                level: target_level,
            });
        }
        self.add(skill, target_level)?;
        Ok(self.insertions)
    }

    fn current_level(&self, skill_id: &str) -> i64 {
        let planned = self.planned.get(skill_id).copied().unwrap_or(0);
        self.plan.known_level(skill_id).max(planned)
    }

    fn add(&mut self, skill: &Arc<SkillDefinition>, target_level: i64) -> Result<()> {
        let current = self.current_level(&skill.id);
        if current >= target_level {
            return Ok(());
        }
        if target_level > utils::MAX_SKILL_LEVEL {
            return Err(PlannerError::InvalidLevel {
                level: target_level,
            });
        }

        if !self.visiting_set.insert(skill.id.clone()) {
            let mut chain = self.visiting.clone();
            chain.push(skill.id.clone());
            return Err(PlannerError::CyclicDependency { chain });
        }
        self.visiting.push(skill.id.clone());

        for prerequisite in &skill.prerequisites {
            let required = self.catalog.lookup(&prerequisite.skill)?;
            self.add(&required, prerequisite.level)?;
        }

        self.visiting.pop();
        self.visiting_set.remove(&skill.id);

        for level in (current + 1)..=target_level {
            let mut entry = SkillLevel::untrained(skill.clone(), level)?;
            if let Some(partial) = self.plan.known_partial(&skill.id, level) {
                entry.set_trained(partial);
            }
            trace!("Resolved {} {}", skill.id, level);
            self.insertions.push(entry);
        }
        self.planned.insert(skill.id.clone(), target_level);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skill_tree::SkillPoints;
    use crate::testdata::fixtures;

    fn resolved(skill_id: &str, level: i64) -> Vec<(String, i64)> {
        let catalog = fixtures::catalog();
        let plan = SkillPlan::new("test");
        let skill = catalog.lookup(skill_id).unwrap();
        PlanResolver::new(catalog, &plan)
            .resolve(&skill, level)
            .unwrap()
            .into_iter()
            .map(|l| (l.skill_id().to_string(), l.level()))
            .collect()
    }

    #[test]
    fn test_resolve_orders_prerequisites_first() {
        assert_eq!(
            resolved("weapon_upgrades", 1),
            vec![
                ("gunnery".to_string(), 1),
                ("gunnery".to_string(), 2),
                ("cpu_management".to_string(), 1),
                ("weapon_upgrades".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_resolve_shared_prerequisite_once() {
        let levels = resolved("advanced_weapon_upgrades", 1);
        let cpu_one = levels
            .iter()
            .filter(|(id, level)| id == "cpu_management" && *level == 1)
            .count();
        assert_eq!(cpu_one, 1);
        assert_eq!(
            levels.last(),
            Some(&("advanced_weapon_upgrades".to_string(), 1))
        );
    }

    #[test]
    fn test_resolve_detects_cycle() {
        let catalog = fixtures::cyclic_catalog();
        let plan = SkillPlan::new("loop");
        let skill = catalog.lookup("ouroboros_a").unwrap();
        match PlanResolver::new(&catalog, &plan).resolve(&skill, 1) {
            Err(PlannerError::CyclicDependency { chain }) => {
                assert_eq!(chain, vec!["ouroboros_a", "ouroboros_b", "ouroboros_a"]);
            }
            other => panic!("expected CyclicDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_missing_prerequisite() {
        let catalog = fixtures::catalog_with_dangling_prerequisite();
        let plan = SkillPlan::new("dangling");
        let skill = catalog.lookup("orphan").unwrap();
        assert!(matches!(
            PlanResolver::new(&catalog, &plan).resolve(&skill, 1),
            Err(PlannerError::UnknownSkill { .. })
        ));
    }

    #[test]
    fn test_resolve_rejects_invalid_target() {
        let catalog = fixtures::catalog();
        let plan = SkillPlan::new("test");
        let skill = catalog.lookup("gunnery").unwrap();
        assert!(matches!(
            PlanResolver::new(catalog, &plan).resolve(&skill, 6),
            Err(PlannerError::InvalidLevel { level: 6 })
        ));
    }

    #[test]
    fn test_resolve_keeps_partial_progress() {
        let catalog = fixtures::catalog();
        let gunnery = catalog.lookup("gunnery").unwrap();
        let mut plan = SkillPlan::new("partial");
        let known = vec![
            SkillLevel::new(gunnery.clone(), 1, SkillPoints::FullyTrained).unwrap(),
            SkillLevel::new(gunnery.clone(), 2, SkillPoints::Trained(500)).unwrap(),
        ];
        plan.set_known(known.iter());

        let levels = PlanResolver::new(catalog, &plan).resolve(&gunnery, 3).unwrap();
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].level(), 2);
        assert_eq!(levels[0].skill_points_trained(), 500);
        assert_eq!(levels[1].skill_points_trained(), 0);
    }
}
