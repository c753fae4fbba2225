use std::collections::BTreeMap;

use log::{debug, trace};
use serde::Serialize;
use strum::IntoEnumIterator;

use crate::config::{OptimizerConfig, OptimizerStart};
use crate::errors::{PlannerError, Result};
use crate::sde::Attribute;
use crate::skill_plans::{Attributes, PlanRef};
use crate::utils;

const IMPROVEMENT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Serialize)]
pub struct OptimizationResult {
    /// Plan time under `allocation`.
    pub minutes: f64,
    /// Points above the floor per attribute; untouched attributes report 0.
    pub allocation: BTreeMap<Attribute, i64>,
    /// Plan time under the starting allocation.
    pub original_minutes: f64,
    pub iterations: usize,
}

impl OptimizationResult {
    pub fn allocation_attributes(&self) -> Attributes {
        let mut attributes = Attributes::default();
        for (attribute, points) in &self.allocation {
            attributes.set(*attribute, *points);
        }
        attributes
    }
}

type AttrPairDemand = BTreeMap<(Attribute, Attribute), i64>;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Donor {
    Unallocated,
    Attribute(Attribute),
}

pub struct AttributeOptimizer {
    config: OptimizerConfig,
}

impl Default for AttributeOptimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}

impl AttributeOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Greedy local search over one-point moves between attributes (and
    /// from the unallocated pool) until no move shortens the plan.
    pub fn suggest_attributes(
        &self,
        plan: &PlanRef<'_>,
        budget: i64,
        implants: &Attributes,
    ) -> Result<OptimizationResult> {
        if plan.is_empty() {
            return Err(PlannerError::EmptyPlan);
        }
        let max_points = self.config.max_points_per_attribute;
        let capacity = max_points * Attribute::iter().count() as i64;
        if budget < 0 || budget > capacity {
            return Err(PlannerError::data(format!(
                "attribute budget {} outside 0..={} ({} per attribute)",
                budget, capacity, max_points
            )));
        }

        let demand = plan_demand(plan);
        let floor = Attributes::uniform(self.config.base_attribute) + *implants;

        let mut allocation = self.starting_allocation(budget);
        let mut unallocated = budget - total_points(&allocation);
        let original_minutes = demand_minutes(&demand, &floor, &allocation)?;
        let mut minutes = original_minutes;
        let mut iterations = 0;

        while iterations < self.config.iteration_cap {
            let mut best: Option<(Donor, Attribute, f64)> = None;

            let donors = std::iter::once(Donor::Unallocated)
                .chain(Attribute::iter().map(Donor::Attribute));
            for donor in donors {
                let can_give = match donor {
                    Donor::Unallocated => unallocated > 0,
                    Donor::Attribute(attr) => allocation.get(attr) > 0,
                };
                if !can_give {
                    continue;
                }
                for receiver in Attribute::iter() {
                    if donor == Donor::Attribute(receiver) || allocation.get(receiver) >= max_points {
                        continue;
                    }
                    let mut candidate = allocation;
                    if let Donor::Attribute(attr) = donor {
                        candidate.set(attr, candidate.get(attr) - 1);
                    }
                    candidate.set(receiver, candidate.get(receiver) + 1);
                    let candidate_minutes = demand_minutes(&demand, &floor, &candidate)?;

                    let current_best = best.map(|(_, _, m)| m).unwrap_or(minutes);
                    if candidate_minutes < current_best - IMPROVEMENT_EPSILON {
                        best = Some((donor, receiver, candidate_minutes));
                    }
                }
            }

            let Some((donor, receiver, improved)) = best else {
                break;
            };
            match donor {
                Donor::Unallocated => unallocated -= 1,
                Donor::Attribute(attr) => allocation.set(attr, allocation.get(attr) - 1),
            }
            allocation.set(receiver, allocation.get(receiver) + 1);
            minutes = improved;
            iterations += 1;
            trace!(
                "Iteration {}: {:?} -> {} ({:.2} minutes)",
                iterations,
                donor,
                receiver,
                minutes
            );
        }

        // Points that no longer change the plan time still belong to the budget.
        while unallocated > 0 {
            let Some(receiver) = Attribute::iter().find(|attr| allocation.get(*attr) < max_points)
            else {
                break;
            };
            allocation.set(receiver, allocation.get(receiver) + 1);
            unallocated -= 1;
        }
        let minutes = demand_minutes(&demand, &floor, &allocation)?;

        debug!(
            "Optimized '{}' in {} iterations: {:.2} -> {:.2} minutes",
            plan.name(),
            iterations,
            original_minutes,
            minutes
        );

        Ok(OptimizationResult {
            minutes,
            allocation: Attribute::iter()
                .map(|attr| (attr, allocation.get(attr)))
                .collect(),
            original_minutes,
            iterations,
        })
    }

    fn starting_allocation(&self, budget: i64) -> Attributes {
        let mut allocation = Attributes::default();
        if self.config.start == OptimizerStart::Baseline {
            return allocation;
        }
        let mut remaining = budget;
        while remaining > 0 {
            let mut placed = false;
            for attr in Attribute::iter() {
                if remaining == 0 {
                    break;
                }
                if allocation.get(attr) < self.config.max_points_per_attribute {
                    allocation.set(attr, allocation.get(attr) + 1);
                    remaining -= 1;
                    placed = true;
                }
            }
            if !placed {
                break;
            }
        }
        allocation
    }
}

/// Remaining SP per (primary, secondary) pair; entries sharing a pair
/// train at the same rate.
fn plan_demand(plan: &PlanRef<'_>) -> AttrPairDemand {
    let mut demand = AttrPairDemand::new();
    for entry in plan.entries() {
        let remaining = entry.remaining_points();
        if remaining > 0 {
            let skill = entry.skill();
            *demand
                .entry((skill.primary_attribute, skill.secondary_attribute))
                .or_insert(0) += remaining;
        }
    }
    demand
}

fn demand_minutes(demand: &AttrPairDemand, floor: &Attributes, allocation: &Attributes) -> Result<f64> {
    let effective = *floor + *allocation;
    let mut total = 0.0;
    for ((primary, secondary), sp) in demand {
        let sp_per_min = utils::calculate_sp_per_minute(effective.get(*primary), effective.get(*secondary));
        if sp_per_min <= 0.0 {
            return Err(PlannerError::data(format!(
                "training rate for {}/{} is {} SP/min",
                primary, secondary, sp_per_min
            )));
        }
        total += *sp as f64 / sp_per_min;
    }
    Ok(total)
}

fn total_points(allocation: &Attributes) -> i64 {
    Attribute::iter().map(|attr| allocation.get(attr)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skill_plans::{simulation, SkillPlanList};
    use crate::testdata::fixtures;

    fn single_skill_plan(skill_id: &str, level: i64) -> (SkillPlanList, crate::skill_plans::PlanId) {
        let catalog = fixtures::catalog();
        let mut plans = SkillPlanList::new();
        let plan = plans.create_plan("Optimize").unwrap();
        let skill = catalog.lookup(skill_id).unwrap();
        plans.add_skill(catalog, plan, &skill, level).unwrap();
        (plans, plan)
    }

    fn expected_allocation(int: i64, mem: i64, per: i64, wil: i64, cha: i64) -> BTreeMap<Attribute, i64> {
        [
            (Attribute::Intelligence, int),
            (Attribute::Memory, mem),
            (Attribute::Perception, per),
            (Attribute::Willpower, wil),
            (Attribute::Charisma, cha),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_single_skill_gets_whole_budget() {
        let (plans, plan) = single_skill_plan("science", 3);
        let view = plans.plan(plan).unwrap();
        let optimizer = AttributeOptimizer::default();

        let result = optimizer
            .suggest_attributes(&view, 14, &Attributes::default())
            .unwrap();

        assert_eq!(result.allocation, expected_allocation(10, 4, 0, 0, 0));
        assert!(result.minutes < result.original_minutes);
        assert!(result.iterations > 0);

        let character = Attributes::uniform(17) + result.allocation_attributes();
        let direct = simulation::minutes_to_train_all(&character, &view).unwrap();
        assert!((direct - result.minutes).abs() < 1e-6);
    }

    #[test]
    fn test_baseline_start_matches_even_start() {
        let (plans, plan) = single_skill_plan("gunnery", 4);
        let view = plans.plan(plan).unwrap();
        let even = AttributeOptimizer::default()
            .suggest_attributes(&view, 14, &Attributes::default())
            .unwrap();
        let baseline = AttributeOptimizer::new(OptimizerConfig {
            start: OptimizerStart::Baseline,
            ..OptimizerConfig::default()
        })
        .suggest_attributes(&view, 14, &Attributes::default())
        .unwrap();

        // Gunnery is Perception / Willpower
        assert_eq!(even.allocation, expected_allocation(0, 0, 10, 4, 0));
        assert_eq!(baseline.allocation, even.allocation);
        assert_eq!(baseline.iterations, 14);
        assert!((baseline.minutes - even.minutes).abs() < 1e-9);
    }

    #[test]
    fn test_mixed_plan_improves_and_spends_budget() {
        let catalog = fixtures::catalog();
        let mut plans = SkillPlanList::new();
        let plan = plans.create_plan("Mixed").unwrap();
        for (id, level) in [("navigation", 3), ("science", 4), ("gunnery", 2), ("leadership", 2)] {
            let skill = catalog.lookup(id).unwrap();
            plans.add_skill(catalog, plan, &skill, level).unwrap();
        }
        let view = plans.plan(plan).unwrap();
        let implants = fixtures::create_attributes(3, 3, 3, 3, 3);

        let result = AttributeOptimizer::default()
            .suggest_attributes(&view, 14, &implants)
            .unwrap();

        assert!(result.minutes <= result.original_minutes);
        assert_eq!(result.allocation.values().sum::<i64>(), 14);
        assert!(result.allocation.values().all(|points| (0..=10).contains(points)));

        let character = Attributes::uniform(17) + implants + result.allocation_attributes();
        let direct = simulation::minutes_to_train_all(&character, &view).unwrap();
        assert!((direct - result.minutes).abs() < 1e-6);
    }

    #[test]
    fn test_ties_go_to_lowest_attribute() {
        let catalog = fixtures::catalog();
        let mut plans = SkillPlanList::new();
        let plan = plans.create_plan("Even split").unwrap();
        // Same rank and levels: Intelligence and Perception help equally.
        for id in ["science", "gunnery"] {
            let skill = catalog.lookup(id).unwrap();
            plans.add_skill(catalog, plan, &skill, 3).unwrap();
        }
        let view = plans.plan(plan).unwrap();

        let result = AttributeOptimizer::new(OptimizerConfig {
            start: OptimizerStart::Baseline,
            ..OptimizerConfig::default()
        })
        .suggest_attributes(&view, 1, &Attributes::default())
        .unwrap();

        assert_eq!(result.allocation, expected_allocation(1, 0, 0, 0, 0));
        assert_eq!(result.iterations, 1);
        assert!(result.minutes < result.original_minutes);
    }

    #[test]
    fn test_is_deterministic() {
        let (plans, plan) = single_skill_plan("advanced_weapon_upgrades", 2);
        let view = plans.plan(plan).unwrap();
        let optimizer = AttributeOptimizer::default();
        let first = optimizer
            .suggest_attributes(&view, 14, &Attributes::default())
            .unwrap();
        let second = optimizer
            .suggest_attributes(&view, 14, &Attributes::default())
            .unwrap();
        assert_eq!(first.allocation, second.allocation);
        assert_eq!(first.minutes, second.minutes);
    }

    #[test]
    fn test_iteration_cap_bounds_search() {
        let (plans, plan) = single_skill_plan("science", 2);
        let view = plans.plan(plan).unwrap();
        let optimizer = AttributeOptimizer::new(OptimizerConfig {
            iteration_cap: 2,
            start: OptimizerStart::Baseline,
            ..OptimizerConfig::default()
        });
        let result = optimizer
            .suggest_attributes(&view, 14, &Attributes::default())
            .unwrap();
        assert_eq!(result.iterations, 2);
        // The rest of the budget is still handed out.
        assert_eq!(result.allocation.values().sum::<i64>(), 14);
    }

    #[test]
    fn test_empty_plan_is_error() {
        let mut plans = SkillPlanList::new();
        let plan = plans.create_plan("Nothing").unwrap();
        let view = plans.plan(plan).unwrap();
        assert!(matches!(
            AttributeOptimizer::default().suggest_attributes(&view, 14, &Attributes::default()),
            Err(PlannerError::EmptyPlan)
        ));
    }

    #[test]
    fn test_budget_out_of_range() {
        let (plans, plan) = single_skill_plan("science", 1);
        let view = plans.plan(plan).unwrap();
        let optimizer = AttributeOptimizer::default();
        assert!(optimizer.suggest_attributes(&view, -1, &Attributes::default()).is_err());
        assert!(optimizer.suggest_attributes(&view, 51, &Attributes::default()).is_err());
    }

    #[test]
    fn test_zero_floor_is_data_error() {
        let (plans, plan) = single_skill_plan("science", 1);
        let view = plans.plan(plan).unwrap();
        let optimizer = AttributeOptimizer::new(OptimizerConfig {
            base_attribute: 0,
            start: OptimizerStart::Baseline,
            ..OptimizerConfig::default()
        });
        assert!(matches!(
            optimizer.suggest_attributes(&view, 0, &Attributes::default()),
            Err(PlannerError::DataError { .. })
        ));
    }
}
