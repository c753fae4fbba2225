use std::ops::Add;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{PlannerError, Result};
use crate::sde::{Attribute, SkillDefinition};
use crate::skill_plans::PlanRef;
use crate::skill_tree::SkillLevel;
use crate::utils;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Attributes {
    pub charisma: i64,
    pub intelligence: i64,
    pub memory: i64,
    pub perception: i64,
    pub willpower: i64,
}

impl Attributes {
    pub fn uniform(value: i64) -> Self {
        Self {
            charisma: value,
            intelligence: value,
            memory: value,
            perception: value,
            willpower: value,
        }
    }

    pub fn get(&self, attribute: Attribute) -> i64 {
        match attribute {
            Attribute::Charisma => self.charisma,
            Attribute::Intelligence => self.intelligence,
            Attribute::Memory => self.memory,
            Attribute::Perception => self.perception,
            Attribute::Willpower => self.willpower,
        }
    }

    pub fn set(&mut self, attribute: Attribute, value: i64) {
        match attribute {
            Attribute::Charisma => self.charisma = value,
            Attribute::Intelligence => self.intelligence = value,
            Attribute::Memory => self.memory = value,
            Attribute::Perception => self.perception = value,
            Attribute::Willpower => self.willpower = value,
        }
    }
}

impl Add for Attributes {
    type Output = Attributes;

    fn add(self, other: Attributes) -> Attributes {
        Attributes {
            charisma: self.charisma + other.charisma,
            intelligence: self.intelligence + other.intelligence,
            memory: self.memory + other.memory,
            perception: self.perception + other.perception,
            willpower: self.willpower + other.willpower,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingSchedule {
    pub total_minutes: f64,
    pub total_sp: i64,
    pub segments: Vec<ScheduleSegment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleSegment {
    pub entry_index: usize,
    pub skill_id: String,
    pub level: i64,
    pub start_minutes: f64,
    pub duration_minutes: f64,
    pub sp_per_minute: f64,
    pub sp_to_train: i64,
}

impl TrainingSchedule {
    /// Wall-clock time the whole queue finishes when training starts at `start`.
    pub fn completion_time(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        start + Duration::seconds((self.total_minutes * 60.0).ceil() as i64)
    }
}

/// Training speed for a skill given effective (base plus implant) attributes.
pub fn sp_per_minute(attributes: &Attributes, skill: &SkillDefinition) -> Result<f64> {
    let primary = attributes.get(skill.primary_attribute);
    let secondary = attributes.get(skill.secondary_attribute);
    let rate = utils::calculate_sp_per_minute(primary, secondary);
    if rate <= 0.0 {
        return Err(PlannerError::data(format!(
            "training rate for '{}' is {} SP/min ({} {}, {} {})",
            skill.id,
            rate,
            skill.primary_attribute,
            primary,
            skill.secondary_attribute,
            secondary
        )));
    }
    Ok(rate)
}

pub fn remaining_points(level: &SkillLevel) -> i64 {
    level.remaining_points()
}

pub fn minutes_to_train(attributes: &Attributes, level: &SkillLevel) -> Result<f64> {
    let rate = sp_per_minute(attributes, level.skill())?;
    Ok(remaining_points(level) as f64 / rate)
}

/// Sum over the queue with one fixed attribute snapshot; no remaps.
pub fn minutes_to_train_all(attributes: &Attributes, plan: &PlanRef<'_>) -> Result<f64> {
    plan.entries()
        .map(|entry| minutes_to_train(attributes, entry))
        .sum()
}

pub fn schedule(attributes: &Attributes, plan: &PlanRef<'_>) -> Result<TrainingSchedule> {
    let mut segments = Vec::with_capacity(plan.len());
    let mut current_time = 0.0;
    let mut total_sp = 0;

    for (idx, entry) in plan.entries().enumerate() {
        let rate = sp_per_minute(attributes, entry.skill())?;
        let sp_to_train = remaining_points(entry);
        let duration = sp_to_train as f64 / rate;

        segments.push(ScheduleSegment {
            entry_index: idx,
            skill_id: entry.skill_id().to_string(),
            level: entry.level(),
            start_minutes: current_time,
            duration_minutes: duration,
            sp_per_minute: rate,
            sp_to_train,
        });

        current_time += duration;
        total_sp += sp_to_train;
    }

    Ok(TrainingSchedule {
        total_minutes: current_time,
        total_sp,
        segments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skill_plans::SkillPlanList;
    use crate::skill_tree::SkillPoints;
    use crate::testdata::fixtures;
    use chrono::TimeZone;

    #[test]
    fn test_minutes_to_train_fresh_level() {
        let catalog = fixtures::catalog();
        let gunnery = catalog.lookup("gunnery").unwrap();
        let level = SkillLevel::untrained(gunnery.clone(), 1).unwrap();
        // Gunnery is Perception / Willpower
        let attributes = fixtures::create_attributes(17, 17, 20, 17, 17);

        assert_eq!(sp_per_minute(&attributes, &gunnery).unwrap(), 28.5);
        let minutes = minutes_to_train(&attributes, &level).unwrap();
        assert!((minutes - 250.0 / 28.5).abs() < 1e-9);
        assert!((minutes - 8.77).abs() < 0.01);
    }

    #[test]
    fn test_minutes_to_train_partial_and_complete() {
        let catalog = fixtures::catalog();
        let gunnery = catalog.lookup("gunnery").unwrap();
        let attributes = fixtures::create_attributes(17, 17, 20, 17, 17);

        let partial = SkillLevel::new(gunnery.clone(), 2, SkillPoints::Trained(165)).unwrap();
        let minutes = minutes_to_train(&attributes, &partial).unwrap();
        assert!((minutes - 1000.0 / 28.5).abs() < 1e-9);

        let done = SkillLevel::new(gunnery, 2, SkillPoints::FullyTrained).unwrap();
        assert_eq!(minutes_to_train(&attributes, &done).unwrap(), 0.0);
    }

    #[test]
    fn test_non_positive_rate_is_error() {
        let catalog = fixtures::catalog();
        let gunnery = catalog.lookup("gunnery").unwrap();
        let level = SkillLevel::untrained(gunnery, 1).unwrap();
        let attributes = Attributes::default();
        assert!(matches!(
            minutes_to_train(&attributes, &level),
            Err(PlannerError::DataError { .. })
        ));
    }

    #[test]
    fn test_minutes_to_train_all_and_schedule() {
        let catalog = fixtures::catalog();
        let mut plans = SkillPlanList::new();
        let plan = plans.create_plan("Schedule").unwrap();
        let gunnery = catalog.lookup("gunnery").unwrap();
        let science = catalog.lookup("science").unwrap();
        plans.add_skill(catalog, plan, &gunnery, 2).unwrap();
        plans.add_skill(catalog, plan, &science, 1).unwrap();

        let attributes = fixtures::create_attributes(20, 18, 20, 17, 17);
        let view = plans.plan(plan).unwrap();
        let total = minutes_to_train_all(&attributes, &view).unwrap();
        // Gunnery: Per 20 + Wil 17 / 2; Science: Int 20 + Mem 18 / 2
        let expected = 250.0 / 28.5 + 1165.0 / 28.5 + 250.0 / 29.0;
        assert!((total - expected).abs() < 1e-9);

        let result = schedule(&attributes, &view).unwrap();
        assert_eq!(result.segments.len(), 3);
        assert_eq!(result.total_sp, 250 + 1165 + 250);
        assert!((result.total_minutes - total).abs() < 1e-9);
        assert!((result.segments[2].start_minutes - (250.0 + 1165.0) / 28.5).abs() < 1e-9);

        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let finish = result.completion_time(start);
        assert_eq!(
            (finish - start).num_seconds(),
            (total * 60.0).ceil() as i64
        );
    }

    #[test]
    fn test_empty_plan_takes_no_time() {
        let mut plans = SkillPlanList::new();
        let plan = plans.create_plan("Empty").unwrap();
        let attributes = Attributes::uniform(17);
        let view = plans.plan(plan).unwrap();
        assert_eq!(minutes_to_train_all(&attributes, &view).unwrap(), 0.0);
    }

    #[test]
    fn test_attributes_add_and_access() {
        let base = Attributes::uniform(17);
        let implants = fixtures::create_attributes(3, 3, 0, 0, 1);
        let total = base + implants;
        assert_eq!(total.get(Attribute::Intelligence), 20);
        assert_eq!(total.get(Attribute::Perception), 17);
        assert_eq!(total.get(Attribute::Charisma), 18);

        let mut edited = total;
        edited.set(Attribute::Willpower, 30);
        assert_eq!(edited.willpower, 30);
    }
}
