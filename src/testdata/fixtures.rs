use crate::character::Character;
use crate::sde::{Attribute, Prerequisite, SkillCatalog, SkillDefinition};
use crate::skill_plans::Attributes;
use lazy_static::lazy_static;

lazy_static! {
    static ref CATALOG: SkillCatalog = SkillCatalog::from_definitions(vec![
        skill("gunnery", "Gunnery", "Gunnery", 1, Attribute::Perception, Attribute::Willpower, &[]),
        skill(
            "spaceship_command",
            "Spaceship Command",
            "Spaceship Command",
            1,
            Attribute::Perception,
            Attribute::Willpower,
            &[],
        ),
        skill("science", "Science", "Science", 1, Attribute::Intelligence, Attribute::Memory, &[]),
        skill(
            "navigation",
            "Navigation",
            "Navigation",
            1,
            Attribute::Intelligence,
            Attribute::Perception,
            &[],
        ),
        skill(
            "power_grid_management",
            "Power Grid Management",
            "Engineering",
            1,
            Attribute::Intelligence,
            Attribute::Memory,
            &[],
        ),
        skill(
            "cpu_management",
            "CPU Management",
            "Electronic Systems",
            1,
            Attribute::Intelligence,
            Attribute::Memory,
            &[],
        ),
        skill(
            "weapon_upgrades",
            "Weapon Upgrades",
            "Engineering",
            2,
            Attribute::Intelligence,
            Attribute::Memory,
            &[("gunnery", 2), ("cpu_management", 1)],
        ),
        skill(
            "advanced_weapon_upgrades",
            "Advanced Weapon Upgrades",
            "Engineering",
            6,
            Attribute::Intelligence,
            Attribute::Memory,
            &[("weapon_upgrades", 2), ("power_grid_management", 2)],
        ),
        skill(
            "leadership",
            "Leadership",
            "Leadership",
            1,
            Attribute::Charisma,
            Attribute::Willpower,
            &[],
        ),
    ])
    .unwrap();
}

fn skill(
    id: &str,
    name: &str,
    group: &str,
    rank: i64,
    primary: Attribute,
    secondary: Attribute,
    prerequisites: &[(&str, i64)],
) -> SkillDefinition {
    SkillDefinition {
        id: id.to_string(),
        name: name.to_string(),
        group: Some(group.to_string()),
        rank,
        primary_attribute: primary,
        secondary_attribute: secondary,
        prerequisites: prerequisites
            .iter()
            .map(|(skill, level)| Prerequisite {
                skill: skill.to_string(),
                level: *level,
            })
            .collect(),
    }
}

pub fn catalog() -> &'static SkillCatalog {
    &CATALOG
}

/// Ungrouped Intelligence / Memory skill.
pub fn definition(id: &str, rank: i64, prerequisites: &[(&str, i64)]) -> SkillDefinition {
    SkillDefinition {
        group: None,
        ..skill(
            id,
            id,
            "",
            rank,
            Attribute::Intelligence,
            Attribute::Memory,
            prerequisites,
        )
    }
}

pub fn cyclic_catalog() -> SkillCatalog {
    SkillCatalog::from_definitions(vec![
        definition("ouroboros_a", 1, &[("ouroboros_b", 1)]),
        definition("ouroboros_b", 1, &[("ouroboros_a", 1)]),
    ])
    .unwrap()
}

pub fn catalog_with_dangling_prerequisite() -> SkillCatalog {
    SkillCatalog::from_definitions(vec![definition("orphan", 1, &[("vanished", 3)])]).unwrap()
}

pub fn create_attributes(int: i64, mem: i64, per: i64, wil: i64, cha: i64) -> Attributes {
    Attributes {
        intelligence: int,
        memory: mem,
        perception: per,
        willpower: wil,
        charisma: cha,
    }
}

pub fn create_character() -> Character {
    Character::new("Test Pilot", Attributes::uniform(17), Attributes::default())
}
