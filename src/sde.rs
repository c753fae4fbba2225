use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    sync::Arc,
};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::errors::{PlannerError, Result};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Attribute {
    Intelligence,
    Memory,
    Perception,
    Willpower,
    Charisma,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prerequisite {
    pub skill: String,
    pub level: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillDefinition {
    pub id: String,
    pub name: String,
    pub group: Option<String>,
    pub rank: i64,
    pub primary_attribute: Attribute,
    pub secondary_attribute: Attribute,
    pub prerequisites: Vec<Prerequisite>,
}

#[derive(Debug, Deserialize)]
struct SkillRow {
    id: String,
    name: String,
    group: Option<String>,
    rank: i64,
    #[serde(rename = "primaryAttribute")]
    primary_attribute: Attribute,
    #[serde(rename = "secondaryAttribute")]
    secondary_attribute: Attribute,
    #[serde(rename = "requiredSkills", default)]
    required_skills: Vec<Prerequisite>,
}

impl From<SkillRow> for SkillDefinition {
    fn from(row: SkillRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            group: row.group,
            rank: row.rank,
            primary_attribute: row.primary_attribute,
            secondary_attribute: row.secondary_attribute,
            prerequisites: row.required_skills,
        }
    }
}

/// Immutable skill knowledge base, shared by plans through `Arc`.
#[derive(Debug, Clone, Default)]
pub struct SkillCatalog {
    skills: BTreeMap<String, Arc<SkillDefinition>>,
}

impl SkillCatalog {
    /// Fails with `DataError` on a non-positive rank.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = SkillDefinition>,
    ) -> Result<Self> {
        let mut skills = BTreeMap::new();
        for definition in definitions {
            check_rank(&definition, None)?;
            if let Some(previous) = skills.insert(definition.id.clone(), Arc::new(definition)) {
                warn!("Duplicate skill '{}' in catalog, keeping last", previous.id);
            }
        }
        Ok(Self { skills })
    }

    /// Reads one JSON skill object per line. Blank lines are skipped.
    pub fn from_json_lines<R: BufRead>(reader: R) -> Result<Self> {
        let mut definitions = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| PlannerError::CatalogIo { source })?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let row: SkillRow = serde_json::from_str(trimmed)
                .map_err(|source| PlannerError::CatalogParse {
                    line: index + 1,
                    source,
                })?;
            let definition = SkillDefinition::from(row);
            check_rank(&definition, Some(index + 1))?;
            definitions.push(definition);
        }
        let catalog = Self::from_definitions(definitions)?;
        debug!("Loaded {} skills into catalog", catalog.len());
        Ok(catalog)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| PlannerError::CatalogIo { source })?;
        Self::from_json_lines(BufReader::new(file))
    }

    pub fn lookup(&self, skill_id: &str) -> Result<Arc<SkillDefinition>> {
        self.skills
            .get(skill_id)
            .cloned()
            .ok_or_else(|| PlannerError::UnknownSkill {
                skill_id: skill_id.to_string(),
            })
    }

    pub fn contains(&self, skill_id: &str) -> bool {
        self.skills.contains_key(skill_id)
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<SkillDefinition>> {
        self.skills.values()
    }

    /// Skill ids per group name. Ungrouped skills land under "Other".
    pub fn groups(&self) -> BTreeMap<String, Vec<String>> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for skill in self.skills.values() {
            groups
                .entry(group_name(skill).to_string())
                .or_default()
                .push(skill.id.clone());
        }
        groups
    }

    pub fn search(&self, text: &str) -> Vec<Arc<SkillDefinition>> {
        let needle = text.to_lowercase();
        self.skills
            .values()
            .filter(|skill| skill.name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }
}

fn check_rank(definition: &SkillDefinition, line: Option<usize>) -> Result<()> {
    if definition.rank > 0 {
        return Ok(());
    }
    let location = line.map(|l| format!(" on catalog line {}", l)).unwrap_or_default();
    Err(PlannerError::data(format!(
        "skill '{}' has non-positive rank {}{}",
        definition.id, definition.rank, location
    )))
}

pub fn group_name(skill: &SkillDefinition) -> &str {
    skill.group.as_deref().unwrap_or("Other")
}
