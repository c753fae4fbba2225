use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::sde::SkillCatalog;
use crate::skill_plans::PlanRef;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlanNode {
    pub skill_id: String,
    pub level: i64,
}

impl PlanNode {
    pub fn new(skill_id: impl Into<String>, level: i64) -> Self {
        Self {
            skill_id: skill_id.into(),
            level,
        }
    }
}

pub struct PlanDag {
    pub nodes: BTreeSet<PlanNode>,
    /// Maps a node to its direct dependencies (prerequisites)
    pub dependencies: BTreeMap<PlanNode, BTreeSet<PlanNode>>,
    /// Maps a node to those that depend on it
    pub dependents: BTreeMap<PlanNode, BTreeSet<PlanNode>>,
    /// Fully trained level per skill; prerequisites at or below it need no edge
    known: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationEntry {
    Cycle(Vec<PlanNode>),
    MissingPrerequisite {
        node: PlanNode,
        missing: PlanNode,
    },
    OrderingViolation {
        node: PlanNode,
        prerequisite: PlanNode,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationEntry>,
    pub warnings: Vec<ValidationEntry>,
}

impl Default for PlanDag {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanDag {
    pub fn new() -> Self {
        Self::with_known(BTreeMap::new())
    }

    pub fn with_known(known: BTreeMap<String, i64>) -> Self {
        Self {
            nodes: BTreeSet::new(),
            dependencies: BTreeMap::new(),
            dependents: BTreeMap::new(),
            known,
        }
    }

    pub fn add_node(&mut self, catalog: &SkillCatalog, node: PlanNode) -> Result<()> {
        if self.nodes.contains(&node) {
            return Ok(());
        }
        let skill = catalog.lookup(&node.skill_id)?;
        self.nodes.insert(node.clone());

        // Add implicit dependency on previous level
        if node.level > 1 {
            let prev_level_node = PlanNode::new(node.skill_id.clone(), node.level - 1);
            self.add_edge(prev_level_node, node.clone());
        }

        for prerequisite in &skill.prerequisites {
            let prereq_node = PlanNode::new(prerequisite.skill.clone(), prerequisite.level);
            self.add_edge(prereq_node, node.clone());
        }

        Ok(())
    }

    fn is_known(&self, node: &PlanNode) -> bool {
        self.known.get(&node.skill_id).copied().unwrap_or(0) >= node.level
    }

    fn add_edge(&mut self, from: PlanNode, to: PlanNode) {
        if self.is_known(&from) {
            return;
        }
        self.dependencies
            .entry(to.clone())
            .or_default()
            .insert(from.clone());
        self.dependents.entry(from).or_default().insert(to);
    }

    pub fn topological_sort(&self, preferred_order: &[PlanNode]) -> Vec<PlanNode> {
        let mut result = Vec::new();
        let mut placed: BTreeSet<PlanNode> = BTreeSet::new();
        let mut in_degree: BTreeMap<&PlanNode, usize> = BTreeMap::new();

        for node in &self.nodes {
            let degree = self
                .dependencies
                .get(node)
                .map(|deps| deps.iter().filter(|p| self.nodes.contains(*p)).count())
                .unwrap_or(0);
            in_degree.insert(node, degree);
        }

        let mut available: BTreeSet<PlanNode> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&node, _)| node.clone())
            .collect();

        let mut preferred_idx = 0;

        while !available.is_empty() {
            // Try to pick the next node from preferred order if it's available
            let mut picked = None;
            while preferred_idx < preferred_order.len() {
                let next_pref = &preferred_order[preferred_idx];
                if available.contains(next_pref) {
                    picked = Some(next_pref.clone());
                    preferred_idx += 1;
                    break;
                }
                if placed.contains(next_pref) || !self.nodes.contains(next_pref) {
                    preferred_idx += 1;
                    continue;
                }
                // Otherwise, we can't pick it yet because its prerequisites aren't met
                break;
            }

            // Fall back to the smallest available node
            let Some(node) = picked.or_else(|| available.iter().next().cloned()) else {
                break;
            };

            available.remove(&node);
            placed.insert(node.clone());

            if let Some(deps) = self.dependents.get(&node) {
                for dep in deps {
                    if let Some(degree) = in_degree.get_mut(dep) {
                        *degree -= 1;
                        if *degree == 0 {
                            available.insert(dep.clone());
                        }
                    }
                }
            }
            result.push(node);
        }

        result
    }

    pub fn validate(&self, current_order: &[PlanNode]) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let order_map: BTreeMap<&PlanNode, usize> = current_order
            .iter()
            .enumerate()
            .map(|(i, n)| (n, i))
            .collect();

        // Check for missing prerequisites and ordering violations
        for (idx, node) in current_order.iter().enumerate() {
            if let Some(deps) = self.dependencies.get(node) {
                for prereq in deps {
                    match order_map.get(prereq) {
                        None => warnings.push(ValidationEntry::MissingPrerequisite {
                            node: node.clone(),
                            missing: prereq.clone(),
                        }),
                        Some(&prereq_idx) if prereq_idx > idx => {
                            errors.push(ValidationEntry::OrderingViolation {
                                node: node.clone(),
                                prerequisite: prereq.clone(),
                            })
                        }
                        Some(_) => {}
                    }
                }
            }
        }

        // Check for cycles
        let sorted = self.topological_sort(current_order);
        if sorted.len() < self.nodes.len() {
            let sorted: BTreeSet<&PlanNode> = sorted.iter().collect();
            let stuck = self
                .nodes
                .iter()
                .filter(|n| !sorted.contains(n))
                .cloned()
                .collect();
            errors.push(ValidationEntry::Cycle(stuck));
        }

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    pub fn build_from_plan(
        catalog: &SkillCatalog,
        plan: &PlanRef<'_>,
    ) -> Result<(Self, Vec<PlanNode>)> {
        let known = plan
            .plan()
            .known_skills()
            .keys()
            .map(|id| (id.clone(), plan.plan().known_level(id)))
            .collect();
        let mut dag = Self::with_known(known);
        let mut nodes = Vec::new();
        for entry in plan.entries() {
            let node = PlanNode::new(entry.skill_id(), entry.level());
            dag.add_node(catalog, node.clone())?;
            nodes.push(node);
        }
        Ok((dag, nodes))
    }
}
