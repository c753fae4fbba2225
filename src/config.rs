use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::{PlannerError, Result};

const ENV_PREFIX: &str = "SKILLPLANNER_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerStart {
    /// Every attribute at the floor, the whole budget unallocated.
    Baseline,
    /// Budget dealt out one point at a time in attribute order.
    #[default]
    Even,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub base_attribute: i64,
    pub remap_points: i64,
    pub max_points_per_attribute: i64,
    pub iteration_cap: usize,
    pub start: OptimizerStart,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            base_attribute: 17,
            remap_points: 14,
            max_points_per_attribute: 10,
            iteration_cap: 1000,
            start: OptimizerStart::Even,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub optimizer: OptimizerConfig,
}

impl PlannerConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| PlannerError::Configuration {
            reason: e.to_string(),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| PlannerError::Configuration {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Applies `SKILLPLANNER_*` overrides resolved through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optimizer = &mut self.optimizer;
        if let Some(value) = parse_override(&lookup, "REMAP_POINTS")? {
            optimizer.remap_points = value;
        }
        if let Some(value) = parse_override(&lookup, "BASE_ATTRIBUTE")? {
            optimizer.base_attribute = value;
        }
        if let Some(value) = parse_override(&lookup, "MAX_POINTS_PER_ATTRIBUTE")? {
            optimizer.max_points_per_attribute = value;
        }
        if let Some(value) = parse_override(&lookup, "ITERATION_CAP")? {
            optimizer.iteration_cap = value;
        }
        Ok(())
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Defaults, then the TOML file if given, then `.env` and process
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if let Ok(env_file) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", env_file.display());
        }
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let optimizer = &self.optimizer;
        if optimizer.remap_points < 0 {
            return Err(PlannerError::Configuration {
                reason: format!("remap_points must not be negative, got {}", optimizer.remap_points),
            });
        }
        if optimizer.max_points_per_attribute < 0 {
            return Err(PlannerError::Configuration {
                reason: format!(
                    "max_points_per_attribute must not be negative, got {}",
                    optimizer.max_points_per_attribute
                ),
            });
        }
        Ok(())
    }
}

fn parse_override<F, T>(lookup: &F, name: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let key = format!("{}{}", ENV_PREFIX, name);
    match lookup(&key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| PlannerError::Configuration {
                reason: format!("{}='{}': {}", key, raw, e),
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PlannerConfig::default();
        assert_eq!(config.optimizer.base_attribute, 17);
        assert_eq!(config.optimizer.remap_points, 14);
        assert_eq!(config.optimizer.max_points_per_attribute, 10);
        assert_eq!(config.optimizer.iteration_cap, 1000);
        assert_eq!(config.optimizer.start, OptimizerStart::Even);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PlannerConfig::from_toml_str(
            r#"
            [optimizer]
            remap_points = 20
            start = "baseline"
            "#,
        )
        .unwrap();
        assert_eq!(config.optimizer.remap_points, 20);
        assert_eq!(config.optimizer.start, OptimizerStart::Baseline);
        assert_eq!(config.optimizer.base_attribute, 17);

        assert_eq!(PlannerConfig::from_toml_str("").unwrap(), PlannerConfig::default());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            PlannerConfig::from_toml_str("[optimizer]\nstart = \"sideways\""),
            Err(PlannerError::Configuration { .. })
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[optimizer]\niteration_cap = 5").unwrap();
        let config = PlannerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.optimizer.iteration_cap, 5);

        let dir = tempfile::tempdir().unwrap();
        assert!(PlannerConfig::from_file(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("SKILLPLANNER_REMAP_POINTS", "12"),
            ("SKILLPLANNER_ITERATION_CAP", " 50 "),
        ]
        .into_iter()
        .collect();
        let mut config = PlannerConfig::default();
        config
            .apply_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.optimizer.remap_points, 12);
        assert_eq!(config.optimizer.iteration_cap, 50);
        assert_eq!(config.optimizer.max_points_per_attribute, 10);

        let mut config = PlannerConfig::default();
        let result = config.apply_overrides(|name| {
            (name == "SKILLPLANNER_BASE_ATTRIBUTE").then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(PlannerError::Configuration { .. })));
    }

    #[test]
    fn test_validate_rejects_negative_budget() {
        let mut config = PlannerConfig::default();
        config.optimizer.remap_points = -1;
        assert!(config.validate().is_err());
    }
}
