use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_max_attempts() -> usize {
    100
}

fn default_true() -> bool {
    true
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GenerationSettings {
    #[serde(default)]
    pub seed: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    // Master switch; each player must also enable balancing in the world file.
    #[serde(default = "default_true")]
    pub progression_balancing: bool,
    #[serde(default)]
    pub verify_accessibility: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        GenerationSettings {
            seed: 0,
            max_attempts: default_max_attempts(),
            progression_balancing: true,
            verify_accessibility: false,
        }
    }
}

pub fn parse_generation_settings(settings_json: &str) -> Result<GenerationSettings> {
    let settings: GenerationSettings =
        serde_json::from_str(settings_json).context("Unable to parse generation settings")?;
    Ok(settings)
}

pub fn load_generation_settings(path: &Path) -> Result<GenerationSettings> {
    let settings_str = std::fs::read_to_string(path)
        .with_context(|| format!("Unable to read settings file at {}", path.display()))?;
    parse_generation_settings(&settings_str)
        .with_context(|| format!("Unable to load settings file at {}", path.display()))
}
