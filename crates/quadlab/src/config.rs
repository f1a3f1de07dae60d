use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Settings read from a TOML file. Every key is optional.
///
/// String values go through the same parsers as the matching CLI flags.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub image: Option<PathBuf>,
    pub scene: Option<String>,
    pub size: Option<String>,
    pub title: Option<String>,
    pub backend: Option<String>,
    pub vsync: Option<String>,
    pub wrap: Option<String>,
    pub filter: Option<String>,
    pub clear_color: Option<[f64; 4]>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file at {}", path.display()))?;
        let mut config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file at {}", path.display()))?;

        // Relative image paths are resolved against the config file.
        if let (Some(image), Some(dir)) = (config.image.as_mut(), path.parent()) {
            if image.is_relative() {
                *image = dir.join(&*image);
            }
        }
        Ok(config)
    }
}
