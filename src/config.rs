use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::get_supported_sources;
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::join::JoinMode;
use crate::pipeline::processing::schema::SourceSchema;

/// Default config file, overridable with `--config` or `PIPELINE_CONFIG`.
pub const DEFAULT_CONFIG_PATH: &str = "pipeline.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub paths: PathsConfig,
    pub sources: BTreeMap<String, SourceConfig>,
    #[serde(default)]
    pub join: JoinConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    pub database: PathBuf,
    pub output_dir: PathBuf,
    pub country_lookup: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Raw CSV export for this source
    pub path: PathBuf,
    /// Optional TOML file replacing the built-in cleaning rules
    pub schema: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoinConfig {
    #[serde(default)]
    pub mode: JoinMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub directory: PathBuf,
    #[serde(default = "default_log_file")]
    pub file_name: String,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_file() -> String {
    "pipeline.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_log_dir(),
            file_name: default_log_file(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Relative paths in the file are relative to the file itself.
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        config.validate()?;
        Ok(config)
    }

    fn rebase(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        join(&mut self.paths.database);
        join(&mut self.paths.output_dir);
        join(&mut self.paths.country_lookup);
        join(&mut self.logging.directory);
        for source in self.sources.values_mut() {
            join(&mut source.path);
            if let Some(schema) = source.schema.as_mut() {
                join(schema);
            }
        }
    }

    /// Every built-in source must be configured and no unknown ids may appear.
    pub fn validate(&self) -> Result<()> {
        let supported = get_supported_sources();
        for id in &supported {
            if !self.sources.contains_key(*id) {
                return Err(PipelineError::Config(format!(
                    "Missing [sources.{}] section in configuration",
                    id
                )));
            }
        }
        if let Some(unknown) = self.sources.keys().find(|k| !supported.contains(&k.as_str())) {
            return Err(PipelineError::UnknownSource(unknown.clone()));
        }
        if self.logging.file_name.trim().is_empty() {
            return Err(PipelineError::Config("logging.file_name must not be empty".into()));
        }
        Ok(())
    }

    pub fn source(&self, source_id: &str) -> Result<&SourceConfig> {
        self.sources
            .get(source_id)
            .ok_or_else(|| PipelineError::UnknownSource(source_id.to_string()))
    }

    /// Schema override for a source, if one is configured.
    pub fn schema_override(&self, source_id: &str) -> Result<Option<SourceSchema>> {
        match &self.source(source_id)?.schema {
            Some(path) => {
                let schema = SourceSchema::from_toml_file(path)?;
                if schema.source_id != source_id {
                    return Err(PipelineError::Config(format!(
                        "Schema file '{}' is for source '{}', expected '{}'",
                        path.display(),
                        schema.source_id,
                        source_id
                    )));
                }
                Ok(Some(schema))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [paths]
        database = "out/pipeline.db"
        output_dir = "out"
        country_lookup = "data/country_lookup.csv"

        [sources.mass_mobilization]
        path = "data/mm.csv"

        [sources.polity]
        path = "data/polity.csv"

        [sources.dpi]
        path = "data/dpi.csv"

        [join]
        mode = "left_outer"
    "#;

    #[test]
    fn test_load_rebases_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        fs::write(&path, SAMPLE).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.paths.database, dir.path().join("out/pipeline.db"));
        assert_eq!(config.source("dpi").unwrap().path, dir.path().join("data/dpi.csv"));
        assert_eq!(config.join.mode, JoinMode::LeftOuter);
        assert_eq!(config.logging.file_name, "pipeline.log");
    }

    #[test]
    fn test_missing_source_section_fails_validation() {
        let text = SAMPLE.replace("[sources.dpi]\n        path = \"data/dpi.csv\"", "");
        let config: Config = toml::from_str(&text).unwrap();
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_unknown_source_fails_validation() {
        let text = format!("{}\n[sources.vdem]\npath = \"v.csv\"\n", SAMPLE);
        let config: Config = toml::from_str(&text).unwrap();
        assert!(matches!(config.validate(), Err(PipelineError::UnknownSource(_))));
    }
}
