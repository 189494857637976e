use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::adapters::embedding::EmbeddingConfig;
use crate::core::correction::{clamp_score, DEFAULT_MIN_SCORE};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_model")]
    pub model: String,

    pub api_key: Option<String>,
    pub base_url: Option<String>,

    #[serde(default = "default_min_score")]
    pub min_score: f32,

    #[serde(default = "default_blocked_patterns")]
    pub blocked_patterns: Vec<String>,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_debug_output")]
    pub debug_output: PathBuf,

    #[serde(default)]
    pub annotate_matches: bool,
}

/// Values given on the command line; anything set wins over the config file.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub min_score: Option<f32>,
    pub blocked_patterns: Option<String>,
    pub top_k: Option<usize>,
    pub debug_output: Option<PathBuf>,
    pub annotate_matches: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: None,
            base_url: None,
            min_score: default_min_score(),
            blocked_patterns: default_blocked_patterns(),
            top_k: default_top_k(),
            debug_output: default_debug_output(),
            annotate_matches: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        for name in [".realign.yml", ".realign.yaml"] {
            let config_path = PathBuf::from(name);
            if config_path.exists() {
                return Self::load_from(&config_path);
            }
        }

        if let Some(home_dir) = dirs::home_dir() {
            let home_config = home_dir.join(".realign.yml");
            if home_config.exists() {
                return Self::load_from(&home_config);
            }
        }

        Ok(Config::default())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn merge_with_cli(&mut self, cli: CliOverrides) {
        if let Some(model) = cli.model {
            self.model = model;
        }
        if let Some(api_key) = cli.api_key {
            self.api_key = Some(api_key);
        }
        if let Some(base_url) = cli.base_url {
            self.base_url = Some(base_url);
        }
        if let Some(min_score) = cli.min_score {
            self.min_score = min_score;
        }
        if let Some(patterns) = cli.blocked_patterns {
            self.blocked_patterns = patterns.split(',').map(str::to_string).collect();
        }
        if let Some(top_k) = cli.top_k {
            self.top_k = top_k;
        }
        if let Some(debug_output) = cli.debug_output {
            self.debug_output = debug_output;
        }
        if cli.annotate_matches {
            self.annotate_matches = true;
        }
    }

    pub fn normalize(&mut self) {
        self.min_score = clamp_score(self.min_score);
        self.top_k = self.top_k.max(1);
        self.blocked_patterns = self
            .blocked_patterns
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
    }

    pub fn embedding_config(&self) -> EmbeddingConfig {
        EmbeddingConfig {
            model_name: self.model.clone(),
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
        }
    }
}

fn default_model() -> String {
    EmbeddingConfig::default().model_name
}

fn default_min_score() -> f32 {
    DEFAULT_MIN_SCORE
}

fn default_blocked_patterns() -> Vec<String> {
    vec!["/.ai/".to_string(), "llms".to_string()]
}

fn default_top_k() -> usize {
    5
}

fn default_debug_output() -> PathBuf {
    PathBuf::from("match_debug.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".realign.yml");
        std::fs::write(&path, "model: hash:128\nmin_score: 0.7\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.model, "hash:128");
        assert_eq!(config.min_score, 0.7);
        assert_eq!(config.blocked_patterns, default_blocked_patterns());
        assert_eq!(config.top_k, 5);
        assert_eq!(config.debug_output, PathBuf::from("match_debug.json"));
        assert!(!config.annotate_matches);
    }

    #[test]
    fn annotation_flag_enables_but_never_disables() {
        let mut config = Config {
            annotate_matches: true,
            ..Config::default()
        };
        config.merge_with_cli(CliOverrides::default());
        assert!(config.annotate_matches);

        let mut config = Config::default();
        config.merge_with_cli(CliOverrides {
            annotate_matches: true,
            ..CliOverrides::default()
        });
        assert!(config.annotate_matches);
    }

    #[test]
    fn cli_overrides_then_normalize() {
        let mut config = Config::default();
        config.merge_with_cli(CliOverrides {
            min_score: Some(3.0),
            blocked_patterns: Some(" Vendor/ ,, LLMS ".to_string()),
            top_k: Some(0),
            ..CliOverrides::default()
        });
        config.normalize();

        assert_eq!(config.min_score, 1.0);
        assert_eq!(config.blocked_patterns, vec!["vendor/", "llms"]);
        assert_eq!(config.top_k, 1);
        assert_eq!(config.model, "ollama:all-minilm");
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yml");
        std::fs::write(&path, "min_score: [").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
