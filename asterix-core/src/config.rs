//! Configuration file management for asterix-decode.
//!
//! Reads/writes `~/.asterix-decode/config.yaml` with the Comm-B tunables,
//! the decoded category set, worker count and log level.

use std::path::{Path, PathBuf};

use crate::bds::BdsConfig;
use crate::message::Decoder;
use crate::types::{AsterixError, Result};
use crate::uap::Registry;

/// Full configuration structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bds: BdsConfig,
    pub decode: DecodeConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodeConfig {
    /// Categories to decode; `None` means every registered one.
    pub categories: Option<Vec<u8>>,
    pub jobs: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bds: BdsConfig::default(),
            decode: DecodeConfig {
                categories: None,
                jobs: 1,
            },
            logging: LoggingConfig {
                level: "info".into(),
            },
        }
    }
}

impl Config {
    /// Registry restricted to the configured categories.
    pub fn registry(&self) -> Registry {
        let mut registry = Registry::default();
        if let Some(categories) = &self.decode.categories {
            registry.retain(categories);
        }
        registry
    }

    /// Decoder built from this config, logging diagnostics via `tracing`.
    pub fn decoder(&self) -> Decoder {
        Decoder::new(self.registry()).with_bds(self.bds.clone())
    }
}

/// Get the config directory path (`~/.asterix-decode/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".asterix-decode")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load config from `~/.asterix-decode/config.yaml`.
///
/// Returns default config if the file doesn't exist or can't be read.
pub fn load_config() -> Config {
    let path = config_file();
    if !path.exists() {
        return Config::default();
    }
    load_config_from(&path).unwrap_or_default()
}

/// Load config from an explicit path.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| AsterixError::Config(format!("{}: {e}", path.display())))?;
    parse_config(&text).ok_or_else(|| AsterixError::Config(format!("{}: unparseable", path.display())))
}

/// Save config to `~/.asterix-decode/config.yaml`.
pub fn save_config(config: &Config) -> Result<PathBuf> {
    let path = config_file();
    save_config_to(config, &path)?;
    Ok(path)
}

/// Save config to an explicit path, creating parent directories.
pub fn save_config_to(config: &Config, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, serialize_config(config))?;
    Ok(())
}

/// Parse simple YAML-like config text.
pub fn parse_config(text: &str) -> Option<Config> {
    let mut config = Config::default();
    let mut current_section: Option<String> = None;

    for line in text.lines() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }

        let is_indented = line.starts_with("  ") || line.starts_with('\t');

        if let Some((key, val)) = stripped.split_once(':') {
            let key = key.trim();
            let val = val.trim();

            if !is_indented {
                current_section = if val.is_empty() {
                    Some(key.to_string())
                } else {
                    None
                };
            } else if let Some(ref section) = current_section {
                match section.as_str() {
                    "bds" => match key {
                        "threshold_kt" => {
                            if let Some(v) = parse_float_value(val) {
                                config.bds.threshold_kt = v;
                            }
                        }
                        "trust_declared" => {
                            if let Some(v) = parse_bool_value(val) {
                                config.bds.trust_declared = v;
                            }
                        }
                        _ => {}
                    },
                    "decode" => match key {
                        "categories" => {
                            config.decode.categories =
                                parse_string_value(val).and_then(|v| parse_categories(&v));
                        }
                        "jobs" => {
                            if let Ok(v) = val.parse::<usize>() {
                                config.decode.jobs = v.max(1);
                            }
                        }
                        _ => {}
                    },
                    "logging" => {
                        if key == "level" {
                            if let Some(v) = parse_string_value(val) {
                                config.logging.level = v;
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    Some(config)
}

/// Parse a comma-separated category list such as `"21,48"`.
pub fn parse_categories(val: &str) -> Option<Vec<u8>> {
    let cats: Vec<u8> = val
        .split(',')
        .filter_map(|c| c.trim().parse::<u8>().ok())
        .collect();
    if cats.is_empty() {
        None
    } else {
        Some(cats)
    }
}

fn parse_string_value(val: &str) -> Option<String> {
    if val == "null" || val == "~" || val.is_empty() {
        return None;
    }
    // Strip quotes
    if (val.starts_with('"') && val.ends_with('"') && val.len() >= 2)
        || (val.starts_with('\'') && val.ends_with('\'') && val.len() >= 2)
    {
        return Some(val[1..val.len() - 1].to_string());
    }
    Some(val.to_string())
}

fn parse_float_value(val: &str) -> Option<f64> {
    if val == "null" || val == "~" || val.is_empty() {
        return None;
    }
    val.parse().ok()
}

fn parse_bool_value(val: &str) -> Option<bool> {
    match val {
        "true" | "yes" | "on" => Some(true),
        "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Serialize config to YAML-like text.
pub fn serialize_config(config: &Config) -> String {
    let mut lines = vec!["# asterix-decode configuration".to_string(), String::new()];

    lines.push("bds:".into());
    lines.push(format!("  threshold_kt: {:?}", config.bds.threshold_kt));
    lines.push(format!("  trust_declared: {}", config.bds.trust_declared));
    lines.push(String::new());

    lines.push("decode:".into());
    match &config.decode.categories {
        Some(cats) => {
            let list: Vec<String> = cats.iter().map(|c| c.to_string()).collect();
            lines.push(format!("  categories: \"{}\"", list.join(",")));
        }
        None => lines.push("  categories: null".into()),
    }
    lines.push(format!("  jobs: {}", config.decode.jobs));
    lines.push(String::new());

    lines.push("logging:".into());
    lines.push(format!("  level: \"{}\"", config.logging.level));

    lines.join("\n") + "\n"
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bds::DEFAULT_THRESHOLD_KT;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bds.threshold_kt, DEFAULT_THRESHOLD_KT);
        assert!(!config.bds.trust_declared);
        assert!(config.decode.categories.is_none());
        assert_eq!(config.decode.jobs, 1);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_config() {
        let text = r#"
bds:
  threshold_kt: 80.5
  trust_declared: true

decode:
  categories: "21, 48"
  jobs: 4

logging:
  level: "debug"
"#;
        let config = parse_config(text).unwrap();
        assert_eq!(config.bds.threshold_kt, 80.5);
        assert!(config.bds.trust_declared);
        assert_eq!(config.decode.categories, Some(vec![21, 48]));
        assert_eq!(config.decode.jobs, 4);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_parse_config_null_values() {
        let text = r#"
decode:
  categories: ~
  jobs: 0

logging:
  level: null
"#;
        let config = parse_config(text).unwrap();
        assert!(config.decode.categories.is_none());
        assert_eq!(config.decode.jobs, 1);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_roundtrip() {
        let config = Config {
            bds: BdsConfig {
                threshold_kt: 120.0,
                trust_declared: true,
            },
            decode: DecodeConfig {
                categories: Some(vec![48]),
                jobs: 2,
            },
            logging: LoggingConfig {
                level: "warn".into(),
            },
        };
        let text = serialize_config(&config);
        assert_eq!(parse_config(&text).unwrap(), config);
        assert_eq!(parse_config(&serialize_config(&Config::default())).unwrap(), Config::default());
    }

    #[test]
    fn test_registry_follows_categories() {
        let mut config = Config::default();
        assert_eq!(config.registry().categories(), vec![21, 48]);
        config.decode.categories = Some(vec![48]);
        assert_eq!(config.registry().categories(), vec![48]);
        assert_eq!(config.decoder().bds(), &config.bds);
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = std::env::temp_dir().join(format!("asterix-config-{}", std::process::id()));
        let path = dir.join("config.yaml");
        let mut config = Config::default();
        config.decode.jobs = 3;
        save_config_to(&config, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap().decode.jobs, 3);
        std::fs::remove_dir_all(&dir).unwrap();

        assert!(matches!(
            load_config_from(&dir.join("missing.yaml")),
            Err(AsterixError::Config(_))
        ));
    }

    #[test]
    fn test_save_config_io_error() {
        let dir = std::env::temp_dir().join(format!("asterix-config-io-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let blocker = dir.join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let result = save_config_to(&Config::default(), &blocker.join("config.yaml"));
        assert!(matches!(result, Err(AsterixError::Io(_))));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
