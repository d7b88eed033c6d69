use crate::error::{AppError, Result};
use crate::output_formats::find_exclude_preset;
use byte_unit::Byte;
use indexmap::IndexSet;
use log;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_CONFIG_DIR: &str = ".codedigest";
pub const DEFAULT_CONFIG_FILENAME: &str = "codedigest.toml";
pub const DEFAULT_OUTPUT_DIR_NAME: &str = "CodeDigest";
pub const FALLBACK_PROJECT_NAME: &str = "Project";

/// Token budgets offered as shorthands in the CLI help.
pub const COMMON_TOKEN_LIMITS: [usize; 3] = [32_000, 128_000, 200_000];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub transform: TransformConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub source_root: Option<PathBuf>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub presets: Vec<String>,
    #[serde(default = "default_true")]
    pub use_gitignore: bool,
    #[serde(default)]
    pub custom_ignore_file: Option<PathBuf>,
    /// 0 means unlimited.
    #[serde(default)]
    pub max_file_size_kb: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct TransformConfig {
    #[serde(default)]
    pub remove_comments: bool,
    #[serde(default)]
    pub compact_mode: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub skip_tree: bool,
    /// Maximum tokens per part; 0 writes a single unnumbered digest.
    #[serde(default)]
    pub token_limit: usize,
    #[serde(default = "default_true")]
    pub count_tokens: bool,
    #[serde(default)]
    pub include_timestamp: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Plain,
    Markdown,
    Xml,
}

fn default_true() -> bool {
    true
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            presets: Vec::new(),
            use_gitignore: default_true(),
            custom_ignore_file: None,
            max_file_size_kb: 0,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            skip_tree: false,
            token_limit: 0,
            count_tokens: default_true(),
            include_timestamp: false,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Plain => "plain",
            OutputFormat::Markdown => "markdown",
            OutputFormat::Xml => "xml",
        };
        f.write_str(name)
    }
}

impl FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "plain" | "text" | "txt" => Ok(OutputFormat::Plain),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "xml" => Ok(OutputFormat::Xml),
            other => Err(AppError::InvalidArgument(format!(
                "Unknown output format '{}'. Use plain, markdown or xml.",
                other
            ))),
        }
    }
}

impl Config {
    pub fn resolve_config_path(
        project_root: &Path,
        cli_config_file: Option<&Path>,
        cli_disable_config: bool,
    ) -> Result<Option<PathBuf>> {
        if cli_disable_config {
            log::debug!("Config file loading disabled via CLI flag.");
            return Ok(None);
        }

        match cli_config_file {
            Some(path) => {
                let path = expand_path(path);
                if !path.is_file() {
                    return Err(AppError::Config(format!(
                        "Specified config file not found at path: {}",
                        path.display()
                    )));
                }
                log::debug!("Using specified config file path: {}", path.display());
                Ok(Some(path))
            }
            None => {
                let default_path = project_root
                    .join(DEFAULT_CONFIG_DIR)
                    .join(DEFAULT_CONFIG_FILENAME);
                if default_path.is_file() {
                    log::debug!("Using default config file path: {}", default_path.display());
                    Ok(Some(default_path))
                } else {
                    log::debug!(
                        "No config file specified and default not found at: {}",
                        default_path.display()
                    );
                    Ok(None)
                }
            }
        }
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        log::info!("Loading configuration from: {}", config_path.display());
        let toml_content = fs::read_to_string(config_path).map_err(|e| AppError::FileRead {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        toml::from_str::<Config>(&toml_content).map_err(|e| {
            AppError::TomlParse(format!(
                "Error parsing config file '{}': {}. Check TOML syntax and structure.",
                config_path.display(),
                e
            ))
        })
    }

    /// Explicit exclude patterns followed by the patterns of every enabled
    /// preset, de-duplicated with first occurrence winning.
    pub fn effective_exclude_patterns(&self) -> Result<Vec<String>> {
        let mut patterns: IndexSet<String> = self
            .filters
            .exclude
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect();

        for name in &self.filters.presets {
            let preset = find_exclude_preset(name).ok_or_else(|| {
                AppError::Config(format!("Unknown exclude preset '{}'.", name))
            })?;
            log::trace!(
                "Applying preset '{}' ({} patterns)",
                preset.name,
                preset.patterns.len()
            );
            patterns.extend(preset.patterns.iter().cloned());
        }
        Ok(patterns.into_iter().collect())
    }

    pub fn effective_project_name(&self, root_name: Option<&str>) -> String {
        self.general
            .project_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| {
                root_name
                    .filter(|n| !n.is_empty())
                    .map(String::from)
            })
            .unwrap_or_else(|| FALLBACK_PROJECT_NAME.to_string())
    }

    pub fn is_split_enabled(&self) -> bool {
        self.output.token_limit > 0
    }
}

pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
}

/// Accepts `128000`, `128k`, `1m` (case-insensitive). `0` disables splitting.
pub fn parse_token_limit(input: &str) -> Result<usize> {
    let trimmed = input.trim().to_lowercase().replace(['_', ','], "");
    let (digits, multiplier) = if let Some(stripped) = trimmed.strip_suffix('k') {
        (stripped, 1_000)
    } else if let Some(stripped) = trimmed.strip_suffix('m') {
        (stripped, 1_000_000)
    } else {
        (trimmed.as_str(), 1)
    };
    digits
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| {
            AppError::InvalidArgument(format!(
                "Invalid token limit '{}'. Use a number like 128000 or 128k.",
                input
            ))
        })
}

/// A bare number is taken as KB; anything else goes through byte-unit and is
/// converted to whole KiB.
pub fn parse_file_size_kb(input: &str) -> Result<u64> {
    let trimmed = input.trim();
    if let Ok(kb) = trimmed.parse::<u64>() {
        return Ok(kb);
    }
    let byte_value = Byte::from_str(trimmed).map_err(|e| {
        AppError::InvalidArgument(format!(
            "Invalid file size '{}': {}. Use KB, MiB, etc.",
            input, e
        ))
    })?;
    let bytes: u128 = byte_value.into();
    u64::try_from(bytes / 1024).map_err(|_| {
        AppError::InvalidArgument(format!("File size '{}' is too large.", input))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert!(config.filters.use_gitignore);
        assert!(config.output.count_tokens);
        assert_eq!(config.output.token_limit, 0);
        assert_eq!(config.filters.max_file_size_kb, 0);
        assert_eq!(config.output.format, OutputFormat::Plain);
        assert!(!config.is_split_enabled());
    }

    #[test]
    fn parses_sectioned_toml() {
        let config: Config = toml::from_str(
            r#"
            [general]
            project_name = "demo"

            [filters]
            exclude = ["*.log", "target"]
            use_gitignore = false
            max_file_size_kb = 256

            [transform]
            remove_comments = true

            [output]
            format = "markdown"
            token_limit = 32000
            "#,
        )
        .unwrap();
        assert_eq!(config.general.project_name.as_deref(), Some("demo"));
        assert_eq!(config.filters.exclude, vec!["*.log", "target"]);
        assert!(!config.filters.use_gitignore);
        assert_eq!(config.filters.max_file_size_kb, 256);
        assert!(config.transform.remove_comments);
        assert!(!config.transform.compact_mode);
        assert_eq!(config.output.format, OutputFormat::Markdown);
        assert_eq!(config.output.token_limit, 32000);
        assert!(config.output.count_tokens);
    }

    #[test]
    fn rejects_unknown_fields() {
        let parsed = toml::from_str::<Config>("[output]\nbogus = 1\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn presets_append_after_explicit_patterns_without_duplicates() {
        let mut config = Config::default();
        config.filters.exclude = vec!["build".to_string(), "*.tmp".to_string()];
        config.filters.presets = vec!["Web".to_string()];
        let patterns = config.effective_exclude_patterns().unwrap();
        assert_eq!(patterns[0], "build");
        assert_eq!(patterns[1], "*.tmp");
        assert!(patterns.contains(&"node_modules".to_string()));
        assert_eq!(patterns.iter().filter(|p| *p == "build").count(), 1);
    }

    #[test]
    fn unknown_preset_is_config_error() {
        let mut config = Config::default();
        config.filters.presets = vec!["cobol".to_string()];
        assert!(matches!(
            config.effective_exclude_patterns(),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn project_name_falls_back_to_root_then_default() {
        let mut config = Config::default();
        assert_eq!(config.effective_project_name(Some("repo")), "repo");
        assert_eq!(config.effective_project_name(None), FALLBACK_PROJECT_NAME);
        config.general.project_name = Some("Named".to_string());
        assert_eq!(config.effective_project_name(Some("repo")), "Named");
    }

    #[test]
    fn token_limit_shorthands() {
        assert_eq!(parse_token_limit("128k").unwrap(), 128_000);
        assert_eq!(parse_token_limit("32000").unwrap(), 32_000);
        assert_eq!(parse_token_limit("1M").unwrap(), 1_000_000);
        assert_eq!(parse_token_limit("0").unwrap(), 0);
        assert!(parse_token_limit("lots").is_err());
    }

    #[test]
    fn file_size_accepts_bare_kb_and_units() {
        assert_eq!(parse_file_size_kb("512").unwrap(), 512);
        assert_eq!(parse_file_size_kb("2MiB").unwrap(), 2048);
        assert_eq!(parse_file_size_kb("4KiB").unwrap(), 4);
        assert!(parse_file_size_kb("huge").is_err());
    }

    #[test]
    fn output_format_from_str() {
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!("XML".parse::<OutputFormat>().unwrap(), OutputFormat::Xml);
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Plain);
        assert!("json".parse::<OutputFormat>().is_err());
    }
}
