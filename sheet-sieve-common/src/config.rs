use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_max_rows")]
    pub max_rows_preview: usize,
}

fn default_max_rows() -> usize {
    20
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_rows_preview: default_max_rows(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    #[serde(default = "default_null_markers")]
    pub null_markers: Vec<String>,
    #[serde(default)]
    pub default_sheet: Option<String>, // first sheet when None
}

pub fn default_null_markers() -> Vec<String> {
    ["", "NA", "N/A", "NaN", "nan", "null", "NULL", "#N/A", "None"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            null_markers: default_null_markers(),
            default_sheet: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_file_name")]
    pub file_name: String,
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
}

fn default_format() -> String {
    "xlsx".into()
}
fn default_output_dir() -> String {
    ".".into()
}
fn default_file_name() -> String {
    "filtered_table".into()
}
fn default_sheet_name() -> String {
    "FilteredData".into()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            output_dir: default_output_dir(),
            file_name: default_file_name(),
            sheet_name: default_sheet_name(),
        }
    }
}

impl ExportConfig {
    /// Default output path: `<output_dir>/<file_name>.<format>`.
    pub fn default_output_path(&self) -> PathBuf {
        PathBuf::from(&self.output_dir).join(format!("{}.{}", self.file_name, self.format))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub load: LoadConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

impl Config {
    pub fn config_path() -> PathBuf {
        if let Ok(env_path) = std::env::var("SHEET_SIEVE_CONFIG") {
            return PathBuf::from(env_path); // $SHEET_SIEVE_CONFIG overrides default config path
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sheet-sieve")
            .join("config.toml")
    }

    pub fn load() -> crate::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &std::path::Path) -> crate::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::SieveError::Config(e.to_string()))
    }

    pub fn save(&self) -> crate::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::SieveError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
