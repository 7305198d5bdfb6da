use std::{
    collections::BTreeMap,
    fmt::Display,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::image::ImageItem;

pub mod board;

pub use board::{BoardBuild, BoardConfig, BoardUpload};

/// Default configuration file name, looked up in the project directory.
pub const CONFIG_FILE_NAME: &str = ".mergebin.toml";

pub const DEFAULT_OBJCOPY: &str = "esptool.py";
pub const DEFAULT_APP_OFFSET: &str = "0x10000";
pub const DEFAULT_BUILD_DIR: &str = "$PROJECT_DIR/build";
pub const DEFAULT_PROGNAME: &str = "firmware";

/// A configuration value that may be written either as a string or as an
/// integer, e.g. `app_offset = "0x10000"` or `app_offset = 65536`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Str(String),
}

impl Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

/// Project configuration, read from `.mergebin.toml`.
///
/// Every key is optional. Absent keys fall back to the same defaults the
/// PlatformIO espressif32 builder uses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ProjectConfig {
    /// Merge tool (`OBJCOPY`), `esptool.py` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objcopy: Option<String>,
    /// Interpreter used to launch the merge tool (`PYTHONEXE`).
    /// An empty string runs the tool directly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python_exe: Option<String>,
    /// Application flash offset (`ESP32_APP_OFFSET`), `0x10000` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_offset: Option<Scalar>,
    /// Build output directory (`BUILD_DIR`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_dir: Option<String>,
    /// Program name (`PROGNAME`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progname: Option<String>,
    /// PlatformIO board manifest (JSON) to read board settings from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_file: Option<String>,
    /// Extra images (`FLASH_EXTRA_IMAGES`): offset/path pairs, may be nested
    pub flash_extra_images: Vec<ImageItem>,
    /// Additional variables for `$VAR` expansion
    pub vars: BTreeMap<String, String>,
    /// Inline board settings, override `board_file`
    pub board: BoardConfig,
}

impl ProjectConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|_| anyhow!("can not open config file: {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string(self)?;
        fs::write(path, content)
            .with_context(|| format!("failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Writes the JSON schema of the configuration next to `config_path`.
    pub fn write_schema(config_path: &Path) -> anyhow::Result<PathBuf> {
        let schema_path = schema_path_for(config_path);
        let schema = schemars::schema_for!(ProjectConfig);
        let content = serde_json::to_string_pretty(&schema)?;
        fs::write(&schema_path, content)
            .with_context(|| format!("failed to write schema: {}", schema_path.display()))?;
        Ok(schema_path)
    }

    /// Configuration written by `mergebin defconfig`: the stock ESP32 layout
    /// with bootloader at `0x1000` and partition table at `0x8000`.
    pub fn template() -> Self {
        Self {
            objcopy: Some(DEFAULT_OBJCOPY.to_string()),
            python_exe: None,
            app_offset: Some(DEFAULT_APP_OFFSET.into()),
            build_dir: Some(DEFAULT_BUILD_DIR.to_string()),
            progname: Some(DEFAULT_PROGNAME.to_string()),
            board_file: None,
            flash_extra_images: vec![
                ImageItem::from("0x1000"),
                ImageItem::from("$BUILD_DIR/bootloader.bin"),
                ImageItem::from("0x8000"),
                ImageItem::from("$BUILD_DIR/partitions.bin"),
            ],
            vars: BTreeMap::new(),
            board: BoardConfig::template(),
        }
    }

    pub fn objcopy(&self) -> &str {
        self.objcopy.as_deref().unwrap_or(DEFAULT_OBJCOPY)
    }

    pub fn app_offset(&self) -> String {
        self.app_offset
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| DEFAULT_APP_OFFSET.to_string())
    }
}

/// `.mergebin.toml` -> `.mergebin.schema.json`
pub fn schema_path_for(config_path: &Path) -> PathBuf {
    let stem = config_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "config".to_string());
    config_path.with_file_name(format!("{stem}.schema.json"))
}
