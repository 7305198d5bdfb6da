use std::{fs, path::Path};

use anyhow::Context;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::Scalar;

pub const DEFAULT_MCU: &str = "esp32";
pub const DEFAULT_FLASH_MODE: &str = "dio";
pub const DEFAULT_F_FLASH: &str = "40000000L";
pub const DEFAULT_FLASH_SIZE: &str = "4MB";

/// Board settings, laid out like a PlatformIO board manifest so that
/// `build.mcu` lives at `board.build.mcu`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct BoardConfig {
    pub build: BoardBuild,
    pub upload: BoardUpload,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct BoardBuild {
    /// Chip passed to `--chip`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mcu: Option<String>,
    /// `qio`, `qout`, `dio` or `dout`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash_mode: Option<String>,
    /// Flash clock in Hz, e.g. `80000000L`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f_flash: Option<Scalar>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct BoardUpload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash_size: Option<String>,
}

impl BoardConfig {
    /// Reads a PlatformIO board manifest. Keys this tool does not use are
    /// ignored.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("can not open board file: {}", path.display()))?;
        let board = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse board file: {}", path.display()))?;
        Ok(board)
    }

    pub fn template() -> Self {
        Self {
            build: BoardBuild {
                mcu: Some(DEFAULT_MCU.to_string()),
                flash_mode: Some(DEFAULT_FLASH_MODE.to_string()),
                f_flash: Some(DEFAULT_F_FLASH.into()),
            },
            upload: BoardUpload {
                flash_size: Some(DEFAULT_FLASH_SIZE.to_string()),
            },
        }
    }

    /// Returns `self` with every key that is set in `top` replaced.
    pub fn overlay(self, top: BoardConfig) -> BoardConfig {
        BoardConfig {
            build: BoardBuild {
                mcu: top.build.mcu.or(self.build.mcu),
                flash_mode: top.build.flash_mode.or(self.build.flash_mode),
                f_flash: top.build.f_flash.or(self.build.f_flash),
            },
            upload: BoardUpload {
                flash_size: top.upload.flash_size.or(self.upload.flash_size),
            },
        }
    }

    pub fn mcu(&self) -> &str {
        self.build.mcu.as_deref().unwrap_or(DEFAULT_MCU)
    }

    pub fn flash_mode(&self) -> &str {
        self.build.flash_mode.as_deref().unwrap_or(DEFAULT_FLASH_MODE)
    }

    pub fn flash_size(&self) -> &str {
        self.upload.flash_size.as_deref().unwrap_or(DEFAULT_FLASH_SIZE)
    }

    /// Flash frequency in the form esptool expects: `80000000L` -> `80m`.
    pub fn flash_freq(&self) -> anyhow::Result<String> {
        let raw = self
            .build
            .f_flash
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| DEFAULT_F_FLASH.to_string());

        let hz: u64 = raw
            .trim()
            .trim_end_matches(['L', 'l'])
            .parse()
            .map_err(|_| anyhow!("invalid board flash frequency `build.f_flash`: {raw}"))?;

        Ok(format!("{}m", hz / 1_000_000))
    }
}
