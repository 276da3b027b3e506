//! Board configuration, read from `.thoughtboard/config.yaml`.
//!
//! Every section is optional; anything missing falls back to the defaults
//! below.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::sync::{BoardLayout, Canvas, Size};

const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub board: BoardSection,
    pub canvas: CanvasConfig,
    pub notes: NotesConfig,
    pub topics: TopicsConfig,
    pub ai: AiConfig,
}

/// Where the collections live in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardSection {
    pub notes_path: String,
    pub topics_path: String,
}

impl Default for BoardSection {
    fn default() -> Self {
        Self {
            notes_path: "notes".to_string(),
            topics_path: "topics".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
            margin: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotesConfig {
    pub text_size: Size,
    pub image_size: Size,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            text_size: Size::new(200.0, 200.0),
            image_size: Size::new(160.0, 180.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TopicOrder {
    /// Oldest first, new topics at the bottom.
    #[default]
    Insertion,
    NewestFirst,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicsConfig {
    pub order: TopicOrder,
}

/// Settings for the generative AI collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub base_url: String,
    /// Model that answers "is this a single depictable noun?"
    pub text_model: String,
    /// Model that draws the icon
    pub image_model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            text_model: "gemini-2.5-flash".to_string(),
            image_model: "imagen-3.0-generate-002".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
        }
    }
}

impl AiConfig {
    /// The API key, if one is set and non-empty.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    pub fn is_configured(&self) -> bool {
        self.api_key().is_some()
    }
}

impl BoardConfig {
    /// Load `config.yaml` from the board directory, or defaults if absent.
    pub fn load(board_dir: &Path) -> Result<Self> {
        let path = board_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Write the defaults out so they can be edited.
    pub fn write_default(board_dir: &Path) -> Result<()> {
        let raw = serde_yaml::to_string(&Self::default())?;
        fs::write(board_dir.join(CONFIG_FILE), raw)?;
        Ok(())
    }

    pub fn layout(&self) -> BoardLayout {
        BoardLayout {
            canvas: Canvas {
                width: self.canvas.width,
                height: self.canvas.height,
                margin: self.canvas.margin,
            },
            text_note: self.notes.text_size,
            image_note: self.notes.image_size,
        }
    }
}
