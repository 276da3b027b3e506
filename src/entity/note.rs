// src/entity/note.rs
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{f64_field, str_field, Entity};

/// What a note holds. Decides rendering and default size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    #[default]
    Text,
    /// `content` is an image data URI.
    Image,
}

impl std::fmt::Display for NoteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoteKind::Text => write!(f, "text"),
            NoteKind::Image => write!(f, "image"),
        }
    }
}

impl std::str::FromStr for NoteKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(NoteKind::Text),
            "image" => Ok(NoteKind::Image),
            _ => Err(format!("Invalid note type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NoteColor {
    #[default]
    Yellow,
    Green,
    Pink,
    Blue,
    Purple,
    Orange,
}

impl NoteColor {
    pub const PALETTE: [NoteColor; 6] = [
        NoteColor::Yellow,
        NoteColor::Green,
        NoteColor::Pink,
        NoteColor::Blue,
        NoteColor::Purple,
        NoteColor::Orange,
    ];

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::PALETTE.choose(rng).copied().unwrap_or_default()
    }
}

impl std::fmt::Display for NoteColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoteColor::Yellow => write!(f, "yellow"),
            NoteColor::Green => write!(f, "green"),
            NoteColor::Pink => write!(f, "pink"),
            NoteColor::Blue => write!(f, "blue"),
            NoteColor::Purple => write!(f, "purple"),
            NoteColor::Orange => write!(f, "orange"),
        }
    }
}

impl std::str::FromStr for NoteColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yellow" => Ok(NoteColor::Yellow),
            "green" => Ok(NoteColor::Green),
            "pink" => Ok(NoteColor::Pink),
            "blue" => Ok(NoteColor::Blue),
            "purple" => Ok(NoteColor::Purple),
            "orange" => Ok(NoteColor::Orange),
            _ => Err(format!("Invalid note color: {}", s)),
        }
    }
}

/// Tilt in whole degrees. Picked once at creation so reloads look the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Rotation(pub i64);

impl Rotation {
    pub const PALETTE: [Rotation; 6] = [
        Rotation(-2),
        Rotation(2),
        Rotation(-1),
        Rotation(1),
        Rotation(-3),
        Rotation(3),
    ];

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::PALETTE.choose(rng).copied().unwrap_or_default()
    }
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.0)
    }
}

/// A sticky note on the whiteboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NoteKind,
    pub content: String,
    pub x: f64,
    pub y: f64,
    pub color: NoteColor,
    pub rotation: Rotation,
    pub z_index: i64,
    pub timestamp: String,
}

impl Note {
    /// A text note at the origin with neutral cosmetics.
    pub fn text(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: NoteKind::Text,
            content: content.into(),
            x: 0.0,
            y: 0.0,
            color: NoteColor::default(),
            rotation: Rotation::default(),
            z_index: 0,
            timestamp: String::new(),
        }
    }
}

impl Entity for Note {
    fn id(&self) -> &str {
        &self.id
    }

    fn decode(id: &str, record: &Value) -> Option<Self> {
        let record = record.as_object()?;

        let kind = record
            .get("type")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        let color = record
            .get("color")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        let rotation = record
            .get("rotation")
            .and_then(Value::as_i64)
            .map(Rotation)
            .unwrap_or_default();

        let z_index = record
            .get("zIndex")
            .and_then(Value::as_i64)
            .unwrap_or_default();

        Some(Note {
            id: id.to_string(),
            kind,
            content: str_field(record, "content"),
            x: f64_field(record, "x"),
            y: f64_field(record, "y"),
            color,
            rotation,
            z_index,
            timestamp: str_field(record, "timestamp"),
        })
    }

    fn encode(&self) -> Value {
        json!({
            "content": self.content,
            "type": self.kind.to_string(),
            "x": self.x,
            "y": self.y,
            "color": self.color.to_string(),
            "rotation": self.rotation.0,
            "zIndex": self.z_index,
            "timestamp": self.timestamp,
        })
    }
}
