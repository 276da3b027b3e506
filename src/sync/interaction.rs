use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// The visible drawing area. Notes must stay `margin` away from every edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
}

impl Canvas {
    /// Top-left position for a box of `size` that keeps it fully inside.
    /// When the box is wider (or taller) than the canvas allows, it pins to
    /// the margin on that axis.
    pub fn clamp(&self, position: Point, size: Size) -> Point {
        Point {
            x: clamp_axis(position.x, size.width, self.width, self.margin),
            y: clamp_axis(position.y, size.height, self.height, self.margin),
        }
    }
}

fn clamp_axis(value: f64, extent: f64, span: f64, margin: f64) -> f64 {
    let max = (span - extent - margin).max(margin);
    value.max(margin).min(max)
}

/// An in-progress drag of one entity. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    pub id: String,
    /// Pointer position relative to the entity's top-left corner.
    pub offset: Point,
    pub size: Size,
}

impl Interaction {
    /// Where the entity goes for a pointer at `pointer`, before clamping.
    pub fn target(&self, pointer: Point) -> Point {
        Point {
            x: pointer.x - self.offset.x,
            y: pointer.y - self.offset.y,
        }
    }
}
