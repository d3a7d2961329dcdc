use crate::graph::Position;
use serde::{Deserialize, Serialize};

/// Pan offset and zoom of the canvas. Drops arrive in screen coordinates and
/// are mapped into graph coordinates through this.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f64,
    pub y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

impl Viewport {
    pub fn new(x: f64, y: f64, zoom: f64) -> Self {
        Self { x, y, zoom }
    }

    fn scale(&self) -> f64 {
        if self.zoom.is_finite() && self.zoom > 0.0 {
            self.zoom
        } else {
            1.0
        }
    }

    pub fn to_graph(&self, screen: Position) -> Position {
        let scale = self.scale();
        Position::new((screen.x - self.x) / scale, (screen.y - self.y) / scale)
    }

    pub fn to_screen(&self, graph: Position) -> Position {
        let scale = self.scale();
        Position::new(graph.x * scale + self.x, graph.y * scale + self.y)
    }
}
