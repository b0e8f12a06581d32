use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Position { x, y }
    }
}

/// Placement of an agent instance on the workflow canvas. Instances without a
/// node are "orphans": they stay in storage but do not count toward a
/// prototype's deployed impact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasNode {
    pub node_id: String,
    pub instance_id: String,
    pub position: Position,
}
