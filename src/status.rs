use serde::Serialize;

/// Status indicator colour shown by the host next to a node.
#[derive(Serialize, Copy, Clone, Eq, PartialEq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum Fill {
    Green,
    Red,
    Yellow,
    Grey,
}

#[derive(Serialize, Copy, Clone, Eq, PartialEq, Debug, Default)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    #[default]
    Dot,
    Ring,
}

/// Rendered node status.
#[derive(Serialize, Clone, Eq, PartialEq, Debug)]
pub struct NodeStatus {
    pub fill: Fill,
    pub shape: Shape,
    pub text: String,
}

impl NodeStatus {
    pub fn new(fill: Fill, shape: Shape, text: impl Into<String>) -> Self {
        Self {
            fill,
            shape,
            text: text.into(),
        }
    }
}
