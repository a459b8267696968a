use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum LayerRefError {
    ShapeMismatch {
        left: Vec<i64>,
        right: Vec<i64>,
    },
    TensorCreateError(String),
    InvalidPermutation {
        order: Vec<usize>,
        rank: usize,
    },
    CaseTable(String),
    UnknownGroup(String),
    Template(String),
    Config(String),
}

impl fmt::Display for LayerRefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerRefError::ShapeMismatch { left, right } => write!(
                f,
                "shapes {:?} and {:?} cannot be broadcast together",
                left, right
            ),
            LayerRefError::TensorCreateError(msg) => write!(f, "cannot create tensor: {}", msg),
            LayerRefError::InvalidPermutation { order, rank } => write!(
                f,
                "{:?} is not a permutation of the axes of a rank {} tensor",
                order, rank
            ),
            LayerRefError::CaseTable(msg) => write!(f, "invalid case table: {}", msg),
            LayerRefError::UnknownGroup(name) => write!(f, "case group `{}` not found", name),
            LayerRefError::Template(msg) => write!(f, "template error: {}", msg),
            LayerRefError::Config(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for LayerRefError {}
