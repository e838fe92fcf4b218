use thiserror::Error;

use crate::model::Category;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("too few points: need {needed}, got {got}")]
    TooFewPoints { needed: usize, got: usize },

    #[error("degenerate point set")]
    Degenerate,
}

#[derive(Error, Debug)]
pub enum AnnotationError {
    /// Ellipse operation on a category that never owns one.
    #[error("the {0} category has no ellipse")]
    NoEllipse(Category),

    #[error("at least 5 points are required to fit the {category} ellipse (have {count})")]
    NotEnoughPoints { category: Category, count: usize },

    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to load image: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, AnnotationError>;
