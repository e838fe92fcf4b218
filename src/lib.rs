//! Core of the eye image annotation tool.
//!
//! Points are placed per [`Category`](model::Category) on an eye image,
//! pupil and iris outlines are fitted as ellipses, every edit is undoable,
//! and pluggable detectors can pre-fill the annotation in one step. The
//! egui front end in the binary only translates events and draws; all
//! editing rules live here.

pub mod assist;
pub mod controller;
pub mod detector;
pub mod error;
pub mod geometry;
pub mod history;
pub mod input;
pub mod io;
pub mod model;
pub mod session;
pub mod settings;
pub mod viewport;

pub use controller::{Annotator, FitResult, Outcome};
pub use error::{AnnotationError, GeometryError, Result};
pub use geometry::{Ellipse, Point};
pub use model::{AnnotationState, Category};
