//! Detector plugins that fill in annotation categories from an image.
//!
//! Plugins are registered explicitly at start-up, grouped by
//! [`DetectorKind`] and looked up by their display name.

mod builtin;

use std::fmt;
use std::path::Path;

use log::debug;

use crate::geometry::{Ellipse, Point};
use crate::model::Category;

pub use builtin::{DarkPupilDetector, PlaceholderEyelidDetector, PlaceholderIrisDetector};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DetectorKind {
    Pupil,
    Iris,
    Eyelid,
}

impl DetectorKind {
    /// Order in which an assist pass runs the detectors.
    pub const ALL: [DetectorKind; 3] = [
        DetectorKind::Pupil,
        DetectorKind::Iris,
        DetectorKind::Eyelid,
    ];

    pub fn category(self) -> Category {
        match self {
            DetectorKind::Pupil => Category::Pupil,
            DetectorKind::Iris => Category::Iris,
            DetectorKind::Eyelid => Category::EyelidContour,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DetectorKind::Pupil => "Pupil",
            DetectorKind::Iris => "Iris",
            DetectorKind::Eyelid => "Eyelid",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a detector found. Pupil and iris detectors return an ellipse with
/// boundary points, eyelid detectors a contour.
#[derive(Clone, Debug, PartialEq)]
pub enum Detection {
    Ellipse { ellipse: Ellipse, points: Vec<Point> },
    Contour(Vec<Point>),
}

pub trait Detector: Send + Sync {
    /// Identity used in settings and menus.
    fn name(&self) -> &str;

    fn detect(&self, image_path: &Path) -> anyhow::Result<Detection>;
}

#[derive(Default)]
pub struct DetectorRegistry {
    detectors: [Vec<Box<dyn Detector>>; 3],
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the detectors that ship with the application.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(DetectorKind::Pupil, Box::new(DarkPupilDetector::default()));
        registry.register(DetectorKind::Iris, Box::new(PlaceholderIrisDetector));
        registry.register(DetectorKind::Eyelid, Box::new(PlaceholderEyelidDetector));
        registry
    }

    /// Adds a detector; one with the same name and kind is replaced in place.
    pub fn register(&mut self, kind: DetectorKind, detector: Box<dyn Detector>) {
        debug!("registering {kind} detector {:?}", detector.name());
        let slot = &mut self.detectors[kind.index()];
        match slot.iter_mut().find(|d| d.name() == detector.name()) {
            Some(existing) => *existing = detector,
            None => slot.push(detector),
        }
    }

    pub fn get(&self, kind: DetectorKind, name: &str) -> Option<&dyn Detector> {
        self.detectors[kind.index()]
            .iter()
            .find(|d| d.name() == name)
            .map(|d| d.as_ref())
    }

    /// Names in registration order.
    pub fn names(&self, kind: DetectorKind) -> Vec<&str> {
        self.detectors[kind.index()].iter().map(|d| d.name()).collect()
    }
}

impl fmt::Debug for DetectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for kind in DetectorKind::ALL {
            map.entry(&kind, &self.names(kind));
        }
        map.finish()
    }
}
