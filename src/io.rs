//! Per-image annotation sidecar files (`<stem>_annotation.json`).

use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geometry::{Ellipse, Point};
use crate::history::Snapshot;
use crate::model::Category;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationFile {
    pub pupil_points: Vec<Point>,
    pub iris_points: Vec<Point>,
    pub eyelid_contour_points: Vec<Point>,
    pub glint_points: Vec<Point>,
    pub pupil_ellipse: Option<Ellipse>,
    pub iris_ellipse: Option<Ellipse>,
}

impl From<&Snapshot> for AnnotationFile {
    fn from(s: &Snapshot) -> Self {
        Self {
            pupil_points: s.points(Category::Pupil).to_vec(),
            iris_points: s.points(Category::Iris).to_vec(),
            eyelid_contour_points: s.points(Category::EyelidContour).to_vec(),
            glint_points: s.points(Category::Glint).to_vec(),
            pupil_ellipse: s.ellipse(Category::Pupil).copied(),
            iris_ellipse: s.ellipse(Category::Iris).copied(),
        }
    }
}

impl From<AnnotationFile> for Snapshot {
    fn from(f: AnnotationFile) -> Self {
        Snapshot {
            points: [
                f.pupil_points,
                f.iris_points,
                f.eyelid_contour_points,
                f.glint_points,
            ],
            ellipses: [f.pupil_ellipse, f.iris_ellipse],
        }
    }
}

pub fn annotation_path(image_path: &Path) -> PathBuf {
    let stem = image_path
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy();
    image_path.with_file_name(format!("{stem}_annotation.json"))
}

/// A missing file is an empty annotation, not an error.
pub fn load_annotations(path: &Path) -> Result<AnnotationFile> {
    if !path.exists() {
        return Ok(AnnotationFile::default());
    }
    let data = std::fs::read_to_string(path)?;
    let file = serde_json::from_str(&data)?;
    info!("loaded annotations from {}", path.display());
    Ok(file)
}

pub fn save_annotations(path: &Path, annotations: &AnnotationFile) -> Result<()> {
    let data = serde_json::to_string_pretty(annotations)?;
    std::fs::write(path, data)?;
    info!("saved annotations to {}", path.display());
    Ok(())
}
