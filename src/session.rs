//! The list of images being annotated and which one is open.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::controller::{Annotator, Outcome};
use crate::error::Result;
use crate::history::Snapshot;
use crate::io::{annotation_path, load_annotations, save_annotations, AnnotationFile};

#[derive(Clone, Debug, Default)]
pub struct Session {
    images: Vec<PathBuf>,
    current: Option<usize>,
    modified: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the image list. Nothing is open afterwards.
    pub fn set_images(&mut self, images: Vec<PathBuf>) {
        info!("{} images in session", images.len());
        self.images = images;
        self.current = None;
        self.modified = false;
    }

    /// Switches to a new image list and opens its first image. If that image
    /// cannot be opened, the old list, position, flag and annotator stay.
    pub fn load_images(
        &mut self,
        images: Vec<PathBuf>,
        annotator: &mut Annotator,
    ) -> Result<()> {
        if images.is_empty() {
            return Ok(());
        }
        let mut staged = Session::new();
        staged.set_images(images);
        staged.open(0, annotator)?;
        *self = staged;
        Ok(())
    }

    pub fn images(&self) -> &[PathBuf] {
        &self.images
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current.map(|i| self.images[i].as_path())
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Folds an operation result into the unsaved-changes flag.
    pub fn record(&mut self, outcome: Outcome) {
        if outcome.modified {
            self.modified = true;
        }
    }

    pub fn has_next(&self) -> bool {
        match self.current {
            Some(i) => i + 1 < self.images.len(),
            None => !self.images.is_empty(),
        }
    }

    pub fn has_previous(&self) -> bool {
        self.current.is_some_and(|i| i > 0)
    }

    /// Opens image `index`: reads its size and its sidecar file, then hands
    /// both to the annotator. On error nothing changes, the index included.
    pub fn open(&mut self, index: usize, annotator: &mut Annotator) -> Result<()> {
        let Some(path) = self.images.get(index) else {
            warn!("no image at index {index}");
            return Ok(());
        };
        let (width, height) = image::image_dimensions(path)?;
        let file = load_annotations(&annotation_path(path))?;

        annotator.load_image(width, height);
        annotator.set_annotation_data(&Snapshot::from(file));
        self.current = Some(index);
        self.modified = false;
        info!("opened {}", path.display());
        Ok(())
    }

    pub fn next(&mut self, annotator: &mut Annotator) -> Result<()> {
        if !self.has_next() {
            return Ok(());
        }
        let index = self.current.map_or(0, |i| i + 1);
        self.open(index, annotator)
    }

    pub fn previous(&mut self, annotator: &mut Annotator) -> Result<()> {
        match self.current {
            Some(i) if i > 0 => self.open(i - 1, annotator),
            _ => Ok(()),
        }
    }

    /// Sidecar path of the open image.
    pub fn annotation_path(&self) -> Option<PathBuf> {
        self.current_path().map(annotation_path)
    }

    /// Writes the annotator's data beside the open image and returns the
    /// file written, or `None` when no image is open.
    pub fn save(&mut self, annotator: &Annotator) -> Result<Option<PathBuf>> {
        let Some(path) = self.annotation_path() else {
            return Ok(None);
        };
        save_annotations(&path, &AnnotationFile::from(&annotator.annotation_data()))?;
        self.modified = false;
        Ok(Some(path))
    }
}
