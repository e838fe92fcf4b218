//! Pointer and keyboard editing on top of the annotation state.
//!
//! [`Annotator`] is the single owner of the live [`AnnotationState`], its
//! [`History`] and the [`Viewport`]. Every call returns an [`Outcome`]
//! telling the front end what to redraw or mark as unsaved.

use log::{debug, info};

use crate::error::{AnnotationError, Result};
use crate::geometry::{find_closest_point, fit_ellipse, Ellipse, Point, MIN_FIT_POINTS};
use crate::history::{History, Snapshot};
use crate::input::{EventKind, InputEvent, Key, Modifiers, PointerButton};
use crate::model::{AnnotationState, Category};
use crate::viewport::{Viewport, SCROLL_STEP};

// ── Interaction State ───────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Mode {
    #[default]
    Idle,
    /// `last` is in screen space.
    Panning { last: Point },
    DraggingPoint,
    /// `last` is in image space.
    DraggingAllPoints { last: Point },
}

/// What the front end should do after an operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    pub redraw: bool,
    /// Annotation data changed and a snapshot was committed.
    pub modified: bool,
    pub category_changed: Option<Category>,
}

impl Outcome {
    pub const NONE: Self = Self {
        redraw: false,
        modified: false,
        category_changed: None,
    };

    pub const REDRAW: Self = Self {
        redraw: true,
        modified: false,
        category_changed: None,
    };

    pub const MODIFIED: Self = Self {
        redraw: true,
        modified: true,
        category_changed: None,
    };

    pub fn merge(self, other: Outcome) -> Outcome {
        Outcome {
            redraw: self.redraw || other.redraw,
            modified: self.modified || other.modified,
            category_changed: other.category_changed.or(self.category_changed),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FitResult {
    /// Current category has no ellipse.
    NotApplicable,
    /// Nothing to fit.
    NoPoints,
    Fitted(Ellipse),
}

impl FitResult {
    pub fn outcome(&self) -> Outcome {
        match self {
            FitResult::Fitted(_) => Outcome::MODIFIED,
            _ => Outcome::NONE,
        }
    }
}

// ── Annotator ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct Annotator {
    state: AnnotationState,
    history: History,
    viewport: Viewport,
    mode: Mode,
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new()
    }
}

impl Annotator {
    pub fn new() -> Self {
        let state = AnnotationState::new();
        let history = History::new(state.snapshot());
        Self {
            state,
            history,
            viewport: Viewport::default(),
            mode: Mode::Idle,
        }
    }

    pub fn state(&self) -> &AnnotationState {
        &self.state
    }

    /// Direct access for batch writers such as detectors. Call [`commit`]
    /// once afterwards.
    ///
    /// [`commit`]: Annotator::commit
    pub fn state_mut(&mut self) -> &mut AnnotationState {
        &mut self.state
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Pushes the current state as one history entry.
    pub fn commit(&mut self) -> Outcome {
        self.history.push(self.state.snapshot());
        Outcome::MODIFIED
    }

    /// Fresh image of `width` x `height`: empty annotations, history floor.
    pub fn load_image(&mut self, width: u32, height: u32) {
        self.viewport
            .set_image_size(Some((f64::from(width), f64::from(height))));
        self.state.clear_all();
        self.mode = Mode::Idle;
        self.history.reset(self.state.snapshot());
        info!("image loaded ({width}x{height})");
    }

    /// Replaces all annotation data and makes it the undo floor.
    pub fn set_annotation_data(&mut self, data: &Snapshot) {
        self.state.restore(data);
        self.mode = Mode::Idle;
        self.history.reset(self.state.snapshot());
    }

    pub fn annotation_data(&self) -> Snapshot {
        self.state.snapshot()
    }

    // ── Input ───────────────────────────────────────────────────────────────

    pub fn handle(&mut self, event: &InputEvent) -> Outcome {
        match event.kind {
            EventKind::Press(PointerButton::Primary) => {
                self.primary_press(event.pos, event.modifiers)
            }
            // A drag in progress owns the pointer until the primary release.
            EventKind::Press(PointerButton::Middle) => {
                if self.mode == Mode::Idle {
                    self.mode = Mode::Panning { last: event.pos };
                }
                Outcome::NONE
            }
            EventKind::Move => self.pointer_moved(event.pos),
            EventKind::Release(PointerButton::Primary) => match self.mode {
                Mode::DraggingPoint | Mode::DraggingAllPoints { .. } => {
                    self.mode = Mode::Idle;
                    self.commit()
                }
                _ => Outcome::NONE,
            },
            EventKind::Release(PointerButton::Middle) => {
                if let Mode::Panning { .. } = self.mode {
                    self.mode = Mode::Idle;
                }
                Outcome::NONE
            }
            EventKind::Press(_) | EventKind::Release(_) => Outcome::NONE,
            EventKind::Wheel { notches } => {
                if event.modifiers.ctrl {
                    self.viewport.zoom_at(notches, event.pos);
                } else {
                    self.viewport
                        .scroll_by(0.0, -f64::from(notches) * SCROLL_STEP);
                }
                Outcome::REDRAW
            }
            EventKind::Key(Key::Delete) => self.delete_selected(),
            EventKind::Key(Key::Tab) => self.cycle_category(),
            EventKind::Key(Key::ZoomIn) => {
                self.viewport.zoom_at(1, event.pos);
                Outcome::REDRAW
            }
            EventKind::Key(Key::ZoomOut) => {
                self.viewport.zoom_at(-1, event.pos);
                Outcome::REDRAW
            }
        }
    }

    fn primary_press(&mut self, screen: Point, modifiers: Modifiers) -> Outcome {
        let Some(pos) = self.viewport.image_position(screen) else {
            return Outcome::NONE;
        };

        let mut outcome = Outcome::MODIFIED;
        if let Some((category, index)) = self.hit_test(pos) {
            if self.state.set_current_category(category) {
                outcome.category_changed = Some(category);
            }
            self.state.select(index);
            self.mode = if modifiers.shift {
                Mode::DraggingAllPoints { last: pos }
            } else {
                Mode::DraggingPoint
            };
            debug!("grabbed {category} point {index}");
        } else {
            let category = self.state.current_category();
            self.state.add_point(category, pos);
            self.state.clear_selection();
        }

        outcome.merge(self.commit())
    }

    fn pointer_moved(&mut self, screen: Point) -> Outcome {
        match self.mode {
            Mode::Idle => Outcome::NONE,
            Mode::Panning { last } => {
                self.viewport.pan(screen.x - last.x, screen.y - last.y);
                self.mode = Mode::Panning { last: screen };
                Outcome::REDRAW
            }
            Mode::DraggingPoint => {
                let (Some(pos), Some(index)) =
                    (self.viewport.image_position(screen), self.state.selected())
                else {
                    return Outcome::NONE;
                };
                let category = self.state.current_category();
                self.state.move_point(category, index, pos);
                Outcome::REDRAW
            }
            Mode::DraggingAllPoints { last } => {
                let Some(pos) = self.viewport.image_position(screen) else {
                    return Outcome::NONE;
                };
                let category = self.state.current_category();
                self.state
                    .move_all_points(category, pos.x - last.x, pos.y - last.y);
                self.mode = Mode::DraggingAllPoints { last: pos };
                Outcome::REDRAW
            }
        }
    }

    /// Closest pickable point over all categories; earlier categories win
    /// exact ties.
    fn hit_test(&self, pos: Point) -> Option<(Category, usize)> {
        let zoom = self.viewport.zoom();
        let mut best: Option<(Category, usize, f64)> = None;
        for category in Category::ALL {
            let Some((index, point)) = find_closest_point(self.state.points(category), pos, zoom)
            else {
                continue;
            };
            let dist = point.distance_squared(pos);
            if best.map_or(true, |(_, _, d)| dist < d) {
                best = Some((category, index, dist));
            }
        }
        best.map(|(category, index, _)| (category, index))
    }

    // ── Commands ────────────────────────────────────────────────────────────

    pub fn delete_selected(&mut self) -> Outcome {
        let Some(point) = self.state.selected_point() else {
            return Outcome::NONE;
        };
        let category = self.state.current_category();
        self.state.delete_point(category, point);
        self.state.clear_selection();
        self.commit()
    }

    pub fn set_category(&mut self, category: Category) -> Outcome {
        if self.state.set_current_category(category) {
            Outcome {
                redraw: true,
                modified: false,
                category_changed: Some(category),
            }
        } else {
            Outcome::NONE
        }
    }

    pub fn cycle_category(&mut self) -> Outcome {
        self.set_category(self.state.current_category().next())
    }

    /// Fits the current category's ellipse. Fewer than five (but some)
    /// points is a validation error and leaves everything untouched.
    pub fn fit_annotation(&mut self) -> Result<FitResult> {
        let category = self.state.current_category();
        if !category.has_ellipse() {
            return Ok(FitResult::NotApplicable);
        }

        let points = self.state.points(category);
        match points.len() {
            0 => Ok(FitResult::NoPoints),
            count if count < MIN_FIT_POINTS => {
                Err(AnnotationError::NotEnoughPoints { category, count })
            }
            _ => {
                let ellipse = fit_ellipse(points)?.to_ellipse();
                self.state.set_ellipse(category, ellipse)?;
                self.commit();
                Ok(FitResult::Fitted(ellipse))
            }
        }
    }

    pub fn clear_points(&mut self, category: Category) -> Outcome {
        self.state.clear_points(category);
        self.commit()
    }

    pub fn clear_ellipse(&mut self, category: Category) -> Result<Outcome> {
        self.state.clear_ellipse(category)?;
        Ok(self.commit())
    }

    /// Clears the current category's ellipse when it has one.
    pub fn clear_selected_ellipse(&mut self) -> Outcome {
        let category = self.state.current_category();
        if !category.has_ellipse() {
            return Outcome::NONE;
        }
        self.clear_ellipse(category).unwrap_or(Outcome::NONE)
    }

    pub fn clear_all(&mut self) -> Outcome {
        self.state.clear_all();
        self.commit()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> Outcome {
        let Some(snapshot) = self.history.undo() else {
            return Outcome::NONE;
        };
        self.state.restore(snapshot);
        self.mode = Mode::Idle;
        debug!("undo to entry {}", self.history.index());
        Outcome::MODIFIED
    }

    pub fn redo(&mut self) -> Outcome {
        let Some(snapshot) = self.history.redo() else {
            return Outcome::NONE;
        };
        self.state.restore(snapshot);
        self.mode = Mode::Idle;
        debug!("redo to entry {}", self.history.index());
        Outcome::MODIFIED
    }
}
