use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{AnnotationError, Result};
use crate::geometry::{Ellipse, Point};
use crate::history::Snapshot;

// ── Categories ──────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[default]
    Pupil,
    Iris,
    EyelidContour,
    Glint,
}

impl Category {
    /// Scan order for cross-category hit testing.
    pub const ALL: [Category; 4] = [
        Category::Pupil,
        Category::Iris,
        Category::EyelidContour,
        Category::Glint,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Pupil => "pupil",
            Category::Iris => "iris",
            Category::EyelidContour => "eyelid_contour",
            Category::Glint => "glint",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Pupil => "Pupil",
            Category::Iris => "Iris",
            Category::EyelidContour => "Eyelid",
            Category::Glint => "Glint",
        }
    }

    /// Only pupil and iris carry a fitted ellipse.
    pub fn has_ellipse(self) -> bool {
        matches!(self, Category::Pupil | Category::Iris)
    }

    /// Tab order. Glint is left out of the cycle.
    pub fn next(self) -> Self {
        match self {
            Category::Pupil => Category::Iris,
            Category::Iris => Category::EyelidContour,
            Category::EyelidContour | Category::Glint => Category::Pupil,
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    pub(crate) fn ellipse_index(self) -> Result<usize> {
        match self {
            Category::Pupil => Ok(0),
            Category::Iris => Ok(1),
            other => Err(AnnotationError::NoEllipse(other)),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── State ───────────────────────────────────────────────────────────────────

/// Live annotation data for one image plus the transient selection.
///
/// Mutations never touch the undo history; the owner decides when a change
/// is committed so several edits can share one snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnnotationState {
    points: [Vec<Point>; 4],
    ellipses: [Option<Ellipse>; 2],
    current: Category,
    selected: Option<usize>,
}

impl AnnotationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self, category: Category) -> &[Point] {
        &self.points[category.index()]
    }

    /// `None` for categories without an ellipse as well as for unset ones.
    pub fn ellipse(&self, category: Category) -> Option<&Ellipse> {
        category
            .ellipse_index()
            .ok()
            .and_then(|i| self.ellipses[i].as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.points.iter().all(Vec::is_empty) && self.ellipses.iter().all(Option::is_none)
    }

    pub fn add_point(&mut self, category: Category, point: Point) {
        self.points[category.index()].push(point);
        debug!("added {category} point ({:.1}, {:.1})", point.x, point.y);
    }

    /// Out-of-range indices are ignored.
    pub fn move_point(&mut self, category: Category, index: usize, point: Point) {
        if let Some(p) = self.points[category.index()].get_mut(index) {
            *p = point;
        }
    }

    /// Removes the first point equal to `point`, if any.
    pub fn delete_point(&mut self, category: Category, point: Point) -> bool {
        let points = &mut self.points[category.index()];
        let Some(index) = points.iter().position(|p| *p == point) else {
            return false;
        };
        points.remove(index);

        if category == self.current {
            self.selected = match self.selected {
                Some(s) if s == index => None,
                Some(s) if s > index => Some(s - 1),
                other => other,
            };
        }
        debug!("deleted {category} point {index}");
        true
    }

    pub fn move_all_points(&mut self, category: Category, dx: f64, dy: f64) {
        for p in &mut self.points[category.index()] {
            *p = p.translated(dx, dy);
        }
    }

    /// Replaces the whole point sequence of a category.
    pub fn set_points(&mut self, category: Category, points: Vec<Point>) {
        self.points[category.index()] = points;
        if category == self.current {
            self.selected = None;
        }
    }

    /// Empties the points and, for pupil and iris, the ellipse as well.
    pub fn clear_points(&mut self, category: Category) {
        self.set_points(category, Vec::new());
        if let Ok(i) = category.ellipse_index() {
            self.ellipses[i] = None;
        }
        debug!("cleared {category} points");
    }

    pub fn clear_ellipse(&mut self, category: Category) -> Result<()> {
        self.ellipses[category.ellipse_index()?] = None;
        debug!("cleared {category} ellipse");
        Ok(())
    }

    pub fn set_ellipse(&mut self, category: Category, ellipse: Ellipse) -> Result<()> {
        self.ellipses[category.ellipse_index()?] = Some(ellipse);
        debug!(
            "set {category} ellipse centre ({:.1}, {:.1}) size {:.1}x{:.1} angle {:.1}",
            ellipse.center.x, ellipse.center.y, ellipse.size.0, ellipse.size.1, ellipse.angle
        );
        Ok(())
    }

    pub fn clear_all(&mut self) {
        for category in Category::ALL {
            self.clear_points(category);
        }
    }

    pub fn current_category(&self) -> Category {
        self.current
    }

    /// Returns whether the category actually changed. The selection only
    /// survives when it already belongs to `category`.
    pub fn set_current_category(&mut self, category: Category) -> bool {
        if self.current == category {
            return false;
        }
        self.current = category;
        self.selected = None;
        true
    }

    /// Index into the current category's points.
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_point(&self) -> Option<Point> {
        self.selected
            .and_then(|i| self.points(self.current).get(i).copied())
    }

    /// Selects a point of the current category; invalid indices clear the
    /// selection.
    pub fn select(&mut self, index: usize) {
        self.selected = (index < self.points(self.current).len()).then_some(index);
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Deep copy of the undoable part of the state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            points: self.points.clone(),
            ellipses: self.ellipses,
        }
    }

    /// Overwrites points and ellipses from `snapshot`. Selection is dropped
    /// because indices may no longer be valid.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        self.points = snapshot.points.clone();
        self.ellipses = snapshot.ellipses;
        self.selected = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ellipse() -> Ellipse {
        Ellipse::new(Point::new(10.0, 10.0), (8.0, 6.0), 15.0)
    }

    #[test]
    fn test_add_point_keeps_order_and_duplicates() {
        let mut state = AnnotationState::new();
        state.add_point(Category::Glint, Point::new(1.0, 1.0));
        state.add_point(Category::Glint, Point::new(2.0, 2.0));
        state.add_point(Category::Glint, Point::new(1.0, 1.0));

        assert_eq!(
            state.points(Category::Glint),
            &[Point::new(1.0, 1.0), Point::new(2.0, 2.0), Point::new(1.0, 1.0)]
        );
        assert!(state.points(Category::Pupil).is_empty());
    }

    #[test]
    fn test_move_point_out_of_range_is_ignored() {
        let mut state = AnnotationState::new();
        state.add_point(Category::Iris, Point::new(1.0, 1.0));
        state.move_point(Category::Iris, 5, Point::new(9.0, 9.0));
        state.move_point(Category::Iris, 0, Point::new(3.0, 4.0));

        assert_eq!(state.points(Category::Iris), &[Point::new(3.0, 4.0)]);
    }

    #[test]
    fn test_delete_point_removes_first_match() {
        let mut state = AnnotationState::new();
        let p = Point::new(5.0, 5.0);
        state.add_point(Category::Pupil, p);
        state.add_point(Category::Pupil, Point::new(6.0, 6.0));
        state.add_point(Category::Pupil, p);

        assert!(state.delete_point(Category::Pupil, p));
        assert_eq!(state.points(Category::Pupil), &[Point::new(6.0, 6.0), p]);
        assert!(!state.delete_point(Category::Pupil, Point::new(0.0, 0.0)));
    }

    #[test]
    fn test_delete_point_shifts_selection() {
        let mut state = AnnotationState::new();
        for i in 0..3 {
            state.add_point(Category::Pupil, Point::new(i as f64, 0.0));
        }
        state.select(2);
        state.delete_point(Category::Pupil, Point::new(0.0, 0.0));

        assert_eq!(state.selected(), Some(1));
        assert_eq!(state.selected_point(), Some(Point::new(2.0, 0.0)));
    }

    #[test]
    fn test_move_all_points() {
        let mut state = AnnotationState::new();
        state.add_point(Category::EyelidContour, Point::new(1.0, 2.0));
        state.add_point(Category::EyelidContour, Point::new(3.0, 4.0));
        state.move_all_points(Category::EyelidContour, 10.0, -1.0);

        assert_eq!(
            state.points(Category::EyelidContour),
            &[Point::new(11.0, 1.0), Point::new(13.0, 3.0)]
        );
    }

    #[test]
    fn test_clear_pupil_points_clears_ellipse() {
        let mut state = AnnotationState::new();
        state.add_point(Category::Pupil, Point::new(1.0, 1.0));
        state.set_ellipse(Category::Pupil, ellipse()).unwrap();
        state.set_ellipse(Category::Iris, ellipse()).unwrap();

        state.clear_points(Category::Pupil);

        assert!(state.points(Category::Pupil).is_empty());
        assert!(state.ellipse(Category::Pupil).is_none());
        assert_eq!(state.ellipse(Category::Iris), Some(&ellipse()));
    }

    #[test]
    fn test_clear_eyelid_points_leaves_ellipses() {
        let mut state = AnnotationState::new();
        state.add_point(Category::EyelidContour, Point::new(1.0, 1.0));
        state.set_ellipse(Category::Pupil, ellipse()).unwrap();
        state.set_ellipse(Category::Iris, ellipse()).unwrap();

        state.clear_points(Category::EyelidContour);

        assert!(state.points(Category::EyelidContour).is_empty());
        assert!(state.ellipse(Category::Pupil).is_some());
        assert!(state.ellipse(Category::Iris).is_some());
    }

    #[test]
    fn test_clear_ellipse_keeps_points() {
        let mut state = AnnotationState::new();
        state.add_point(Category::Iris, Point::new(1.0, 1.0));
        state.set_ellipse(Category::Iris, ellipse()).unwrap();

        state.clear_ellipse(Category::Iris).unwrap();

        assert!(state.ellipse(Category::Iris).is_none());
        assert_eq!(state.points(Category::Iris).len(), 1);
    }

    #[test]
    fn test_ellipse_ops_reject_pointless_categories() {
        let mut state = AnnotationState::new();
        for category in [Category::EyelidContour, Category::Glint] {
            assert!(matches!(
                state.set_ellipse(category, ellipse()),
                Err(AnnotationError::NoEllipse(c)) if c == category
            ));
            assert!(matches!(
                state.clear_ellipse(category),
                Err(AnnotationError::NoEllipse(_))
            ));
        }
        assert!(state.is_empty());
    }

    #[test]
    fn test_clear_all() {
        let mut state = AnnotationState::new();
        for category in Category::ALL {
            state.add_point(category, Point::new(1.0, 1.0));
        }
        state.set_ellipse(Category::Pupil, ellipse()).unwrap();
        state.set_ellipse(Category::Iris, ellipse()).unwrap();

        state.clear_all();

        assert!(state.is_empty());
    }

    #[test]
    fn test_switching_category_clears_selection() {
        let mut state = AnnotationState::new();
        state.add_point(Category::Pupil, Point::new(1.0, 1.0));
        state.select(0);

        assert!(!state.set_current_category(Category::Pupil));
        assert_eq!(state.selected(), Some(0));

        assert!(state.set_current_category(Category::Iris));
        assert_eq!(state.selected(), None);
    }

    #[test]
    fn test_select_invalid_index() {
        let mut state = AnnotationState::new();
        state.select(0);
        assert_eq!(state.selected(), None);
    }

    #[test]
    fn test_snapshot_is_a_deep_copy() {
        let mut state = AnnotationState::new();
        state.add_point(Category::Pupil, Point::new(1.0, 1.0));
        let snapshot = state.snapshot();

        state.add_point(Category::Pupil, Point::new(2.0, 2.0));
        state.set_ellipse(Category::Pupil, ellipse()).unwrap();
        assert_eq!(snapshot.points(Category::Pupil).len(), 1);

        state.restore(&snapshot);
        assert_eq!(state.points(Category::Pupil), &[Point::new(1.0, 1.0)]);
        assert!(state.ellipse(Category::Pupil).is_none());
    }

    #[test]
    fn test_category_cycle_skips_glint() {
        assert_eq!(Category::Pupil.next(), Category::Iris);
        assert_eq!(Category::Iris.next(), Category::EyelidContour);
        assert_eq!(Category::EyelidContour.next(), Category::Pupil);
        assert_eq!(Category::Glint.next(), Category::Pupil);
    }
}
