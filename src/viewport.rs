//! Zoom and scroll of the image canvas.

use crate::geometry::Point;

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 25.0;
pub const ZOOM_STEP: f64 = 1.1;

/// Pixels scrolled per wheel notch without the zoom modifier.
pub const SCROLL_STEP: f64 = 40.0;

/// Maps canvas pixels to image pixels: `image = (screen + scroll) / zoom`.
#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    zoom: f64,
    scroll: (f64, f64),
    image_size: Option<(f64, f64)>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            scroll: (0.0, 0.0),
            image_size: None,
        }
    }
}

impl Viewport {
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn scroll(&self) -> (f64, f64) {
        self.scroll
    }

    pub fn image_size(&self) -> Option<(f64, f64)> {
        self.image_size
    }

    /// New image: keeps the zoom, resets the scroll.
    pub fn set_image_size(&mut self, size: Option<(f64, f64)>) {
        self.image_size = size;
        self.scroll = (0.0, 0.0);
    }

    pub fn set_scroll(&mut self, x: f64, y: f64) {
        self.scroll = (x, y);
    }

    /// Drags the content by `(dx, dy)` screen pixels.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.scroll.0 -= dx;
        self.scroll.1 -= dy;
    }

    pub fn scroll_by(&mut self, dx: f64, dy: f64) {
        self.scroll.0 += dx;
        self.scroll.1 += dy;
    }

    /// Multiplies the zoom by `ZOOM_STEP^notches` (clamped) while keeping
    /// the image point under `anchor` on the same screen pixel.
    pub fn zoom_at(&mut self, notches: i32, anchor: Point) {
        let old = self.zoom;
        self.zoom = (old * ZOOM_STEP.powi(notches)).clamp(MIN_ZOOM, MAX_ZOOM);
        let ratio = self.zoom / old;
        self.scroll.0 = (anchor.x + self.scroll.0) * ratio - anchor.x;
        self.scroll.1 = (anchor.y + self.scroll.1) * ratio - anchor.y;
    }

    pub fn screen_to_image(&self, screen: Point) -> Point {
        Point::new(
            (screen.x + self.scroll.0) / self.zoom,
            (screen.y + self.scroll.1) / self.zoom,
        )
    }

    pub fn image_to_screen(&self, image: Point) -> Point {
        Point::new(
            image.x * self.zoom - self.scroll.0,
            image.y * self.zoom - self.scroll.1,
        )
    }

    /// Image-space position of `screen` if it falls on the image.
    pub fn image_position(&self, screen: Point) -> Option<Point> {
        let (w, h) = self.image_size?;
        let p = self.screen_to_image(screen);
        (p.x >= 0.0 && p.x < w && p.y >= 0.0 && p.y < h).then_some(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_is_clamped() {
        let mut vp = Viewport::default();
        vp.zoom_at(200, Point::default());
        assert_eq!(vp.zoom(), MAX_ZOOM);
        vp.zoom_at(-500, Point::default());
        assert_eq!(vp.zoom(), MIN_ZOOM);
    }

    #[test]
    fn test_zoom_step() {
        let mut vp = Viewport::default();
        vp.zoom_at(1, Point::default());
        assert!((vp.zoom() - 1.1).abs() < 1e-12);
        vp.zoom_at(-2, Point::default());
        assert!((vp.zoom() - 1.0 / 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_zoom_keeps_anchor_fixed() {
        let mut vp = Viewport::default();
        vp.set_scroll(30.0, -12.0);
        let anchor = Point::new(200.0, 150.0);
        let before = vp.screen_to_image(anchor);

        vp.zoom_at(3, anchor);
        let after = vp.screen_to_image(anchor);

        assert!((before.x - after.x).abs() < 1e-9);
        assert!((before.y - after.y).abs() < 1e-9);
    }

    #[test]
    fn test_round_trip_transform() {
        let mut vp = Viewport::default();
        vp.zoom_at(5, Point::new(10.0, 10.0));
        vp.pan(7.0, -3.0);
        let p = Point::new(42.0, 17.0);
        let back = vp.screen_to_image(vp.image_to_screen(p));
        assert!((back.x - p.x).abs() < 1e-9);
        assert!((back.y - p.y).abs() < 1e-9);
    }

    #[test]
    fn test_image_position_bounds() {
        let mut vp = Viewport::default();
        assert_eq!(vp.image_position(Point::new(1.0, 1.0)), None);

        vp.set_image_size(Some((100.0, 50.0)));
        assert_eq!(vp.image_position(Point::new(10.0, 10.0)), Some(Point::new(10.0, 10.0)));
        assert_eq!(vp.image_position(Point::new(100.0, 10.0)), None);
        assert_eq!(vp.image_position(Point::new(10.0, -1.0)), None);
    }

    #[test]
    fn test_pan_moves_content_with_pointer() {
        let mut vp = Viewport::default();
        let p = Point::new(20.0, 20.0);
        let screen = vp.image_to_screen(p);
        vp.pan(5.0, 5.0);
        let moved = vp.image_to_screen(p);
        assert_eq!(moved, Point::new(screen.x + 5.0, screen.y + 5.0));
    }
}
