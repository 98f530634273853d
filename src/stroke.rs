// Stroke renderer: the Idle/Drawing state machine that stamps discs into the
// drawing surface and keeps the live mask preview up to date.

use image::{Rgba, RgbaImage};

use crate::input::{map_to_surface, GestureEvent, ScrollSuppression};
use crate::types::{Stamp, SurfaceRect};

pub const DEFAULT_BRUSH_RADIUS: i32 = 10;

/// Stamp paint: fully opaque black, as the overlay shows it.
const STROKE_PAINT: Rgba<u8> = Rgba([0, 0, 0, 255]);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrokeState {
    Idle,
    Drawing,
}

pub struct StrokeRenderer {
    state: StrokeState,
    surface: RgbaImage,       // the drawing surface; transparent = untouched
    preview: Option<RgbaImage>, // exported after every stamp
    stamp: Stamp,
    suppression: ScrollSuppression,
}

impl StrokeRenderer {
    pub fn new(width: u32, height: u32, radius: i32) -> Self {
        Self {
            state: StrokeState::Idle,
            surface: RgbaImage::new(width, height),
            preview: None,
            stamp: Stamp::disc(radius),
            suppression: ScrollSuppression::default(),
        }
    }

    pub fn state(&self) -> StrokeState {
        self.state
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.surface.dimensions()
    }

    pub fn radius(&self) -> i32 {
        self.stamp.radius
    }

    /// Change the brush size for future stamps (existing strokes stay).
    pub fn set_radius(&mut self, radius: i32) {
        if radius != self.stamp.radius {
            self.stamp = Stamp::disc(radius);
        }
    }

    /// Live mask preview: the surface as of the last stamp.
    pub fn preview(&self) -> Option<&RgbaImage> {
        self.preview.as_ref()
    }

    /// At least one surface pixel has been painted since the last clear.
    pub fn has_strokes(&self) -> bool {
        self.preview.is_some()
    }

    /// True while the host must swallow its default scroll handling.
    pub fn suppresses_scroll(&self) -> bool {
        self.suppression.is_engaged()
    }

    /// Feed one gesture event. Returns true when a stamp landed.
    pub fn handle(&mut self, event: &GestureEvent, rect: Option<&SurfaceRect>) -> bool {
        match (self.state, event) {
            (StrokeState::Idle, GestureEvent::Start(_)) => {
                self.state = StrokeState::Drawing;
                self.suppression.engage();
                false
            }
            (StrokeState::Drawing, GestureEvent::Move(input)) => {
                let (x, y) = map_to_surface(input, rect);
                self.stamp_at(x, y)
            }
            (_, GestureEvent::End) => {
                self.end_gesture();
                false
            }
            // moves while idle, or a second start mid-gesture
            _ => false,
        }
    }

    /// Drop back to Idle without further stamping.
    pub fn end_gesture(&mut self) {
        self.state = StrokeState::Idle;
        self.suppression.release();
    }

    /// Stamp one disc at surface coordinates, then export the preview.
    /// Returns false (and leaves the preview alone) when no pixel was painted.
    pub fn stamp_at(&mut self, x: f32, y: f32) -> bool {
        let (w, h) = self.surface.dimensions();
        let (w, h) = (w as i32, h as i32);
        let r = self.stamp.radius;
        let reach = (r + 1) as f32;
        // also rejects NaN and offsets too large for i32 maths
        if !(x > -reach && x < w as f32 + reach && y > -reach && y < h as f32 + reach) {
            return false;
        }
        let cx = x.round() as i32;
        let cy = y.round() as i32;
        let d = self.stamp.diameter();

        let mut painted = false;
        for ky in 0..d {
            for kx in 0..d {
                let sx = cx + kx - r;
                let sy = cy + ky - r;
                if sx < 0 || sy < 0 || sx >= w || sy >= h { continue; }
                if self.stamp.coverage[(ky * d + kx) as usize] {
                    self.surface.put_pixel(sx as u32, sy as u32, STROKE_PAINT);
                    painted = true;
                }
            }
        }
        if painted {
            self.preview = Some(self.surface.clone());
        }
        painted
    }

    /// Clear the surface to transparent and drop the preview.
    pub fn reset(&mut self) {
        for p in self.surface.pixels_mut() { *p = Rgba([0, 0, 0, 0]); }
        self.preview = None;
    }

    /// Resize the surface. A size change discards its content (and the
    /// preview) because strokes recorded against old dimensions are stale.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if self.surface.dimensions() == (width, height) {
            return false;
        }
        self.surface = RgbaImage::new(width, height);
        self.preview = None;
        self.end_gesture();
        true
    }

    /// Immutable copy of the surface for a submission.
    pub fn snapshot(&self) -> RgbaImage {
        self.surface.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{PointerInput, TouchPoint};
    use crate::types::opaque_pixel_count;

    fn mouse(x: f32, y: f32) -> PointerInput {
        PointerInput::Mouse { offset_x: x, offset_y: y }
    }

    #[test]
    fn moves_only_stamp_while_drawing() {
        let mut r = StrokeRenderer::new(400, 300, 10);
        assert!(!r.handle(&GestureEvent::Move(mouse(50.0, 50.0)), None));
        assert!(!r.has_strokes());

        assert!(!r.handle(&GestureEvent::Start(mouse(50.0, 50.0)), None));
        assert_eq!(r.state(), StrokeState::Drawing);
        assert!(r.suppresses_scroll());
        assert!(r.handle(&GestureEvent::Move(mouse(200.0, 150.0)), None));
        assert!(r.has_strokes());

        r.handle(&GestureEvent::End, None);
        assert_eq!(r.state(), StrokeState::Idle);
        assert!(!r.suppresses_scroll());
        assert!(!r.handle(&GestureEvent::Move(mouse(10.0, 10.0)), None));
    }

    #[test]
    fn stamp_is_opaque_disc_at_mapped_point() {
        let mut r = StrokeRenderer::new(400, 300, 10);
        r.handle(&GestureEvent::Start(mouse(0.0, 0.0)), None);
        let rect = SurfaceRect { left: 100.0, top: 50.0, width: 400.0, height: 300.0 };
        let touch = PointerInput::Touch {
            touches: vec![TouchPoint { client_x: 300.0, client_y: 200.0 }],
        };
        r.handle(&GestureEvent::Move(touch), Some(&rect));

        let preview = r.preview().expect("preview after stamp");
        assert_eq!(preview.get_pixel(200, 150)[3], 255);
        assert_eq!(preview.get_pixel(210, 150)[3], 255);
        assert_eq!(preview.get_pixel(211, 150)[3], 0);
        assert_eq!(preview.get_pixel(210, 160)[3], 0);
        assert_eq!(opaque_pixel_count(preview), Stamp::disc(10).coverage.iter().filter(|c| **c).count());
    }

    #[test]
    fn stamps_clip_at_surface_edges() {
        let mut r = StrokeRenderer::new(20, 20, 10);
        r.stamp_at(0.0, 0.0);
        let preview = r.preview().unwrap();
        assert_eq!(preview.get_pixel(0, 0)[3], 255);
        assert!(opaque_pixel_count(preview) < Stamp::disc(10).coverage.len());
    }

    #[test]
    fn off_surface_stamps_paint_nothing() {
        let mut r = StrokeRenderer::new(40, 30, 10);
        assert!(!r.stamp_at(-11.5, 5.0));
        assert!(!r.stamp_at(20.0, 41.0));
        assert!(!r.has_strokes());
        assert!(r.preview().is_none());
        // a disc whose centre is outside but whose rim reaches in still counts
        assert!(r.stamp_at(-5.0, 5.0));
        assert!(r.has_strokes());
    }

    #[test]
    fn huge_offsets_do_not_overflow() {
        let mut r = StrokeRenderer::new(40, 30, 10);
        r.handle(&GestureEvent::Start(mouse(0.0, 0.0)), None);
        assert!(!r.handle(&GestureEvent::Move(mouse(3.0e38, 5.0)), None));
        assert!(!r.handle(&GestureEvent::Move(mouse(-3.0e38, -3.0e38)), None));
        assert!(!r.handle(&GestureEvent::Move(mouse(5.0, f32::MAX)), None));
        assert!(!r.has_strokes());
        assert_eq!(r.state(), StrokeState::Drawing);
    }

    #[test]
    fn reset_twice_equals_reset_once() {
        let mut r = StrokeRenderer::new(64, 48, 5);
        r.stamp_at(20.0, 20.0);
        r.reset();
        let once = r.snapshot();
        let preview_once = r.has_strokes();
        r.reset();
        assert_eq!(r.snapshot(), once);
        assert_eq!(r.has_strokes(), preview_once);
        assert_eq!(opaque_pixel_count(&once), 0);
        assert!(!r.has_strokes());
    }

    #[test]
    fn resize_discards_strokes_only_on_change() {
        let mut r = StrokeRenderer::new(64, 48, 5);
        r.stamp_at(20.0, 20.0);
        assert!(!r.resize(64, 48));
        assert!(r.has_strokes());
        assert!(r.resize(32, 24));
        assert_eq!(r.dimensions(), (32, 24));
        assert!(!r.has_strokes());
    }
}
