// Coordinate mapping: pointer/touch input -> drawing-surface pixels.
// Mouse input already carries its offset relative to the surface; touch input
// carries viewport (client) positions and needs the surface origin removed.

use crate::types::SurfaceRect;

/// One active touch point in viewport coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TouchPoint {
    pub client_x: f32,
    pub client_y: f32,
}

/// Raw input delivered by the host for a gesture event.
#[derive(Clone, Debug, PartialEq)]
pub enum PointerInput {
    /// Offset relative to the surface element, as the host reports it.
    Mouse { offset_x: f32, offset_y: f32 },
    /// Active touches; only the first one is used.
    Touch { touches: Vec<TouchPoint> },
}

/// Gesture events the stroke renderer reacts to.
#[derive(Clone, Debug, PartialEq)]
pub enum GestureEvent {
    Start(PointerInput), // mouse-down / touch-start
    Move(PointerInput),  // mouse-move / touch-move
    End,                 // mouse-up / touch-end
}

/// Map an input to surface-local `(x, y)`.
/// Malformed input (no touches, no known rect, non-finite numbers) yields `(0, 0)`.
pub fn map_to_surface(input: &PointerInput, rect: Option<&SurfaceRect>) -> (f32, f32) {
    let (x, y) = match input {
        PointerInput::Mouse { offset_x, offset_y } => (*offset_x, *offset_y),
        PointerInput::Touch { touches } => match (touches.first(), rect) {
            (Some(t), Some(r)) => r.local(t.client_x, t.client_y),
            _ => (0.0, 0.0),
        },
    };
    if x.is_finite() && y.is_finite() { (x, y) } else { (0.0, 0.0) }
}

/// Stand-in for the non-passive touch-start handler: while engaged, the host
/// must swallow its default scroll/zoom handling so strokes stay in sync.
#[derive(Debug, Default)]
pub struct ScrollSuppression {
    engaged: bool,
}

impl ScrollSuppression {
    pub fn engage(&mut self) {
        if !self.engaged {
            tracing::trace!("scroll suppression engaged");
        }
        self.engaged = true;
    }

    pub fn release(&mut self) {
        if self.engaged {
            tracing::trace!("scroll suppression released");
        }
        self.engaged = false;
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> SurfaceRect {
        SurfaceRect { left: 40.0, top: 25.5, width: 400.0, height: 300.0 }
    }

    #[test]
    fn touch_subtracts_rect_origin() {
        let input = PointerInput::Touch {
            touches: vec![
                TouchPoint { client_x: 240.0, client_y: 175.5 },
                TouchPoint { client_x: 1.0, client_y: 1.0 },
            ],
        };
        assert_eq!(map_to_surface(&input, Some(&rect())), (200.0, 150.0));
    }

    #[test]
    fn mouse_uses_native_offset_exactly() {
        let input = PointerInput::Mouse { offset_x: 13.25, offset_y: 7.0 };
        assert_eq!(map_to_surface(&input, Some(&rect())), (13.25, 7.0));
        assert_eq!(map_to_surface(&input, None), (13.25, 7.0));
    }

    #[test]
    fn malformed_input_maps_to_origin() {
        let empty = PointerInput::Touch { touches: vec![] };
        assert_eq!(map_to_surface(&empty, Some(&rect())), (0.0, 0.0));

        let no_rect = PointerInput::Touch {
            touches: vec![TouchPoint { client_x: 5.0, client_y: 5.0 }],
        };
        assert_eq!(map_to_surface(&no_rect, None), (0.0, 0.0));

        let nan = PointerInput::Mouse { offset_x: f32::NAN, offset_y: 3.0 };
        assert_eq!(map_to_surface(&nan, None), (0.0, 0.0));
    }

    #[test]
    fn suppression_toggles() {
        let mut s = ScrollSuppression::default();
        assert!(!s.is_engaged());
        s.engage();
        s.engage();
        assert!(s.is_engaged());
        s.release();
        assert!(!s.is_engaged());
    }
}
