// Session + submission orchestrator.
// Every flag the UI reads (busy, single-flight guard, mask, result, error)
// lives here, and every change goes through one of the transition methods.
//
//   Idle ──start──▶ Drawing ──end──▶ Idle
//   Idle/Failed ──submit──▶ Compositing ──▶ Submitting ──poll──▶ Done | Failed
//   Done/Failed ──reset──▶ Idle          any ──load_image──▶ Idle (abandons)

use image::RgbaImage;

use crate::compose::{composite_mask, MaskTones};
use crate::error::{Error, Result};
use crate::input::GestureEvent;
use crate::service::{GenerationOutput, GenerationRequest, GenerationService, PendingGeneration};
use crate::stroke::{StrokeRenderer, StrokeState};
use crate::types::SurfaceRect;
use crate::viewport::{self, SourceImage};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Drawing,
    Compositing,
    Submitting,
    Done,
    Failed,
}

pub struct Session<S: GenerationService> {
    service: S,
    image: Option<SourceImage>,
    renderer: StrokeRenderer,
    rect: Option<SurfaceRect>,
    window: (usize, usize),
    tones: MaskTones,

    phase: Phase,
    busy: bool,      // spinner / de-emphasis
    in_flight: bool, // single-flight guard
    pending: Option<PendingGeneration>,
    abandoned: Vec<PendingGeneration>,

    mask: Option<RgbaImage>,
    result: Option<GenerationOutput>,
    error: Option<String>,
}

impl<S: GenerationService> Session<S> {
    pub fn new(service: S, brush_radius: i32, window: (usize, usize)) -> Self {
        Self {
            service,
            image: None,
            renderer: StrokeRenderer::new(0, 0, brush_radius),
            rect: None,
            window,
            tones: MaskTones::default(),
            phase: Phase::Idle,
            busy: false,
            in_flight: false,
            pending: None,
            abandoned: Vec::new(),
            mask: None,
            result: None,
            error: None,
        }
    }

    // ------------------------------ accessors ------------------------------

    pub fn phase(&self) -> Phase { self.phase }
    pub fn is_busy(&self) -> bool { self.busy }
    pub fn is_in_flight(&self) -> bool { self.in_flight }
    pub fn result(&self) -> Option<&GenerationOutput> { self.result.as_ref() }
    pub fn error(&self) -> Option<&str> { self.error.as_deref() }
    pub fn image(&self) -> Option<&SourceImage> { self.image.as_ref() }
    pub fn surface_rect(&self) -> Option<SurfaceRect> { self.rect }
    pub fn renderer(&self) -> &StrokeRenderer { &self.renderer }
    #[cfg(test)]
    pub fn service(&self) -> &S { &self.service }

    /// Mask of the attempt currently in flight, if any.
    pub fn mask(&self) -> Option<&RgbaImage> { self.mask.as_ref() }

    /// Live mask preview for the overlay.
    pub fn preview(&self) -> Option<&RgbaImage> { self.renderer.preview() }

    /// Reset is offered only with an image loaded and nothing in flight.
    pub fn can_reset(&self) -> bool {
        self.image.is_some() && !self.busy
    }

    pub fn set_brush_radius(&mut self, radius: i32) {
        self.renderer.set_radius(radius);
    }

    // ------------------------------ transitions ------------------------------

    /// Replace the source image. Clears strokes, result and error, and
    /// abandons any request still in flight.
    pub fn load_image(&mut self, image: SourceImage) {
        self.abandon();
        let (w, h) = image.natural_size();
        tracing::info!(width = w, height = h, "source image loaded");
        self.image = Some(image);
        self.renderer.reset();
        self.renderer.end_gesture();
        self.mask = None;
        self.result = None;
        self.error = None;
        self.phase = Phase::Idle;
        self.sync_viewport();
    }

    /// Window resize notification.
    pub fn resize_viewport(&mut self, width: usize, height: usize) {
        self.window = (width, height);
        self.sync_viewport();
    }

    fn sync_viewport(&mut self) {
        self.rect = viewport::sync(self.image.as_mut(), self.window, &mut self.renderer);
        // a size change ends any gesture in progress
        if self.phase == Phase::Drawing && self.renderer.state() == StrokeState::Idle {
            self.phase = Phase::Idle;
        }
    }

    /// Feed a pointer/touch gesture. Returns true when a stamp landed.
    pub fn gesture(&mut self, event: &GestureEvent) -> bool {
        if matches!(event, GestureEvent::End) {
            self.renderer.end_gesture();
            if self.phase == Phase::Drawing {
                self.phase = Phase::Idle;
            }
            return false;
        }
        if self.rect.is_none() || !matches!(self.phase, Phase::Idle | Phase::Drawing | Phase::Failed) {
            return false;
        }
        if matches!(event, GestureEvent::Start(_)) {
            self.phase = Phase::Drawing;
        }
        self.renderer.handle(event, self.rect.as_ref())
    }

    /// Clear the drawing surface (and any shown result). Idempotent.
    pub fn reset(&mut self) -> bool {
        if !self.can_reset() {
            return false;
        }
        self.renderer.reset();
        self.renderer.end_gesture();
        self.mask = None;
        self.result = None;
        self.error = None;
        self.phase = Phase::Idle;
        tracing::info!("mask reset");
        true
    }

    /// Start one generation. `Err` means nothing is in flight afterwards:
    /// either a precondition failed or the request could not be dispatched.
    pub fn submit(&mut self) -> Result<()> {
        if self.busy || self.in_flight {
            tracing::warn!("submit ignored: a generation request is already in flight");
            return Err(Error::Busy);
        }
        if !self.image.as_ref().is_some_and(SourceImage::is_complete) {
            return Err(self.surface(Error::MissingSourceImage));
        }
        if !self.renderer.has_strokes() {
            return Err(self.surface(Error::EmptyMask));
        }
        let Some(snapshot) = self.image.as_ref().map(SourceImage::freeze) else {
            return Err(Error::MissingSourceImage);
        };

        self.renderer.end_gesture();
        self.busy = true;
        self.error = None;
        self.result = None;
        self.phase = Phase::Compositing;

        // Snapshot and mask share the rendered size.
        let (w, h) = snapshot.dimensions();
        let mask = composite_mask(&self.renderer.snapshot(), w, h, self.tones);
        self.mask = Some(mask.clone());
        self.in_flight = true;
        self.phase = Phase::Submitting;
        tracing::info!(width = w, height = h, "submitting generation request");

        let request = GenerationRequest { image: snapshot, mask, sync_mode: true };
        match self.service.submit(request) {
            Ok(pending) => {
                self.pending = Some(pending);
                Ok(())
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Check the in-flight request without blocking; call once per frame.
    /// Returns true when the phase changed.
    pub fn poll(&mut self) -> bool {
        self.abandoned.retain_mut(|pending| match pending.try_outcome() {
            Some(outcome) => {
                tracing::info!(ok = outcome.is_ok(), "ignoring late outcome of abandoned request");
                false
            }
            None => true,
        });

        let Some(outcome) = self.pending.as_mut().and_then(|p| p.try_outcome()) else {
            return false;
        };
        self.pending = None;
        match outcome {
            Ok(output) => {
                tracing::info!(url = %output.url, "generation succeeded");
                self.result = Some(output);
                self.mask = None;
                self.busy = false;
                self.in_flight = false;
                self.phase = Phase::Done;
            }
            Err(err) => self.fail(&err),
        }
        true
    }

    /// Drop the in-flight request; its late outcome is drained and ignored.
    pub fn abandon(&mut self) {
        if let Some(pending) = self.pending.take() {
            tracing::warn!("abandoning in-flight generation request");
            self.abandoned.push(pending);
        }
        self.busy = false;
        self.in_flight = false;
        self.mask = None;
        if matches!(self.phase, Phase::Compositing | Phase::Submitting) {
            self.phase = Phase::Idle;
        }
    }

    fn fail(&mut self, err: &Error) {
        if err.is_request_failure() {
            tracing::error!(error = %err, "generation request failed");
        } else {
            tracing::warn!(error = %err, "generation not dispatched");
        }
        self.error = Some(err.to_string());
        self.result = None;
        self.mask = None;
        self.busy = false;
        self.in_flight = false;
        self.phase = Phase::Failed;
    }

    /// Record a precondition failure for the UI and hand it back.
    fn surface(&mut self, err: Error) -> Error {
        tracing::warn!(error = %err, "submit rejected");
        self.error = Some(err.to_string());
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{PointerInput, TouchPoint};
    use crate::service::GenerationOutcome;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;
    use std::sync::mpsc::{self, Sender};
    use std::thread;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Scripted {
        requests: Vec<GenerationRequest>,
        senders: Vec<Sender<GenerationOutcome>>,
        refuse: bool,
    }

    impl GenerationService for Scripted {
        fn submit(&mut self, request: GenerationRequest) -> Result<PendingGeneration> {
            if self.refuse {
                return Err(Error::request("connection refused"));
            }
            let (tx, rx) = mpsc::channel();
            self.requests.push(request);
            self.senders.push(tx);
            Ok(PendingGeneration::new(rx))
        }
    }

    fn jpeg(w: u32, h: u32) -> SourceImage {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(w, h, image::Rgb([90, 120, 200])));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg).unwrap();
        SourceImage::from_bytes(&bytes).unwrap()
    }

    fn mouse(x: f32, y: f32) -> PointerInput {
        PointerInput::Mouse { offset_x: x, offset_y: y }
    }

    fn session_with_stroke() -> Session<Scripted> {
        let mut s = Session::new(Scripted::default(), 10, (800, 600));
        s.load_image(jpeg(400, 300));
        s.gesture(&GestureEvent::Start(mouse(200.0, 150.0)));
        assert_eq!(s.phase(), Phase::Drawing);
        assert!(s.gesture(&GestureEvent::Move(mouse(200.0, 150.0))));
        s.gesture(&GestureEvent::End);
        assert_eq!(s.phase(), Phase::Idle);
        s
    }

    fn poll_until_settled(s: &mut Session<Scripted>) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while s.is_busy() {
            s.poll();
            assert!(Instant::now() < deadline, "session never settled");
            thread::sleep(Duration::from_millis(20));
        }
    }

    #[test]
    fn end_to_end_success() {
        let mut s = session_with_stroke();
        assert_eq!(s.renderer().dimensions(), (400, 300));

        s.submit().unwrap();
        assert!(s.is_busy());
        assert!(s.is_in_flight());
        assert_eq!(s.phase(), Phase::Submitting);

        let req = &s.service().requests[0];
        assert_eq!(req.image.dimensions(), (400, 300));
        assert_eq!(req.mask.dimensions(), (400, 300));
        assert!(req.sync_mode);
        assert_eq!(*req.mask.get_pixel(200, 150), Rgba([0, 0, 0, 255]));
        assert_eq!(*req.mask.get_pixel(0, 0), Rgba([255, 255, 255, 255]));

        let tx = s.service().senders[0].clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(3));
            let _ = tx.send(Ok(GenerationOutput { url: "https://x/y.mp4".into() }));
        });
        assert!(!s.poll());
        poll_until_settled(&mut s);

        assert_eq!(s.result().map(|r| r.url.as_str()), Some("https://x/y.mp4"));
        assert!(!s.is_busy());
        assert!(!s.is_in_flight());
        assert_eq!(s.phase(), Phase::Done);
        assert!(s.error().is_none());
        assert!(s.mask().is_none());
    }

    #[test]
    fn rejected_request_leaves_result_unset_and_resubmittable() {
        let mut s = session_with_stroke();
        s.submit().unwrap();
        s.service().senders[0].send(Err(Error::status(500, "An error occurred"))).unwrap();
        assert!(s.poll());

        assert!(s.result().is_none());
        assert!(s.error().is_some());
        assert!(!s.is_busy());
        assert!(!s.is_in_flight());
        assert_eq!(s.phase(), Phase::Failed);

        // strokes survive, so a manual retry goes straight out
        s.submit().unwrap();
        assert_eq!(s.service().requests.len(), 2);
        assert!(s.error().is_none());
    }

    #[test]
    fn second_submit_while_in_flight_is_rejected() {
        let mut s = session_with_stroke();
        s.submit().unwrap();
        assert!(matches!(s.submit(), Err(Error::Busy)));
        assert!(!s.poll());
        assert!(matches!(s.submit(), Err(Error::Busy)));
        assert_eq!(s.service().requests.len(), 1);
    }

    #[test]
    fn reset_and_drawing_are_disabled_while_busy() {
        let mut s = session_with_stroke();
        s.submit().unwrap();
        assert!(!s.reset());
        assert!(s.renderer().has_strokes());
        assert!(!s.gesture(&GestureEvent::Start(mouse(1.0, 1.0))));
        assert!(!s.gesture(&GestureEvent::Move(mouse(5.0, 5.0))));
        assert_eq!(s.phase(), Phase::Submitting);
    }

    #[test]
    fn missing_image_is_surfaced_without_request() {
        let mut s = Session::new(Scripted::default(), 10, (800, 600));
        assert!(matches!(s.submit(), Err(Error::MissingSourceImage)));
        assert!(s.error().is_some());
        assert!(!s.is_busy());
        assert!(s.service().requests.is_empty());
        assert!(!s.reset());
    }

    #[test]
    fn empty_mask_is_never_submitted() {
        let mut s = Session::new(Scripted::default(), 10, (800, 600));
        s.load_image(jpeg(64, 64));
        assert!(matches!(s.submit(), Err(Error::EmptyMask)));
        assert!(!s.is_busy() && !s.is_in_flight());
        assert!(s.service().requests.is_empty());
    }

    #[test]
    fn stroke_entirely_off_the_surface_counts_as_empty() {
        let mut s = Session::new(Scripted::default(), 10, (800, 600));
        s.load_image(jpeg(400, 300));
        let far = PointerInput::Touch {
            touches: vec![TouchPoint { client_x: 5000.0, client_y: 5000.0 }],
        };
        s.gesture(&GestureEvent::Start(far.clone()));
        assert!(!s.gesture(&GestureEvent::Move(far)));
        assert!(!s.gesture(&GestureEvent::Move(mouse(3.0e38, 5.0))));
        s.gesture(&GestureEvent::End);

        assert!(matches!(s.submit(), Err(Error::EmptyMask)));
        assert!(s.error().is_some());
        assert!(!s.is_busy() && !s.is_in_flight());
        assert!(s.service().requests.is_empty());
    }

    #[test]
    fn dispatch_failure_clears_flags() {
        let mut s = session_with_stroke();
        let mut service = Scripted::default();
        service.refuse = true;
        s.service = service;
        assert!(s.submit().is_err());
        assert!(!s.is_busy() && !s.is_in_flight());
        assert_eq!(s.phase(), Phase::Failed);
        assert!(s.error().is_some());
    }

    #[test]
    fn reset_twice_matches_reset_once() {
        let mut s = session_with_stroke();
        assert!(s.reset());
        let once = s.renderer().snapshot();
        assert!(s.reset());
        assert_eq!(s.renderer().snapshot(), once);
        assert!(s.preview().is_none());
        assert_eq!(s.phase(), Phase::Idle);
    }

    #[test]
    fn reset_after_done_returns_to_drawing_view() {
        let mut s = session_with_stroke();
        s.submit().unwrap();
        s.service().senders[0].send(Ok(GenerationOutput { url: "u".into() })).unwrap();
        s.poll();
        assert_eq!(s.phase(), Phase::Done);
        // result is on screen: no drawing
        assert!(!s.gesture(&GestureEvent::Start(mouse(3.0, 3.0))));
        assert!(s.reset());
        assert!(s.result().is_none());
        assert_eq!(s.phase(), Phase::Idle);
    }

    #[test]
    fn new_image_abandons_in_flight_request() {
        let mut s = session_with_stroke();
        s.submit().unwrap();
        s.load_image(jpeg(200, 100));
        assert!(!s.is_busy() && !s.is_in_flight());
        assert_eq!(s.phase(), Phase::Idle);
        assert!(!s.renderer().has_strokes());
        assert_eq!(s.renderer().dimensions(), (200, 100));

        // late answer for the old photo is drained, never applied
        s.service().senders[0].send(Ok(GenerationOutput { url: "stale".into() })).unwrap();
        assert!(!s.poll());
        assert!(s.result().is_none());
        assert!(s.abandoned.is_empty());
    }

    #[test]
    fn viewport_resize_keeps_surface_aligned() {
        let mut s = Session::new(Scripted::default(), 10, (800, 600));
        s.load_image(jpeg(1200, 900));
        for (w, h) in [(1024, 768), (500, 900), (300, 300)] {
            s.resize_viewport(w, h);
            let rendered = s.image().unwrap().rendered_size();
            assert_eq!(s.renderer().dimensions(), rendered);
            let rect = s.surface_rect().unwrap();
            assert_eq!((rect.width as u32, rect.height as u32), rendered);
        }
    }
}
