// What you SEE now:
// • Your photo, scaled to fit the window.
// • Hold Left Mouse: paint over the part you want animated (pink highlight).
// • ENTER/SPACE sends photo + mask off for animation; the view blurs while it runs.
// • R clears the painted mask. Mouse wheel changes the brush size. ESC quits.

mod compose;
mod config;
mod draw;
mod error;
mod gamma;
mod input;
mod service;
mod session;
mod stroke;
mod types;
mod viewport;
mod vision;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use config::{Args, Config, MAX_BRUSH_RADIUS};
use draw::{draw_band, draw_brush_cursor, draw_text_5x7, Drawer};
use input::{GestureEvent, PointerInput};
use service::QueueService;
use session::{Phase, Session};
use types::FrameBuffer;
use viewport::{SourceImage, HUD_BAND};
use vision::Presenter;

const HUD_COLOR: u32 = 0x00_FF_FF_FF;
const HUD_BACKGROUND: u32 = 0x00_10_10_14;
const CURSOR_COLOR: u32 = 0x00_FF_CC_33;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_args(Args::parse())?;

    /* --- Source image ---
       Only JPEG/PNG get past this point. */
    let image = SourceImage::open(&config.image)
        .with_context(|| format!("loading {}", config.image.display()))?;

    let (w, h) = config.window;
    let mut drawer = Drawer::new("Magic Animate", w, h).context("opening window")?;
    let mut screen = FrameBuffer::new(w, h);
    let mut presenter = Presenter::new();

    let mut session = Session::new(QueueService::new(config.queue.clone()), config.brush_radius, config.window);
    session.load_image(image);

    let mut mouse_was_down = false;

    /* ------------------------------ Main loop ------------------------------ */
    while drawer.is_open() && !drawer.esc_pressed() {
        /* 1) Viewport: keep the surface glued to the rendered photo. */
        let (ww, wh) = drawer.size();
        if (ww, wh) != (screen.width, screen.height) {
            screen.resize(ww, wh);
            session.resize_viewport(ww, wh);
        }

        /* 2) Mouse -> gesture events (offset relative to the surface). */
        let mouse_down = drawer.left_mouse_down();
        let mouse = drawer.mouse_pos();
        if let Some(event) = gesture_for(&session, mouse_was_down, mouse_down, mouse) {
            session.gesture(&event);
        }
        mouse_was_down = mouse_down;

        /* 3) Wheel resizes the brush, except mid-stroke. */
        if let Some(dy) = drawer.scroll_wheel() {
            if session.renderer().suppresses_scroll() {
                tracing::trace!("wheel ignored while drawing");
            } else {
                let step = if dy > 0.0 { 1 } else { -1 };
                let radius = (session.renderer().radius() + step).clamp(1, MAX_BRUSH_RADIUS);
                session.set_brush_radius(radius);
            }
        }

        /* 4) Buttons. */
        if drawer.reset_pressed_once() {
            session.reset();
        }
        if drawer.submit_pressed_once() {
            if session.is_in_flight() {
                tracing::debug!("animate disabled while a request is in flight");
            } else if let Err(err) = session.submit() {
                tracing::warn!(error = %err, "animate not started");
            } else if let (Some(path), Some(mask)) = (&config.save_mask, session.mask()) {
                match mask.save(path) {
                    Ok(()) => tracing::info!(path = %path.display(), "mask saved"),
                    Err(err) => tracing::warn!(path = %path.display(), error = %err, "could not save mask"),
                }
            }
        }

        /* 5) Check on the request in flight (never blocks). */
        if session.poll() {
            if let Some(result) = session.result() {
                println!("{}", result.url);
            }
        }

        /* 6) Draw: photo + overlay (blurred while busy), cursor, HUD. */
        screen.fill(HUD_BACKGROUND);
        if let (Some(image), Some(rect)) = (session.image(), session.surface_rect()) {
            let overlay = if session.phase() == Phase::Done { None } else { session.preview() };
            presenter.render(&mut screen, image.rendered(), rect, overlay, session.is_busy());

            if let Some((mx, my)) = mouse {
                if rect.contains(mx, my) && can_draw(session.phase()) {
                    draw_brush_cursor(&mut screen, mx as i32, my as i32, session.renderer().radius(), CURSOR_COLOR);
                }
            }
        }
        draw_band(&mut screen, HUD_BAND as usize, HUD_BACKGROUND);
        draw_text_5x7(&mut screen, 8, 6, &hud_line(&session), HUD_COLOR);

        drawer.present(&screen)?;
    }

    Ok(())
}

fn can_draw(phase: Phase) -> bool {
    matches!(phase, Phase::Idle | Phase::Drawing | Phase::Failed)
}

/// Turn mouse button edges into gesture events. Presses only start a gesture
/// on the surface; releases always end one.
fn gesture_for<S: service::GenerationService>(
    session: &Session<S>,
    was_down: bool,
    down: bool,
    mouse: Option<(f32, f32)>,
) -> Option<GestureEvent> {
    let rect = session.surface_rect()?;
    let offset = mouse.map(|(x, y)| {
        let (offset_x, offset_y) = rect.local(x, y);
        PointerInput::Mouse { offset_x, offset_y }
    });
    match (was_down, down) {
        (false, true) => match mouse {
            Some((x, y)) if rect.contains(x, y) => offset.map(GestureEvent::Start),
            _ => None,
        },
        (true, true) => offset.map(GestureEvent::Move),
        (true, false) => Some(GestureEvent::End),
        (false, false) => None,
    }
}

fn hud_line<S: service::GenerationService>(session: &Session<S>) -> String {
    let radius = session.renderer().radius();
    match session.phase() {
        Phase::Compositing | Phase::Submitting => "PLEASE WAIT...".to_string(),
        Phase::Done => match session.result() {
            Some(result) => format!("DONE: {} | R: RESET", result.url),
            None => "DONE | R: RESET".to_string(),
        },
        Phase::Failed => format!(
            "FAILED: {} | ENTER: RETRY  R: RESET",
            session.error().unwrap_or("request failed")
        ),
        Phase::Idle | Phase::Drawing => match session.error() {
            Some(err) => format!("{err} | BRUSH {radius}"),
            None => format!("PAINT THE AREA TO ANIMATE | ENTER: ANIMATE  R: RESET  WHEEL: BRUSH {radius}"),
        },
    }
}
