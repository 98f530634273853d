// On-screen presentation of the editor: photo, stroke overlay, busy blur.
// What you SEE:
// • the photo at its rendered size inside the window
// • painted strokes as a translucent highlight on top of it
// • while a request is in flight, photo + overlay blurred (de-emphasized)

use image::RgbaImage;

use crate::gamma::GammaLut;
use crate::types::{pack_rgb, FrameBuffer, SurfaceRect};

pub const BACKGROUND: u32 = 0x00_1E_1E_24;
/// Highlight colour for painted strokes (visual only; the mask uses its own tones).
pub const OVERLAY_COLOR: u32 = 0x00_FF_3C_78;
pub const OVERLAY_STRENGTH: f32 = 0.55;
/// Softness of the busy blur.
pub const BUSY_BLUR_RADIUS: usize = 8;

/// Reusable buffers for drawing the editor view.
pub struct Presenter {
    lut: GammaLut,
    region: FrameBuffer, // the surface area, cut out for blurring
    scratch: FrameBuffer,
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Presenter {
    pub fn new() -> Self {
        Self {
            lut: GammaLut::new(),
            region: FrameBuffer::new(0, 0),
            scratch: FrameBuffer::new(0, 0),
        }
    }

    /// Paint one frame of the editor into `screen`.
    pub fn render(
        &mut self,
        screen: &mut FrameBuffer,
        photo: &RgbaImage,
        rect: SurfaceRect,
        preview: Option<&RgbaImage>,
        busy: bool,
    ) {
        screen.fill(BACKGROUND);
        let (w, h) = photo.dimensions();
        let (w, h) = (w as usize, h as usize);
        self.region.resize(w, h);

        // 1) photo
        for (x, y, px) in photo.enumerate_pixels() {
            self.region.pixels[y as usize * w + x as usize] = pack_rgb(px);
        }

        // 2) strokes, mixed in linear light
        if let Some(strokes) = preview {
            tint_strokes(&mut self.region, strokes, &self.lut);
        }

        // 3) busy: blur everything we just drew
        if busy {
            self.scratch.resize(w, h);
            box_blur(&mut self.region, &mut self.scratch, BUSY_BLUR_RADIUS);
        }

        blit(screen, &self.region, rect.left as i32, rect.top as i32);
    }
}

/// Mix the overlay colour in wherever the stroke raster has alpha.
pub fn tint_strokes(fb: &mut FrameBuffer, strokes: &RgbaImage, lut: &GammaLut) {
    for (x, y, px) in strokes.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        if px[3] == 0 || x >= fb.width || y >= fb.height { continue; }
        let idx = y * fb.width + x;
        let t = OVERLAY_STRENGTH * (px[3] as f32 / 255.0);
        fb.pixels[idx] = lut.mix_rgb(fb.pixels[idx], OVERLAY_COLOR, t);
    }
}

/// Copy `src` into `dst` at (left, top), clipped to `dst`.
pub fn blit(dst: &mut FrameBuffer, src: &FrameBuffer, left: i32, top: i32) {
    for sy in 0..src.height {
        let dy = top + sy as i32;
        if dy < 0 || dy >= dst.height as i32 { continue; }
        for sx in 0..src.width {
            let dx = left + sx as i32;
            if dx < 0 || dx >= dst.width as i32 { continue; }
            dst.pixels[dy as usize * dst.width + dx as usize] = src.pixels[sy * src.width + sx];
        }
    }
}

#[inline]
fn channels(px: u32) -> [u32; 3] {
    [(px >> 16) & 0xFF, (px >> 8) & 0xFF, px & 0xFF]
}

/// One sliding-window pass over `count` lines of `len` pixels each.
/// `line_step`/`px_step` pick rows (horizontal pass) or columns (vertical).
/// Edges are extended so borders do not darken.
fn box_pass(src: &[u32], dst: &mut [u32], count: usize, len: usize, line_step: usize, px_step: usize, radius: usize) {
    if len == 0 { return; }
    let r = radius as i64;
    let win = (2 * radius + 1) as u32;
    let last = len as i64 - 1;
    let at = |line: usize, i: i64| src[line * line_step + i.clamp(0, last) as usize * px_step];

    for line in 0..count {
        let mut sum = [0u32; 3];
        for i in -r..=r {
            let c = channels(at(line, i));
            for k in 0..3 { sum[k] += c[k]; }
        }
        for i in 0..len as i64 {
            let out = (sum[0] / win) << 16 | (sum[1] / win) << 8 | (sum[2] / win);
            dst[line * line_step + i as usize * px_step] = out;

            let add = channels(at(line, i + r + 1));
            let sub = channels(at(line, i - r));
            for k in 0..3 { sum[k] = sum[k] + add[k] - sub[k]; }
        }
    }
}

/// Separable box blur of `fb` in place; `tmp` must match its size.
pub fn box_blur(fb: &mut FrameBuffer, tmp: &mut FrameBuffer, radius: usize) {
    debug_assert_eq!((fb.width, fb.height), (tmp.width, tmp.height));
    let (w, h) = (fb.width, fb.height);
    // rows: fb -> tmp, then columns: tmp -> fb
    box_pass(&fb.pixels, &mut tmp.pixels, h, w, w, 1, radius);
    box_pass(&tmp.pixels, &mut fb.pixels, w, h, 1, w, radius);
}
