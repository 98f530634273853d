// Source image + viewport sync.
// The image is shown scaled down to fit the window (never up), below the HUD
// band. The drawing surface must always match that rendered size exactly,
// otherwise strokes and the mask land in the wrong place.

use std::path::Path;

use image::imageops::FilterType;
use image::{ImageFormat, RgbaImage};

use crate::error::{Error, Result};
use crate::stroke::StrokeRenderer;
use crate::types::SurfaceRect;

/// Height of the HUD strip at the top of the window.
pub const HUD_BAND: u32 = 20;
/// Gap between the image and the window border.
pub const MARGIN: u32 = 8;

/// The user's photo: natural pixels plus the copy scaled to its rendered size.
pub struct SourceImage {
    natural: RgbaImage,
    rendered: RgbaImage,
}

impl SourceImage {
    /// Decode an upload. Only JPEG and PNG are accepted.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let format = image::guess_format(bytes)
            .map_err(|_| Error::InvalidInputFormat("unrecognised image data".into()))?;
        if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
            return Err(Error::InvalidInputFormat(format!("{format:?}")));
        }
        let decoded = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| Error::ImageDecode(e.to_string()))?;
        Ok(Self::from_rgba(decoded.to_rgba8()))
    }

    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| Error::ImageDecode(format!("{}: {e}", path.display())))?;
        Self::from_bytes(&bytes)
    }

    /// Start out rendered at natural size until the first layout pass.
    pub fn from_rgba(natural: RgbaImage) -> Self {
        let rendered = natural.clone();
        Self { natural, rendered }
    }

    pub fn natural_size(&self) -> (u32, u32) {
        self.natural.dimensions()
    }

    pub fn rendered_size(&self) -> (u32, u32) {
        self.rendered.dimensions()
    }

    /// What the window currently shows.
    pub fn rendered(&self) -> &RgbaImage {
        &self.rendered
    }

    /// A rendered size of zero means the image cannot be shown (or submitted).
    pub fn is_complete(&self) -> bool {
        let (w, h) = self.rendered_size();
        w > 0 && h > 0
    }

    /// Set the rendered size, resampling from the natural pixels.
    pub fn set_rendered_size(&mut self, width: u32, height: u32) -> bool {
        if self.rendered_size() == (width, height) {
            return false;
        }
        self.rendered = if (width, height) == self.natural_size() {
            self.natural.clone()
        } else {
            image::imageops::resize(&self.natural, width, height, FilterType::Triangle)
        };
        true
    }

    /// Fixed-size copy of the currently rendered pixels (not the natural ones),
    /// so the snapshot and the mask share dimensions.
    pub fn freeze(&self) -> RgbaImage {
        self.rendered.clone()
    }
}

/// Largest size with the same aspect ratio that fits `max`; never upscales.
pub fn fit_within(natural: (u32, u32), max: (u32, u32)) -> (u32, u32) {
    let (nw, nh) = natural;
    let (mw, mh) = max;
    if nw == 0 || nh == 0 || mw == 0 || mh == 0 {
        return (0, 0);
    }
    if nw <= mw && nh <= mh {
        return natural;
    }
    let scale = (mw as f64 / nw as f64).min(mh as f64 / nh as f64);
    let w = ((nw as f64 * scale).floor() as u32).clamp(1, mw);
    let h = ((nh as f64 * scale).floor() as u32).clamp(1, mh);
    (w, h)
}

/// Where the image (and the surface on top of it) sits in a window.
pub fn layout(image: &SourceImage, window: (usize, usize)) -> SurfaceRect {
    let avail_w = (window.0 as u32).saturating_sub(2 * MARGIN);
    let avail_h = (window.1 as u32).saturating_sub(HUD_BAND + 2 * MARGIN);
    let (w, h) = fit_within(image.natural_size(), (avail_w, avail_h));
    SurfaceRect {
        left: MARGIN as f32,
        top: (HUD_BAND + MARGIN) as f32,
        width: w as f32,
        height: h as f32,
    }
}

/// Run on image load and on every window resize: re-lay the image out and
/// make the drawing surface match its rendered size. No-op without an image.
/// Returns the surface rectangle when an image is present.
pub fn sync(
    image: Option<&mut SourceImage>,
    window: (usize, usize),
    renderer: &mut StrokeRenderer,
) -> Option<SurfaceRect> {
    let image = image?;
    let rect = layout(image, window);
    image.set_rendered_size(rect.width as u32, rect.height as u32);
    if !image.is_complete() {
        return None;
    }

    let (w, h) = image.rendered_size();
    if renderer.resize(w, h) {
        tracing::info!(width = w, height = h, "drawing surface resized to rendered image");
    }
    debug_assert_eq!(renderer.dimensions(), (w, h));
    Some(rect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::io::Cursor;

    fn encoded(format: ImageFormat, w: u32, h: u32) -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(w, h, image::Rgb([10, 20, 30])));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    #[test]
    fn accepts_jpeg_and_png_only() {
        let jpg = SourceImage::from_bytes(&encoded(ImageFormat::Jpeg, 400, 300)).unwrap();
        assert_eq!(jpg.natural_size(), (400, 300));
        assert!(SourceImage::from_bytes(&encoded(ImageFormat::Png, 8, 8)).is_ok());

        let bmp = SourceImage::from_bytes(&encoded(ImageFormat::Bmp, 8, 8));
        assert!(matches!(bmp, Err(Error::InvalidInputFormat(_))));
        let junk = SourceImage::from_bytes(b"definitely not an image");
        assert!(matches!(junk, Err(Error::InvalidInputFormat(_))));
    }

    #[test]
    fn fit_keeps_aspect_and_never_upscales() {
        assert_eq!(fit_within((400, 300), (800, 600)), (400, 300));
        assert_eq!(fit_within((1600, 1200), (800, 800)), (800, 600));
        assert_eq!(fit_within((1000, 2000), (500, 500)), (250, 500));
        assert_eq!(fit_within((10, 10), (0, 50)), (0, 0));
    }

    #[test]
    fn surface_tracks_rendered_size_across_resizes() {
        let mut img = SourceImage::from_rgba(RgbaImage::from_pixel(1600, 1200, Rgba([1, 2, 3, 255])));
        let mut r = StrokeRenderer::new(0, 0, 10);

        for window in [(800, 600), (400, 700), (1920, 1080), (333, 222), (800, 600)] {
            let rect = sync(Some(&mut img), window, &mut r).unwrap();
            assert_eq!(r.dimensions(), img.rendered_size());
            assert_eq!((rect.width as u32, rect.height as u32), img.rendered_size());
            assert!(rect.width as u32 <= window.0 as u32);
        }
    }

    #[test]
    fn sync_without_image_is_noop() {
        let mut r = StrokeRenderer::new(12, 34, 10);
        assert!(sync(None, (800, 600), &mut r).is_none());
        assert_eq!(r.dimensions(), (12, 34));
    }

    #[test]
    fn freeze_matches_rendered_not_natural() {
        let mut img = SourceImage::from_rgba(RgbaImage::new(1000, 500));
        img.set_rendered_size(400, 200);
        assert_eq!(img.freeze().dimensions(), (400, 200));
        assert_eq!(img.natural_size(), (1000, 500));
    }
}
