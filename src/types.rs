// Core types shared by the mapper, the stroke renderer and the window.

/// What the window shows each frame.
#[derive(Clone)]
pub struct FrameBuffer {
    pub width: usize,      // window width (pixels)
    pub height: usize,     // window height (pixels)
    pub pixels: Vec<u32>,  // each entry is 0x00RRGGBB for minifb
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, pixels: vec![0u32; width * height] }
    }

    /// Reallocate only when the window size actually changed.
    pub fn resize(&mut self, width: usize, height: usize) {
        if self.width == width && self.height == height {
            return;
        }
        self.width = width;
        self.height = height;
        self.pixels = vec![0u32; width * height];
    }

    pub fn fill(&mut self, color: u32) {
        for p in &mut self.pixels { *p = color; }
    }
}

/// Pack an RGBA pixel as 0x00RRGGBB (alpha dropped).
#[inline]
pub fn pack_rgb(px: &image::Rgba<u8>) -> u32 {
    ((px[0] as u32) << 16) | ((px[1] as u32) << 8) | px[2] as u32
}

/// Screen-space bounding rectangle of the drawing surface inside the window.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SurfaceRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl SurfaceRect {
    /// Translate a viewport (client) position into surface-local coordinates.
    #[inline]
    pub fn local(&self, client_x: f32, client_y: f32) -> (f32, f32) {
        (client_x - self.left, client_y - self.top)
    }

    pub fn contains(&self, client_x: f32, client_y: f32) -> bool {
        client_x >= self.left
            && client_y >= self.top
            && client_x < self.left + self.width
            && client_y < self.top + self.height
    }
}

/// Precomputed hard-edged disc we stamp into the drawing surface.
/// Pixel centres inside the radius are fully on; nothing is feathered, so the
/// stroke raster stays strictly binary.
pub struct Stamp {
    pub radius: i32,      // pixels from center to edge
    pub coverage: Vec<bool>, // (2r+1)*(2r+1), centered kernel
}

impl Stamp {
    pub fn disc(radius: i32) -> Self {
        let radius = radius.max(0);
        let d = 2 * radius + 1;
        let r2 = (radius * radius) as f32;
        let mut coverage = Vec::with_capacity((d * d) as usize);
        for y in -radius..=radius {
            for x in -radius..=radius {
                let d2 = (x * x + y * y) as f32;
                coverage.push(d2 <= r2);
            }
        }
        Self { radius, coverage }
    }

    /// Side length of the kernel.
    #[inline]
    pub fn diameter(&self) -> i32 {
        2 * self.radius + 1
    }
}

/// Count pixels whose alpha is non-zero.
#[cfg(test)]
pub fn opaque_pixel_count(raster: &image::RgbaImage) -> usize {
    raster.pixels().filter(|p| p[3] > 0).count()
}
