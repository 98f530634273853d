// Lookup tables for gamma-correct mixing of the stroke overlay into the photo.
// Mixing in linear light keeps the overlay edge from looking dark and muddy.

pub struct GammaLut {
    // sRGB(0..255) -> linear (0..1)
    to_linear: [f32; 256],
    // linear(0..1) -> sRGB(0..255), quantized to 4096 steps
    to_srgb: [u8; 4096],
}

impl Default for GammaLut {
    fn default() -> Self {
        Self::new()
    }
}

impl GammaLut {
    pub fn new() -> Self {
        let to_linear = std::array::from_fn(|v| {
            let c = v as f32 / 255.0;
            if c <= 0.04045 { c / 12.92 } else { ((c + 0.055) / 1.055).powf(2.4) }
        });
        let to_srgb = std::array::from_fn(|i| {
            let l = i as f32 / 4095.0;
            let s = if l <= 0.003_130_8 { 12.92 * l } else { 1.055 * l.powf(1.0 / 2.4) - 0.055 };
            (s * 255.0).round().clamp(0.0, 255.0) as u8
        });
        Self { to_linear, to_srgb }
    }

    #[inline]
    pub fn linear(&self, v: u8) -> f32 {
        self.to_linear[v as usize]
    }

    #[inline]
    pub fn srgb(&self, l: f32) -> u8 {
        self.to_srgb[(l.clamp(0.0, 1.0) * 4095.0).round() as usize]
    }

    /// Mix two 0x00RRGGBB pixels: `t = 0` keeps `base`, `t = 1` gives `top`.
    pub fn mix_rgb(&self, base: u32, top: u32, t: f32) -> u32 {
        let t = t.clamp(0.0, 1.0);
        if t <= 0.0 { return base; }
        if t >= 1.0 { return top; }
        let mut out = 0u32;
        for shift in [16u32, 8, 0] {
            let b = self.linear(((base >> shift) & 0xFF) as u8);
            let f = self.linear(((top >> shift) & 0xFF) as u8);
            let c = self.srgb(b + (f - b) * t) as u32;
            out |= c << shift;
        }
        out
    }
}
