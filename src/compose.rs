// Mask compositor: turns the stroke raster (opaque stamps on transparent) into
// the two-tone mask the generation service expects.
//
// The sequence is order dependent:
//   1) fill the output with the preserve tone
//   2) destination-out the strokes (punch holes where strokes are opaque)
//   3) destination-over the editable tone (it only shows through the holes)
//
// Pixels are handled premultiplied, the same arithmetic a canvas uses.

use image::{Rgba, RgbaImage};

pub type PremulRgba8 = [u8; 4];

/// Preserve ("tone A") and editable ("tone B") colours.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaskTones {
    pub preserve: Rgba<u8>,
    pub editable: Rgba<u8>,
}

impl Default for MaskTones {
    fn default() -> Self {
        Self {
            preserve: Rgba([255, 255, 255, 255]),
            editable: Rgba([0, 0, 0, 255]),
        }
    }
}

/// dst * (1 - src.alpha)
pub fn destination_out(dst: PremulRgba8, src_alpha: u8) -> PremulRgba8 {
    if src_alpha == 0 {
        return dst;
    }
    let keep = 255u16 - u16::from(src_alpha);
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = mul_div255(u16::from(dst[i]), keep);
    }
    out
}

/// dst + src * (1 - dst.alpha)
pub fn destination_over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    if dst[3] == 255 {
        return dst;
    }
    let inv = 255u16 - u16::from(dst[3]);
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = dst[i].saturating_add(mul_div255(u16::from(src[i]), inv));
    }
    out
}

pub fn premultiply(px: Rgba<u8>) -> PremulRgba8 {
    let a = u16::from(px[3]);
    [
        mul_div255(u16::from(px[0]), a),
        mul_div255(u16::from(px[1]), a),
        mul_div255(u16::from(px[2]), a),
        px[3],
    ]
}

pub fn unpremultiply(px: PremulRgba8) -> Rgba<u8> {
    let a = px[3];
    if a == 0 {
        return Rgba([0, 0, 0, 0]);
    }
    if a == 255 {
        return Rgba(px);
    }
    let un = |c: u8| ((u32::from(c) * 255 + u32::from(a) / 2) / u32::from(a)).min(255) as u8;
    Rgba([un(px[0]), un(px[1]), un(px[2]), a])
}

/// Build the final mask at `width` x `height`.
/// The stroke raster is drawn at the origin without scaling; whatever falls
/// outside the target is ignored and uncovered target pixels count as
/// untouched. An empty stroke raster yields pure preserve tone.
pub fn composite_mask(strokes: &RgbaImage, width: u32, height: u32, tones: MaskTones) -> RgbaImage {
    let preserve = premultiply(tones.preserve);
    let editable = premultiply(tones.editable);

    let mut out = RgbaImage::new(width, height);
    for (x, y, px) in out.enumerate_pixels_mut() {
        // 1) fill
        let mut acc = preserve;
        // 2) punch
        if let Some(s) = strokes.get_pixel_checked(x, y) {
            acc = destination_out(acc, s[3]);
        }
        // 3) back-fill
        acc = destination_over(acc, editable);
        *px = unpremultiply(acc);
    }
    tracing::debug!(width, height, "mask composited");
    out
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}
