use image::{imageops, DynamicImage, Rgba, RgbaImage};

use super::ImageModifier;

/// Composites a translucent image onto an opaque background and drops the
/// alpha channel. Opaque images are converted to RGB as they are.
pub struct FlattenModifier {
  background: [u8; 3],
}

impl FlattenModifier {
  pub fn new(background: [u8; 3]) -> FlattenModifier {
    FlattenModifier { background }
  }

  pub fn white() -> FlattenModifier {
    FlattenModifier::new([255, 255, 255])
  }
}

impl ImageModifier for FlattenModifier {
  fn apply(&self, img: &DynamicImage) -> Result<Option<DynamicImage>, Box<dyn std::error::Error>> {
    if !img.color().has_alpha() {
      if matches!(img, DynamicImage::ImageRgb8(_)) {
        return Ok(None);
      }
      return Ok(Some(DynamicImage::ImageRgb8(img.to_rgb8())));
    }

    let [r, g, b] = self.background;
    let mut canvas = RgbaImage::from_pixel(img.width(), img.height(), Rgba([r, g, b, 255]));
    imageops::overlay(&mut canvas, &img.to_rgba8(), 0, 0);

    Ok(Some(DynamicImage::ImageRgb8(
      DynamicImage::ImageRgba8(canvas).to_rgb8(),
    )))
  }
}
