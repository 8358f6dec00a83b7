use image::DynamicImage;

pub mod flatten;

pub trait ImageModifier {
  /// Returns `None` when the image is left untouched.
  fn apply(&self, img: &DynamicImage) -> Result<Option<DynamicImage>, Box<dyn std::error::Error>>;
}
