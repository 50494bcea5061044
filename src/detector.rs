use anyhow::Result;
use image::DynamicImage;
use photosort_vision::{FaceVector, Pipeline};

/// Turns a decoded image into one vector per detected face.
///
/// An image without faces yields `Ok(vec![])`. `Err` means this image could
/// not be analysed; callers skip it and carry on.
pub trait FaceDetector {
    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<FaceVector>>;
}

impl FaceDetector for Pipeline {
    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<FaceVector>> {
        self.faces(image)
    }
}

impl<D: FaceDetector + ?Sized> FaceDetector for &mut D {
    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<FaceVector>> {
        (**self).detect(image)
    }
}
