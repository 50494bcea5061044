use anyhow::{Context, Result};
use image::DynamicImage;
use ort::session::Session;

use crate::face::{self, Detection, FaceVector, RECOGNIZER_INPUT};
use crate::model::{self, ModelPaths};

/// Full pipeline: detect faces → align → encode
pub struct Pipeline {
    pub detector: Session,
    pub encoder: Session,
    pub score_threshold: f32,
    pub nms_threshold: f32,
}

impl Pipeline {
    pub fn new(paths: &ModelPaths, score_threshold: f32, nms_threshold: f32) -> Result<Self> {
        Ok(Self {
            detector: model::detector_session(&paths.detector)?,
            encoder: model::recog_session(&paths.recognizer)?,
            score_threshold,
            nms_threshold,
        })
    }

    /// Detect every face in the image, strongest first.
    pub fn locate(&mut self, img: &DynamicImage) -> Result<Vec<Detection>> {
        face::detect_faces(
            &mut self.detector,
            img,
            self.score_threshold,
            self.nms_threshold,
        )
        .context("detecting faces")
    }

    /// Embed every detected face. An image without faces yields an empty list.
    pub fn faces(&mut self, img: &DynamicImage) -> Result<Vec<FaceVector>> {
        let detections = self.locate(img)?;
        log::debug!("{} face(s) detected", detections.len());

        let mut vectors = Vec::with_capacity(detections.len());
        for detection in &detections {
            let crop = match face::align_face(img, detection, RECOGNIZER_INPUT) {
                Ok(crop) => crop,
                Err(e) => {
                    log::warn!("skipping face at {:?}: {}", detection.bbox, e);
                    continue;
                }
            };
            let vector = face::encode_face(&mut self.encoder, &crop).context("encoding face")?;
            vectors.push(vector);
        }
        Ok(vectors)
    }
}
