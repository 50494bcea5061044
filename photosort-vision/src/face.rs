use crate::yunet;
use anyhow::Result;
use image::{DynamicImage, GenericImageView, RgbImage};
use ndarray::{Array1, Array4};
use ort::{session::Session, value::Value};

/// YuNet input side length.
pub const DETECTOR_INPUT: u32 = 640;
/// SFace input side length.
pub const RECOGNIZER_INPUT: u32 = 112;

/// Detection result from YuNet, in source image pixels
#[derive(Debug, Clone)]
pub struct Detection {
    pub bbox: [f32; 4], // x, y, w, h
    pub score: f32,
    pub landmarks: [f32; 10], // 5 points: x1,y1,x2,y2,...,x5,y5
}

/// A face embedding.
///
/// Vectors produced by [`encode_face`] are L2-normalized. Vectors are only
/// comparable with vectors of the same embedding space and dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceVector {
    pub values: Array1<f32>,
}

impl FaceVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values: Array1::from(values),
        }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    pub fn norm(&self) -> f32 {
        self.values.dot(&self.values).sqrt()
    }

    /// Scale to unit length. A zero vector is returned unchanged.
    pub fn normalized(mut self) -> Self {
        let norm = self.norm();
        if norm > 0.0 {
            self.values.mapv_inplace(|x| x / norm);
        }
        self
    }
}

impl From<Vec<f32>> for FaceVector {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

/// Planar BGR `[1, 3, side, side]` tensor with values in [0, 255].
fn bgr_tensor(img: &RgbImage, side: u32) -> Result<Array4<f32>> {
    let pixel_count = (side * side) as usize;
    let mut data = vec![0.0f32; 3 * pixel_count];
    let (b_plane, rest) = data.split_at_mut(pixel_count);
    let (g_plane, r_plane) = rest.split_at_mut(pixel_count);

    for (i, px) in img.as_raw().chunks_exact(3).take(pixel_count).enumerate() {
        r_plane[i] = px[0] as f32;
        g_plane[i] = px[1] as f32;
        b_plane[i] = px[2] as f32;
    }

    Ok(Array4::from_shape_vec(
        (1, 3, side as usize, side as usize),
        data,
    )?)
}

/// Detect faces in an image using YuNet detector
pub fn detect_faces(
    session: &mut Session,
    img: &DynamicImage,
    score_threshold: f32,
    nms_threshold: f32,
) -> Result<Vec<Detection>> {
    let target = DETECTOR_INPUT;
    let (orig_width, orig_height) = img.dimensions();
    if orig_width == 0 || orig_height == 0 {
        return Ok(vec![]);
    }

    // Letterbox onto a square canvas to avoid distortion
    let scale = target as f32 / orig_width.max(orig_height) as f32;
    let new_width = ((orig_width as f32 * scale) as u32).max(1);
    let new_height = ((orig_height as f32 * scale) as u32).max(1);
    let resized = img.resize_exact(new_width, new_height, image::imageops::FilterType::Triangle);

    let mut canvas = DynamicImage::new_rgb8(target, target);
    let offset_x = ((target - new_width) / 2) as f32;
    let offset_y = ((target - new_height) / 2) as f32;
    image::imageops::overlay(&mut canvas, &resized, offset_x as i64, offset_y as i64);

    let input = Value::from_array(bgr_tensor(&canvas.to_rgb8(), target)?)?;
    let outputs = session.run(ort::inputs![input])?;

    let mut raw: Vec<(Vec<i64>, Vec<f32>)> = Vec::new();
    for (_name, output) in outputs.iter() {
        let (shape, data) = output.try_extract_tensor::<f32>()?;
        raw.push((shape.iter().copied().collect(), data.to_vec()));
    }
    let refs: Vec<(&[i64], &[f32])> = raw
        .iter()
        .map(|(s, d)| (s.as_slice(), d.as_slice()))
        .collect();

    let scales = yunet::parse_outputs(&refs, target as usize)?;
    let decoded = yunet::decode(&scales, score_threshold, target as usize)?;

    // Back from normalized canvas coordinates to source pixels
    let to_source = |v: f32, offset: f32| (v * target as f32 - offset) / scale;
    let detections: Vec<Detection> = decoded
        .into_iter()
        .map(|d| {
            let mut landmarks = [0.0f32; 10];
            for i in 0..5 {
                landmarks[i * 2] = to_source(d.landmarks[i * 2], offset_x);
                landmarks[i * 2 + 1] = to_source(d.landmarks[i * 2 + 1], offset_y);
            }
            Detection {
                bbox: [
                    to_source(d.bbox[0], offset_x),
                    to_source(d.bbox[1], offset_y),
                    d.bbox[2] * target as f32 / scale,
                    d.bbox[3] * target as f32 / scale,
                ],
                score: d.score,
                landmarks,
            }
        })
        .collect();

    if nms_threshold < 1.0 {
        return Ok(nms(&detections, nms_threshold));
    }
    Ok(detections)
}

/// Apply non-maximum suppression to remove overlapping detections
pub fn nms(detections: &[Detection], iou_threshold: f32) -> Vec<Detection> {
    let mut sorted = detections.to_vec();
    sorted.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<Detection> = Vec::new();
    for candidate in sorted {
        if keep
            .iter()
            .all(|kept| compute_iou(&kept.bbox, &candidate.bbox) <= iou_threshold)
        {
            keep.push(candidate);
        }
    }
    keep
}

fn compute_iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = (a[0] + a[2]).min(b[0] + b[2]);
    let y2 = (a[1] + a[3]).min(b[1] + b[3]);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let inter = (x2 - x1) * (y2 - y1);
    inter / (a[2] * a[3] + b[2] * b[3] - inter)
}

/// Align and crop a face to `size`x`size` by mapping the eyes onto the
/// ArcFace reference positions.
pub fn align_face(img: &DynamicImage, detection: &Detection, size: u32) -> Result<DynamicImage> {
    // Reference eyes for a 112x112 crop
    let ref_left_eye = (38.3_f32, 51.7_f32);
    let ref_right_eye = (73.5_f32, 51.5_f32);

    let left_eye = (detection.landmarks[0], detection.landmarks[1]);
    let right_eye = (detection.landmarks[2], detection.landmarks[3]);

    let eye_dx = right_eye.0 - left_eye.0;
    let eye_dy = right_eye.1 - left_eye.1;
    let eye_dist = (eye_dx * eye_dx + eye_dy * eye_dy).sqrt();
    if eye_dist <= f32::EPSILON {
        anyhow::bail!("degenerate landmarks: eyes coincide");
    }
    let angle = eye_dy.atan2(eye_dx);

    let ref_eye_dist = ((ref_right_eye.0 - ref_left_eye.0).powi(2)
        + (ref_right_eye.1 - ref_left_eye.1).powi(2))
    .sqrt();
    let unit = size as f32 / RECOGNIZER_INPUT as f32;
    let scale = unit * ref_eye_dist / eye_dist;

    let eye_center = (
        (left_eye.0 + right_eye.0) / 2.0,
        (left_eye.1 + right_eye.1) / 2.0,
    );
    let target_center = (
        (ref_left_eye.0 + ref_right_eye.0) / 2.0 * unit,
        (ref_left_eye.1 + ref_right_eye.1) / 2.0 * unit,
    );

    // out = [a b; c d] * in + [tx, ty]
    let a = scale * angle.cos();
    let b = scale * angle.sin();
    let c = -b;
    let d = a;
    let tx = target_center.0 - (a * eye_center.0 + b * eye_center.1);
    let ty = target_center.1 - (c * eye_center.0 + d * eye_center.1);
    let det = a * d - b * c;

    let (img_w, img_h) = img.dimensions();
    let mut output = RgbImage::new(size, size);

    for out_y in 0..size {
        for out_x in 0..size {
            let px = out_x as f32 - tx;
            let py = out_y as f32 - ty;
            let in_x = (d * px - b * py) / det;
            let in_y = (-c * px + a * py) / det;

            if in_x < 0.0 || in_y < 0.0 || in_x >= img_w as f32 || in_y >= img_h as f32 {
                continue;
            }

            // Bilinear sample
            let x0 = in_x.floor() as u32;
            let y0 = in_y.floor() as u32;
            let x1 = (x0 + 1).min(img_w - 1);
            let y1 = (y0 + 1).min(img_h - 1);
            let fx = in_x - x0 as f32;
            let fy = in_y - y0 as f32;

            let taps = [
                (img.get_pixel(x0, y0), (1.0 - fx) * (1.0 - fy)),
                (img.get_pixel(x1, y0), fx * (1.0 - fy)),
                (img.get_pixel(x0, y1), (1.0 - fx) * fy),
                (img.get_pixel(x1, y1), fx * fy),
            ];
            let mut rgb = [0u8; 3];
            for (ch, value) in rgb.iter_mut().enumerate() {
                *value = taps
                    .iter()
                    .map(|(p, w)| p[ch] as f32 * w)
                    .sum::<f32>() as u8;
            }
            output.put_pixel(out_x, out_y, image::Rgb(rgb));
        }
    }

    Ok(DynamicImage::ImageRgb8(output))
}

/// Encode an aligned face crop with SFace into a normalized [`FaceVector`]
pub fn encode_face(session: &mut Session, face_img: &DynamicImage) -> Result<FaceVector> {
    let side = RECOGNIZER_INPUT;
    let face_rgb = face_img
        .resize_exact(side, side, image::imageops::FilterType::Triangle)
        .to_rgb8();

    let input = Value::from_array(bgr_tensor(&face_rgb, side)?)?;
    let outputs = session.run(ort::inputs![input])?;
    let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;

    // Expecting [1, 128]
    let dim = if shape.len() == 2 {
        shape[1] as usize
    } else {
        data.len()
    };

    Ok(FaceVector::new(data[..dim].to_vec()).normalized())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(bbox: [f32; 4], score: f32) -> Detection {
        Detection {
            bbox,
            score,
            landmarks: [0.0; 10],
        }
    }

    #[test]
    fn test_iou() {
        let a = [10.0, 10.0, 20.0, 20.0];
        let b = [15.0, 15.0, 20.0, 20.0];
        let iou = compute_iou(&a, &b);
        assert!(iou > 0.0 && iou < 1.0);

        let c = [100.0, 100.0, 10.0, 10.0];
        assert_eq!(compute_iou(&a, &c), 0.0);
        assert!((compute_iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_nms() {
        let detections = vec![
            det([10.0, 10.0, 20.0, 20.0], 0.9),
            det([12.0, 12.0, 20.0, 20.0], 0.8),
            det([100.0, 100.0, 20.0, 20.0], 0.85),
        ];

        let kept = nms(&detections, 0.3);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].score, 0.9);
        assert_eq!(kept[1].score, 0.85);
    }

    #[test]
    fn nms_of_nothing_is_nothing() {
        assert!(nms(&[], 0.3).is_empty());
    }

    #[test]
    fn normalized_vector_has_unit_length() {
        let v = FaceVector::new(vec![3.0, 4.0]).normalized();
        assert!((v.norm() - 1.0).abs() < 1e-6);
        assert!((v.values[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_stays_zero() {
        let v = FaceVector::new(vec![0.0; 4]).normalized();
        assert_eq!(v.norm(), 0.0);
        assert_eq!(v.dim(), 4);
    }

    #[test]
    fn align_rejects_coincident_eyes() {
        let img = DynamicImage::new_rgb8(64, 64);
        let d = det([0.0, 0.0, 64.0, 64.0], 0.9);
        assert!(align_face(&img, &d, 112).is_err());
    }

    #[test]
    fn align_produces_requested_size() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 200, image::Rgb([90, 120, 150])));
        let mut d = det([50.0, 50.0, 100.0, 100.0], 0.9);
        d.landmarks[..4].copy_from_slice(&[80.0, 90.0, 120.0, 90.0]);
        let aligned = align_face(&img, &d, 112).unwrap();
        assert_eq!(aligned.dimensions(), (112, 112));
        let center = aligned.get_pixel(56, 56);
        assert!((center[0] as i32 - 90).abs() <= 1);
    }
}
