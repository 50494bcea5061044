//! YuNet post-processing.
//!
//! YuNet is anchor-free: every cell of the stride-8/16/32 grids predicts a
//! score, a box and five landmarks relative to the cell itself. The model
//! emits twelve tensors in the order `cls_{8,16,32}`, `obj_{8,16,32}`,
//! `bbox_{8,16,32}`, `kps_{8,16,32}`, each shaped `[1, H*W, C]`.

use anyhow::Result;
use ndarray::Array2;

pub const STRIDES: [usize; 3] = [8, 16, 32];

/// A detection in coordinates normalized to the square model input.
#[derive(Debug, Clone)]
pub struct RawDetection {
    pub bbox: [f32; 4], // x, y, w, h
    pub score: f32,
    pub landmarks: [f32; 10],
}

/// Per-stride prediction maps.
#[derive(Debug, Clone)]
pub struct ScaleOutput {
    pub stride: usize,
    pub scores: Array2<f32>,    // [cells, 1]
    pub boxes: Array2<f32>,     // [cells, 4]
    pub landmarks: Array2<f32>, // [cells, 10]
}

fn tensor(
    outputs: &[(&[i64], &[f32])],
    index: usize,
    cells: usize,
    channels: usize,
    name: &str,
) -> Result<Array2<f32>> {
    let (shape, data) = outputs
        .get(index)
        .ok_or_else(|| anyhow::anyhow!("missing {} output at index {}", name, index))?;
    if shape.len() != 3 || shape[0] != 1 || shape[2] != channels as i64 {
        anyhow::bail!(
            "unexpected {} shape at index {}: {:?}, expected [1, {}, {}]",
            name,
            index,
            shape,
            cells,
            channels
        );
    }
    if shape[1] != cells as i64 {
        anyhow::bail!(
            "expected {} cells for {} at index {}, got {}",
            cells,
            name,
            index,
            shape[1]
        );
    }
    Ok(Array2::from_shape_vec((cells, channels), data.to_vec())?)
}

/// Split the raw model outputs into one [`ScaleOutput`] per stride.
///
/// Scores are `sigmoid(cls * obj)`.
pub fn parse_outputs(outputs: &[(&[i64], &[f32])], input_size: usize) -> Result<Vec<ScaleOutput>> {
    let n = STRIDES.len();
    STRIDES
        .iter()
        .enumerate()
        .map(|(i, &stride)| {
            let side = input_size / stride;
            let cells = side * side;
            let cls = tensor(outputs, i, cells, 1, "cls")?;
            let obj = tensor(outputs, i + n, cells, 1, "obj")?;
            let mut scores = cls * obj;
            scores.mapv_inplace(sigmoid);
            Ok::<_, anyhow::Error>(ScaleOutput {
                stride,
                scores,
                boxes: tensor(outputs, i + 2 * n, cells, 4, "bbox")?,
                landmarks: tensor(outputs, i + 3 * n, cells, 10, "kps")?,
            })
        })
        .collect()
}

/// Decode every grid cell scoring at least `score_threshold`.
pub fn decode(
    scales: &[ScaleOutput],
    score_threshold: f32,
    input_size: usize,
) -> Result<Vec<RawDetection>> {
    let size = input_size as f32;
    let mut detections = Vec::new();

    for scale in scales {
        let side = input_size / scale.stride;
        let cells = scale.scores.nrows();
        if cells != side * side {
            anyhow::bail!(
                "expected {} cells for stride {} ({}x{} grid), got {}",
                side * side,
                scale.stride,
                side,
                side,
                cells
            );
        }
        let stride = scale.stride as f32;

        for idx in 0..cells {
            let score = scale.scores[[idx, 0]];
            if score < score_threshold {
                continue;
            }
            let row = (idx / side) as f32;
            let col = (idx % side) as f32;

            let b = scale.boxes.row(idx);
            let cx = (col + b[0]) * stride / size;
            let cy = (row + b[1]) * stride / size;
            let w = b[2] * stride / size;
            let h = b[3] * stride / size;

            let kps = scale.landmarks.row(idx);
            let mut landmarks = [0.0f32; 10];
            for k in 0..5 {
                landmarks[k * 2] = (col + kps[k * 2]) * stride / size;
                landmarks[k * 2 + 1] = (row + kps[k * 2 + 1]) * stride / size;
            }

            detections.push(RawDetection {
                bbox: [cx - w / 2.0, cy - h / 2.0, w, h],
                score,
                landmarks,
            });
        }
    }

    Ok(detections)
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
