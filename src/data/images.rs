// ============================================================
// Layer 4 — Image Materializer
// ============================================================
// Turns image references into one flat channel-first buffer
// ready to become a [n, 3, H, W] tensor.
//
// FsImageSource decodes a file with the `image` crate, resizes
// it to H×W (triangle filter), and reorders HWC bytes into CHW
// floats. Pixel values stay in 0..=255: the frozen extractor
// is trained on raw intensities.
//
// `materialize` decodes the references of one batch in parallel
// with rayon. Output position i always belongs to refs[i], and
// the first failure aborts the whole batch. A missing image is
// never zero-filled.
//
// Reference: image crate docs, rayon docs (par_iter)

use anyhow::Result;
use image::imageops::FilterType;
use rayon::prelude::*;
use std::path::PathBuf;

use crate::domain::{error::PipelineError, traits::ImageSource};

pub const CHANNELS: usize = 3;

// ─── FsImageSource ────────────────────────────────────────────────────────────
pub struct FsImageSource {
    root:   PathBuf,
    height: usize,
    width:  usize,
}

impl FsImageSource {
    pub fn new(root: impl Into<PathBuf>, height: usize, width: usize) -> Self {
        Self { root: root.into(), height, width }
    }
}

impl ImageSource for FsImageSource {
    fn shape(&self) -> [usize; 3] {
        [CHANNELS, self.height, self.width]
    }

    fn load(&self, image: &str) -> Result<Vec<f32>> {
        let path = self.root.join(image);
        let img = image::open(&path).map_err(|e| PipelineError::ImageLoad {
            image:  path.display().to_string(),
            reason: e.to_string(),
        })?;

        let rgb = img
            .resize_exact(self.width as u32, self.height as u32, FilterType::Triangle)
            .to_rgb8();
        Ok(hwc_to_chw(rgb.as_raw(), self.height, self.width))
    }
}

/// Interleaved RGB bytes → planar float channels.
pub fn hwc_to_chw(raw: &[u8], height: usize, width: usize) -> Vec<f32> {
    let plane = height * width;
    let mut out = vec![0.0f32; CHANNELS * plane];
    for (p, px) in raw.chunks_exact(CHANNELS).enumerate() {
        for (c, &v) in px.iter().enumerate() {
            out[c * plane + p] = v as f32;
        }
    }
    out
}

// ─── materialize ──────────────────────────────────────────────────────────────
/// Pixels of one batch, row-major [n, C, H, W].
#[derive(Debug, Clone)]
pub struct ImageBatch {
    pub data:  Vec<f32>,
    pub shape: [usize; 4],
}

pub fn materialize(source: &dyn ImageSource, refs: &[String]) -> Result<ImageBatch> {
    let [c, h, w] = source.shape();
    let per_image = c * h * w;

    let images: Vec<Vec<f32>> = refs
        .par_iter()
        .map(|r| {
            let pixels = source.load(r)?;
            if pixels.len() != per_image {
                return Err(PipelineError::ShapeMismatch {
                    name:     r.clone(),
                    expected: vec![c, h, w],
                    actual:   vec![pixels.len()],
                }
                .into());
            }
            Ok(pixels)
        })
        .collect::<Result<_>>()?;

    let mut data = Vec::with_capacity(refs.len() * per_image);
    for img in images {
        data.extend_from_slice(&img);
    }
    Ok(ImageBatch { data, shape: [refs.len(), c, h, w] })
}
