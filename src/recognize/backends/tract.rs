#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use tract_onnx::prelude::*;

use crate::frame::Frame;
use crate::recognize::backend::FaceEncoder;
use crate::recognize::result::FeatureVector;

/// Tract-based encoder for ONNX face-embedding models.
///
/// The model takes a `1x3xHxW` RGB tensor scaled to `0..=1` and returns either a
/// single embedding `[D]` / `[1, D]` or one row per detected face `[N, D]`. Rows
/// whose norm is zero are treated as empty detection slots.
pub struct TractEncoder {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    width: u32,
    height: u32,
}

impl TractEncoder {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
        })
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let image = frame.to_rgb_image()?;
        let resized = if image.dimensions() == (self.width, self.height) {
            image
        } else {
            image::imageops::resize(&image, self.width, self.height, FilterType::Triangle)
        };

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, self.width as usize),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        Ok(input.into_tensor())
    }

    fn extract_embeddings(&self, outputs: TVec<TValue>) -> Result<Vec<FeatureVector>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        let (rows, dim) = match shape.as_slice() {
            [d] => (1, *d),
            [n, d] => (*n, *d),
            other => return Err(anyhow!("unexpected embedding shape {:?}", other)),
        };
        let flat: Vec<f32> = view.iter().copied().collect();

        let mut embeddings = Vec::with_capacity(rows);
        for row in flat.chunks_exact(dim.max(1)).take(rows) {
            if row.iter().all(|v| *v == 0.0) {
                continue;
            }
            embeddings.push(FeatureVector::new(row.to_vec())?);
        }
        Ok(embeddings)
    }
}

impl FaceEncoder for TractEncoder {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn encode(&mut self, frame: &Frame) -> Result<Vec<FeatureVector>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.extract_embeddings(outputs)
    }
}
