use burn::{module::AutodiffModule, prelude::*, tensor::backend::AutodiffBackend};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::{Translator, training::Pix2Pix};
use crate::utils;

/// File name a single prediction is written to inside the output directory.
pub const PREDICTION_FILE: &str = "image.png";

/// Runs a generator that lives on a non-autodiff backend, so normalization uses its
/// running statistics and dropout is disabled.
pub fn predict<B: Backend, G: Translator<B>>(generator: &G, input: Tensor<B, 4>) -> Tensor<B, 4> {
    generator.translate(input)
}

/// Predicts for `input` and writes the denormalized first image to `save_dir/image.png`.
pub fn predict_to_file<B: Backend, G: Translator<B>>(
    generator: &G,
    input: Tensor<B, 4>,
    save_dir: &Path,
) -> Result<PathBuf> {
    std::fs::create_dir_all(save_dir)?;
    let path = save_dir.join(PREDICTION_FILE);
    utils::save_prediction(predict(generator, input), &path)?;
    Ok(path)
}

impl<B, G, OG, OD> Pix2Pix<B, G, OG, OD>
where
    B: AutodiffBackend,
    G: AutodiffModule<B>,
    G::InnerModule: Translator<B::InnerBackend>,
{
    /// Inference-mode forward pass of the current generator.
    pub fn predict(&self, input: Tensor<B::InnerBackend, 4>) -> Tensor<B::InnerBackend, 4> {
        predict(&self.generator.valid(), input)
    }

    pub fn predict_to_file(
        &self,
        input: Tensor<B::InnerBackend, 4>,
        save_dir: &Path,
    ) -> Result<PathBuf> {
        predict_to_file(&self.generator.valid(), input, save_dir)
    }
}
