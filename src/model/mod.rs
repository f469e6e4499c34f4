pub mod blocks;
pub mod checkpoint;
pub mod constants;
pub mod data;
pub mod discriminator;
pub mod generator;
pub mod inference;
pub mod loss;
pub mod resnet;
pub mod training;

use burn::prelude::*;

/// An image-to-image network: `[batch, 3, H, W]` in, `[batch, 3, H, W]` out.
pub trait Translator<B: Backend>: Module<B> {
    fn translate(&self, input: Tensor<B, 4>) -> Tensor<B, 4>;
}
