use burn::prelude::*;
use image::{Rgb, RgbImage, imageops};
use imageproc::{drawing::draw_filled_rect_mut, rect::Rect};
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::constants::CHANNELS;

const SEPARATOR: u32 = 4;

/// Maps a network value in [-1, 1] back to [0, 1].
pub fn denormalize(value: f32) -> f32 {
    (value * 0.5 + 0.5).clamp(0.0, 1.0)
}

/// Builds an RGB image from normalized HWC values.
pub fn float_vec_to_image(data: &[f32], height: usize, width: usize) -> Result<RgbImage> {
    let expected = width * height * CHANNELS;
    if data.len() != expected {
        return Err(Error::InvalidImageData {
            expected,
            actual: data.len(),
        });
    }

    let raw_pixels: Vec<u8> = data
        .iter()
        .map(|&value| (denormalize(value) * 255.0).round() as u8)
        .collect();

    RgbImage::from_raw(width as u32, height as u32, raw_pixels).ok_or(Error::InvalidImageData {
        expected,
        actual: data.len(),
    })
}

/// Converts a `[C, H, W]` tensor in [-1, 1] into an RGB image.
pub fn tensor_to_image<B: Backend>(tensor: Tensor<B, 3>) -> Result<RgbImage> {
    let [channels, height, width] = tensor.dims();
    if channels != CHANNELS {
        return Err(Error::InvalidImageData {
            expected: CHANNELS * height * width,
            actual: channels * height * width,
        });
    }
    let values: Vec<f32> = tensor.permute([1, 2, 0]).into_data().iter::<f32>().collect();
    float_vec_to_image(&values, height, width)
}

/// Writes the first image of a `[batch, C, H, W]` prediction to `path`.
pub fn save_prediction<B: Backend, P: AsRef<Path>>(batch: Tensor<B, 4>, path: P) -> Result<()> {
    let [_, channels, height, width] = batch.dims();
    let first = batch.slice([0..1]).reshape([channels, height, width]);
    tensor_to_image(first)?.save(path)?;
    Ok(())
}

/// Lays images side by side on a white background, left to right.
pub fn comparison_strip(images: &[RgbImage]) -> Option<RgbImage> {
    let height = images.iter().map(|img| img.height()).max()?;
    let width = images.iter().map(|img| img.width()).sum::<u32>()
        + SEPARATOR * (images.len() as u32 - 1);

    let mut canvas = RgbImage::new(width, height);
    draw_filled_rect_mut(
        &mut canvas,
        Rect::at(0, 0).of_size(width, height),
        Rgb([255, 255, 255]),
    );

    let mut x = 0;
    for img in images {
        imageops::replace(&mut canvas, img, x, 0);
        x += (img.width() + SEPARATOR) as i64;
    }
    Some(canvas)
}
