use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use image::{ImageReader, imageops::FilterType};
use std::path::{Path, PathBuf};

use crate::error::{self, Error};
use crate::model::constants::{CHANNELS, HEIGHT, WIDTH};

/// Spatial size every image is resized to before it reaches the networks.
#[derive(Config, Debug, PartialEq)]
pub struct ImageSize {
    #[config(default = "WIDTH")]
    pub width: usize,
    #[config(default = "HEIGHT")]
    pub height: usize,
}

/// One (input, target) pair in HWC order, normalized to [-1, 1].
#[derive(Debug, Clone)]
pub struct PairItem {
    pub input: Vec<f32>,
    pub target: Vec<f32>,
}

/// Lists the decodable image files of a directory in name order.
pub fn list_images<P: AsRef<Path>>(dir: P) -> error::Result<Vec<PathBuf>> {
    let mut image_paths = Vec::new();
    for entry in std::fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if path.is_file() {
            if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
                match ext.to_lowercase().as_str() {
                    "jpg" | "jpeg" | "png" | "bmp" | "tiff" => image_paths.push(path),
                    _ => {}
                }
            }
        }
    }
    image_paths.sort();
    Ok(image_paths)
}

/// Decodes an RGB image, resizes it to `size` and normalizes it to [-1, 1] (HWC order).
pub fn load_normalized<P: AsRef<Path>>(path: P, size: &ImageSize) -> error::Result<Vec<f32>> {
    let image = ImageReader::open(path)?
        .decode()?
        .resize_exact(size.width as u32, size.height as u32, FilterType::Triangle)
        .to_rgb8();
    Ok(image
        .pixels()
        .flat_map(|pixel| pixel.0)
        .map(|value| value as f32 / 127.5 - 1.0)
        .collect())
}

/// Converts normalized HWC values into a `[1, C, H, W]` tensor.
pub fn hwc_to_tensor<B: Backend>(
    values: Vec<f32>,
    size: &ImageSize,
    device: &B::Device,
) -> error::Result<Tensor<B, 4>> {
    let expected = size.height * size.width * CHANNELS;
    if values.len() != expected {
        return Err(Error::InvalidImageData {
            expected,
            actual: values.len(),
        });
    }
    let image = Tensor::<B, 3>::from_data(
        TensorData::new(values, [size.height, size.width, CHANNELS]).convert::<B::FloatElem>(),
        device,
    );
    Ok(image.permute([2, 0, 1]).unsqueeze::<4>())
}

/// Loads one image as a single-item batch ready for prediction.
pub fn load_single_image<B: Backend, P: AsRef<Path>>(
    path: P,
    size: &ImageSize,
    device: &B::Device,
) -> error::Result<Tensor<B, 4>> {
    hwc_to_tensor(load_normalized(path, size)?, size, device)
}

/// Paths of paired images, split into training and test lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitPaths {
    pub train_inputs: Vec<PathBuf>,
    pub train_reals: Vec<PathBuf>,
    pub test_inputs: Vec<PathBuf>,
    pub test_reals: Vec<PathBuf>,
}

/// Training mask over `len` real images: ten blocks of 80% train followed by 20% test.
///
/// The mask covers `len / 100 * 100` entries; anything past that is in neither split.
pub fn train_mask(len: usize) -> Vec<bool> {
    let block = len / 100;
    (0..10)
        .flat_map(|_| {
            std::iter::repeat_n(true, block * 8).chain(std::iter::repeat_n(false, block * 2))
        })
        .collect()
}

/// Splits `real_paths` and `input_paths` with [`train_mask`], the input mask repeated
/// `repeat_real` times because each real image is paired with that many inputs.
pub fn split_train_test(
    input_paths: &[PathBuf],
    real_paths: &[PathBuf],
    repeat_real: usize,
) -> SplitPaths {
    let mask = train_mask(real_paths.len());
    let input_mask = mask.repeat(repeat_real);

    let mut split = SplitPaths::default();
    for (path, &train) in real_paths.iter().zip(&mask) {
        if train {
            split.train_reals.push(path.clone());
        } else {
            split.test_reals.push(path.clone());
        }
    }
    for (path, &train) in input_paths.iter().zip(&input_mask) {
        if train {
            split.train_inputs.push(path.clone());
        } else {
            split.test_inputs.push(path.clone());
        }
    }
    split
}

/// Image pairs read lazily from disk.
pub struct PairDataset {
    pairs: Vec<(PathBuf, PathBuf)>,
    size: ImageSize,
}

impl PairDataset {
    /// Pairs inputs with reals in order, cycling through the real list `repeat_real` times.
    pub fn new(
        input_paths: Vec<PathBuf>,
        real_paths: Vec<PathBuf>,
        repeat_real: usize,
        size: ImageSize,
    ) -> error::Result<Self> {
        let reals = real_paths.len() * repeat_real;
        if input_paths.len() != reals {
            return Err(Error::MismatchedPairs {
                inputs: input_paths.len(),
                reals,
            });
        }
        if input_paths.is_empty() {
            return Err(Error::EmptyDataset);
        }
        let pairs = input_paths
            .into_iter()
            .zip(real_paths.iter().cycle().cloned())
            .collect();
        Ok(Self { pairs, size })
    }

    /// Builds the train and test datasets from an input and a real directory.
    pub fn from_dirs<P: AsRef<Path>>(
        input_dir: P,
        real_dir: P,
        repeat_real: usize,
        size: ImageSize,
    ) -> error::Result<(Self, Self)> {
        let split = split_train_test(
            &list_images(input_dir)?,
            &list_images(real_dir)?,
            repeat_real,
        );
        let train = Self::new(
            split.train_inputs,
            split.train_reals,
            repeat_real,
            size.clone(),
        )?;
        let test = Self::new(split.test_inputs, split.test_reals, repeat_real, size)?;
        Ok((train, test))
    }

    pub fn pairs(&self) -> &[(PathBuf, PathBuf)] {
        &self.pairs
    }

    /// Decodes both images of a pair, naming the file that failed.
    pub fn load_pair(&self, input: &Path, target: &Path) -> error::Result<PairItem> {
        let load = |path: &Path| {
            load_normalized(path, &self.size).map_err(|source| Error::Load {
                path: path.to_path_buf(),
                source: Box::new(source),
            })
        };
        Ok(PairItem {
            input: load(input)?,
            target: load(target)?,
        })
    }
}

impl Dataset<PairItem> for PairDataset {
    fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Panics when an image of the pair cannot be decoded; a `None` would end the epoch early.
    fn get(&self, index: usize) -> Option<PairItem> {
        let (input, target) = self.pairs.get(index)?;
        match self.load_pair(input, target) {
            Ok(item) => Some(item),
            Err(err) => panic!("Failed to load pair {}: {}", index, err),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PairBatcher {
    size: ImageSize,
}

impl PairBatcher {
    pub fn new(size: ImageSize) -> Self {
        Self { size }
    }
}

#[derive(Clone, Debug)]
pub struct PairBatch<B: Backend> {
    pub inputs: Tensor<B, 4>,  // Shape: [batch_size, channels, height, width]
    pub targets: Tensor<B, 4>, // Shape: [batch_size, channels, height, width]
}

impl<B: Backend> Batcher<B, PairItem, PairBatch<B>> for PairBatcher {
    fn batch(&self, items: Vec<PairItem>, device: &B::Device) -> PairBatch<B> {
        let size = [1, self.size.height, self.size.width, CHANNELS];
        let to_tensor = |values: Vec<f32>| {
            Tensor::<B, 4>::from_data(
                TensorData::new(values, size).convert::<B::FloatElem>(),
                device,
            )
            .permute([0, 3, 1, 2])
        };

        let (inputs, targets): (Vec<_>, Vec<_>) = items
            .into_iter()
            .map(|item| (to_tensor(item.input), to_tensor(item.target)))
            .unzip();

        PairBatch {
            inputs: Tensor::cat(inputs, 0),
            targets: Tensor::cat(targets, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::data::dataloader::{DataLoader, DataLoaderBuilder};
    use image::{Rgb, RgbImage};
    use std::sync::Arc;

    type TestBackend = NdArray<f32>;

    fn paths(prefix: &str, n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("{prefix}{i:04}.png"))).collect()
    }

    #[test]
    fn mask_is_eighty_twenty_per_block() {
        let mask = train_mask(250);
        assert_eq!(mask.len(), 200);
        assert_eq!(mask.iter().filter(|&&m| m).count(), 160);
        assert_eq!(&mask[..20], &[[true; 16].as_slice(), [false; 4].as_slice()].concat()[..]);
        assert!(train_mask(99).is_empty());
    }

    #[test]
    fn split_repeats_the_input_mask() {
        let reals = paths("real", 100);
        let inputs = paths("input", 200);

        let split = split_train_test(&inputs, &reals, 2);

        assert_eq!(split.train_reals.len(), 80);
        assert_eq!(split.test_reals.len(), 20);
        assert_eq!(split.train_inputs.len(), 160);
        assert_eq!(split.test_inputs.len(), 40);
        assert_eq!(split.test_reals[0], reals[8]);
        assert_eq!(split.test_inputs[2], inputs[18]);
        assert_eq!(split.test_inputs[20], inputs[108]);
    }

    #[test]
    fn dataset_cycles_reals_for_repeated_inputs() {
        let dataset = PairDataset::new(
            paths("input", 4),
            paths("real", 2),
            2,
            ImageSize::new(),
        )
        .unwrap();
        let reals: Vec<_> = dataset.pairs().iter().map(|(_, r)| r.clone()).collect();
        assert_eq!(reals, [paths("real", 2), paths("real", 2)].concat());
    }

    #[test]
    fn dataset_rejects_unpaired_lists() {
        let err = PairDataset::new(paths("input", 3), paths("real", 2), 1, ImageSize::new());
        assert!(matches!(
            err,
            Err(Error::MismatchedPairs { inputs: 3, reals: 2 })
        ));
        let err = PairDataset::new(vec![], vec![], 1, ImageSize::new());
        assert!(matches!(err, Err(Error::EmptyDataset)));
    }

    #[test]
    fn images_are_loaded_resized_and_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.png");
        let target = dir.path().join("target.png");
        RgbImage::from_pixel(8, 4, Rgb([0, 255, 0])).save(&input).unwrap();
        RgbImage::from_pixel(8, 4, Rgb([255, 0, 255])).save(&target).unwrap();
        let size = ImageSize::new().with_width(4).with_height(2);

        let dataset = PairDataset::new(vec![input.clone()], vec![target], 1, size.clone()).unwrap();
        let item = dataset.get(0).unwrap();
        assert_eq!(item.input.len(), 2 * 4 * 3);
        assert_eq!(&item.input[..3], &[-1.0, 1.0, -1.0]);
        assert_eq!(&item.target[..3], &[1.0, -1.0, 1.0]);

        let batch: PairBatch<TestBackend> =
            PairBatcher::new(size.clone()).batch(vec![item.clone(), item], &Default::default());
        assert_eq!(batch.inputs.dims(), [2, 3, 2, 4]);
        let green = batch.inputs.slice([0..1, 1..2, 0..2, 0..4]);
        assert_eq!(green.min().into_scalar(), 1.0);

        let single: Tensor<TestBackend, 4> =
            load_single_image(&input, &size, &Default::default()).unwrap();
        assert_eq!(single.dims(), [1, 3, 2, 4]);
    }

    fn pairs_with_broken_middle_input(dir: &Path) -> PairDataset {
        let real = dir.join("real.png");
        RgbImage::from_pixel(4, 4, Rgb([10, 20, 30])).save(&real).unwrap();
        let inputs: Vec<_> = ["a.png", "broken.png", "c.png"]
            .iter()
            .map(|name| dir.join(name))
            .collect();
        RgbImage::from_pixel(4, 4, Rgb([0, 0, 0])).save(&inputs[0]).unwrap();
        std::fs::write(&inputs[1], b"not a png").unwrap();
        RgbImage::from_pixel(4, 4, Rgb([0, 0, 0])).save(&inputs[2]).unwrap();
        let size = ImageSize::new().with_width(4).with_height(4);
        PairDataset::new(inputs, vec![real], 3, size).unwrap()
    }

    #[test]
    fn undecodable_image_is_reported_with_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = pairs_with_broken_middle_input(dir.path());
        let (input, target) = dataset.pairs()[1].clone();

        let err = dataset.load_pair(&input, &target).unwrap_err();

        assert!(matches!(&err, Error::Load { path, .. } if path.ends_with("broken.png")));
        assert!(err.to_string().contains("broken.png"));
        assert!(dataset.get(2).is_some());
    }

    #[test]
    #[should_panic(expected = "broken.png")]
    fn undecodable_image_stops_iteration_loudly() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = pairs_with_broken_middle_input(dir.path());
        let batcher = PairBatcher::new(ImageSize::new().with_width(4).with_height(4));
        let dataloader: Arc<dyn DataLoader<TestBackend, PairBatch<TestBackend>>> =
            DataLoaderBuilder::new(batcher).batch_size(1).build(dataset);

        for _batch in dataloader.iter() {}
    }

    #[test]
    fn listing_skips_non_images_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.jpg", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let names: Vec<_> = list_images(dir.path())
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.jpg", "b.png"]);
    }
}
