use burn::data::dataloader::DataLoaderBuilder;
use burn::data::dataset::Dataset;
use burn::{backend::Autodiff, prelude::*};
use std::path::Path;

use pix2pix::{
    Result,
    model::{
        data::{PairBatcher, PairDataset, hwc_to_tensor},
        training::TrainingConfig,
    },
    utils,
};

#[cfg(feature = "cuda")]
type MyBackend = burn::backend::Cuda<f32, i32>;
#[cfg(not(feature = "cuda"))]
type MyBackend = burn::backend::NdArray<f32>;
type MyAutodiffBackend = Autodiff<MyBackend>;

const CONFIG_PATH: &str = "config.json";
const ARTIFACT_DIR: &str = "artifacts";
const INPUT_DIR: &str = "dataset/input";
const REAL_DIR: &str = "dataset/real";
const REPEAT_REAL: usize = 1;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config() -> Result<TrainingConfig> {
    if Path::new(CONFIG_PATH).exists() {
        println!("Using configuration from {}", CONFIG_PATH);
        Ok(TrainingConfig::load(CONFIG_PATH)?)
    } else {
        Ok(TrainingConfig::pix2pix())
    }
}

fn run() -> Result<()> {
    let device = <MyBackend as Backend>::Device::default();
    let artifact_dir = Path::new(ARTIFACT_DIR);
    std::fs::create_dir_all(artifact_dir)?;

    let config = load_config()?;
    config.save(artifact_dir.join("config.json"))?;
    MyAutodiffBackend::seed(config.seed);

    let (train_dataset, test_dataset) =
        PairDataset::from_dirs(INPUT_DIR, REAL_DIR, REPEAT_REAL, config.image_size.clone())?;
    println!(
        "Training on {} pairs, {} held out for testing",
        train_dataset.len(),
        test_dataset.len()
    );

    let dataloader = DataLoaderBuilder::new(PairBatcher::new(config.image_size.clone()))
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .build(train_dataset);

    let mut model = config.init::<MyAutodiffBackend>(&device).from_checkpoints(
        None,
        &config.generator,
        &config.discriminator,
        artifact_dir,
        &device,
    )?;

    model.fit(dataloader, config.num_epochs, config.log_interval, &device);
    model.save(&config.generator, &config.discriminator, artifact_dir)?;
    println!("Saved trained networks to {}", artifact_dir.display());

    let Some(sample) = test_dataset.get(0) else {
        eprintln!("No test pair available for a sample prediction.");
        return Ok(());
    };
    let input = hwc_to_tensor::<MyBackend>(sample.input.clone(), &config.image_size, &device)?;
    let prediction = model.predict(input.clone());
    let path = model.predict_to_file(input, artifact_dir)?;
    println!("Sample prediction saved as '{}'", path.display());

    let [_, channels, height, width] = prediction.dims();
    let strip = utils::comparison_strip(&[
        utils::float_vec_to_image(&sample.input, height, width)?,
        utils::float_vec_to_image(&sample.target, height, width)?,
        utils::tensor_to_image(prediction.reshape([channels, height, width]))?,
    ]);
    if let Some(strip) = strip {
        let path = artifact_dir.join("comparison.png");
        strip.save(&path)?;
        println!("Input / target / prediction saved as '{}'", path.display());
    }

    Ok(())
}
