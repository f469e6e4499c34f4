use burn::{
    module::AutodiffModule,
    optim::Optimizer,
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
    tensor::backend::AutodiffBackend,
};
use std::path::Path;

use crate::error::Result;
use crate::model::{
    Translator,
    discriminator::{PatchDiscriminator, PatchDiscriminatorConfig},
    training::Pix2Pix,
};

/// Full precision so a reloaded network reproduces its outputs bit for bit.
pub type ParamRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

pub const GENERATOR_FILE: &str = "generator";
pub const DISCRIMINATOR_FILE: &str = "discriminator";
pub const INITIAL_GENERATOR_FILE: &str = "initial_generator";
pub const INITIAL_DISCRIMINATOR_FILE: &str = "initial_discriminator";

/// Writes the parameters of `module` to `path` (the recorder adds the `.mpk` extension).
pub fn save_module<B: Backend, M: Module<B>>(module: &M, path: &Path) -> Result<()> {
    module
        .clone()
        .save_file(path.to_path_buf(), &ParamRecorder::new())?;
    Ok(())
}

/// Loads parameters from `path` into a module of the same architecture.
pub fn load_module<B: Backend, M: Module<B>>(
    module: M,
    path: &Path,
    device: &B::Device,
) -> Result<M> {
    Ok(module.load_file(path.to_path_buf(), &ParamRecorder::new(), device)?)
}

/// Saves the architecture config next to the parameters, as `path.json` and `path.mpk`.
pub fn save_network<B: Backend, M: Module<B>, C: Config>(
    module: &M,
    config: &C,
    path: &Path,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    config.save(path.with_extension("json"))?;
    save_module(module, path)
}

/// Rebuilds a network from `path.json` with `init`, then loads `path.mpk` into it.
pub fn load_network<B, C, M, F>(path: &Path, device: &B::Device, init: F) -> Result<M>
where
    B: Backend,
    C: Config,
    M: Module<B>,
    F: FnOnce(&C, &B::Device) -> M,
{
    let config = C::load(path.with_extension("json"))?;
    load_module(init(&config, device), path, device)
}

impl<B, G, OG, OD> Pix2Pix<B, G, OG, OD>
where
    B: AutodiffBackend,
    G: Translator<B> + AutodiffModule<B>,
    OG: Optimizer<G, B>,
    OD: Optimizer<PatchDiscriminator<B>, B>,
{
    /// Restores both networks from `checkpoints` (generator, discriminator), or when none
    /// are given records the freshly initialized weights under `artifact_dir`.
    pub fn from_checkpoints<C: Config>(
        mut self,
        checkpoints: Option<(&Path, &Path)>,
        generator_config: &C,
        discriminator_config: &PatchDiscriminatorConfig,
        artifact_dir: &Path,
        device: &B::Device,
    ) -> Result<Self> {
        match checkpoints {
            Some((generator, discriminator)) => {
                println!(
                    "Loading checkpoints {} and {}",
                    generator.display(),
                    discriminator.display()
                );
                self.generator = load_module(self.generator, generator, device)?;
                self.discriminator = load_module(self.discriminator, discriminator, device)?;
            }
            None => {
                save_network(
                    &self.generator,
                    generator_config,
                    &artifact_dir.join(INITIAL_GENERATOR_FILE),
                )?;
                save_network(
                    &self.discriminator,
                    discriminator_config,
                    &artifact_dir.join(INITIAL_DISCRIMINATOR_FILE),
                )?;
            }
        }
        Ok(self)
    }

    /// Saves both trained networks and their configs under `artifact_dir`.
    pub fn save<C: Config>(
        &self,
        generator_config: &C,
        discriminator_config: &PatchDiscriminatorConfig,
        artifact_dir: &Path,
    ) -> Result<()> {
        save_network(
            &self.generator,
            generator_config,
            &artifact_dir.join(GENERATOR_FILE),
        )?;
        save_network(
            &self.discriminator,
            discriminator_config,
            &artifact_dir.join(DISCRIMINATOR_FILE),
        )
    }
}
