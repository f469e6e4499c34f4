use crate::model::{
    Translator,
    constants::{BETA_1, LEARNING_RATE},
    data::{ImageSize, PairBatch},
    discriminator::{PatchDiscriminator, PatchDiscriminatorConfig},
    generator::{UNetGenerator, UNetGeneratorConfig},
    loss::{GanLoss, GeneratorLoss, LossConfig},
};

use burn::{
    data::dataloader::DataLoader,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Config)]
pub struct TrainingConfig {
    #[config(default = "UNetGeneratorConfig::new()")]
    pub generator: UNetGeneratorConfig,

    #[config(default = "PatchDiscriminatorConfig::new()")]
    pub discriminator: PatchDiscriminatorConfig,

    #[config(default = "LossConfig::new()")]
    pub loss: LossConfig,

    #[config(default = "adam()")]
    pub optimizer_g: AdamConfig,

    #[config(default = "adam()")]
    pub optimizer_d: AdamConfig,

    #[config(default = 150)]
    pub num_epochs: usize,

    #[config(default = 1)]
    pub batch_size: usize,

    #[config(default = 42)]
    pub seed: u64,

    #[config(default = "LEARNING_RATE")]
    pub learning_rate: f64,

    #[config(default = 100)]
    pub log_interval: usize,

    #[config(default = "ImageSize::new()")]
    pub image_size: ImageSize,
}

/// Adam with the first-moment decay used for both pix2pix networks.
pub fn adam() -> AdamConfig {
    AdamConfig::new().with_beta_1(BETA_1)
}

impl TrainingConfig {
    /// The reference pix2pix setup: U-Net, 70×70 PatchGAN, λ = 100, Adam(2e-4, β1 = 0.5).
    pub fn pix2pix() -> Self {
        Self::new()
    }

    pub fn init<B: AutodiffBackend>(
        &self,
        device: &B::Device,
    ) -> Pix2Pix<
        B,
        UNetGenerator<B>,
        impl Optimizer<UNetGenerator<B>, B> + use<B>,
        impl Optimizer<PatchDiscriminator<B>, B> + use<B>,
    > {
        Pix2Pix::new(
            self.generator.init(device),
            self.discriminator.init(device),
            self.optimizer_g.init(),
            self.optimizer_d.init(),
            self.loss.init(device),
            self.learning_rate,
        )
    }
}

/// Scalar losses observed during one optimization step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepLosses {
    pub generator: f32,
    pub adversarial: f32,
    pub l1: f32,
    pub discriminator: f32,
}

impl StepLosses {
    fn accumulate(&mut self, other: &StepLosses) {
        self.generator += other.generator;
        self.adversarial += other.adversarial;
        self.l1 += other.l1;
        self.discriminator += other.discriminator;
    }

    fn scaled(mut self, factor: f32) -> Self {
        self.generator *= factor;
        self.adversarial *= factor;
        self.l1 *= factor;
        self.discriminator *= factor;
        self
    }
}

/// What one pass over the training data took and produced.
#[derive(Debug, Clone)]
pub struct EpochReport {
    pub epoch: usize,
    pub steps: usize,
    pub duration: Duration,
    pub mean: StepLosses,
}

/// A generator, a PatchGAN discriminator and one independent optimizer for each.
pub struct Pix2Pix<B: AutodiffBackend, G, OG, OD> {
    pub generator: G,
    pub discriminator: PatchDiscriminator<B>,
    optim_g: OG,
    optim_d: OD,
    loss: GanLoss<B>,
    learning_rate: f64,
}

impl<B, G, OG, OD> Pix2Pix<B, G, OG, OD>
where
    B: AutodiffBackend,
    G: Translator<B> + AutodiffModule<B>,
    OG: Optimizer<G, B>,
    OD: Optimizer<PatchDiscriminator<B>, B>,
{
    pub fn new(
        generator: G,
        discriminator: PatchDiscriminator<B>,
        optim_g: OG,
        optim_d: OD,
        loss: GanLoss<B>,
        learning_rate: f64,
    ) -> Self {
        Self {
            generator,
            discriminator,
            optim_g,
            optim_d,
            loss,
            learning_rate,
        }
    }

    /// Gradients of the generator objective, restricted to generator parameters.
    fn generator_gradients(
        &self,
        input: Tensor<B, 4>,
        generated: Tensor<B, 4>,
        target: Tensor<B, 4>,
    ) -> (GradientsParams, GeneratorLoss<B>) {
        let generated_logits = self.discriminator.forward(input, generated.clone());
        let loss = self.loss.generator(generated_logits, generated, target);
        let grads = loss.total.backward();
        (GradientsParams::from_grads(grads, &self.generator), loss)
    }

    /// Gradients of the discriminator objective, restricted to discriminator parameters.
    fn discriminator_gradients(
        &self,
        input: Tensor<B, 4>,
        generated: Tensor<B, 4>,
        target: Tensor<B, 4>,
    ) -> (GradientsParams, Tensor<B, 1>) {
        let real_logits = self.discriminator.forward(input.clone(), target);
        let generated_logits = self.discriminator.forward(input, generated.detach());
        let loss = self.loss.discriminator(real_logits, generated_logits);
        let grads = loss.backward();
        (GradientsParams::from_grads(grads, &self.discriminator), loss)
    }

    /// One joint update of both networks on an (input, target) batch.
    ///
    /// Both gradients are taken from the same generator output and the same parameter
    /// snapshot; neither network is updated until both are computed.
    ///
    /// A backward pass consumes its graph, so the discriminator scores the generated
    /// pair twice: once attached for the generator loss and once on the detached
    /// candidate for its own loss. The logits are identical, but in training mode
    /// batch-norm running statistics see that pair twice per step.
    pub fn train_step(&mut self, input: Tensor<B, 4>, target: Tensor<B, 4>) -> StepLosses {
        let generated = self.generator.translate(input.clone());

        let (grads_g, gen_loss) =
            self.generator_gradients(input.clone(), generated.clone(), target.clone());
        let (grads_d, disc_loss) = self.discriminator_gradients(input, generated, target);

        self.generator = self
            .optim_g
            .step(self.learning_rate, self.generator.clone(), grads_g);
        self.discriminator =
            self.optim_d
                .step(self.learning_rate, self.discriminator.clone(), grads_d);

        StepLosses {
            generator: gen_loss.total.into_scalar().elem(),
            adversarial: gen_loss.adversarial.into_scalar().elem(),
            l1: gen_loss.l1.into_scalar().elem(),
            discriminator: disc_loss.into_scalar().elem(),
        }
    }

    /// Runs `num_epochs` passes over `dataloader`, one step per batch, in loader order.
    pub fn fit(
        &mut self,
        dataloader: Arc<dyn DataLoader<B, PairBatch<B>>>,
        num_epochs: usize,
        log_interval: usize,
        device: &B::Device,
    ) -> Vec<EpochReport> {
        let mut reports = Vec::with_capacity(num_epochs);

        for epoch in 1..=num_epochs {
            let start = Instant::now();
            let mut total = StepLosses::default();
            let mut steps = 0;

            for (iteration, batch) in dataloader.iter().enumerate() {
                let inputs = batch.inputs.to_device(device);
                let targets = batch.targets.to_device(device);

                let losses = self.train_step(inputs, targets);
                total.accumulate(&losses);
                steps += 1;

                if log_interval > 0 && iteration % log_interval == 0 {
                    println!(
                        "[Epoch {}/{} Iter {}] D Loss: {:.4}, G Loss: {:.4}, GAN Loss: {:.4}, L1 Loss: {:.4}",
                        epoch,
                        num_epochs,
                        iteration,
                        losses.discriminator,
                        losses.generator,
                        losses.adversarial,
                        losses.l1,
                    );
                }
            }

            let duration = start.elapsed();
            println!(
                "Time taken for epoch {} is {:.2} sec",
                epoch,
                duration.as_secs_f64()
            );

            let mean = if steps > 0 {
                total.scaled(1.0 / steps as f32)
            } else {
                total
            };
            reports.push(EpochReport {
                epoch,
                steps,
                duration,
                mean,
            });
        }

        reports
    }
}
