use burn::{
    nn::loss::{BinaryCrossEntropyLoss, BinaryCrossEntropyLossConfig},
    prelude::*,
};

use crate::model::constants::LAMBDA;

#[derive(Config, Debug)]
pub struct LossConfig {
    /// Weight of the L1 reconstruction term.
    #[config(default = "LAMBDA")]
    pub lambda: f64,
}

impl LossConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> GanLoss<B> {
        GanLoss {
            bce: BinaryCrossEntropyLossConfig::new()
                .with_logits(true)
                .init(device),
            lambda: self.lambda,
        }
    }
}

/// Adversarial objectives for both networks plus the weighted L1 term.
#[derive(Debug)]
pub struct GanLoss<B: Backend> {
    bce: BinaryCrossEntropyLoss<B>,
    lambda: f64,
}

/// Generator objective and its two components.
#[derive(Debug, Clone)]
pub struct GeneratorLoss<B: Backend> {
    pub total: Tensor<B, 1>,
    pub adversarial: Tensor<B, 1>,
    pub l1: Tensor<B, 1>,
}

impl<B: Backend> GanLoss<B> {
    /// Real pairs should score as real, generated pairs as fake.
    pub fn discriminator(
        &self,
        real_logits: Tensor<B, 4>,
        generated_logits: Tensor<B, 4>,
    ) -> Tensor<B, 1> {
        let device = real_logits.device();
        let ones = Tensor::<B, 4, Int>::ones(real_logits.dims(), &device);
        let zeros = Tensor::<B, 4, Int>::zeros(generated_logits.dims(), &device);

        let real_loss = self.bce.forward(real_logits, ones);
        let generated_loss = self.bce.forward(generated_logits, zeros);
        real_loss + generated_loss
    }

    /// The generator wants its pairs scored as real and its output close to `target`.
    pub fn generator(
        &self,
        generated_logits: Tensor<B, 4>,
        generated: Tensor<B, 4>,
        target: Tensor<B, 4>,
    ) -> GeneratorLoss<B> {
        let device = generated_logits.device();
        let ones = Tensor::<B, 4, Int>::ones(generated_logits.dims(), &device);

        let adversarial = self.bce.forward(generated_logits, ones);
        let l1 = (target - generated).abs().mean();
        let total = adversarial.clone() + l1.clone().mul_scalar(self.lambda);

        GeneratorLoss {
            total,
            adversarial,
            l1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    fn scalar(t: Tensor<TestBackend, 1>) -> f32 {
        t.into_scalar()
    }

    #[test]
    fn discriminator_loss_is_non_negative() {
        let device = Default::default();
        let loss = LossConfig::new().init::<TestBackend>(&device);
        for _ in 0..10 {
            let real = Tensor::<TestBackend, 4>::random(
                [1, 1, 30, 30],
                Distribution::Normal(0.0, 5.0),
                &device,
            );
            let fake = Tensor::<TestBackend, 4>::random(
                [1, 1, 30, 30],
                Distribution::Normal(0.0, 5.0),
                &device,
            );
            assert!(scalar(loss.discriminator(real, fake)) >= 0.0);
        }
    }

    #[test]
    fn discriminator_loss_vanishes_only_for_a_perfect_critic() {
        let device = Default::default();
        let loss = LossConfig::new().init::<TestBackend>(&device);
        let confident = Tensor::<TestBackend, 4>::full([1, 1, 4, 4], 50.0, &device);

        let perfect = scalar(loss.discriminator(confident.clone(), confident.clone().neg()));
        assert!(perfect.abs() < 1e-6, "perfect critic loss was {perfect}");

        let fooled = scalar(loss.discriminator(confident.clone(), confident.clone()));
        assert!(fooled > 1.0);

        let undecided = Tensor::<TestBackend, 4>::zeros([1, 1, 4, 4], &device);
        let chance = scalar(loss.discriminator(undecided.clone(), undecided));
        assert!((chance - 2.0 * std::f32::consts::LN_2).abs() < 1e-5);
    }

    #[test]
    fn generator_loss_combines_adversarial_and_weighted_l1() {
        let device = Default::default();
        let loss = LossConfig::new().init::<TestBackend>(&device);
        let logits = Tensor::<TestBackend, 4>::zeros([1, 1, 4, 4], &device);
        let generated = Tensor::<TestBackend, 4>::zeros([1, 3, 8, 8], &device);
        let target = Tensor::<TestBackend, 4>::full([1, 3, 8, 8], 0.5, &device);

        let out = loss.generator(logits, generated, target);

        let adversarial = scalar(out.adversarial);
        let l1 = scalar(out.l1);
        assert!((adversarial - std::f32::consts::LN_2).abs() < 1e-5);
        assert!((l1 - 0.5).abs() < 1e-6);
        assert!((scalar(out.total) - (adversarial + 100.0 * l1)).abs() < 1e-3);
    }

    #[test]
    fn generator_loss_increases_with_reconstruction_error() {
        let device = Default::default();
        let loss = LossConfig::new().init::<TestBackend>(&device);
        let logits = Tensor::<TestBackend, 4>::random(
            [1, 1, 4, 4],
            Distribution::Normal(0.0, 1.0),
            &device,
        );
        let target = Tensor::<TestBackend, 4>::zeros([1, 3, 8, 8], &device);

        let mut previous = f32::NEG_INFINITY;
        for offset in [0.0, 0.01, 0.1, 0.5, 1.0] {
            let generated = Tensor::<TestBackend, 4>::full([1, 3, 8, 8], offset, &device);
            let total = scalar(
                loss.generator(logits.clone(), generated, target.clone())
                    .total,
            );
            assert!(total > previous, "{total} <= {previous} at offset {offset}");
            previous = total;
        }
    }

    #[test]
    fn lambda_scales_only_the_l1_term() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 4>::ones([1, 1, 2, 2], &device);
        let generated = Tensor::<TestBackend, 4>::zeros([1, 3, 4, 4], &device);
        let target = Tensor::<TestBackend, 4>::ones([1, 3, 4, 4], &device);

        let weak = LossConfig::new()
            .with_lambda(1.0)
            .init::<TestBackend>(&device)
            .generator(logits.clone(), generated.clone(), target.clone());
        let strong = LossConfig::new()
            .init::<TestBackend>(&device)
            .generator(logits, generated, target);

        let weak_adv = scalar(weak.adversarial);
        let strong_adv = scalar(strong.adversarial);
        assert_eq!(weak_adv, strong_adv);
        assert!((scalar(strong.total) - scalar(weak.total) - 99.0).abs() < 1e-3);
    }
}
