use burn::{
    nn::{
        Sigmoid, Tanh,
        conv::{ConvTranspose2d, ConvTranspose2dConfig},
    },
    prelude::*,
};

use crate::model::{
    Translator,
    blocks::{
        Downsample, DownsampleConfig, NormKind, Upsample, UpsampleConfig, doubling_padding,
        normal_init,
    },
    constants::{CHANNELS, INIT_STD},
};

/// One encoder stage of the U-Net.
#[derive(Config, Debug)]
pub struct DownStage {
    pub filters: usize,
    #[config(default = 4)]
    pub kernel_size: usize,
    #[config(default = true)]
    pub apply_norm: bool,
}

/// One decoder stage of the U-Net.
#[derive(Config, Debug)]
pub struct UpStage {
    pub filters: usize,
    #[config(default = 4)]
    pub kernel_size: usize,
    #[config(default = false)]
    pub apply_dropout: bool,
}

/// Squashing applied to the final projection.
#[derive(Config, Debug, PartialEq)]
pub enum OutputActivation {
    Tanh,
    Sigmoid,
    Identity,
}

/// The pix2pix encoder: 8 halvings, the first without normalization.
pub fn pix2pix_down_stack() -> Vec<DownStage> {
    [64, 128, 256, 512, 512, 512, 512, 512]
        .into_iter()
        .enumerate()
        .map(|(i, filters)| DownStage::new(filters).with_apply_norm(i != 0))
        .collect()
}

/// The pix2pix decoder: 7 doublings, dropout on the first three.
pub fn pix2pix_up_stack() -> Vec<UpStage> {
    [512, 512, 512, 512, 256, 128, 64]
        .into_iter()
        .enumerate()
        .map(|(i, filters)| UpStage::new(filters).with_apply_dropout(i < 3))
        .collect()
}

#[derive(Config, Debug)]
pub struct UNetGeneratorConfig {
    /// Number of input images concatenated channel-wise before the encoder.
    #[config(default = 1)]
    pub heads: usize,
    #[config(default = "CHANNELS")]
    pub out_channels: usize,
    #[config(default = "pix2pix_down_stack()")]
    pub down_stack: Vec<DownStage>,
    #[config(default = "pix2pix_up_stack()")]
    pub up_stack: Vec<UpStage>,
    #[config(default = 4)]
    pub last_kernel_size: usize,
    #[config(default = "NormKind::Batch")]
    pub norm: NormKind,
    #[config(default = "OutputActivation::Tanh")]
    pub activation: OutputActivation,
    #[config(default = "INIT_STD")]
    pub init_std: f64,
}

/// U-Net generator with reversed encoder skips concatenated onto the decoder.
#[derive(Module, Debug)]
pub struct UNetGenerator<B: Backend> {
    down_stack: Vec<Downsample<B>>,
    up_stack: Vec<Upsample<B>>,
    last: ConvTranspose2d<B>,
    tanh: Option<Tanh>,
    sigmoid: Option<Sigmoid>,
}

impl UNetGeneratorConfig {
    pub fn in_channels(&self) -> usize {
        self.heads * CHANNELS
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> UNetGenerator<B> {
        assert!(
            !self.down_stack.is_empty(),
            "U-Net needs at least one encoder stage"
        );

        let mut channels = self.in_channels();
        let mut down_stack = Vec::with_capacity(self.down_stack.len());
        for stage in &self.down_stack {
            down_stack.push(
                DownsampleConfig::new(channels, stage.filters)
                    .with_kernel_size(stage.kernel_size)
                    .with_apply_norm(stage.apply_norm)
                    .with_norm(self.norm.clone())
                    .with_init_std(self.init_std)
                    .init(device),
            );
            channels = stage.filters;
        }

        // Skip widths in the order the decoder consumes them; the bottleneck is not a skip.
        let skip_filters = self.down_stack[..self.down_stack.len() - 1]
            .iter()
            .rev()
            .map(|stage| stage.filters);

        let mut up_stack = Vec::with_capacity(self.up_stack.len());
        for (stage, skip) in self.up_stack.iter().zip(skip_filters) {
            up_stack.push(
                UpsampleConfig::new(channels, stage.filters)
                    .with_kernel_size(stage.kernel_size)
                    .with_apply_dropout(stage.apply_dropout)
                    .with_norm(self.norm.clone())
                    .with_init_std(self.init_std)
                    .init(device),
            );
            channels = stage.filters + skip;
        }

        let (padding, padding_out) = doubling_padding(self.last_kernel_size);
        let last = ConvTranspose2dConfig::new(
            [channels, self.out_channels],
            [self.last_kernel_size, self.last_kernel_size],
        )
        .with_stride([2, 2])
        .with_padding([padding, padding])
        .with_padding_out([padding_out, padding_out])
        .with_initializer(normal_init(self.init_std))
        .init(device);

        UNetGenerator {
            down_stack,
            up_stack,
            last,
            tanh: (self.activation == OutputActivation::Tanh).then(Tanh::new),
            sigmoid: (self.activation == OutputActivation::Sigmoid).then(Sigmoid::new),
        }
    }
}

impl<B: Backend> UNetGenerator<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = input;

        let mut skips = Vec::with_capacity(self.down_stack.len());
        for down in &self.down_stack {
            x = down.forward(x);
            skips.push(x.clone());
        }
        // The deepest activation is the bottleneck itself.
        skips.pop();

        for (up, skip) in self.up_stack.iter().zip(skips.into_iter().rev()) {
            x = up.forward(x);
            x = Tensor::cat(vec![x, skip], 1);
        }

        let x = self.last.forward(x);
        match (&self.tanh, &self.sigmoid) {
            (Some(tanh), _) => tanh.forward(x),
            (None, Some(sigmoid)) => sigmoid.forward(x),
            (None, None) => x,
        }
    }

    /// Concatenates several input images channel-wise and translates them jointly.
    pub fn forward_heads(&self, inputs: Vec<Tensor<B, 4>>) -> Tensor<B, 4> {
        self.forward(Tensor::cat(inputs, 1))
    }
}

impl<B: Backend> Translator<B> for UNetGenerator<B> {
    fn translate(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    fn small_config() -> UNetGeneratorConfig {
        UNetGeneratorConfig::new()
            .with_down_stack(vec![
                DownStage::new(8).with_apply_norm(false),
                DownStage::new(16),
                DownStage::new(16),
            ])
            .with_up_stack(vec![UpStage::new(16).with_apply_dropout(true), UpStage::new(8)])
    }

    #[test]
    fn default_tables_match_pix2pix() {
        let config = UNetGeneratorConfig::new();
        let downs: Vec<_> = config.down_stack.iter().map(|s| s.filters).collect();
        let ups: Vec<_> = config.up_stack.iter().map(|s| s.filters).collect();
        assert_eq!(downs, [64, 128, 256, 512, 512, 512, 512, 512]);
        assert_eq!(ups, [512, 512, 512, 512, 256, 128, 64]);
        assert!(!config.down_stack[0].apply_norm);
        assert!(config.down_stack[1..].iter().all(|s| s.apply_norm));
        let dropout: Vec<_> = config.up_stack.iter().map(|s| s.apply_dropout).collect();
        assert_eq!(dropout, [true, true, true, false, false, false, false]);
    }

    #[test]
    fn full_generator_preserves_spatial_shape_and_range() {
        let device = Default::default();
        let generator: UNetGenerator<TestBackend> = UNetGeneratorConfig::new().init(&device);
        let input = Tensor::<TestBackend, 4>::random(
            [1, 3, 256, 256],
            Distribution::Uniform(-1.0, 1.0),
            &device,
        );

        let output = generator.forward(input);

        assert_eq!(output.dims(), [1, 3, 256, 256]);
        assert!(output.clone().min().into_scalar() >= -1.0);
        assert!(output.max().into_scalar() <= 1.0);
    }

    #[test]
    fn small_generator_handles_non_square_inputs() {
        let device = Default::default();
        let generator: UNetGenerator<TestBackend> = small_config().init(&device);
        for [h, w] in [[8, 8], [16, 8], [8, 24]] {
            let input = Tensor::<TestBackend, 4>::random(
                [2, 3, h, w],
                Distribution::Uniform(-1.0, 1.0),
                &device,
            );
            assert_eq!(generator.forward(input).dims(), [2, 3, h, w]);
        }
    }

    #[test]
    fn heads_are_concatenated_before_the_encoder() {
        let device = Default::default();
        let generator: UNetGenerator<TestBackend> = small_config().with_heads(2).init(&device);
        let a = Tensor::<TestBackend, 4>::zeros([1, 3, 8, 8], &device);
        let b = Tensor::<TestBackend, 4>::ones([1, 3, 8, 8], &device);
        assert_eq!(generator.forward_heads(vec![a, b]).dims(), [1, 3, 8, 8]);
    }

    #[test]
    fn sigmoid_activation_bounds_output_to_unit_interval() {
        let device = Default::default();
        let generator: UNetGenerator<TestBackend> = small_config()
            .with_activation(OutputActivation::Sigmoid)
            .init(&device);
        let input = Tensor::<TestBackend, 4>::random(
            [1, 3, 8, 8],
            Distribution::Uniform(-1.0, 1.0),
            &device,
        );
        let output = generator.forward(input);
        assert!(output.clone().min().into_scalar() >= 0.0);
        assert!(output.max().into_scalar() <= 1.0);
    }

    #[test]
    #[should_panic]
    fn mismatched_skip_resolution_fails_fast() {
        let device = Default::default();
        let generator: UNetGenerator<TestBackend> = small_config().init(&device);
        // 12 is not divisible by 2^3, so an encoder skip and its decoder stage disagree.
        let input = Tensor::<TestBackend, 4>::zeros([1, 3, 12, 12], &device);
        let _ = generator.forward(input);
    }
}
