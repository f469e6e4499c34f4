use burn::{
    nn::{
        LeakyRelu, LeakyReluConfig, PaddingConfig2d,
        conv::{Conv2d, Conv2dConfig},
    },
    prelude::*,
};

use crate::model::{
    blocks::{Downsample, DownsampleConfig, Norm, NormKind, normal_init},
    constants::{CHANNELS, INIT_STD, LEAKY_RELU_SLOPE},
};

#[derive(Config, Debug)]
pub struct PatchDiscriminatorConfig {
    /// Channels of the (input, candidate) concatenation.
    #[config(default = "2 * CHANNELS")]
    pub in_channels: usize,
    #[config(default = "vec![64, 128, 256]")]
    pub filters: Vec<usize>,
    #[config(default = 512)]
    pub hidden: usize,
    #[config(default = 4)]
    pub kernel_size: usize,
    #[config(default = "NormKind::Batch")]
    pub norm: NormKind,
    #[config(default = "INIT_STD")]
    pub init_std: f64,
}

/// PatchGAN critic producing one raw logit per receptive-field patch.
#[derive(Module, Debug)]
pub struct PatchDiscriminator<B: Backend> {
    down_stack: Vec<Downsample<B>>,
    conv: Conv2d<B>,
    norm: Norm<B>,
    activation: LeakyRelu,
    last: Conv2d<B>,
}

impl PatchDiscriminatorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> PatchDiscriminator<B> {
        let mut channels = self.in_channels;
        let mut down_stack = Vec::with_capacity(self.filters.len());
        for (i, &filters) in self.filters.iter().enumerate() {
            down_stack.push(
                DownsampleConfig::new(channels, filters)
                    .with_kernel_size(self.kernel_size)
                    .with_apply_norm(i != 0)
                    .with_norm(self.norm.clone())
                    .with_init_std(self.init_std)
                    .init(device),
            );
            channels = filters;
        }

        // Zero-pad by one then convolve without stride, shrinking by `kernel_size - 3`
        // (32 -> 31 for a 256-pixel input and the default kernel of 4).
        let conv = Conv2dConfig::new([channels, self.hidden], [self.kernel_size, self.kernel_size])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_bias(false)
            .with_initializer(normal_init(self.init_std))
            .init(device);

        // Same geometry again (31 -> 30 by default).
        let last = Conv2dConfig::new([self.hidden, 1], [self.kernel_size, self.kernel_size])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .with_initializer(normal_init(self.init_std))
            .init(device);

        PatchDiscriminator {
            down_stack,
            conv,
            norm: Norm::new(&self.norm, self.hidden, device),
            activation: LeakyReluConfig::new()
                .with_negative_slope(LEAKY_RELU_SLOPE)
                .init(),
            last,
        }
    }
}

impl<B: Backend> PatchDiscriminator<B> {
    /// Scores `candidate` as a translation of `input`.
    pub fn forward(&self, input: Tensor<B, 4>, candidate: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward_pair(Tensor::cat(vec![input, candidate], 1))
    }

    /// Scores an already concatenated `[batch, 2·C, H, W]` pair.
    pub fn forward_pair(&self, pair: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = pair;
        for down in &self.down_stack {
            x = down.forward(x);
        }
        x = self.conv.forward(x);
        x = self.norm.forward(x);
        x = self.activation.forward(x);
        self.last.forward(x)
    }
}
