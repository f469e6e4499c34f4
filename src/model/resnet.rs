use burn::{
    nn::{
        Initializer, InstanceNorm, InstanceNormConfig, PaddingConfig2d, Relu, Tanh,
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
    },
    prelude::*,
};

use crate::model::{Translator, constants::CHANNELS};

fn default_initializer() -> Initializer {
    Initializer::XavierUniform { gain: 1.0 }
}

/// Convolution followed by instance normalization.
#[derive(Module, Debug)]
pub struct ConvNorm<B: Backend> {
    conv: Conv2d<B>,
    norm: InstanceNorm<B>,
}

impl<B: Backend> ConvNorm<B> {
    fn new(
        channels: [usize; 2],
        kernel_size: usize,
        stride: usize,
        initializer: &Initializer,
        device: &B::Device,
    ) -> Self {
        let padding = (kernel_size - 1) / 2;
        Self {
            conv: Conv2dConfig::new(channels, [kernel_size, kernel_size])
                .with_stride([stride, stride])
                .with_padding(PaddingConfig2d::Explicit(padding, padding))
                .with_initializer(initializer.clone())
                .init(device),
            norm: InstanceNormConfig::new(channels[1]).init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.norm.forward(self.conv.forward(x))
    }
}

/// Stride-1/2 transposed convolution followed by instance normalization.
///
/// Keeps burn's fan-in Kaiming initializer: transposed convolutions are initialized
/// without a fan-out, which Xavier requires.
#[derive(Module, Debug)]
pub struct ConvTransposeNorm<B: Backend> {
    conv: ConvTranspose2d<B>,
    norm: InstanceNorm<B>,
}

impl<B: Backend> ConvTransposeNorm<B> {
    fn new(channels: [usize; 2], device: &B::Device) -> Self {
        Self {
            conv: ConvTranspose2dConfig::new(channels, [3, 3])
                .with_stride([2, 2])
                .with_padding([1, 1])
                .with_padding_out([1, 1])
                .init(device),
            norm: InstanceNormConfig::new(channels[1]).init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.norm.forward(self.conv.forward(x))
    }
}

#[derive(Config, Debug)]
pub struct ResidualBlockConfig {
    pub channels: usize,
    #[config(default = "Initializer::XavierUniform { gain: 1.0 }")]
    pub initializer: Initializer,
}

/// Two 3×3 conv+norm layers, the second without activation, added to the block input.
#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
    first: ConvNorm<B>,
    second: ConvNorm<B>,
    activation: Relu,
}

impl ResidualBlockConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ResidualBlock<B> {
        let channels = [self.channels, self.channels];
        ResidualBlock {
            first: ConvNorm::new(channels, 3, 1, &self.initializer, device),
            second: ConvNorm::new(channels, 3, 1, &self.initializer, device),
            activation: Relu::new(),
        }
    }
}

impl<B: Backend> ResidualBlock<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let h = self.activation.forward(self.first.forward(input.clone()));
        input + self.second.forward(h)
    }
}

/// CycleGAN generator: c7s1-64, d128, d256, R256×9, u128, u64, c7s1-3 with the defaults.
#[derive(Config, Debug)]
pub struct ResnetGeneratorConfig {
    #[config(default = "CHANNELS")]
    pub in_channels: usize,
    #[config(default = "CHANNELS")]
    pub out_channels: usize,
    #[config(default = 64)]
    pub base_width: usize,
    #[config(default = 2)]
    pub downsamplings: usize,
    #[config(default = 9)]
    pub res_blocks: usize,
}

#[derive(Module, Debug)]
pub struct ResnetGenerator<B: Backend> {
    stem: ConvNorm<B>,
    down_stack: Vec<ConvNorm<B>>,
    res_blocks: Vec<ResidualBlock<B>>,
    up_stack: Vec<ConvTransposeNorm<B>>,
    head: ConvNorm<B>,
    relu: Relu,
    tanh: Tanh,
}

impl ResnetGeneratorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ResnetGenerator<B> {
        let initializer = default_initializer();
        let mut dim = self.base_width;

        let stem = ConvNorm::new([self.in_channels, dim], 7, 1, &initializer, device);

        let mut down_stack = Vec::with_capacity(self.downsamplings);
        for _ in 0..self.downsamplings {
            down_stack.push(ConvNorm::new([dim, dim * 2], 3, 2, &initializer, device));
            dim *= 2;
        }

        let res_blocks = (0..self.res_blocks)
            .map(|_| ResidualBlockConfig::new(dim).init(device))
            .collect();

        let mut up_stack = Vec::with_capacity(self.downsamplings);
        for _ in 0..self.downsamplings {
            up_stack.push(ConvTransposeNorm::new([dim, dim / 2], device));
            dim /= 2;
        }

        let head = ConvNorm::new([dim, self.out_channels], 7, 1, &initializer, device);

        ResnetGenerator {
            stem,
            down_stack,
            res_blocks,
            up_stack,
            head,
            relu: Relu::new(),
            tanh: Tanh::new(),
        }
    }
}

impl<B: Backend> ResnetGenerator<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = self.relu.forward(self.stem.forward(input));
        for down in &self.down_stack {
            x = self.relu.forward(down.forward(x));
        }
        for block in &self.res_blocks {
            x = block.forward(x);
        }
        for up in &self.up_stack {
            x = self.relu.forward(up.forward(x));
        }
        self.tanh.forward(self.head.forward(x))
    }
}

impl<B: Backend> Translator<B> for ResnetGenerator<B> {
    fn translate(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward(input)
    }
}
