use burn::{
    nn::{
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Initializer, InstanceNorm,
        InstanceNormConfig, LeakyRelu, LeakyReluConfig, PaddingConfig2d, Relu,
        conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig},
    },
    prelude::*,
};

use crate::model::constants::{DROPOUT, INIT_STD, LEAKY_RELU_SLOPE};

/// Feature normalization applied after a convolution.
#[derive(Config, Debug, PartialEq)]
pub enum NormKind {
    /// Per-batch statistics, running averages tracked during training.
    Batch,
    /// Per-sample, per-channel statistics.
    Instance,
}

/// Batch or instance normalization, picked at construction.
#[derive(Module, Debug)]
pub struct Norm<B: Backend> {
    batch: Option<BatchNorm<B, 2>>,
    instance: Option<InstanceNorm<B>>,
}

impl<B: Backend> Norm<B> {
    pub fn new(kind: &NormKind, channels: usize, device: &B::Device) -> Self {
        match kind {
            NormKind::Batch => Self {
                batch: Some(BatchNormConfig::new(channels).init(device)),
                instance: None,
            },
            NormKind::Instance => Self {
                batch: None,
                instance: Some(InstanceNormConfig::new(channels).init(device)),
            },
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match (&self.batch, &self.instance) {
            (Some(batch), _) => batch.forward(x),
            (None, Some(instance)) => instance.forward(x),
            (None, None) => x,
        }
    }
}

/// Symmetric padding that makes a stride-2 convolution exactly halve an even input.
pub(crate) fn halving_padding(kernel_size: usize) -> usize {
    (kernel_size - 1) / 2
}

/// `(padding, padding_out)` that make a stride-2 transposed convolution exactly double its input.
pub(crate) fn doubling_padding(kernel_size: usize) -> (usize, usize) {
    let padding = (kernel_size - 1) / 2;
    (padding, 2 * padding + 2 - kernel_size)
}

pub(crate) fn normal_init(std: f64) -> Initializer {
    Initializer::Normal { mean: 0.0, std }
}

/// Strided convolution, optional normalization, leaky ReLU.
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    conv: Conv2d<B>,
    norm: Option<Norm<B>>,
    activation: LeakyRelu,
}

#[derive(Config, Debug)]
pub struct DownsampleConfig {
    pub in_channels: usize,
    pub filters: usize,
    #[config(default = 4)]
    pub kernel_size: usize,
    #[config(default = true)]
    pub apply_norm: bool,
    #[config(default = "NormKind::Batch")]
    pub norm: NormKind,
    #[config(default = "LEAKY_RELU_SLOPE")]
    pub negative_slope: f64,
    #[config(default = "INIT_STD")]
    pub init_std: f64,
}

impl DownsampleConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Downsample<B> {
        let padding = halving_padding(self.kernel_size);
        Downsample {
            conv: Conv2dConfig::new(
                [self.in_channels, self.filters],
                [self.kernel_size, self.kernel_size],
            )
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(padding, padding))
            .with_bias(false)
            .with_initializer(normal_init(self.init_std))
            .init(device),
            norm: self
                .apply_norm
                .then(|| Norm::new(&self.norm, self.filters, device)),
            activation: LeakyReluConfig::new()
                .with_negative_slope(self.negative_slope)
                .init(),
        }
    }
}

impl<B: Backend> Downsample<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = self.conv.forward(input);
        if let Some(norm) = &self.norm {
            x = norm.forward(x);
        }
        self.activation.forward(x)
    }
}

/// Transposed convolution, normalization, optional dropout, ReLU.
#[derive(Module, Debug)]
pub struct Upsample<B: Backend> {
    conv: ConvTranspose2d<B>,
    norm: Norm<B>,
    dropout: Option<Dropout>,
    activation: Relu,
}

#[derive(Config, Debug)]
pub struct UpsampleConfig {
    pub in_channels: usize,
    pub filters: usize,
    #[config(default = 4)]
    pub kernel_size: usize,
    #[config(default = false)]
    pub apply_dropout: bool,
    #[config(default = "DROPOUT")]
    pub dropout: f64,
    #[config(default = "NormKind::Batch")]
    pub norm: NormKind,
    #[config(default = "INIT_STD")]
    pub init_std: f64,
}

impl UpsampleConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Upsample<B> {
        let (padding, padding_out) = doubling_padding(self.kernel_size);
        Upsample {
            conv: ConvTranspose2dConfig::new(
                [self.in_channels, self.filters],
                [self.kernel_size, self.kernel_size],
            )
            .with_stride([2, 2])
            .with_padding([padding, padding])
            .with_padding_out([padding_out, padding_out])
            .with_bias(false)
            .with_initializer(normal_init(self.init_std))
            .init(device),
            norm: Norm::new(&self.norm, self.filters, device),
            dropout: self
                .apply_dropout
                .then(|| DropoutConfig::new(self.dropout).init()),
            activation: Relu::new(),
        }
    }
}

impl<B: Backend> Upsample<B> {
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = self.conv.forward(input);
        x = self.norm.forward(x);
        if let Some(dropout) = &self.dropout {
            x = dropout.forward(x);
        }
        self.activation.forward(x)
    }
}
