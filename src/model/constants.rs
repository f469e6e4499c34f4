pub const CHANNELS: usize = 3;
pub const HEIGHT: usize = 256;
pub const WIDTH: usize = 256;

/// Standard deviation of the normal weight initializer used by every pix2pix layer.
pub const INIT_STD: f64 = 0.02;
pub const LEAKY_RELU_SLOPE: f64 = 0.2;
pub const DROPOUT: f64 = 0.5;

/// Weight of the L1 reconstruction term in the generator objective.
pub const LAMBDA: f64 = 100.0;
pub const LEARNING_RATE: f64 = 2e-4;
pub const BETA_1: f32 = 0.5;
