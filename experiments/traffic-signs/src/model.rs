//! The traffic-sign network, its loss and its accuracy bookkeeping.
//!
//! ```text
//! conv 5x5x16 -> relu -> conv 5x5x32 -> relu -> maxpool 2/2
//!   -> conv 3x3x128 -> relu -> conv 3x3x256 -> relu -> maxpool 2/2
//!   -> flatten -> fc 256 -> dropout -> fc 128 -> fc 43
//! ```
//!
//! Convolutions are stride 1 with valid padding and no bias; a 30x30 input leaves a
//! 3x3x256 map before the dense layers.

use anyhow::{anyhow, Result};
use burn::{
    module::{Module, Param},
    nn::{
        conv::{Conv2d, Conv2dConfig},
        Initializer, Linear,
    },
    tensor::{
        activation::{log_softmax, relu, softmax},
        backend::Backend,
        ElementConversion, Int, Tensor, TensorData,
    },
};
use rand::{rngs::StdRng, Rng};
use signnet_core::seeded_rng;

use crate::dataset::{CHANNELS, NUM_CLASSES};

/// Kernel shapes as `[out, in, kh, kw]`.
pub const KERNEL_SHAPES: [[usize; 4]; 4] = [
    [16, CHANNELS, 5, 5],
    [32, 16, 5, 5],
    [128, 32, 3, 3],
    [256, 128, 3, 3],
];
pub const FLATTENED_DIM: usize = 256 * 3 * 3;
const FC1_DIM: usize = 256;
const FC2_DIM: usize = 128;

#[derive(Module, Debug)]
pub struct TrafficSignNet<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    conv3: Conv2d<B>,
    conv4: Conv2d<B>,
    fc1: Linear<B>,
    fc2: Linear<B>,
    output: Linear<B>,
}

/// Logits plus the four post-ReLU feature maps, kept for visualization.
#[derive(Clone, Debug)]
pub struct NetOutput<B: Backend> {
    pub activations: [Tensor<B, 4>; 4],
    pub logits: Tensor<B, 2>,
}

impl<B: Backend> TrafficSignNet<B> {
    /// Glorot-uniform weights and zero biases drawn from a seeded RNG.
    pub fn init(device: &B::Device, seed: u64) -> Self {
        let mut rng = seeded_rng(seed);
        let [k1, k2, k3, k4] = KERNEL_SHAPES;

        Self {
            conv1: conv_from_rng(&mut rng, device, k1),
            conv2: conv_from_rng(&mut rng, device, k2),
            conv3: conv_from_rng(&mut rng, device, k3),
            conv4: conv_from_rng(&mut rng, device, k4),
            fc1: linear_from_rng(&mut rng, device, FLATTENED_DIM, FC1_DIM),
            fc2: linear_from_rng(&mut rng, device, FC1_DIM, FC2_DIM),
            output: linear_from_rng(&mut rng, device, FC2_DIM, NUM_CLASSES),
        }
    }

    /// Inference logits, dropout disabled.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward_with_activations(images).logits
    }

    pub fn forward_with_activations(&self, images: Tensor<B, 4>) -> NetOutput<B> {
        self.run(images, None)
    }

    /// Training pass; the dropout mask comes from `rng` and survivors are scaled by
    /// `1 / keep_prob`.
    pub fn forward_train(
        &self,
        images: Tensor<B, 4>,
        keep_prob: f64,
        rng: &mut StdRng,
    ) -> Tensor<B, 2> {
        self.run(images, Some((keep_prob, rng))).logits
    }

    fn run(&self, images: Tensor<B, 4>, dropout: Option<(f64, &mut StdRng)>) -> NetOutput<B> {
        let a1 = relu(self.conv1.forward(images));
        let a2 = relu(self.conv2.forward(a1.clone()));
        let p1 = max_pool_2x2(a2.clone());
        let a3 = relu(self.conv3.forward(p1));
        let a4 = relu(self.conv4.forward(a3.clone()));
        let p2 = max_pool_2x2(a4.clone());

        let flat: Tensor<B, 2> = p2.flatten(1, 3);
        let mut hidden = self.fc1.forward(flat);
        if let Some((keep_prob, rng)) = dropout {
            if keep_prob < 1.0 {
                let mask = dropout_mask::<B>(rng, hidden.dims(), keep_prob, &hidden.device());
                hidden = hidden * mask;
            }
        }
        let hidden = self.fc2.forward(hidden);
        let logits = self.output.forward(hidden);

        NetOutput {
            activations: [a1, a2, a3, a4],
            logits,
        }
    }
}

/// Mean softmax cross-entropy between logits and one-hot labels.
pub fn cross_entropy<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 2>) -> Tensor<B, 1> {
    (log_softmax(logits, 1) * labels).sum_dim(1).mean().neg()
}

/// Arg-max class of the softmax distribution for each row.
pub fn predictions<B: Backend>(logits: Tensor<B, 2>) -> Tensor<B, 1, Int> {
    softmax(logits, 1).argmax(1).squeeze(1)
}

/// `(correct, total)` for a batch of logits against one-hot labels.
pub fn accuracy_counts<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 2>) -> (usize, usize) {
    let total = labels.dims()[0];
    let truth: Tensor<B, 1, Int> = labels.argmax(1).squeeze(1);
    let correct = predictions(logits)
        .equal(truth)
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>() as usize;

    (correct, total)
}

pub fn class_ids<B: Backend>(tensor: Tensor<B, 1, Int>) -> Result<Vec<usize>> {
    let values = tensor
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|err| anyhow!("failed to decode class ids: {err:?}"))?;
    Ok(values.into_iter().map(|value| value as usize).collect())
}

/// 2x2 stride-2 max pool with valid padding; odd trailing rows and columns are dropped.
///
/// Reshape plus `max_dim`: burn-candle has no `max_pool2d_with_indices` for the backward pass.
pub fn max_pool_2x2<B: Backend>(input: Tensor<B, 4>) -> Tensor<B, 4> {
    let [batch, channels, height, width] = input.dims();
    let (out_h, out_w) = (height / 2, width / 2);

    let even = if height % 2 == 0 && width % 2 == 0 {
        input
    } else {
        input.slice([0..batch, 0..channels, 0..out_h * 2, 0..out_w * 2])
    };

    even.reshape([batch, channels, out_h, 2, out_w, 2])
        .max_dim(5)
        .max_dim(3)
        .reshape([batch, channels, out_h, out_w])
}

fn dropout_mask<B: Backend>(
    rng: &mut StdRng,
    shape: [usize; 2],
    keep_prob: f64,
    device: &B::Device,
) -> Tensor<B, 2> {
    let scale = (1.0 / keep_prob) as f32;
    let values: Vec<f32> = (0..shape[0] * shape[1])
        .map(|_| if rng.gen::<f64>() < keep_prob { scale } else { 0.0 })
        .collect();

    Tensor::<B, 2>::from_floats(TensorData::new(values, shape), device)
}

fn conv_from_rng<B: Backend>(
    rng: &mut StdRng,
    device: &B::Device,
    shape: [usize; 4],
) -> Conv2d<B> {
    let [out_channels, in_channels, kh, kw] = shape;
    let receptive = kh * kw;
    let limit = glorot_limit(in_channels * receptive, out_channels * receptive);

    let mut conv = Conv2dConfig::new([in_channels, out_channels], [kh, kw])
        .with_bias(false)
        .with_initializer(Initializer::Zeros)
        .init(device);
    conv.weight = Param::from_tensor(random_tensor::<B, 4>(rng, shape, limit, device));
    conv
}

fn linear_from_rng<B: Backend>(
    rng: &mut StdRng,
    device: &B::Device,
    fan_in: usize,
    fan_out: usize,
) -> Linear<B> {
    let limit = glorot_limit(fan_in, fan_out);
    let weight = random_tensor::<B, 2>(rng, [fan_in, fan_out], limit, device);
    let bias = Tensor::<B, 1>::zeros([fan_out], device);

    Linear {
        weight: Param::from_tensor(weight),
        bias: Some(Param::from_tensor(bias)),
    }
}

fn glorot_limit(fan_in: usize, fan_out: usize) -> f32 {
    (6.0 / (fan_in + fan_out) as f32).sqrt()
}

fn random_tensor<B: Backend, const D: usize>(
    rng: &mut StdRng,
    shape: [usize; D],
    limit: f32,
    device: &B::Device,
) -> Tensor<B, D> {
    let total: usize = shape.iter().product();
    let values: Vec<f32> = (0..total)
        .map(|_| rng.gen::<f32>() * 2.0 * limit - limit)
        .collect();

    Tensor::<B, D>::from_floats(TensorData::new(values, shape), device)
}
