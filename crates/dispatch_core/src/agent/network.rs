//! Fully connected ReLU network with manual backprop and Adam.

use rand::Rng;

/// Dense layer; `weights` is row-major `outputs × inputs`.
#[derive(Debug, Clone, PartialEq)]
struct DenseLayer {
    inputs: usize,
    outputs: usize,
    weights: Vec<f64>,
    bias: Vec<f64>,
}

impl DenseLayer {
    /// Uniform `±1/sqrt(inputs)` init for weights and bias, like `torch.nn.Linear`.
    fn new<R: Rng + ?Sized>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        let bound = 1.0 / (inputs.max(1) as f64).sqrt();
        let mut sample = || rng.gen_range(-bound..=bound);
        Self {
            inputs,
            outputs,
            weights: (0..inputs * outputs).map(|_| sample()).collect(),
            bias: (0..outputs).map(|_| sample()).collect(),
        }
    }

    fn forward(&self, input: &[f64], relu: bool) -> Vec<f64> {
        self.bias
            .iter()
            .enumerate()
            .map(|(out_idx, bias)| {
                let row = &self.weights[out_idx * self.inputs..(out_idx + 1) * self.inputs];
                let sum = bias + row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>();
                if relu {
                    sum.max(0.0)
                } else {
                    sum
                }
            })
            .collect()
    }
}

/// Action-value network: state in, one value per action out.
#[derive(Debug, Clone, PartialEq)]
pub struct QNetwork {
    layers: Vec<DenseLayer>,
}

impl QNetwork {
    /// `sizes` lists every layer width, input first and output last.
    pub fn new<R: Rng + ?Sized>(sizes: &[usize], rng: &mut R) -> Self {
        Self {
            layers: sizes
                .windows(2)
                .map(|pair| DenseLayer::new(pair[0], pair[1], rng))
                .collect(),
        }
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, |layer| layer.inputs)
    }

    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, |layer| layer.outputs)
    }

    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.trace(input).pop().unwrap_or_default()
    }

    /// Activations of every layer, the input included. Hidden layers are
    /// post-ReLU; the last entry is the linear output.
    fn trace(&self, input: &[f64]) -> Vec<Vec<f64>> {
        let last = self.layers.len().saturating_sub(1);
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(input.to_vec());
        for (idx, layer) in self.layers.iter().enumerate() {
            let next = layer.forward(&activations[idx], idx != last);
            activations.push(next);
        }
        activations
    }

    /// Accumulate into `grads` the gradient of a loss whose derivative with
    /// respect to this network's output at `input` is `output_grad`.
    pub fn backward(&self, input: &[f64], output_grad: &[f64], grads: &mut Gradients) {
        let activations = self.trace(input);
        let last = self.layers.len().saturating_sub(1);
        let mut delta = output_grad.to_vec();

        for idx in (0..self.layers.len()).rev() {
            let layer = &self.layers[idx];
            if idx != last {
                for (d, &out) in delta.iter_mut().zip(&activations[idx + 1]) {
                    if out <= 0.0 {
                        *d = 0.0;
                    }
                }
            }

            let layer_input = &activations[idx];
            let grad = &mut grads.layers[idx];
            let mut input_delta = vec![0.0; if idx > 0 { layer.inputs } else { 0 }];
            for (out_idx, &d) in delta.iter().enumerate() {
                if d == 0.0 {
                    continue;
                }
                grad.bias[out_idx] += d;
                let base = out_idx * layer.inputs;
                for in_idx in 0..layer.inputs {
                    grad.weights[base + in_idx] += d * layer_input[in_idx];
                    if idx > 0 {
                        input_delta[in_idx] += d * layer.weights[base + in_idx];
                    }
                }
            }
            delta = input_delta;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct LayerGrad {
    weights: Vec<f64>,
    bias: Vec<f64>,
}

/// Parameter-shaped buffer, used for gradients and Adam moments.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    layers: Vec<LayerGrad>,
}

impl Gradients {
    pub fn zeros_like(network: &QNetwork) -> Self {
        Self {
            layers: network
                .layers
                .iter()
                .map(|layer| LayerGrad {
                    weights: vec![0.0; layer.weights.len()],
                    bias: vec![0.0; layer.bias.len()],
                })
                .collect(),
        }
    }

    fn values(&self) -> impl Iterator<Item = &f64> {
        self.layers
            .iter()
            .flat_map(|layer| layer.weights.iter().chain(&layer.bias))
    }

    fn values_mut(&mut self) -> impl Iterator<Item = &mut f64> {
        self.layers
            .iter_mut()
            .flat_map(|layer| layer.weights.iter_mut().chain(layer.bias.iter_mut()))
    }

    /// Global L2 norm across all layers.
    pub fn norm(&self) -> f64 {
        self.values().map(|g| g * g).sum::<f64>().sqrt()
    }

    pub fn scale(&mut self, factor: f64) {
        for g in self.values_mut() {
            *g *= factor;
        }
    }

    /// Rescale so the global norm is at most `max_norm`. Returns the norm
    /// before clipping.
    pub fn clip_norm(&mut self, max_norm: f64) -> f64 {
        let norm = self.norm();
        if norm > max_norm {
            self.scale(max_norm / (norm + 1e-6));
        }
        norm
    }
}

/// Adam optimizer state for one network.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    steps: i32,
    first_moment: Gradients,
    second_moment: Gradients,
}

impl Adam {
    pub fn new(network: &QNetwork, learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            steps: 0,
            first_moment: Gradients::zeros_like(network),
            second_moment: Gradients::zeros_like(network),
        }
    }

    pub fn step(&mut self, network: &mut QNetwork, grads: &Gradients) {
        self.steps = self.steps.saturating_add(1);
        let bias1 = 1.0 - self.beta1.powi(self.steps);
        let bias2 = 1.0 - self.beta2.powi(self.steps);

        for (idx, layer) in network.layers.iter_mut().enumerate() {
            let grad = &grads.layers[idx];
            let m = &mut self.first_moment.layers[idx];
            let v = &mut self.second_moment.layers[idx];
            for (params, g, m, v) in [
                (&mut layer.weights, &grad.weights, &mut m.weights, &mut v.weights),
                (&mut layer.bias, &grad.bias, &mut m.bias, &mut v.bias),
            ] {
                for i in 0..params.len() {
                    m[i] = self.beta1 * m[i] + (1.0 - self.beta1) * g[i];
                    v[i] = self.beta2 * v[i] + (1.0 - self.beta2) * g[i] * g[i];
                    let m_hat = m[i] / bias1;
                    let v_hat = v[i] / bias2;
                    params[i] -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
                }
            }
        }
    }
}
