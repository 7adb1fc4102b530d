//! Experiment grids over seeds and training settings.

use std::collections::HashSet;

use dispatch_core::DispatchConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// One fully resolved run.
#[derive(Debug, Clone)]
pub struct ExperimentRun {
    pub experiment_id: String,
    pub run_id: usize,
    pub config: DispatchConfig,
}

impl ExperimentRun {
    pub fn seed(&self) -> u64 {
        self.config.agent.seed
    }

    pub fn episodes(&self) -> usize {
        self.config.training.episodes
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Combination {
    seed: u64,
    episodes: usize,
    learning_rate: f64,
    epsilon_decay: f64,
    egress_cap: Option<u32>,
}

impl Combination {
    fn apply(self, base: &DispatchConfig) -> DispatchConfig {
        let mut config = base.clone();
        config.agent.seed = self.seed;
        config.training.episodes = self.episodes;
        config.agent.learning_rate = self.learning_rate;
        config.agent.epsilon_decay = self.epsilon_decay;
        config.flow.default_egress_cap = self.egress_cap;
        config
    }

    fn key(&self) -> String {
        format!("{self:?}")
    }
}

/// Values to sweep. An empty axis falls back to the base config's value.
#[derive(Debug, Clone, Default)]
pub struct ExperimentSpace {
    base: DispatchConfig,
    seeds: Vec<u64>,
    episodes: Vec<usize>,
    learning_rates: Vec<f64>,
    epsilon_decays: Vec<f64>,
    egress_caps: Vec<Option<u32>>,
}

impl ExperimentSpace {
    pub fn grid() -> Self {
        Self::default()
    }

    pub fn with_base(mut self, base: DispatchConfig) -> Self {
        self.base = base;
        self
    }

    pub fn seeds(mut self, values: Vec<u64>) -> Self {
        self.seeds = values;
        self
    }

    pub fn episodes(mut self, values: Vec<usize>) -> Self {
        self.episodes = values;
        self
    }

    pub fn learning_rates(mut self, values: Vec<f64>) -> Self {
        self.learning_rates = values;
        self
    }

    pub fn epsilon_decays(mut self, values: Vec<f64>) -> Self {
        self.epsilon_decays = values;
        self
    }

    /// Default flow egress caps to compare against the learned policy.
    pub fn egress_caps(mut self, values: Vec<Option<u32>>) -> Self {
        self.egress_caps = values;
        self
    }

    fn axes(&self) -> (Vec<u64>, Vec<usize>, Vec<f64>, Vec<f64>, Vec<Option<u32>>) {
        fn or_base<T: Clone>(values: &[T], base: T) -> Vec<T> {
            if values.is_empty() {
                vec![base]
            } else {
                values.to_vec()
            }
        }
        (
            or_base(&self.seeds, self.base.agent.seed),
            or_base(&self.episodes, self.base.training.episodes),
            or_base(&self.learning_rates, self.base.agent.learning_rate),
            or_base(&self.epsilon_decays, self.base.agent.epsilon_decay),
            or_base(&self.egress_caps, self.base.flow.default_egress_cap),
        )
    }

    /// Cartesian product of every axis, seeds varying fastest.
    pub fn generate(&self) -> Vec<ExperimentRun> {
        let (seeds, episodes, rates, decays, caps) = self.axes();
        let (seeds, episodes, rates, decays) = (&seeds, &episodes, &rates, &decays);
        let combinations = caps.iter().flat_map(|&egress_cap| {
            decays.iter().flat_map(move |&epsilon_decay| {
                rates.iter().flat_map(move |&learning_rate| {
                    episodes.iter().flat_map(move |&episodes| {
                        seeds.iter().map(move |&seed| Combination {
                            seed,
                            episodes,
                            learning_rate,
                            epsilon_decay,
                            egress_cap,
                        })
                    })
                })
            })
        });

        combinations
            .enumerate()
            .map(|(run_id, combo)| ExperimentRun {
                experiment_id: format!("exp_{run_id}"),
                run_id,
                config: combo.apply(&self.base),
            })
            .collect()
    }

    /// Up to `count` distinct combinations drawn uniformly from the space.
    pub fn sample_random(&self, count: usize, seed: u64) -> Vec<ExperimentRun> {
        const MAX_ATTEMPTS: usize = 10_000;

        let (seeds, episodes, rates, decays, caps) = self.axes();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut seen = HashSet::new();
        let mut runs = Vec::new();
        let mut attempts = 0;

        while runs.len() < count && attempts < MAX_ATTEMPTS {
            attempts += 1;
            let combo = Combination {
                seed: seeds[rng.gen_range(0..seeds.len())],
                episodes: episodes[rng.gen_range(0..episodes.len())],
                learning_rate: rates[rng.gen_range(0..rates.len())],
                epsilon_decay: decays[rng.gen_range(0..decays.len())],
                egress_cap: caps[rng.gen_range(0..caps.len())],
            };
            if !seen.insert(combo.key()) {
                continue;
            }
            let run_id = runs.len();
            runs.push(ExperimentRun {
                experiment_id: format!("random_{run_id}"),
                run_id,
                config: combo.apply(&self.base),
            });
        }
        runs
    }
}
