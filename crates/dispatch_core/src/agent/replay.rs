//! Bounded experience replay for the Q-learning agent.

use std::collections::VecDeque;

use rand::seq::index;
use rand::Rng;

/// One `(state, action, reward, next_state, done)` sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: Vec<i64>,
    pub action: usize,
    pub reward: f64,
    pub next_state: Vec<i64>,
    pub done: bool,
}

/// Bounded FIFO experience buffer; the oldest transition is evicted first.
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    capacity: usize,
    buffer: VecDeque<Transition>,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            buffer: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn push(&mut self, transition: Transition) {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    /// Uniform sample of `batch_size` distinct transitions, or `None` if the
    /// buffer holds fewer.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, batch_size: usize) -> Option<Vec<&Transition>> {
        if batch_size == 0 || self.buffer.len() < batch_size {
            return None;
        }
        Some(
            index::sample(rng, self.buffer.len(), batch_size)
                .into_iter()
                .map(|idx| &self.buffer[idx])
                .collect(),
        )
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }
}
