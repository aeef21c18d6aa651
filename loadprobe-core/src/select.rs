use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};

/// Picks the endpoint for the next unit of work.
///
/// Implementations are shared by every worker, so `select` takes `&self`.
pub trait EndpointSelector: Send + Sync + 'static {
    fn select(&self) -> &Endpoint;

    fn endpoints(&self) -> &[Endpoint];
}

fn rng(seed: Option<u64>) -> fastrand::Rng {
    match seed {
        Some(seed) => fastrand::Rng::with_seed(seed),
        None => fastrand::Rng::new(),
    }
}

/// Uniform random choice.
#[derive(Debug)]
pub struct UniformSelector {
    endpoints: Vec<Endpoint>,
    rng: Mutex<fastrand::Rng>,
}

impl UniformSelector {
    pub fn new(endpoints: Vec<Endpoint>, seed: Option<u64>) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(Error::EmptyEndpoints);
        }
        Ok(Self {
            endpoints,
            rng: Mutex::new(rng(seed)),
        })
    }
}

impl EndpointSelector for UniformSelector {
    fn select(&self) -> &Endpoint {
        let idx = self.rng.lock().usize(..self.endpoints.len());
        &self.endpoints[idx]
    }

    fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }
}

/// Random choice biased by [`Endpoint::weight`].
#[derive(Debug)]
pub struct WeightedSelector {
    endpoints: Vec<Endpoint>,
    cumulative: Vec<u64>,
    total: u64,
    rng: Mutex<fastrand::Rng>,
}

impl WeightedSelector {
    pub fn new(endpoints: Vec<Endpoint>, seed: Option<u64>) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(Error::EmptyEndpoints);
        }

        let mut cumulative = Vec::with_capacity(endpoints.len());
        let mut acc = 0u64;
        for e in &endpoints {
            acc = acc.saturating_add(u64::from(e.weight));
            cumulative.push(acc);
        }
        if acc == 0 {
            return Err(Error::InvalidWeights);
        }

        Ok(Self {
            endpoints,
            cumulative,
            total: acc,
            rng: Mutex::new(rng(seed)),
        })
    }

    fn index_for(&self, roll: u64) -> usize {
        // First bucket whose cumulative weight exceeds the roll; zero-weight entries never win.
        self.cumulative.partition_point(|&end| end <= roll)
    }
}

impl EndpointSelector for WeightedSelector {
    fn select(&self) -> &Endpoint {
        let roll = self.rng.lock().u64(..self.total);
        let idx = self.index_for(roll).min(self.endpoints.len() - 1);
        &self.endpoints[idx]
    }

    fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }
}

/// Deterministic round-robin.
#[derive(Debug)]
pub struct SequenceSelector {
    endpoints: Vec<Endpoint>,
    next: AtomicUsize,
}

impl SequenceSelector {
    pub fn new(endpoints: Vec<Endpoint>) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(Error::EmptyEndpoints);
        }
        Ok(Self {
            endpoints,
            next: AtomicUsize::new(0),
        })
    }
}

impl EndpointSelector for SequenceSelector {
    fn select(&self) -> &Endpoint {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        &self.endpoints[idx]
    }

    fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }
}
