//! Execution context for network construction and training

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;

/// Compute device backing tensor kernels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    /// Host CPU; GEMM via ndarray, data decoding on the rayon pool
    #[default]
    Cpu,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
        }
    }
}

/// Context passed explicitly to network construction, initialization and data shuffling
///
/// Holds the device, the seeded random stream, and the training/evaluation flag.
/// Nothing about execution is global: two contexts with the same seed build
/// identical networks and visit batches in the same order.
pub struct Context {
    device: Device,
    seed: u64,
    rng: StdRng,
    training: bool,
}

impl Context {
    /// Create a CPU context seeded from OS entropy
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    /// Create a deterministic CPU context
    pub fn with_seed(seed: u64) -> Self {
        Self {
            device: Device::Cpu,
            seed,
            rng: StdRng::seed_from_u64(seed),
            training: true,
        }
    }

    /// Device kernels run on
    pub fn device(&self) -> Device {
        self.device
    }

    /// Seed the random stream started from
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Random stream for initialization and shuffling
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Set training mode
    pub fn train(&mut self) {
        self.training = true;
    }

    /// Set evaluation mode
    pub fn eval(&mut self) {
        self.training = false;
    }

    /// Check if in training mode
    pub fn is_training(&self) -> bool {
        self.training
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
