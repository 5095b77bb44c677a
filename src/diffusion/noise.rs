// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Seeded Gaussian noise for latents

use ndarray::Array4;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Standard-normal noise source
pub struct NoiseGenerator {
    rng: StdRng,
    spare: Option<f32>,
}

impl NoiseGenerator {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            spare: None,
        }
    }

    /// Draw a fresh random seed
    pub fn random_seed() -> u64 {
        rand::thread_rng().gen()
    }

    /// One N(0, 1) sample (Box-Muller, pairs cached)
    pub fn sample(&mut self) -> f32 {
        if let Some(z) = self.spare.take() {
            return z;
        }
        // u1 in (0, 1] keeps ln() finite
        let u1: f64 = 1.0 - self.rng.gen::<f64>();
        let u2: f64 = self.rng.gen::<f64>();
        let radius = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * std::f64::consts::PI * u2;
        self.spare = Some((radius * theta.sin()) as f32);
        (radius * theta.cos()) as f32
    }

    pub fn tensor(&mut self, shape: (usize, usize, usize, usize)) -> Array4<f32> {
        Array4::from_shape_simple_fn(shape, || self.sample())
    }
}
