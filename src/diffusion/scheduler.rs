// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PNDM noise scheduler
//!
//! Pseudo numerical methods for diffusion models: a Runge-Kutta warmup
//! (PRK) over the first timesteps followed by linear multistep (PLMS)
//! updates that reuse the last four model outputs.

use anyhow::Result;
use ndarray::Array4;

/// Number of model outputs the multistep update combines
const PNDM_ORDER: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BetaSchedule {
    Linear,
    ScaledLinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionType {
    Epsilon,
    VPrediction,
}

/// Scheduler configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PndmConfig {
    pub num_train_timesteps: usize,
    pub beta_start: f64,
    pub beta_end: f64,
    pub beta_schedule: BetaSchedule,
    pub skip_prk_steps: bool,
    pub set_alpha_to_one: bool,
    pub steps_offset: usize,
    pub prediction_type: PredictionType,
}

impl Default for PndmConfig {
    /// Stable Diffusion 2 depth settings
    fn default() -> Self {
        Self {
            num_train_timesteps: 1000,
            beta_start: 0.00085,
            beta_end: 0.012,
            beta_schedule: BetaSchedule::ScaledLinear,
            skip_prk_steps: false,
            set_alpha_to_one: false,
            steps_offset: 0,
            prediction_type: PredictionType::Epsilon,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PndmScheduler {
    config: PndmConfig,
    alphas_cumprod: Vec<f32>,
    final_alpha_cumprod: f32,
    num_inference_steps: usize,
    prk_timesteps: Vec<i64>,
    timesteps: Vec<i64>,
    ets: Vec<Array4<f32>>,
    counter: usize,
    cur_model_output: Option<Array4<f32>>,
    cur_sample: Option<Array4<f32>>,
}

impl PndmScheduler {
    pub fn new(config: PndmConfig) -> Self {
        let n = config.num_train_timesteps;
        let betas: Vec<f64> = match config.beta_schedule {
            BetaSchedule::Linear => linspace(config.beta_start, config.beta_end, n),
            BetaSchedule::ScaledLinear => {
                linspace(config.beta_start.sqrt(), config.beta_end.sqrt(), n)
                    .into_iter()
                    .map(|b| b * b)
                    .collect()
            }
        };

        let mut alphas_cumprod = Vec::with_capacity(n);
        let mut acc = 1.0f64;
        for beta in &betas {
            acc *= 1.0 - beta;
            alphas_cumprod.push(acc as f32);
        }

        let final_alpha_cumprod = if config.set_alpha_to_one {
            1.0
        } else {
            alphas_cumprod.first().copied().unwrap_or(1.0)
        };

        Self {
            config,
            alphas_cumprod,
            final_alpha_cumprod,
            num_inference_steps: 0,
            prk_timesteps: Vec::new(),
            timesteps: Vec::new(),
            ets: Vec::new(),
            counter: 0,
            cur_model_output: None,
            cur_sample: None,
        }
    }

    pub fn config(&self) -> &PndmConfig {
        &self.config
    }

    pub fn alphas_cumprod(&self) -> &[f32] {
        &self.alphas_cumprod
    }

    /// Full timestep sequence after `set_timesteps`
    pub fn timesteps(&self) -> &[i64] {
        &self.timesteps
    }

    /// Prepare the timestep sequence and reset multistep state
    pub fn set_timesteps(&mut self, num_inference_steps: usize) -> Result<()> {
        if num_inference_steps == 0 {
            anyhow::bail!("num_inference_steps must be greater than 0");
        }
        if num_inference_steps > self.config.num_train_timesteps {
            anyhow::bail!(
                "num_inference_steps ({}) cannot exceed num_train_timesteps ({})",
                num_inference_steps,
                self.config.num_train_timesteps
            );
        }
        if !self.config.skip_prk_steps && num_inference_steps < PNDM_ORDER {
            anyhow::bail!(
                "num_inference_steps must be at least {} for the Runge-Kutta warmup, got {}",
                PNDM_ORDER,
                num_inference_steps
            );
        }

        let n_train = self.config.num_train_timesteps;
        let step_ratio = n_train / num_inference_steps;
        let base: Vec<i64> = (0..num_inference_steps)
            .map(|i| (i * step_ratio + self.config.steps_offset) as i64)
            .collect();

        let (prk, plms) = if self.config.skip_prk_steps {
            let len = base.len();
            let mut plms: Vec<i64> = base[..len - 1].to_vec();
            if len >= 2 {
                plms.push(base[len - 2]);
            }
            plms.push(base[len - 1]);
            plms.reverse();
            (Vec::new(), plms)
        } else {
            let half = (n_train / num_inference_steps / 2) as i64;
            let tail = &base[base.len() - PNDM_ORDER..];

            // [a, a+h, b, b+h, c, c+h, d] -> each doubled -> trim ends -> reversed
            let mut offsets = Vec::with_capacity(PNDM_ORDER * 2);
            for t in tail {
                offsets.push(*t);
                offsets.push(*t + half);
            }
            offsets.pop();
            let mut doubled = Vec::with_capacity(offsets.len() * 2);
            for t in &offsets {
                doubled.push(*t);
                doubled.push(*t);
            }
            let mut prk: Vec<i64> = doubled[1..doubled.len() - 1].to_vec();
            prk.reverse();

            let mut plms: Vec<i64> = base[..base.len().saturating_sub(3)].to_vec();
            plms.reverse();
            (prk, plms)
        };

        self.timesteps = prk.iter().chain(plms.iter()).copied().collect();
        self.prk_timesteps = prk;
        self.num_inference_steps = num_inference_steps;
        self.ets.clear();
        self.counter = 0;
        self.cur_model_output = None;
        self.cur_sample = None;
        Ok(())
    }

    /// Tail of the schedule used when starting from a noised image
    ///
    /// `strength` 1.0 runs the full schedule, smaller values skip the
    /// noisiest steps.
    pub fn timesteps_for_strength(&self, strength: f64) -> Result<Vec<i64>> {
        if !(0.0..=1.0).contains(&strength) {
            anyhow::bail!(
                "The value of strength should be in [0.0, 1.0] but is {}",
                strength
            );
        }
        let steps = self.num_inference_steps;
        let init_timestep = ((steps as f64 * strength) as usize).min(steps);
        let t_start = steps - init_timestep;
        Ok(self.timesteps.get(t_start..).unwrap_or(&[]).to_vec())
    }

    /// Noise `original` to the level of `timestep`
    pub fn add_noise(
        &self,
        original: &Array4<f32>,
        noise: &Array4<f32>,
        timestep: i64,
    ) -> Result<Array4<f32>> {
        let alpha_prod = self.alpha_at(timestep)?;
        let sqrt_alpha = alpha_prod.sqrt();
        let sqrt_one_minus = (1.0 - alpha_prod).sqrt();
        Ok(original * sqrt_alpha + noise * sqrt_one_minus)
    }

    /// Advance one step, returning the previous (less noisy) sample
    pub fn step(
        &mut self,
        model_output: &Array4<f32>,
        timestep: i64,
        sample: &Array4<f32>,
    ) -> Result<Array4<f32>> {
        if self.num_inference_steps == 0 {
            anyhow::bail!("set_timesteps must be called before step");
        }
        if self.counter < self.prk_timesteps.len() && !self.config.skip_prk_steps {
            self.step_prk(model_output, timestep, sample)
        } else {
            self.step_plms(model_output, timestep, sample)
        }
    }

    fn step_prk(
        &mut self,
        model_output: &Array4<f32>,
        timestep: i64,
        sample: &Array4<f32>,
    ) -> Result<Array4<f32>> {
        let half = (self.config.num_train_timesteps / self.num_inference_steps / 2) as i64;
        let diff_to_prev = if self.counter % 2 == 1 { 0 } else { half };
        let prev_timestep = timestep - diff_to_prev;
        let timestep = self.prk_timesteps[self.counter / 4 * 4];

        let combined = match self.counter % 4 {
            0 => {
                self.accumulate(model_output, 1.0 / 6.0);
                self.ets.push(model_output.clone());
                self.cur_sample = Some(sample.clone());
                model_output.clone()
            }
            1 | 2 => {
                self.accumulate(model_output, 1.0 / 3.0);
                model_output.clone()
            }
            _ => {
                let acc = self
                    .cur_model_output
                    .take()
                    .unwrap_or_else(|| Array4::zeros(model_output.raw_dim()));
                acc + model_output * (1.0 / 6.0)
            }
        };

        let cur_sample = self.cur_sample.clone().unwrap_or_else(|| sample.clone());
        let prev = self.prev_sample(&cur_sample, timestep, prev_timestep, &combined)?;
        self.counter += 1;
        Ok(prev)
    }

    fn step_plms(
        &mut self,
        model_output: &Array4<f32>,
        timestep: i64,
        sample: &Array4<f32>,
    ) -> Result<Array4<f32>> {
        let stride = (self.config.num_train_timesteps / self.num_inference_steps) as i64;
        let mut timestep = timestep;
        let mut prev_timestep = timestep - stride;

        if self.counter != 1 {
            let keep = self.ets.len().saturating_sub(3);
            self.ets.drain(..keep);
            self.ets.push(model_output.clone());
        } else {
            prev_timestep = timestep;
            timestep += stride;
        }

        let mut sample = sample.clone();
        let n = self.ets.len();
        let combined = if n == 1 && self.counter == 0 {
            self.cur_sample = Some(sample.clone());
            model_output.clone()
        } else if n == 1 && self.counter == 1 {
            if let Some(cur) = self.cur_sample.take() {
                sample = cur;
            }
            (model_output + &self.ets[n - 1]) / 2.0
        } else if n == 2 {
            (&self.ets[n - 1] * 3.0 - &self.ets[n - 2]) / 2.0
        } else if n == 3 {
            (&self.ets[n - 1] * 23.0 - &self.ets[n - 2] * 16.0 + &self.ets[n - 3] * 5.0) / 12.0
        } else {
            (&self.ets[n - 1] * 55.0 - &self.ets[n - 2] * 59.0 + &self.ets[n - 3] * 37.0
                - &self.ets[n - 4] * 9.0)
                / 24.0
        };

        let prev = self.prev_sample(&sample, timestep, prev_timestep, &combined)?;
        self.counter += 1;
        Ok(prev)
    }

    fn accumulate(&mut self, model_output: &Array4<f32>, weight: f32) {
        let scaled = model_output * weight;
        self.cur_model_output = Some(match self.cur_model_output.take() {
            Some(acc) => acc + scaled,
            None => scaled,
        });
    }

    fn alpha_at(&self, timestep: i64) -> Result<f32> {
        usize::try_from(timestep)
            .ok()
            .and_then(|t| self.alphas_cumprod.get(t).copied())
            .ok_or_else(|| anyhow::anyhow!("Timestep {} is outside the schedule", timestep))
    }

    fn prev_sample(
        &self,
        sample: &Array4<f32>,
        timestep: i64,
        prev_timestep: i64,
        model_output: &Array4<f32>,
    ) -> Result<Array4<f32>> {
        let alpha_prod_t = self.alpha_at(timestep)?;
        let alpha_prod_t_prev = if prev_timestep >= 0 {
            self.alpha_at(prev_timestep)?
        } else {
            self.final_alpha_cumprod
        };
        let beta_prod_t = 1.0 - alpha_prod_t;
        let beta_prod_t_prev = 1.0 - alpha_prod_t_prev;

        let model_output = match self.config.prediction_type {
            PredictionType::Epsilon => model_output.clone(),
            PredictionType::VPrediction => {
                model_output * alpha_prod_t.sqrt() + sample * beta_prod_t.sqrt()
            }
        };

        let sample_coeff = (alpha_prod_t_prev / alpha_prod_t).sqrt();
        let denom = alpha_prod_t * beta_prod_t_prev.sqrt()
            + (alpha_prod_t * beta_prod_t * alpha_prod_t_prev).sqrt();

        Ok(sample * sample_coeff - model_output * ((alpha_prod_t_prev - alpha_prod_t) / denom))
    }
}

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}
