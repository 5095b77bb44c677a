// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PNDM scheduler behaviour over a full denoising run

use fabstir_image_node::diffusion::{NoiseGenerator, PndmConfig, PndmScheduler};
use ndarray::Array4;

fn scheduler(steps: usize) -> PndmScheduler {
    let mut scheduler = PndmScheduler::new(PndmConfig::default());
    scheduler.set_timesteps(steps).unwrap();
    scheduler
}

#[test]
fn test_exact_noise_prediction_recovers_clean_sample() {
    let mut scheduler = scheduler(20);
    let mut rng = NoiseGenerator::from_seed(3);
    let clean = Array4::from_shape_fn((1, 4, 3, 3), |(_, c, y, x)| {
        (c as f32 - 1.5) * 0.4 + (y as f32 - x as f32) * 0.1
    });
    let noise = rng.tensor((1, 4, 3, 3));

    let timesteps = scheduler.timesteps_for_strength(1.0).unwrap();
    let mut sample = scheduler.add_noise(&clean, &noise, timesteps[0]).unwrap();
    let alphas = scheduler.alphas_cumprod().to_vec();

    for &t in &timesteps {
        // Oracle prediction of the noise contained in `sample` at level t
        let alpha = alphas[t as usize];
        let predicted = (&sample - &(&clean * alpha.sqrt())) / (1.0 - alpha).sqrt();
        sample = scheduler.step(&predicted, t, &sample).unwrap();
    }

    let final_alpha = alphas[0];
    let expected = &clean * final_alpha.sqrt() + &noise * (1.0 - final_alpha).sqrt();
    let max_err = (&sample - &expected)
        .iter()
        .fold(0.0f32, |acc, v| acc.max(v.abs()));
    assert!(max_err < 1e-2, "max error {}", max_err);
}

#[test]
fn test_strength_controls_schedule_length() {
    let scheduler = scheduler(50);
    let full = scheduler.timesteps_for_strength(1.0).unwrap();
    let partial = scheduler.timesteps_for_strength(0.8).unwrap();

    assert_eq!(full.len(), scheduler.timesteps().len());
    assert_eq!(partial.len(), full.len() - 10);
    assert_eq!(partial[0], 930);
    assert_eq!(partial.last(), full.last());
}

#[test]
fn test_strength_out_of_range_is_rejected() {
    let scheduler = scheduler(50);
    for strength in [-0.1f64, 1.01, 2.0] {
        let err = scheduler.timesteps_for_strength(strength).unwrap_err();
        assert!(err.to_string().contains("strength should be in [0.0, 1.0]"));
    }
}

#[test]
fn test_too_few_steps_for_warmup() {
    let mut scheduler = PndmScheduler::new(PndmConfig::default());
    assert!(scheduler.set_timesteps(0).is_err());
    assert!(scheduler.set_timesteps(3).is_err());
    assert!(scheduler.set_timesteps(4).is_ok());
}

#[test]
fn test_rerunning_set_timesteps_resets_state() {
    let mut scheduler = scheduler(10);
    let sample = Array4::<f32>::from_elem((1, 4, 2, 2), 0.5);
    let output = Array4::<f32>::from_elem((1, 4, 2, 2), 0.1);

    let t0 = scheduler.timesteps()[0];
    let first = scheduler.step(&output, t0, &sample).unwrap();

    scheduler.set_timesteps(10).unwrap();
    let again = scheduler.step(&output, t0, &sample).unwrap();
    assert_eq!(first, again);
}
