// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Caption model configuration files and decoding helpers

use fabstir_image_node::vision::vit_gpt2::generation::{argmax, banned_ngram_tokens};
use fabstir_image_node::vision::vit_gpt2::{GenerationConfig, ImageProcessorConfig};
use image::DynamicImage;
use std::collections::HashSet;
use tempfile::TempDir;

#[test]
fn test_preprocessor_config_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("preprocessor_config.json");
    std::fs::write(
        &path,
        r#"{
            "do_normalize": true,
            "do_resize": true,
            "image_mean": [0.5, 0.5, 0.5],
            "image_std": [0.5, 0.5, 0.5],
            "size": {"height": 224, "width": 224}
        }"#,
    )
    .unwrap();

    let config = ImageProcessorConfig::from_file(&path).unwrap();
    let tensor = config.preprocess(&DynamicImage::new_rgb8(640, 480));
    assert_eq!(tensor.shape(), &[1, 3, 224, 224]);
    // Black pixels land on the bottom of the normalized range
    assert!(tensor.iter().all(|v| (*v + 1.0).abs() < 1e-5));
}

#[test]
fn test_generation_config_later_file_wins() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.json");
    let generation_path = dir.path().join("generation_config.json");
    std::fs::write(
        &config_path,
        r#"{"decoder_start_token_id": 50256, "eos_token_id": 50256, "max_length": 20}"#,
    )
    .unwrap();
    std::fs::write(&generation_path, r#"{"max_length": 16, "no_repeat_ngram_size": 3}"#).unwrap();

    let config = GenerationConfig::from_files(&[&config_path, &generation_path]).unwrap();
    assert_eq!(config.max_length, 16);
    assert_eq!(config.no_repeat_ngram_size, 3);
    assert_eq!(config.eos_token_id, 50256);
}

#[test]
fn test_generation_config_missing_file() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("config.json");
    assert!(GenerationConfig::from_files(&[&missing]).is_err());
}

#[test]
fn test_repeated_trigram_is_blocked_during_greedy_decoding() {
    // "a cat on a cat" -> next "on" would repeat "a cat on"
    let tokens = [1, 2, 3, 1, 2];
    let banned = banned_ngram_tokens(&tokens, 3);
    assert_eq!(banned, HashSet::from([3]));

    let logits = [0.0, 0.1, 0.2, 0.9, 0.5];
    assert_eq!(argmax(&logits, &HashSet::new()), Some(3));
    assert_eq!(argmax(&logits, &banned), Some(4));
}
