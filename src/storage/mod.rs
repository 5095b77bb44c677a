// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod output_store;

pub use output_store::{parse_file_name, OutputStore, StoredOutput, OUTPUTS_ROUTE_PREFIX};
