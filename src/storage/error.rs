// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Storage error types.

use super::variable::VariableId;
use super::Timestamp;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("no version of {variable} exists at or before time {time}")]
    NoVersion {
        variable: VariableId,
        time: Timestamp,
    },
}
