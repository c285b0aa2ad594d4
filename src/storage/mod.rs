// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Multiversion variable storage.
//!
//! Every site owns a set of [`Variable`] cells. A cell keeps its current
//! value, a readability flag used by the available-copies recovery protocol,
//! and a full version history keyed by commit timestamp so that read-only
//! transactions can read the snapshot as of their birth time.

mod error;
mod variable;

pub use error::StorageError;
pub use variable::{Variable, VariableId};

/// Logical clock value (incremented once per accepted command).
pub type Timestamp = u64;
