// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Engine error types.

use crate::site::SiteId;
use crate::storage::{StorageError, VariableId};
use crate::txn::TxnId;

/// Errors surfaced by the coordinator.
///
/// These are caller contract violations, not domain aborts: an aborted
/// transaction is ordinary engine state, reported through `end`, never an
/// error value.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("unknown transaction {0}")]
    UnknownTransaction(TxnId),

    #[error("transaction {0} already exists")]
    TransactionExists(TxnId),

    #[error("unknown site {0}")]
    UnknownSite(SiteId),

    #[error("unknown variable {0}")]
    UnknownVariable(VariableId),

    #[error("write issued by read-only transaction {0}")]
    WriteInReadOnly(TxnId),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("input error: {0}")]
    Io(#[from] std::io::Error),
}
