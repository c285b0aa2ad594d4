// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction and operation records.
//!
//! A [`Transaction`] is a lifecycle record: its type is fixed at `begin`,
//! its birth timestamp doubles as the MVCC snapshot time for read-only
//! transactions and as the deadlock-victim priority, and its pending
//! counter tracks operations that were issued but have not yet executed.
//! An [`Operation`] is the inert unit of work that moves through sites and
//! waitlists; a "blocked" operation is just an `Operation` value parked in
//! a waitlist, not a suspended computation.

mod operation;
mod transaction;

pub use operation::{OpKind, Operation};
pub use transaction::{Transaction, TxnId, TxnType};
