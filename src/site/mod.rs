// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Site replicas and their per-variable lock managers.
//!
//! A [`Site`] is an in-process replica state machine, not a networked
//! process. It owns a subset of the variables (fixed at construction by
//! the partition rule), one [`LockManager`] per owned variable, and a
//! per-transaction buffer of admitted-but-uncommitted operations.
//!
//! # Replica states
//!
//! `Running` is the initial state. `fail()` moves the site to `Failed`
//! from any state, wipes the lock tables, and marks every replicated copy
//! unreadable. `recover()` moves a failed site to `Recovered`, where it
//! serves writes normally but keeps replicated copies unreadable until the
//! first post-recovery write commits (the catch-up write).

mod lock;
mod replica;

pub use lock::{Lock, LockManager, LockMode};
pub use replica::{Site, SiteId, SiteStatus};
