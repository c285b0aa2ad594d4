// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Replicated concurrency control and recovery simulator.
//!
//! Models a distributed database of 10 sites holding 20 variables under
//! the available-copies replication policy: even-indexed variables are
//! replicated everywhere, odd-indexed ones live on a single site.
//! Read-write transactions use two-phase locking with waitlists;
//! read-only transactions read from a multiversion snapshot taken at
//! their birth time. Deadlocks are detected on a wait-for graph and
//! broken by aborting the youngest transaction involved. Sites fail and
//! recover on command, aborting the transactions they had buffered and
//! gating replicated copies behind a catch-up write.
//!
//! # Key Concepts
//!
//! - **Coordinator**: the single owner of all state. Executes one command
//!   at a time and drives waitlist replay on every commit, abort, and
//!   recovery.
//! - **Site**: one replica holding variables, a lock table per variable,
//!   and a buffer of uncommitted writes. A recovered site serves a
//!   replicated variable again only after a committed write refreshes it.
//! - **Snapshot reads**: a read-only transaction sees, for each variable,
//!   the last value committed before the transaction began, regardless of
//!   later activity.
//!
//! # Example
//!
//! ```
//! use repcrec::engine::Session;
//!
//! let mut session = Session::new();
//! session.feed_line("begin(T1)");
//! session.feed_line("W(T1,x2,42)");
//! assert_eq!(session.feed_line("end(T1)"), vec!["T1 commits"]);
//! ```

pub mod command;
pub mod deadlock;
pub mod engine;
pub mod site;
pub mod storage;
pub mod txn;

pub use engine::{Coordinator, EngineError, Session, SystemConfig};
