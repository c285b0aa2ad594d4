// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Per (site, variable) lock table.

use crate::storage::VariableId;
use crate::txn::TxnId;

use super::replica::SiteId;

/// Lock modes for read/write access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Shared lock for reads (multiple readers allowed).
    Read,
    /// Exclusive lock for writes (single writer, no readers).
    Write,
}

/// A lock held by a transaction on one variable at one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lock {
    /// Transaction holding this lock.
    pub txn: TxnId,
    /// Variable being locked.
    pub variable: VariableId,
    /// Lock mode (read or write).
    pub mode: LockMode,
}

/// Lock table for a single variable at a single site.
///
/// Invariant: the holder set is empty, or all holders are read-mode, or
/// there is exactly one write-mode holder. A transaction holds at most
/// one lock here; a held read lock is upgraded in place when the same
/// transaction requests a write.
#[derive(Debug)]
pub struct LockManager {
    site: SiteId,
    variable: VariableId,
    locks: Vec<Lock>,
}

impl LockManager {
    /// Creates an empty lock table for `variable` at `site`.
    pub fn new(site: SiteId, variable: VariableId) -> Self {
        Self {
            site,
            variable,
            locks: Vec::new(),
        }
    }

    /// Returns the owning site id.
    #[inline]
    pub fn site(&self) -> SiteId {
        self.site
    }

    /// Returns the managed variable id.
    #[inline]
    pub fn variable(&self) -> VariableId {
        self.variable
    }

    /// Returns true if `txn` could take a read lock right now: the table
    /// is empty, `txn` already holds a lock, or every holder is a reader.
    pub fn can_get_read(&self, txn: TxnId) -> bool {
        for lock in &self.locks {
            if lock.txn == txn {
                return true;
            }
            if lock.mode == LockMode::Write {
                return false;
            }
        }
        true
    }

    /// Returns true if `txn` could take a write lock right now: the table
    /// is empty or `txn` is the sole holder.
    pub fn can_get_write(&self, txn: TxnId) -> bool {
        self.locks.is_empty() || (self.locks.len() == 1 && self.locks[0].txn == txn)
    }

    /// Acquires a lock for `txn`. Idempotent: if `txn` already holds a
    /// lock it is kept, upgrading in place when a write is requested.
    ///
    /// Callers must have checked the matching `can_get_*` predicate.
    pub fn acquire(&mut self, txn: TxnId, mode: LockMode) {
        if let Some(lock) = self.locks.iter_mut().find(|l| l.txn == txn) {
            if mode == LockMode::Write {
                lock.mode = LockMode::Write;
            }
            return;
        }
        self.locks.push(Lock {
            txn,
            variable: self.variable,
            mode,
        });
    }

    /// Drops every lock owned by `txn` (commit or abort).
    pub fn release(&mut self, txn: TxnId) {
        self.locks.retain(|l| l.txn != txn);
    }

    /// Drops all locks. Called on site failure.
    pub fn clear(&mut self) {
        self.locks.clear();
    }

    /// Returns true unless the table is empty or its sole holder is `txn`.
    pub fn is_blocked_by_other(&self, txn: TxnId) -> bool {
        !(self.locks.is_empty() || (self.locks.len() == 1 && self.locks[0].txn == txn))
    }

    /// Returns the lock held by `txn`, if any.
    pub fn lock_of(&self, txn: TxnId) -> Option<&Lock> {
        self.locks.iter().find(|l| l.txn == txn)
    }

    /// Returns the currently held locks.
    #[inline]
    pub fn holders(&self) -> &[Lock] {
        &self.locks
    }
}
