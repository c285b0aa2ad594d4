// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Replica state machine.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::storage::{StorageError, Variable, VariableId};
use crate::txn::{OpKind, Operation, Transaction, TxnId, TxnType};

use super::lock::{LockManager, LockMode};

/// Unique site identifier (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SiteId(pub u32);

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Replica status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteStatus {
    Running,
    Failed,
    /// Operating again after a failure, with replicated copies unreadable
    /// until the first post-recovery write commits.
    Recovered,
}

/// One replica: its variables, their lock tables, and the buffer of
/// admitted-but-uncommitted operations per transaction.
///
/// Only validated operations enter the buffer; barring a site failure they
/// are guaranteed to apply at commit.
#[derive(Debug)]
pub struct Site {
    id: SiteId,
    status: SiteStatus,
    variables: BTreeMap<VariableId, Variable>,
    locks: BTreeMap<VariableId, LockManager>,
    buffered: BTreeMap<TxnId, Vec<Operation>>,
}

impl Site {
    /// Creates a running site owning `variables`.
    pub fn new(id: SiteId, variables: impl IntoIterator<Item = VariableId>) -> Self {
        let mut vars = BTreeMap::new();
        let mut locks = BTreeMap::new();
        for v in variables {
            vars.insert(v, Variable::new(v));
            locks.insert(v, LockManager::new(id, v));
        }
        Self {
            id,
            status: SiteStatus::Running,
            variables: vars,
            locks,
            buffered: BTreeMap::new(),
        }
    }

    /// Returns the site id.
    #[inline]
    pub fn id(&self) -> SiteId {
        self.id
    }

    /// Returns the current status.
    #[inline]
    pub fn status(&self) -> SiteStatus {
        self.status
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.status == SiteStatus::Failed
    }

    #[inline]
    pub fn is_recovered(&self) -> bool {
        self.status == SiteStatus::Recovered
    }

    /// Returns true if this site owns a copy of `variable`.
    pub fn owns(&self, variable: VariableId) -> bool {
        self.variables.contains_key(&variable)
    }

    /// Returns the committed value of a copy, if owned.
    pub fn value_of(&self, variable: VariableId) -> Option<i64> {
        self.variables.get(&variable).map(Variable::read_current)
    }

    /// Returns the lock table for `variable`, if owned.
    pub fn lock_manager(&self, variable: VariableId) -> Option<&LockManager> {
        self.locks.get(&variable)
    }

    // ---- admission predicates -------------------------------------------

    /// Read-write read admission: site serving, copy readable if the site
    /// is freshly recovered, and the lock table grants a read.
    pub fn admits_rw_read(&self, op: &Operation) -> bool {
        if self.is_failed() {
            return false;
        }
        let (Some(var), Some(lm)) = (self.variables.get(&op.variable), self.locks.get(&op.variable))
        else {
            return false;
        };
        if self.is_recovered() && !var.is_readable() {
            return false;
        }
        lm.can_get_read(op.txn)
    }

    /// Read-only read admission: site serving and copy readable. Snapshot
    /// reads never touch the lock table.
    pub fn admits_ro_read(&self, op: &Operation) -> bool {
        !self.is_failed()
            && self
                .variables
                .get(&op.variable)
                .is_some_and(Variable::is_readable)
    }

    /// Write admission before the ordering clause: site serving and the
    /// lock table grants a write. The ordering clause itself (catch-up
    /// write, waitlist replay, or empty per-variable queue) is evaluated by
    /// the coordinator, which owns the waitlists.
    pub fn admits_write(&self, op: &Operation) -> bool {
        !self.is_failed()
            && self
                .locks
                .get(&op.variable)
                .is_some_and(|lm| lm.can_get_write(op.txn))
    }

    /// Returns true if `op` would be the first write to an unreadable copy
    /// after recovery. Such a write must always be let through so the copy
    /// can catch up.
    pub fn is_catch_up_write(&self, op: &Operation) -> bool {
        self.is_recovered()
            && self
                .variables
                .get(&op.variable)
                .is_some_and(|v| !v.is_readable())
    }

    /// Returns true if another transaction holds a lock on the variable at
    /// this site. Only running sites report contention; a failed site has
    /// no locks and a recovered site merely declines admission itself.
    pub fn blocked_by_other(&self, op: &Operation) -> bool {
        self.status == SiteStatus::Running
            && self
                .locks
                .get(&op.variable)
                .is_some_and(|lm| lm.is_blocked_by_other(op.txn))
    }

    // ---- operation execution --------------------------------------------

    /// Attempts a read-write read: on admission, takes the read lock,
    /// buffers the operation, and returns the current committed value.
    pub fn try_read_rw(&mut self, op: &Operation) -> Option<i64> {
        if !self.admits_rw_read(op) {
            return None;
        }
        let lm = self.locks.get_mut(&op.variable)?;
        lm.acquire(op.txn, LockMode::Read);
        let value = self.variables.get(&op.variable)?.read_current();
        self.buffer(op.clone());
        Some(value)
    }

    /// Attempts a read-only snapshot read of the version at or before the
    /// operation's timestamp (the transaction's birth time). Returns
    /// `Ok(None)` when this site cannot serve the read.
    pub fn try_read_ro(&mut self, op: &Operation) -> Result<Option<i64>, StorageError> {
        if !self.admits_ro_read(op) {
            return Ok(None);
        }
        let Some(var) = self.variables.get(&op.variable) else {
            return Ok(None);
        };
        let value = var.read_before(op.ts)?;
        self.buffer(op.clone());
        Ok(Some(value))
    }

    /// Attempts a read-write write: on admission (including the ordering
    /// clause inputs supplied by the coordinator), takes the write lock and
    /// buffers the operation. The value lands in the variable at commit.
    pub fn try_write_rw(&mut self, op: &Operation, replaying: bool, queue_empty: bool) -> bool {
        if !self.admits_write(op) {
            return false;
        }
        if !(self.is_catch_up_write(op) || replaying || queue_empty) {
            return false;
        }
        let Some(lm) = self.locks.get_mut(&op.variable) else {
            return false;
        };
        lm.acquire(op.txn, LockMode::Write);
        self.buffer(op.clone());
        true
    }

    fn buffer(&mut self, op: Operation) {
        self.buffered.entry(op.txn).or_default().push(op);
    }

    // ---- lifecycle -------------------------------------------------------

    /// Applies `txn`'s buffered operations and releases its locks.
    ///
    /// Returns false if the site is failed (the caller must not treat the
    /// commit as applied here). Succeeds trivially when nothing is
    /// buffered. Writes land in the variable at the operation's issue
    /// timestamp; reads only release the lock, and only for read-write
    /// transactions since snapshot reads never took one.
    pub fn commit(&mut self, txn: &Transaction) -> bool {
        if self.is_failed() {
            return false;
        }
        let Some(ops) = self.buffered.remove(&txn.id()) else {
            return true;
        };
        for op in ops {
            match op.kind {
                OpKind::Read => match txn.ty() {
                    TxnType::ReadWrite => {
                        if let Some(lm) = self.locks.get_mut(&op.variable) {
                            lm.release(op.txn);
                        }
                    }
                    TxnType::ReadOnly => {}
                },
                OpKind::Write { value } => {
                    if let Some(var) = self.variables.get_mut(&op.variable) {
                        var.write(value, op.ts);
                    }
                    if let Some(lm) = self.locks.get_mut(&op.variable) {
                        lm.release(op.txn);
                    }
                }
            }
        }
        true
    }

    /// Releases all of `txn`'s locks and drops its buffered operations,
    /// regardless of site status.
    pub fn abort(&mut self, txn: TxnId) {
        for lm in self.locks.values_mut() {
            lm.release(txn);
        }
        self.buffered.remove(&txn);
    }

    /// Fails the site: wipes every lock table, marks every replicated copy
    /// unreadable, and returns the transactions whose buffered operations
    /// were discarded. The caller must abort every one of them.
    pub fn fail(&mut self) -> Vec<TxnId> {
        self.status = SiteStatus::Failed;
        for lm in self.locks.values_mut() {
            lm.clear();
        }
        for var in self.variables.values_mut() {
            if var.id().is_replicated() {
                var.mark_unreadable();
            }
        }
        let doomed: Vec<TxnId> = self.buffered.keys().copied().collect();
        self.buffered.clear();
        debug!(site = %self.id, aborting = doomed.len(), "site failed");
        doomed
    }

    /// Recovers a failed site. Replicated copies stay unreadable until
    /// their catch-up write commits.
    pub fn recover(&mut self) {
        self.status = SiteStatus::Recovered;
        debug!(site = %self.id, "site recovered");
    }

    // ---- dump ------------------------------------------------------------

    /// Renders all committed values at this site, in variable-id order.
    pub fn dump_line(&self) -> String {
        let parts: Vec<String> = self
            .variables
            .values()
            .map(|v| format!("{}: {}", v.id(), v.read_current()))
            .collect();
        format!("site {} – {}", self.id, parts.join(", "))
    }

    /// Renders one variable's committed value, if this site owns a copy.
    pub fn dump_variable(&self, variable: VariableId) -> Option<String> {
        self.variables
            .get(&variable)
            .map(|v| format!("site {} – {}: {}", self.id, v.id(), v.read_current()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txn::TxnType;

    fn site() -> Site {
        // Owns replicated x2/x4 and non-replicated x1.
        Site::new(SiteId(2), [VariableId(1), VariableId(2), VariableId(4)])
    }

    fn rw_read(txn: u32, var: u32, ts: u64) -> Operation {
        Operation::read(TxnId(txn), VariableId(var), ts, TxnType::ReadWrite)
    }

    fn ro_read(txn: u32, var: u32, ts: u64) -> Operation {
        Operation::read(TxnId(txn), VariableId(var), ts, TxnType::ReadOnly)
    }

    fn rw_txn(id: u32) -> Transaction {
        Transaction::new(TxnId(id), TxnType::ReadWrite, 1)
    }

    #[test]
    fn test_ownership_and_initial_values() {
        let s = site();
        assert!(s.owns(VariableId(2)));
        assert!(!s.owns(VariableId(3)));
        assert_eq!(s.value_of(VariableId(4)), Some(40));
    }

    #[test]
    fn test_write_applies_at_commit_not_before() {
        let mut s = site();
        let op = Operation::write(TxnId(1), VariableId(2), 99, 5);
        assert!(s.try_write_rw(&op, false, true));
        assert_eq!(s.value_of(VariableId(2)), Some(20));

        let mut txn = rw_txn(1);
        txn.mark_finished();
        assert!(s.commit(&txn));
        assert_eq!(s.value_of(VariableId(2)), Some(99));
        assert!(s.lock_manager(VariableId(2)).unwrap().holders().is_empty());
    }

    #[test]
    fn test_commit_fails_on_failed_site() {
        let mut s = site();
        let op = Operation::write(TxnId(1), VariableId(2), 99, 5);
        assert!(s.try_write_rw(&op, false, true));
        assert_eq!(s.fail(), vec![TxnId(1)]);
        assert!(!s.commit(&rw_txn(1)));
        assert_eq!(s.value_of(VariableId(2)), Some(20));
    }

    #[test]
    fn test_fail_clears_locks_and_marks_replicated_unreadable() {
        let mut s = site();
        assert!(s.try_read_rw(&rw_read(1, 2, 3)).is_some());
        s.fail();
        assert!(s.is_failed());
        assert!(s.lock_manager(VariableId(2)).unwrap().holders().is_empty());
        // Replicated copies are unreadable after recovery, the
        // non-replicated copy is not (no other copy can diverge).
        s.recover();
        assert!(!s.admits_ro_read(&ro_read(9, 2, 100)));
        assert!(s.admits_ro_read(&ro_read(9, 1, 100)));
    }

    #[test]
    fn test_recovered_site_blocks_rw_read_until_catch_up() {
        let mut s = site();
        s.fail();
        s.recover();
        assert!(!s.admits_rw_read(&rw_read(1, 2, 4)));

        let w = Operation::write(TxnId(1), VariableId(2), 7, 5);
        assert!(s.is_catch_up_write(&w));
        // The catch-up write is admitted even with waiters queued.
        assert!(s.try_write_rw(&w, false, false));

        let mut txn = rw_txn(1);
        txn.mark_finished();
        assert!(s.commit(&txn));
        assert!(s.admits_rw_read(&rw_read(2, 2, 6)));
        assert_eq!(s.try_read_rw(&rw_read(2, 2, 6)), Some(7));
    }

    #[test]
    fn test_ordering_clause_defers_to_queue() {
        let mut s = site();
        let w = Operation::write(TxnId(1), VariableId(2), 7, 5);
        // Older writers are parked on the variable's queue: a fresh write
        // may not jump ahead of them.
        assert!(!s.try_write_rw(&w, false, false));
        // Replay from the waitlist bypasses the clause.
        assert!(s.try_write_rw(&w, true, false));
    }

    #[test]
    fn test_failed_site_admits_nothing() {
        let mut s = site();
        s.fail();
        assert!(!s.admits_rw_read(&rw_read(1, 2, 3)));
        assert!(!s.admits_ro_read(&ro_read(1, 2, 3)));
        assert!(!s.admits_write(&Operation::write(TxnId(1), VariableId(2), 1, 3)));
        assert!(!s.blocked_by_other(&Operation::write(TxnId(1), VariableId(2), 1, 3)));
    }

    #[test]
    fn test_ro_read_takes_no_lock_and_reads_snapshot() {
        let mut s = site();
        let w = Operation::write(TxnId(1), VariableId(4), 99, 6);
        assert!(s.try_write_rw(&w, false, true));
        let mut txn = rw_txn(1);
        txn.mark_finished();
        s.commit(&txn);

        // Snapshot from before the write still sees the seed value.
        let v = s.try_read_ro(&ro_read(2, 4, 3)).unwrap();
        assert_eq!(v, Some(40));
        assert!(s.lock_manager(VariableId(4)).unwrap().holders().is_empty());

        let mut ro = Transaction::new(TxnId(2), TxnType::ReadOnly, 3);
        ro.mark_finished();
        // Committing the read-only transaction releases nothing and succeeds.
        assert!(s.commit(&ro));
    }

    #[test]
    fn test_abort_releases_locks_and_buffer() {
        let mut s = site();
        assert!(s.try_write_rw(&Operation::write(TxnId(1), VariableId(2), 5, 3), false, true));
        s.abort(TxnId(1));
        assert!(s.lock_manager(VariableId(2)).unwrap().holders().is_empty());
        // Nothing left to apply.
        let mut txn = rw_txn(1);
        txn.mark_finished();
        assert!(s.commit(&txn));
        assert_eq!(s.value_of(VariableId(2)), Some(20));
    }

    #[test]
    fn test_read_value_is_current_committed() {
        let mut s = site();
        assert_eq!(s.try_read_rw(&rw_read(1, 1, 2)), Some(10));
        // The same transaction may upgrade and write afterwards.
        assert!(s.admits_write(&Operation::write(TxnId(1), VariableId(1), 3, 3)));
    }
}
