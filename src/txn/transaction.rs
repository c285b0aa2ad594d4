// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction lifecycle record.

use std::fmt;

use crate::storage::Timestamp;

use super::operation::Operation;

/// Unique transaction identifier (`T1`, `T2`, .. in the command syntax).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxnId(pub u32);

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Transaction type, fixed at `begin` and matched exhaustively on the
/// read and commit paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnType {
    /// Takes locks, participates in the wait-for graph.
    ReadWrite,
    /// Lock-free snapshot reads as of the birth timestamp.
    ReadOnly,
}

/// A transaction lifecycle record.
///
/// States: active, then ended via [`mark_finished`](Self::mark_finished),
/// and possibly aborted via [`mark_aborted`](Self::mark_aborted). Aborted
/// is terminal and monotone: once set it is never cleared, and an aborted
/// transaction is never committable.
#[derive(Debug)]
pub struct Transaction {
    id: TxnId,
    ty: TxnType,
    birth: Timestamp,
    finished: bool,
    aborted: bool,
    pending: u32,
    writes: Vec<Operation>,
}

impl Transaction {
    /// Creates a new active transaction born at `birth`.
    pub fn new(id: TxnId, ty: TxnType, birth: Timestamp) -> Self {
        Self {
            id,
            ty,
            birth,
            finished: false,
            aborted: false,
            pending: 0,
            writes: Vec::new(),
        }
    }

    /// Returns the transaction id.
    #[inline]
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// Returns the transaction type.
    #[inline]
    pub fn ty(&self) -> TxnType {
        self.ty
    }

    /// Returns the birth timestamp (snapshot time for read-only
    /// transactions, victim priority for deadlock resolution).
    #[inline]
    pub fn birth(&self) -> Timestamp {
        self.birth
    }

    /// Returns true if the transaction has been aborted.
    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Returns true if `end` has been requested.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Marks the transaction aborted. Terminal.
    pub fn mark_aborted(&mut self) {
        self.aborted = true;
    }

    /// Records that `end` was requested.
    pub fn mark_finished(&mut self) {
        self.finished = true;
    }

    /// Records one more issued-but-unexecuted operation.
    pub fn add_pending(&mut self) {
        self.pending += 1;
    }

    /// Records that an issued operation executed.
    pub fn complete_pending(&mut self) {
        self.pending = self.pending.saturating_sub(1);
    }

    /// Returns the number of issued-but-unexecuted operations.
    #[inline]
    pub fn pending(&self) -> u32 {
        self.pending
    }

    /// Logs a successfully dispatched write.
    pub fn log_write(&mut self, op: Operation) {
        self.writes.push(op);
    }

    /// Returns the dispatched writes, in dispatch order.
    #[inline]
    pub fn writes(&self) -> &[Operation] {
        &self.writes
    }

    /// Committable iff no operation is pending, `end` was requested, and
    /// the transaction was never aborted.
    #[inline]
    pub fn is_committable(&self) -> bool {
        self.pending == 0 && self.finished && !self.aborted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_transaction_is_active() {
        let txn = Transaction::new(TxnId(1), TxnType::ReadWrite, 3);
        assert_eq!(txn.id(), TxnId(1));
        assert_eq!(txn.ty(), TxnType::ReadWrite);
        assert_eq!(txn.birth(), 3);
        assert!(!txn.is_aborted());
        assert!(!txn.is_finished());
        assert!(!txn.is_committable());
    }

    #[test]
    fn test_committable_requires_end_and_no_pending() {
        let mut txn = Transaction::new(TxnId(2), TxnType::ReadWrite, 1);
        txn.add_pending();
        txn.mark_finished();
        assert!(!txn.is_committable());
        txn.complete_pending();
        assert!(txn.is_committable());
    }

    #[test]
    fn test_aborted_never_committable() {
        let mut txn = Transaction::new(TxnId(3), TxnType::ReadWrite, 1);
        txn.mark_finished();
        assert!(txn.is_committable());
        txn.mark_aborted();
        assert!(!txn.is_committable());
        // Terminal: no later event can revive it.
        txn.mark_finished();
        txn.complete_pending();
        assert!(!txn.is_committable());
    }

    #[test]
    fn test_display() {
        assert_eq!(TxnId(12).to_string(), "T12");
    }
}
