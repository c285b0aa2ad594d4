// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Operation records dispatched by the coordinator.

use crate::storage::{Timestamp, VariableId};

use super::transaction::{TxnId, TxnType};

/// What an operation does to its variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Read,
    Write { value: i64 },
}

/// A single read or write issued by a transaction.
///
/// Operations are plain values: they are cloned into site buffers and
/// waitlists, and replayed from the waitlists when the coordinator makes
/// progress. For read-only transactions `ts` is the transaction's birth
/// time (the snapshot time); otherwise it is the clock value at issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub txn: TxnId,
    pub kind: OpKind,
    pub variable: VariableId,
    pub ts: Timestamp,
    pub txn_type: TxnType,
}

impl Operation {
    /// Creates a read operation.
    pub fn read(txn: TxnId, variable: VariableId, ts: Timestamp, txn_type: TxnType) -> Self {
        Self {
            txn,
            kind: OpKind::Read,
            variable,
            ts,
            txn_type,
        }
    }

    /// Creates a write operation (read-write transactions only).
    pub fn write(txn: TxnId, variable: VariableId, value: i64, ts: Timestamp) -> Self {
        Self {
            txn,
            kind: OpKind::Write { value },
            variable,
            ts,
            txn_type: TxnType::ReadWrite,
        }
    }

    /// Returns true for write operations.
    #[inline]
    pub fn is_write(&self) -> bool {
        matches!(self.kind, OpKind::Write { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let r = Operation::read(TxnId(1), VariableId(2), 5, TxnType::ReadOnly);
        assert!(!r.is_write());
        assert_eq!(r.ts, 5);

        let w = Operation::write(TxnId(1), VariableId(2), 42, 6);
        assert!(w.is_write());
        assert_eq!(w.kind, OpKind::Write { value: 42 });
        assert_eq!(w.txn_type, TxnType::ReadWrite);
    }
}
