// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction coordinator.

use std::collections::{BTreeSet, HashMap, VecDeque};

use tracing::{debug, info, warn};

use crate::command::Command;
use crate::deadlock::WaitForGraph;
use crate::site::{Site, SiteId};
use crate::storage::{Timestamp, VariableId};
use crate::txn::{OpKind, Operation, Transaction, TxnId, TxnType};

use super::config::SystemConfig;
use super::error::EngineError;

/// Orchestrates the whole system: the logical clock, every site, the
/// transaction table, the wait-for graph, and the waitlists.
///
/// Execution is single-threaded and cooperative. One command is processed
/// to completion before the next is accepted; a blocked operation is inert
/// data in a waitlist, and progress happens only when a commit, abort, or
/// recovery triggers a waitlist replay. The coordinator exclusively owns
/// all mutable state, so the only locking discipline in the system is the
/// modeled database locking itself.
///
/// Printable results accumulate in an output buffer the driver drains
/// after each command; the engine itself never writes to stdout.
#[derive(Debug)]
pub struct Coordinator {
    config: SystemConfig,
    clock: Timestamp,
    sites: Vec<Site>,
    txns: HashMap<TxnId, Transaction>,
    graph: WaitForGraph,
    /// Every transaction ever aborted; replayed as a safety net on recovery.
    aborted: BTreeSet<TxnId>,
    /// Blocked operations in arrival order.
    waitlist: Vec<Operation>,
    /// Read-write transactions that touched each variable, in access order.
    /// Sources of the wait-for edges.
    accessors: HashMap<VariableId, Vec<TxnId>>,
    /// Per-variable FIFO of parked read-write operations, preserving
    /// write-ordering fairness independent of global waitlist churn.
    queues: HashMap<VariableId, VecDeque<Operation>>,
    output: Vec<String>,
}

impl Coordinator {
    /// Creates a coordinator with the default 10-site, 20-variable topology.
    pub fn new() -> Self {
        Self::with_config(SystemConfig::default())
    }

    /// Creates a coordinator over an explicit topology.
    pub fn with_config(config: SystemConfig) -> Self {
        let sites = config
            .sites()
            .map(|sid| {
                let owned: Vec<VariableId> =
                    config.variables().filter(|v| config.owns(sid, *v)).collect();
                Site::new(sid, owned)
            })
            .collect();
        Self {
            config,
            clock: 0,
            sites,
            txns: HashMap::new(),
            graph: WaitForGraph::new(),
            aborted: BTreeSet::new(),
            waitlist: Vec::new(),
            accessors: HashMap::new(),
            queues: HashMap::new(),
            output: Vec::new(),
        }
    }

    /// Returns the current logical clock value.
    #[inline]
    pub fn clock(&self) -> Timestamp {
        self.clock
    }

    /// Returns a site, if it exists.
    pub fn site(&self, id: SiteId) -> Option<&Site> {
        self.site_index(id).ok().map(|i| &self.sites[i])
    }

    /// Returns a transaction record, if it exists.
    pub fn transaction(&self, id: TxnId) -> Option<&Transaction> {
        self.txns.get(&id)
    }

    /// Takes every printable line produced since the last drain.
    pub fn drain_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    /// Executes one command. The clock ticks once per accepted command,
    /// before processing.
    pub fn execute(&mut self, cmd: &Command) -> Result<(), EngineError> {
        self.clock += 1;
        debug!(clock = self.clock, command = %cmd, "execute");
        match *cmd {
            Command::Begin(id) => self.begin(id, TxnType::ReadWrite),
            Command::BeginRo(id) => self.begin(id, TxnType::ReadOnly),
            Command::Read { txn, variable } => self.read(txn, variable),
            Command::Write {
                txn,
                variable,
                value,
            } => self.write(txn, variable, value),
            Command::End(id) => self.end(id),
            Command::Fail(site) => self.fail_site(site),
            Command::Recover(site) => self.recover_site(site),
            Command::DumpAll => {
                let lines: Vec<String> = self.sites.iter().map(Site::dump_line).collect();
                self.output.extend(lines);
                Ok(())
            }
            Command::DumpVariable(variable) => {
                self.check_variable(variable)?;
                let lines: Vec<String> = self
                    .sites
                    .iter()
                    .filter_map(|s| s.dump_variable(variable))
                    .collect();
                self.output.extend(lines);
                Ok(())
            }
            Command::DumpSite(site) => {
                let idx = self.site_index(site)?;
                let line = self.sites[idx].dump_line();
                self.output.push(line);
                Ok(())
            }
        }
    }

    // ---- command handlers ------------------------------------------------

    fn begin(&mut self, id: TxnId, ty: TxnType) -> Result<(), EngineError> {
        if self.txns.contains_key(&id) {
            return Err(EngineError::TransactionExists(id));
        }
        debug!(txn = %id, ?ty, birth = self.clock, "begin");
        self.txns.insert(id, Transaction::new(id, ty, self.clock));
        if ty == TxnType::ReadWrite {
            self.graph.add_vertex(id);
        }
        Ok(())
    }

    fn read(&mut self, txn: TxnId, variable: VariableId) -> Result<(), EngineError> {
        self.check_variable(variable)?;
        let (ty, birth, aborted) = {
            let t = self
                .txns
                .get_mut(&txn)
                .ok_or(EngineError::UnknownTransaction(txn))?;
            t.add_pending();
            (t.ty(), t.birth(), t.is_aborted())
        };
        // Operations of an aborted transaction are no-ops: they enter no
        // waitlist and decrement nothing.
        if aborted {
            return Ok(());
        }
        match ty {
            TxnType::ReadWrite => {
                let op = Operation::read(txn, variable, self.clock, ty);
                self.record_access(variable, txn);
                if !self.try_read_rw(&op) {
                    self.park(op);
                    self.break_deadlock()?;
                }
            }
            TxnType::ReadOnly => {
                // Snapshot reads carry the birth time: the value as of the
                // moment the transaction was created.
                let op = Operation::read(txn, variable, birth, ty);
                if !self.try_read_ro(&op)? {
                    // Only the global waitlist: snapshot reads never
                    // contend for the per-variable write FIFO.
                    self.waitlist.push(op);
                    self.break_deadlock()?;
                }
            }
        }
        Ok(())
    }

    fn write(&mut self, txn: TxnId, variable: VariableId, value: i64) -> Result<(), EngineError> {
        self.check_variable(variable)?;
        let aborted = {
            let t = self
                .txns
                .get_mut(&txn)
                .ok_or(EngineError::UnknownTransaction(txn))?;
            if t.ty() == TxnType::ReadOnly {
                return Err(EngineError::WriteInReadOnly(txn));
            }
            t.add_pending();
            t.is_aborted()
        };
        if aborted {
            return Ok(());
        }
        let op = Operation::write(txn, variable, value, self.clock);
        self.record_access(variable, txn);
        if !self.try_write(&op, false) {
            self.park(op);
            self.break_deadlock()?;
        }
        Ok(())
    }

    fn end(&mut self, id: TxnId) -> Result<(), EngineError> {
        {
            let t = self
                .txns
                .get_mut(&id)
                .ok_or(EngineError::UnknownTransaction(id))?;
            t.mark_finished();
        }
        if self.try_commit(id) {
            // Replay before reporting: anything unblocked by this commit
            // prints ahead of the commit line.
            self.run_waitlist()?;
            self.output.push(format!("{id} commits"));
        } else if self.txns.get(&id).is_some_and(Transaction::is_aborted) {
            self.output.push(format!("{id} aborts"));
        }
        // Neither committable nor aborted: operations are still parked in
        // a waitlist. The commit happens silently once they drain.
        Ok(())
    }

    fn fail_site(&mut self, id: SiteId) -> Result<(), EngineError> {
        let idx = self.site_index(id)?;
        warn!(site = %id, "site failure");
        let doomed = self.sites[idx].fail();
        for txn in doomed {
            self.abort_txn(txn)?;
        }
        Ok(())
    }

    fn recover_site(&mut self, id: SiteId) -> Result<(), EngineError> {
        let idx = self.site_index(id)?;
        if !self.sites[idx].is_failed() {
            warn!(site = %id, "recover on a site that is not failed, ignoring");
            return Ok(());
        }
        self.sites[idx].recover();
        info!(site = %id, "site recovered");
        // Idempotent safety net: re-run abort cleanup for every transaction
        // ever aborted, so locks and waitlists are consistent after the
        // recovering site rejoins.
        let aborted: Vec<TxnId> = self.aborted.iter().copied().collect();
        for txn in aborted {
            self.abort_txn(txn)?;
        }
        Ok(())
    }

    // ---- dispatch --------------------------------------------------------

    /// Probes every site for a read-write read. Any admitting site serves
    /// it; the first value is authoritative, and other admitting sites
    /// still register the read lock per their own state.
    fn try_read_rw(&mut self, op: &Operation) -> bool {
        let mut value: Option<i64> = None;
        for site in &mut self.sites {
            if let Some(v) = site.try_read_rw(op) {
                value.get_or_insert(v);
            }
        }
        let Some(v) = value else {
            return false;
        };
        self.output.push(format!("{}: {}", op.variable, v));
        if let Some(t) = self.txns.get_mut(&op.txn) {
            t.complete_pending();
        }
        true
    }

    /// Probes sites for snapshot readability and serves the read from the
    /// first readable copy.
    fn try_read_ro(&mut self, op: &Operation) -> Result<bool, EngineError> {
        for site in &mut self.sites {
            if let Some(v) = site.try_read_ro(op)? {
                self.output.push(format!("{}: {}", op.variable, v));
                if let Some(t) = self.txns.get_mut(&op.txn) {
                    t.complete_pending();
                }
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Dispatches a write: refused outright if any running site reports
    /// the variable locked by another transaction, otherwise written to
    /// every admitting site.
    fn try_write(&mut self, op: &Operation, replaying: bool) -> bool {
        if self.sites.iter().any(|s| s.blocked_by_other(op)) {
            return false;
        }
        let queue_empty = self
            .queues
            .get(&op.variable)
            .map_or(true, VecDeque::is_empty);
        let mut written = false;
        for site in &mut self.sites {
            if site.try_write_rw(op, replaying, queue_empty) {
                written = true;
            }
        }
        if written {
            debug!(txn = %op.txn, variable = %op.variable, "write admitted");
            if let Some(t) = self.txns.get_mut(&op.txn) {
                t.complete_pending();
                t.log_write(op.clone());
            }
        }
        written
    }

    /// Parks a blocked read-write operation on the global waitlist and the
    /// tail of its variable's FIFO.
    fn park(&mut self, op: Operation) {
        debug!(txn = %op.txn, variable = %op.variable, write = op.is_write(), "parked");
        self.waitlist.push(op.clone());
        self.queues.entry(op.variable).or_default().push_back(op);
    }

    /// Records wait-for edges from every earlier accessor of `variable` to
    /// `txn`, then records `txn` as an accessor itself. Pure access order,
    /// not lock contention; first attempts only, never waitlist replays.
    fn record_access(&mut self, variable: VariableId, txn: TxnId) {
        let accessors = self.accessors.entry(variable).or_default();
        for prior in accessors.iter() {
            self.graph.add_edge(*prior, txn);
        }
        accessors.push(txn);
    }

    // ---- commit / abort --------------------------------------------------

    /// Commits `id` at every site if it is committable. Returns whether
    /// the commit happened. Does not replay waitlists; callers decide.
    fn try_commit(&mut self, id: TxnId) -> bool {
        let Some(txn) = self.txns.get(&id) else {
            return false;
        };
        if !txn.is_committable() {
            return false;
        }
        for site in &mut self.sites {
            site.commit(txn);
        }
        info!(txn = %id, writes = txn.writes().len(), "committed");
        true
    }

    /// Aborts `id` and removes every trace of it: wait-for graph vertex,
    /// accessor entries, waitlisted operations, and per-site locks and
    /// buffers. Then replays the waitlist, since released locks may
    /// unblock waiters.
    fn abort_txn(&mut self, id: TxnId) -> Result<(), EngineError> {
        let t = self
            .txns
            .get_mut(&id)
            .ok_or(EngineError::UnknownTransaction(id))?;
        t.mark_aborted();
        self.aborted.insert(id);
        self.graph.remove_vertex(id);
        for accessors in self.accessors.values_mut() {
            accessors.retain(|t| *t != id);
        }
        self.waitlist.retain(|op| op.txn != id);
        for queue in self.queues.values_mut() {
            queue.retain(|op| op.txn != id);
        }
        for site in &mut self.sites {
            if !site.is_failed() {
                site.abort(id);
            }
        }
        info!(txn = %id, "aborted");
        self.run_waitlist()
    }

    /// Runs one deadlock detection pass, aborting the youngest member of
    /// the detected set (greatest birth time; ties broken by larger id).
    /// At most one victim per pass.
    fn break_deadlock(&mut self) -> Result<bool, EngineError> {
        let deadlocked = self.graph.detect();
        let Some(victim) = deadlocked
            .iter()
            .copied()
            .max_by_key(|id| (self.txns.get(id).map_or(0, Transaction::birth), *id))
        else {
            return Ok(false);
        };
        info!(victim = %victim, "deadlock detected, aborting youngest");
        self.abort_txn(victim)?;
        Ok(true)
    }

    /// Replays the waitlist to a fixed point.
    ///
    /// Scans from the front; each read-write entry first pops its
    /// variable's FIFO head, then retries with replay semantics (no
    /// wait-for edges, ordering clause bypassed). A success attempts the
    /// transaction's commit and restarts the scan; a failure reinserts the
    /// operation at its original position and restores the FIFO head.
    /// Terminates when a full scan makes no progress.
    fn run_waitlist(&mut self) -> Result<(), EngineError> {
        loop {
            let mut progressed = false;
            let mut i = 0;
            while i < self.waitlist.len() {
                let op = self.waitlist.remove(i);
                let popped = if op.txn_type == TxnType::ReadWrite {
                    self.queues
                        .get_mut(&op.variable)
                        .and_then(VecDeque::pop_front)
                } else {
                    None
                };
                let executed = match (op.kind, op.txn_type) {
                    (OpKind::Read, TxnType::ReadWrite) => self.try_read_rw(&op),
                    (OpKind::Read, TxnType::ReadOnly) => self.try_read_ro(&op)?,
                    (OpKind::Write { .. }, _) => self.try_write(&op, true),
                };
                if executed {
                    debug!(txn = %op.txn, variable = %op.variable, "unblocked from waitlist");
                    self.try_commit(op.txn);
                    progressed = true;
                    break;
                }
                if let Some(head) = popped {
                    if let Some(queue) = self.queues.get_mut(&op.variable) {
                        queue.push_front(head);
                    }
                }
                self.waitlist.insert(i, op);
                i += 1;
            }
            if !progressed {
                return Ok(());
            }
        }
    }

    // ---- lookups ---------------------------------------------------------

    fn check_variable(&self, variable: VariableId) -> Result<(), EngineError> {
        if self.config.contains_variable(variable) {
            Ok(())
        } else {
            Err(EngineError::UnknownVariable(variable))
        }
    }

    fn site_index(&self, id: SiteId) -> Result<usize, EngineError> {
        if self.config.contains_site(id) {
            Ok((id.0 - 1) as usize)
        } else {
            Err(EngineError::UnknownSite(id))
        }
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}
