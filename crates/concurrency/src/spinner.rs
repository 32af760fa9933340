//! Keep-alive probing
//!
//! While an extension is pending the transaction must never look idle to
//! the store. The spinner keeps exactly one probe in flight:
//!
//! ```text
//! spin() ──► probe issued ──► settles (transaction active again)
//!              ▲                   │
//!              │                   ├─ replay every deferred request, FIFO
//!              │                   ├─ still waiting? ──yes──┐
//!              └───────────────────┼────────────────────────┘
//!                                  └─ no: stop
//! ```
//!
//! A probe refused with `TransactionInactive` (the extension began outside
//! of any active turn) arms the spinner instead; the next completion of a
//! request the engine dispatched restarts it.

use linger_core::Error;
use linger_storage::{Listen, Outcome, RequestHandle};
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::{debug, trace, warn};

use crate::queue::DeferredOperation;
use crate::transaction::{Phase, TxnShared};

/// Spinner bookkeeping kept inside the transaction machine
#[derive(Debug)]
pub(crate) struct KeepAlive {
    target: Option<String>,
    spinning: bool,
    armed: bool,
    rounds: u64,
    max_rounds: Option<u64>,
}

impl KeepAlive {
    pub(crate) fn new(target: Option<String>, max_rounds: Option<u64>) -> Self {
        Self {
            target,
            spinning: false,
            armed: false,
            rounds: 0,
            max_rounds,
        }
    }

    pub(crate) fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub(crate) fn is_spinning(&self) -> bool {
        self.spinning
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.armed
    }

    pub(crate) fn rounds(&self) -> u64 {
        self.rounds
    }

    fn started(&mut self) {
        self.spinning = true;
        self.armed = false;
    }

    fn arm(&mut self) {
        self.spinning = false;
        self.armed = true;
    }

    pub(crate) fn stop(&mut self) {
        self.spinning = false;
        self.armed = false;
    }

    /// Count a completed round; `false` once the limit is reached
    fn complete_round(&mut self) -> bool {
        self.rounds += 1;
        self.max_rounds.map_or(true, |max| self.rounds < max)
    }
}

enum Next {
    Probe,
    Stop,
    GiveUp(u64),
}

impl TxnShared {
    /// Issue the next keep-alive probe, or arm if the store refuses it
    pub(crate) fn spin(self: &Rc<Self>) {
        let target = {
            let machine = self.machine.borrow();
            if machine.keep_alive.is_spinning() {
                return;
            }
            match machine.keep_alive.target() {
                Some(target) => target.to_string(),
                None => return,
            }
        };

        match self.backend.probe(self.id, &target) {
            Ok(probe) => {
                self.machine.borrow_mut().keep_alive.started();
                trace!(txn = %self.id, request = %probe.id(), "keep-alive probe issued");
                self.watch_probe(&probe);
            }
            Err(Error::TransactionInactive) => {
                self.machine.borrow_mut().keep_alive.arm();
                debug!(
                    txn = %self.id,
                    "transaction inactive, keep-alive waits for the next completion"
                );
            }
            Err(e) => {
                self.machine.borrow_mut().keep_alive.stop();
                debug!(txn = %self.id, error = %e, "keep-alive probe refused");
            }
        }
    }

    fn watch_probe(self: &Rc<Self>, probe: &RequestHandle) {
        let weak = Rc::downgrade(self);
        probe.subscribe(Box::new(move |outcome| {
            if let Some(shared) = weak.upgrade() {
                shared.on_probe_settled(outcome);
            }
            Listen::Stop
        }));
    }

    fn on_probe_settled(self: &Rc<Self>, outcome: &Outcome) {
        if let Err(e) = outcome {
            self.machine.borrow_mut().keep_alive.stop();
            debug!(txn = %self.id, error = %e, "keep-alive probe failed");
            return;
        }

        let (entries, within_limit) = {
            let mut machine = self.machine.borrow_mut();
            machine.keep_alive.spinning = false;
            let within_limit = machine.keep_alive.complete_round();
            (machine.queue.take_all(), within_limit)
        };
        if !entries.is_empty() {
            trace!(txn = %self.id, count = entries.len(), "replaying deferred requests");
        }
        self.replay(entries);

        let next = {
            let mut machine = self.machine.borrow_mut();
            if machine.phase != Phase::Waiting {
                machine.keep_alive.stop();
                Next::Stop
            } else if !within_limit {
                Next::GiveUp(machine.keep_alive.rounds())
            } else {
                Next::Probe
            }
        };

        match next {
            Next::Probe => self.spin(),
            Next::Stop => trace!(txn = %self.id, "keep-alive stopped"),
            Next::GiveUp(rounds) => {
                warn!(txn = %self.id, rounds, "extension still pending at probe limit");
                self.abort_with(format!(
                    "extension still pending after {} keep-alive rounds",
                    rounds
                ));
            }
        }
    }

    /// Dispatch deferred requests in order, binding or failing each proxy
    pub(crate) fn replay(self: &Rc<Self>, entries: VecDeque<DeferredOperation>) {
        for entry in entries {
            let seq = entry.seq;
            let operation = entry.name();
            let (proxy, dispatched) = entry.dispatch(self.backend.as_ref(), self.id);
            match dispatched {
                Ok(handle) => {
                    self.track(&handle);
                    if let Err(e) = proxy.bind(handle) {
                        warn!(txn = %self.id, seq, operation, error = %e, "deferred request bound twice");
                    }
                }
                Err(e) => {
                    warn!(txn = %self.id, seq, operation, error = %e, "deferred request failed at replay");
                    proxy.fail(e);
                }
            }
        }
    }
}
