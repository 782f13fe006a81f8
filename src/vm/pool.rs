//! Best-first scheduler over execution states.
//!
//! The pool is a max-heap of [`VirtualMachineState`] keyed by path
//! log-probability. `run` repeatedly takes the most probable state and runs it
//! until it completes, aborts, or forks; forks enqueue their children here.
//! Equal log-probabilities are served in insertion order, so a run is a pure
//! function of the program, input, and budgets.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::{debug, trace};

use super::types::{VmResult, VmStatus};
use super::value::Value;
use super::{ExecContext, VirtualMachineState};
use crate::config::VmConfig;
use crate::distribution::DiscreteDistribution;

/// Heap entry: a state and its insertion sequence number.
#[derive(Debug)]
struct Queued {
    seq: u64,
    state: VirtualMachineState,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        self.state
            .lp
            .total_cmp(&other.state.lp)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A priority queue of execution states plus the budgets that bound draining it.
#[derive(Debug)]
pub struct VirtualMachinePool {
    queue: BinaryHeap<Queued>,
    next_seq: u64,
    /// States that may be run in one call to `run`
    pub max_steps: usize,
    /// Distinct outputs after which `run` stops
    pub max_outputs: usize,
    /// States below this log-probability are never enqueued
    pub min_lp: f64,
    current_steps: usize,
    /// Lowest log-probability admitted so far
    worst_lp: f64,
}

impl VirtualMachinePool {
    pub fn new(config: &VmConfig) -> Self {
        Self {
            queue: BinaryHeap::new(),
            next_seq: 0,
            max_steps: config.max_steps,
            max_outputs: config.max_outputs,
            min_lp: config.min_lp,
            current_steps: 0,
            worst_lp: f64::INFINITY,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop every queued state and reset the step counter.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.current_steps = 0;
        self.worst_lp = f64::INFINITY;
    }

    /// Whether a state with this log-probability would be admitted.
    ///
    /// Checked before copying a state so rejected forks cost nothing.
    pub fn would_add(&self, lp: f64) -> bool {
        lp >= self.min_lp
            && (self.queue.len() <= self.max_steps.saturating_sub(self.current_steps)
                || lp > self.worst_lp)
    }

    /// Enqueue a state if admitted.
    pub fn push(&mut self, state: VirtualMachineState) -> bool {
        if !self.would_add(state.lp) {
            trace!(target: "lotvm::vm::pool", lp = state.lp, "rejected");
            return false;
        }
        self.worst_lp = self.worst_lp.min(state.lp);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Queued { seq, state });
        true
    }

    /// Enqueue a copy of `state` with `value` pushed and `lp_inc` added, if the
    /// result would be admitted.
    pub fn copy_increment_push(
        &mut self,
        state: &VirtualMachineState,
        value: Value,
        lp_inc: f64,
    ) -> bool {
        if !self.would_add(state.lp + lp_inc) {
            return false;
        }
        let mut copy = state.clone();
        copy.push(value);
        copy.increment_lp(lp_inc);
        self.push(copy)
    }

    /// As `copy_increment_push`, consuming `state` instead of copying it.
    pub fn increment_push(
        &mut self,
        mut state: VirtualMachineState,
        value: Value,
        lp_inc: f64,
    ) -> bool {
        if !self.would_add(state.lp + lp_inc) {
            return false;
        }
        state.push(value);
        state.increment_lp(lp_inc);
        self.push(state)
    }

    /// Run the most probable state; returns it once it leaves the running state.
    fn step_once(&mut self, ctx: &ExecContext<'_>) -> VmResult<Option<VirtualMachineState>> {
        let Some(Queued { mut state, .. }) = self.queue.pop() else {
            return Ok(None);
        };
        self.current_steps += 1;
        state.run(ctx, Some(self))?;
        Ok(Some(state))
    }

    /// Drain the pool into an output distribution.
    ///
    /// Stops when the queue is empty, `max_steps` states have run, or
    /// `max_outputs` distinct outputs have been seen.
    pub fn run(&mut self, ctx: &ExecContext<'_>) -> VmResult<DiscreteDistribution<Value>> {
        let mut out = DiscreteDistribution::new();
        self.current_steps = 0;

        while self.current_steps < self.max_steps && out.len() < self.max_outputs {
            let Some(mut state) = self.step_once(ctx)? else {
                break;
            };
            if state.status() == &VmStatus::Complete {
                if let Some(y) = state.take_output() {
                    out.add_mass(y, state.lp);
                }
            }
        }

        debug!(
            target: "lotvm::vm::pool",
            steps = self.current_steps,
            outputs = out.len(),
            remaining = self.queue.len(),
            "pool drained"
        );
        Ok(out)
    }

    /// Drain the pool, returning the completed states instead of their
    /// marginal distribution.
    pub fn run_states(&mut self, ctx: &ExecContext<'_>) -> VmResult<Vec<VirtualMachineState>> {
        let mut out = Vec::new();
        self.current_steps = 0;

        while self.current_steps < self.max_steps && out.len() < self.max_outputs {
            let Some(state) = self.step_once(ctx)? else {
                break;
            };
            if state.status().is_complete() {
                out.push(state);
            }
        }
        Ok(out)
    }
}
