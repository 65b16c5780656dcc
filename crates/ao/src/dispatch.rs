//! Table-driven dispatch of one envelope at a time.

use std::sync::Arc;

use mailbox::Envelope;

use crate::fsm::{Kind, Lookup, Machine, MachineEvent, MachineState, Step, TransitionTable};

/// What a single dispatch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<S, K> {
    /// A mapped transition ran `action` and moved `from -> to`.
    Transition {
        from: S,
        to: S,
        kind: K,
        action: &'static str,
    },
    /// Unmapped or ignored pair: state unchanged, no action.
    Ignored { state: S, kind: K },
    /// Kill frame: the machine is now in its terminal state.
    Killed { from: S },
}

impl<S, K> Outcome<S, K> {
    pub fn is_transition(&self) -> bool {
        matches!(self, Self::Transition { .. })
    }
}

/// Outcome of a dispatch on machine `M`.
pub type MachineOutcome<M> = Outcome<<M as Machine>::State, Kind<M>>;

/// Callback observing every dispatch outcome, run on the dispatching thread.
pub type TraceHook<M> = Arc<dyn Fn(&MachineOutcome<M>) + Send + Sync>;

/// Current state, machine and table of one active object.
pub struct Dispatcher<M: Machine> {
    machine: M,
    state: M::State,
    table: Arc<TransitionTable<M>>,
    last_event: Option<M::Event>,
    dispatched: u64,
}

impl<M: Machine> Dispatcher<M> {
    pub fn new(machine: M, table: Arc<TransitionTable<M>>) -> Self {
        Self::starting_in(machine, table, M::State::INITIAL)
    }

    /// Dispatcher placed directly in `state`, for exercising a table.
    pub fn starting_in(machine: M, table: Arc<TransitionTable<M>>, state: M::State) -> Self {
        Self {
            machine,
            state,
            table,
            last_event: None,
            dispatched: 0,
        }
    }

    pub fn state(&self) -> M::State {
        self.state
    }

    pub fn machine(&self) -> &M {
        &self.machine
    }

    /// Event that drove the most recent transition.
    pub fn last_event(&self) -> Option<&M::Event> {
        self.last_event.as_ref()
    }

    /// Number of envelopes dispatched, kill frames included.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    pub fn is_terminated(&self) -> bool {
        self.state == M::State::TERMINAL
    }

    pub fn dispatch(&mut self, envelope: Envelope<M::Event>) -> MachineOutcome<M> {
        self.dispatched += 1;
        let outcome = match envelope {
            Envelope::Kill => self.kill(),
            Envelope::Event(event) => self.step(event),
        };
        log::trace!("[AO] dispatch: {outcome:?}");
        outcome
    }

    fn kill(&mut self) -> MachineOutcome<M> {
        let from = self.state;
        self.state = M::State::TERMINAL;
        Outcome::Killed { from }
    }

    fn step(&mut self, event: M::Event) -> MachineOutcome<M> {
        let from = self.state;
        let kind = event.kind();
        let transition = match self.table.lookup(from, kind) {
            Lookup::Transition(transition) => transition,
            Lookup::Ignore => return Outcome::Ignored { state: from, kind },
        };

        let to = transition.next();
        let action = transition.action();
        log::trace!("[AO] Action {}", action.name());
        action.run(
            &mut self.machine,
            &Step {
                state: from,
                next: to,
                action: action.name(),
                event: &event,
            },
        );
        self.state = to;
        log::trace!("[AO] State {to:?}");
        self.last_event = Some(event);

        Outcome::Transition {
            from,
            to,
            kind,
            action: action.name(),
        }
    }

    /// Final state, machine and counters.
    pub fn into_stopped(self) -> Stopped<M> {
        Stopped {
            state: self.state,
            machine: self.machine,
            last_event: self.last_event,
            dispatched: self.dispatched,
        }
    }
}

/// What is left of an active object after its loop ended.
#[derive(Debug)]
pub struct Stopped<M: Machine> {
    pub state: M::State,
    pub machine: M,
    pub last_event: Option<M::Event>,
    pub dispatched: u64,
}
