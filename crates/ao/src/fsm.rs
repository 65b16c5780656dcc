//! State machine vocabulary and the validated transition table.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use mailbox::Message;
use thiserror::Error;

/// Finite set of states of a machine.
pub trait MachineState: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// State of a freshly constructed object.
    const INITIAL: Self;
    /// State that ends the dispatch loop.
    const TERMINAL: Self;
    /// Every state, used for exhaustiveness checks.
    const ALL: &'static [Self];
}

/// Event carried through the mailbox: a fixed-size message with a kind.
pub trait MachineEvent: Message + fmt::Debug + Send + 'static {
    type Kind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// Every kind, used for exhaustiveness checks.
    const KINDS: &'static [Self::Kind];

    fn kind(&self) -> Self::Kind;
}

/// The object an active object's actions operate on.
pub trait Machine: Send + 'static {
    type State: MachineState;
    type Event: MachineEvent;
}

/// Event kind of machine `M`.
pub type Kind<M> = <<M as Machine>::Event as MachineEvent>::Kind;

/// What an action sees while it runs.
///
/// `state` is still the pre-transition state: the commit to `next` happens
/// after the action returns.
pub struct Step<'a, M: Machine> {
    pub state: M::State,
    pub next: M::State,
    pub action: &'static str,
    pub event: &'a M::Event,
}

type Handler<M> = Box<dyn Fn(&mut M, &Step<'_, M>) + Send + Sync>;

/// Named action run on a transition.
pub struct Action<M: Machine> {
    name: &'static str,
    handler: Handler<M>,
}

impl<M: Machine> Action<M> {
    pub fn new<F>(name: &'static str, handler: F) -> Self
    where
        F: Fn(&mut M, &Step<'_, M>) + Send + Sync + 'static,
    {
        Self {
            name,
            handler: Box::new(handler),
        }
    }

    /// Action that does nothing.
    pub fn nop() -> Self {
        Self::new("Nop", |_, _| {})
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn run(&self, machine: &mut M, step: &Step<'_, M>) {
        (self.handler)(machine, step)
    }
}

impl<M: Machine> fmt::Debug for Action<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Action").field(&self.name).finish()
    }
}

/// Next state plus the action that leads there.
pub struct Transition<M: Machine> {
    next: M::State,
    action: Action<M>,
}

impl<M: Machine> Transition<M> {
    pub fn next(&self) -> M::State {
        self.next
    }

    pub fn action(&self) -> &Action<M> {
        &self.action
    }
}

impl<M: Machine> fmt::Debug for Transition<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("next", &self.next)
            .field("action", &self.action.name)
            .finish()
    }
}

enum Entry<M: Machine> {
    Transition(Transition<M>),
    Ignore,
}

/// Result of looking up `(state, kind)`.
#[derive(Debug)]
pub enum Lookup<'a, M: Machine> {
    Transition(&'a Transition<M>),
    /// Unmapped or explicitly ignored: no action, state unchanged.
    Ignore,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FsmError {
    #[error("duplicate entry for state {state} on event {kind}")]
    Duplicate { state: String, kind: String },
    #[error("terminal state {state} cannot have an entry (event {kind})")]
    FromTerminal { state: String, kind: String },
    #[error("transition table is missing {} (state, event) pair(s): {:?}", .0.len(), .0)]
    Missing(Vec<(String, String)>),
}

/// Immutable map from `(state, kind)` to a transition or an ignore entry.
pub struct TransitionTable<M: Machine> {
    entries: HashMap<(M::State, Kind<M>), Entry<M>>,
}

impl<M: Machine> TransitionTable<M> {
    pub fn builder() -> TransitionTableBuilder<M> {
        TransitionTableBuilder::default()
    }

    pub fn lookup(&self, state: M::State, kind: Kind<M>) -> Lookup<'_, M> {
        match self.entries.get(&(state, kind)) {
            Some(Entry::Transition(transition)) => Lookup::Transition(transition),
            Some(Entry::Ignore) | None => Lookup::Ignore,
        }
    }

    /// Every mapped transition, in no particular order.
    pub fn transitions(&self) -> impl Iterator<Item = (M::State, Kind<M>, &Transition<M>)> + '_ {
        self.entries.iter().filter_map(|(&(state, kind), entry)| match entry {
            Entry::Transition(transition) => Some((state, kind, transition)),
            Entry::Ignore => None,
        })
    }

    /// Number of mapped transitions.
    pub fn len(&self) -> usize {
        self.transitions().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<M: Machine> fmt::Debug for TransitionTable<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.transitions().map(|(s, k, t)| ((s, k), t)))
            .finish()
    }
}

/// Collects entries and validates them in [`build`](Self::build).
pub struct TransitionTableBuilder<M: Machine> {
    entries: Vec<((M::State, Kind<M>), Entry<M>)>,
    exhaustive: bool,
}

impl<M: Machine> Default for TransitionTableBuilder<M> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            exhaustive: false,
        }
    }
}

impl<M: Machine> TransitionTableBuilder<M> {
    /// Maps `(state, kind)` to `next`, running `action` on the way.
    pub fn on(mut self, state: M::State, kind: Kind<M>, next: M::State, action: Action<M>) -> Self {
        self.entries
            .push(((state, kind), Entry::Transition(Transition { next, action })));
        self
    }

    /// Marks `(state, kind)` as deliberately unhandled.
    pub fn ignore(mut self, state: M::State, kind: Kind<M>) -> Self {
        self.entries.push(((state, kind), Entry::Ignore));
        self
    }

    /// Requires every non-terminal state to say something about every kind,
    /// either a transition or an explicit [`ignore`](Self::ignore).
    pub fn exhaustive(mut self) -> Self {
        self.exhaustive = true;
        self
    }

    pub fn build(self) -> Result<TransitionTable<M>, FsmError> {
        let mut entries = HashMap::with_capacity(self.entries.len());
        for ((state, kind), entry) in self.entries {
            if state == M::State::TERMINAL {
                return Err(FsmError::FromTerminal {
                    state: format!("{state:?}"),
                    kind: format!("{kind:?}"),
                });
            }
            if entries.insert((state, kind), entry).is_some() {
                return Err(FsmError::Duplicate {
                    state: format!("{state:?}"),
                    kind: format!("{kind:?}"),
                });
            }
        }

        if self.exhaustive {
            let missing: Vec<_> = M::State::ALL
                .iter()
                .filter(|state| **state != M::State::TERMINAL)
                .flat_map(|state| M::Event::KINDS.iter().map(move |kind| (*state, *kind)))
                .filter(|pair| !entries.contains_key(pair))
                .map(|(state, kind)| (format!("{state:?}"), format!("{kind:?}")))
                .collect();
            if !missing.is_empty() {
                return Err(FsmError::Missing(missing));
            }
        }

        Ok(TransitionTable { entries })
    }
}
