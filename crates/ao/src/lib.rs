//! # ao
//!
//! Active objects for small real-time programs. Each object owns one OS
//! thread, one bounded [`mailbox`] and a finite-state machine driven by a
//! [`TransitionTable`].
//!
//! ## Module Overview
//! - [`fsm`]      – [`Machine`] traits, named [`Action`]s and the validated [`TransitionTable`].
//! - [`dispatch`] – [`Dispatcher`] applying one envelope at a time and reporting an [`Outcome`].
//! - [`active`]   – [`ActiveObject`] lifecycle, [`EventSender`] and [`ActiveConfig`].
//!
//! State is only touched by the object's own thread. Other threads talk to
//! it by raising events, which are encoded into the mailbox behind a
//! versioned [`Envelope`](mailbox::Envelope) header. A kill frame always
//! ends the loop, whatever the table says.

pub mod active;
pub mod dispatch;
pub mod fsm;

pub use active::{ActiveConfig, ActiveConfigBuilder, ActiveError, ActiveObject, EventSender, Phase};
pub use dispatch::{Dispatcher, MachineOutcome, Outcome, Stopped, TraceHook};
pub use fsm::{
    Action, FsmError, Kind, Lookup, Machine, MachineEvent, MachineState, Step, Transition,
    TransitionTable, TransitionTableBuilder,
};
pub use mailbox;

#[cfg(test)]
mod tests;
