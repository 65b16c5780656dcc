mod fsm;

use std::sync::Arc;

use mailbox::{CodecError, MailboxConfig, Message, Namespace, Reader, Writer};
use once_cell::sync::Lazy;

use crate::active::ActiveConfig;
use crate::fsm::{Action, Machine, MachineEvent, MachineState, TransitionTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Lamp {
    Off,
    On,
    Blown,
    Dead,
}

impl MachineState for Lamp {
    const INITIAL: Self = Lamp::Off;
    const TERMINAL: Self = Lamp::Dead;
    const ALL: &'static [Self] = &[Lamp::Off, Lamp::On, Lamp::Blown, Lamp::Dead];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Signal {
    Toggle,
    Surge,
    Ping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LampEvent {
    Toggle(u16),
    Surge,
    Ping,
}

impl LampEvent {
    pub(crate) fn sample(kind: Signal) -> Self {
        match kind {
            Signal::Toggle => LampEvent::Toggle(1),
            Signal::Surge => LampEvent::Surge,
            Signal::Ping => LampEvent::Ping,
        }
    }
}

impl Message for LampEvent {
    const SIZE: usize = 3;

    fn encode(&self, w: &mut Writer<'_>) -> Result<(), CodecError> {
        match self {
            LampEvent::Toggle(n) => {
                w.put_u8(0)?;
                w.put_u16(*n)
            }
            LampEvent::Surge => {
                w.put_u8(1)?;
                w.skip(2)
            }
            LampEvent::Ping => {
                w.put_u8(2)?;
                w.skip(2)
            }
        }
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let tag = r.get_u8()?;
        let value = r.get_u16()?;
        match tag {
            0 => Ok(LampEvent::Toggle(value)),
            1 => Ok(LampEvent::Surge),
            2 => Ok(LampEvent::Ping),
            other => Err(CodecError::UnknownTag(other)),
        }
    }
}

impl MachineEvent for LampEvent {
    type Kind = Signal;

    const KINDS: &'static [Signal] = &[Signal::Toggle, Signal::Surge, Signal::Ping];

    fn kind(&self) -> Signal {
        match self {
            LampEvent::Toggle(_) => Signal::Toggle,
            LampEvent::Surge => Signal::Surge,
            LampEvent::Ping => Signal::Ping,
        }
    }
}

/// Records every action as `(name, state seen, next state)`.
#[derive(Debug, Default)]
pub(crate) struct Bulb {
    pub(crate) log: Vec<(&'static str, Lamp, Lamp)>,
    pub(crate) toggles: u32,
}

impl Machine for Bulb {
    type State = Lamp;
    type Event = LampEvent;
}

fn record(name: &'static str) -> Action<Bulb> {
    Action::new(name, |bulb: &mut Bulb, step| {
        bulb.log.push((step.action, step.state, step.next));
        if let LampEvent::Toggle(n) = step.event {
            bulb.toggles += u32::from(*n);
        }
    })
}

/// Transitions only; every other pair is unmapped.
pub(crate) fn lamp_table() -> TransitionTable<Bulb> {
    TransitionTable::builder()
        .on(Lamp::Off, Signal::Toggle, Lamp::On, record("SwitchOn"))
        .on(Lamp::On, Signal::Toggle, Lamp::Off, record("SwitchOff"))
        .on(Lamp::On, Signal::Surge, Lamp::Blown, record("Blow"))
        .on(Lamp::Blown, Signal::Surge, Lamp::Dead, record("Melt"))
        .build()
        .unwrap()
}

static SHARED: Lazy<Arc<Namespace>> = Lazy::new(|| Arc::new(Namespace::new()));

/// Config in a namespace shared by the unit tests but not by the process.
pub(crate) fn config(tag: &str) -> ActiveConfig<Bulb> {
    ActiveConfig::builder(tag)
        .mailbox(MailboxConfig::builder().namespace(Arc::clone(&SHARED)).build())
        .build()
}

pub(crate) fn shared_namespace() -> Arc<Namespace> {
    Arc::clone(&SHARED)
}
