//! States, events and transition table of the Example object.

use ao::mailbox::{CodecError, Message, Reader, Writer};
use ao::{Action, FsmError, Machine, MachineEvent, MachineState, Step, TransitionTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExampleState {
    Idle,
    Running,
    Death,
}

impl MachineState for ExampleState {
    const INITIAL: Self = ExampleState::Idle;
    const TERMINAL: Self = ExampleState::Death;
    const ALL: &'static [Self] = &[ExampleState::Idle, ExampleState::Running, ExampleState::Death];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExampleSignal {
    Nop,
    Example1,
    Example2,
}

/// Event carried in the Example mailbox.
///
/// Wire layout, 9 bytes: `[tag u8][param i32 LE][param2 i32 LE]`. Fields an
/// event does not use are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExampleEvent {
    Nop,
    One { param: i32 },
    Two { param2: i32 },
}

const TAG_NOP: u8 = 0;
const TAG_EXAMPLE1: u8 = 1;
const TAG_EXAMPLE2: u8 = 2;

impl Message for ExampleEvent {
    const SIZE: usize = 9;

    fn encode(&self, w: &mut Writer<'_>) -> Result<(), CodecError> {
        let (tag, param, param2) = match *self {
            ExampleEvent::Nop => (TAG_NOP, 0, 0),
            ExampleEvent::One { param } => (TAG_EXAMPLE1, param, 0),
            ExampleEvent::Two { param2 } => (TAG_EXAMPLE2, 0, param2),
        };
        w.put_u8(tag)?;
        w.put_i32(param)?;
        w.put_i32(param2)
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let tag = r.get_u8()?;
        let param = r.get_i32()?;
        let param2 = r.get_i32()?;
        match tag {
            TAG_NOP => Ok(ExampleEvent::Nop),
            TAG_EXAMPLE1 => Ok(ExampleEvent::One { param }),
            TAG_EXAMPLE2 => Ok(ExampleEvent::Two { param2 }),
            other => Err(CodecError::UnknownTag(other)),
        }
    }
}

impl MachineEvent for ExampleEvent {
    type Kind = ExampleSignal;

    const KINDS: &'static [ExampleSignal] =
        &[ExampleSignal::Nop, ExampleSignal::Example1, ExampleSignal::Example2];

    fn kind(&self) -> ExampleSignal {
        match self {
            ExampleEvent::Nop => ExampleSignal::Nop,
            ExampleEvent::One { .. } => ExampleSignal::Example1,
            ExampleEvent::Two { .. } => ExampleSignal::Example2,
        }
    }
}

/// Instance data the Example actions work on.
#[derive(Debug, Default)]
pub struct ExampleMachine {
    /// Names of the actions run so far, oldest first.
    pub history: Vec<&'static str>,
    pub last_param: Option<i32>,
}

impl Machine for ExampleMachine {
    type State = ExampleState;
    type Event = ExampleEvent;
}

fn param_of(event: &ExampleEvent) -> i32 {
    match *event {
        ExampleEvent::One { param } => param,
        ExampleEvent::Two { param2 } => param2,
        ExampleEvent::Nop => 0,
    }
}

fn observe(machine: &mut ExampleMachine, step: &Step<'_, ExampleMachine>) {
    let param = param_of(step.event);
    log::info!("[{}] - {param}", step.action);
    machine.history.push(step.action);
    machine.last_param = Some(param);
}

/// Idle --Example1--> Running --Example1--> Running --Example2--> Idle.
/// Nop and every other pair are explicit ignores.
pub fn table() -> Result<TransitionTable<ExampleMachine>, FsmError> {
    use ExampleSignal::*;
    use ExampleState::*;

    TransitionTable::builder()
        .on(Idle, Example1, Running, Action::new("Example1FromIdle", observe))
        .on(Running, Example1, Running, Action::new("Example1FromRunning", observe))
        .on(Running, Example2, Idle, Action::new("Example2", observe))
        .ignore(Idle, Nop)
        .ignore(Idle, Example2)
        .ignore(Running, Nop)
        .exhaustive()
        .build()
}

#[cfg(test)]
mod tests {
    use ao::mailbox::codec::{from_frame, to_frame};

    use super::*;

    #[test]
    fn event_layout_is_tag_then_two_le_ints() {
        let frame = to_frame(&ExampleEvent::Two { param2: -2 }).unwrap();
        assert_eq!(frame, [2, 0, 0, 0, 0, 0xFE, 0xFF, 0xFF, 0xFF]);
        assert_eq!(
            from_frame::<ExampleEvent>(&frame).unwrap(),
            ExampleEvent::Two { param2: -2 }
        );
    }

    #[test]
    fn unknown_tag_is_a_codec_error() {
        let frame = [9, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            from_frame::<ExampleEvent>(&frame).unwrap_err(),
            CodecError::UnknownTag(9)
        );
    }

    #[test]
    fn table_is_exhaustive() {
        let table = table().unwrap();
        assert_eq!(table.len(), 3);
    }
}
