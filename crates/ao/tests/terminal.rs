//! A loop that ends in the terminal state refuses later events, and `stop`
//! or `drop` join it without waiting on a mailbox nobody reads.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ao::mailbox::{Backend, CodecError, MailboxConfig, Message, Namespace, Reader, Writer};
use ao::{
    Action, ActiveConfig, ActiveError, ActiveObject, Machine, MachineEvent, MachineState, Phase,
    TransitionTable,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Fuse {
    Live,
    Dead,
}

impl MachineState for Fuse {
    const INITIAL: Self = Fuse::Live;
    const TERMINAL: Self = Fuse::Dead;
    const ALL: &'static [Self] = &[Fuse::Live, Fuse::Dead];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Spark(u16);

impl Message for Spark {
    const SIZE: usize = 2;

    fn encode(&self, w: &mut Writer<'_>) -> Result<(), CodecError> {
        w.put_u16(self.0)
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        r.get_u16().map(Spark)
    }
}

impl MachineEvent for Spark {
    type Kind = ();

    const KINDS: &'static [()] = &[()];

    fn kind(&self) {}
}

#[derive(Default)]
struct Circuit;

impl Machine for Circuit {
    type State = Fuse;
    type Event = Spark;
}

fn fuse(backend: Backend) -> Result<ActiveObject<Circuit>, ActiveError> {
    let table = TransitionTable::builder()
        .on(Fuse::Live, (), Fuse::Dead, Action::nop())
        .exhaustive()
        .build()?;
    let config = ActiveConfig::builder("Fuse")
        .mailbox(
            MailboxConfig::builder()
                .capacity(2)
                .backend(backend)
                .namespace(Arc::new(Namespace::new()))
                .build(),
        )
        .build();
    ActiveObject::new(Circuit, table, config)
}

fn wait_for_stopped(ao: &ActiveObject<Circuit>) {
    for _ in 0..400 {
        if ao.phase() == Phase::Stopped {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("loop never reached the terminal state");
}

/// Blows the fuse, then checks that raising is refused and that `stop`
/// returns instead of blocking on the dead loop.
fn blow_then_stop(mut ao: ActiveObject<Circuit>) {
    ao.start().unwrap();
    ao.raise(Spark(1)).unwrap();
    wait_for_stopped(&ao);

    for n in 2..5 {
        assert!(matches!(
            ao.raise(Spark(n)),
            Err(ActiveError::Lifecycle { operation: "raise", .. })
        ));
    }

    let (tx, rx) = mpsc::channel();
    let stopper = thread::spawn(move || {
        let stopped = ao.stop().map(|stopped| (stopped.state, stopped.dispatched));
        tx.send(stopped).unwrap();
        ao
    });
    let stopped = rx.recv_timeout(Duration::from_secs(2)).expect("stop blocked");
    assert_eq!(stopped.unwrap(), (Fuse::Dead, 1));
    stopper.join().unwrap().destroy().unwrap();
}

#[test]
fn terminal_state_refuses_events_and_stop_returns() {
    blow_then_stop(fuse(Backend::Local).unwrap());
}

#[test]
fn destroy_joins_a_loop_that_ended_by_itself() {
    let mut ao = fuse(Backend::Local).unwrap();
    ao.start().unwrap();
    ao.raise(Spark(1)).unwrap();
    wait_for_stopped(&ao);
    ao.destroy().unwrap();
}

#[test]
fn stop_waits_out_a_full_mailbox() {
    let mut ao = fuse(Backend::Local).unwrap();
    ao.raise(Spark(1)).unwrap();
    ao.raise(Spark(2)).unwrap();
    ao.start().unwrap();

    let stopped = ao.stop().unwrap();
    assert_eq!(stopped.state, Fuse::Dead);
    assert_eq!(stopped.dispatched, 1);
}

#[cfg(all(feature = "posix-mq", target_os = "linux"))]
#[test]
fn kernel_queue_terminal_state_refuses_events_and_stop_returns() {
    use ao::mailbox::MailboxError;

    match fuse(Backend::Posix) {
        Ok(ao) => blow_then_stop(ao),
        Err(ActiveError::Mailbox(MailboxError::Create { name, source })) => {
            eprintln!("skipping: cannot open {name}: {source}");
        }
        Err(other) => panic!("unexpected error: {other}"),
    }
}
