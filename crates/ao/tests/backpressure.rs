//! A busy dispatch thread makes raisers wait once the mailbox is full.

use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ao::mailbox::{CodecError, MailboxConfig, Message, Namespace, Reader, Writer};
use ao::{Action, ActiveConfig, ActiveObject, Machine, MachineEvent, MachineState, TransitionTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Stage {
    Working,
    Done,
}

impl MachineState for Stage {
    const INITIAL: Self = Stage::Working;
    const TERMINAL: Self = Stage::Done;
    const ALL: &'static [Self] = &[Stage::Working, Stage::Done];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Job(u32);

impl Message for Job {
    const SIZE: usize = 4;

    fn encode(&self, w: &mut Writer<'_>) -> Result<(), CodecError> {
        w.put_u32(self.0)
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        r.get_u32().map(Job)
    }
}

impl MachineEvent for Job {
    type Kind = ();

    const KINDS: &'static [()] = &[()];

    fn kind(&self) {}
}

/// Each job waits for a token before it completes.
struct Worker {
    gate: Receiver<()>,
    done: Vec<u32>,
}

impl Machine for Worker {
    type State = Stage;
    type Event = Job;
}

#[test]
fn raise_blocks_while_the_mailbox_is_full() {
    let (gate_tx, gate_rx) = mpsc::channel();
    let table = TransitionTable::builder()
        .on(
            Stage::Working,
            (),
            Stage::Working,
            Action::new("Work", |worker: &mut Worker, step| {
                worker.gate.recv().unwrap();
                worker.done.push(step.event.0);
            }),
        )
        .exhaustive()
        .build()
        .unwrap();
    let config = ActiveConfig::builder("Worker")
        .mailbox(
            MailboxConfig::builder()
                .capacity(2)
                .namespace(Arc::new(Namespace::new()))
                .build(),
        )
        .build();
    let worker = Worker {
        gate: gate_rx,
        done: Vec::new(),
    };
    let mut ao = ActiveObject::new(worker, table, config).unwrap();
    ao.start().unwrap();

    // Job 0 is taken by the thread and parks on the gate.
    ao.raise(Job(0)).unwrap();
    thread::sleep(Duration::from_millis(50));
    // Jobs 1 and 2 fill the two slots.
    ao.raise(Job(1)).unwrap();
    ao.raise(Job(2)).unwrap();

    let (raised_tx, raised_rx) = mpsc::channel();
    let events = ao.events();
    let raiser = thread::spawn(move || {
        events.raise(Job(3)).unwrap();
        raised_tx.send(()).unwrap();
    });
    assert!(raised_rx.recv_timeout(Duration::from_millis(100)).is_err());

    for _ in 0..4 {
        gate_tx.send(()).unwrap();
    }
    raised_rx.recv_timeout(Duration::from_secs(2)).unwrap();
    raiser.join().unwrap();

    let stopped = ao.stop().unwrap();
    assert_eq!(stopped.machine.done, vec![0, 1, 2, 3]);
}
