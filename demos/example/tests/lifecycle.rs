use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ao::mailbox::{MailboxConfig, Namespace};
use ao::{MachineOutcome, Outcome, Phase};
use example::{timeout, Example, ExampleMachine, ExampleSignal, ExampleState};
use watchdog::Watchdog;

fn traced() -> (Example, Receiver<MachineOutcome<ExampleMachine>>) {
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let config = Example::config()
        .mailbox(
            MailboxConfig::builder()
                .namespace(Arc::new(Namespace::new()))
                .build(),
        )
        .trace_hook(move |outcome| {
            let _ = tx.lock().unwrap().send(*outcome);
        })
        .build();
    (Example::with_config(config).unwrap(), rx)
}

fn next(rx: &Receiver<MachineOutcome<ExampleMachine>>) -> MachineOutcome<ExampleMachine> {
    rx.recv_timeout(Duration::from_secs(2)).unwrap()
}

#[test]
fn lifecycle_scenario() {
    let (mut example, rx) = traced();
    assert_eq!(example.name().as_str(), "/mboxExample1");
    assert_eq!(example.thread_name(), "ExampleTask1");
    example.start().unwrap();

    example.event_one(1).unwrap();
    assert_eq!(
        next(&rx),
        Outcome::Transition {
            from: ExampleState::Idle,
            to: ExampleState::Running,
            kind: ExampleSignal::Example1,
            action: "Example1FromIdle",
        }
    );

    example.event_one(2).unwrap();
    assert_eq!(
        next(&rx),
        Outcome::Transition {
            from: ExampleState::Running,
            to: ExampleState::Running,
            kind: ExampleSignal::Example1,
            action: "Example1FromRunning",
        }
    );

    example.event_two(3).unwrap();
    assert_eq!(
        next(&rx),
        Outcome::Transition {
            from: ExampleState::Running,
            to: ExampleState::Idle,
            kind: ExampleSignal::Example2,
            action: "Example2",
        }
    );

    let stopped = example.stop().unwrap();
    assert_eq!(stopped.state, ExampleState::Death);
    assert_eq!(
        stopped.machine.history,
        ["Example1FromIdle", "Example1FromRunning", "Example2"]
    );
    assert_eq!(stopped.machine.last_param, Some(3));
    assert_eq!(example.phase(), Phase::Stopped);
    example.destroy().unwrap();
}

#[test]
fn event_two_while_idle_is_ignored() {
    let (mut example, rx) = traced();
    example.start().unwrap();
    example.event_two(7).unwrap();
    assert_eq!(
        next(&rx),
        Outcome::Ignored {
            state: ExampleState::Idle,
            kind: ExampleSignal::Example2,
        }
    );
    assert!(example.stop().unwrap().machine.history.is_empty());
}

#[test]
fn watchdog_timeout_raises_event_two_once() {
    let (mut example, rx) = traced();
    example.start().unwrap();
    example.event_one(1).unwrap();
    next(&rx);

    let watchdog = Watchdog::construct(100, timeout(example.events())).unwrap();
    watchdog.start().unwrap();
    assert_eq!(
        next(&rx),
        Outcome::Transition {
            from: ExampleState::Running,
            to: ExampleState::Idle,
            kind: ExampleSignal::Example2,
            action: "Example2",
        }
    );
    assert!(rx.recv_timeout(Duration::from_millis(250)).is_err());
    assert_eq!(watchdog.fired(), 1);
    watchdog.destroy();

    let stopped = example.stop().unwrap();
    assert_eq!(stopped.machine.last_param, Some(1));
}

#[test]
fn cancelled_watchdog_never_raises() {
    let (mut example, rx) = traced();
    example.start().unwrap();

    let watchdog = Watchdog::construct(100, timeout(example.events())).unwrap();
    watchdog.start().unwrap();
    watchdog.cancel();
    assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
    assert_eq!(watchdog.fired(), 0);
    watchdog.destroy();

    let stopped = example.stop().unwrap();
    assert_eq!(stopped.dispatched, 1);
}

#[test]
fn timeout_after_stop_is_dropped() {
    let (mut example, _rx) = traced();
    let events = example.events();
    example.start().unwrap();
    example.stop().unwrap();

    // Raising on a stopped object is logged, never a panic.
    let watchdog = Watchdog::construct(10, timeout(events)).unwrap();
    watchdog.start().unwrap();
    std::thread::sleep(Duration::from_millis(60));
    assert_eq!(watchdog.fired(), 1);
}
