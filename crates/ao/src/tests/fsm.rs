use super::{lamp_table, Bulb, Lamp, Signal};
use crate::fsm::{Action, FsmError, Lookup, TransitionTable};

#[test]
fn duplicate_entry_is_rejected() {
    let err = TransitionTable::<Bulb>::builder()
        .on(Lamp::Off, Signal::Toggle, Lamp::On, Action::nop())
        .ignore(Lamp::Off, Signal::Toggle)
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        FsmError::Duplicate {
            state: "Off".into(),
            kind: "Toggle".into()
        }
    );
}

#[test]
fn entry_from_terminal_state_is_rejected() {
    let err = TransitionTable::<Bulb>::builder()
        .on(Lamp::Dead, Signal::Toggle, Lamp::Off, Action::nop())
        .build()
        .unwrap_err();
    assert!(matches!(err, FsmError::FromTerminal { .. }));
}

#[test]
fn exhaustive_table_lists_every_missing_pair() {
    let err = TransitionTable::<Bulb>::builder()
        .on(Lamp::Off, Signal::Toggle, Lamp::On, Action::nop())
        .exhaustive()
        .build()
        .unwrap_err();
    let missing = match err {
        FsmError::Missing(missing) => missing,
        other => panic!("expected Missing, got {other:?}"),
    };
    // Three live states times three kinds, minus the one mapped pair.
    assert_eq!(missing.len(), 8);
    assert!(missing.contains(&("Blown".to_string(), "Ping".to_string())));
    assert!(!missing.iter().any(|(state, _)| state == "Dead"));
}

#[test]
fn exhaustive_table_accepts_explicit_ignores() {
    let table = TransitionTable::<Bulb>::builder()
        .on(Lamp::Off, Signal::Toggle, Lamp::On, Action::nop())
        .on(Lamp::On, Signal::Toggle, Lamp::Off, Action::nop())
        .on(Lamp::On, Signal::Surge, Lamp::Blown, Action::nop())
        .on(Lamp::Blown, Signal::Surge, Lamp::Dead, Action::nop())
        .ignore(Lamp::Off, Signal::Surge)
        .ignore(Lamp::Off, Signal::Ping)
        .ignore(Lamp::On, Signal::Ping)
        .ignore(Lamp::Blown, Signal::Toggle)
        .ignore(Lamp::Blown, Signal::Ping)
        .exhaustive()
        .build()
        .unwrap();
    assert_eq!(table.len(), 4);
    assert!(matches!(table.lookup(Lamp::Blown, Signal::Ping), Lookup::Ignore));
}

#[test]
fn lookup_finds_transitions_and_ignores_the_rest() {
    let table = lamp_table();
    match table.lookup(Lamp::On, Signal::Surge) {
        Lookup::Transition(transition) => {
            assert_eq!(transition.next(), Lamp::Blown);
            assert_eq!(transition.action().name(), "Blow");
        }
        Lookup::Ignore => panic!("On + Surge is mapped"),
    }
    assert!(matches!(table.lookup(Lamp::Off, Signal::Ping), Lookup::Ignore));
    assert!(matches!(table.lookup(Lamp::Dead, Signal::Toggle), Lookup::Ignore));
}

#[test]
fn nop_action_is_named() {
    assert_eq!(Action::<Bulb>::nop().name(), "Nop");
}
