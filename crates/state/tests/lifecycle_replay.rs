//! Replays wire-named event sequences through the shared lifecycle graph.

use std::collections::BTreeMap;

use tessera_state::{
    build_lifecycle, lifecycle, Dispatch, Event, LifecycleContext, StateError, StateId,
    StateMachine, Stateful, UnhandledPolicy,
};

struct Draft {
    state: StateId,
    overlay: BTreeMap<String, String>,
    in_flight: BTreeMap<String, String>,
}

impl Stateful for Draft {
    fn current_state(&self) -> StateId {
        self.state
    }
    fn set_current_state(&mut self, state: StateId) {
        self.state = state;
    }
}

impl LifecycleContext for Draft {
    fn capture_in_flight(&mut self) {
        let overlay = std::mem::take(&mut self.overlay);
        self.in_flight.extend(overlay);
    }
    fn restore_in_flight(&mut self) {
        for (k, v) in std::mem::take(&mut self.in_flight) {
            self.overlay.entry(k).or_insert(v);
        }
    }
    fn discard_overlay(&mut self) {
        self.overlay.clear();
    }
    fn discard_all(&mut self) {
        self.overlay.clear();
        self.in_flight.clear();
    }
}

fn machine(policy: UnhandledPolicy) -> StateMachine<Draft> {
    build_lifecycle(policy).unwrap()
}

fn fresh(m: &StateMachine<Draft>) -> Draft {
    Draft {
        state: m.lookup(lifecycle::EMPTY).unwrap(),
        overlay: BTreeMap::new(),
        in_flight: BTreeMap::new(),
    }
}

/// Send each wire-named event in turn and collect the resulting paths.
fn replay(m: &StateMachine<Draft>, draft: &mut Draft, events: &[&str]) -> Vec<String> {
    events
        .iter()
        .map(|name| {
            let event: Event = name.parse().unwrap();
            m.send(event, draft).unwrap();
            m.path(draft.current_state()).to_string()
        })
        .collect()
}

#[test]
fn load_edit_save_round_trip() {
    let m = machine(UnhandledPolicy::Ignore);
    let mut draft = fresh(&m);
    let paths = replay(
        &m,
        &mut draft,
        &["pushedData", "didSetProperty", "willCommit", "didCommit"],
    );
    assert_eq!(
        paths,
        vec![
            lifecycle::SAVED,
            lifecycle::UPDATED_UNCOMMITTED,
            lifecycle::UPDATED_IN_FLIGHT,
            lifecycle::SAVED,
        ]
    );
}

#[test]
fn fragment_notification_dirties_and_reset_cleans() {
    let m = machine(UnhandledPolicy::Ignore);
    let mut draft = fresh(&m);
    let paths = replay(
        &m,
        &mut draft,
        &["pushedData", "becameDirty", "becameDirty", "propertyWasReset"],
    );
    assert_eq!(paths.last().map(String::as_str), Some(lifecycle::SAVED));
    assert_eq!(paths[1], lifecycle::UPDATED_UNCOMMITTED);
    assert_eq!(paths[2], lifecycle::UPDATED_UNCOMMITTED);
}

#[test]
fn failed_save_keeps_edits() {
    let m = machine(UnhandledPolicy::Ignore);
    let mut draft = fresh(&m);
    replay(&m, &mut draft, &["pushedData", "didSetProperty"]);
    draft.overlay.insert("name".into(), "Z Team".into());

    replay(&m, &mut draft, &["willCommit", "becameError"]);
    assert_eq!(m.path(draft.state), lifecycle::UPDATED_UNCOMMITTED);
    assert_eq!(draft.overlay.get("name").map(String::as_str), Some("Z Team"));
    assert!(draft.in_flight.is_empty());
}

#[test]
fn new_record_flags() {
    let m = machine(UnhandledPolicy::Ignore);
    let mut draft = fresh(&m);
    assert!(m.flags(draft.state).is_empty);
    assert!(m.flags(draft.state).is_valid);

    replay(&m, &mut draft, &["loadedData"]);
    let flags = m.flags(draft.state);
    assert!(flags.is_new && flags.is_dirty && flags.is_loaded);
    assert!(!flags.is_empty);

    replay(&m, &mut draft, &["willCommit"]);
    assert!(m.flags(draft.state).is_saving);
    replay(&m, &mut draft, &["didCommit"]);
    assert!(!m.flags(draft.state).is_new);
}

#[test]
fn unknown_wire_name_is_rejected() {
    match "didExplode".parse::<Event>() {
        Err(StateError::UnknownEvent(name)) => assert_eq!(name, "didExplode"),
        other => panic!("expected UnknownEvent, got {:?}", other),
    }
}

#[test]
fn policy_decides_unhandled_events() {
    let lenient = machine(UnhandledPolicy::Ignore);
    let mut draft = fresh(&lenient);
    replay(&lenient, &mut draft, &["pushedData"]);
    assert_eq!(
        lenient.send(Event::DidCommit, &mut draft).unwrap(),
        Dispatch::Ignored
    );

    let strict = machine(UnhandledPolicy::Reject);
    let mut draft = fresh(&strict);
    replay(&strict, &mut draft, &["pushedData"]);
    assert!(matches!(
        strict.send(Event::DidCommit, &mut draft),
        Err(StateError::UnhandledEvent { .. })
    ));
    assert_eq!(strict.path(draft.state), lifecycle::SAVED);
}
