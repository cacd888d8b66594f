use std::sync::Arc;

use crate::scheduler::RedrawLevel;
use crate::store::actions::{Action, ActionError, apply};
use crate::store::state::State;

/// Single source of truth for application state.
///
/// Actions apply strictly in submission order against the latest
/// committed snapshot. Each dispatch builds a draft (cheap clone of the
/// `Arc` subtrees), validates + mutates it, and commits atomically —
/// readers only ever observe the pre- or post-action snapshot.
pub struct Store {
    state: State,
    log: Vec<Action>,
}

impl Store {
    pub fn new(initial: State) -> Store {
        Store {
            state: initial,
            log: Vec::new(),
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// The ordered action log since construction, replayable for
    /// permalink fidelity.
    pub fn log(&self) -> &[Action] {
        &self.log
    }

    /// Apply one action. Returns the minimum redraw level the commit
    /// warrants, or `None` when the state is unchanged.
    pub fn dispatch(&mut self, action: Action) -> Result<Option<RedrawLevel>, ActionError> {
        let mut draft = self.state.clone();
        apply(&mut draft, &action)?;
        let level = diff_level(&self.state, &draft);
        self.state = draft;
        self.log.push(action);
        Ok(level)
    }
}

/// Replay an ordered action log against a fresh initial state.
pub fn replay(initial: State, log: &[Action]) -> Result<State, ActionError> {
    let mut state = initial;
    for action in log {
        apply(&mut state, action)?;
    }
    Ok(state)
}

/// Compare snapshots by subtree pointer identity.
///
/// Structural changes (tracks, groups) need layout to re-run; anything
/// else is repaint-only. Returns `None` when every subtree is shared,
/// i.e. the action was a no-op.
fn diff_level(old: &State, new: &State) -> Option<RedrawLevel> {
    if !Arc::ptr_eq(&old.tracks, &new.tracks) || !Arc::ptr_eq(&old.groups, &new.groups) {
        return Some(RedrawLevel::Full);
    }
    let content_changed = !Arc::ptr_eq(&old.selection, &new.selection)
        || !Arc::ptr_eq(&old.annotations, &new.annotations)
        || !Arc::ptr_eq(&old.engines, &new.engines)
        || !Arc::ptr_eq(&old.search, &new.search)
        || old.next_id != new.next_id;
    content_changed.then_some(RedrawLevel::Content)
}

/// Marshals actions from any number of UI sources into the store in
/// submission order. Sources enqueue at any time; the frame pump flushes
/// the queue in one pass, never interleaving mid-action.
#[derive(Default)]
pub struct Dispatcher {
    queue: Vec<Action>,
}

impl Dispatcher {
    pub fn new() -> Dispatcher {
        Dispatcher::default()
    }

    pub fn enqueue(&mut self, action: Action) {
        self.queue.push(action);
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drain the queue into the store. Returns the strongest redraw
    /// level any applied action produced.
    pub fn flush(&mut self, store: &mut Store) -> Result<Option<RedrawLevel>, ActionError> {
        let mut level: Option<RedrawLevel> = None;
        for action in self.queue.drain(..) {
            if let Some(l) = store.dispatch(action)? {
                level = Some(match level {
                    Some(RedrawLevel::Full) => RedrawLevel::Full,
                    _ => l,
                });
            }
        }
        Ok(level)
    }
}

// --- Permalinks ---

/// A serialized state snapshot addressable by an opaque content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permalink {
    pub hash: String,
    pub payload: String,
}

/// Serialize a snapshot for sharing. The hash is FNV-1a over the JSON
/// payload — opaque, stable, and collision-tolerant for lookup keys.
pub fn encode_permalink(state: &State) -> Result<Permalink, serde_json::Error> {
    let payload = serde_json::to_string(state)?;
    Ok(Permalink {
        hash: format!("{:016x}", fnv1a64(payload.as_bytes())),
        payload,
    })
}

/// Decode a permalink payload back into a full state snapshot. The
/// caller loads it by dispatching `setState`.
pub fn decode_permalink(payload: &str) -> Result<State, serde_json::Error> {
    serde_json::from_str(payload)
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::actions::MoveOp;
    use crate::time::TimeNs;

    fn add_track_action(id: &str, sort_key: i64) -> Action {
        Action::AddTrack {
            id: Some(id.to_string()),
            engine_id: "e0".into(),
            kind: "slice".into(),
            name: id.to_string(),
            config: serde_json::json!({"sourceId": 1}),
            track_sort_key: sort_key,
            track_group: None,
        }
    }

    #[test]
    fn replay_is_deterministic() {
        let log = vec![
            add_track_action("a", 10),
            add_track_action("b", 20),
            Action::MarkArea {
                start: TimeNs(5),
                end: TimeNs(50),
                tracks: vec!["a".into()],
                persistent: true,
            },
            Action::MoveTrack {
                src_id: "b".into(),
                op: MoveOp::Before,
                dst_id: "a".into(),
            },
            Action::AddNote {
                timestamp: TimeNs(30),
                color: "#00ff00".into(),
                text: "gc pause".into(),
            },
        ];
        let mut store = Store::new(State::default());
        for action in &log {
            store.dispatch(action.clone()).expect("dispatch");
        }
        let replayed = replay(State::default(), store.log()).expect("replay");
        assert_eq!(&replayed, store.state());

        let replayed_again = replay(State::default(), &log).expect("replay");
        assert_eq!(replayed_again, replayed);
    }

    #[test]
    fn structural_change_requests_full_redraw() {
        let mut store = Store::new(State::default());
        let level = store.dispatch(add_track_action("a", 0)).expect("dispatch");
        assert_eq!(level, Some(RedrawLevel::Full));
    }

    #[test]
    fn selection_change_requests_content_redraw_and_shares_tracks() {
        let mut store = Store::new(State::default());
        store.dispatch(add_track_action("a", 0)).expect("dispatch");
        let before = store.state().clone();
        let level = store
            .dispatch(Action::SetHighlightedSliceId { id: Some(4) })
            .expect("dispatch");
        assert_eq!(level, Some(RedrawLevel::Content));
        // The tracks subtree was not copied.
        assert!(Arc::ptr_eq(&before.tracks, &store.state().tracks));
    }

    #[test]
    fn noop_action_requests_nothing() {
        let mut store = Store::new(State::default());
        let level = store
            .dispatch(Action::RemoveTrack { id: "ghost".into() })
            .expect("dispatch");
        assert_eq!(level, None);
    }

    #[test]
    fn failed_action_leaves_state_untouched() {
        let mut store = Store::new(State::default());
        store.dispatch(add_track_action("a", 0)).expect("dispatch");
        let before = store.state().clone();
        let err = store.dispatch(Action::MarkArea {
            start: TimeNs(9),
            end: TimeNs(1),
            tracks: vec![],
            persistent: true,
        });
        assert!(err.is_err());
        assert_eq!(&before, store.state());
        assert_eq!(store.log().len(), 1);
    }

    #[test]
    fn dispatcher_flush_preserves_order_and_upgrades_level() {
        let mut store = Store::new(State::default());
        let mut dispatcher = Dispatcher::new();
        dispatcher.enqueue(Action::SetSearchQuery {
            query: "gc".into(),
        });
        dispatcher.enqueue(add_track_action("a", 0));
        let level = dispatcher.flush(&mut store).expect("flush");
        assert_eq!(level, Some(RedrawLevel::Full));
        assert!(dispatcher.is_empty());
        assert_eq!(store.state().search.query, "gc");
        assert!(store.state().tracks.entries.contains_key("a"));
    }

    #[test]
    fn permalink_roundtrip() {
        let mut store = Store::new(State::default());
        store.dispatch(add_track_action("a", 0)).expect("dispatch");
        let link = encode_permalink(store.state()).expect("encode");
        assert_eq!(link.hash.len(), 16);
        let decoded = decode_permalink(&link.payload).expect("decode");
        assert_eq!(&decoded, store.state());

        // Loading a permalink replaces the whole store.
        let mut fresh = Store::new(State::default());
        fresh
            .dispatch(Action::SetState {
                state: Box::new(decoded),
            })
            .expect("set state");
        assert_eq!(fresh.state(), store.state());
    }
}
