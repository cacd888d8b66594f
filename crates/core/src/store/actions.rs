use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::state::{
    Area, Note, Selection, State, Track, TrackGroup,
};
use crate::time::{TimeNs, TimeSpan};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionError {
    /// A precondition on the action's arguments does not hold. Checked
    /// before any draft mutation, so a rejected action never corrupts
    /// the committed state.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveOp {
    Before,
    After,
}

/// The full mutation surface of the store.
///
/// Every variant is serializable (`{type, args}` on the wire) and free of
/// hidden nondeterminism: timestamps arrive as arguments and generated
/// ids come from the in-state counter, so a recorded log replays to the
/// same final state anywhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "args", rename_all = "camelCase")]
pub enum Action {
    #[serde(rename_all = "camelCase")]
    AddTrack {
        id: Option<String>,
        engine_id: String,
        kind: String,
        name: String,
        config: serde_json::Value,
        track_sort_key: i64,
        track_group: Option<String>,
    },
    RemoveTrack {
        id: String,
    },
    #[serde(rename_all = "camelCase")]
    MoveTrack {
        src_id: String,
        op: MoveOp,
        dst_id: String,
    },
    ToggleTrackPinned {
        id: String,
    },
    AddTrackGroup {
        id: Option<String>,
        name: String,
        collapsed: bool,
    },
    RemoveTrackGroup {
        id: String,
    },
    #[serde(rename_all = "camelCase")]
    SelectSlice {
        id: i64,
        track_id: String,
        #[serde(default)]
        scroll: bool,
    },
    #[serde(rename_all = "camelCase")]
    SelectCounter {
        id: i64,
        track_id: String,
    },
    SelectNote {
        id: String,
    },
    #[serde(rename_all = "camelCase")]
    SelectArea {
        area_id: String,
    },
    MarkArea {
        start: TimeNs,
        end: TimeNs,
        tracks: Vec<String>,
        persistent: bool,
    },
    #[serde(rename_all = "camelCase")]
    EditArea {
        area_id: String,
        start: TimeNs,
        end: TimeNs,
        tracks: Vec<String>,
    },
    ToggleMarkCurrentArea {
        persistent: bool,
    },
    AddNote {
        timestamp: TimeNs,
        color: String,
        text: String,
    },
    RemoveNote {
        id: String,
    },
    Deselect,
    SetHighlightedSliceId {
        id: Option<i64>,
    },
    SetSearchQuery {
        query: String,
    },
    #[serde(rename_all = "camelCase")]
    SetEngineFailed {
        engine_id: String,
        error: String,
    },
    SetState {
        state: Box<State>,
    },
}

/// Apply one action to a draft. The caller owns the draft and commits it
/// only on `Ok`; invariant checks run before the first mutation of each
/// handler so even an abandoned draft is never half-applied.
pub fn apply(state: &mut State, action: &Action) -> Result<(), ActionError> {
    match action {
        Action::AddTrack {
            id,
            engine_id,
            kind,
            name,
            config,
            track_sort_key,
            track_group,
        } => {
            let id = match id {
                Some(id) => id.clone(),
                None => state.mint_id(),
            };
            let track = Track {
                id: id.clone(),
                engine_id: engine_id.clone(),
                kind: kind.clone(),
                name: name.clone(),
                config: config.clone(),
                sort_key: *track_sort_key,
                group: track_group.clone(),
            };
            let tracks = state.tracks_mut();
            tracks.entries.insert(id.clone(), track);
            if !tracks.order.contains(&id) {
                let sort_key = *track_sort_key;
                let pos = tracks
                    .order
                    .iter()
                    .position(|other| {
                        tracks
                            .entries
                            .get(other)
                            .is_none_or(|t| (t.sort_key, t.id.as_str()) > (sort_key, id.as_str()))
                    })
                    .unwrap_or(tracks.order.len());
                tracks.order.insert(pos, id);
            }
            Ok(())
        }

        Action::RemoveTrack { id } => {
            // Removal races with async callbacks; a second removal of the
            // same id is a no-op, not an error.
            if !state.tracks.entries.contains_key(id) {
                return Ok(());
            }
            let tracks = state.tracks_mut();
            tracks.entries.remove(id);
            tracks.order.retain(|t| t != id);
            tracks.pinned.retain(|t| t != id);
            if selection_references_track(&state.selection.current, id) {
                state.selection_mut().current = None;
            }
            Ok(())
        }

        Action::MoveTrack { src_id, op, dst_id } => {
            let tracks = &state.tracks;
            if src_id == dst_id
                || !tracks.entries.contains_key(src_id)
                || !tracks.entries.contains_key(dst_id)
            {
                return Ok(());
            }
            let order = &mut state.tracks_mut().order;
            order.retain(|t| t != src_id);
            let Some(dst_pos) = order.iter().position(|t| t == dst_id) else {
                order.push(src_id.clone());
                return Ok(());
            };
            let at = match op {
                MoveOp::Before => dst_pos,
                MoveOp::After => dst_pos + 1,
            };
            order.insert(at, src_id.clone());
            Ok(())
        }

        Action::ToggleTrackPinned { id } => {
            if !state.tracks.entries.contains_key(id) {
                return Ok(());
            }
            let pinned = &mut state.tracks_mut().pinned;
            if let Some(pos) = pinned.iter().position(|t| t == id) {
                pinned.remove(pos);
            } else {
                pinned.push(id.clone());
            }
            Ok(())
        }

        Action::AddTrackGroup {
            id,
            name,
            collapsed,
        } => {
            let id = match id {
                Some(id) => id.clone(),
                None => state.mint_id(),
            };
            state.groups_mut().entries.insert(
                id.clone(),
                TrackGroup {
                    id,
                    name: name.clone(),
                    collapsed: *collapsed,
                },
            );
            Ok(())
        }

        Action::RemoveTrackGroup { id } => {
            // Stale removal: group already gone.
            if !state.groups.entries.contains_key(id) {
                return Ok(());
            }
            state.groups_mut().entries.remove(id);
            let orphaned: Vec<String> = state
                .tracks
                .entries
                .values()
                .filter(|t| t.group.as_deref() == Some(id))
                .map(|t| t.id.clone())
                .collect();
            if !orphaned.is_empty() {
                let tracks = state.tracks_mut();
                for track_id in orphaned {
                    if let Some(track) = tracks.entries.get_mut(&track_id) {
                        track.group = None;
                    }
                }
            }
            Ok(())
        }

        Action::SelectSlice { id, track_id, .. } => {
            state.selection_mut().current = Some(Selection::Slice {
                id: *id,
                track_id: track_id.clone(),
            });
            Ok(())
        }

        Action::SelectCounter { id, track_id } => {
            state.selection_mut().current = Some(Selection::Counter {
                id: *id,
                track_id: track_id.clone(),
            });
            Ok(())
        }

        Action::SelectNote { id } => {
            if !state.annotations.notes.contains_key(id) {
                return Ok(());
            }
            state.selection_mut().current = Some(Selection::Note { id: id.clone() });
            Ok(())
        }

        Action::SelectArea { area_id } => {
            if !state.annotations.areas.contains_key(area_id) {
                return Ok(());
            }
            let note_id = note_for_area(state, area_id);
            state.selection_mut().current = Some(Selection::Area {
                area_id: area_id.clone(),
                note_id,
            });
            Ok(())
        }

        Action::MarkArea {
            start,
            end,
            tracks,
            persistent,
        } => {
            let span = span_checked(*start, *end)?;
            let area_id = state.mint_id();
            state.annotations_mut().areas.insert(
                area_id.clone(),
                Area {
                    id: area_id.clone(),
                    span,
                    tracks: tracks.clone(),
                },
            );
            let note_id = if *persistent {
                let note_id = state.mint_id();
                state.annotations_mut().notes.insert(
                    note_id.clone(),
                    Note::Area {
                        id: note_id.clone(),
                        area_id: area_id.clone(),
                        color: DEFAULT_NOTE_COLOR.to_string(),
                        text: String::new(),
                    },
                );
                Some(note_id)
            } else {
                None
            };
            state.selection_mut().current = Some(Selection::Area { area_id, note_id });
            Ok(())
        }

        Action::EditArea {
            area_id,
            start,
            end,
            tracks,
        } => {
            let span = span_checked(*start, *end)?;
            let annotations = state.annotations_mut();
            if let Some(area) = annotations.areas.get_mut(area_id) {
                area.span = span;
                area.tracks = tracks.clone();
            }
            Ok(())
        }

        Action::ToggleMarkCurrentArea { persistent } => {
            let Some(Selection::Area { area_id, note_id }) = state.selection.current.clone()
            else {
                return Ok(());
            };
            match note_id {
                Some(note_id) => {
                    // Un-mark: delete the note, keep the area selected.
                    state.annotations_mut().notes.remove(&note_id);
                    state.selection_mut().current = Some(Selection::Area {
                        area_id,
                        note_id: None,
                    });
                }
                None if *persistent => {
                    let note_id = state.mint_id();
                    state.annotations_mut().notes.insert(
                        note_id.clone(),
                        Note::Area {
                            id: note_id.clone(),
                            area_id: area_id.clone(),
                            color: DEFAULT_NOTE_COLOR.to_string(),
                            text: String::new(),
                        },
                    );
                    state.selection_mut().current = Some(Selection::Area {
                        area_id,
                        note_id: Some(note_id),
                    });
                }
                None => {}
            }
            Ok(())
        }

        Action::AddNote {
            timestamp,
            color,
            text,
        } => {
            let id = state.mint_id();
            state.annotations_mut().notes.insert(
                id.clone(),
                Note::Default {
                    id: id.clone(),
                    timestamp: *timestamp,
                    color: color.clone(),
                    text: text.clone(),
                },
            );
            state.selection_mut().current = Some(Selection::Note { id });
            Ok(())
        }

        Action::RemoveNote { id } => {
            if !state.annotations.notes.contains_key(id) {
                return Ok(());
            }
            state.annotations_mut().notes.remove(id);
            match &state.selection.current {
                Some(Selection::Note { id: selected }) if selected == id => {
                    state.selection_mut().current = None;
                }
                Some(Selection::Area {
                    area_id,
                    note_id: Some(note_id),
                }) if note_id == id => {
                    let area_id = area_id.clone();
                    state.selection_mut().current = Some(Selection::Area {
                        area_id,
                        note_id: None,
                    });
                }
                _ => {}
            }
            Ok(())
        }

        Action::Deselect => {
            if state.selection.current.is_some() {
                state.selection_mut().current = None;
            }
            Ok(())
        }

        Action::SetHighlightedSliceId { id } => {
            if state.selection.highlighted_slice_id != *id {
                state.selection_mut().highlighted_slice_id = *id;
            }
            Ok(())
        }

        Action::SetSearchQuery { query } => {
            if state.search.query != *query {
                state.search_mut().query = query.clone();
            }
            Ok(())
        }

        Action::SetEngineFailed { engine_id, error } => {
            state
                .engines_mut()
                .entries
                .entry(engine_id.clone())
                .or_default()
                .failed = Some(error.clone());
            Ok(())
        }

        Action::SetState { state: new_state } => {
            *state = (**new_state).clone();
            Ok(())
        }
    }
}

const DEFAULT_NOTE_COLOR: &str = "#3d88c4";

fn span_checked(start: TimeNs, end: TimeNs) -> Result<TimeSpan, ActionError> {
    TimeSpan::new(start, end).ok_or_else(|| {
        ActionError::Invariant(format!(
            "area start {} > end {}",
            start.nanos(),
            end.nanos()
        ))
    })
}

fn selection_references_track(selection: &Option<Selection>, track_id: &str) -> bool {
    match selection {
        Some(Selection::Slice { track_id: t, .. }) | Some(Selection::Counter { track_id: t, .. }) => {
            t == track_id
        }
        _ => false,
    }
}

fn note_for_area(state: &State, area_id: &str) -> Option<String> {
    state.annotations.notes.values().find_map(|n| match n {
        Note::Area { id, area_id: a, .. } if a == area_id => Some(id.clone()),
        _ => None,
    })
}
