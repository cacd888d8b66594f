use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::time::{TimeNs, TimeSpan};

/// One horizontal lane of the timeline.
///
/// `kind` selects the controller/renderer pair that services the track;
/// `config` is the kind-specific payload those implementations parse
/// (kept as raw JSON so plugin kinds can carry arbitrary shapes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub engine_id: String,
    pub kind: String,
    pub name: String,
    pub config: serde_json::Value,
    pub sort_key: i64,
    pub group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackState {
    pub entries: BTreeMap<String, Track>,
    /// Display order, maintained sorted by `(sort_key, id)` on insert and
    /// rearranged by explicit move actions afterwards.
    pub order: Vec<String>,
    pub pinned: Vec<String>,
}

impl TrackState {
    pub fn ordered(&self) -> impl Iterator<Item = &Track> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackGroup {
    pub id: String,
    pub name: String,
    pub collapsed: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GroupState {
    pub entries: BTreeMap<String, TrackGroup>,
}

/// The single active selection; `None` in `SelectionState::current`
/// means nothing is selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Selection {
    #[serde(rename_all = "camelCase")]
    Slice { id: i64, track_id: String },
    #[serde(rename_all = "camelCase")]
    Counter { id: i64, track_id: String },
    #[serde(rename_all = "camelCase")]
    Area {
        area_id: String,
        /// Set when the area has been persisted as a note.
        note_id: Option<String>,
    },
    Note { id: String },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionState {
    pub current: Option<Selection>,
    /// Slice id under the pointer; tracks showing the same logical entity
    /// cross-highlight from this.
    pub highlighted_slice_id: Option<i64>,
}

/// A user-marked region of the timeline referencing a set of tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub id: String,
    pub span: TimeSpan,
    pub tracks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "noteType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Note {
    #[serde(rename_all = "camelCase")]
    Default {
        id: String,
        timestamp: TimeNs,
        color: String,
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Area {
        id: String,
        area_id: String,
        color: String,
        text: String,
    },
}

impl Note {
    pub fn id(&self) -> &str {
        match self {
            Note::Default { id, .. } | Note::Area { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnnotationState {
    pub notes: BTreeMap<String, Note>,
    pub areas: BTreeMap<String, Area>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineStatus {
    /// Last failure message, if the engine has failed. Tracks on a failed
    /// engine keep their loading placeholder instead of crashing the view.
    pub failed: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineState {
    pub entries: BTreeMap<String, EngineStatus>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchState {
    pub query: String,
}

/// The immutable application state snapshot.
///
/// Subtrees are `Arc`-wrapped: reducers clone the snapshot (refcount
/// bumps) and mutate through [`Arc::make_mut`], so only subtrees on the
/// mutated path are actually copied. Untouched subtrees keep pointer
/// identity across commits, which is what lets consumers detect "nothing
/// I care about changed" with a pointer comparison.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    #[serde(with = "cow_arc")]
    pub tracks: Arc<TrackState>,
    #[serde(with = "cow_arc")]
    pub groups: Arc<GroupState>,
    #[serde(with = "cow_arc")]
    pub selection: Arc<SelectionState>,
    #[serde(with = "cow_arc")]
    pub annotations: Arc<AnnotationState>,
    #[serde(with = "cow_arc")]
    pub engines: Arc<EngineState>,
    #[serde(with = "cow_arc")]
    pub search: Arc<SearchState>,
    /// Monotonic id counter. Lives in the state so that id generation is
    /// itself a deterministic, replayable transition.
    pub next_id: u64,
}

impl State {
    pub(crate) fn tracks_mut(&mut self) -> &mut TrackState {
        Arc::make_mut(&mut self.tracks)
    }

    pub(crate) fn groups_mut(&mut self) -> &mut GroupState {
        Arc::make_mut(&mut self.groups)
    }

    pub(crate) fn selection_mut(&mut self) -> &mut SelectionState {
        Arc::make_mut(&mut self.selection)
    }

    pub(crate) fn annotations_mut(&mut self) -> &mut AnnotationState {
        Arc::make_mut(&mut self.annotations)
    }

    pub(crate) fn engines_mut(&mut self) -> &mut EngineState {
        Arc::make_mut(&mut self.engines)
    }

    pub(crate) fn search_mut(&mut self) -> &mut SearchState {
        Arc::make_mut(&mut self.search)
    }

    /// Mint the next generated entity id.
    pub(crate) fn mint_id(&mut self) -> String {
        let id = self.next_id;
        self.next_id += 1;
        id.to_string()
    }
}

/// Serde for `Arc<T>` subtrees without serde's `rc` feature: serialize
/// through the inner value, rebuild a fresh `Arc` on deserialize.
mod cow_arc {
    use std::sync::Arc;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T: Serialize, S: Serializer>(v: &Arc<T>, s: S) -> Result<S::Ok, S::Error> {
        T::serialize(v, s)
    }

    pub fn deserialize<'de, T, D>(d: D) -> Result<Arc<T>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        T::deserialize(d).map(Arc::new)
    }
}
