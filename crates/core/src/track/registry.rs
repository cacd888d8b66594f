use std::collections::BTreeMap;

use thiserror::Error;

use crate::render::TrackRenderer;
use crate::store::state::Track;
use crate::track::TrackController;
use crate::track::counters::{CounterConfig, CounterTrackController};
use crate::track::slices::{SliceConfig, SliceTrackController};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("track kind `{0}` is already registered")]
    AlreadyRegistered(String),
    #[error("unknown track kind `{0}`")]
    UnknownKind(String),
    #[error("bad config for `{kind}` track: {message}")]
    BadConfig { kind: String, message: String },
}

pub type ControllerFactory = fn(&Track) -> Result<Box<dyn TrackController>, RegistryError>;
pub type RendererFactory = fn() -> Box<dyn TrackRenderer>;

/// The controller/renderer capability pair registered for one kind.
#[derive(Clone, Copy)]
pub struct TrackKindImpl {
    pub controller: ControllerFactory,
    pub renderer: RendererFactory,
}

/// Maps a track's `kind` string to its capability pair.
///
/// Duplicate registration is a hard error unless the caller passes
/// `supersede` — intentional override is how embedders replace a
/// built-in kind with their own implementation.
#[derive(Default)]
pub struct KindRegistry {
    entries: BTreeMap<String, TrackKindImpl>,
}

impl KindRegistry {
    pub fn new() -> KindRegistry {
        KindRegistry::default()
    }

    /// A registry with the built-in `"slice"` and `"counter"` kinds.
    pub fn with_builtins() -> KindRegistry {
        let mut registry = KindRegistry::new();
        let _ = registry.register(
            "slice",
            TrackKindImpl {
                controller: slice_controller,
                renderer: || Box::new(crate::render::slices::SliceRenderer),
            },
            false,
        );
        let _ = registry.register(
            "counter",
            TrackKindImpl {
                controller: counter_controller,
                renderer: || Box::new(crate::render::counters::CounterRenderer),
            },
            false,
        );
        registry
    }

    pub fn register(
        &mut self,
        kind: &str,
        implementation: TrackKindImpl,
        supersede: bool,
    ) -> Result<(), RegistryError> {
        if self.entries.contains_key(kind) && !supersede {
            return Err(RegistryError::AlreadyRegistered(kind.to_string()));
        }
        self.entries.insert(kind.to_string(), implementation);
        Ok(())
    }

    pub fn resolve(&self, kind: &str) -> Result<&TrackKindImpl, RegistryError> {
        self.entries
            .get(kind)
            .ok_or_else(|| RegistryError::UnknownKind(kind.to_string()))
    }
}

fn slice_controller(track: &Track) -> Result<Box<dyn TrackController>, RegistryError> {
    let config: SliceConfig =
        serde_json::from_value(track.config.clone()).map_err(|e| RegistryError::BadConfig {
            kind: track.kind.clone(),
            message: e.to_string(),
        })?;
    Ok(Box::new(SliceTrackController::new(config)))
}

fn counter_controller(track: &Track) -> Result<Box<dyn TrackController>, RegistryError> {
    let config: CounterConfig =
        serde_json::from_value(track.config.clone()).map_err(|e| RegistryError::BadConfig {
            kind: track.kind.clone(),
            message: e.to_string(),
        })?;
    Ok(Box::new(CounterTrackController::new(config)))
}
