pub mod counters;
pub mod data;
pub mod registry;
pub mod slices;

pub use data::{CounterData, SliceData, SliceDataBuilder, StringTable, TrackData};
pub use registry::{KindRegistry, RegistryError, TrackKindImpl};

use crate::engine::{Engine, QueryCompletion, QueryId};
use crate::time::{TimeNs, TimeSpan};

/// One windowed data request: the visible time range and the
/// quantization bucket size derived from the pixel pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRequest {
    pub span: TimeSpan,
    pub resolution: TimeNs,
}

/// What a controller did with one completion.
#[derive(Debug, Default)]
pub struct CompletionOutcome {
    /// Follow-up queries submitted while handling the completion (e.g.
    /// the window query issued once the duration probe returns).
    pub issued: Vec<QueryId>,
    /// Freshly built data, replacing whatever was published before.
    pub published: Option<TrackData>,
    /// The query failed; the owning engine should be flagged.
    pub failed: Option<String>,
}

/// Produces a track's columnar data for a given viewport.
///
/// One controller instance services one track for the track's lifetime,
/// so per-track caches (like the slice duration probe) are naturally
/// track-scoped and cannot leak across tracks. Controllers never touch
/// renderer state; data travels only through the published `TrackData`.
pub trait TrackController {
    /// Issue the queries for a new `(window, resolution)`. May submit
    /// nothing when an earlier prerequisite query is still in flight —
    /// the request is remembered and serviced when that query lands.
    fn request_data(&mut self, engine: &mut dyn Engine, req: DataRequest) -> Vec<QueryId>;

    /// Handle a completion routed to this controller. Completions for
    /// superseded requests are discarded here ("last request wins").
    fn handle_completion(
        &mut self,
        completion: &QueryCompletion,
        engine: &mut dyn Engine,
    ) -> CompletionOutcome;

    /// SQL to run when the track is removed, for dropping any
    /// backend-side scratch resources the controller created.
    fn cleanup_sql(&self) -> Option<String> {
        None
    }
}
