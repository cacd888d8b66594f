//! Track windowing and rendering core for tracedeck.
//!
//! The pipeline, left to right:
//!
//! ```text
//!   Viewport ──▶ TrackController ──▶ TrackData ──▶ TrackRenderer ──▶ RenderCommand[]
//!   (pan/zoom)   (SQL + quantize)    (columnar)    (draw + hit-test)   (any canvas)
//! ```
//!
//! All shared state lives in an immutable, versioned [`store::Store`]
//! mutated only through serializable [`store::Action`]s; the
//! [`scheduler::RedrawScheduler`] coalesces change signals into one
//! repaint per frame; [`app::AppContext`] threads the pieces together
//! explicitly, one instance per embedding.

pub mod app;
pub mod engine;
pub mod render;
pub mod scheduler;
pub mod store;
pub mod testing;
pub mod time;
pub mod timescale;
pub mod track;

pub use app::{AppContext, PumpError, TrackView};
pub use engine::{Engine, QueryCompletion, QueryError, QueryId, QueryResult, SqlValue};
pub use scheduler::{RedrawLevel, RedrawScheduler};
pub use store::{Action, ActionError, Selection, State, Store};
pub use time::{TimeNs, TimeSpan};
pub use timescale::TimeScale;
pub use track::{DataRequest, KindRegistry, TrackController, TrackData};
