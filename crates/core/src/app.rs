use std::collections::{BTreeMap, HashMap};

use thiserror::Error;
use tracedeck_protocol::RenderCommand;

use crate::engine::{Engine, QueryId};
use crate::render::{Focus, RenderContext, TrackLayout, TrackRenderer};
use crate::scheduler::{RedrawLevel, RedrawScheduler};
use crate::store::actions::{Action, ActionError};
use crate::store::state::State;
use crate::store::store::{Dispatcher, Store};
use crate::time::TimeSpan;
use crate::timescale::TimeScale;
use crate::track::registry::{KindRegistry, RegistryError};
use crate::track::{DataRequest, TrackController, TrackData};

/// Ceiling on run-to-quiescence passes per pump. Exceeding it means two
/// components are perpetually re-triggering each other — a programming
/// error, not a recoverable condition.
pub const MAX_PUMP_PASSES: usize = 100;

#[derive(Debug, Error)]
pub enum PumpError {
    #[error("frame pump did not quiesce within {} passes", MAX_PUMP_PASSES)]
    Livelock,
    #[error(transparent)]
    Action(#[from] ActionError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Live per-track machinery: the controller that fetches, the renderer
/// that draws, and the last published data bridging the two.
struct TrackRuntime {
    controller: Box<dyn TrackController>,
    renderer: Box<dyn TrackRenderer>,
    data: Option<TrackData>,
    requested: Option<DataRequest>,
}

/// One track's layout and draw calls for the current frame.
pub struct TrackView {
    pub track_id: String,
    pub name: String,
    pub layout: TrackLayout,
    pub commands: Vec<RenderCommand>,
}

/// The explicit application context: store, engine, registry, viewport,
/// and scheduler threaded through one object instead of ambient
/// globals. Each embedding owns its own instance.
pub struct AppContext {
    store: Store,
    dispatcher: Dispatcher,
    registry: KindRegistry,
    engine: Box<dyn Engine>,
    scheduler: RedrawScheduler,
    trace_span: TimeSpan,
    visible: TimeSpan,
    canvas_width: f64,
    runtimes: BTreeMap<String, TrackRuntime>,
    /// Which track each in-flight query belongs to. Completions with no
    /// route (cleanup queries, removed tracks) are dropped on the floor.
    routes: HashMap<QueryId, String>,
}

impl AppContext {
    pub fn new(engine: Box<dyn Engine>, registry: KindRegistry, trace_span: TimeSpan) -> Self {
        AppContext {
            store: Store::new(State::default()),
            dispatcher: Dispatcher::new(),
            registry,
            engine,
            scheduler: RedrawScheduler::new(),
            trace_span,
            visible: trace_span,
            canvas_width: 1_000.0,
            runtimes: BTreeMap::new(),
            routes: HashMap::new(),
        }
    }

    pub fn state(&self) -> &State {
        self.store.state()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn trace_span(&self) -> TimeSpan {
        self.trace_span
    }

    pub fn visible_window(&self) -> TimeSpan {
        self.visible
    }

    pub fn time_scale(&self) -> TimeScale {
        TimeScale::new(self.visible, self.canvas_width)
    }

    pub fn pending_queries(&self) -> usize {
        self.engine.pending()
    }

    pub fn scheduler_mut(&mut self) -> &mut RedrawScheduler {
        &mut self.scheduler
    }

    /// Queue an action; it applies on the next pump, in order with every
    /// other queued action.
    pub fn dispatch(&mut self, action: Action) {
        self.dispatcher.enqueue(action);
    }

    /// Move/zoom the visible window (clamped to the trace bounds).
    pub fn set_visible_window(&mut self, span: TimeSpan) {
        let start = span.start().clamp(self.trace_span.start(), self.trace_span.end());
        let end = span.end().clamp(self.trace_span.start(), self.trace_span.end());
        let Some(clamped) = TimeSpan::new(start, end) else {
            return;
        };
        if clamped != self.visible {
            self.visible = clamped;
            self.scheduler.request(RedrawLevel::Content);
        }
    }

    pub fn set_canvas_width(&mut self, width_px: f64) {
        if (width_px - self.canvas_width).abs() > f64::EPSILON {
            self.canvas_width = width_px;
            self.scheduler.request(RedrawLevel::Full);
        }
    }

    /// Consume the scheduled redraw for this frame, running the
    /// registered every-frame callbacks if a frame fires.
    pub fn begin_frame(&mut self) -> Option<RedrawLevel> {
        let level = self.scheduler.take();
        if level.is_some() {
            self.scheduler.run_callbacks();
        }
        level
    }

    /// Run pending work until quiescence: flush queued actions,
    /// reconcile controllers with the track set, issue window queries,
    /// and route completed queries back to their controllers.
    pub fn pump(&mut self) -> Result<(), PumpError> {
        for _ in 0..MAX_PUMP_PASSES {
            let mut progressed = false;

            if !self.dispatcher.is_empty() {
                if let Some(level) = self.dispatcher.flush(&mut self.store)? {
                    self.scheduler.request(level);
                }
                progressed = true;
            }

            progressed |= self.sync_tracks()?;
            progressed |= self.refresh_requests();
            progressed |= self.drain_completions();

            if !progressed {
                return Ok(());
            }
        }
        Err(PumpError::Livelock)
    }

    /// Render every visible track against the current time scale.
    pub fn render_tracks(&self) -> Vec<TrackView> {
        let scale = self.time_scale();
        let state = self.store.state();
        let mut views = Vec::new();
        for track in state.tracks.ordered() {
            let Some(runtime) = self.runtimes.get(&track.id) else {
                continue;
            };
            let layout = Self::layout_for(track.kind.as_str(), runtime.data.as_ref());
            let focus = Focus {
                selection: state.selection.current.as_ref(),
                highlighted_slice_id: state.selection.highlighted_slice_id,
                search: &state.search.query,
            };
            let ctx = RenderContext {
                scale: &scale,
                layout,
                track_id: &track.id,
                focus,
            };
            views.push(TrackView {
                track_id: track.id.clone(),
                name: track.name.clone(),
                layout,
                commands: runtime.renderer.render(runtime.data.as_ref(), &ctx),
            });
        }
        views
    }

    /// Track-local pixel → row index, using the same mapping the
    /// renderer drew with.
    pub fn hit_test(&self, track_id: &str, x: f64, y: f64) -> Option<usize> {
        let runtime = self.runtimes.get(track_id)?;
        let data = runtime.data.as_ref()?;
        let scale = self.time_scale();
        let state = self.store.state();
        let track = state.tracks.entries.get(track_id)?;
        let ctx = RenderContext {
            scale: &scale,
            layout: Self::layout_for(track.kind.as_str(), Some(data)),
            track_id,
            focus: Focus::default(),
        };
        runtime.renderer.hit_test(data, &ctx, x, y)
    }

    /// The last published data for a track, if any.
    pub fn track_data(&self, track_id: &str) -> Option<&TrackData> {
        self.runtimes.get(track_id)?.data.as_ref()
    }

    fn layout_for(kind: &str, data: Option<&TrackData>) -> TrackLayout {
        match data {
            Some(TrackData::Slices(d)) => TrackLayout::slices(d.max_depth + 1),
            Some(TrackData::Counter(_)) => TrackLayout::counter(),
            None if kind == "counter" => TrackLayout::counter(),
            None => TrackLayout::slices(1),
        }
    }

    fn sync_tracks(&mut self) -> Result<bool, PumpError> {
        let mut progressed = false;
        let tracks = self.store.state().tracks.clone();

        for track in tracks.entries.values() {
            if self.runtimes.contains_key(&track.id) {
                continue;
            }
            // Unknown kinds and malformed configs are fatal: the state
            // references a controller that cannot exist.
            let kind = self.registry.resolve(&track.kind)?;
            let controller = (kind.controller)(track)?;
            let renderer = (kind.renderer)();
            self.runtimes.insert(
                track.id.clone(),
                TrackRuntime {
                    controller,
                    renderer,
                    data: None,
                    requested: None,
                },
            );
            progressed = true;
        }

        let stale: Vec<String> = self
            .runtimes
            .keys()
            .filter(|id| !tracks.entries.contains_key(*id))
            .cloned()
            .collect();
        for id in stale {
            if let Some(runtime) = self.runtimes.remove(&id) {
                if let Some(sql) = runtime.controller.cleanup_sql() {
                    // Fire-and-forget: the completion arrives unrouted
                    // and is discarded.
                    self.engine.submit(sql);
                }
                self.routes.retain(|_, track| track != &id);
                progressed = true;
            }
        }
        Ok(progressed)
    }

    fn refresh_requests(&mut self) -> bool {
        let desired = DataRequest {
            span: self.visible,
            resolution: self.time_scale().resolution(),
        };
        let mut progressed = false;
        for (id, runtime) in &mut self.runtimes {
            if runtime.requested == Some(desired) {
                continue;
            }
            let issued = runtime.controller.request_data(self.engine.as_mut(), desired);
            runtime.requested = Some(desired);
            for qid in issued {
                self.routes.insert(qid, id.clone());
            }
            progressed = true;
        }
        progressed
    }

    fn drain_completions(&mut self) -> bool {
        let completions = self.engine.drain();
        if completions.is_empty() {
            return false;
        }
        for completion in completions {
            let Some(track_id) = self.routes.remove(&completion.id) else {
                continue;
            };
            let Some(runtime) = self.runtimes.get_mut(&track_id) else {
                continue;
            };
            let outcome = runtime
                .controller
                .handle_completion(&completion, self.engine.as_mut());
            for qid in outcome.issued {
                self.routes.insert(qid, track_id.clone());
            }
            if let Some(data) = outcome.published {
                runtime.data = Some(data);
                self.scheduler.request(RedrawLevel::Content);
            }
            if let Some(error) = outcome.failed {
                let engine_id = self
                    .store
                    .state()
                    .tracks
                    .entries
                    .get(&track_id)
                    .map(|t| t.engine_id.clone())
                    .unwrap_or_default();
                self.dispatcher.enqueue(Action::SetEngineFailed { engine_id, error });
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{QueryCompletion, QueryResult};
    use crate::store::state::Track;
    use crate::testing::ScriptedEngine;
    use crate::time::TimeNs;
    use crate::track::CompletionOutcome;
    use crate::track::registry::TrackKindImpl;

    fn trace() -> TimeSpan {
        TimeSpan::from_nanos(0, 1_000_000).expect("span")
    }

    fn add_track(ctx: &mut AppContext, id: &str, kind: &str) {
        ctx.dispatch(Action::AddTrack {
            id: Some(id.to_string()),
            engine_id: "e0".into(),
            kind: kind.into(),
            name: id.to_string(),
            config: serde_json::json!({"sourceId": 1}),
            track_sort_key: 0,
            track_group: None,
        });
    }

    #[test]
    fn unknown_kind_is_fatal() {
        let mut ctx = AppContext::new(
            Box::new(ScriptedEngine::new()),
            KindRegistry::with_builtins(),
            trace(),
        );
        add_track(&mut ctx, "t1", "gpu-frequency");
        assert!(matches!(
            ctx.pump(),
            Err(PumpError::Registry(RegistryError::UnknownKind(_)))
        ));
    }

    #[test]
    fn invariant_violation_is_fatal_but_preserves_state() {
        let mut ctx = AppContext::new(
            Box::new(ScriptedEngine::new()),
            KindRegistry::with_builtins(),
            trace(),
        );
        ctx.dispatch(Action::MarkArea {
            start: TimeNs(10),
            end: TimeNs(1),
            tracks: vec![],
            persistent: false,
        });
        assert!(matches!(ctx.pump(), Err(PumpError::Action(_))));
        assert!(ctx.state().annotations.areas.is_empty());
    }

    // A controller that re-queries on every completion; paired with an
    // auto-resolving engine this can never quiesce.
    struct EchoController;

    impl TrackController for EchoController {
        fn request_data(&mut self, engine: &mut dyn Engine, _req: DataRequest) -> Vec<QueryId> {
            vec![engine.submit("select 1".into())]
        }

        fn handle_completion(
            &mut self,
            _completion: &QueryCompletion,
            engine: &mut dyn Engine,
        ) -> CompletionOutcome {
            CompletionOutcome {
                issued: vec![engine.submit("select 1".into())],
                ..CompletionOutcome::default()
            }
        }
    }

    fn echo_controller(_track: &Track) -> Result<Box<dyn TrackController>, RegistryError> {
        Ok(Box::new(EchoController))
    }

    #[test]
    fn livelock_guard_trips() {
        let mut registry = KindRegistry::with_builtins();
        registry
            .register(
                "echo",
                TrackKindImpl {
                    controller: echo_controller,
                    renderer: || Box::new(crate::render::slices::SliceRenderer),
                },
                false,
            )
            .expect("register");
        let engine = ScriptedEngine::auto(|_| Ok(QueryResult::default()));
        let mut ctx = AppContext::new(Box::new(engine), registry, trace());
        add_track(&mut ctx, "t1", "echo");
        assert!(matches!(ctx.pump(), Err(PumpError::Livelock)));
    }

    struct ScratchController;

    impl TrackController for ScratchController {
        fn request_data(&mut self, _engine: &mut dyn Engine, _req: DataRequest) -> Vec<QueryId> {
            Vec::new()
        }

        fn handle_completion(
            &mut self,
            _completion: &QueryCompletion,
            _engine: &mut dyn Engine,
        ) -> CompletionOutcome {
            CompletionOutcome::default()
        }

        fn cleanup_sql(&self) -> Option<String> {
            Some("drop table if exists scratch_t1".into())
        }
    }

    fn scratch_controller(_track: &Track) -> Result<Box<dyn TrackController>, RegistryError> {
        Ok(Box::new(ScratchController))
    }

    #[test]
    fn removed_track_cleanup_is_submitted() {
        let mut registry = KindRegistry::with_builtins();
        registry
            .register(
                "scratch",
                TrackKindImpl {
                    controller: scratch_controller,
                    renderer: || Box::new(crate::render::slices::SliceRenderer),
                },
                false,
            )
            .expect("register");
        let mut ctx = AppContext::new(Box::new(ScriptedEngine::new()), registry, trace());
        add_track(&mut ctx, "t1", "scratch");
        ctx.pump().expect("pump");
        ctx.dispatch(Action::RemoveTrack { id: "t1".into() });
        ctx.pump().expect("pump");
        // The cleanup query reached the engine even though the track is
        // gone from state.
        assert!(ctx.pending_queries() > 0);
    }

    #[test]
    fn window_change_requests_content_redraw() {
        let mut ctx = AppContext::new(
            Box::new(ScriptedEngine::new()),
            KindRegistry::with_builtins(),
            trace(),
        );
        assert_eq!(ctx.begin_frame(), None);
        ctx.set_visible_window(TimeSpan::from_nanos(100, 500).expect("span"));
        assert_eq!(ctx.begin_frame(), Some(RedrawLevel::Content));
        // Same window again: deduplicated, no second frame.
        ctx.set_visible_window(TimeSpan::from_nanos(100, 500).expect("span"));
        assert_eq!(ctx.begin_frame(), None);
    }
}
