//! End-to-end pipeline tests: actions build tracks, viewport changes
//! emit queries, completions arrive in adversarial orders, and the
//! rendered output always reflects the latest request.

use tracedeck_core::app::AppContext;
use tracedeck_core::scheduler::RedrawLevel;
use tracedeck_core::store::Action;
use tracedeck_core::testing::{
    ScriptedEngine, counter_window_result, max_dur_result, slice_window_result,
};
use tracedeck_core::time::{TimeNs, TimeSpan};
use tracedeck_core::track::{KindRegistry, TrackData};
use tracedeck_protocol::{Fill, RenderCommand, ThemeToken};

fn trace() -> TimeSpan {
    TimeSpan::from_nanos(0, 1_000_000).expect("span")
}

fn context(engine: &ScriptedEngine) -> AppContext {
    AppContext::new(
        Box::new(engine.clone()),
        KindRegistry::with_builtins(),
        trace(),
    )
}

fn add_slice_track(ctx: &mut AppContext, id: &str, source_id: i64) {
    ctx.dispatch(Action::AddTrack {
        id: Some(id.to_string()),
        engine_id: "e0".into(),
        kind: "slice".into(),
        name: format!("{id} slices"),
        config: serde_json::json!({ "sourceId": source_id }),
        track_sort_key: 0,
        track_group: None,
    });
}

fn add_counter_track(ctx: &mut AppContext, id: &str, source_id: i64) {
    ctx.dispatch(Action::AddTrack {
        id: Some(id.to_string()),
        engine_id: "e0".into(),
        kind: "counter".into(),
        name: format!("{id} counter"),
        config: serde_json::json!({ "sourceId": source_id }),
        track_sort_key: 10,
        track_group: None,
    });
}

/// Resolve the slice probe, then return the id of the in-flight window
/// query it unblocked.
fn resolve_probe(ctx: &mut AppContext, engine: &ScriptedEngine, max_dur: i64) -> u64 {
    let probe = engine
        .submissions()
        .iter()
        .find(|(_, sql)| sql.contains("maxDur"))
        .map(|(id, _)| *id)
        .expect("probe query");
    engine.resolve(probe, max_dur_result(max_dur));
    ctx.pump().expect("pump");
    engine
        .submissions()
        .iter()
        .rev()
        .find(|(_, sql)| sql.contains("group by tsq, depth"))
        .map(|(id, _)| *id)
        .expect("window query")
}

#[test]
fn actions_to_pixels() {
    let engine = ScriptedEngine::new();
    let mut ctx = context(&engine);
    add_slice_track(&mut ctx, "t1", 7);
    add_counter_track(&mut ctx, "c1", 3);
    ctx.pump().expect("pump");

    // One probe for the slice track, one window query for the counter.
    assert_eq!(engine.submissions().len(), 2);
    assert_eq!(ctx.pending_queries(), 2);

    let counter_query = engine
        .submissions()
        .iter()
        .find(|(_, sql)| sql.contains("from counter"))
        .map(|(id, _)| *id)
        .expect("counter query");
    engine.resolve(
        counter_query,
        counter_window_result(&[(0, 1.0, 5.0, 2.0, 10), (512_000, 2.0, 8.0, 3.0, 11)]),
    );

    let window_query = resolve_probe(&mut ctx, &engine, 60_000);
    engine.resolve(
        window_query,
        slice_window_result(1024, &[(10_240, 51_200, 0, "render", 1)]),
    );
    ctx.pump().expect("pump");
    assert_eq!(ctx.pending_queries(), 0);

    // Data arrival scheduled a content repaint.
    assert_eq!(ctx.begin_frame(), Some(RedrawLevel::Full));

    let views = ctx.render_tracks();
    assert_eq!(views.len(), 2);
    // Display order follows sort keys: slices before the counter.
    assert_eq!(views[0].track_id, "t1");
    assert_eq!(views[1].track_id, "c1");

    let slice_rects: Vec<_> = views[0]
        .commands
        .iter()
        .filter_map(|c| match c {
            RenderCommand::DrawRect {
                rect,
                slice_id: Some(id),
                ..
            } => Some((*id, *rect)),
            _ => None,
        })
        .collect();
    assert_eq!(slice_rects.len(), 1);
    let (id, rect) = slice_rects[0];
    assert_eq!(id, 1);
    // 1000px over 1ms: 1px per µs.
    assert!((rect.x - 10.24).abs() < 0.01, "x = {}", rect.x);
    assert!((rect.w - 51.2).abs() < 0.01, "w = {}", rect.w);

    let counter_fills = views[1]
        .commands
        .iter()
        .filter(|c| {
            matches!(
                c,
                RenderCommand::DrawRect {
                    fill: Fill::Token(ThemeToken::CounterFill),
                    ..
                }
            )
        })
        .count();
    assert_eq!(counter_fills, 2);
}

#[test]
fn stale_window_response_is_never_rendered() {
    let engine = ScriptedEngine::new();
    let mut ctx = context(&engine);
    add_slice_track(&mut ctx, "t1", 7);
    ctx.pump().expect("pump");
    let query_a = resolve_probe(&mut ctx, &engine, 0);

    // Zoom in before A's result arrives.
    ctx.set_visible_window(TimeSpan::from_nanos(0, 500_000).expect("span"));
    ctx.pump().expect("pump");
    let query_b = engine
        .submissions()
        .last()
        .map(|(id, _)| *id)
        .expect("second window query");
    assert_ne!(query_a, query_b);

    // A resolves first, then B.
    engine.resolve(
        query_a,
        slice_window_result(1024, &[(2_048, 1_024, 0, "stale", 1)]),
    );
    engine.resolve(
        query_b,
        slice_window_result(512, &[(4_096, 512, 0, "fresh", 2)]),
    );
    ctx.pump().expect("pump");

    let Some(TrackData::Slices(data)) = ctx.track_data("t1") else {
        panic!("expected published slice data");
    };
    assert_eq!(data.len(), 1);
    assert_eq!(data.title(0), "fresh");
    assert_eq!(data.resolution, TimeNs(512));
}

#[test]
fn query_failure_flags_engine_and_keeps_loading_placeholder() {
    let engine = ScriptedEngine::new();
    let mut ctx = context(&engine);
    add_slice_track(&mut ctx, "t1", 7);
    ctx.pump().expect("pump");
    let window_query = resolve_probe(&mut ctx, &engine, 0);

    engine.fail(
        window_query,
        tracedeck_core::engine::QueryError::Execution("oom".into()),
    );
    ctx.pump().expect("pump");

    let status = ctx.state().engines.entries.get("e0").expect("engine status");
    assert!(status.failed.as_deref().is_some_and(|m| m.contains("oom")));

    // No data was published; the track renders its checkerboard.
    assert!(ctx.track_data("t1").is_none());
    let views = ctx.render_tracks();
    let checkered = views[0].commands.iter().any(|c| {
        matches!(
            c,
            RenderCommand::DrawRect {
                fill: Fill::Token(ThemeToken::CheckerboardLight | ThemeToken::CheckerboardDark),
                ..
            }
        )
    });
    assert!(checkered);
}

#[test]
fn hit_test_select_render_roundtrip() {
    let engine = ScriptedEngine::new();
    let mut ctx = context(&engine);
    add_slice_track(&mut ctx, "t1", 7);
    ctx.pump().expect("pump");
    let window_query = resolve_probe(&mut ctx, &engine, 0);
    engine.resolve(
        window_query,
        slice_window_result(1024, &[(10_240, 51_200, 0, "render", 42)]),
    );
    ctx.pump().expect("pump");

    // Click inside the rect: [10.24px, 61.44px) at depth 0.
    let row = ctx.hit_test("t1", 30.0, 5.0).expect("hit");
    let Some(TrackData::Slices(data)) = ctx.track_data("t1") else {
        panic!("expected slice data");
    };
    let slice_id = data.slice_ids[row];
    assert_eq!(slice_id, 42);
    // Outside: nothing.
    assert!(ctx.hit_test("t1", 500.0, 5.0).is_none());

    ctx.dispatch(Action::SelectSlice {
        id: slice_id,
        track_id: "t1".into(),
        scroll: false,
    });
    ctx.pump().expect("pump");

    let views = ctx.render_tracks();
    let outline_is_last_draw = matches!(
        views[0].commands.iter().rev().nth(1),
        Some(RenderCommand::DrawRect {
            fill: Fill::None,
            border: Some(ThemeToken::SelectionOutline),
            ..
        })
    );
    assert!(outline_is_last_draw, "selection outline must be drawn on top");
}

#[test]
fn replayed_log_reaches_identical_state() {
    let engine = ScriptedEngine::new();
    let mut ctx = context(&engine);
    add_slice_track(&mut ctx, "t1", 7);
    ctx.dispatch(Action::MarkArea {
        start: TimeNs(100),
        end: TimeNs(900),
        tracks: vec!["t1".into()],
        persistent: true,
    });
    ctx.dispatch(Action::ToggleMarkCurrentArea { persistent: true });
    ctx.pump().expect("pump");

    let replayed = tracedeck_core::store::replay(
        tracedeck_core::store::State::default(),
        ctx.store().log(),
    )
    .expect("replay");
    assert_eq!(&replayed, ctx.state());
}
