mod engine;
mod renderer;
mod trace;

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
        MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::{Backend, CrosstermBackend},
};
use tracedeck_core::app::AppContext;
use tracedeck_core::render::TrackLayout;
use tracedeck_core::scheduler::RedrawLevel;
use tracedeck_core::store::Action;
use tracedeck_core::time::{TimeNs, TimeSpan};
use tracedeck_core::track::{KindRegistry, TrackData};

use crate::renderer::TrackSlot;
use crate::trace::{TraceFile, TraceTrack};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: tracedeck <trace.json>");
        std::process::exit(1);
    }

    let path = PathBuf::from(&args[1]);
    let data = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
    let trace: TraceFile =
        serde_json::from_slice(&data).with_context(|| format!("parsing {}", path.display()))?;

    let trace_span = trace.span();
    let engine = engine::MemoryEngine::from_trace(&trace);
    let mut ctx = AppContext::new(
        Box::new(engine),
        KindRegistry::with_builtins(),
        trace_span,
    );

    // One UI track per lane, table ids matching MemoryEngine's order.
    let mut next_slice_table: i64 = 0;
    let mut next_counter_table: i64 = 0;
    for (index, lane) in trace.tracks.iter().enumerate() {
        let source_id = match lane {
            TraceTrack::Slice { .. } => {
                next_slice_table += 1;
                next_slice_table - 1
            }
            TraceTrack::Counter { .. } => {
                next_counter_table += 1;
                next_counter_table - 1
            }
        };
        ctx.dispatch(Action::AddTrack {
            id: None,
            engine_id: "trace".into(),
            kind: lane.kind().into(),
            name: lane.name().to_string(),
            config: serde_json::json!({ "sourceId": source_id }),
            track_sort_key: index as i64 * 10,
            track_group: None,
        });
    }

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut ctx, &mut terminal);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn event_loop<B: Backend>(ctx: &mut AppContext, terminal: &mut Terminal<B>) -> Result<()> {
    // Loading spinner rides the frame pump instead of owning a timer.
    let spinner = Rc::new(Cell::new(0usize));
    {
        let tick = spinner.clone();
        ctx.scheduler_mut()
            .add_callback(Box::new(move || tick.set(tick.get() + 1)));
    }
    ctx.scheduler_mut().request(RedrawLevel::Full);

    let mut slots: Vec<TrackSlot> = Vec::new();
    let mut search_mode = false;

    loop {
        let size = terminal.size()?;
        ctx.set_canvas_width(f64::from(size.width));

        ctx.pump()?;
        if ctx.pending_queries() > 0 {
            // Keep frames coming while the checkerboard/spinner animate.
            ctx.scheduler_mut().request(RedrawLevel::Content);
        }
        if ctx.begin_frame().is_some() {
            terminal.draw(|frame| {
                slots = renderer::draw_frame(frame, ctx, spinner.get());
            })?;
        }

        if !event::poll(Duration::from_millis(33))? {
            continue;
        }
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if search_mode {
                    search_mode = handle_search_key(ctx, key.code);
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    KeyCode::Left => pan(ctx, -0.1),
                    KeyCode::Right => pan(ctx, 0.1),
                    KeyCode::Char('+') | KeyCode::Char('=') => zoom(ctx, 0.5),
                    KeyCode::Char('-') => zoom(ctx, 2.0),
                    KeyCode::Char('0') => ctx.set_visible_window(ctx.trace_span()),
                    KeyCode::Char('m') => mark_visible_area(ctx),
                    KeyCode::Char('n') => {
                        ctx.dispatch(Action::ToggleMarkCurrentArea { persistent: true });
                    }
                    KeyCode::Char('u') => ctx.dispatch(Action::Deselect),
                    KeyCode::Char('/') => search_mode = true,
                    _ => {}
                }
            }
            Event::Mouse(mouse) => handle_mouse(ctx, &slots, mouse),
            Event::Resize(width, _) => ctx.set_canvas_width(f64::from(width)),
            _ => {}
        }
    }
    Ok(())
}

/// Returns whether search mode stays active.
fn handle_search_key(ctx: &mut AppContext, code: KeyCode) -> bool {
    let mut query = ctx.state().search.query.clone();
    match code {
        KeyCode::Esc | KeyCode::Enter => return false,
        KeyCode::Backspace => {
            query.pop();
        }
        KeyCode::Char(c) => query.push(c),
        _ => return true,
    }
    ctx.dispatch(Action::SetSearchQuery { query });
    true
}

fn pan(ctx: &mut AppContext, fraction: f64) {
    let window = ctx.visible_window();
    let trace = ctx.trace_span();
    let step = (window.duration().nanos() as f64 * fraction) as i64;
    let step = step.clamp(
        (trace.start() - window.start()).nanos(),
        (trace.end() - window.end()).nanos(),
    );
    if let Some(moved) = TimeSpan::new(window.start() + TimeNs(step), window.end() + TimeNs(step))
    {
        ctx.set_visible_window(moved);
    }
}

fn zoom(ctx: &mut AppContext, factor: f64) {
    let window = ctx.visible_window();
    let trace = ctx.trace_span();
    let duration = window.duration().nanos().max(1);
    let new_duration = ((duration as f64 * factor) as i64)
        .clamp(1, trace.duration().nanos().max(1));
    let center = window.start().nanos() + duration / 2;
    let start = center - new_duration / 2;
    if let Some(zoomed) = TimeSpan::from_nanos(start, start + new_duration) {
        ctx.set_visible_window(zoomed);
    }
}

fn mark_visible_area(ctx: &mut AppContext) {
    let window = ctx.visible_window();
    let tracks: Vec<String> = ctx.state().tracks.order.clone();
    ctx.dispatch(Action::MarkArea {
        start: window.start(),
        end: window.end(),
        tracks,
        persistent: false,
    });
}

fn handle_mouse(ctx: &mut AppContext, slots: &[TrackSlot], mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => zoom(ctx, 0.8),
        MouseEventKind::ScrollDown => zoom(ctx, 1.25),
        MouseEventKind::Moved => {
            let hit = hit_at(ctx, slots, mouse.column, mouse.row);
            let id = hit.and_then(|(track_id, row)| slice_id_at(ctx, &track_id, row));
            if ctx.state().selection.highlighted_slice_id != id {
                ctx.dispatch(Action::SetHighlightedSliceId { id });
            }
        }
        MouseEventKind::Down(MouseButton::Left) => {
            let Some((track_id, row)) = hit_at(ctx, slots, mouse.column, mouse.row) else {
                ctx.dispatch(Action::Deselect);
                return;
            };
            match ctx.track_data(&track_id) {
                Some(TrackData::Slices(data)) => {
                    let action = Action::SelectSlice {
                        id: data.slice_ids[row],
                        track_id,
                        scroll: false,
                    };
                    ctx.dispatch(action);
                }
                Some(TrackData::Counter(data)) => {
                    let action = Action::SelectCounter {
                        id: data.sample_ids[row],
                        track_id,
                    };
                    ctx.dispatch(action);
                }
                None => {}
            }
        }
        _ => {}
    }
}

/// Map a terminal cell to `(track, row index)` via the renderer's slots
/// and the core's hit-testing.
fn hit_at(
    ctx: &AppContext,
    slots: &[TrackSlot],
    column: u16,
    row: u16,
) -> Option<(String, usize)> {
    let slot = slots
        .iter()
        .find(|s| row >= s.content_top && row < s.content_top + s.content_rows)?;
    // One cell row is one depth row; aim at its vertical center.
    let local_y = f64::from(row - slot.content_top) * TrackLayout::DEFAULT_SLICE_HEIGHT
        + TrackLayout::DEFAULT_SLICE_HEIGHT / 2.0;
    let hit = ctx.hit_test(&slot.track_id, f64::from(column), local_y)?;
    Some((slot.track_id.clone(), hit))
}

fn slice_id_at(ctx: &AppContext, track_id: &str, row: usize) -> Option<i64> {
    match ctx.track_data(track_id) {
        Some(TrackData::Slices(data)) => data.slice_ids.get(row).copied(),
        _ => None,
    }
}
