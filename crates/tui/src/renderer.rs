use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Style},
    widgets::Block,
};
use tracedeck_core::app::AppContext;
use tracedeck_core::render::TrackLayout;
use tracedeck_protocol::{Fill, MarkerKind, RenderCommand, ThemeToken};

/// Where one track landed on screen, for routing mouse events back to
/// track-local pixel coordinates.
#[derive(Debug, Clone)]
pub struct TrackSlot {
    pub track_id: String,
    /// First content row (below the track header).
    pub content_top: u16,
    pub content_rows: u16,
}

const SPINNER: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧'];

fn theme_to_color(token: ThemeToken) -> Color {
    match token {
        ThemeToken::TrackBackground => Color::Black,
        ThemeToken::TrackBorder => Color::DarkGray,
        ThemeToken::TrackHeaderBackground => Color::DarkGray,
        ThemeToken::TrackHeaderText => Color::White,
        ThemeToken::TextPrimary => Color::White,
        ThemeToken::TextSecondary => Color::Gray,
        ThemeToken::TextMuted => Color::DarkGray,
        ThemeToken::SelectionOutline => Color::Green,
        ThemeToken::HoverHighlight => Color::LightYellow,
        ThemeToken::SearchHighlight => Color::LightYellow,
        ThemeToken::Background => Color::Black,
        ThemeToken::Surface => Color::Black,
        ThemeToken::Border => Color::DarkGray,
        ThemeToken::CheckerboardLight => Color::Rgb(40, 40, 40),
        ThemeToken::CheckerboardDark => Color::Rgb(24, 24, 24),
        ThemeToken::InstantMarker => Color::LightCyan,
        ThemeToken::IncompleteHatch => Color::LightRed,
        ThemeToken::CounterFill => Color::Rgb(60, 120, 200),
        ThemeToken::CounterLine => Color::Rgb(80, 160, 240),
        ThemeToken::CounterText => Color::Cyan,
        ThemeToken::NoteMarker => Color::LightMagenta,
        ThemeToken::AreaShade => Color::Rgb(50, 50, 70),
        ThemeToken::AxisBackground => Color::DarkGray,
        ThemeToken::AxisTick => Color::Gray,
        ThemeToken::AxisLabel => Color::White,
    }
}

fn fill_to_color(fill: Fill) -> Option<Color> {
    match fill {
        Fill::Token(token) => Some(theme_to_color(token)),
        Fill::Solid(c) => {
            // Alpha-weighted toward black: dimmed fills read as faded.
            let scale = 255.0 * f64::from(c.a);
            Some(Color::Rgb(
                (f64::from(c.r) * scale) as u8,
                (f64::from(c.g) * scale) as u8,
                (f64::from(c.b) * scale) as u8,
            ))
        }
        Fill::None => None,
    }
}

/// Draw one frame: header, stacked tracks, status bar. Returns the
/// track slots for mouse routing.
pub fn draw_frame(frame: &mut Frame, ctx: &AppContext, spinner_tick: usize) -> Vec<TrackSlot> {
    let area = frame.area();
    let mut slots = Vec::new();
    if area.height < 3 {
        return slots;
    }

    // Header
    let window = ctx.visible_window();
    let header = Block::default()
        .title(format!(
            " tracedeck — {} to {} | ←→ pan | +/- zoom | m mark | / search | q quit ",
            window.start(),
            window.end(),
        ))
        .style(Style::default().fg(Color::White).bg(Color::DarkGray));
    frame.render_widget(header, Rect::new(0, 0, area.width, 1));

    let content_bottom = area.height - 1;
    let mut y: u16 = 1;

    for view in ctx.render_tracks() {
        if y >= content_bottom {
            break;
        }
        // Track header row
        let header_style = Style::default()
            .fg(theme_to_color(ThemeToken::TrackHeaderText))
            .bg(theme_to_color(ThemeToken::TrackHeaderBackground));
        let title = Block::default().title(format!(" {} ", view.name)).style(header_style);
        frame.render_widget(title, Rect::new(0, y, area.width, 1));
        y += 1;

        let rows = (view.layout.height / TrackLayout::DEFAULT_SLICE_HEIGHT).ceil() as u16;
        let rows = rows.max(1).min(content_bottom.saturating_sub(y));
        let content = Rect::new(0, y, area.width, rows);
        draw_commands(frame, &view.commands, content, view.layout);
        slots.push(TrackSlot {
            track_id: view.track_id,
            content_top: y,
            content_rows: rows,
        });
        y += rows;
    }

    draw_status(frame, ctx, spinner_tick, Rect::new(0, content_bottom, area.width, 1));
    slots
}

/// Map render commands onto terminal cells: x pixels are columns (the
/// canvas width is set to the terminal width), y pixels collapse one
/// depth row to one cell row.
fn draw_commands(frame: &mut Frame, commands: &[RenderCommand], area: Rect, layout: TrackLayout) {
    let buf = frame.buffer_mut();
    for cmd in commands {
        match cmd {
            RenderCommand::DrawRect {
                rect,
                fill,
                border,
                label,
                ..
            } => {
                let row = (rect.y / layout.slice_height) as u16;
                if row >= area.height {
                    continue;
                }
                let col = rect.x.max(0.0) as u16;
                let width = (rect.w.ceil() as u16).max(1);
                let Some(bg) = fill_to_color(*fill) else {
                    // Outline-only rect: mark the edges.
                    let color = border.map_or(Color::White, theme_to_color);
                    mark_outline(buf, area, row, col, width, color);
                    continue;
                };
                let fg = border.map_or(Color::White, theme_to_color);
                let label_str = label.as_ref().map_or("", |l| l.as_str());
                let display: String = if (width as usize) >= label_str.len() + 2 && !label_str.is_empty()
                {
                    format!(" {label_str:<w$}", w = (width as usize).saturating_sub(2))
                } else {
                    " ".repeat(width as usize)
                };
                let clamped = width.min(area.width.saturating_sub(col));
                for (i, ch) in display.chars().take(clamped as usize).enumerate() {
                    let x = area.x + col + i as u16;
                    let cell_y = area.y + row;
                    if x < area.x + area.width && cell_y < area.y + area.height {
                        buf[(x, cell_y)].set_char(ch).set_fg(fg).set_bg(bg);
                    }
                }
            }

            RenderCommand::DrawMarker {
                center, kind, fill, ..
            } => {
                let row = (center.y / layout.slice_height) as u16;
                let col = center.x.max(0.0) as u16;
                if row >= area.height || col >= area.width {
                    continue;
                }
                let glyph = match kind {
                    MarkerKind::Chevron => '▼',
                    MarkerKind::Diamond => '◆',
                };
                let color = fill_to_color(*fill).unwrap_or(Color::White);
                buf[(area.x + col, area.y + row)]
                    .set_char(glyph)
                    .set_fg(color);
            }

            RenderCommand::DrawText {
                position,
                text,
                color,
                ..
            } => {
                let row = (position.y / layout.slice_height) as u16;
                let col = position.x.max(0.0) as u16;
                if row >= area.height {
                    continue;
                }
                let fg = theme_to_color(*color);
                for (i, ch) in text.chars().enumerate() {
                    let x = area.x + col + i as u16;
                    if x < area.x + area.width {
                        buf[(x, area.y + row)].set_char(ch).set_fg(fg);
                    }
                }
            }

            // Lines, clips, and groups have no sensible cell mapping.
            _ => {}
        }
    }
}

fn mark_outline(
    buf: &mut ratatui::buffer::Buffer,
    area: Rect,
    row: u16,
    col: u16,
    width: u16,
    color: Color,
) {
    if row >= area.height {
        return;
    }
    let last = col.saturating_add(width.saturating_sub(1));
    for x in [col, last] {
        if x < area.width {
            buf[(area.x + x, area.y + row)].set_fg(color).set_char('┃');
        }
    }
}

fn draw_status(frame: &mut Frame, ctx: &AppContext, spinner_tick: usize, area: Rect) {
    let state = ctx.state();
    let pending = ctx.pending_queries();
    let spinner = if pending > 0 {
        SPINNER[spinner_tick % SPINNER.len()]
    } else {
        ' '
    };
    let failed: Vec<&str> = state
        .engines
        .entries
        .values()
        .filter_map(|s| s.failed.as_deref())
        .collect();
    let mut status = format!(
        " {spinner} {} tracks | {} queries pending | window {} — {}",
        state.tracks.entries.len(),
        pending,
        ctx.visible_window().start(),
        ctx.visible_window().end(),
    );
    if !state.search.query.is_empty() {
        status.push_str(&format!(" | search: {}", state.search.query));
    }
    if let Some(err) = failed.first() {
        status.push_str(&format!(" | engine error: {err}"));
    }
    let style = if failed.is_empty() {
        Style::default().fg(Color::White).bg(Color::DarkGray)
    } else {
        Style::default().fg(Color::White).bg(Color::Red)
    };
    frame.render_widget(Block::default().title(status).style(style), area);
}
