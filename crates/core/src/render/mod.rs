pub mod color;
pub mod counters;
pub mod slices;

use tracedeck_protocol::{Fill, Rect, RenderCommand, ThemeToken};

use crate::store::state::Selection;
use crate::timescale::TimeScale;
use crate::track::TrackData;

/// Vertical geometry of one track's canvas area. All render/hit-test
/// coordinates are track-local: y = 0 is the track's top edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackLayout {
    pub height: f64,
    /// Height of one depth row within a slice track.
    pub slice_height: f64,
}

impl TrackLayout {
    pub const DEFAULT_SLICE_HEIGHT: f64 = 18.0;

    pub fn slices(depth_count: u32) -> TrackLayout {
        TrackLayout {
            height: f64::from(depth_count.max(1)) * Self::DEFAULT_SLICE_HEIGHT,
            slice_height: Self::DEFAULT_SLICE_HEIGHT,
        }
    }

    pub fn counter() -> TrackLayout {
        TrackLayout {
            height: 45.0,
            slice_height: Self::DEFAULT_SLICE_HEIGHT,
        }
    }
}

/// Focus state a renderer needs to draw hover/selection/search
/// affordances. Renderers read this, never mutate it — reactions flow
/// back through dispatched actions.
#[derive(Debug, Clone, Copy, Default)]
pub struct Focus<'a> {
    pub selection: Option<&'a Selection>,
    pub highlighted_slice_id: Option<i64>,
    pub search: &'a str,
}

/// Everything a renderer consults besides the data itself.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub scale: &'a TimeScale,
    pub layout: TrackLayout,
    pub track_id: &'a str,
    pub focus: Focus<'a>,
}

/// Pure transform from published track data + viewport to draw calls,
/// and the inverse pixel → row mapping.
///
/// Renderers are stateless with respect to query timing: they see only
/// the data object the controller last published, which may lag the
/// viewport while a query is in flight.
pub trait TrackRenderer {
    fn render(&self, data: Option<&TrackData>, ctx: &RenderContext<'_>) -> Vec<RenderCommand>;

    /// Invert the pixel mapping used by `render`. Returns the row index
    /// of the first row (in query response order) containing the point.
    fn hit_test(&self, data: &TrackData, ctx: &RenderContext<'_>, x: f64, y: f64)
    -> Option<usize>;
}

const CHECKER_CELL: f64 = 16.0;

/// Loading placeholder: a checkerboard over `[left, right)` pixels of a
/// track area. Drawn while no data covers that span — indefinitely, if
/// the query never completes.
pub fn checkerboard(left: f64, right: f64, height: f64) -> Vec<RenderCommand> {
    let mut commands = Vec::new();
    if right <= left || height <= 0.0 {
        return commands;
    }
    let first_col = (left / CHECKER_CELL).floor() as i64;
    let rows = (height / CHECKER_CELL).ceil() as i64;
    let mut col = first_col;
    loop {
        let x = col as f64 * CHECKER_CELL;
        if x >= right {
            break;
        }
        for row in 0..rows.max(1) {
            let token = if (col + row) % 2 == 0 {
                ThemeToken::CheckerboardLight
            } else {
                ThemeToken::CheckerboardDark
            };
            let y = row as f64 * CHECKER_CELL;
            commands.push(RenderCommand::DrawRect {
                rect: Rect::new(
                    x.max(left),
                    y,
                    (x + CHECKER_CELL).min(right) - x.max(left),
                    (y + CHECKER_CELL).min(height) - y,
                ),
                fill: Fill::Token(token),
                border: None,
                label: None,
                slice_id: None,
            });
        }
        col += 1;
    }
    commands
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkerboard_covers_span() {
        let cmds = checkerboard(0.0, 40.0, 16.0);
        assert!(!cmds.is_empty());
        let mut covered = 0.0;
        for cmd in &cmds {
            if let RenderCommand::DrawRect { rect, .. } = cmd {
                covered += rect.w;
                assert!(rect.x >= 0.0 && rect.right() <= 40.0 + 1e-9);
            }
        }
        assert!((covered - 40.0).abs() < 1e-9);
    }

    #[test]
    fn empty_span_draws_nothing() {
        assert!(checkerboard(10.0, 10.0, 16.0).is_empty());
        assert!(checkerboard(20.0, 10.0, 16.0).is_empty());
    }

    #[test]
    fn layout_height_scales_with_depth() {
        assert_eq!(TrackLayout::slices(1).height, 18.0);
        assert_eq!(TrackLayout::slices(3).height, 54.0);
        // Zero depths still get one row.
        assert_eq!(TrackLayout::slices(0).height, 18.0);
    }
}
