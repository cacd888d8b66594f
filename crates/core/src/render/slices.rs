use tracedeck_protocol::{Fill, MarkerKind, Point, Rect, RenderCommand, SharedStr, ThemeToken};

use crate::render::color;
use crate::render::{RenderContext, TrackRenderer, checkerboard};
use crate::store::state::Selection;
use crate::track::{SliceData, TrackData};

/// Half-width of the instant-event chevron, which is also the hit-test
/// slack around its center.
pub const MARKER_HALF_WIDTH: f64 = 4.0;

/// Minimum label width: narrower rects draw unlabeled.
const MIN_LABEL_WIDTH: f64 = 28.0;

/// Renderer for `"slice"` tracks.
pub struct SliceRenderer;

impl SliceRenderer {
    fn slice_fill(data: &SliceData, row: usize, ctx: &RenderContext<'_>) -> Fill {
        let title = data.title(row);
        let search = ctx.focus.search;
        if !search.is_empty()
            && !title.to_lowercase().contains(&search.to_lowercase())
        {
            return Fill::Solid(color::dimmed(title));
        }
        if ctx.focus.highlighted_slice_id == Some(data.slice_ids[row]) {
            return Fill::Solid(color::highlighted(title));
        }
        Fill::Solid(color::slice_color(title))
    }

    fn selected_slice_id(ctx: &RenderContext<'_>) -> Option<i64> {
        match ctx.focus.selection {
            Some(Selection::Slice { id, track_id }) if *track_id == ctx.track_id => Some(*id),
            _ => None,
        }
    }
}

impl TrackRenderer for SliceRenderer {
    fn render(&self, data: Option<&TrackData>, ctx: &RenderContext<'_>) -> Vec<RenderCommand> {
        let width = ctx.scale.width_px();
        let mut commands = vec![RenderCommand::BeginGroup {
            id: SharedStr::from(ctx.track_id),
            label: None,
        }];

        let Some(TrackData::Slices(data)) = data else {
            // Nothing published yet (or a kind mismatch): still loading.
            commands.extend(checkerboard(0.0, width, ctx.layout.height));
            commands.push(RenderCommand::EndGroup);
            return commands;
        };

        let window = ctx.scale.window();

        // Checkerboard any part of the window the data does not cover —
        // visible after a pan while the new query is in flight.
        if data.span.start() > window.start() {
            let right = ctx.scale.time_to_px(data.span.start()).min(width);
            commands.extend(checkerboard(0.0, right, ctx.layout.height));
        }
        if data.span.end() < window.end() {
            let left = ctx.scale.time_to_px(data.span.end()).max(0.0);
            commands.extend(checkerboard(left, width, ctx.layout.height));
        }

        let selected_id = Self::selected_slice_id(ctx);
        let mut selected_rect: Option<Rect> = None;

        for row in 0..data.len() {
            // Rows fully outside the window are skipped; the
            // checkerboard (or nothing) covers that space.
            if data.ends[row] < window.start() || data.starts[row] > window.end() {
                continue;
            }
            let depth_y = f64::from(data.depths[row]) * ctx.layout.slice_height;
            let fill = Self::slice_fill(data, row, ctx);

            if data.is_instant[row] {
                let center = ctx.scale.time_to_px(data.starts[row]);
                commands.push(RenderCommand::DrawMarker {
                    center: Point::new(center, depth_y + ctx.layout.slice_height / 2.0),
                    half_width: MARKER_HALF_WIDTH,
                    kind: MarkerKind::Chevron,
                    fill,
                    slice_id: Some(data.slice_ids[row]),
                });
                continue;
            }

            let left = ctx.scale.time_to_px(data.starts[row]).max(0.0);
            let right = ctx.scale.time_to_px(data.ends[row]).min(width);
            // Sub-pixel slices stay visible and clickable.
            let w = (right - left).max(1.0);
            let rect = Rect::new(left, depth_y, w, ctx.layout.slice_height - 1.0);

            let label = (w >= MIN_LABEL_WIDTH).then(|| SharedStr::from(data.title(row)));
            let border = data.is_incomplete[row].then_some(ThemeToken::IncompleteHatch);
            commands.push(RenderCommand::DrawRect {
                rect,
                fill,
                border,
                label,
                slice_id: Some(data.slice_ids[row]),
            });

            if selected_id == Some(data.slice_ids[row]) {
                selected_rect = Some(rect);
            }
        }

        // Second pass: the selection outline goes on top of everything
        // so neighboring rows cannot occlude it.
        if let Some(rect) = selected_rect {
            commands.push(RenderCommand::DrawRect {
                rect,
                fill: Fill::None,
                border: Some(ThemeToken::SelectionOutline),
                label: None,
                slice_id: None,
            });
        }

        commands.push(RenderCommand::EndGroup);
        commands
    }

    fn hit_test(
        &self,
        data: &TrackData,
        ctx: &RenderContext<'_>,
        x: f64,
        y: f64,
    ) -> Option<usize> {
        let TrackData::Slices(data) = data else {
            return None;
        };
        if y < 0.0 || y >= ctx.layout.height {
            return None;
        }
        let depth = (y / ctx.layout.slice_height).floor() as u32;
        // Rows keep response order; the first match wins.
        for row in 0..data.len() {
            if data.depths[row] != depth {
                continue;
            }
            if data.is_instant[row] {
                let center = ctx.scale.time_to_px(data.starts[row]);
                if (x - center).abs() <= MARKER_HALF_WIDTH {
                    return Some(row);
                }
                continue;
            }
            let left = ctx.scale.time_to_px(data.starts[row]);
            let right = ctx.scale.time_to_px(data.ends[row]).max(left + 1.0);
            if x >= left && x < right {
                return Some(row);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{Focus, TrackLayout};
    use crate::time::{TimeNs, TimeSpan};
    use crate::timescale::TimeScale;
    use crate::track::SliceDataBuilder;

    fn scale() -> TimeScale {
        // 1000ns window over 1000px: 1px per ns.
        TimeScale::new(TimeSpan::from_nanos(0, 1_000).expect("span"), 1000.0)
    }

    fn ctx<'a>(scale: &'a TimeScale, focus: Focus<'a>) -> RenderContext<'a> {
        RenderContext {
            scale,
            layout: TrackLayout {
                height: 36.0,
                slice_height: 18.0,
            },
            track_id: "t1",
            focus,
        }
    }

    fn data() -> TrackData {
        let mut b = SliceDataBuilder::new(
            TimeSpan::from_nanos(0, 1_000).expect("span"),
            TimeNs(10),
        );
        // Pixel rect: left 50, width 20 at depth 0.
        b.push(TimeNs(50), TimeNs(70), 0, "render", false, false, 1);
        b.push(TimeNs(200), TimeNs(210), 1, "layout", false, false, 2);
        b.push(TimeNs(400), TimeNs(410), 0, "ping", true, false, 3);
        TrackData::Slices(b.finish())
    }

    fn rects(commands: &[RenderCommand]) -> Vec<&RenderCommand> {
        commands
            .iter()
            .filter(|c| matches!(c, RenderCommand::DrawRect { .. }))
            .collect()
    }

    #[test]
    fn hit_test_inverts_pixel_rects() {
        let scale = scale();
        let ctx = ctx(&scale, Focus::default());
        let data = data();
        let r = SliceRenderer;
        assert_eq!(r.hit_test(&data, &ctx, 55.0, 5.0), Some(0));
        assert_eq!(r.hit_test(&data, &ctx, 100.0, 5.0), None);
        // Depth 1 row only matches in its own band.
        assert_eq!(r.hit_test(&data, &ctx, 205.0, 20.0), Some(1));
        assert_eq!(r.hit_test(&data, &ctx, 205.0, 5.0), None);
        // Outside the track entirely.
        assert_eq!(r.hit_test(&data, &ctx, 55.0, 40.0), None);
    }

    #[test]
    fn hit_test_instants_use_center_slack() {
        let scale = scale();
        let ctx = ctx(&scale, Focus::default());
        let data = data();
        let r = SliceRenderer;
        assert_eq!(r.hit_test(&data, &ctx, 403.0, 5.0), Some(2));
        assert_eq!(r.hit_test(&data, &ctx, 409.0, 5.0), None);
    }

    #[test]
    fn no_data_renders_checkerboard() {
        let scale = scale();
        let ctx = ctx(&scale, Focus::default());
        let commands = SliceRenderer.render(None, &ctx);
        let has_checker = commands.iter().any(|c| {
            matches!(
                c,
                RenderCommand::DrawRect {
                    fill: Fill::Token(ThemeToken::CheckerboardLight),
                    ..
                }
            )
        });
        assert!(has_checker);
    }

    #[test]
    fn instants_render_as_markers() {
        let scale = scale();
        let ctx = ctx(&scale, Focus::default());
        let commands = SliceRenderer.render(Some(&data()), &ctx);
        let markers: Vec<_> = commands
            .iter()
            .filter(|c| matches!(c, RenderCommand::DrawMarker { .. }))
            .collect();
        assert_eq!(markers.len(), 1);
        assert_eq!(rects(&commands).len(), 2);
    }

    #[test]
    fn selection_outline_is_drawn_last() {
        let scale = scale();
        let selection = Selection::Slice {
            id: 1,
            track_id: "t1".into(),
        };
        let focus = Focus {
            selection: Some(&selection),
            ..Focus::default()
        };
        let ctx = ctx(&scale, focus);
        let commands = SliceRenderer.render(Some(&data()), &ctx);
        // Last drawing command before EndGroup is the outline.
        let outline_pos = commands
            .iter()
            .position(|c| {
                matches!(
                    c,
                    RenderCommand::DrawRect {
                        fill: Fill::None,
                        border: Some(ThemeToken::SelectionOutline),
                        ..
                    }
                )
            })
            .expect("selection outline");
        assert_eq!(outline_pos, commands.len() - 2);
    }

    #[test]
    fn search_misses_are_dimmed() {
        let scale = scale();
        let focus = Focus {
            search: "render",
            ..Focus::default()
        };
        let ctx = ctx(&scale, focus);
        let commands = SliceRenderer.render(Some(&data()), &ctx);
        let mut saw_dimmed = false;
        let mut saw_opaque = false;
        for c in &commands {
            if let RenderCommand::DrawRect {
                fill: Fill::Solid(color),
                ..
            } = c
            {
                if color.a < 1.0 {
                    saw_dimmed = true;
                } else {
                    saw_opaque = true;
                }
            }
        }
        assert!(saw_dimmed && saw_opaque);
    }

    #[test]
    fn stale_data_gets_checkerboard_margins() {
        // Data covers [0, 1000] but the window panned to [500, 1500].
        let scale = TimeScale::new(TimeSpan::from_nanos(500, 1_500).expect("span"), 1000.0);
        let ctx = ctx(&scale, Focus::default());
        let commands = SliceRenderer.render(Some(&data()), &ctx);
        let checker = commands.iter().any(|c| {
            matches!(
                c,
                RenderCommand::DrawRect {
                    fill: Fill::Token(ThemeToken::CheckerboardLight | ThemeToken::CheckerboardDark),
                    ..
                }
            )
        });
        assert!(checker, "uncovered window margin must be checkerboarded");
    }
}
