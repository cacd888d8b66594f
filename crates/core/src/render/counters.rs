use tracedeck_protocol::{Fill, Point, Rect, RenderCommand, SharedStr, TextAlign, ThemeToken};

use crate::render::{RenderContext, TrackRenderer, checkerboard};
use crate::time::TimeNs;
use crate::track::{CounterData, TrackData};

const LABEL_PADDING: f64 = 4.0;
const FONT_SIZE: f64 = 10.0;

/// Renderer for `"counter"` tracks: a step area chart of the bucketed
/// maxima, scaled to the visible value range.
pub struct CounterRenderer;

impl CounterRenderer {
    fn value_range(data: &CounterData) -> (f64, f64) {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for row in 0..data.len() {
            lo = lo.min(data.min_values[row]);
            hi = hi.max(data.max_values[row]);
        }
        if !lo.is_finite() || !hi.is_finite() {
            return (0.0, 1.0);
        }
        if lo == hi {
            // Avoid a zero range.
            (lo - 1.0, hi + 1.0)
        } else {
            // Anchor at zero when all samples are positive.
            (lo.min(0.0), hi)
        }
    }

    /// End of bucket `row`: the next bucket's start, or the data edge.
    fn bucket_end(data: &CounterData, row: usize) -> TimeNs {
        data.timestamps
            .get(row + 1)
            .copied()
            .unwrap_or_else(|| data.span.end())
    }
}

impl TrackRenderer for CounterRenderer {
    fn render(&self, data: Option<&TrackData>, ctx: &RenderContext<'_>) -> Vec<RenderCommand> {
        let width = ctx.scale.width_px();
        let height = ctx.layout.height;
        let mut commands = vec![RenderCommand::BeginGroup {
            id: SharedStr::from(ctx.track_id),
            label: None,
        }];

        let Some(TrackData::Counter(data)) = data else {
            commands.extend(checkerboard(0.0, width, height));
            commands.push(RenderCommand::EndGroup);
            return commands;
        };

        commands.push(RenderCommand::DrawRect {
            rect: Rect::new(0.0, 0.0, width, height),
            fill: Fill::Token(ThemeToken::TrackBackground),
            border: Some(ThemeToken::TrackBorder),
            label: None,
            slice_id: None,
        });

        let (lo, hi) = Self::value_range(data);
        let y_scale = (height - FONT_SIZE - LABEL_PADDING) / (hi - lo);

        for row in 0..data.len() {
            let x = ctx.scale.time_to_px(data.timestamps[row]);
            let next = ctx.scale.time_to_px(Self::bucket_end(data, row));
            let w = next - x;
            if w < 0.1 || next < 0.0 || x > width {
                continue;
            }
            let bar_height = (data.max_values[row] - lo) * y_scale;
            let y = height - bar_height;

            commands.push(RenderCommand::DrawRect {
                rect: Rect::new(x.max(0.0), y, w.min(width - x.max(0.0)), bar_height),
                fill: Fill::Token(ThemeToken::CounterFill),
                border: None,
                label: None,
                slice_id: None,
            });
            commands.push(RenderCommand::DrawLine {
                from: Point::new(x.max(0.0), y),
                to: Point::new(next.min(width), y),
                color: ThemeToken::CounterLine,
                width: 1.0,
            });
        }

        // Peak label in the top-right corner.
        commands.push(RenderCommand::DrawText {
            position: Point::new(width - LABEL_PADDING, FONT_SIZE + LABEL_PADDING),
            text: SharedStr::from(format_value(hi)),
            color: ThemeToken::CounterText,
            font_size: FONT_SIZE,
            align: TextAlign::Right,
        });

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
        let TrackData::Counter(data) = data else {
            return None;
        };
        if y < 0.0 || y >= ctx.layout.height {
            return None;
        }
        for row in 0..data.len() {
            let left = ctx.scale.time_to_px(data.timestamps[row]);
            let right = ctx.scale.time_to_px(Self::bucket_end(data, row));
            if x >= left && x < right {
                return Some(row);
            }
        }
        None
    }
}

fn format_value(value: f64) -> String {
    if value.abs() >= 1_000_000.0 {
        format!("{:.1}M", value / 1_000_000.0)
    } else if value.abs() >= 1_000.0 {
        format!("{:.1}K", value / 1_000.0)
    } else {
        format!("{value:.0}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{Focus, TrackLayout};
    use crate::time::{TimeNs, TimeSpan};
    use crate::timescale::TimeScale;

    fn counter_data() -> TrackData {
        TrackData::Counter(CounterData {
            span: TimeSpan::from_nanos(0, 1_000).expect("span"),
            resolution: TimeNs(100),
            timestamps: vec![TimeNs(0), TimeNs(500)],
            min_values: vec![1.0, 3.0],
            max_values: vec![2.0, 8.0],
            last_values: vec![2.0, 5.0],
            sample_ids: vec![10, 11],
        })
    }

    fn scale() -> TimeScale {
        TimeScale::new(TimeSpan::from_nanos(0, 1_000).expect("span"), 1000.0)
    }

    fn ctx<'a>(scale: &'a TimeScale) -> RenderContext<'a> {
        RenderContext {
            scale,
            layout: TrackLayout::counter(),
            track_id: "c1",
            focus: Focus::default(),
        }
    }

    #[test]
    fn renders_step_area() {
        let scale = scale();
        let commands = CounterRenderer.render(Some(&counter_data()), &ctx(&scale));
        let fills = commands
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
        assert_eq!(fills, 2);
        assert!(
            commands
                .iter()
                .any(|c| matches!(c, RenderCommand::DrawText { .. }))
        );
    }

    #[test]
    fn hit_test_finds_bucket() {
        let scale = scale();
        let data = counter_data();
        let ctx = ctx(&scale);
        assert_eq!(CounterRenderer.hit_test(&data, &ctx, 100.0, 10.0), Some(0));
        assert_eq!(CounterRenderer.hit_test(&data, &ctx, 700.0, 10.0), Some(1));
        assert_eq!(CounterRenderer.hit_test(&data, &ctx, 100.0, 60.0), None);
    }

    #[test]
    fn missing_data_checkerboards() {
        let scale = scale();
        let commands = CounterRenderer.render(None, &ctx(&scale));
        assert!(commands.iter().any(|c| {
            matches!(
                c,
                RenderCommand::DrawRect {
                    fill: Fill::Token(ThemeToken::CheckerboardLight),
                    ..
                }
            )
        }));
    }

    #[test]
    fn value_labels() {
        assert_eq!(format_value(512.0), "512");
        assert_eq!(format_value(2_500.0), "2.5K");
        assert_eq!(format_value(3_000_000.0), "3.0M");
    }
}
