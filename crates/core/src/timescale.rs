use crate::time::{TimeNs, TimeSpan};

/// Bidirectional mapping between trace time and horizontal pixels.
///
/// One `TimeScale` is shared by every controller and renderer so that the
/// window a controller queried for and the window a renderer draws are
/// the same coordinate system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeScale {
    window: TimeSpan,
    width_px: f64,
}

impl TimeScale {
    pub fn new(window: TimeSpan, width_px: f64) -> TimeScale {
        TimeScale {
            window,
            width_px: width_px.max(1.0),
        }
    }

    pub fn window(&self) -> TimeSpan {
        self.window
    }

    pub fn width_px(&self) -> f64 {
        self.width_px
    }

    fn ns_per_px(&self) -> f64 {
        self.window.duration().nanos() as f64 / self.width_px
    }

    pub fn time_to_px(&self, t: TimeNs) -> f64 {
        (t - self.window.start()).nanos() as f64 / self.ns_per_px().max(f64::MIN_POSITIVE)
    }

    pub fn px_to_time(&self, px: f64) -> TimeNs {
        self.window.start() + TimeNs((px * self.ns_per_px()) as i64)
    }

    pub fn duration_to_px(&self, d: TimeNs) -> f64 {
        d.nanos() as f64 / self.ns_per_px().max(f64::MIN_POSITIVE)
    }

    /// Nanoseconds per quantization bucket for this window and width.
    ///
    /// Always a power of two, chosen so that one bucket is at least one
    /// pixel wide — anything finer would produce rows the renderer cannot
    /// distinguish from their neighbors.
    pub fn resolution(&self) -> TimeNs {
        let dur_ns = self.window.duration().nanos().max(1) as u64;
        let width = self.width_px as u64;
        let raw = dur_ns.div_ceil(width.max(1)).max(1);
        TimeNs(raw.next_power_of_two() as i64)
    }
}
