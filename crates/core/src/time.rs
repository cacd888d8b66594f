use serde::{Deserialize, Serialize};

/// A trace timestamp or duration in integer nanoseconds.
///
/// Trace time is exact: an i64 covers ±292 years at nanosecond
/// resolution, so hours-long traces never lose precision the way
/// floating-point timestamps would. All quantization math stays in
/// integer space until the time scale converts to pixels.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TimeNs(pub i64);

impl TimeNs {
    pub const ZERO: TimeNs = TimeNs(0);

    pub fn nanos(self) -> i64 {
        self.0
    }

    /// Quantize down to a multiple of `bucket` (euclidean floor, so
    /// negative timestamps still land on the bucket at or below them).
    pub fn quantize(self, bucket: TimeNs) -> TimeNs {
        debug_assert!(bucket.0 > 0);
        TimeNs(self.0.div_euclid(bucket.0) * bucket.0)
    }

    pub fn saturating_sub(self, other: TimeNs) -> TimeNs {
        TimeNs(self.0.saturating_sub(other.0))
    }
}

impl std::ops::Add for TimeNs {
    type Output = TimeNs;

    fn add(self, rhs: TimeNs) -> TimeNs {
        TimeNs(self.0 + rhs.0)
    }
}

impl std::ops::Sub for TimeNs {
    type Output = TimeNs;

    fn sub(self, rhs: TimeNs) -> TimeNs {
        TimeNs(self.0 - rhs.0)
    }
}

impl std::fmt::Display for TimeNs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ns = self.0;
        let abs = ns.unsigned_abs();
        if abs >= 1_000_000_000 {
            write!(f, "{:.3}s", ns as f64 / 1e9)
        } else if abs >= 1_000_000 {
            write!(f, "{:.3}ms", ns as f64 / 1e6)
        } else if abs >= 1_000 {
            write!(f, "{:.1}µs", ns as f64 / 1e3)
        } else {
            write!(f, "{ns}ns")
        }
    }
}

/// A closed time interval with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSpan {
    start: TimeNs,
    end: TimeNs,
}

impl TimeSpan {
    /// Construct a span. Returns `None` when `start > end` — callers that
    /// treat inverted bounds as a programming error unwrap at the edge
    /// where the bounds were produced.
    pub fn new(start: TimeNs, end: TimeNs) -> Option<TimeSpan> {
        (start <= end).then_some(TimeSpan { start, end })
    }

    pub fn from_nanos(start: i64, end: i64) -> Option<TimeSpan> {
        TimeSpan::new(TimeNs(start), TimeNs(end))
    }

    /// The degenerate span containing exactly one instant.
    pub fn point(t: TimeNs) -> TimeSpan {
        TimeSpan { start: t, end: t }
    }

    pub fn start(&self) -> TimeNs {
        self.start
    }

    pub fn end(&self) -> TimeNs {
        self.end
    }

    pub fn duration(&self) -> TimeNs {
        self.end - self.start
    }

    pub fn contains(&self, t: TimeNs) -> bool {
        t >= self.start && t <= self.end
    }

    pub fn overlaps(&self, other: &TimeSpan) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// The sub-span visible inside `other`, if any.
    pub fn intersect(&self, other: &TimeSpan) -> Option<TimeSpan> {
        TimeSpan::new(self.start.max(other.start), self.end.min(other.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_rejects_inverted_bounds() {
        assert!(TimeSpan::from_nanos(10, 5).is_none());
        assert!(TimeSpan::from_nanos(5, 5).is_some());
    }

    #[test]
    fn quantize_floors() {
        let bucket = TimeNs(10);
        assert_eq!(TimeNs(995).quantize(bucket), TimeNs(990));
        assert_eq!(TimeNs(990).quantize(bucket), TimeNs(990));
        assert_eq!(TimeNs(999).quantize(bucket), TimeNs(990));
        assert_eq!(TimeNs(-5).quantize(bucket), TimeNs(-10));
    }

    #[test]
    fn span_overlap() {
        let a = TimeSpan::from_nanos(0, 100).expect("span");
        let b = TimeSpan::from_nanos(50, 150).expect("span");
        assert!(a.overlaps(&b));
        let i = a.intersect(&b).expect("overlap");
        assert_eq!((i.start().0, i.end().0), (50, 100));

        let c = TimeSpan::from_nanos(200, 300).expect("span");
        assert!(!a.overlaps(&c));
        assert!(a.intersect(&c).is_none());
    }

    #[test]
    fn display_picks_unit() {
        assert_eq!(TimeNs(500).to_string(), "500ns");
        assert_eq!(TimeNs(1_500).to_string(), "1.5µs");
        assert_eq!(TimeNs(2_500_000_000).to_string(), "2.500s");
    }
}
