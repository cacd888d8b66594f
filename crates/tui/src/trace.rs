use serde::Deserialize;

use tracedeck_core::time::{TimeNs, TimeSpan};

/// Demo trace file: a JSON list of named lanes with raw slice rows or
/// counter samples, executed by the in-memory engine.
#[derive(Debug, Deserialize)]
pub struct TraceFile {
    pub tracks: Vec<TraceTrack>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TraceTrack {
    Slice { name: String, slices: Vec<SliceRow> },
    Counter { name: String, samples: Vec<CounterSample> },
}

impl TraceTrack {
    pub fn name(&self) -> &str {
        match self {
            TraceTrack::Slice { name, .. } | TraceTrack::Counter { name, .. } => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TraceTrack::Slice { .. } => "slice",
            TraceTrack::Counter { .. } => "counter",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SliceRow {
    pub ts: i64,
    /// Nanosecond duration; 0 marks an instant event, -1 a slice still
    /// open at trace end.
    pub dur: i64,
    #[serde(default)]
    pub depth: i64,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CounterSample {
    pub ts: i64,
    pub value: f64,
}

impl TraceFile {
    /// Total extent of the trace across every lane.
    pub fn span(&self) -> TimeSpan {
        let mut min = i64::MAX;
        let mut max = i64::MIN;
        for track in &self.tracks {
            match track {
                TraceTrack::Slice { slices, .. } => {
                    for s in slices {
                        min = min.min(s.ts);
                        max = max.max(s.ts + s.dur.max(0));
                    }
                }
                TraceTrack::Counter { samples, .. } => {
                    for s in samples {
                        min = min.min(s.ts);
                        max = max.max(s.ts);
                    }
                }
            }
        }
        if min > max {
            (min, max) = (0, 0);
        }
        TimeSpan::from_nanos(min, max).unwrap_or_else(|| TimeSpan::point(TimeNs::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_demo_shape() {
        let json = r#"{
            "tracks": [
                {"kind": "slice", "name": "main", "slices": [
                    {"ts": 0, "dur": 100, "depth": 0, "name": "frame"},
                    {"ts": 20, "dur": 0, "depth": 1, "name": "vsync"}
                ]},
                {"kind": "counter", "name": "heap", "samples": [
                    {"ts": 0, "value": 1024.0},
                    {"ts": 50, "value": 2048.0}
                ]}
            ]
        }"#;
        let trace: TraceFile = serde_json::from_str(json).expect("parse");
        assert_eq!(trace.tracks.len(), 2);
        assert_eq!(trace.tracks[0].kind(), "slice");
        assert_eq!(trace.tracks[1].name(), "heap");
        let span = trace.span();
        assert_eq!((span.start().nanos(), span.end().nanos()), (0, 100));
    }
}
