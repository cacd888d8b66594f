use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracedeck_protocol::SharedStr;

use crate::time::{TimeNs, TimeSpan};

/// Per-response string table.
///
/// Titles repeat heavily within one response (the same function name in
/// hundreds of buckets), so rows carry indices into this table instead
/// of owned strings. Deduplication is within one response only — tables
/// are rebuilt wholesale with their data.
#[derive(Debug, Default)]
pub struct StringTable {
    strings: Vec<SharedStr>,
    index: HashMap<SharedStr, u32>,
}

impl StringTable {
    pub fn new() -> StringTable {
        StringTable::default()
    }

    pub fn intern(&mut self, s: &str) -> u32 {
        if let Some(&idx) = self.index.get(s) {
            return idx;
        }
        let shared = SharedStr::from(s);
        let idx = self.strings.len() as u32;
        self.strings.push(shared.clone());
        self.index.insert(shared, idx);
        idx
    }

    pub fn finish(self) -> Vec<SharedStr> {
        self.strings
    }
}

/// Quantized columnar slice rows for one `(window, resolution)` request.
///
/// One row is one visually-quantized bucket: at low zoom many real
/// slices collapse into a single representative row. All column vectors
/// have equal length; rows keep the order the query returned them in,
/// which is also hit-test encounter order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceData {
    pub span: TimeSpan,
    pub resolution: TimeNs,
    pub starts: Vec<TimeNs>,
    pub ends: Vec<TimeNs>,
    pub depths: Vec<u32>,
    /// Indices into `strings`.
    pub titles: Vec<u32>,
    pub is_instant: Vec<bool>,
    pub is_incomplete: Vec<bool>,
    pub slice_ids: Vec<i64>,
    pub strings: Vec<SharedStr>,
    pub max_depth: u32,
}

impl SliceData {
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    pub fn title(&self, row: usize) -> &str {
        self.titles
            .get(row)
            .and_then(|&idx| self.strings.get(idx as usize))
            .map_or("", |s| s.as_str())
    }
}

/// Builder that enforces the equal-length column invariant.
#[derive(Debug)]
pub struct SliceDataBuilder {
    span: TimeSpan,
    resolution: TimeNs,
    starts: Vec<TimeNs>,
    ends: Vec<TimeNs>,
    depths: Vec<u32>,
    titles: Vec<u32>,
    is_instant: Vec<bool>,
    is_incomplete: Vec<bool>,
    slice_ids: Vec<i64>,
    strings: StringTable,
    max_depth: u32,
}

impl SliceDataBuilder {
    pub fn new(span: TimeSpan, resolution: TimeNs) -> SliceDataBuilder {
        SliceDataBuilder {
            span,
            resolution,
            starts: Vec::new(),
            ends: Vec::new(),
            depths: Vec::new(),
            titles: Vec::new(),
            is_instant: Vec::new(),
            is_incomplete: Vec::new(),
            slice_ids: Vec::new(),
            strings: StringTable::new(),
            max_depth: 0,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn push(
        &mut self,
        start: TimeNs,
        end: TimeNs,
        depth: u32,
        title: &str,
        instant: bool,
        incomplete: bool,
        slice_id: i64,
    ) {
        debug_assert!(start <= end);
        self.starts.push(start);
        self.ends.push(end);
        self.depths.push(depth);
        self.titles.push(self.strings.intern(title));
        self.is_instant.push(instant);
        self.is_incomplete.push(incomplete);
        self.slice_ids.push(slice_id);
        self.max_depth = self.max_depth.max(depth);
    }

    pub fn finish(self) -> SliceData {
        SliceData {
            span: self.span,
            resolution: self.resolution,
            starts: self.starts,
            ends: self.ends,
            depths: self.depths,
            titles: self.titles,
            is_instant: self.is_instant,
            is_incomplete: self.is_incomplete,
            slice_ids: self.slice_ids,
            strings: self.strings.finish(),
            max_depth: self.max_depth,
        }
    }
}

/// Bucketed counter samples for one `(window, resolution)` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterData {
    pub span: TimeSpan,
    pub resolution: TimeNs,
    pub timestamps: Vec<TimeNs>,
    pub min_values: Vec<f64>,
    pub max_values: Vec<f64>,
    pub last_values: Vec<f64>,
    pub sample_ids: Vec<i64>,
}

impl CounterData {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Published payload of one controller invocation, tagged by kind.
///
/// Produced exclusively by one controller run and consumed exclusively
/// by the matching renderer; replaced wholesale on every new request,
/// never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrackData {
    Slices(SliceData),
    Counter(CounterData),
}

impl TrackData {
    pub fn span(&self) -> TimeSpan {
        match self {
            TrackData::Slices(d) => d.span,
            TrackData::Counter(d) => d.span,
        }
    }

    pub fn resolution(&self) -> TimeNs {
        match self {
            TrackData::Slices(d) => d.resolution,
            TrackData::Counter(d) => d.resolution,
        }
    }
}
