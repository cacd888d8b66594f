use serde::{Deserialize, Serialize};

/// Semantic color tokens resolved by the renderer's active theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThemeToken {
    TrackBackground,
    TrackBorder,
    TrackHeaderBackground,
    TrackHeaderText,

    TextPrimary,
    TextSecondary,
    TextMuted,

    SelectionOutline,
    HoverHighlight,
    SearchHighlight,

    Background,
    Surface,
    Border,

    // Loading placeholder
    CheckerboardLight,
    CheckerboardDark,

    // Instant / incomplete slice treatments
    InstantMarker,
    IncompleteHatch,

    // Counter tracks
    CounterFill,
    CounterLine,
    CounterText,

    // Annotations
    NoteMarker,
    AreaShade,

    // Time axis
    AxisBackground,
    AxisTick,
    AxisLabel,
}
