use tracedeck_protocol::Color;

/// Deterministic base color for a slice title.
///
/// Hashing the title means equal names get equal colors everywhere in
/// the session, so visually grouping by name works across tracks
/// without any shared palette state.
pub fn slice_color(title: &str) -> Color {
    let hue = (title_hash(title) % 360) as f64;
    Color::from_hsl(hue, 0.45, 0.55)
}

/// Brighter variant for the hovered/cross-highlighted slice.
pub fn highlighted(title: &str) -> Color {
    let hue = (title_hash(title) % 360) as f64;
    Color::from_hsl(hue, 0.6, 0.68)
}

/// Faded variant for slices that do not match the active search.
pub fn dimmed(title: &str) -> Color {
    let mut c = slice_color(title);
    c.a = 0.25;
    c
}

fn title_hash(title: &str) -> u64 {
    let mut hash = 0u64;
    for b in title.bytes() {
        hash = (hash ^ u64::from(b)).wrapping_mul(0x517c_c1b7_2722_0a95);
    }
    hash
}
