// src/waveform/terminal.rs

/// Draws bar heights in `[0, 1]` as centered vertical bars, one column each.
pub fn render_ascii(heights: &[f32], height: usize) -> Vec<String> {
    let h = height.max(4);
    let mut lines = vec![vec![' '; heights.len()]; h];
    let center = (h as f32 - 1.0) * 0.5;
    for (x, &v) in heights.iter().enumerate() {
        let half = v.clamp(0.0, 1.0) * (h as f32 - 1.0) * 0.5;
        if half <= 0.0 {
            continue;
        }
        let top = (center - half).round().max(0.0) as usize;
        let bottom = ((center + half).round() as usize).min(h - 1);
        for row in lines.iter_mut().take(bottom + 1).skip(top) {
            row[x] = '█';
        }
    }
    lines.into_iter().map(|row| row.into_iter().collect()).collect()
}
