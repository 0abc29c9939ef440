use serde::{Deserialize, Serialize};

/// Stroke used for the sweep line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineStyle {
    pub color: String,
    pub width: f32,
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            color: "#ffffff".to_string(),
            width: 3.0,
        }
    }
}

/// Surface the sweep line is drawn on, layered above the sky image.
pub trait Overlay: Send {
    /// Clears the surface and draws a full-height vertical line at `x`.
    fn draw_line(&mut self, x: f64, style: &LineStyle);

    fn clear(&mut self);

    /// Marks the overlay as showing an active sweep.
    fn set_playing(&mut self, playing: bool);
}

/// In-memory overlay that keeps only what would be on screen.
#[derive(Debug, Clone, Default)]
pub struct LineOverlay {
    width: u32,
    height: u32,
    line: Option<f64>,
    style: LineStyle,
    playing: bool,
    redraws: usize,
}

impl LineOverlay {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Position of the line currently drawn, if any.
    pub fn line(&self) -> Option<f64> {
        self.line
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn redraws(&self) -> usize {
        self.redraws
    }

    /// Pixel columns covered by the current stroke, clipped to the surface.
    pub fn covered_columns(&self) -> Option<std::ops::Range<u32>> {
        let x = self.line?;
        let half = f64::from(self.style.width) / 2.0;
        let start = (x - half).floor().max(0.0) as u32;
        let end = ((x + half).ceil().max(0.0) as u32).min(self.width);
        (start < end).then_some(start..end)
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl Overlay for LineOverlay {
    fn draw_line(&mut self, x: f64, style: &LineStyle) {
        self.line = Some(x);
        self.style = style.clone();
        self.redraws += 1;
    }

    fn clear(&mut self) {
        self.line = None;
    }

    fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redraw_replaces_previous_line() {
        let mut overlay = LineOverlay::new(800, 800);
        overlay.draw_line(10.0, &LineStyle::default());
        overlay.draw_line(42.0, &LineStyle::default());
        assert_eq!(overlay.line(), Some(42.0));
        assert_eq!(overlay.covered_columns(), Some(40..44));
        overlay.clear();
        assert_eq!(overlay.line(), None);
        assert_eq!(overlay.covered_columns(), None);
    }

    #[test]
    fn stroke_is_clipped_at_the_edges() {
        let mut overlay = LineOverlay::new(800, 800);
        overlay.draw_line(0.0, &LineStyle::default());
        assert_eq!(overlay.covered_columns(), Some(0..2));
        overlay.draw_line(799.5, &LineStyle::default());
        assert_eq!(overlay.covered_columns(), Some(798..800));
    }
}
