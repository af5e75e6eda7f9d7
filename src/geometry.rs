//! Reference-canvas and container-relative geometry shared by the normalizer and font sync.

/// Design-time pixel size annotation geometry was measured against.
///
/// Only constructible from finite, strictly positive dimensions, so holding a
/// `ReferenceSize` is proof that the page has valid reference dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceSize {
    width: f64,
    height: f64,
}

impl ReferenceSize {
    pub fn new(width: f64, height: f64) -> Option<Self> {
        if is_positive_length(width) && is_positive_length(height) {
            Some(Self { width, height })
        } else {
            None
        }
    }

    /// Builds a size from possibly-missing authored values.
    pub fn from_authored(width: Option<f64>, height: Option<f64>) -> Option<Self> {
        Self::new(width?, height?)
    }

    pub const fn width(self) -> f64 {
        self.width
    }

    pub const fn height(self) -> f64 {
        self.height
    }

    /// Ratio of the currently rendered width to the reference width.
    ///
    /// `None` when nothing measurable is on screen yet.
    pub fn scale_factor(self, rendered_width: f64) -> Option<f64> {
        if is_positive_length(rendered_width) {
            Some(rendered_width / self.width)
        } else {
            None
        }
    }

    pub fn horizontal_percent(self, px: f64) -> f64 {
        px / self.width * 100.0
    }

    pub fn vertical_percent(self, px: f64) -> f64 {
        px / self.height * 100.0
    }
}

/// Authored pixel box; each edge may be missing or malformed on its own.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelBox {
    pub left: Option<f64>,
    pub top: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl PixelBox {
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left: Some(left),
            top: Some(top),
            width: Some(width),
            height: Some(height),
        }
    }

    /// Converts every present field to a percentage of the reference canvas.
    pub fn to_percent(self, reference: ReferenceSize) -> PercentBox {
        PercentBox {
            left: self.left.map(|px| reference.horizontal_percent(px)),
            top: self.top.map(|px| reference.vertical_percent(px)),
            width: self.width.map(|px| reference.horizontal_percent(px)),
            height: self.height.map(|px| reference.vertical_percent(px)),
        }
    }
}

/// Container-relative box in percent. Missing fields were not convertible.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PercentBox {
    pub left: Option<f64>,
    pub top: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl PercentBox {
    pub fn converted_fields(&self) -> usize {
        [self.left, self.top, self.width, self.height]
            .iter()
            .filter(|value| value.is_some())
            .count()
    }
}

pub fn scaled_font_px(reference_font_px: f64, scale_factor: f64) -> f64 {
    reference_font_px * scale_factor
}

fn is_positive_length(value: f64) -> bool {
    value.is_finite() && value > 0.0
}
