//! Font Scale Synchronizer.
//!
//! Percent geometry tracks reflow on its own, font size does not, so every
//! scale-affecting event rewrites it as
//! `reference_font_px * rendered_width / reference_width`. The reference font
//! size is captured on the first call and reused by every later one.

use crate::document::Page;
use crate::geometry::scaled_font_px;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FontSyncOutcome {
    Applied { scale_factor: f64, written: usize },
    NotResolved,
    InvalidReference,
    ZeroRenderedWidth,
}

impl FontSyncOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Rescales every annotation and text-run font on `page` to `rendered_width`.
pub fn sync_fonts(page: &mut Page, rendered_width: f64) -> FontSyncOutcome {
    if !page.is_resolved() {
        return FontSyncOutcome::NotResolved;
    }

    for annotation in page.annotations_mut() {
        annotation.capture_reference_font();
        for run in annotation.runs_mut() {
            run.capture_reference_font();
        }
    }

    let Some(reference) = page.reference() else {
        tracing::warn!(page = %page.id(), "invalid reference dimensions; font sizes left as authored");
        return FontSyncOutcome::InvalidReference;
    };
    let Some(scale_factor) = reference.scale_factor(rendered_width) else {
        tracing::warn!(
            page = %page.id(),
            rendered_width,
            "page image has no rendered width; font sizes not updated this cycle"
        );
        return FontSyncOutcome::ZeroRenderedWidth;
    };

    let mut written = 0;
    for annotation in page.annotations_mut() {
        if let Some(reference_font) = annotation.reference_font_px() {
            annotation.write_font_px(scaled_font_px(reference_font, scale_factor));
            written += 1;
        }
        for run in annotation.runs_mut() {
            if let Some(reference_font) = run.reference_font_px() {
                run.write_font_px(scaled_font_px(reference_font, scale_factor));
                written += 1;
            }
        }
    }

    tracing::debug!(page = %page.id(), scale_factor, written, "synchronized font sizes");
    FontSyncOutcome::Applied {
        scale_factor,
        written,
    }
}
