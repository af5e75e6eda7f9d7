//! Coordinate Normalizer: authored pixel geometry to container-relative percentages.
//!
//! Runs once per page, right after its image mounts. Proportions are always
//! derived from the authored pixels, never from earlier output.

use crate::document::Page;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeOutcome {
    Applied {
        annotations: usize,
        converted_fields: usize,
        skipped_fields: usize,
    },
    AlreadyNormalized,
    NotResolved,
    InvalidReference,
}

pub fn normalize(page: &mut Page) -> NormalizeOutcome {
    if page.is_normalized() {
        return NormalizeOutcome::AlreadyNormalized;
    }
    if !page.is_resolved() {
        tracing::debug!(page = %page.id(), "page has no mounted image; normalization deferred");
        return NormalizeOutcome::NotResolved;
    }
    let Some(reference) = page.reference() else {
        tracing::warn!(
            page = %page.id(),
            "invalid reference dimensions; annotations keep their authored geometry"
        );
        return NormalizeOutcome::InvalidReference;
    };

    let mut converted_fields = 0;
    let mut skipped_fields = 0;
    let annotations = page.annotations().len();

    for annotation in page.annotations_mut() {
        let proportional = annotation.original_box().to_percent(reference);
        let converted = proportional.converted_fields();
        converted_fields += converted;
        skipped_fields += 4 - converted;
        annotation.set_proportional(proportional);
    }
    page.mark_normalized();

    if skipped_fields > 0 {
        tracing::warn!(
            page = %page.id(),
            skipped_fields,
            "some annotation geometry was not numeric and stays as authored"
        );
    }
    tracing::debug!(page = %page.id(), annotations, converted_fields, "normalized annotation geometry");

    NormalizeOutcome::Applied {
        annotations,
        converted_fields,
        skipped_fields,
    }
}
