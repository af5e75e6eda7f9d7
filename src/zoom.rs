//! Zoom Controller: owns the zoom factor and fans changes out to every page.

use crate::config::EngineConfig;
use crate::document::Page;
use crate::fonts::{sync_fonts, FontSyncOutcome};
use crate::layout::LayoutHost;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomBounds {
    min: f64,
    max: f64,
}

impl ZoomBounds {
    /// Swaps inverted bounds rather than panicking in `f64::clamp`.
    pub fn new(min: f64, max: f64) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub const fn min(self) -> f64 {
        self.min
    }

    pub const fn max(self) -> f64 {
        self.max
    }

    pub fn clamp(self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// The zoom factor, always inside its bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomState {
    factor: f64,
    bounds: ZoomBounds,
}

impl ZoomState {
    pub fn new(initial: f64, bounds: ZoomBounds) -> Self {
        let factor = if initial.is_finite() {
            bounds.clamp(initial)
        } else {
            bounds.clamp(1.0)
        };
        Self { factor, bounds }
    }

    pub const fn factor(self) -> f64 {
        self.factor
    }

    pub const fn bounds(self) -> ZoomBounds {
        self.bounds
    }

    /// Stores the clamped level; returns the previous factor when it changed.
    fn set(&mut self, level: f64) -> Option<f64> {
        let next = self.bounds.clamp(level);
        if next == self.factor {
            return None;
        }
        let previous = self.factor;
        self.factor = next;
        Some(previous)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoomOutcome {
    Applied { from: f64, to: f64 },
    Unchanged { factor: f64 },
}

impl ZoomOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ZoomController {
    state: ZoomState,
    step: f64,
    initial: f64,
    base_page_width: f64,
}

impl ZoomController {
    pub fn from_config(config: &EngineConfig) -> Self {
        let bounds = ZoomBounds::new(config.min_zoom, config.max_zoom);
        let state = ZoomState::new(config.initial_zoom, bounds);
        Self {
            state,
            step: config.zoom_step,
            initial: state.factor(),
            base_page_width: config.base_page_width,
        }
    }

    pub fn factor(&self) -> f64 {
        self.state.factor()
    }

    pub fn state(&self) -> ZoomState {
        self.state
    }

    /// Page max width for the current factor, rounded to whole pixels.
    pub fn page_max_width(&self) -> f64 {
        (self.base_page_width * self.state.factor()).round()
    }

    pub async fn set_zoom<L>(&mut self, level: f64, pages: &mut [Page], layout: &mut L) -> ZoomOutcome
    where
        L: LayoutHost + ?Sized,
    {
        if !level.is_finite() {
            tracing::warn!(level, "ignoring non-finite zoom level");
            return ZoomOutcome::Unchanged {
                factor: self.factor(),
            };
        }
        let Some(from) = self.state.set(level) else {
            tracing::debug!(zoom = self.factor(), "zoom unchanged after clamping; nothing to apply");
            return ZoomOutcome::Unchanged {
                factor: self.factor(),
            };
        };

        let to = self.factor();
        tracing::info!(from, to, "zoom changed");
        self.apply(pages, layout).await;
        ZoomOutcome::Applied { from, to }
    }

    pub async fn zoom_by<L>(&mut self, delta: f64, pages: &mut [Page], layout: &mut L) -> ZoomOutcome
    where
        L: LayoutHost + ?Sized,
    {
        let level = self.factor() + delta;
        self.set_zoom(level, pages, layout).await
    }

    pub async fn zoom_in<L>(&mut self, pages: &mut [Page], layout: &mut L) -> ZoomOutcome
    where
        L: LayoutHost + ?Sized,
    {
        self.zoom_by(self.step, pages, layout).await
    }

    pub async fn zoom_out<L>(&mut self, pages: &mut [Page], layout: &mut L) -> ZoomOutcome
    where
        L: LayoutHost + ?Sized,
    {
        self.zoom_by(-self.step, pages, layout).await
    }

    pub async fn reset_zoom<L>(&mut self, pages: &mut [Page], layout: &mut L) -> ZoomOutcome
    where
        L: LayoutHost + ?Sized,
    {
        self.set_zoom(self.initial, pages, layout).await
    }

    /// Writes every page's max width, waits one reflow, then resyncs fonts on resolved pages.
    pub async fn apply<L>(&self, pages: &mut [Page], layout: &mut L) -> Vec<FontSyncOutcome>
    where
        L: LayoutHost + ?Sized,
    {
        let max_width = self.page_max_width();
        for page in pages.iter() {
            layout.set_max_width(page.id(), max_width);
        }
        tracing::debug!(pages = pages.len(), max_width, "wrote page max widths");

        layout.reflow().await;
        resync_fonts(pages, layout)
    }
}

/// Font sync for every resolved page at its currently measured width.
pub(crate) fn resync_fonts<L>(pages: &mut [Page], layout: &L) -> Vec<FontSyncOutcome>
where
    L: LayoutHost + ?Sized,
{
    pages
        .iter_mut()
        .filter(|page| page.is_resolved())
        .map(|page| {
            let rendered_width = layout.rendered_width(page.id());
            sync_fonts(page, rendered_width)
        })
        .collect()
}
