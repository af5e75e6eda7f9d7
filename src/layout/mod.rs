//! Seam to whatever lays pages out and measures them.
//!
//! Style writes and geometry reads are decoupled: a width written with
//! [`LayoutHost::set_max_width`] is only measurable after the host has had a
//! chance to reflow.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::document::{MountedImage, PageId};

#[async_trait]
pub trait LayoutHost: Send {
    /// Inserts the resolved image element into the page container.
    fn mount_image(&mut self, page: &PageId, image: &MountedImage);

    fn set_max_width(&mut self, page: &PageId, max_width_px: f64);

    /// Resolves once the host has had one opportunity to reflow.
    async fn reflow(&mut self);

    /// Current on-screen width of the page's mounted image; 0 when nothing is shown.
    fn rendered_width(&self, page: &PageId) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct HeadlessPage {
    mounted: bool,
    max_width: f64,
    rendered_width: f64,
}

/// In-memory layout: a mounted image renders at `min(viewport, max-width)`.
#[derive(Debug)]
pub struct HeadlessLayout {
    viewport_width: f64,
    default_max_width: f64,
    pages: HashMap<PageId, HeadlessPage>,
    style_writes: usize,
    reflows: usize,
}

impl HeadlessLayout {
    pub fn new(viewport_width: f64, default_max_width: f64) -> Self {
        Self {
            viewport_width,
            default_max_width,
            pages: HashMap::new(),
            style_writes: 0,
            reflows: 0,
        }
    }

    /// Takes effect at the next reflow, like a window resize.
    pub fn set_viewport_width(&mut self, viewport_width: f64) {
        self.viewport_width = viewport_width;
    }

    pub fn viewport_width(&self) -> f64 {
        self.viewport_width
    }

    pub fn max_width(&self, page: &PageId) -> Option<f64> {
        self.pages.get(page).map(|entry| entry.max_width)
    }

    pub fn style_writes(&self) -> usize {
        self.style_writes
    }

    pub fn reflows(&self) -> usize {
        self.reflows
    }

    fn entry(&mut self, page: &PageId) -> &mut HeadlessPage {
        let default_max_width = self.default_max_width;
        self.pages.entry(page.clone()).or_insert(HeadlessPage {
            mounted: false,
            max_width: default_max_width,
            rendered_width: 0.0,
        })
    }
}

#[async_trait]
impl LayoutHost for HeadlessLayout {
    fn mount_image(&mut self, page: &PageId, _image: &MountedImage) {
        self.entry(page).mounted = true;
    }

    fn set_max_width(&mut self, page: &PageId, max_width_px: f64) {
        self.entry(page).max_width = max_width_px;
        self.style_writes += 1;
    }

    async fn reflow(&mut self) {
        tokio::task::yield_now().await;
        let viewport_width = self.viewport_width.max(0.0);
        for entry in self.pages.values_mut() {
            entry.rendered_width = if entry.mounted {
                entry.max_width.min(viewport_width)
            } else {
                0.0
            };
        }
        self.reflows += 1;
    }

    fn rendered_width(&self, page: &PageId) -> f64 {
        self.pages
            .get(page)
            .map_or(0.0, |entry| entry.rendered_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> MountedImage {
        MountedImage {
            src: "p.png".to_string(),
            alt: "Page image 1".to_string(),
        }
    }

    #[tokio::test]
    async fn widths_are_measurable_only_after_reflow() {
        let page = PageId::new("page0");
        let mut layout = HeadlessLayout::new(1920.0, 900.0);
        layout.mount_image(&page, &image());
        assert_eq!(layout.rendered_width(&page), 0.0);

        layout.reflow().await;
        assert_eq!(layout.rendered_width(&page), 900.0);

        layout.set_max_width(&page, 990.0);
        assert_eq!(layout.rendered_width(&page), 900.0);
        layout.reflow().await;
        assert_eq!(layout.rendered_width(&page), 990.0);
        assert_eq!(layout.style_writes(), 1);
        assert_eq!(layout.reflows(), 2);
    }

    #[tokio::test]
    async fn narrow_viewport_caps_rendered_width() {
        let page = PageId::new("page0");
        let mut layout = HeadlessLayout::new(600.0, 900.0);
        layout.mount_image(&page, &image());
        layout.reflow().await;
        assert_eq!(layout.rendered_width(&page), 600.0);

        layout.set_viewport_width(1200.0);
        layout.reflow().await;
        assert_eq!(layout.rendered_width(&page), 900.0);
    }

    #[tokio::test]
    async fn unmounted_pages_render_nothing() {
        let page = PageId::new("page1");
        let mut layout = HeadlessLayout::new(1920.0, 900.0);
        layout.set_max_width(&page, 900.0);
        layout.reflow().await;
        assert_eq!(layout.rendered_width(&page), 0.0);
        assert_eq!(layout.rendered_width(&PageId::new("unknown")), 0.0);
    }
}
