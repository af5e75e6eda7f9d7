//! Top-level composition: resolve and mount every page, then follow zoom.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::document::{markup, Page, PageId, PageMarkup, PageSnapshot};
use crate::error::OverlayResult;
use crate::fonts::{sync_fonts, FontSyncOutcome};
use crate::layout::LayoutHost;
use crate::normalize::{normalize, NormalizeOutcome};
use crate::resolver::{resolve_pages, FailureReason, ImageProbe, PageResolution};
use crate::zoom::{resync_fonts, ZoomController, ZoomOutcome};

/// What happened to each page during [`Engine::mount_pages`].
#[derive(Debug, Clone, Default)]
pub struct MountReport {
    pub resolved: Vec<PageId>,
    pub failed: Vec<(PageId, FailureReason)>,
    pub normalized: usize,
    pub normalization_skipped: Vec<PageId>,
    pub font_sync_skipped: Vec<PageId>,
}

pub struct Engine<L: LayoutHost> {
    config: EngineConfig,
    pages: Vec<Page>,
    probe: Arc<dyn ImageProbe>,
    layout: L,
    zoom: ZoomController,
}

impl<L: LayoutHost> Engine<L> {
    pub fn new(
        config: EngineConfig,
        markups: &[PageMarkup],
        probe: Arc<dyn ImageProbe>,
        layout: L,
    ) -> OverlayResult<Self> {
        let config = config.validate()?;
        let pages = markups
            .iter()
            .enumerate()
            .map(|(index, markup)| Page::from_markup(index, markup, &config.fallback_extensions))
            .collect();
        let zoom = ZoomController::from_config(&config);

        Ok(Self {
            config,
            pages,
            probe,
            layout,
            zoom,
        })
    }

    /// Same as [`Engine::new`] with the page list given as bridge JSON.
    pub fn from_json(
        config: EngineConfig,
        pages_json: &str,
        probe: Arc<dyn ImageProbe>,
        layout: L,
    ) -> OverlayResult<Self> {
        let markups = markup::pages_from_json(pages_json)?;
        Self::new(config, &markups, probe, layout)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, id: &PageId) -> Option<&Page> {
        self.pages.iter().find(|page| page.id() == id)
    }

    pub fn layout(&self) -> &L {
        &self.layout
    }

    pub fn layout_mut(&mut self) -> &mut L {
        &mut self.layout
    }

    pub fn zoom_factor(&self) -> f64 {
        self.zoom.factor()
    }

    /// Resolves every page, then normalizes and font-syncs the ones that mounted.
    ///
    /// Nothing past resolution starts until every page is terminal. Ends by
    /// applying the current zoom once so page max widths are established.
    pub async fn mount_pages(&mut self) -> MountReport {
        let timeout = self.config.probe_timeout();
        let outcomes = resolve_pages(&mut self.pages, Arc::clone(&self.probe), timeout).await;

        let mut report = MountReport::default();
        for outcome in outcomes {
            match outcome {
                PageResolution::Resolved { page, .. } => report.resolved.push(page),
                PageResolution::Failed { page, reason } => report.failed.push((page, reason)),
            }
        }

        for page in self.pages.iter().filter(|page| report.resolved.contains(page.id())) {
            if let Some(image) = page.image() {
                self.layout.mount_image(page.id(), image);
            }
        }
        self.layout.reflow().await;

        for page in self
            .pages
            .iter_mut()
            .filter(|page| report.resolved.contains(page.id()))
        {
            match normalize(page) {
                NormalizeOutcome::Applied { .. } => report.normalized += 1,
                _ => report.normalization_skipped.push(page.id().clone()),
            }
            let rendered_width = self.layout.rendered_width(page.id());
            if !sync_fonts(page, rendered_width).is_applied() {
                report.font_sync_skipped.push(page.id().clone());
            }
        }

        self.zoom.apply(&mut self.pages, &mut self.layout).await;

        tracing::info!(
            resolved = report.resolved.len(),
            failed = report.failed.len(),
            normalized = report.normalized,
            "all pages processed"
        );
        report
    }

    pub async fn set_zoom(&mut self, level: f64) -> ZoomOutcome {
        self.zoom
            .set_zoom(level, &mut self.pages, &mut self.layout)
            .await
    }

    pub async fn zoom_by(&mut self, delta: f64) -> ZoomOutcome {
        self.zoom
            .zoom_by(delta, &mut self.pages, &mut self.layout)
            .await
    }

    pub async fn zoom_in(&mut self) -> ZoomOutcome {
        self.zoom.zoom_in(&mut self.pages, &mut self.layout).await
    }

    pub async fn zoom_out(&mut self) -> ZoomOutcome {
        self.zoom.zoom_out(&mut self.pages, &mut self.layout).await
    }

    pub async fn reset_zoom(&mut self) -> ZoomOutcome {
        self.zoom.reset_zoom(&mut self.pages, &mut self.layout).await
    }

    /// Re-measures after a host-side layout change (e.g. viewport resize) and resyncs fonts.
    pub async fn refresh_layout(&mut self) -> Vec<FontSyncOutcome> {
        self.layout.reflow().await;
        resync_fonts(&mut self.pages, &self.layout)
    }

    pub fn snapshots(&self) -> Vec<PageSnapshot> {
        self.pages.iter().map(Page::snapshot).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::document::{AnnotationMarkup, ResolutionState, TextRunMarkup};
    use crate::error::OverlayError;
    use crate::layout::HeadlessLayout;
    use crate::resolver::testing::RecordingProbe;
    use crate::resolver::ProbeResult;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    const ANNOTATION_STYLE: &str =
        "left: 100px; top: 50px; width: 200px; height: 40px; font-size: 20px";

    fn page_markup(id: &str, container_style: &str) -> PageMarkup {
        PageMarkup {
            id: id.to_string(),
            container_style: container_style.to_string(),
            annotations: vec![AnnotationMarkup {
                style: ANNOTATION_STYLE.to_string(),
                runs: vec![TextRunMarkup {
                    style: "font-size: 16px".to_string(),
                    text: "line".to_string(),
                }],
            }],
        }
    }

    fn config_with_fallbacks(fallbacks: &[&str]) -> EngineConfig {
        EngineConfig {
            fallback_extensions: fallbacks.iter().map(|ext| ext.to_string()).collect(),
            ..EngineConfig::default()
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[tokio::test]
    async fn mounted_page_gets_proportional_geometry_and_scaled_fonts() {
        let probe = Arc::new(RecordingProbe::with_loadable(["img/p0.jpeg"]));
        let markups = [page_markup(
            "page0",
            r#"width: 800px; height: 1200px; background-image: url("img/p0.png")"#,
        )];
        let mut engine = Engine::new(
            config_with_fallbacks(&[".jpeg", ".png", ".webp"]),
            &markups,
            probe.clone(),
            HeadlessLayout::new(1920.0, 900.0),
        )
        .unwrap();

        let report = engine.mount_pages().await;

        assert_eq!(report.resolved, vec![PageId::new("page0")]);
        assert_eq!(report.normalized, 1);
        assert_eq!(probe.attempts(), vec!["img/p0.png", "img/p0.jpeg"]);

        let page = &engine.pages()[0];
        assert_eq!(page.image().unwrap().src, "img/p0.jpeg");
        let annotation = &page.annotations()[0];
        let percent = annotation.proportional().unwrap();
        assert!(approx(percent.left.unwrap(), 12.5));
        assert!(approx(percent.top.unwrap(), 4.166_666_666_666_667));
        assert!(approx(percent.width.unwrap(), 25.0));
        assert!(approx(percent.height.unwrap(), 3.333_333_333_333_333));
        assert_eq!(annotation.font_px(), Some(22.5));
        assert_eq!(annotation.runs()[0].font_px(), Some(18.0));
        assert_eq!(
            annotation.css_declarations().last().unwrap().to_string(),
            "font-size: 22.50px"
        );
    }

    #[tokio::test]
    async fn fonts_track_reference_across_zoom_sequence_while_geometry_stays_fixed() {
        let probe = Arc::new(RecordingProbe::with_loadable(["p0.png"]));
        let markups = [page_markup(
            "page0",
            r#"width: 800px; height: 1200px; background-image: url("p0.png")"#,
        )];
        let mut engine = Engine::new(
            EngineConfig::default(),
            &markups,
            probe,
            HeadlessLayout::new(100_000.0, 900.0),
        )
        .unwrap();
        engine.mount_pages().await;
        let geometry = engine.pages()[0].annotations()[0].proportional();

        for delta in [0.1, 0.1, -0.3, 0.7, 2.0, -5.0, 0.25] {
            engine.zoom_by(delta).await;
            let page = &engine.pages()[0];
            let rendered = engine.layout().rendered_width(page.id());
            let annotation = &page.annotations()[0];

            assert_eq!(annotation.font_px(), Some(20.0 * (rendered / 800.0)));
            assert_eq!(annotation.proportional(), geometry);
            assert!((0.3..=3.0).contains(&engine.zoom_factor()));
        }
    }

    #[tokio::test]
    async fn exhausted_page_fails_and_others_still_mount() {
        let probe = Arc::new(RecordingProbe::with_loadable(["p1.webp"]));
        let markups = [
            page_markup("page0", r#"width: 800px; height: 1200px; background-image: url("p0.png")"#),
            page_markup("page1", r#"width: 800px; height: 1200px; background-image: url("p1.png")"#),
        ];
        let mut engine = Engine::new(
            config_with_fallbacks(&[".jpeg", ".webp"]),
            &markups,
            probe,
            HeadlessLayout::new(1920.0, 900.0),
        )
        .unwrap();

        let report = engine.mount_pages().await;

        assert_eq!(report.resolved, vec![PageId::new("page1")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, PageId::new("page0"));
        assert!(matches!(report.failed[0].1, FailureReason::Exhausted(ref attempts) if attempts.len() == 3));

        let failed = engine.page(&PageId::new("page0")).unwrap();
        assert_eq!(failed.resolution(), ResolutionState::Failed);
        assert!(failed.image().is_none());
        assert!(failed.annotations()[0].proportional().is_none());
        assert_eq!(failed.annotations()[0].font_px(), None);
    }

    #[tokio::test]
    async fn zero_reference_width_keeps_authored_geometry_through_zoom() {
        let probe = Arc::new(RecordingProbe::with_loadable(["p0.png"]));
        let markups = [page_markup(
            "page0",
            r#"width: 0px; height: 1200px; background-image: url("p0.png")"#,
        )];
        let mut engine = Engine::new(
            EngineConfig::default(),
            &markups,
            probe,
            HeadlessLayout::new(1920.0, 900.0),
        )
        .unwrap();

        let report = engine.mount_pages().await;
        engine.zoom_by(0.5).await;

        assert_eq!(report.normalization_skipped, vec![PageId::new("page0")]);
        assert_eq!(report.font_sync_skipped, vec![PageId::new("page0")]);
        let rendered: Vec<String> = engine.pages()[0].annotations()[0]
            .css_declarations()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            rendered,
            vec![
                "left: 100px",
                "top: 50px",
                "width: 200px",
                "height: 40px",
                "font-size: 20px",
            ]
        );
    }

    #[tokio::test]
    async fn hidden_page_is_retried_on_next_layout_change() {
        let probe = Arc::new(RecordingProbe::with_loadable(["p0.png"]));
        let markups = [page_markup(
            "page0",
            r#"width: 800px; height: 1200px; background-image: url("p0.png")"#,
        )];
        let mut engine = Engine::new(
            EngineConfig::default(),
            &markups,
            probe,
            HeadlessLayout::new(0.0, 900.0),
        )
        .unwrap();

        let report = engine.mount_pages().await;
        assert_eq!(report.font_sync_skipped, vec![PageId::new("page0")]);
        assert_eq!(engine.pages()[0].annotations()[0].font_px(), None);

        engine.layout_mut().set_viewport_width(400.0);
        let outcomes = engine.refresh_layout().await;

        assert!(outcomes[0].is_applied());
        assert_eq!(engine.pages()[0].annotations()[0].font_px(), Some(10.0));
    }

    #[tokio::test]
    async fn from_json_builds_pages_and_snapshots_serialize() {
        let probe = Arc::new(RecordingProbe::with_loadable(["p0.png"]));
        let json = r#"[{"id": "page0", "container_style": "width: 800px; height: 1200px; background-image: url('p0.png')",
            "annotations": [{"style": "left: 400px; font-size: 10px"}]}]"#;
        let mut engine = Engine::from_json(
            EngineConfig::default(),
            json,
            probe,
            HeadlessLayout::new(1920.0, 900.0),
        )
        .unwrap();
        engine.mount_pages().await;

        let snapshot = serde_json::to_value(engine.snapshots()).unwrap();
        assert_eq!(snapshot[0]["resolution"], "resolved");
        assert_eq!(snapshot[0]["annotations"][0]["declarations"][0]["value"], "50%");
        assert_eq!(snapshot[0]["annotations"][0]["declarations"][1]["value"], "11.25px");
    }

    #[tokio::test]
    async fn local_files_resolve_through_filesystem_probe() {
        let dir = std::env::temp_dir().join("webtoon-overlay-engine-local");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("vol 1")).unwrap();
        std::fs::write(dir.join("vol 1/p0.webp"), b"RIFF\0\0\0\0WEBPVP8 ").unwrap();

        let markups = [page_markup(
            "page0",
            r#"width: 800px; height: 1200px; background-image: url("vol%201/p0.png")"#,
        )];
        let mut engine = Engine::new(
            EngineConfig::default(),
            &markups,
            Arc::new(crate::resolver::FsImageProbe::new(&dir)),
            HeadlessLayout::new(1920.0, 900.0),
        )
        .unwrap();

        let report = engine.mount_pages().await;

        assert_eq!(report.resolved, vec![PageId::new("page0")]);
        assert_eq!(engine.pages()[0].image().unwrap().src, "vol 1/p0.webp");
        let _ = std::fs::remove_dir_all(dir);
    }

    type EventLog = Arc<Mutex<Vec<String>>>;

    /// Loads every url; `held` only once the gate is opened.
    struct GatedProbe {
        held: String,
        gate: Arc<Notify>,
        events: EventLog,
    }

    #[async_trait]
    impl ImageProbe for GatedProbe {
        async fn probe(&self, url: &str) -> ProbeResult<()> {
            if url == self.held {
                self.gate.notified().await;
            }
            self.events.lock().unwrap().push(format!("loaded {url}"));
            Ok(())
        }
    }

    /// Headless layout that also logs each image it mounts.
    struct LoggingLayout {
        inner: HeadlessLayout,
        events: EventLog,
    }

    #[async_trait]
    impl LayoutHost for LoggingLayout {
        fn mount_image(&mut self, page: &PageId, image: &crate::document::MountedImage) {
            self.events.lock().unwrap().push(format!("mount {page}"));
            self.inner.mount_image(page, image);
        }

        fn set_max_width(&mut self, page: &PageId, max_width_px: f64) {
            self.inner.set_max_width(page, max_width_px);
        }

        async fn reflow(&mut self) {
            self.inner.reflow().await;
        }

        fn rendered_width(&self, page: &PageId) -> f64 {
            self.inner.rendered_width(page)
        }
    }

    #[tokio::test]
    async fn nothing_is_mounted_or_normalized_until_every_page_is_terminal() {
        let events: EventLog = Arc::default();
        let gate = Arc::new(Notify::new());
        let probe = Arc::new(GatedProbe {
            held: "img/slow.png".to_string(),
            gate: Arc::clone(&gate),
            events: Arc::clone(&events),
        });
        let markups = [
            page_markup(
                "page0",
                r#"width: 800px; height: 1200px; background-image: url("img/fast.png")"#,
            ),
            page_markup(
                "page1",
                r#"width: 800px; height: 1200px; background-image: url("img/slow.png")"#,
            ),
        ];
        let layout = LoggingLayout {
            inner: HeadlessLayout::new(1920.0, 900.0),
            events: Arc::clone(&events),
        };
        let mut engine = Engine::new(EngineConfig::default(), &markups, probe, layout).unwrap();

        let (report, ()) = tokio::join!(engine.mount_pages(), async {
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
            assert_eq!(*events.lock().unwrap(), vec!["loaded img/fast.png"]);
            gate.notify_one();
        });

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                "loaded img/fast.png",
                "loaded img/slow.png",
                "mount page0",
                "mount page1",
            ]
        );
        assert_eq!(report.resolved.len(), 2);
        assert_eq!(report.normalized, 2);
        assert!(engine.pages().iter().all(Page::is_normalized));
    }

    #[test]
    fn construction_rejects_invalid_config_and_markup() {
        let probe: Arc<dyn ImageProbe> = Arc::new(RecordingProbe::default());
        let config = EngineConfig {
            min_zoom: 5.0,
            ..EngineConfig::default()
        };
        let err = Engine::new(config, &[], Arc::clone(&probe), HeadlessLayout::new(1.0, 1.0))
            .err()
            .expect("inverted bounds rejected");
        assert!(matches!(
            err,
            OverlayError::Config(ConfigError::InvertedZoomBounds { .. })
        ));

        let err = Engine::from_json(
            EngineConfig::default(),
            "not json",
            probe,
            HeadlessLayout::new(1.0, 1.0),
        )
        .err()
        .expect("bad markup rejected");
        assert!(matches!(err, OverlayError::Markup(_)));
    }
}
