pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod fonts;
pub mod geometry;
pub mod layout;
pub mod logging;
pub mod normalize;
pub mod resolver;
pub mod style;
pub mod zoom;

use std::path::PathBuf;
use std::sync::Arc;

pub use document::{Page, PageId, PageMarkup};
pub use engine::{Engine, MountReport};
pub use error::{OverlayError, OverlayResult};
pub use layout::{HeadlessLayout, LayoutHost};
pub use resolver::{FsImageProbe, ImageProbe};
pub use zoom::ZoomOutcome;

/// Entrypoint for hosts serving pages from a local directory.
///
/// Loads the user config, resolves images relative to `document_dir` and
/// mounts every page before returning.
pub async fn open_local<L: LayoutHost>(
    document_dir: impl Into<PathBuf>,
    markups: &[PageMarkup],
    layout: L,
) -> OverlayResult<Engine<L>> {
    logging::init();
    let document_dir = document_dir.into();
    tracing::info!(dir = %document_dir.display(), pages = markups.len(), "opening document");

    let config = config::load_engine_config();
    let probe = Arc::new(FsImageProbe::new(document_dir));
    let mut engine = Engine::new(config, markups, probe, layout)?;
    let report = engine.mount_pages().await;

    tracing::info!(
        resolved = report.resolved.len(),
        failed = report.failed.len(),
        "document ready"
    );
    Ok(engine)
}
