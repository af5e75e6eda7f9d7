//! Resource Resolver: picks the first loadable image among ordered extension candidates.
//!
//! Candidates for one page are probed strictly one after another; pages are
//! resolved concurrently as independent tasks joined before anything else
//! runs. The first candidate that loads wins, there is no "best" pick.

pub mod fs;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinSet;

use crate::document::{Page, PageId};

pub use fs::FsImageProbe;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("no resource at {url}")]
    NotFound { url: String },
    #[error("resource at {url} is not a recognised image")]
    NotAnImage { url: String },
    #[error("failed to read {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no load signal for {url} within {after:?}")]
    TimedOut { url: String, after: Duration },
}

pub type ProbeResult<T> = std::result::Result<T, ProbeError>;

/// One load attempt against a concrete locator.
///
/// Returning means a definitive signal arrived: `Ok` is a successful load,
/// `Err` a failed one. Implementations that never return stall the page.
#[async_trait]
pub trait ImageProbe: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeResult<()>;
}

/// A nominal locator split into base path and authored extension (with its dot).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    base: String,
    extension: String,
}

impl Locator {
    /// The extension is whatever follows the last `.` after the last path separator.
    pub fn parse(locator: &str) -> Self {
        let separator = locator.rfind(['/', '\\']);
        match locator.rfind('.') {
            Some(dot) if separator.is_none_or(|separator| dot > separator) => Self {
                base: locator[..dot].to_string(),
                extension: locator[dot..].to_string(),
            },
            _ => Self {
                base: locator.to_string(),
                extension: String::new(),
            },
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn has_extension(&self) -> bool {
        !self.extension.is_empty()
    }

    /// Authored extension first, then fallbacks minus its case-insensitive duplicate.
    pub fn candidates(&self, fallback_extensions: &[String]) -> Vec<Candidate> {
        let original = self.has_extension().then_some(self.extension.as_str());
        let original_lower = self.extension.to_lowercase();

        original
            .into_iter()
            .chain(
                fallback_extensions
                    .iter()
                    .map(String::as_str)
                    .filter(|extension| extension.to_lowercase() != original_lower),
            )
            .map(|extension| Candidate {
                url: format!("{}{}", self.base, extension),
                extension: extension.to_string(),
            })
            .collect()
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.base, self.extension)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub url: String,
    pub extension: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedAttempt {
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found {
        resource: Candidate,
        failed_attempts: Vec<FailedAttempt>,
    },
    Exhausted {
        failed_attempts: Vec<FailedAttempt>,
    },
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    pub fn failed_attempts(&self) -> &[FailedAttempt] {
        match self {
            Self::Found {
                failed_attempts, ..
            }
            | Self::Exhausted { failed_attempts } => failed_attempts,
        }
    }
}

/// Probes `candidates` in order, stopping at the first success.
pub async fn resolve_candidates(
    probe: &dyn ImageProbe,
    candidates: Vec<Candidate>,
    timeout: Option<Duration>,
) -> Resolution {
    let mut failed_attempts = Vec::new();

    for candidate in candidates {
        tracing::debug!(candidate = %candidate.url, "attempting image candidate");
        match probe_once(probe, &candidate.url, timeout).await {
            Ok(()) => {
                return Resolution::Found {
                    resource: candidate,
                    failed_attempts,
                };
            }
            Err(err) => {
                tracing::debug!(candidate = %candidate.url, %err, "image candidate failed");
                failed_attempts.push(FailedAttempt {
                    url: candidate.url,
                    reason: err.to_string(),
                });
            }
        }
    }

    Resolution::Exhausted { failed_attempts }
}

async fn probe_once(probe: &dyn ImageProbe, url: &str, timeout: Option<Duration>) -> ProbeResult<()> {
    let Some(after) = timeout else {
        return probe.probe(url).await;
    };
    match tokio::time::timeout(after, probe.probe(url)).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::TimedOut {
            url: url.to_string(),
            after,
        }),
    }
}

/// Terminal outcome of one page's resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageResolution {
    Resolved { page: PageId, url: String },
    Failed { page: PageId, reason: FailureReason },
}

impl PageResolution {
    pub fn page(&self) -> &PageId {
        match self {
            Self::Resolved { page, .. } | Self::Failed { page, .. } => page,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    MissingLocator,
    Exhausted(Vec<FailedAttempt>),
    TaskAborted(String),
}

/// Resolves every unresolved page concurrently and mounts the winners.
///
/// Returns once each page has reached a terminal state; pages already
/// resolved or failed are left alone.
pub async fn resolve_pages(
    pages: &mut [Page],
    probe: Arc<dyn ImageProbe>,
    timeout: Option<Duration>,
) -> Vec<PageResolution> {
    let mut tasks = JoinSet::new();
    let mut outcomes = Vec::with_capacity(pages.len());

    for (slot, page) in pages.iter_mut().enumerate() {
        if page.resolution().is_terminal() {
            continue;
        }
        let Some(locator) = page.locator() else {
            tracing::warn!(page = %page.id(), "page has no image locator; surfacing without image");
            fail_page(page, FailureReason::MissingLocator, &mut outcomes);
            continue;
        };
        if !locator.has_extension() {
            tracing::warn!(page = %page.id(), locator = %locator, "locator has no extension; trying fallbacks only");
        }

        let candidates = locator.candidates(page.fallback_extensions());
        let probe = Arc::clone(&probe);
        tasks.spawn(async move {
            let resolution = resolve_candidates(probe.as_ref(), candidates, timeout).await;
            (slot, resolution)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((slot, resolution)) => apply_resolution(&mut pages[slot], resolution, &mut outcomes),
            Err(err) => tracing::error!(%err, "page resolution task did not complete"),
        }
    }

    for page in pages.iter_mut() {
        if !page.resolution().is_terminal() {
            fail_page(
                page,
                FailureReason::TaskAborted("resolution task did not complete".to_string()),
                &mut outcomes,
            );
        }
    }

    outcomes
}

fn apply_resolution(page: &mut Page, resolution: Resolution, outcomes: &mut Vec<PageResolution>) {
    match resolution {
        Resolution::Found {
            resource,
            failed_attempts,
        } => match page.mount_image(&resource.url) {
            Ok(_) => {
                tracing::debug!(
                    page = %page.id(),
                    url = %resource.url,
                    skipped = failed_attempts.len(),
                    "mounted page image"
                );
                outcomes.push(PageResolution::Resolved {
                    page: page.id().clone(),
                    url: resource.url,
                });
            }
            Err(err) => tracing::warn!(page = %page.id(), %err, "could not mount resolved image"),
        },
        Resolution::Exhausted { failed_attempts } => {
            tracing::error!(
                page = %page.id(),
                attempts = failed_attempts.len(),
                "every image candidate failed; surfacing page without image"
            );
            fail_page(page, FailureReason::Exhausted(failed_attempts), outcomes);
        }
    }
}

fn fail_page(page: &mut Page, reason: FailureReason, outcomes: &mut Vec<PageResolution>) {
    match page.mark_failed() {
        Ok(_) => outcomes.push(PageResolution::Failed {
            page: page.id().clone(),
            reason,
        }),
        Err(err) => tracing::warn!(page = %page.id(), %err, "could not mark page failed"),
    }
}
