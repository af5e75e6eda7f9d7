use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use super::{ImageProbe, ProbeError, ProbeResult};

const FILE_SCHEME: &str = "file://";
const SNIFF_BYTES: u64 = 64;

/// Probes candidates on the local filesystem, relative to the document directory.
///
/// A candidate loads when the file exists and its leading bytes carry a known
/// image signature. Pixel data is never decoded.
#[derive(Debug, Clone)]
pub struct FsImageProbe {
    root: PathBuf,
}

impl FsImageProbe {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, url: &str) -> PathBuf {
        let path = Path::new(url.strip_prefix(FILE_SCHEME).unwrap_or(url));
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[async_trait]
impl ImageProbe for FsImageProbe {
    async fn probe(&self, url: &str) -> ProbeResult<()> {
        let path = self.path_for(url);
        let io_error = |source: io::Error| {
            if source.kind() == io::ErrorKind::NotFound {
                ProbeError::NotFound {
                    url: url.to_string(),
                }
            } else {
                ProbeError::Io {
                    url: url.to_string(),
                    source,
                }
            }
        };

        let file = tokio::fs::File::open(&path).await.map_err(io_error)?;
        let mut header = Vec::with_capacity(SNIFF_BYTES as usize);
        file.take(SNIFF_BYTES)
            .read_to_end(&mut header)
            .await
            .map_err(io_error)?;

        match image::guess_format(&header) {
            Ok(format) => {
                tracing::debug!(path = %path.display(), ?format, "candidate sniffed as image");
                Ok(())
            }
            Err(_) => Err(ProbeError::NotAnImage {
                url: url.to_string(),
            }),
        }
    }
}
