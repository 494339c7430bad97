// Filesystem Artifact Store
// Writes fetched render artifacts into a flat output directory

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;
use varia_core::domain::JobId;
use varia_core::error::Result;
use varia_core::port::ArtifactStore;

/// Stores artifacts as files under a single output directory.
///
/// Filenames are resolved upstream by the naming module; this store only
/// guards against path traversal in case a name slipped through unsanitized.
pub struct FsArtifactStore {
    output_dir: PathBuf,
}

impl FsArtifactStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Strip directory components so names cannot escape the output dir
    fn safe_name(file_name: &str) -> String {
        file_name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(file_name)
            .to_string()
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn save(&self, job_id: &JobId, file_name: &str, bytes: &[u8]) -> Result<String> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let path = self.output_dir.join(Self::safe_name(file_name));
        tokio::fs::write(&path, bytes).await?;

        info!(
            job_id = %job_id,
            path = %path.display(),
            size = bytes.len(),
            "Artifact saved"
        );

        Ok(path.to_string_lossy().into_owned())
    }
}
