// Varia Infrastructure - Render Backend Adapters
// Implements: RenderBackend + VariationStore (HTTP), ArtifactStore (filesystem)

mod fs_artifact_store;
mod http_backend;
mod variation_api;

pub use fs_artifact_store::FsArtifactStore;
pub use http_backend::HttpRenderBackend;
pub use variation_api::HttpVariationStore;
