// Port Layer - Interfaces for external dependencies

pub mod artifact_store;
pub mod id_provider; // For deterministic testing
pub mod job_repository;
pub mod render_backend;
pub mod time_provider;
pub mod variation_store;

// Re-exports
pub use artifact_store::ArtifactStore;
pub use id_provider::IdProvider;
pub use job_repository::JobRepository;
pub use render_backend::{RenderBackend, RenderBackendError, RenderState, RenderStatus};
pub use time_provider::TimeProvider;
pub use variation_store::{AxisRecord, VariationStore};
