// Application Layer - Use Cases and Business Logic

pub mod axes;
pub mod combinations;
pub mod naming;
pub mod projector;
pub mod queue;
pub mod recovery;

// Re-exports
pub use axes::AxisService;
pub use combinations::{combination_count, generate_combinations, validate_axes};
pub use naming::{resolve_name, MarkerStyle, NamingConfig};
pub use projector::project;
pub use queue::{QueueConfig, RenderQueue};
