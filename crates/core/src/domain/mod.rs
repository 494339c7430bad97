// Domain Layer - Pure business logic and entities

pub mod combination;
pub mod element;
pub mod error;
pub mod job;
pub mod variation;

// Re-exports
pub use combination::{Combination, Selection};
pub use element::{
    Descriptor, ElementId, ElementKind, ElementNode, FontSpec, NodeContent, Template,
    TemplateNode, TimeWindow, VariationValue,
};
pub use error::DomainError;
pub use job::{ExternalJobId, JobId, JobStatus, RenderJob};
pub use variation::{Axis, Variation, VariationId, SPEED_ELEMENT_ID};
