//! Type Definition Store: registration, extension, and inheritance resolution.

pub mod def;
pub mod health;
pub mod resolve;
pub mod source;
pub mod store;


pub use def::{AttributeSpec, PlacementPattern, TypeDefinition, TypeExtension};
pub use health::HealthReport;
pub use resolve::ResolvedType;
pub use source::SchemaProvider;
pub use store::{TypeCatalog, TypeStore};
