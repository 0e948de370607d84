pub mod normalizer;
pub mod provider_catalog;

pub use normalizer::{normalize, normalize_generic, try_normalize, NormalizeError};
pub use provider_catalog::{ProviderCatalog, ProviderDescriptor, ProviderKind};
