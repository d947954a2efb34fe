pub mod configuration;

pub use configuration::{ResolverConfig, ResolverError};
