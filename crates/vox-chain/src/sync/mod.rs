//! Chain synchronization and fork resolution.

pub mod conflict_resolver;
pub mod synchronizer;
