//! Services built on top of the data-access core.
//!
//! Currently this is backend construction from configuration.

mod backend_factory;

pub use backend_factory::{BackendFactory, DynBackend};
