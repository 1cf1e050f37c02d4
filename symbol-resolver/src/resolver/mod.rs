//! Definition catalog abstraction layer.
//!
//! Provides a trait-based interface over the service that describes setting
//! definitions:
//! - Live HTTP catalog
//! - Offline convention-based decoding
//! - Mock resolver for testing

pub mod http;
pub mod mock;
pub mod offline;
pub mod traits;

pub use http::HttpSymbolResolver;
pub use mock::MockSymbolResolver;
pub use offline::OfflineSymbolResolver;
pub use traits::{CatalogDefinition, DecodedSymbol, DefinitionOption, ResolveError, SymbolResolver};
