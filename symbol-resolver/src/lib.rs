//! Symbol Resolver - decoding of symbolic setting values
//!
//! Settings-catalog choice values are opaque references such as
//! `vendor_defender_rtp_1`. This crate turns them into human-meaningful values:
//! - Trait-based definition catalogs (live HTTP, offline, mock)
//! - A process-wide decoder cache with expiry and lookup timeouts
//! - Soft failure: an unavailable catalog yields no decoding, never an error
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            SymbolDecoder                │
//! │  (TTL cache keyed by definition id)     │
//! └────────────────┬────────────────────────┘
//!                  │ miss
//!                  ▼
//! ┌─────────────────────────────────────────┐
//! │          SymbolResolver                 │
//! │  (Http / Offline / Mock)                │
//! └─────────────────────────────────────────┘
//! ```

pub mod decoder;
pub mod resolver;

// Re-export main types for convenience
pub use decoder::{CacheStats, SymbolDecoder};
pub use resolver::{
    CatalogDefinition, DecodedSymbol, DefinitionOption, HttpSymbolResolver, MockSymbolResolver,
    OfflineSymbolResolver, ResolveError, SymbolResolver,
};
pub use settings_core::catalog::is_symbolic_reference;
