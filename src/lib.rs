//! # Media Catalog
//!
//! An incremental catalog for large, growing directories of images, video
//! and audio.
//!
//! ## Core Philosophy
//! - **Rescans are cheap** - unchanged files cost one stat comparison
//! - **Nothing is lost** - vanished files are soft-deleted, tags survive
//! - **Never block the caller** - decoding happens on background workers
//!
//! ## Architecture
//! The library is split into a core engine (UI-agnostic) and thin consumers:
//! - `core` - Fingerprinting, catalog, scanner, thumbnail cache, watcher
//! - `events` - Typed change notification over channels
//! - `error` - Error taxonomy
//! - `config` - Persisted user settings

pub mod config;
pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{CatalogError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point. Filtering comes
/// from `RUST_LOG`. A subscriber installed earlier is left in place.
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
