//! # till-db: Database Layer for Till
//!
//! SQLite storage through sqlx, the typed repositories on top of it, and the
//! [`SalesProcessor`] façade that every caller uses.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Till Data Flow                                │
//! │                                                                         │
//! │  Caller (till screen, seed binary)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     till-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   SalesProcessor ── validation, audit, sale transaction         │   │
//! │  │        │                                                        │   │
//! │  │        ▼                                                        │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │◄───│ Customer      │    │  (embedded)  │  │   │
//! │  │   │ SqlitePool    │    │ Product Sale  │    │ 001_initial  │  │   │
//! │  │   │               │    │ Audit Report  │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (path from till.toml or TILL_DB_PATH)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per table
//! - [`processor`] - The sales processor
//! - [`config`] - `till.toml` and environment configuration
//!
//! ## Usage
//!
//! ```rust,ignore
//! use till_db::{AppConfig, SalesProcessor};
//! use till_core::SaleLineRequest;
//!
//! let processor = SalesProcessor::open(&AppConfig::load(None)?).await?;
//! let receipt = processor
//!     .process_sale(header, &[SaleLineRequest::new("P001", 2)])
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod processor;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{AppConfig, ConfigError};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use processor::{ErrorKind, ProcessorError, ProcessorResult, SalesProcessor};

pub use repository::{
    AuditLogRepository, CustomerRepository, ProductRepository, ReportRepository, SaleRepository,
};

use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber for binaries.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=till=trace` - Show trace for till crates only
/// - Default: `info,till=debug,sqlx=warn`
///
/// A second call is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,till=debug,sqlx=warn"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
