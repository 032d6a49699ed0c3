//! # till-core: Pure Business Logic for Till
//!
//! Everything that can be decided without touching the database lives here:
//! domain types, money arithmetic, cart bookkeeping, checkout pricing and the
//! math behind the sales reports.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Till Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              till-db (SalesProcessor, repositories)             │   │
//! │  │   create_client, create_product, process_sale, reports, ...     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                ★ till-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ │   │
//! │  │   │  types  │ │  money  │ │  cart   │ │ pricing │ │ report  │ │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • PURE FUNCTIONS                         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Customers, products, sales, sale lines, audit entries
//! - [`money`] - Integer-cent money type
//! - [`cart`] - In-memory cart held by the till before checkout
//! - [`pricing`] - Tax, discount, installments and change
//! - [`report`] - Cumulative series and date ranges for the charts
//! - [`validation`] - Input rules shared by every write path
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use till_core::money::Money;
//! use till_core::types::TaxRate;
//!
//! let price = Money::from_cents(120_000); // 1200.00
//! let tax = price.calculate_tax(TaxRate::from_bps(500)); // 5%
//! assert_eq!(tax.cents(), 6_000);
//! ```

pub mod cart;
pub mod error;
pub mod money;
pub mod pricing;
pub mod report;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLine};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use pricing::{Quote, SaleTerms};
pub use report::{CumulativePoint, DateRange, Granularity};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity on a single cart or sale line.
///
/// Guards against typing 1000 instead of 10.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Largest installment count accepted at checkout.
pub const MAX_INSTALLMENTS: u32 = 24;
