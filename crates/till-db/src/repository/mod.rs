//! # Repository Module
//!
//! SQL for each table, one repository per entity.
//!
//! ```text
//! SalesProcessor
//!      │   db.products().get_by_code("P001")
//!      ▼
//! ProductRepository ──► SQLite
//! ```
//!
//! Repositories own a clone of the pool and run each call on whichever
//! connection the pool hands out. Operations that must join a caller's
//! transaction (stock decrement, sale insert, audit entry) are also exposed
//! as free functions taking `&mut SqliteConnection`.
//!
//! ## Available Repositories
//!
//! - [`CustomerRepository`] - Customer CRUD and name search
//! - [`ProductRepository`] - Catalog CRUD, lookup by code, stock
//! - [`SaleRepository`] - Sale headers and lines
//! - [`AuditLogRepository`] - Activity log
//! - [`ReportRepository`] - Growth series and rankings

pub mod audit;
pub mod customer;
pub mod product;
pub mod report;
pub mod sale;

pub use audit::AuditLogRepository;
pub use customer::CustomerRepository;
pub use product::ProductRepository;
pub use report::ReportRepository;
pub use sale::SaleRepository;
