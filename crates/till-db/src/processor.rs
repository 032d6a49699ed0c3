//! # Sales Processor
//!
//! The façade every caller goes through: customers, catalog, sales, the
//! activity log and the reports. Validates input, talks to the repositories
//! and records an audit entry for every change.
//!
//! ## Recording a Sale
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  process_sale(header, lines)                                            │
//! │                                                                         │
//! │  1. Validate      header rates, quantities, customer exists             │
//! │  2. Sum           P001 × 3 + P001 × 3  →  P001: 6                       │
//! │                                                                         │
//! │  ┌──────────────── one IMMEDIATE transaction ────────────────────────┐  │
//! │  │ 3. Check      summed request ≤ stock, per product                 │  │
//! │  │ 4. Header     INSERT INTO Sales                                   │  │
//! │  │ 5. Lines      per line: conditional stock decrement + INSERT      │  │
//! │  │ 6. Audit      INSERT INTO AuditLog                                │  │
//! │  │ 7. COMMIT                                                         │  │
//! │  └───────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  Insufficient stock or unknown code at 3/5 → rollback, nothing written  │
//! │  Database failure anywhere in the box     → rollback, SaleNotRecorded   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Local, NaiveDate};
use serde::Serialize;
use sqlx::SqliteConnection;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, ConfigError, ReportSettings, StoreSettings};
use crate::error::DbError;
use crate::pool::Database;
use crate::repository::{audit, product, sale};
use till_core::cart::sum_by_code;
use till_core::report::{accumulate, Metric};
use till_core::validation::{
    clamp_installments, validate_name, validate_new_customer, validate_new_product,
    validate_price_cents, validate_product_code, validate_quantity, validate_rate_bps,
    validate_search_query, validate_stock,
};
use till_core::{
    AuditEntry, Cart, CoreError, CumulativePoint, Customer, CustomerUpdate, DateRange,
    Granularity, NewCustomer, NewProduct, NewSale, Product, ProductSales, ProductUpdate, Quote,
    Sale, SaleFilter, SaleLine, SaleLineRequest, SaleLineUpdate, SaleReceipt, SaleTerms,
    SaleUpdate, ValidationError,
};

// =============================================================================
// Errors
// =============================================================================

/// Broad class of a [`ProcessorError`], for callers that only need to
/// decide how to present it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Bad input; nothing was written.
    Validation,
    NotFound,
    /// Sale rejected; nothing was written.
    InsufficientStock,
    /// The database failed.
    Persistence,
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),

    /// The sale transaction failed and was rolled back.
    #[error("Sale was not recorded: {source}")]
    SaleNotRecorded {
        #[source]
        source: DbError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<ValidationError> for ProcessorError {
    fn from(err: ValidationError) -> Self {
        ProcessorError::Core(CoreError::Validation(err))
    }
}

impl ProcessorError {
    fn not_recorded(source: impl Into<DbError>) -> Self {
        ProcessorError::SaleNotRecorded {
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessorError::Core(
                CoreError::ProductNotFound(_)
                | CoreError::CustomerNotFound(_)
                | CoreError::SaleNotFound(_),
            ) => ErrorKind::NotFound,
            ProcessorError::Core(CoreError::InsufficientStock { .. }) => {
                ErrorKind::InsufficientStock
            }
            ProcessorError::Core(_) => ErrorKind::Validation,
            ProcessorError::Db(DbError::NotFound { .. }) => ErrorKind::NotFound,
            ProcessorError::Db(DbError::UniqueViolation { .. }) => ErrorKind::Validation,
            ProcessorError::Db(_) | ProcessorError::SaleNotRecorded { .. } => {
                ErrorKind::Persistence
            }
            ProcessorError::Config(_) => ErrorKind::Validation,
        }
    }
}

pub type ProcessorResult<T> = Result<T, ProcessorError>;

// =============================================================================
// Processor
// =============================================================================

#[derive(Debug, Clone)]
pub struct SalesProcessor {
    db: Database,
    store: StoreSettings,
    reports: ReportSettings,
}

impl SalesProcessor {
    pub fn new(db: Database) -> Self {
        SalesProcessor {
            db,
            store: StoreSettings::default(),
            reports: ReportSettings::default(),
        }
    }

    /// Opens the configured database and applies migrations.
    pub async fn open(config: &AppConfig) -> ProcessorResult<Self> {
        config.validate()?;
        let db = Database::new(config.db_config()).await?;
        Ok(SalesProcessor {
            db,
            store: config.store.clone(),
            reports: config.reports.clone(),
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn store(&self) -> &StoreSettings {
        &self.store
    }

    /// Terms a new checkout starts from: cash, with the store's default tax rate.
    pub fn default_terms(&self) -> SaleTerms {
        SaleTerms::cash().tax_rate(self.store.default_tax_rate())
    }

    /// Audit failures are logged; the change they describe is already committed.
    async fn audit(&self, operation: &str, details: impl Serialize) {
        let details = match serde_json::to_value(details) {
            Ok(details) => details,
            Err(e) => {
                error!(operation, error = %e, "Failed to serialize audit details");
                serde_json::Value::Null
            }
        };
        if let Err(e) = self.db.audit_log().record(operation, &details).await {
            error!(operation, error = %e, "Failed to record audit entry");
        }
    }

    // =========================================================================
    // Customers
    // =========================================================================

    pub async fn create_client(&self, customer: &NewCustomer) -> ProcessorResult<Customer> {
        validate_new_customer(customer)?;

        let customer = self.db.customers().insert(customer).await?;
        info!(id = customer.id, name = %customer.name, "Customer created");
        self.audit("customer.created", &customer).await;
        Ok(customer)
    }

    pub async fn update_client(&self, id: i64, update: &CustomerUpdate) -> ProcessorResult<Customer> {
        if let Some(name) = &update.name {
            validate_name("name", name)?;
        }

        let customer = self.db.customers().update(id, update).await?;
        self.audit("customer.updated", &customer).await;
        Ok(customer)
    }

    pub async fn delete_client(&self, id: i64) -> ProcessorResult<()> {
        self.db.customers().delete(id).await?;
        info!(id, "Customer deleted");
        self.audit("customer.deleted", serde_json::json!({ "id": id })).await;
        Ok(())
    }

    /// Customers whose name contains `name`; an empty name lists everyone.
    pub async fn search_client(&self, name: &str) -> ProcessorResult<Vec<Customer>> {
        let query = validate_search_query(name)?;
        let repo = self.db.customers();

        let customers = if query.is_empty() {
            repo.list_all().await?
        } else {
            repo.search_by_name(&query).await?
        };
        Ok(customers)
    }

    pub async fn search_client_id(&self, id: i64) -> ProcessorResult<Customer> {
        self.db
            .customers()
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::CustomerNotFound(id).into())
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Adds a product to the catalog.
    ///
    /// A code already in use is rejected before the insert; the UNIQUE
    /// constraint catches whatever slips past the check.
    pub async fn create_product(&self, product: &NewProduct) -> ProcessorResult<Product> {
        validate_new_product(product)?;

        let repo = self.db.products();
        if repo.get_by_code(&product.code).await?.is_some() {
            warn!(code = %product.code, "Rejected duplicate product code");
            return Err(ValidationError::duplicate("code", product.code.trim()).into());
        }

        let product = repo.insert(product).await?;
        info!(id = product.id, code = %product.code, "Product created");
        self.audit("product.created", &product).await;
        Ok(product)
    }

    pub async fn update_product(&self, id: i64, update: &ProductUpdate) -> ProcessorResult<Product> {
        if let Some(name) = &update.name {
            validate_name("name", name)?;
        }
        if let Some(cents) = update.purchase_price_cents {
            validate_price_cents("purchase_price", cents)?;
        }
        if let Some(cents) = update.sale_price_cents {
            validate_price_cents("sale_price", cents)?;
        }
        if let Some(stock) = update.stock {
            validate_stock(stock)?;
        }

        let repo = self.db.products();
        if let Some(code) = &update.code {
            validate_product_code(code)?;
            if let Some(existing) = repo.get_by_code(code).await? {
                if existing.id != id {
                    return Err(ValidationError::duplicate("code", code.trim()).into());
                }
            }
        }

        let product = repo.update(id, update).await?;
        self.audit("product.updated", &product).await;
        Ok(product)
    }

    pub async fn delete_product(&self, id: i64) -> ProcessorResult<()> {
        self.db.products().delete(id).await?;
        info!(id, "Product deleted");
        self.audit("product.deleted", serde_json::json!({ "id": id })).await;
        Ok(())
    }

    pub async fn search_product(&self, code: &str) -> ProcessorResult<Product> {
        self.db
            .products()
            .get_by_code(code)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(code.trim().to_string()).into())
    }

    pub async fn search_product_id(&self, id: i64) -> ProcessorResult<Product> {
        self.db
            .products()
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id).into())
    }

    pub async fn filter_product_name(&self, name: &str) -> ProcessorResult<Vec<Product>> {
        let query = validate_search_query(name)?;
        let repo = self.db.products();

        let products = if query.is_empty() {
            repo.list_all().await?
        } else {
            repo.search_by_name(&query).await?
        };
        Ok(products)
    }

    /// Stock lookup for the inventory screen.
    ///
    /// The exact code match comes first, then name matches, without
    /// duplicates. With both inputs empty every product is returned.
    pub async fn search_stock(&self, code: &str, name: &str) -> ProcessorResult<Vec<Product>> {
        let code = validate_search_query(code)?;
        let name = validate_search_query(name)?;
        let repo = self.db.products();

        if code.is_empty() && name.is_empty() {
            return Ok(repo.list_all().await?);
        }

        let mut found = Vec::new();
        if !code.is_empty() {
            found.extend(repo.get_by_code(&code).await?);
        }
        if !name.is_empty() {
            for product in repo.search_by_name(&name).await? {
                if !found.iter().any(|p: &Product| p.id == product.id) {
                    found.push(product);
                }
            }
        }
        Ok(found)
    }

    /// `true` when `code` exists with at least `quantity` units in stock.
    pub async fn check_stock(&self, code: &str, quantity: i64) -> ProcessorResult<bool> {
        let product = self.db.products().get_by_code(code).await?;
        Ok(product.is_some_and(|p| p.can_sell(quantity)))
    }

    // =========================================================================
    // Sales
    // =========================================================================

    /// Records a sale and its lines, decrementing stock.
    ///
    /// All or nothing: on any error no header, line, stock change or audit
    /// entry is left behind.
    pub async fn process_sale(
        &self,
        header: NewSale,
        lines: &[SaleLineRequest],
    ) -> ProcessorResult<SaleReceipt> {
        match self.record_sale(header, lines).await {
            Ok(receipt) => {
                info!(
                    sale_id = receipt.sale.id,
                    total_cents = receipt.sale.total_cents,
                    lines = receipt.lines.len(),
                    "Sale recorded"
                );
                Ok(receipt)
            }
            Err(e) if e.kind() == ErrorKind::Persistence => {
                error!(error = %e, "Sale not recorded");
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "Sale rejected");
                Err(e)
            }
        }
    }

    async fn record_sale(
        &self,
        mut header: NewSale,
        lines: &[SaleLineRequest],
    ) -> ProcessorResult<SaleReceipt> {
        if lines.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }
        for line in lines {
            validate_quantity(line.quantity)?;
        }
        validate_price_cents("total", header.total_cents)?;
        validate_rate_bps("tax_rate", header.tax_rate_bps)?;
        validate_rate_bps("discount", header.discount_bps)?;
        header.installments = i64::from(clamp_installments(header.installments));

        if self.db.customers().get_by_id(header.customer_id).await?.is_none() {
            return Err(CoreError::CustomerNotFound(header.customer_id).into());
        }

        let requested = sum_by_code(lines);
        debug!(products = requested.len(), "Validating stock for sale");

        // IMMEDIATE takes the write lock before the stock reads, so overlapping
        // sales queue on the busy timeout instead of failing the lock upgrade.
        let mut tx = self
            .db
            .pool()
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(ProcessorError::not_recorded)?;

        let mut products: HashMap<String, Product> = HashMap::with_capacity(requested.len());
        for (code, quantity) in &requested {
            let product = product::fetch_by_code(&mut tx, code)
                .await
                .map_err(ProcessorError::not_recorded)?
                .ok_or_else(|| CoreError::ProductNotFound(code.clone()))?;

            if !product.can_sell(*quantity) {
                return Err(CoreError::InsufficientStock {
                    code: code.clone(),
                    available: product.stock,
                    requested: *quantity,
                }
                .into());
            }
            products.insert(code.clone(), product);
        }

        let sale_id = sale::insert_header(&mut tx, &header)
            .await
            .map_err(ProcessorError::not_recorded)?;

        let mut recorded = Vec::with_capacity(lines.len());
        for line in lines {
            let code = line.code.trim();
            let Some(product) = products.get(code) else {
                return Err(CoreError::ProductNotFound(code.to_string()).into());
            };

            let taken = product::decrement_stock(&mut tx, product.id, line.quantity)
                .await
                .map_err(ProcessorError::not_recorded)?;
            // Guard lost to a concurrent writer between the check and here.
            if !taken {
                return Err(CoreError::InsufficientStock {
                    code: product.code.clone(),
                    available: product.stock,
                    requested: line.quantity,
                }
                .into());
            }

            let line = sale::insert_line(&mut tx, sale_id, product.id, line.quantity)
                .await
                .map_err(ProcessorError::not_recorded)?;
            recorded.push(line);
        }

        let sale = load_sale(&mut tx, sale_id).await?;
        let details = serde_json::json!({
            "sale_id": sale.id,
            "customer_id": sale.customer_id,
            "total_cents": sale.total_cents,
            "lines": recorded.len(),
        });
        audit::record_in(&mut tx, "sale.recorded", &details)
            .await
            .map_err(ProcessorError::not_recorded)?;

        tx.commit().await.map_err(ProcessorError::not_recorded)?;

        Ok(SaleReceipt {
            sale,
            lines: recorded,
        })
    }

    /// Prices `cart` with `terms` and records it as today's sale.
    pub async fn checkout(
        &self,
        customer_id: i64,
        cart: &Cart,
        terms: &SaleTerms,
    ) -> ProcessorResult<SaleReceipt> {
        if cart.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        let quote = Quote::compute(cart.subtotal(), cart.purchase_cost(), terms)?;
        debug!(
            subtotal = %quote.subtotal,
            total = %quote.total,
            installments = quote.terms.installments,
            "Checkout priced"
        );

        let header = quote.to_new_sale(customer_id, today());
        self.process_sale(header, &cart.to_line_requests()).await
    }

    /// One sale when `id` is set, every sale otherwise.
    ///
    /// An `id` that matches nothing is [`CoreError::SaleNotFound`].
    pub async fn search_sale(&self, id: Option<i64>) -> ProcessorResult<Vec<Sale>> {
        let filter = SaleFilter {
            sale_id: id,
            ..Default::default()
        };
        let sales = self.filter_sales(&filter).await?;
        match id {
            Some(id) if sales.is_empty() => Err(CoreError::SaleNotFound(id).into()),
            _ => Ok(sales),
        }
    }

    pub async fn filter_sales(&self, filter: &SaleFilter) -> ProcessorResult<Vec<Sale>> {
        Ok(self.db.sales().filter(filter).await?)
    }

    /// Corrects a recorded sale. Stock is not touched.
    pub async fn update_sale(&self, id: i64, update: &SaleUpdate) -> ProcessorResult<Sale> {
        let mut update = update.clone();
        update.installments = update
            .installments
            .map(|n| i64::from(clamp_installments(n)));
        if let Some(bps) = update.tax_rate_bps {
            validate_rate_bps("tax_rate", bps)?;
        }
        if let Some(bps) = update.discount_bps {
            validate_rate_bps("discount", bps)?;
        }
        if let Some(cents) = update.total_cents {
            validate_price_cents("total", cents)?;
        }

        let sale = self.db.sales().update(id, &update).await?;
        self.audit("sale.updated", &sale).await;
        Ok(sale)
    }

    /// Deletes a sale and its lines. Stock is not restored.
    pub async fn delete_sale(&self, id: i64) -> ProcessorResult<()> {
        let lines = self.db.sales().delete(id).await?;
        info!(id, lines, "Sale deleted");
        self.audit("sale.deleted", serde_json::json!({ "id": id, "lines": lines }))
            .await;
        Ok(())
    }

    /// Lines of one sale when `sale_id` is set, every line otherwise.
    pub async fn search_sales_product(&self, sale_id: Option<i64>) -> ProcessorResult<Vec<SaleLine>> {
        let repo = self.db.sales();
        let lines = match sale_id {
            Some(id) => repo.lines_for_sale(id).await?,
            None => repo.list_lines().await?,
        };
        Ok(lines)
    }

    pub async fn update_sale_line(&self, id: i64, update: &SaleLineUpdate) -> ProcessorResult<SaleLine> {
        if let Some(quantity) = update.quantity {
            validate_quantity(quantity)?;
        }

        let line = self.db.sales().update_line(id, update).await?;
        self.audit("sale_line.updated", &line).await;
        Ok(line)
    }

    pub async fn delete_sale_line(&self, id: i64) -> ProcessorResult<()> {
        self.db.sales().delete_line(id).await?;
        self.audit("sale_line.deleted", serde_json::json!({ "id": id })).await;
        Ok(())
    }

    // =========================================================================
    // Audit Log
    // =========================================================================

    pub async fn search_log(&self) -> ProcessorResult<Vec<AuditEntry>> {
        Ok(self.db.audit_log().list_all().await?)
    }

    /// Entries recorded between `from` and `to`, both inclusive.
    pub async fn filter_log(&self, from: NaiveDate, to: NaiveDate) -> ProcessorResult<Vec<AuditEntry>> {
        let range = DateRange::new(from, to)?;
        Ok(self.db.audit_log().filter_by_range(&range).await?)
    }

    // =========================================================================
    // Reports
    // =========================================================================

    /// Cumulative revenue per day or month.
    pub async fn sales_growth(
        &self,
        range: Option<DateRange>,
        granularity: Granularity,
    ) -> ProcessorResult<Vec<CumulativePoint>> {
        self.growth(range, granularity, Metric::Revenue).await
    }

    /// Cumulative profit per day or month.
    pub async fn profit_growth(
        &self,
        range: Option<DateRange>,
        granularity: Granularity,
    ) -> ProcessorResult<Vec<CumulativePoint>> {
        self.growth(range, granularity, Metric::Profit).await
    }

    async fn growth(
        &self,
        range: Option<DateRange>,
        granularity: Granularity,
        metric: Metric,
    ) -> ProcessorResult<Vec<CumulativePoint>> {
        let totals = self
            .db
            .reports()
            .period_totals(range.as_ref(), granularity, metric)
            .await?;
        Ok(accumulate(&totals))
    }

    /// Best sellers by units; `limit` defaults to the configured top-products limit.
    pub async fn top_products(
        &self,
        range: Option<DateRange>,
        limit: Option<u32>,
    ) -> ProcessorResult<Vec<ProductSales>> {
        let limit = limit.unwrap_or(self.reports.top_products_limit);
        Ok(self.db.reports().top_products(range.as_ref(), limit).await?)
    }

    /// Products holding the most stock.
    pub async fn top_stock(&self, limit: Option<u32>) -> ProcessorResult<Vec<Product>> {
        let limit = limit.unwrap_or(self.reports.top_stock_limit);
        Ok(self.db.products().top_by_stock(limit).await?)
    }
}

async fn load_sale(conn: &mut SqliteConnection, id: i64) -> ProcessorResult<Sale> {
    sale::fetch_sale(conn, id)
        .await
        .map_err(ProcessorError::not_recorded)?
        .ok_or_else(|| ProcessorError::not_recorded(DbError::not_found("Sale", id)))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbConfig;
    use till_core::{PaymentMethod, TaxRate};

    async fn setup() -> SalesProcessor {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        SalesProcessor::new(db)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn laptop() -> NewProduct {
        NewProduct {
            name: "Laptop".to_string(),
            code: "P001".to_string(),
            description: None,
            purchase_price_cents: 100_000,
            sale_price_cents: 120_000,
            stock: 10,
        }
    }

    fn mouse() -> NewProduct {
        NewProduct {
            name: "Mouse".to_string(),
            code: "P002".to_string(),
            description: None,
            purchase_price_cents: 2_000,
            sale_price_cents: 3_000,
            stock: 50,
        }
    }

    fn header(customer_id: i64, sale_date: NaiveDate) -> NewSale {
        NewSale {
            customer_id,
            total_cents: 720_000,
            profit_cents: 120_000,
            installments: 1,
            payment_method: PaymentMethod::Cash,
            tax_rate_bps: 0,
            discount_bps: 0,
            sale_date,
        }
    }

    async fn seeded() -> (SalesProcessor, Customer) {
        let processor = setup().await;
        let customer = processor
            .create_client(&NewCustomer::named("John Doe"))
            .await
            .unwrap();
        processor.create_product(&laptop()).await.unwrap();
        processor.create_product(&mouse()).await.unwrap();
        (processor, customer)
    }

    #[tokio::test]
    async fn test_duplicate_code_is_rejected() {
        let processor = setup().await;
        processor.create_product(&laptop()).await.unwrap();

        let err = processor
            .create_product(&NewProduct {
                name: "Other".to_string(),
                ..laptop()
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(matches!(
            err,
            ProcessorError::Core(CoreError::Validation(ValidationError::Duplicate { .. }))
        ));
        assert_eq!(processor.database().products().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_lines_are_summed() {
        let (processor, customer) = seeded().await;

        let receipt = processor
            .process_sale(
                header(customer.id, date(2024, 5, 1)),
                &[SaleLineRequest::new("P001", 3), SaleLineRequest::new("P001", 3)],
            )
            .await
            .unwrap();

        assert_eq!(receipt.lines.len(), 2);
        assert!(receipt.lines.iter().all(|l| l.sale_id == receipt.sale.id));
        assert_eq!(processor.search_product("P001").await.unwrap().stock, 4);
    }

    #[tokio::test]
    async fn test_oversell_rejects_whole_sale() {
        let (processor, customer) = seeded().await;

        let err = processor
            .process_sale(
                header(customer.id, date(2024, 5, 1)),
                &[
                    SaleLineRequest::new("P002", 1),
                    SaleLineRequest::new("P001", 8),
                    SaleLineRequest::new("P001", 5),
                ],
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert!(matches!(
            err,
            ProcessorError::Core(CoreError::InsufficientStock { ref code, available: 10, requested: 13 })
                if code == "P001"
        ));

        assert_eq!(processor.search_product("P001").await.unwrap().stock, 10);
        assert_eq!(processor.search_product("P002").await.unwrap().stock, 50);
        assert!(processor.search_sale(None).await.unwrap().is_empty());
        assert!(processor.search_sales_product(None).await.unwrap().is_empty());

        let log = processor.search_log().await.unwrap();
        assert!(log.iter().all(|e| e.operation != "sale.recorded"));
    }

    #[tokio::test]
    async fn test_sale_rejections() {
        let (processor, customer) = seeded().await;
        let day = date(2024, 5, 1);

        let err = processor
            .process_sale(header(customer.id, day), &[SaleLineRequest::new("P999", 1)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = processor
            .process_sale(header(999, day), &[SaleLineRequest::new("P001", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessorError::Core(CoreError::CustomerNotFound(999))));

        let err = processor
            .process_sale(header(customer.id, day), &[SaleLineRequest::new("P001", 0)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = processor.process_sale(header(customer.id, day), &[]).await.unwrap_err();
        assert!(matches!(err, ProcessorError::Core(CoreError::EmptyCart)));

        assert_eq!(processor.search_product("P001").await.unwrap().stock, 10);
    }

    #[tokio::test]
    async fn test_failed_line_rolls_back_sale() {
        let (processor, customer) = seeded().await;
        let mouse = processor.search_product("P002").await.unwrap();
        sqlx::query(&format!(
            "CREATE TRIGGER reject_mouse_line BEFORE INSERT ON SalesProduct \
             WHEN NEW.product_id = {} BEGIN SELECT RAISE(ABORT, 'line rejected'); END",
            mouse.id
        ))
        .execute(processor.database().pool())
        .await
        .unwrap();

        let err = processor
            .process_sale(
                header(customer.id, date(2024, 5, 1)),
                &[SaleLineRequest::new("P001", 3), SaleLineRequest::new("P002", 1)],
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(matches!(err, ProcessorError::SaleNotRecorded { .. }));

        assert_eq!(processor.search_product("P001").await.unwrap().stock, 10);
        assert_eq!(processor.search_product("P002").await.unwrap().stock, 50);
        assert_eq!(processor.database().sales().count().await.unwrap(), 0);
        assert!(processor.search_sales_product(None).await.unwrap().is_empty());

        let log = processor.search_log().await.unwrap();
        assert!(log.iter().all(|e| e.operation != "sale.recorded"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_on_file_database() {
        let path = std::env::temp_dir().join(format!("till-concurrent-{}.db", std::process::id()));
        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        let processor = SalesProcessor::new(db);

        let customer = processor
            .create_client(&NewCustomer::named("John Doe"))
            .await
            .unwrap();
        processor
            .create_product(&NewProduct {
                stock: 100,
                ..mouse()
            })
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let processor = processor.clone();
            let mut sale = header(customer.id, date(2024, 5, 1));
            sale.total_cents = 3_000;
            sale.profit_cents = 1_000;
            handles.push(tokio::spawn(async move {
                processor
                    .process_sale(sale, &[SaleLineRequest::new("P002", 1)])
                    .await
            }));
        }

        let mut failures = Vec::new();
        for handle in handles {
            if let Err(e) = handle.await.unwrap() {
                failures.push(e.to_string());
            }
        }

        let stock = processor.search_product("P002").await.unwrap().stock;
        let sales = processor.database().sales().count().await.unwrap();

        processor.database().close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }

        assert!(failures.is_empty(), "sales failed: {:?}", failures);
        assert_eq!(stock, 92);
        assert_eq!(sales, 8);
    }

    #[tokio::test]
    async fn test_installments_clamped() {
        let (processor, customer) = seeded().await;
        let mut sale = header(customer.id, date(2024, 5, 1));
        sale.installments = 0;

        let receipt = processor
            .process_sale(sale, &[SaleLineRequest::new("P002", 1)])
            .await
            .unwrap();
        assert_eq!(receipt.sale.installments, 1);

        let updated = processor
            .update_sale(
                receipt.sale.id,
                &SaleUpdate {
                    installments: Some(-4),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.installments, 1);
    }

    #[tokio::test]
    async fn test_checkout_prices_cart() {
        let (processor, customer) = seeded().await;
        let laptop = processor.search_product("P001").await.unwrap();

        let mut cart = Cart::new();
        cart.add(&laptop, 1).unwrap();
        let terms = SaleTerms::with_method(PaymentMethod::CreditCard)
            .installments(3)
            .tax_rate(TaxRate::from_bps(500))
            .discount_bps(1_000);

        let receipt = processor.checkout(customer.id, &cart, &terms).await.unwrap();

        assert_eq!(receipt.sale.total_cents, 113_400);
        assert_eq!(receipt.sale.profit_cents, 13_400);
        assert_eq!(receipt.sale.installments, 3);
        assert_eq!(receipt.sale.payment_method, PaymentMethod::CreditCard);
        assert_eq!(receipt.sale.sale_date, today());
        assert_eq!(processor.search_product("P001").await.unwrap().stock, 9);

        let empty = processor.checkout(customer.id, &Cart::new(), &terms).await;
        assert!(matches!(empty, Err(ProcessorError::Core(CoreError::EmptyCart))));
    }

    #[tokio::test]
    async fn test_delete_sale_cascades_lines() {
        let (processor, customer) = seeded().await;
        let receipt = processor
            .process_sale(
                header(customer.id, date(2024, 5, 1)),
                &[SaleLineRequest::new("P001", 1), SaleLineRequest::new("P002", 2)],
            )
            .await
            .unwrap();

        processor.delete_sale(receipt.sale.id).await.unwrap();

        let err = processor.search_sale(Some(receipt.sale.id)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(matches!(
            err,
            ProcessorError::Core(CoreError::SaleNotFound(id)) if id == receipt.sale.id
        ));
        assert!(processor
            .search_sales_product(Some(receipt.sale.id))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            processor.delete_sale(receipt.sale.id).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_deleting_customer_or_product_keeps_sale() {
        let (processor, customer) = seeded().await;
        let receipt = processor
            .process_sale(
                header(customer.id, date(2024, 5, 1)),
                &[SaleLineRequest::new("P002", 2)],
            )
            .await
            .unwrap();
        let mouse = processor.search_product("P002").await.unwrap();

        processor.delete_client(customer.id).await.unwrap();
        processor.delete_product(mouse.id).await.unwrap();

        let sales = processor.search_sale(Some(receipt.sale.id)).await.unwrap();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].customer_id, customer.id);

        let lines = processor.search_sales_product(Some(receipt.sale.id)).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product_id, mouse.id);
    }

    #[tokio::test]
    async fn test_partial_updates() {
        let (processor, customer) = seeded().await;

        let updated = processor
            .update_client(
                customer.id,
                &CustomerUpdate {
                    email: Some("john@example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "John Doe");
        assert_eq!(updated.email.as_deref(), Some("john@example.com"));

        let laptop = processor.search_product("P001").await.unwrap();
        let updated = processor
            .update_product(
                laptop.id,
                &ProductUpdate {
                    sale_price_cents: Some(125_000),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.sale_price_cents, 125_000);
        assert_eq!(updated.code, "P001");
        assert_eq!(updated.stock, 10);

        let err = processor
            .update_product(
                laptop.id,
                &ProductUpdate {
                    code: Some("P002".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = processor
            .update_client(404, &CustomerUpdate::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_sale_line_edits() {
        let (processor, customer) = seeded().await;
        let receipt = processor
            .process_sale(
                header(customer.id, date(2024, 5, 1)),
                &[SaleLineRequest::new("P001", 1), SaleLineRequest::new("P002", 2)],
            )
            .await
            .unwrap();
        let line_id = receipt.lines[1].id;

        let line = processor
            .update_sale_line(
                line_id,
                &SaleLineUpdate {
                    quantity: Some(4),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(line.quantity, 4);

        processor.delete_sale_line(line_id).await.unwrap();
        let remaining = processor.search_sales_product(Some(receipt.sale.id)).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, receipt.lines[0].id);
    }

    #[tokio::test]
    async fn test_stock_queries() {
        let (processor, _) = seeded().await;

        assert!(processor.check_stock("P001", 10).await.unwrap());
        assert!(!processor.check_stock("P001", 11).await.unwrap());
        assert!(!processor.check_stock("NOPE", 1).await.unwrap());

        let found = processor.search_stock("P002", "o").await.unwrap();
        let codes: Vec<&str> = found.iter().map(|p| p.code.as_str()).collect();
        assert_eq!(codes, vec!["P002", "P001"]);

        assert_eq!(processor.search_stock("", "").await.unwrap().len(), 2);
        assert_eq!(processor.filter_product_name("Lap").await.unwrap().len(), 1);

        let top = processor.top_stock(None).await.unwrap();
        assert_eq!(top[0].code, "P002");
    }

    #[tokio::test]
    async fn test_client_search() {
        let (processor, customer) = seeded().await;
        processor.create_client(&NewCustomer::named("Jane Smith")).await.unwrap();

        assert_eq!(processor.search_client("").await.unwrap().len(), 2);
        assert_eq!(processor.search_client("Smith").await.unwrap().len(), 1);
        assert_eq!(processor.search_client_id(customer.id).await.unwrap().name, "John Doe");
        assert_eq!(
            processor.search_client_id(999).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            processor.create_client(&NewCustomer::named("  ")).await.unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[tokio::test]
    async fn test_growth_reports() {
        let (processor, customer) = seeded().await;
        for (day, total) in [(date(2024, 4, 30), 100), (date(2024, 5, 2), 200), (date(2024, 5, 9), 300)] {
            let mut sale = header(customer.id, day);
            sale.total_cents = total;
            sale.profit_cents = total / 10;
            processor
                .process_sale(sale, &[SaleLineRequest::new("P002", 1)])
                .await
                .unwrap();
        }

        let monthly = processor.sales_growth(None, Granularity::Auto).await.unwrap();
        assert_eq!(monthly.len(), 2);
        assert_eq!(monthly[1].period, "2024-05");
        assert_eq!(monthly[1].cumulative.cents(), 600);

        let may = DateRange::month_of(date(2024, 5, 1));
        let daily = processor.profit_growth(Some(may), Granularity::Auto).await.unwrap();
        let running: Vec<i64> = daily.iter().map(|p| p.cumulative.cents()).collect();
        assert_eq!(running, vec![20, 50]);

        let top = processor.top_products(None, None).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_audit_trail() {
        let (processor, customer) = seeded().await;
        processor
            .process_sale(header(customer.id, date(2024, 5, 1)), &[SaleLineRequest::new("P002", 1)])
            .await
            .unwrap();

        let ops: Vec<String> = processor
            .search_log()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.operation)
            .collect();
        assert_eq!(
            ops,
            vec!["customer.created", "product.created", "product.created", "sale.recorded"]
        );

        let today = today();
        assert!(processor.filter_log(today, today.pred_opt().unwrap()).await.is_err());
    }

    #[tokio::test]
    async fn test_open_from_config() {
        let mut config = AppConfig::default();
        config.database.max_connections = 0;
        let err = SalesProcessor::open(&config).await.unwrap_err();
        assert!(matches!(err, ProcessorError::Config(_)));

        let path = std::env::temp_dir().join(format!("till-open-{}.db", std::process::id()));
        config.database.path = path.clone();
        config.database.max_connections = 2;
        config.reports.top_stock_limit = 1;
        config.store.default_tax_rate_bps = 550;

        let processor = SalesProcessor::open(&config).await.unwrap();
        processor.create_product(&laptop()).await.unwrap();
        processor.create_product(&mouse()).await.unwrap();
        assert_eq!(processor.top_stock(None).await.unwrap().len(), 1);

        let terms = processor.default_terms();
        assert_eq!(terms.tax_rate.bps(), 550);
        assert_eq!(terms.payment_method, PaymentMethod::Cash);
        assert_eq!(terms.installments, 1);

        processor.database().close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("not representable"))
        }
    }

    #[tokio::test]
    async fn test_unserializable_audit_details_still_logged() {
        let processor = setup().await;
        processor.audit("product.updated", Unserializable).await;

        let log = processor.search_log().await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].operation, "product.updated");
        assert_eq!(log[0].details.as_deref(), Some("null"));
    }

    #[tokio::test]
    async fn test_default_terms_use_store_tax_rate() {
        let processor = setup().await;
        let terms = processor.default_terms();
        assert_eq!(terms.tax_rate.bps(), 0);
        assert_eq!(terms.payment_method, PaymentMethod::Cash);
        assert_eq!(processor.store().name, "Till");
    }

    #[tokio::test]
    async fn test_search_missing_sale() {
        let (processor, _) = seeded().await;

        assert!(processor.search_sale(None).await.unwrap().is_empty());
        let err = processor.search_sale(Some(42)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(matches!(err, ProcessorError::Core(CoreError::SaleNotFound(42))));
    }

    #[tokio::test]
    async fn test_error_kinds() {
        let persistence = ProcessorError::not_recorded(DbError::PoolExhausted);
        assert_eq!(persistence.kind(), ErrorKind::Persistence);
        assert!(persistence.to_string().starts_with("Sale was not recorded"));

        let missing: ProcessorError = DbError::not_found("Sale", 3).into();
        assert_eq!(missing.kind(), ErrorKind::NotFound);
    }
}
