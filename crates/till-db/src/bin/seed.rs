//! # Seed Data Generator
//!
//! Populates the database with demo customers, products and sales.
//!
//! ## Usage
//! ```bash
//! # Customers and products, plus 12 sales (default)
//! cargo run -p till-db --bin seed
//!
//! # More sales
//! cargo run -p till-db --bin seed -- --sales 40
//!
//! # Specify database path
//! cargo run -p till-db --bin seed -- --db ./data/till.db
//! ```
//!
//! Sales are generated deterministically: the same `--sales` count always
//! yields the same customers, products, quantities, methods and dates.
//! A sale that would oversell is skipped.

use chrono::{Duration, NaiveDate};
use std::env;
use till_core::{Money, NewCustomer, NewProduct, PaymentMethod, Product, Quote, SaleLineRequest, SaleTerms};
use till_db::{AppConfig, Database, DbConfig, SalesProcessor};

/// (name, national id, email, phone)
const CUSTOMERS: &[(&str, &str, &str, &str)] = &[
    ("John Doe", "12345678900", "john@example.com", "1111111111"),
    ("Jane Smith", "98765432100", "jane@example.com", "2222222222"),
    ("Alice Johnson", "45678912300", "alice@example.com", "3333333333"),
    ("Bob Brown", "32165498700", "bob@example.com", "4444444444"),
];

/// (code, name, purchase cents, sale cents, stock)
const PRODUCTS: &[(&str, &str, i64, i64, i64)] = &[
    ("P001", "Laptop", 100_000, 120_000, 10),
    ("P002", "Mouse", 2_000, 3_000, 50),
    ("P003", "Keyboard", 5_000, 7_000, 30),
    ("P004", "Monitor", 20_000, 25_000, 20),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    till_db::init_tracing();

    let args: Vec<String> = env::args().collect();

    let config = AppConfig::load_or_default(None);
    let mut sales: usize = 12;
    let mut db_path = config.database.path.display().to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--sales" | "-s" => {
                if i + 1 < args.len() {
                    sales = args[i + 1].parse().unwrap_or(12);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Till Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -s, --sales <N>    Number of sales to generate (default: 12)");
                println!("  -d, --db <PATH>    Database file path (default: from till.toml, else ./till.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Till Seed Data Generator");
    println!("========================");
    println!("Database: {}", db_path);
    println!("Sales:    {}", sales);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let processor = SalesProcessor::new(db);

    let mut customer_ids = Vec::with_capacity(CUSTOMERS.len());
    for (name, national_id, email, phone) in CUSTOMERS {
        let customer = processor
            .create_client(&NewCustomer {
                name: name.to_string(),
                national_id: Some(national_id.to_string()),
                email: Some(email.to_string()),
                phone: Some(phone.to_string()),
            })
            .await?;
        customer_ids.push(customer.id);
    }
    println!("✓ Created {} customers", customer_ids.len());

    let mut products = Vec::with_capacity(PRODUCTS.len());
    for (code, name, purchase, sale, stock) in PRODUCTS {
        let product = processor
            .create_product(&NewProduct {
                name: name.to_string(),
                code: code.to_string(),
                description: None,
                purchase_price_cents: *purchase,
                sale_price_cents: *sale,
                stock: *stock,
            })
            .await?;
        products.push(product);
    }
    println!("✓ Created {} products", products.len());

    println!();
    println!("Generating sales...");

    let start = NaiveDate::from_ymd_opt(2024, 1, 5).ok_or("invalid start date")?;
    let mut recorded = 0;
    let mut skipped = 0;

    for n in 0..sales {
        let customer_id = customer_ids[n % customer_ids.len()];
        let product = &products[(n * 3 + 1) % products.len()];
        let quantity = 1 + (n % 3) as i64;
        let sale_date = start + Duration::days((n * 4) as i64);
        let terms = terms_for(n);

        let header = quote(product, quantity, &terms)?.to_new_sale(customer_id, sale_date);
        let lines = [SaleLineRequest::new(product.code.clone(), quantity)];

        match processor.process_sale(header, &lines).await {
            Ok(receipt) => {
                recorded += 1;
                println!(
                    "  #{:<3} {} {} × {:<2} {:>10}  {}",
                    receipt.sale.id,
                    sale_date,
                    product.code,
                    quantity,
                    receipt.sale.total().to_string(),
                    terms.payment_method
                );
            }
            Err(e) => {
                skipped += 1;
                eprintln!("  Skipped sale {}: {}", n + 1, e);
            }
        }
    }

    println!();
    println!("✓ Recorded {} sales ({} skipped)", recorded, skipped);
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Cycles through every payment method; card sales get 1 to 6 installments.
fn terms_for(n: usize) -> SaleTerms {
    let method = PaymentMethod::ALL[n % PaymentMethod::ALL.len()];
    SaleTerms::with_method(method)
        .installments(1 + (n % 6) as i64)
        .discount_bps(if n % 5 == 0 { 500 } else { 0 })
}

fn quote(product: &Product, quantity: i64, terms: &SaleTerms) -> Result<Quote, Box<dyn std::error::Error>> {
    let subtotal: Money = product.sale_price().multiply_quantity(quantity);
    let cost = product.purchase_price().multiply_quantity(quantity);
    Ok(Quote::compute(subtotal, cost, terms)?)
}
