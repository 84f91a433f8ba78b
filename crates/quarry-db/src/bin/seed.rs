//! # Seed Data Generator
//!
//! Creates demo `users` and `addresses` tables and fills them through the
//! generic operations.
//!
//! ## Usage
//! ```bash
//! # 10 single inserts, then a bulk batch of 100 (defaults)
//! cargo run -p quarry-db --bin seed
//!
//! # Custom amounts
//! cargo run -p quarry-db --bin seed -- --single 5 --many 10000
//!
//! # Specify database
//! cargo run -p quarry-db --bin seed -- --db sqlite://./data/quarry.db
//! ```
//!
//! ## What It Does
//! 1. Creates `users` and `addresses` (idempotent)
//! 2. Inserts `--single` users one at a time with `create_one`
//! 3. Inserts `--many` users in one atomic `create_many`
//! 4. Attaches an address to the first user
//! 5. Prints counts, introspection output and the first page of ids

use anyhow::Context;
use clap::Parser;
use uuid::Uuid;

use quarry_core::{
    ColumnDef, ColumnType, DbSettings, Direction, Entity, EntityBase, EntityError, Query, Record,
    TableSchema,
};
use quarry_db::{init_tracing, Database, HealthMonitor};

// =============================================================================
// Command Line
// =============================================================================

#[derive(Debug, Parser)]
#[command(name = "seed", about = "Quarry seed data generator")]
struct Args {
    /// Database uri
    #[arg(short, long, env = "QUARRY_DATABASE_URI", default_value = "sqlite://./quarry_dev.db")]
    db: String,

    /// Users inserted one at a time
    #[arg(short, long, default_value_t = 10)]
    single: usize,

    /// Users inserted in one bulk batch
    #[arg(short, long, default_value_t = 100)]
    many: usize,

    /// Ids listed after seeding
    #[arg(short, long, default_value_t = 10)]
    page: u64,

    /// Log every statement
    #[arg(long)]
    echo: bool,
}

// =============================================================================
// Demo Entities
// =============================================================================

#[derive(Debug, Clone)]
struct User {
    base: EntityBase,
    first_name: String,
    last_name: String,
    email: Option<String>,
}

impl User {
    fn generated(tag: &str) -> Self {
        User {
            base: EntityBase::new(),
            first_name: format!("First{tag}"),
            last_name: format!("Last{tag}"),
            email: Some(format!("user{tag}@example.com")),
        }
    }
}

impl Entity for User {
    fn schema() -> TableSchema {
        TableSchema::new("users")
            .comment("User table storing user details like first name, last name, and email")
            .column(ColumnDef::new("first_name", ColumnType::Text).max_length(50).indexed())
            .column(ColumnDef::new("last_name", ColumnType::Text).max_length(50).indexed())
            .column(ColumnDef::new("email", ColumnType::Text).max_length(200).unique())
    }

    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn fields(&self) -> Record {
        Record::new()
            .with("first_name", self.first_name.as_str())
            .with("last_name", self.last_name.as_str())
            .with("email", self.email.clone())
    }

    fn from_record(record: Record) -> Result<Self, EntityError> {
        Ok(User {
            base: EntityBase::from_record(&record)?,
            first_name: record.get_text("first_name")?,
            last_name: record.get_text("last_name")?,
            email: record.get_opt_text("email")?,
        })
    }
}

#[derive(Debug, Clone)]
struct Address {
    base: EntityBase,
    street: String,
    city: String,
    zip: String,
    user_id: String,
}

impl Entity for Address {
    fn schema() -> TableSchema {
        TableSchema::new("addresses")
            .comment("Address table storing address details like street, city, and zip code")
            .column(ColumnDef::new("street", ColumnType::Text).max_length(200).indexed())
            .column(ColumnDef::new("city", ColumnType::Text).max_length(200).indexed())
            .column(ColumnDef::new("zip", ColumnType::Text).max_length(50).indexed())
            .column(
                ColumnDef::new("user_id", ColumnType::Text)
                    .max_length(36)
                    .references("users", "pkid"),
            )
    }

    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn fields(&self) -> Record {
        Record::new()
            .with("street", self.street.as_str())
            .with("city", self.city.as_str())
            .with("zip", self.zip.as_str())
            .with("user_id", self.user_id.as_str())
    }

    fn from_record(record: Record) -> Result<Self, EntityError> {
        Ok(Address {
            base: EntityBase::from_record(&record)?,
            street: record.get_text("street")?,
            city: record.get_text("city")?,
            zip: record.get_text("zip")?,
            user_id: record.get_text("user_id")?,
        })
    }
}

fn token(len: usize) -> String {
    Uuid::new_v4().simple().to_string()[..len].to_string()
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    println!("🌱 Quarry Seed Data Generator");
    println!("=============================");

    let config = DbSettings::new(&args.db)
        .echo(args.echo)
        .validate()
        .context("invalid database settings")?;
    println!("Database: {config}");

    let db = Database::open(config)
        .await
        .context("failed to open database")?;
    let monitor = HealthMonitor::new(db.clone());
    println!("✓ Connected to database");

    db.create_schema(&[User::schema(), Address::schema()])
        .await
        .context("failed to create tables")?;
    println!("✓ Tables ready");

    let start = std::time::Instant::now();
    let mut first_user = None;
    for _ in 0..args.single {
        let user = db
            .create_one(User::generated(&token(32)))
            .await
            .context("create_one failed")?;
        first_user.get_or_insert(user);
    }
    println!("✓ Created {} users one at a time", args.single);

    let batch: Vec<User> = (0..args.many)
        .map(|i| User::generated(&format!("{}{i}{}", token(8), token(16))))
        .collect();
    let inserted = db.create_many(&batch).await.context("create_many failed")?;
    println!("✓ Created {inserted} users in one batch in {:?}", start.elapsed());

    if let Some(user) = first_user {
        if let Some(pkid) = user.primary_key() {
            let address = Address {
                base: EntityBase::new(),
                street: "1 Main Street".to_string(),
                city: "Springfield".to_string(),
                zip: "12345".to_string(),
                user_id: pkid.to_string(),
            };
            db.create_one(address)
                .await
                .context("failed to create address")?;
            println!("✓ Added an address for {} {}", user.first_name, user.last_name);
        }
    }

    println!();
    let total = db.count_query(&Query::<User>::new()).await?;
    println!("Users: {total}");
    println!("Tables: {:?}", db.get_table_names()?);
    println!("Primary keys of users: {:?}", db.get_primary_keys("users")?);
    for column in db.get_columns_details("users")? {
        println!("  {:<14} {:<14} nullable={}", column.name, column.sql_type, column.nullable);
    }

    if args.page > 0 {
        let page = db
            .read_query(
                &Query::<User>::new().order_by("date_created", Direction::Asc),
                0,
                args.page,
            )
            .await?;
        let ids: Vec<String> = page
            .iter()
            .filter_map(|u| u.primary_key().map(|k| k.to_string()))
            .collect();
        println!();
        println!("First {} ids (usable with delete_many):", ids.len());
        println!("{}", serde_json::to_string_pretty(&ids)?);
    }

    let report = monitor.check().await;
    println!();
    println!("Health: {}", serde_json::to_string(&report)?);

    db.close().await;
    Ok(())
}
