use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum_marketplace_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
};
use rust_decimal::Decimal;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "admin12345", "admin").await?;
    let customer_id = ensure_user(&pool, "customer@example.com", "customer123", "customer").await?;
    let vendor_user_id = ensure_user(&pool, "vendor@example.com", "vendor12345", "vendor").await?;
    let vendor_id = ensure_vendor(&pool, vendor_user_id).await?;
    seed_products(&pool, vendor_id).await?;

    println!("Seed completed. Admin: {admin_id}, Customer: {customer_id}, Vendor: {vendor_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    if let Some((id,)) = existing {
        println!("User {email} already present");
        return Ok(id);
    }

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, name, role)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(email.split('@').next().unwrap_or("user"))
    .bind(role)
    .fetch_one(pool)
    .await?;

    sqlx::query("INSERT INTO carts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(pool)
        .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn ensure_vendor(pool: &sqlx::PgPool, user_id: Uuid) -> anyhow::Result<Uuid> {
    let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM vendors WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    if let Some((id,)) = existing {
        return Ok(id);
    }

    let (vendor_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO vendors (user_id, business_name, business_email, is_approved)
        VALUES ($1, 'Demo Traders', 'sales@demo-traders.example', TRUE)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    println!("Ensured vendor profile");
    Ok(vendor_id)
}

async fn seed_products(pool: &sqlx::PgPool, vendor_id: Uuid) -> anyhow::Result<()> {
    let products = [
        ("Himalayan Tea Sampler", "Twelve single-estate teas", "1250.00", 50),
        ("Handwoven Dhaka Scarf", "Traditional pattern, cotton", "850.50", 30),
        ("Singing Bowl", "Hand-hammered bronze, 12cm", "3400.00", 10),
        ("Lokta Paper Journal", "Acid-free handmade paper", "450.00", 100),
    ];

    for (name, desc, price, stock) in products {
        let exists: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE name = $1")
            .bind(name)
            .fetch_one(pool)
            .await?;
        if exists.0 > 0 {
            continue;
        }
        sqlx::query(
            r#"
            INSERT INTO products (vendor_id, name, description, price, stock_quantity)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(vendor_id)
        .bind(name)
        .bind(desc)
        .bind(price.parse::<Decimal>()?)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
