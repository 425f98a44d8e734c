use std::str::FromStr;

use axum_checkout_engine::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::auth::Claims,
    middleware::auth::ADMIN_ROLE,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use rust_decimal::Decimal;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    // Ensure migrations are applied.
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let pool = create_pool(&config.database_url).await?;
    seed_products(&pool, &config.default_currency).await?;

    match std::env::var("JWT_SECRET") {
        Ok(secret) => {
            let customer = Uuid::new_v4();
            let admin = Uuid::new_v4();
            println!("Customer {customer}: {}", demo_token(&secret, customer, "user")?);
            println!("Admin {admin}: {}", demo_token(&secret, admin, ADMIN_ROLE)?);
        }
        Err(_) => println!("JWT_SECRET not set; skipping demo tokens"),
    }

    println!("Seed completed");
    Ok(())
}

fn demo_token(secret: &str, user_id: Uuid, role: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        exp: (Utc::now() + Duration::days(7)).timestamp() as usize,
    };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))?;
    Ok(token)
}

async fn seed_products(pool: &sqlx::PgPool, currency: &str) -> anyhow::Result<()> {
    let products = vec![
        ("Masala Chai Blend", "249.00", 120),
        ("Filter Coffee Powder", "399.50", 80),
        ("Steel Tumbler Set", "1299.00", 25),
        ("Limited Edition Mug", "799.00", 1),
        ("Discontinued Kettle", "1899.00", 0),
    ];

    for (name, price, stock) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price, currency, stock)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(Decimal::from_str(price)?)
        .bind(currency)
        .bind(stock)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
