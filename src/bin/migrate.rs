use axum_marketplace_api::db::{create_orm_conn, run_migrations};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")?;
    let conn = create_orm_conn(&database_url).await?;
    run_migrations(&conn).await?;
    println!("migrations applied");
    Ok(())
}
