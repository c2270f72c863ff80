use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await?;
    tracing::info!("Connected to Postgres");
    Ok(pool)
}
