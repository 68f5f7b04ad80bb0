use anyhow::Context;

use crate::config;
use crate::database::DatabaseManager;

pub async fn handle() -> anyhow::Result<()> {
    let pool = DatabaseManager::connect(&config::config().database)
        .await
        .context("failed to connect to database")?;

    DatabaseManager::migrate(&pool).await.context("migration failed")?;
    pool.close().await;
    Ok(())
}
