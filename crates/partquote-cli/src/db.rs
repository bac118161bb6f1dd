//! `db` subcommands: connectivity check and migrations.

use clap::Subcommand;

#[derive(Debug, Subcommand)]
pub enum DbCommands {
    /// Check that the database answers
    Ping,
    /// Apply pending migrations
    Migrate,
}

async fn connect() -> anyhow::Result<sqlx::PgPool> {
    let config = partquote_core::load_app_config()?;
    let pool_config = partquote_db::PoolConfig::from_app_config(&config);
    let pool = partquote_db::connect_pool(&config.database_url, pool_config).await?;
    Ok(pool)
}

pub(crate) async fn run(command: DbCommands) -> anyhow::Result<()> {
    let pool = connect().await?;
    match command {
        DbCommands::Ping => {
            partquote_db::ping(&pool).await?;
            println!("database ok");
        }
        DbCommands::Migrate => {
            let applied = partquote_db::run_migrations(&pool).await?;
            tracing::info!(applied, "migrations applied");
            println!("{applied} migration(s) applied");
        }
    }
    pool.close().await;
    Ok(())
}
