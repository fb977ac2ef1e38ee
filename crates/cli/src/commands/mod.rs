//! CLI subcommand implementations.

pub mod migrate;
pub mod orders;
pub mod seed;

use secrecy::SecretString;

/// Error returned when no database URL is configured.
#[derive(Debug, thiserror::Error)]
#[error("Missing environment variable: SHOP_DATABASE_URL (or DATABASE_URL)")]
pub struct MissingDatabaseUrl;

/// Database URL from `SHOP_DATABASE_URL`, falling back to `DATABASE_URL`.
///
/// Loads `.env` first so the CLI sees the same settings as the storefront.
pub fn database_url() -> Result<SecretString, MissingDatabaseUrl> {
    dotenvy::dotenv().ok();

    std::env::var("SHOP_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .filter(|v| !v.is_empty())
        .map(SecretString::from)
        .ok_or(MissingDatabaseUrl)
}
