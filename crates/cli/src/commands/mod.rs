//! CLI subcommand implementations.

pub mod inventory;
pub mod migrate;

use secrecy::SecretString;

/// Read a database URL, falling back to the generic `DATABASE_URL`.
pub(crate) fn database_url(primary: &'static str) -> Option<SecretString> {
    std::env::var(primary)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .map(SecretString::from)
}
