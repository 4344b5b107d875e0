//! API token commands.
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string
//! - `STOREFRONT_TOKEN_PEPPER` - the storefront's HMAC key; tokens issued
//!   with a different pepper will not resolve

use secrecy::ExposeSecret;
use tracing::info;

use abc_shop_core::Email;
use abc_shop_storefront::config::StorefrontConfig;
use abc_shop_storefront::db::TokenRepository;
use abc_shop_storefront::services::{TokenHasher, issue_token};

/// Issue a bearer token for `email` and print it. The plaintext is shown
/// only once.
///
/// # Errors
///
/// Returns an error for an invalid email or pepper, or if the database
/// write fails.
pub async fn issue(
    email: &str,
    label: Option<String>,
    days: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let email = Email::parse(email)?;
    let hasher = TokenHasher::new(StorefrontConfig::token_pepper_from_env()?);

    let pool = super::connect().await?;
    let store = TokenRepository::new(pool);

    let valid_for = days.map(|d| chrono::Duration::days(i64::from(d)));
    let issued = issue_token(&store, &hasher, &email, label, valid_for).await?;

    info!(
        user_id = %issued.user_id,
        expires_at = ?issued.expires_at,
        "Token issued for {email}"
    );

    #[allow(clippy::print_stdout)]
    {
        println!("{}", issued.token.expose_secret());
    }

    Ok(())
}
