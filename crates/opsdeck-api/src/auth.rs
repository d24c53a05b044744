// Authentication endpoints
//
// Login replaces the session wholesale; logout is a local teardown (the
// backend's tokens are stateless, there is nothing to revoke server-side).

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::debug;

use crate::client::Client;
use crate::error::Error;
use crate::models::AuthResponse;
use crate::session::{Account, Credential};

impl Client {
    /// Authenticate with email/password.
    ///
    /// On success the session store is replaced atomically with the new
    /// credential pair and account, and persisted for cross-restart
    /// recovery.
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<Account, Error> {
        debug!(%email, "logging in");

        let body = json!({
            "email": email,
            "password": password.expose_secret(),
        });
        let auth: AuthResponse = self.post_json("/api/auth/login", &body).await?;

        let credential = Credential {
            access_token: auth.access_token,
            refresh_token: auth.refresh_token,
        };
        self.context()
            .session()
            .set_authenticated(credential, auth.user.clone());

        debug!("login successful");
        Ok(auth.user)
    }

    /// End the current session locally: clear the store and erase the
    /// persisted copies.
    pub fn logout(&self) {
        debug!("logging out");
        self.context().session().clear();
    }

    /// Fetch the authenticated account's profile and refresh the stored
    /// copy.
    pub async fn profile(&self) -> Result<Account, Error> {
        let account: Account = self.get_json("/api/auth/profile", None).await?;
        self.context().session().update_account(account.clone());
        Ok(account)
    }
}
