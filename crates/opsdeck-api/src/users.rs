// Admin user management and wallet endpoints.

use serde_json::json;

use crate::client::Client;
use crate::error::Error;
use crate::models::{BlockResult, BulkTopUpResult, Envelope, TopUpResult, UserFilter, UsersPage};

const DEFAULT_TOPUP_NOTE: &str = "Top-up via OpsDeck";
const DEFAULT_BULK_TOPUP_NOTE: &str = "Bulk top-up via OpsDeck";

impl Client {
    /// List admin users with optional role/search/pagination filters.
    ///
    /// Folds the backend's `_id` into `user_id` so callers see one
    /// identifier. A response missing the `users` payload surfaces as
    /// [`Error::Deserialization`].
    pub async fn list_users(&self, filter: &UserFilter) -> Result<UsersPage, Error> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(role) = &filter.role {
            query.push(("role", role.clone()));
        }
        if let Some(text) = &filter.query {
            let text = text.trim();
            if !text.is_empty() {
                query.push(("query", text.to_owned()));
            }
        }
        if let Some(page) = filter.page {
            query.push(("page", page.to_string()));
        }
        if let Some(limit) = filter.limit {
            query.push(("limit", limit.to_string()));
        }

        let envelope: Envelope<UsersPage> =
            self.get_json("/api/admin/users", Some(&query)).await?;

        let mut page = envelope.data;
        for user in &mut page.users {
            if user.user_id.is_none() {
                user.user_id = user.id.clone();
            }
        }
        Ok(page)
    }

    /// Block the given users.
    pub async fn block_users(
        &self,
        user_ids: &[String],
    ) -> Result<Envelope<Option<BlockResult>>, Error> {
        self.post_json("/api/admin/users/block", &json!({ "userIds": user_ids }))
            .await
    }

    /// Unblock the given users.
    pub async fn unblock_users(
        &self,
        user_ids: &[String],
    ) -> Result<Envelope<Option<BlockResult>>, Error> {
        self.post_json("/api/admin/users/unblock", &json!({ "userIds": user_ids }))
            .await
    }

    /// Credit one user's wallet balance.
    pub async fn top_up(
        &self,
        user_id: &str,
        amount_gc: f64,
        description: Option<&str>,
    ) -> Result<Envelope<Option<TopUpResult>>, Error> {
        let body = json!({
            "userId": user_id,
            "amountGC": amount_gc,
            "description": description.unwrap_or(DEFAULT_TOPUP_NOTE),
        });
        self.post_json("/api/wallet/add-balance", &body).await
    }

    /// Credit every listed user's wallet balance by the same amount.
    pub async fn top_up_bulk(
        &self,
        user_ids: &[String],
        amount_gc: f64,
        description: Option<&str>,
    ) -> Result<Envelope<Option<BulkTopUpResult>>, Error> {
        let body = json!({
            "userIds": user_ids,
            "amountGC": amount_gc,
            "description": description.unwrap_or(DEFAULT_BULK_TOPUP_NOTE),
        });
        self.post_json("/api/wallet/add-balance-bulk", &body).await
    }
}
