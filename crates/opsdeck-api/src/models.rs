// Wire types for the OpsDeck backend.
//
// The backend speaks camelCase JSON and wraps most admin responses in a
// `{ status, success, message, data }` envelope. The dispatcher passes
// the envelope through untouched; endpoint methods interpret `data`.

use serde::Deserialize;

use crate::session::Account;

/// Standard success envelope: `{ status, success, message, data }`.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: T,
}

/// Body of a successful login: the token pair plus the account profile.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: Account,
}

/// One row of the admin user listing. The backend is inconsistent about
/// `_id` vs `userId`; `list_users` folds the former into the latter.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    #[serde(default, rename = "_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub is_email_verified: Option<bool>,
    #[serde(default)]
    pub is_blocked: Option<bool>,
    #[serde(default, rename = "balanceGC")]
    pub balance_gc: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

/// `data` payload of the user listing.
#[derive(Debug, Clone, Deserialize)]
pub struct UsersPage {
    pub users: Vec<AdminUser>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// `data` payload of a block/unblock call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockResult {
    #[serde(default)]
    pub blocked: Vec<String>,
    #[serde(default)]
    pub unblocked: Vec<String>,
}

/// `data` payload of a single top-up.
#[derive(Debug, Clone, Deserialize)]
pub struct TopUpResult {
    #[serde(rename = "balanceGC")]
    pub balance_gc: f64,
}

/// `data` payload of a bulk top-up.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkTopUpResult {
    #[serde(default)]
    pub success_count: u32,
    #[serde(default)]
    pub failed_count: u32,
    #[serde(default)]
    pub results: Vec<BulkTopUpOutcome>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkTopUpOutcome {
    pub user_id: String,
    pub success: bool,
    #[serde(default, rename = "balanceGC")]
    pub balance_gc: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Backend health probe response.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    #[serde(default)]
    pub uptime: Option<f64>,
}

/// Filters for the admin user listing. All optional; an empty filter
/// lists the first page with the backend's default page size.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<String>,
    pub query: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn auth_response_is_camel_case() {
        let auth: AuthResponse = serde_json::from_str(
            r#"{
                "accessToken": "a1",
                "refreshToken": "r1",
                "user": { "userId": "u1", "email": "a@b.c", "role": "admin" }
            }"#,
        )
        .unwrap();
        assert_eq!(auth.access_token, "a1");
        assert_eq!(auth.refresh_token.as_deref(), Some("r1"));
        assert_eq!(auth.user.user_id, "u1");
    }

    #[test]
    fn refresh_token_is_optional() {
        let auth: AuthResponse = serde_json::from_str(
            r#"{ "accessToken": "a1", "user": { "userId": "u1", "email": "a@b.c" } }"#,
        )
        .unwrap();
        assert!(auth.refresh_token.is_none());
    }

    #[test]
    fn admin_user_reads_mongo_id_and_balance() {
        let user: AdminUser = serde_json::from_str(
            r#"{ "_id": "abc", "email": "a@b.c", "balanceGC": 42.5, "isBlocked": false }"#,
        )
        .unwrap();
        assert_eq!(user.id.as_deref(), Some("abc"));
        assert!(user.user_id.is_none());
        assert!(user.balance_gc.is_some_and(|b| (b - 42.5).abs() < f64::EPSILON));
        assert_eq!(user.is_blocked, Some(false));
    }

    #[test]
    fn envelope_wraps_arbitrary_data() {
        let env: Envelope<UsersPage> = serde_json::from_str(
            r#"{
                "status": 200,
                "success": true,
                "message": "ok",
                "data": {
                    "users": [{ "_id": "abc", "email": "a@b.c" }],
                    "pagination": { "page": 1, "limit": 10, "total": 1, "totalPages": 1 }
                }
            }"#,
        )
        .unwrap();
        assert!(env.success);
        assert_eq!(env.data.users.len(), 1);
        assert_eq!(env.data.pagination.unwrap().total_pages, 1);
    }
}
