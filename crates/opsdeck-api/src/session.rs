// Session state
//
// Single source of truth for the credential pair and the authenticated
// account. Every mutation replaces the whole `Session` behind an
// `ArcSwap` (no partial writes an interleaving dispatch could observe)
// and is mirrored into the persistence vault before the call returns.

use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// Vault keys mirror the browser console's storage layout so a migrated
// session restores cleanly.
const KEY_ACCESS_TOKEN: &str = "auth_token";
const KEY_REFRESH_TOKEN: &str = "refresh_token";
const KEY_ACCOUNT: &str = "user";

/// Persistence boundary for surviving a restart: a synchronous,
/// fire-and-forget string key-value store. Implementations must not
/// fail loudly -- a broken vault degrades to an in-memory session.
pub trait SessionVault: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-memory vault for tests and deliberately ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryVault {
    entries: DashMap<String, String>,
}

impl SessionVault for MemoryVault {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }
}

/// The token pair issued at login. Owned by the [`SessionStore`]; read
/// per-request when attaching the authorization header, never copied into
/// long-lived state elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// The authenticated account profile, invalidated together with its
/// credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub user_id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_email_verified: Option<bool>,
}

/// One authenticated identity. `authenticated` is derived from the
/// credential rather than stored, so the two can never disagree.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub credential: Option<Credential>,
    pub account: Option<Account>,
}

impl Session {
    pub fn authenticated(&self) -> bool {
        self.credential.is_some()
    }
}

/// Process-wide session holder. Reads are lock-free snapshots; writes
/// swap the whole value and persist through the vault synchronously.
pub struct SessionStore {
    current: ArcSwap<Session>,
    vault: Arc<dyn SessionVault>,
}

impl SessionStore {
    /// Create a store backed by `vault`, restoring any persisted session.
    pub fn new(vault: Arc<dyn SessionVault>) -> Self {
        let restored = Self::restore(vault.as_ref());
        if restored.authenticated() {
            debug!("restored persisted session");
        }
        Self {
            current: ArcSwap::from_pointee(restored),
            vault,
        }
    }

    fn restore(vault: &dyn SessionVault) -> Session {
        let Some(access_token) = vault.get(KEY_ACCESS_TOKEN) else {
            return Session::default();
        };
        let refresh_token = vault.get(KEY_REFRESH_TOKEN);
        let account = vault.get(KEY_ACCOUNT).and_then(|raw| {
            serde_json::from_str(&raw)
                .inspect_err(|e| warn!("discarding unparseable persisted account: {e}"))
                .ok()
        });
        Session {
            credential: Some(Credential {
                access_token,
                refresh_token,
            }),
            account,
        }
    }

    /// Current session snapshot. O(1), never fails.
    pub fn get(&self) -> Arc<Session> {
        self.current.load_full()
    }

    /// The access token to attach to outbound requests, if any.
    pub fn access_token(&self) -> Option<String> {
        self.current
            .load()
            .credential
            .as_ref()
            .map(|c| c.access_token.clone())
    }

    /// Replace the session wholesale after a successful login and persist
    /// it for cross-restart recovery.
    pub fn set_authenticated(&self, credential: Credential, account: Account) {
        self.vault.set(KEY_ACCESS_TOKEN, &credential.access_token);
        match &credential.refresh_token {
            Some(token) => self.vault.set(KEY_REFRESH_TOKEN, token),
            None => self.vault.remove(KEY_REFRESH_TOKEN),
        }
        match serde_json::to_string(&account) {
            Ok(raw) => self.vault.set(KEY_ACCOUNT, &raw),
            Err(e) => warn!("failed to serialize account for persistence: {e}"),
        }
        self.current.store(Arc::new(Session {
            credential: Some(credential),
            account: Some(account),
        }));
    }

    /// Reset to the empty session and erase the persisted copies.
    /// Clearing an already-empty session is a no-op.
    pub fn clear(&self) {
        self.current.store(Arc::new(Session::default()));
        self.vault.remove(KEY_ACCESS_TOKEN);
        self.vault.remove(KEY_REFRESH_TOKEN);
        self.vault.remove(KEY_ACCOUNT);
    }

    /// Replace only the access token (after a token-refresh exchange).
    /// The refresh token and account are untouched. Does nothing when no
    /// credential is held -- a bare token is not a session.
    pub fn update_access_token(&self, token: impl Into<String>) {
        let token = token.into();
        if !self.get().authenticated() {
            debug!("ignoring access-token update for empty session");
            return;
        }
        self.current.rcu(|current| {
            let mut next = (**current).clone();
            if let Some(credential) = &mut next.credential {
                credential.access_token = token.clone();
            }
            next
        });
        self.vault.set(KEY_ACCESS_TOKEN, &token);
    }

    /// Replace only the account profile (e.g. after re-fetching it),
    /// leaving the credential untouched.
    pub fn update_account(&self, account: Account) {
        match serde_json::to_string(&account) {
            Ok(raw) => self.vault.set(KEY_ACCOUNT, &raw),
            Err(e) => warn!("failed to serialize account for persistence: {e}"),
        }
        self.current.rcu(|current| {
            let mut next = (**current).clone();
            next.account = Some(account.clone());
            next
        });
    }
}
