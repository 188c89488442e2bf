//! Session tokens.
//!
//! Tokens are opaque 32-character strings held in memory only. A user may
//! hold any number of live tokens; a restart drops them all.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rand::Rng;
use rand::distributions::Alphanumeric;
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::limits::{MAX_PASSWORD_LEN, MAX_USERNAME_LEN};
use crate::model::{LoginResponse, PasswordHash, UserId};
use crate::observability;
use crate::store::{Repository, StoreError};

pub const TOKEN_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Unknown user or wrong password; deliberately not told apart.
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("username already taken")]
    UsernameTaken,
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What `sign_up` does with a username that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignUpPolicy {
    /// Treat it as a sign-in with the supplied password.
    #[default]
    SignIn,
    /// Fail with [`AuthError::UsernameTaken`].
    Reject,
}

impl FromStr for SignUpPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sign-in" => Ok(SignUpPolicy::SignIn),
            "reject" => Ok(SignUpPolicy::Reject),
            other => Err(format!("expected 'sign-in' or 'reject', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionConfig {
    /// Tokens older than this stop resolving. `None` keeps them for the process lifetime.
    pub ttl: Option<Duration>,
    pub sign_up_existing: SignUpPolicy,
}

struct SessionEntry {
    user_id: UserId,
    issued: Instant,
}

pub fn hash_password(password: &str) -> PasswordHash {
    Sha256::digest(password.as_bytes()).into()
}

/// Compared against when the username is unknown, so both failure paths hash.
const UNKNOWN_USER_DIGEST: PasswordHash = [0u8; 32];

fn password_matches(password: &str, stored: &PasswordHash) -> bool {
    constant_time_eq::constant_time_eq(&hash_password(password), stored)
}

fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

fn check_credentials(username: &str, password: &str) -> Result<(), AuthError> {
    if username.is_empty() {
        return Err(AuthError::InvalidCredentials);
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(AuthError::LimitExceeded("username too long"));
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(AuthError::LimitExceeded("password too long"));
    }
    Ok(())
}

pub struct SessionManager {
    repo: Arc<dyn Repository>,
    tokens: DashMap<String, SessionEntry>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(repo: Arc<dyn Repository>, config: SessionConfig) -> Self {
        Self {
            repo,
            tokens: DashMap::new(),
            config,
        }
    }

    pub async fn sign_up(&self, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        check_credentials(username, password)?;

        if self.repo.get_user_by_username(username).await?.is_some() {
            return self.existing_username(username, password).await;
        }

        match self.repo.insert_user(username, hash_password(password)).await {
            Ok(user_id) => {
                info!(user_id, username, "user signed up");
                Ok(self.login(user_id))
            }
            // Lost a race with another sign-up for the same name.
            Err(StoreError::AlreadyExists(_)) => self.existing_username(username, password).await,
            Err(e) => Err(e.into()),
        }
    }

    async fn existing_username(
        &self,
        username: &str,
        password: &str,
    ) -> Result<LoginResponse, AuthError> {
        match self.config.sign_up_existing {
            SignUpPolicy::SignIn => self.sign_in(username, password).await,
            SignUpPolicy::Reject => {
                debug!(username, "sign-up refused: username taken");
                Err(AuthError::UsernameTaken)
            }
        }
    }

    pub async fn sign_in(&self, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        check_credentials(username, password)?;

        let user = self.repo.get_user_by_username(username).await?;
        let stored = user.as_ref().map_or(&UNKNOWN_USER_DIGEST, |u| &u.password_hash);
        let matches = password_matches(password, stored);
        match user {
            Some(user) if matches => {
                debug!(user_id = user.id, "user signed in");
                Ok(self.login(user.id))
            }
            _ => {
                metrics::counter!(observability::AUTH_FAILURES_TOTAL).increment(1);
                warn!(username, "sign-in failed");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    fn login(&self, user_id: UserId) -> LoginResponse {
        LoginResponse {
            session_token: self.generate_token(user_id),
            user_id,
        }
    }

    /// Mint a fresh token bound to `user_id`. Never reuses a live token.
    pub fn generate_token(&self, user_id: UserId) -> String {
        let token = loop {
            let candidate = random_token();
            match self.tokens.entry(candidate) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    let token = slot.key().clone();
                    slot.insert(SessionEntry { user_id, issued: Instant::now() });
                    break token;
                }
            }
        };
        metrics::gauge!(observability::SESSIONS_ACTIVE).set(self.tokens.len() as f64);
        token
    }

    pub fn try_resolve(&self, token: &str) -> Option<UserId> {
        let entry = self.tokens.get(token)?;
        if self.is_expired(&entry) {
            return None;
        }
        Some(entry.user_id)
    }

    fn is_expired(&self, entry: &SessionEntry) -> bool {
        self.config
            .ttl
            .is_some_and(|ttl| entry.issued.elapsed() >= ttl)
    }

    /// Drop expired tokens. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        if self.config.ttl.is_none() {
            return 0;
        }
        let before = self.tokens.len();
        self.tokens.retain(|_, entry| !self.is_expired(entry));
        let removed = before.saturating_sub(self.tokens.len());
        metrics::gauge!(observability::SESSIONS_ACTIVE).set(self.tokens.len() as f64);
        removed
    }

    pub fn active_sessions(&self) -> usize {
        self.tokens.len()
    }
}
