use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated,
    Expired,
}

/// Access/refresh token pair. Replaced as a whole on sign-in or refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub access_token: Option<String>,
    pub access_token_expiry: Option<DateTime<Utc>>,
    pub refresh_token: Option<String>,
}

impl Session {
    pub(crate) fn issued(
        access_token: String,
        expires_in_secs: i64,
        refresh_token: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: Some(access_token),
            access_token_expiry: Some(now + Duration::seconds(expires_in_secs)),
            refresh_token,
        }
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> AuthState {
        match (&self.access_token, self.access_token_expiry) {
            (None, _) => AuthState::Unauthenticated,
            (Some(_), Some(expiry)) if expiry <= now => AuthState::Expired,
            (Some(_), _) => AuthState::Authenticated,
        }
    }

    pub fn state(&self) -> AuthState {
        self.state_at(Utc::now())
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}
