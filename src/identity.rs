//! Participant identity with expiry
//!
//! The participant token is persisted as `{"userid", "expiresAt"}` under
//! [`IDENTITY_KEY`]. An inbound id from the study link always wins; otherwise
//! a still-valid stored token is reused. When neither applies, the whole
//! profile is wiped and a fresh token is generated, which is the only way a
//! participant ever gets a new task sequence.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::{SharedStore, load_json, save_json};
use crate::types::identifiers::ParticipantId;

/// Storage key of the participant token
pub const IDENTITY_KEY: &str = "userStudyID";

/// Lifetime of a token handed in by the study link, in milliseconds
pub const INBOUND_TOKEN_TTL_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Lifetime of a generated token, in milliseconds
pub const GENERATED_TOKEN_TTL_MS: i64 = 24 * 60 * 60 * 1000;

const RANDOM_SUFFIX_LEN: usize = 11;

/// Participant token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantToken {
    /// Participant id
    pub id: ParticipantId,
    /// Instant after which the token is no longer valid
    pub expires_at: DateTime<Utc>,
}

impl ParticipantToken {
    /// Whether the token is still valid at `now` (inclusive)
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now <= self.expires_at
    }
}

/// Persisted layout, kept compatible with the browser client
#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    userid: String,
    #[serde(rename = "expiresAt")]
    expires_at: i64,
}

impl StoredToken {
    fn from_token(token: &ParticipantToken) -> Self {
        Self {
            userid: token.id.as_str().to_string(),
            expires_at: token.expires_at.timestamp_millis(),
        }
    }

    fn into_token(self) -> Option<ParticipantToken> {
        let expires_at = DateTime::<Utc>::from_timestamp_millis(self.expires_at)?;
        Some(ParticipantToken {
            id: ParticipantId::new(self.userid),
            expires_at,
        })
    }
}

/// Produces and validates the participant token
pub struct IdentityStore {
    store: SharedStore,
}

impl IdentityStore {
    /// Create an identity store over the shared profile
    #[must_use]
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Resolve the participant token at the current time
    ///
    /// # Errors
    /// Returns error if the profile cannot be read or written
    pub fn resolve_identity(&self, inbound: Option<&str>) -> Result<ParticipantToken> {
        self.resolve_identity_at(inbound, Utc::now())
    }

    /// Resolve the participant token at `now`
    ///
    /// # Errors
    /// Returns error if the profile cannot be read or written
    pub fn resolve_identity_at(
        &self,
        inbound: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ParticipantToken> {
        if let Some(id) = inbound.map(str::trim).filter(|id| !id.is_empty()) {
            let token = ParticipantToken {
                id: ParticipantId::new(id),
                expires_at: now + TimeDelta::milliseconds(INBOUND_TOKEN_TTL_MS),
            };
            self.persist(&token)?;
            log::info!("Using participant id from study link: {}", token.id);
            return Ok(token);
        }

        if let Some(token) = self.stored()?
            && token.is_valid_at(now)
        {
            log::debug!("Reusing participant token {}", token.id);
            return Ok(token);
        }

        self.store.clear()?;
        let token = ParticipantToken {
            id: generate_id(now),
            expires_at: now + TimeDelta::milliseconds(GENERATED_TOKEN_TTL_MS),
        };
        self.persist(&token)?;
        log::info!("Generated participant token {}", token.id);
        Ok(token)
    }

    /// Persisted token, valid or not
    ///
    /// # Errors
    /// Returns error if the profile cannot be read
    pub fn stored(&self) -> Result<Option<ParticipantToken>> {
        Ok(load_json::<StoredToken>(self.store.as_ref(), IDENTITY_KEY)?
            .and_then(StoredToken::into_token))
    }

    fn persist(&self, token: &ParticipantToken) -> Result<()> {
        save_json(
            self.store.as_ref(),
            IDENTITY_KEY,
            &StoredToken::from_token(token),
        )
    }
}

/// Time-based base-36 prefix plus a random suffix
fn generate_id(now: DateTime<Utc>) -> ParticipantId {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or_default();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let suffix = suffix.get(..RANDOM_SUFFIX_LEN).unwrap_or(&suffix);
    ParticipantId::new(format!("{}{suffix}", to_base36(millis)))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

