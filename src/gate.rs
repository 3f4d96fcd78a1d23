//! The PIN gate in front of the admin dashboard.
//!
//! The gate is a two-state machine held in the visitor's session. It starts
//! [`AccessGate::Locked`] and becomes [`AccessGate::Unlocked`] once a PIN
//! accepted by the configured [`PinPolicy`] is supplied. It never locks again
//! on its own; it goes back to locked only when the session ends.
//!
//! This is a deterrent, not an authorization boundary: the PIN is a shared
//! secret and anyone holding it gets in.

use sha2::{Digest, Sha256};
use thiserror::Error;
use tower_sessions::Session;

/// Session key under which the unlock flag lives.
pub const UNLOCK_KEY: &str = "admin_unlock";

/// PIN used when no policy is configured.
pub const DEFAULT_PIN: &str = "125";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("Invalid PIN")]
    InvalidPin,
}

/// Errors raised while parsing a hashed PIN.
#[derive(Debug, Error)]
pub enum PinPolicyError {
    #[error("PIN hash must be 64 hex characters: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("PIN hash must be 32 bytes, got {0}")]
    Length(usize),
}

/// How a supplied PIN is checked.
#[derive(Clone, PartialEq, Eq)]
pub enum PinPolicy {
    /// Compare against a PIN held in clear.
    Plain(String),
    /// Compare the SHA-256 digest of the supplied PIN.
    Sha256([u8; 32]),
}

impl PinPolicy {
    /// Builds a hashed policy from a hex-encoded SHA-256 digest.
    pub fn from_sha256_hex(digest: &str) -> Result<Self, PinPolicyError> {
        let bytes = hex::decode(digest.trim())?;
        let len = bytes.len();
        let digest: [u8; 32] = bytes.try_into().map_err(|_| PinPolicyError::Length(len))?;
        Ok(PinPolicy::Sha256(digest))
    }

    pub fn verify(&self, candidate: &str) -> bool {
        match self {
            PinPolicy::Plain(pin) => pin == candidate,
            PinPolicy::Sha256(expected) => {
                let actual: [u8; 32] = Sha256::digest(candidate.as_bytes()).into();
                &actual == expected
            }
        }
    }
}

impl Default for PinPolicy {
    fn default() -> Self {
        PinPolicy::Plain(DEFAULT_PIN.to_string())
    }
}

// Never print the secret itself
impl std::fmt::Debug for PinPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PinPolicy::Plain(_) => f.write_str("PinPolicy::Plain(..)"),
            PinPolicy::Sha256(_) => f.write_str("PinPolicy::Sha256(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccessGate {
    #[default]
    Locked,
    Unlocked,
}

impl AccessGate {
    pub fn is_unlocked(&self) -> bool {
        matches!(self, AccessGate::Unlocked)
    }

    /// Attempts the `Locked -> Unlocked` transition.
    ///
    /// A wrong PIN leaves the gate as it was. There is no attempt limit.
    pub fn try_unlock(&mut self, pin: &str, policy: &PinPolicy) -> Result<(), GateError> {
        if self.is_unlocked() {
            return Ok(());
        }
        if policy.verify(pin) {
            *self = AccessGate::Unlocked;
            Ok(())
        } else {
            Err(GateError::InvalidPin)
        }
    }

    /// Reads the gate for the current session. Absent means locked.
    pub async fn load(session: &Session) -> Result<Self, tower_sessions::session::Error> {
        let unlocked = session.get::<bool>(UNLOCK_KEY).await?.unwrap_or(false);
        Ok(if unlocked {
            AccessGate::Unlocked
        } else {
            AccessGate::Locked
        })
    }

    /// Writes the gate back into the session.
    pub async fn persist(&self, session: &Session) -> Result<(), tower_sessions::session::Error> {
        match self {
            AccessGate::Unlocked => session.insert(UNLOCK_KEY, true).await,
            AccessGate::Locked => session.remove::<bool>(UNLOCK_KEY).await.map(|_| ()),
        }
    }
}
