//! Account-scoped token issuance and validation.
//!
//! Tokens are a keyed HMAC-SHA256 digest over the account id and issuance
//! timestamp. The server is stateless with respect to tokens: validation
//! recomputes the digest with the current global secret and compares in
//! constant time. Tokens carry no enforced expiry; they remain valid until
//! the secret rotates.

use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::{
    error::GatewayError,
    models::AccountId,
    time::Clock,
};

type HmacSha256 = Hmac<Sha256>;

/// Token validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The token could not be decoded into its parts.
    #[error("malformed token")]
    Malformed,
    /// The recomputed digest did not match the token's signature.
    #[error("invalid token signature")]
    InvalidSignature,
    /// The token is valid but scoped to a different account than the request.
    #[error("token account does not match request account")]
    AccountMismatch,
}

impl From<TokenError> for GatewayError {
    fn from(err: TokenError) -> Self {
        GatewayError::Unauthorized(err.to_string())
    }
}

/// A signed, account-scoped token.
///
/// Created by the issuance endpoint, never mutated, and discarded by the
/// client after use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountToken {
    /// Account the token is scoped to.
    pub account_id: AccountId,
    /// When the token was issued.
    pub issued_at: DateTime<Utc>,
    signature: String,
}

impl AccountToken {
    /// Encodes the token as an opaque URL-safe string.
    pub fn encode(&self) -> String {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

        let raw = format!(
            "{}:{}:{}",
            self.account_id.as_str(),
            self.issued_at.timestamp(),
            self.signature
        );
        URL_SAFE_NO_PAD.encode(raw)
    }

    fn decode(encoded: &str) -> Result<Self, TokenError> {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

        let raw = URL_SAFE_NO_PAD.decode(encoded).map_err(|_| TokenError::Malformed)?;
        let raw = String::from_utf8(raw).map_err(|_| TokenError::Malformed)?;

        // Account ids may contain ':'; the two fixed fields are rightmost.
        let mut parts = raw.rsplitn(3, ':');
        let signature = parts.next().ok_or(TokenError::Malformed)?.to_string();
        let issued_at_secs: i64 =
            parts.next().ok_or(TokenError::Malformed)?.parse().map_err(|_| TokenError::Malformed)?;
        let account = parts.next().ok_or(TokenError::Malformed)?;
        if account.is_empty() {
            return Err(TokenError::Malformed);
        }

        let issued_at =
            Utc.timestamp_opt(issued_at_secs, 0).single().ok_or(TokenError::Malformed)?;

        Ok(Self { account_id: AccountId::from(account), issued_at, signature })
    }
}

/// Encodes and validates account-scoped tokens against the global secret.
///
/// The secret is injected at construction and immutable for the process
/// lifetime; rotation means restarting with a new secret, which invalidates
/// all outstanding tokens.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    secret: String,
}

impl TokenCodec {
    /// Creates a codec signing with the given global secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    /// Issues a token scoped to the given account.
    ///
    /// Deterministic given the account, the clock reading, and the secret.
    /// No side effects beyond reading the clock.
    pub fn issue(&self, account_id: &AccountId, clock: &dyn Clock) -> AccountToken {
        let issued_at = clock.now_utc();
        let signature = self.sign(account_id, issued_at.timestamp());
        AccountToken { account_id: account_id.clone(), issued_at, signature }
    }

    /// Validates an encoded token against the account claimed in the request.
    ///
    /// Recomputes the digest over the token's own fields and compares in
    /// constant time, then checks the token's account against the
    /// URL-supplied one. Fails with `InvalidSignature` on digest mismatch and
    /// `AccountMismatch` when the scopes differ.
    pub fn validate(
        &self,
        encoded: &str,
        claimed_account: &AccountId,
    ) -> Result<AccountToken, TokenError> {
        let token = AccountToken::decode(encoded)?;

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| TokenError::InvalidSignature)?;
        mac.update(Self::payload(&token.account_id, token.issued_at.timestamp()).as_bytes());

        let signature = hex::decode(&token.signature).map_err(|_| TokenError::Malformed)?;
        // Mac::verify_slice is constant-time.
        mac.verify_slice(&signature).map_err(|_| TokenError::InvalidSignature)?;

        if token.account_id != *claimed_account {
            return Err(TokenError::AccountMismatch);
        }

        Ok(token)
    }

    fn sign(&self, account_id: &AccountId, issued_at_secs: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(Self::payload(account_id, issued_at_secs).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn payload(account_id: &AccountId, issued_at_secs: i64) -> String {
        format!("{}:{issued_at_secs}", account_id.as_str())
    }
}

/// Constant-time equality for shared-secret comparison.
///
/// Used by the issuance gate to check the caller-supplied global secret
/// without leaking its contents through timing.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::time::TestClock;

    fn codec() -> TokenCodec {
        TokenCodec::new("unit-test-secret")
    }

    #[test]
    fn round_trip_validates() {
        let clock = TestClock::new();
        let account = AccountId::from("acct-1");

        let token = codec().issue(&account, &clock);
        let validated = codec().validate(&token.encode(), &account).expect("valid token");

        assert_eq!(validated.account_id, account);
        assert_eq!(validated.issued_at.timestamp(), token.issued_at.timestamp());
    }

    #[test]
    fn account_mismatch_rejected() {
        let clock = TestClock::new();
        let token = codec().issue(&AccountId::from("acct-1"), &clock);

        let err = codec().validate(&token.encode(), &AccountId::from("acct-2")).unwrap_err();
        assert_eq!(err, TokenError::AccountMismatch);
    }

    #[test]
    fn rotated_secret_invalidates_outstanding_tokens() {
        let clock = TestClock::new();
        let account = AccountId::from("acct-1");
        let token = codec().issue(&account, &clock);

        let rotated = TokenCodec::new("rotated-secret");
        let err = rotated.validate(&token.encode(), &account).unwrap_err();
        assert_eq!(err, TokenError::InvalidSignature);
    }

    #[test]
    fn tampered_token_rejected() {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

        let clock = TestClock::new();
        let account = AccountId::from("acct-1");
        let token = codec().issue(&account, &clock);

        let raw = URL_SAFE_NO_PAD.decode(token.encode()).unwrap();
        let mut raw = String::from_utf8(raw).unwrap();
        // Flip the issued_at field while keeping the old signature.
        raw = raw.replacen(&token.issued_at.timestamp().to_string(), "0", 1);
        let tampered = URL_SAFE_NO_PAD.encode(raw);

        let err = codec().validate(&tampered, &account).unwrap_err();
        assert_eq!(err, TokenError::InvalidSignature);
    }

    #[test]
    fn garbage_token_is_malformed() {
        assert_eq!(
            codec().validate("not-a-token", &AccountId::from("acct-1")).unwrap_err(),
            TokenError::Malformed
        );
        assert_eq!(
            codec().validate("", &AccountId::from("acct-1")).unwrap_err(),
            TokenError::Malformed
        );
    }

    #[test]
    fn account_ids_with_colons_survive_encoding() {
        let clock = TestClock::new();
        let account = AccountId::from("org:team:acct");

        let token = codec().issue(&account, &clock);
        let validated = codec().validate(&token.encode(), &account).expect("valid token");

        assert_eq!(validated.account_id, account);
    }

    #[test]
    fn constant_time_eq_behaves_like_eq() {
        assert!(constant_time_eq("secret", "secret"));
        assert!(!constant_time_eq("secret", "secreT"));
        assert!(!constant_time_eq("secret", "secret-longer"));
        assert!(constant_time_eq("", ""));
    }

    proptest! {
        #[test]
        fn round_trip_for_arbitrary_accounts(
            account in "[a-zA-Z0-9:_-]{1,64}",
            secret in "[ -~]{1,64}",
        ) {
            let clock = TestClock::new();
            let account = AccountId::from(account.as_str());
            let codec = TokenCodec::new(secret);

            let token = codec.issue(&account, &clock);
            prop_assert!(codec.validate(&token.encode(), &account).is_ok());
        }

        #[test]
        fn validation_never_panics_on_arbitrary_input(input in ".*") {
            let _ = codec().validate(&input, &AccountId::from("acct-1"));
        }
    }
}
