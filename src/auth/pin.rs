use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::{FromRow, PgPool};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

pub const PIN_TTL_MINUTES: i64 = 5;
pub const MAX_ATTEMPTS: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinPurpose {
    Login,
    Verification,
}

impl PinPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            PinPurpose::Login => "login",
            PinPurpose::Verification => "verification",
        }
    }

    /// Anything other than an explicit "verification" is treated as login.
    pub fn parse_lenient(s: Option<&str>) -> Self {
        match s {
            Some("verification") => PinPurpose::Verification,
            _ => PinPurpose::Login,
        }
    }
}

/// One-time code record. The plaintext code is never stored.
#[derive(Debug, Clone, FromRow)]
pub struct AuthPin {
    pub id: Uuid,
    pub email: String,
    pub pin_hash: String,
    pub purpose: String,
    pub expires_at: OffsetDateTime,
    pub used_at: Option<OffsetDateTime>,
    pub attempts: i32,
    pub created_at: OffsetDateTime,
}

/// Uniform 6-digit code; the range makes a leading zero impossible.
pub fn generate_pin() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

pub fn hash_pin(pin: &str) -> String {
    hex::encode(Sha256::digest(pin.as_bytes()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PinVerdict {
    /// Consumed or past expiry.
    NotActive,
    /// Attempt cap reached; even the correct code no longer verifies.
    LockedOut,
    Mismatch,
    Match,
}

/// Decision over a fetched record. The SQL lookup already filters consumed
/// and expired rows; re-checking here keeps the whole policy in one place.
pub(crate) fn judge(record: &AuthPin, pin: &str, now: OffsetDateTime) -> PinVerdict {
    if record.used_at.is_some() || record.expires_at <= now {
        return PinVerdict::NotActive;
    }
    if record.attempts >= MAX_ATTEMPTS {
        return PinVerdict::LockedOut;
    }
    if record.pin_hash == hash_pin(pin) {
        PinVerdict::Match
    } else {
        PinVerdict::Mismatch
    }
}

/// Create a fresh PIN for (email, purpose), invalidating any prior active
/// one in the same transaction. Returns the plaintext for out-of-band
/// delivery only.
pub async fn create_pin(db: &PgPool, email: &str, purpose: PinPurpose) -> anyhow::Result<String> {
    let pin = generate_pin();
    let pin_hash = hash_pin(&pin);
    let expires_at = OffsetDateTime::now_utc() + Duration::minutes(PIN_TTL_MINUTES);

    let mut tx = db.begin().await?;
    sqlx::query(
        r#"
        UPDATE auth_pins SET used_at = NOW()
        WHERE email = $1 AND purpose = $2 AND used_at IS NULL
        "#,
    )
    .bind(email)
    .bind(purpose.as_str())
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO auth_pins (email, pin_hash, purpose, expires_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(email)
    .bind(&pin_hash)
    .bind(purpose.as_str())
    .bind(expires_at)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    debug!(email = %email, purpose = purpose.as_str(), "pin created");
    Ok(pin)
}

/// Verify a submitted code. Failed attempts count toward the cap before the
/// hash comparison; a match consumes the record.
pub async fn verify_pin(
    db: &PgPool,
    email: &str,
    pin: &str,
    purpose: PinPurpose,
) -> anyhow::Result<bool> {
    let record = sqlx::query_as::<_, AuthPin>(
        r#"
        SELECT id, email, pin_hash, purpose, expires_at, used_at, attempts, created_at
        FROM auth_pins
        WHERE email = $1 AND purpose = $2 AND used_at IS NULL AND expires_at > NOW()
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(email)
    .bind(purpose.as_str())
    .fetch_optional(db)
    .await?;

    let Some(record) = record else {
        return Ok(false);
    };

    match judge(&record, pin, OffsetDateTime::now_utc()) {
        PinVerdict::NotActive | PinVerdict::LockedOut => Ok(false),
        verdict => {
            sqlx::query("UPDATE auth_pins SET attempts = attempts + 1 WHERE id = $1")
                .bind(record.id)
                .execute(db)
                .await?;

            if verdict == PinVerdict::Match {
                sqlx::query("UPDATE auth_pins SET used_at = NOW() WHERE id = $1")
                    .bind(record.id)
                    .execute(db)
                    .await?;
                debug!(email = %email, purpose = purpose.as_str(), "pin verified");
                Ok(true)
            } else {
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active_record(pin: &str, attempts: i32) -> AuthPin {
        let now = OffsetDateTime::now_utc();
        AuthPin {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            pin_hash: hash_pin(pin),
            purpose: "login".into(),
            expires_at: now + Duration::minutes(PIN_TTL_MINUTES),
            used_at: None,
            attempts,
            created_at: now,
        }
    }

    #[test]
    fn generated_pin_is_six_digits_without_leading_zero() {
        for _ in 0..1000 {
            let pin = generate_pin();
            assert_eq!(pin.len(), 6);
            let n: u32 = pin.parse().expect("numeric");
            assert!((100_000..=999_999).contains(&n));
        }
    }

    #[test]
    fn hash_is_deterministic_and_code_sensitive() {
        assert_eq!(hash_pin("123456"), hash_pin("123456"));
        assert_ne!(hash_pin("123456"), hash_pin("123457"));
        // plaintext never appears in the stored form
        assert!(!hash_pin("123456").contains("123456"));
    }

    #[test]
    fn correct_code_matches() {
        let rec = active_record("654321", 0);
        let now = OffsetDateTime::now_utc();
        assert_eq!(judge(&rec, "654321", now), PinVerdict::Match);
    }

    #[test]
    fn wrong_code_mismatches_but_record_stays_consumable() {
        let rec = active_record("654321", 3);
        let now = OffsetDateTime::now_utc();
        assert_eq!(judge(&rec, "000000", now), PinVerdict::Mismatch);
        assert_eq!(judge(&rec, "654321", now), PinVerdict::Match);
    }

    #[test]
    fn attempt_cap_locks_out_even_the_correct_code() {
        let rec = active_record("654321", MAX_ATTEMPTS);
        let now = OffsetDateTime::now_utc();
        assert_eq!(judge(&rec, "654321", now), PinVerdict::LockedOut);
    }

    #[test]
    fn consumed_record_never_verifies_again() {
        let mut rec = active_record("654321", 1);
        rec.used_at = Some(OffsetDateTime::now_utc());
        let now = OffsetDateTime::now_utc();
        assert_eq!(judge(&rec, "654321", now), PinVerdict::NotActive);
    }

    #[test]
    fn expired_record_fails_with_zero_prior_attempts() {
        let mut rec = active_record("654321", 0);
        rec.expires_at = OffsetDateTime::now_utc() - Duration::seconds(1);
        let now = OffsetDateTime::now_utc();
        assert_eq!(judge(&rec, "654321", now), PinVerdict::NotActive);
    }

    #[test]
    fn purpose_parsing_defaults_to_login() {
        assert_eq!(PinPurpose::parse_lenient(None), PinPurpose::Login);
        assert_eq!(PinPurpose::parse_lenient(Some("login")), PinPurpose::Login);
        assert_eq!(
            PinPurpose::parse_lenient(Some("verification")),
            PinPurpose::Verification
        );
        assert_eq!(
            PinPurpose::parse_lenient(Some("bogus")),
            PinPurpose::Login
        );
    }
}
