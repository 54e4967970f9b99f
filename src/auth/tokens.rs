use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::{Postgres, Transaction};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Raw tokens are `tk_` + 40 hex chars; only the SHA-256 of the raw value is
/// ever stored, so a database read cannot leak a usable token.
pub const TOKEN_PREFIX: &str = "tk_";

pub const TOKEN_TTL_MINUTES: i64 = 10;

pub fn generate_token() -> String {
    let mut bytes = [0u8; 20];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    format!("{}{}", TOKEN_PREFIX, hex::encode(bytes))
}

pub fn hash_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

pub fn expiry_from(now: OffsetDateTime) -> OffsetDateTime {
    now + Duration::minutes(TOKEN_TTL_MINUTES)
}

/// Splits the public confirmation identifier `{firstname}_{tk_<hex>}`.
/// Firstnames may themselves contain underscores; the `_tk_` marker is
/// unambiguous because the token body is plain hex.
pub fn split_confirmation_id(composite: &str) -> Option<(&str, String)> {
    let (firstname, body) = composite.rsplit_once("_tk_")?;
    if firstname.is_empty() || body.is_empty() {
        return None;
    }
    Some((firstname, format!("{TOKEN_PREFIX}{body}")))
}

/// Store the hashed token alongside the freshly created user.
pub async fn insert_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    token_hash: &str,
    expires_at: OffsetDateTime,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO activation_tokens (token_hash, expires_at, user_id)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(token_hash)
    .bind(expires_at)
    .bind(user_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Atomic check-and-delete. Returns the owning user id when an unexpired
/// token row existed; two concurrent confirmations cannot both get it.
pub async fn consume_tx(
    tx: &mut Transaction<'_, Postgres>,
    token_hash: &str,
    now: OffsetDateTime,
) -> anyhow::Result<Option<Uuid>> {
    let user_id = sqlx::query_scalar::<_, Uuid>(
        r#"
        DELETE FROM activation_tokens
        WHERE token_hash = $1 AND expires_at > $2
        RETURNING user_id
        "#,
    )
    .bind(token_hash)
    .bind(now)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_have_prefix_and_entropy() {
        let token = generate_token();
        assert!(token.starts_with(TOKEN_PREFIX));
        assert_eq!(token.len(), TOKEN_PREFIX.len() + 40);
        assert!(token[TOKEN_PREFIX.len()..]
            .chars()
            .all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn hashing_is_deterministic_and_tamper_sensitive() {
        let token = generate_token();
        assert_eq!(hash_token(&token), hash_token(&token));

        let mut tampered = token.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == '0' { '1' } else { '0' });
        assert_ne!(hash_token(&token), hash_token(&tampered));
    }

    #[test]
    fn expiry_is_ten_minutes_out() {
        let now = OffsetDateTime::now_utc();
        assert_eq!(expiry_from(now) - now, Duration::minutes(10));
    }

    #[test]
    fn confirmation_id_splits_on_token_marker() {
        let (firstname, token) = split_confirmation_id("Jo_tk_abc123").unwrap();
        assert_eq!(firstname, "Jo");
        assert_eq!(token, "tk_abc123");
    }

    #[test]
    fn confirmation_id_allows_underscored_firstnames() {
        let (firstname, token) = split_confirmation_id("Jean_Luc_tk_00ff").unwrap();
        assert_eq!(firstname, "Jean_Luc");
        assert_eq!(token, "tk_00ff");
    }

    #[test]
    fn confirmation_id_rejects_malformed_input() {
        assert!(split_confirmation_id("no-token-here").is_none());
        assert!(split_confirmation_id("_tk_abc").is_none());
        assert!(split_confirmation_id("Jo_tk_").is_none());
    }
}
