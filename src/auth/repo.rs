use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

pub const STATUS_INACTIVE: &str = "inactive";
pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_BANNED: &str = "banned";

const USER_COLUMNS: &str =
    "id, email, password_hash, firstname, lastname, roles, status, created_at";

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub firstname: String,
    pub lastname: String,
    pub roles: Vec<String>,
    pub status: String,
    pub created_at: OffsetDateTime,
}

impl User {
    /// Role set with the guaranteed baseline role, deduplicated.
    pub fn effective_roles(&self) -> Vec<String> {
        let mut roles = self.roles.clone();
        roles.push(ROLE_USER.to_string());
        roles.sort();
        roles.dedup();
        roles
    }

    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }

    pub fn is_banned(&self) -> bool {
        self.status == STATUS_BANNED
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(db)
                .await?;
        Ok(user)
    }

    /// Create a new inactive user inside the registration transaction.
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        email: &str,
        password_hash: &str,
        firstname: &str,
        lastname: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, firstname, lastname, roles, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(password_hash)
        .bind(firstname)
        .bind(lastname)
        .bind(vec![ROLE_USER.to_string()])
        .bind(STATUS_INACTIVE)
        .fetch_one(&mut **tx)
        .await?;
        Ok(user)
    }

    /// Flip a pending user to active, but only when the firstname matches the
    /// one embedded in the confirmation link. Runs inside the confirmation
    /// transaction so a mismatch rolls the token delete back.
    pub async fn activate_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        firstname: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET status = $3
            WHERE id = $1 AND firstname = $2
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(firstname)
        .bind(STATUS_ACTIVE)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(user)
    }

    /// Partial self-service update; `None` keeps the stored value.
    pub async fn update_partial(
        db: &PgPool,
        id: Uuid,
        email: Option<&str>,
        firstname: Option<&str>,
        lastname: Option<&str>,
        password_hash: Option<&str>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users SET
                email = COALESCE($2, email),
                firstname = COALESCE($3, firstname),
                lastname = COALESCE($4, lastname),
                password_hash = COALESCE($5, password_hash)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(firstname)
        .bind(lastname)
        .bind(password_hash)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Remove the account. Owned articles, products and tokens go with it
    /// (FK cascade).
    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn count(db: &PgPool) -> anyhow::Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(db)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_user(roles: Vec<String>, status: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: "a@b.com".into(),
            password_hash: "hash".into(),
            firstname: "Jo".into(),
            lastname: "Do".into(),
            roles,
            status: status.into(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn effective_roles_always_include_baseline() {
        let user = make_user(vec![], STATUS_INACTIVE);
        assert_eq!(user.effective_roles(), vec![ROLE_USER.to_string()]);
    }

    #[test]
    fn effective_roles_deduplicate() {
        let user = make_user(
            vec![ROLE_ADMIN.into(), ROLE_USER.into(), ROLE_ADMIN.into()],
            STATUS_ACTIVE,
        );
        let roles = user.effective_roles();
        assert_eq!(roles, vec![ROLE_ADMIN.to_string(), ROLE_USER.to_string()]);
    }

    #[test]
    fn status_helpers() {
        assert!(make_user(vec![], STATUS_ACTIVE).is_active());
        assert!(!make_user(vec![], STATUS_INACTIVE).is_active());
        assert!(make_user(vec![], STATUS_BANNED).is_banned());
    }

    #[test]
    fn password_hash_never_serialized() {
        let user = make_user(vec![], STATUS_ACTIVE);
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("hash"));
    }
}
