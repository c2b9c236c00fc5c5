use crate::domain::{NewUser, User, UserId, UserQuery};
use crate::ports::identity::{Identity as IdentityTrait, Result, UserCreate};
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

fn map_row_to_user(row: &PgRow) -> User {
    User {
        user_id: UserId::new(row.get("id")),
        name: row.get("name"),
        email: row.get("email"),
    }
}

/// PostgreSQL implementation of Identity
///
/// Email uniqueness is enforced by the `users.email` constraint.
pub struct Identity {
    pool: PgPool,
}

impl Identity {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityTrait for Identity {
    async fn create_user(&self, user: NewUser) -> Result<UserCreate> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (name, email)
            VALUES ($1, $2)
            ON CONFLICT (email) DO NOTHING
            RETURNING id, name, email
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => UserCreate::Created(map_row_to_user(&row)),
            None => UserCreate::EmailTaken,
        })
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, name, email FROM users WHERE id = $1")
            .bind(user_id.value())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(map_row_to_user))
    }

    async fn list_users(&self, query: UserQuery) -> Result<Vec<User>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, email
            FROM users
            WHERE ($1::VARCHAR IS NULL OR strpos(name, $1) > 0)
              AND ($2::VARCHAR IS NULL OR strpos(email, $2) > 0)
            ORDER BY name ASC, id ASC
            "#,
        )
        .bind(query.name)
        .bind(query.email)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(map_row_to_user).collect())
    }
}
