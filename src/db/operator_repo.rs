use sqlx::PgPool;

use crate::models::operator::operator_role;
use crate::models::Operator;

/// Fetch all operators, oldest account first.
pub async fn get_operators(pool: &PgPool) -> anyhow::Result<Vec<Operator>> {
    let rows = sqlx::query_as::<_, Operator>(
        r#"
        SELECT id, username, role, is_active, clocked_in, created_at
        FROM operators
        ORDER BY created_at ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Create an operator, returning the existing row when the username is taken.
pub async fn upsert_operator(pool: &PgPool, username: &str, role: &str) -> anyhow::Result<Operator> {
    let role = if role == operator_role::ADMIN {
        operator_role::ADMIN
    } else {
        operator_role::PAYER
    };

    let op = sqlx::query_as::<_, Operator>(
        r#"
        INSERT INTO operators (username, role)
        VALUES ($1, $2)
        ON CONFLICT (username) DO UPDATE SET updated_at = NOW()
        RETURNING id, username, role, is_active, clocked_in, created_at
        "#,
    )
    .bind(username)
    .bind(role)
    .fetch_one(pool)
    .await?;

    Ok(op)
}
