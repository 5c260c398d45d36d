use crate::models::deposits::Deposit;
use crate::repositories::LedgerError;

use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct DepositRepository {
    conn: PgPool,
}

impl DepositRepository {
    pub fn new(conn: PgPool) -> Self {
        DepositRepository { conn }
    }

    /// A deposit request has no balance effect until an admin approves it.
    pub async fn create_request(
        &self,
        user_id: &str,
        amount: i64,
    ) -> Result<Deposit, LedgerError> {
        let deposit_id = Uuid::new_v4().hyphenated().to_string();

        let deposit = sqlx::query_as::<_, Deposit>(
            r#"
                INSERT INTO deposits (id, user_id, amount, status)
                VALUES ($1, $2, $3, 'pending')
                RETURNING *
            "#,
        )
        .bind(&deposit_id)
        .bind(user_id)
        .bind(amount)
        .fetch_one(&self.conn)
        .await?;

        Ok(deposit)
    }

    /// Credits the balance exactly once: the pending -> approved CAS and the
    /// credit share one transaction.
    pub async fn approve(&self, deposit_id: &str) -> Result<Deposit, LedgerError> {
        let mut tx = self.conn.begin().await?;

        let deposit = sqlx::query_as::<_, Deposit>(
            r#"
                UPDATE deposits
                SET status = 'approved', updated_at = CURRENT_TIMESTAMP
                WHERE id = $1 AND status = 'pending'
                RETURNING *
            "#,
        )
        .bind(deposit_id)
        .fetch_optional(&mut *tx)
        .await?;

        let deposit = match deposit {
            Some(deposit) => deposit,
            None => return Err(self.pending_miss(deposit_id).await?),
        };

        sqlx::query(
            r#"
                UPDATE users
                SET balance = balance + $1, updated_at = CURRENT_TIMESTAMP
                WHERE id = $2
            "#,
        )
        .bind(deposit.amount)
        .bind(&deposit.user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(deposit)
    }

    pub async fn reject(&self, deposit_id: &str) -> Result<Deposit, LedgerError> {
        let deposit = sqlx::query_as::<_, Deposit>(
            r#"
                UPDATE deposits
                SET status = 'rejected', updated_at = CURRENT_TIMESTAMP
                WHERE id = $1 AND status = 'pending'
                RETURNING *
            "#,
        )
        .bind(deposit_id)
        .fetch_optional(&self.conn)
        .await?;

        match deposit {
            Some(deposit) => Ok(deposit),
            None => Err(self.pending_miss(deposit_id).await?),
        }
    }

    async fn pending_miss(&self, deposit_id: &str) -> Result<LedgerError, LedgerError> {
        let exists: Option<String> =
            sqlx::query_scalar("SELECT status FROM deposits WHERE id = $1")
                .bind(deposit_id)
                .fetch_optional(&self.conn)
                .await?;

        Ok(match exists {
            None => LedgerError::NotFound(deposit_id.to_string()),
            Some(_) => LedgerError::NotPending(deposit_id.to_string()),
        })
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Deposit>, LedgerError> {
        let deposits = sqlx::query_as::<_, Deposit>(
            "SELECT * FROM deposits WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(deposits)
    }

    pub async fn list_pending(&self) -> Result<Vec<Deposit>, LedgerError> {
        let deposits = sqlx::query_as::<_, Deposit>(
            "SELECT * FROM deposits WHERE status = 'pending' ORDER BY created_at ASC",
        )
        .fetch_all(&self.conn)
        .await?;

        Ok(deposits)
    }
}
