use crate::models::withdrawals::Withdrawal;
use crate::repositories::LedgerError;

use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct WithdrawalRepository {
    conn: PgPool,
}

impl WithdrawalRepository {
    pub fn new(conn: PgPool) -> Self {
        WithdrawalRepository { conn }
    }

    /// Files a withdrawal request and reserves the amount in the same
    /// transaction. The conditional UPDATE is both the balance check and the
    /// reservation: with `balance - reserved_balance >= amount` evaluated
    /// under the row lock, two concurrent requests cannot jointly overdraw.
    /// No request row is created when funds are insufficient.
    pub async fn create_request(
        &self,
        user_id: &str,
        amount: i64,
        method: &str,
        details: &str,
    ) -> Result<Withdrawal, LedgerError> {
        let mut tx = self.conn.begin().await?;

        let reserved = sqlx::query(
            r#"
                UPDATE users
                SET reserved_balance = reserved_balance + $1, updated_at = CURRENT_TIMESTAMP
                WHERE id = $2 AND balance - reserved_balance >= $1
            "#,
        )
        .bind(amount)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if reserved == 0 {
            return Err(LedgerError::InsufficientFunds);
        }

        let withdrawal_id = Uuid::new_v4().hyphenated().to_string();
        let withdrawal = sqlx::query_as::<_, Withdrawal>(
            r#"
                INSERT INTO withdrawals (id, user_id, amount, method, details, status)
                VALUES ($1, $2, $3, $4, $5, 'pending')
                RETURNING *
            "#,
        )
        .bind(&withdrawal_id)
        .bind(user_id)
        .bind(amount)
        .bind(method)
        .bind(details)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(withdrawal)
    }

    /// Finalizes the debit that was reserved at request time. Available
    /// balance does not change here - only the held funds leave the account.
    pub async fn approve(&self, withdrawal_id: &str) -> Result<Withdrawal, LedgerError> {
        let mut tx = self.conn.begin().await?;

        let withdrawal = self.claim_pending(&mut tx, withdrawal_id, "approved").await?;

        sqlx::query(
            r#"
                UPDATE users
                SET balance = balance - $1,
                    reserved_balance = reserved_balance - $1,
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = $2
            "#,
        )
        .bind(withdrawal.amount)
        .bind(&withdrawal.user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(withdrawal)
    }

    /// Releases the hold; the full amount becomes available again.
    pub async fn reject(&self, withdrawal_id: &str) -> Result<Withdrawal, LedgerError> {
        let mut tx = self.conn.begin().await?;

        let withdrawal = self.claim_pending(&mut tx, withdrawal_id, "rejected").await?;

        sqlx::query(
            r#"
                UPDATE users
                SET reserved_balance = reserved_balance - $1, updated_at = CURRENT_TIMESTAMP
                WHERE id = $2
            "#,
        )
        .bind(withdrawal.amount)
        .bind(&withdrawal.user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(withdrawal)
    }

    async fn claim_pending(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        withdrawal_id: &str,
        next_status: &str,
    ) -> Result<Withdrawal, LedgerError> {
        let withdrawal = sqlx::query_as::<_, Withdrawal>(
            r#"
                UPDATE withdrawals
                SET status = $2, updated_at = CURRENT_TIMESTAMP
                WHERE id = $1 AND status = 'pending'
                RETURNING *
            "#,
        )
        .bind(withdrawal_id)
        .bind(next_status)
        .fetch_optional(&mut **tx)
        .await?;

        match withdrawal {
            Some(withdrawal) => Ok(withdrawal),
            None => {
                let exists: Option<String> =
                    sqlx::query_scalar("SELECT status FROM withdrawals WHERE id = $1")
                        .bind(withdrawal_id)
                        .fetch_optional(&mut **tx)
                        .await?;

                Err(match exists {
                    None => LedgerError::NotFound(withdrawal_id.to_string()),
                    Some(_) => LedgerError::NotPending(withdrawal_id.to_string()),
                })
            }
        }
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Withdrawal>, LedgerError> {
        let withdrawals = sqlx::query_as::<_, Withdrawal>(
            "SELECT * FROM withdrawals WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(withdrawals)
    }

    pub async fn list_pending(&self) -> Result<Vec<Withdrawal>, LedgerError> {
        let withdrawals = sqlx::query_as::<_, Withdrawal>(
            "SELECT * FROM withdrawals WHERE status = 'pending' ORDER BY created_at ASC",
        )
        .fetch_all(&self.conn)
        .await?;

        Ok(withdrawals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed_user(pool: &PgPool, id: &str, balance: i64) {
        sqlx::query(
            r#"
                INSERT INTO users
                (id, username, email, password_hash, password_salt, referral_code, balance)
                VALUES ($1, $1, $1 || '@example.com', 'h', 's', $1 || '-code', $2)
            "#,
        )
        .bind(id)
        .bind(balance)
        .execute(pool)
        .await
        .unwrap();
    }

    async fn balances_of(pool: &PgPool, user_id: &str) -> (i64, i64) {
        sqlx::query_as("SELECT balance, reserved_balance FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test]
    async fn overdraw_is_rejected_before_any_mutation(pool: PgPool) {
        seed_user(&pool, "u1", 15_000).await;

        let repository = WithdrawalRepository::new(pool.clone());
        let result = repository
            .create_request("u1", 20_000, "bank", "VCB 0123456789")
            .await;
        assert!(matches!(result, Err(LedgerError::InsufficientFunds)));

        assert_eq!(balances_of(&pool, "u1").await, (15_000, 0));
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM withdrawals")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[sqlx::test]
    async fn reject_releases_the_reservation(pool: PgPool) {
        seed_user(&pool, "u1", 50_000).await;

        let repository = WithdrawalRepository::new(pool.clone());
        let withdrawal = repository
            .create_request("u1", 20_000, "bank", "VCB 0123456789")
            .await
            .unwrap();
        assert_eq!(balances_of(&pool, "u1").await, (50_000, 20_000));

        let rejected = repository.reject(&withdrawal.id).await.unwrap();
        assert_eq!(rejected.status, "rejected");
        assert_eq!(balances_of(&pool, "u1").await, (50_000, 0));
    }

    #[sqlx::test]
    async fn approve_spends_the_reserved_funds(pool: PgPool) {
        seed_user(&pool, "u1", 50_000).await;

        let repository = WithdrawalRepository::new(pool.clone());
        let withdrawal = repository
            .create_request("u1", 20_000, "bank", "VCB 0123456789")
            .await
            .unwrap();

        // Available balance is 30_000 before and after the approval; only
        // the hold leaves the account.
        let approved = repository.approve(&withdrawal.id).await.unwrap();
        assert_eq!(approved.status, "approved");
        assert_eq!(balances_of(&pool, "u1").await, (30_000, 0));

        let again = repository.approve(&withdrawal.id).await;
        assert!(matches!(again, Err(LedgerError::NotPending(_))));
        assert_eq!(balances_of(&pool, "u1").await, (30_000, 0));
    }

    #[sqlx::test]
    async fn concurrent_requests_cannot_jointly_overdraw(pool: PgPool) {
        seed_user(&pool, "u1", 30_000).await;

        let repository = WithdrawalRepository::new(pool.clone());
        let (a, b) = tokio::join!(
            repository.create_request("u1", 20_000, "bank", "VCB 0123456789"),
            repository.create_request("u1", 20_000, "bank", "VCB 0123456789")
        );

        let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);
        assert_eq!(balances_of(&pool, "u1").await, (30_000, 20_000));
    }
}
