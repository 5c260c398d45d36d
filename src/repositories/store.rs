use crate::models::store::{Purchase, StoreItem};
use crate::repositories::LedgerError;

use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct StoreRepository {
    conn: PgPool,
}

impl StoreRepository {
    pub fn new(conn: PgPool) -> Self {
        StoreRepository { conn }
    }

    pub async fn list_items(&self) -> Result<Vec<StoreItem>, LedgerError> {
        let items = sqlx::query_as::<_, StoreItem>(
            "SELECT * FROM store_items WHERE status = 'active' ORDER BY price ASC",
        )
        .fetch_all(&self.conn)
        .await?;

        Ok(items)
    }

    /// Debits the item price against the available balance with the same
    /// conditional-UPDATE guard the withdrawal queue uses, then records the
    /// purchase, all in one transaction.
    pub async fn purchase(&self, user_id: &str, item_id: &str) -> Result<Purchase, LedgerError> {
        let mut tx = self.conn.begin().await?;

        let item: Option<(i64, String)> =
            sqlx::query_as("SELECT price, status FROM store_items WHERE id = $1")
                .bind(item_id)
                .fetch_optional(&mut *tx)
                .await?;

        let price = match item {
            Some((price, status)) if status == "active" => price,
            _ => return Err(LedgerError::NotFound(item_id.to_string())),
        };

        let debited = sqlx::query(
            r#"
                UPDATE users
                SET balance = balance - $1, updated_at = CURRENT_TIMESTAMP
                WHERE id = $2 AND balance - reserved_balance >= $1
            "#,
        )
        .bind(price)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if debited == 0 {
            return Err(LedgerError::InsufficientFunds);
        }

        let purchase_id = Uuid::new_v4().hyphenated().to_string();
        let purchase = sqlx::query_as::<_, Purchase>(
            r#"
                INSERT INTO store_purchases (id, user_id, item_id, price)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            "#,
        )
        .bind(&purchase_id)
        .bind(user_id)
        .bind(item_id)
        .bind(price)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(purchase)
    }

    pub async fn list_purchases(&self, user_id: &str) -> Result<Vec<Purchase>, LedgerError> {
        let purchases = sqlx::query_as::<_, Purchase>(
            "SELECT * FROM store_purchases WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(purchases)
    }
}
