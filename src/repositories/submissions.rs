use crate::models::submissions::{SettlementOutcome, Submission};
use crate::models::tasks::TaskStatus;

use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

/// Settlement failures are typed rather than stringly: the double-approval
/// and missing-task cases must reach the caller distinguishable, never be
/// folded into a generic error.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("submission {0} not found")]
    SubmissionNotFound(String),
    #[error("submission {0} is already settled")]
    AlreadySettled(String),
    #[error("task {0} is missing or inactive")]
    TaskUnavailable(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Referral commission in Xu for a settled reward. Integer floor, rate in
/// basis points (500 = 5%).
pub fn commission_for(reward: i64, commission_bps: i64) -> i64 {
    reward * commission_bps / 10_000
}

#[derive(Clone)]
pub struct SubmissionRepository {
    conn: PgPool,
}

impl SubmissionRepository {
    pub fn new(conn: PgPool) -> Self {
        SubmissionRepository { conn }
    }

    pub async fn insert_submission(
        &self,
        user_id: &str,
        task_id: &str,
        verification_code: &str,
    ) -> Result<Submission, anyhow::Error> {
        let submission_id = Uuid::new_v4().hyphenated().to_string();

        let submission = sqlx::query_as::<_, Submission>(
            r#"
                INSERT INTO submissions (id, user_id, task_id, verification_code, status)
                VALUES ($1, $2, $3, $4, 'pending')
                RETURNING *
            "#,
        )
        .bind(&submission_id)
        .bind(user_id)
        .bind(task_id)
        .bind(verification_code)
        .fetch_one(&self.conn)
        .await?;

        Ok(submission)
    }

    pub async fn get_submission(
        &self,
        submission_id: &str,
    ) -> Result<Option<Submission>, anyhow::Error> {
        let submission =
            sqlx::query_as::<_, Submission>("SELECT * FROM submissions WHERE id = $1")
                .bind(submission_id)
                .fetch_optional(&self.conn)
                .await?;

        Ok(submission)
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Submission>, anyhow::Error> {
        let submissions = sqlx::query_as::<_, Submission>(
            "SELECT * FROM submissions WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(submissions)
    }

    pub async fn list_pending(&self) -> Result<Vec<Submission>, anyhow::Error> {
        let submissions = sqlx::query_as::<_, Submission>(
            "SELECT * FROM submissions WHERE status = 'pending' ORDER BY created_at ASC",
        )
        .fetch_all(&self.conn)
        .await?;

        Ok(submissions)
    }

    /// Settles one approved submission: flips it pending -> approved, credits
    /// the performer, and pays referral commission if the performer was
    /// referred. Runs as a single database transaction; the conditional
    /// UPDATE on the submission row is the exactly-once guard, so invoking
    /// this twice for the same id credits once and then fails with
    /// `AlreadySettled`. All balance arithmetic happens server-side
    /// (`balance = balance + $n`), so concurrent settlements against the
    /// same user cannot lose updates.
    pub async fn settle(
        &self,
        submission_id: &str,
        commission_bps: i64,
    ) -> Result<SettlementOutcome, SettlementError> {
        let mut tx = self.conn.begin().await?;

        let claimed: Option<(String, String)> = sqlx::query_as(
            r#"
                UPDATE submissions
                SET status = 'approved', updated_at = CURRENT_TIMESTAMP
                WHERE id = $1 AND status = 'pending'
                RETURNING user_id, task_id
            "#,
        )
        .bind(submission_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (user_id, task_id) = match claimed {
            Some(pair) => pair,
            None => {
                let status: Option<String> =
                    sqlx::query_scalar("SELECT status FROM submissions WHERE id = $1")
                        .bind(submission_id)
                        .fetch_optional(&mut *tx)
                        .await?;

                return Err(match status {
                    None => SettlementError::SubmissionNotFound(submission_id.to_string()),
                    Some(_) => SettlementError::AlreadySettled(submission_id.to_string()),
                });
            }
        };

        // The reward always comes from the task row, never from the caller.
        let task: Option<(i64, String)> =
            sqlx::query_as("SELECT reward, status FROM tasks WHERE id = $1")
                .bind(&task_id)
                .fetch_optional(&mut *tx)
                .await?;

        let reward = match task {
            Some((reward, status)) if status == TaskStatus::Active.as_str() => reward,
            _ => return Err(SettlementError::TaskUnavailable(task_id)),
        };

        let referred_by: Option<String> = sqlx::query_scalar(
            r#"
                UPDATE users
                SET balance = balance + $1, updated_at = CURRENT_TIMESTAMP
                WHERE id = $2
                RETURNING referred_by
            "#,
        )
        .bind(reward)
        .bind(&user_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut outcome = SettlementOutcome {
            submission_id: submission_id.to_string(),
            user_id,
            task_id,
            reward,
            referrer_id: None,
            commission: 0,
        };

        if let Some(referrer) = referred_by {
            let commission = commission_for(reward, commission_bps);
            if commission > 0 {
                let credited = sqlx::query(
                    r#"
                        UPDATE users
                        SET balance = balance + $1,
                            referral_earned = referral_earned + $1,
                            updated_at = CURRENT_TIMESTAMP
                        WHERE id = $2
                    "#,
                )
                .bind(commission)
                .bind(&referrer)
                .execute(&mut *tx)
                .await?
                .rows_affected();

                if credited == 0 {
                    // Performer still gets paid; commission is best-effort.
                    log::warn!(
                        "referrer {} of user {} no longer exists, commission skipped",
                        referrer,
                        outcome.user_id
                    );
                } else {
                    outcome.referrer_id = Some(referrer);
                    outcome.commission = commission;
                }
            }
        }

        tx.commit().await?;

        Ok(outcome)
    }

    /// Admin rejection; same compare-and-swap rule as settlement so a
    /// settled submission can never be flipped back.
    pub async fn reject(&self, submission_id: &str) -> Result<(), SettlementError> {
        let rejected = sqlx::query(
            r#"
                UPDATE submissions
                SET status = 'rejected', updated_at = CURRENT_TIMESTAMP
                WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(submission_id)
        .execute(&self.conn)
        .await?
        .rows_affected();

        if rejected == 0 {
            let status: Option<String> =
                sqlx::query_scalar("SELECT status FROM submissions WHERE id = $1")
                    .bind(submission_id)
                    .fetch_optional(&self.conn)
                    .await?;

            return Err(match status {
                None => SettlementError::SubmissionNotFound(submission_id.to_string()),
                Some(_) => SettlementError::AlreadySettled(submission_id.to_string()),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commission_is_floored() {
        // 5% of 600 = 30, exact
        assert_eq!(commission_for(600, 500), 30);
        // 5% of 599 = 29.95, floors to 29
        assert_eq!(commission_for(599, 500), 29);
        // 5% of 19 = 0.95, floors to zero
        assert_eq!(commission_for(19, 500), 0);
    }

    #[test]
    fn commission_rate_edges() {
        assert_eq!(commission_for(500, 0), 0);
        assert_eq!(commission_for(0, 500), 0);
        assert_eq!(commission_for(500, 10_000), 500);
    }

    async fn seed_user(pool: &PgPool, id: &str, referred_by: Option<&str>) {
        sqlx::query(
            r#"
                INSERT INTO users
                (id, username, email, password_hash, password_salt, referral_code, referred_by)
                VALUES ($1, $1, $1 || '@example.com', 'h', 's', $1 || '-code', $2)
            "#,
        )
        .bind(id)
        .bind(referred_by)
        .execute(pool)
        .await
        .unwrap();
    }

    async fn seed_task(pool: &PgPool, id: &str, reward: i64) {
        sqlx::query(
            r#"
                INSERT INTO tasks (id, title, reward, mode, destination_url)
                VALUES ($1, $1, $2, 'manual', 'https://example.com')
            "#,
        )
        .bind(id)
        .bind(reward)
        .execute(pool)
        .await
        .unwrap();
    }

    async fn balance_of(pool: &PgPool, user_id: &str) -> i64 {
        sqlx::query_scalar("SELECT balance FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test]
    async fn settling_twice_credits_once(pool: PgPool) {
        seed_user(&pool, "u1", None).await;
        seed_task(&pool, "t1", 600).await;

        let repository = SubmissionRepository::new(pool.clone());
        let submission = repository
            .insert_submission("u1", "t1", "code")
            .await
            .unwrap();

        let outcome = repository.settle(&submission.id, 500).await.unwrap();
        assert_eq!(outcome.reward, 600);
        assert_eq!(outcome.referrer_id, None);

        let second = repository.settle(&submission.id, 500).await;
        assert!(matches!(second, Err(SettlementError::AlreadySettled(_))));

        assert_eq!(balance_of(&pool, "u1").await, 600);
    }

    #[sqlx::test]
    async fn concurrent_settlements_do_not_lose_updates(pool: PgPool) {
        seed_user(&pool, "u1", None).await;
        seed_task(&pool, "t1", 600).await;
        seed_task(&pool, "t2", 250).await;

        let repository = SubmissionRepository::new(pool.clone());
        let first = repository
            .insert_submission("u1", "t1", "code1")
            .await
            .unwrap();
        let second = repository
            .insert_submission("u1", "t2", "code2")
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            repository.settle(&first.id, 500),
            repository.settle(&second.id, 500)
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(balance_of(&pool, "u1").await, 850);
    }

    #[sqlx::test]
    async fn referral_commission_reaches_the_referrer(pool: PgPool) {
        seed_user(&pool, "referrer", None).await;
        seed_user(&pool, "performer", Some("referrer")).await;
        seed_task(&pool, "t1", 600).await;

        let repository = SubmissionRepository::new(pool.clone());
        let submission = repository
            .insert_submission("performer", "t1", "code")
            .await
            .unwrap();

        let outcome = repository.settle(&submission.id, 500).await.unwrap();
        assert_eq!(outcome.referrer_id.as_deref(), Some("referrer"));
        assert_eq!(outcome.commission, 30);

        assert_eq!(balance_of(&pool, "performer").await, 600);
        assert_eq!(balance_of(&pool, "referrer").await, 30);

        let earned: i64 =
            sqlx::query_scalar("SELECT referral_earned FROM users WHERE id = 'referrer'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(earned, 30);
    }

    #[sqlx::test]
    async fn rejection_is_terminal_too(pool: PgPool) {
        seed_user(&pool, "u1", None).await;
        seed_task(&pool, "t1", 600).await;

        let repository = SubmissionRepository::new(pool.clone());
        let submission = repository
            .insert_submission("u1", "t1", "code")
            .await
            .unwrap();

        repository.reject(&submission.id).await.unwrap();

        let settle = repository.settle(&submission.id, 500).await;
        assert!(matches!(settle, Err(SettlementError::AlreadySettled(_))));
        assert_eq!(balance_of(&pool, "u1").await, 0);
    }
}
