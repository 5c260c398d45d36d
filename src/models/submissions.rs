use serde::{Deserialize, Serialize};

/// Shared pending/approved/rejected lifecycle used by submissions and the
/// withdrawal/deposit request queues. Both transitions out of pending are
/// terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<ReviewStatus> {
        match value {
            "pending" => Some(ReviewStatus::Pending),
            "approved" => Some(ReviewStatus::Approved),
            "rejected" => Some(ReviewStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Submission {
    pub id: String,
    pub user_id: String,
    pub task_id: String,
    #[serde(skip)]
    pub verification_code: String,
    pub status: String,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

impl Submission {
    pub fn is_pending(&self) -> bool {
        self.status == ReviewStatus::Pending.as_str()
    }
}

/// Returned when a user starts a task: the submission that tracks the
/// attempt and the link to follow (shortened for auto tasks).
#[derive(Clone, Debug, Serialize)]
pub struct StartedTask {
    pub submission_id: String,
    pub task_id: String,
    pub link: String,
    /// Present for manual tasks only: the user hands this code back once the
    /// work is done. Auto tasks reveal the code on the landing page at the
    /// end of the shortened-link chain, never here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_code: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct VerificationPayload {
    pub code: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum VerifyOutcome {
    /// Auto task: settlement ran inline, reward is already credited.
    Settled { reward: i64 },
    /// Manual task: code accepted, waiting for admin approval.
    AwaitingReview,
}

/// What one settlement actually applied, for logging and responses.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SettlementOutcome {
    pub submission_id: String,
    pub user_id: String,
    pub task_id: String,
    pub reward: i64,
    pub referrer_id: Option<String>,
    pub commission: i64,
}
