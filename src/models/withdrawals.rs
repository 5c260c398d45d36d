use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WithdrawalMethod {
    Bank,
    GameCard,
}

impl WithdrawalMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalMethod::Bank => "bank",
            WithdrawalMethod::GameCard => "gamecard",
        }
    }

    pub fn parse(value: &str) -> Option<WithdrawalMethod> {
        match value {
            "bank" => Some(WithdrawalMethod::Bank),
            "gamecard" => Some(WithdrawalMethod::GameCard),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Withdrawal {
    pub id: String,
    pub user_id: String,
    pub amount: i64,
    pub method: String,
    pub details: String,
    pub status: String,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewWithdrawal {
    pub amount: i64,
    pub method: String,
    pub details: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parses_known_values_only() {
        assert_eq!(WithdrawalMethod::parse("bank"), Some(WithdrawalMethod::Bank));
        assert_eq!(
            WithdrawalMethod::parse("gamecard"),
            Some(WithdrawalMethod::GameCard)
        );
        assert_eq!(WithdrawalMethod::parse("BANK"), None);
        assert_eq!(WithdrawalMethod::parse("paypal"), None);
    }
}
