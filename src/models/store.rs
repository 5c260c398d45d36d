use serde::Serialize;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct StoreItem {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub kind: String,
    pub status: String,
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Purchase {
    pub id: String,
    pub user_id: String,
    pub item_id: String,
    pub price: i64,
    pub created_at: chrono::NaiveDateTime,
}
