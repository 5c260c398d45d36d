use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskMode {
    Auto,
    Manual,
}

impl TaskMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskMode::Auto => "auto",
            TaskMode::Manual => "manual",
        }
    }

    pub fn parse(value: &str) -> Option<TaskMode> {
        match value {
            "auto" => Some(TaskMode::Auto),
            "manual" => Some(TaskMode::Manual),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    Active,
    Inactive,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Active => "active",
            TaskStatus::Inactive => "inactive",
        }
    }

    pub fn parse(value: &str) -> Option<TaskStatus> {
        match value {
            "active" => Some(TaskStatus::Active),
            "inactive" => Some(TaskStatus::Inactive),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub reward: i64,
    pub mode: String,
    pub status: String,
    pub provider: Option<String>,
    pub destination_url: String,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

impl Task {
    pub fn is_active(&self) -> bool {
        self.status == TaskStatus::Active.as_str()
    }

    pub fn is_auto(&self) -> bool {
        self.mode == TaskMode::Auto.as_str()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub reward: i64,
    pub mode: String,
    pub provider: Option<String>,
    pub destination_url: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub reward: Option<i64>,
    pub mode: Option<String>,
    pub status: Option<String>,
    pub provider: Option<String>,
    pub destination_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_and_status_parse_known_values_only() {
        assert_eq!(TaskMode::parse("auto"), Some(TaskMode::Auto));
        assert_eq!(TaskMode::parse("manual"), Some(TaskMode::Manual));
        assert_eq!(TaskMode::parse("redirect"), None);

        assert_eq!(TaskStatus::parse("active"), Some(TaskStatus::Active));
        assert_eq!(TaskStatus::parse("inactive"), Some(TaskStatus::Inactive));
        assert_eq!(TaskStatus::parse("paused"), None);
    }
}
