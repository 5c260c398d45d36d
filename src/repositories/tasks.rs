use crate::models::tasks::{NewTask, Task, TaskStatus, TaskUpdate};

use anyhow::bail;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct TaskRepository {
    conn: PgPool,
}

impl TaskRepository {
    pub fn new(conn: PgPool) -> Self {
        TaskRepository { conn }
    }

    pub async fn insert_task(&self, new_task: &NewTask) -> Result<Task, anyhow::Error> {
        let task_id = Uuid::new_v4().hyphenated().to_string();

        let task = sqlx::query_as::<_, Task>(
            r#"
                INSERT INTO tasks
                (id, title, description, reward, mode, status, provider, destination_url)
                VALUES ($1, $2, $3, $4, $5, 'active', $6, $7)
                RETURNING *
            "#,
        )
        .bind(&task_id)
        .bind(&new_task.title)
        .bind(&new_task.description)
        .bind(new_task.reward)
        .bind(&new_task.mode)
        .bind(&new_task.provider)
        .bind(&new_task.destination_url)
        .fetch_one(&self.conn)
        .await?;

        Ok(task)
    }

    pub async fn update_task(
        &self,
        task_id: &str,
        update: &TaskUpdate,
    ) -> Result<Task, anyhow::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
                UPDATE tasks SET
                    title = COALESCE($2, title),
                    description = COALESCE($3, description),
                    reward = COALESCE($4, reward),
                    mode = COALESCE($5, mode),
                    status = COALESCE($6, status),
                    provider = COALESCE($7, provider),
                    destination_url = COALESCE($8, destination_url),
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = $1
                RETURNING *
            "#,
        )
        .bind(task_id)
        .bind(&update.title)
        .bind(&update.description)
        .bind(update.reward)
        .bind(&update.mode)
        .bind(&update.status)
        .bind(&update.provider)
        .bind(&update.destination_url)
        .fetch_optional(&self.conn)
        .await?;

        match task {
            Some(task) => Ok(task),
            None => bail!("TaskNotFound"),
        }
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Option<Task>, anyhow::Error> {
        let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
            .bind(task_id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(task)
    }

    pub async fn list_active_tasks(&self) -> Result<Vec<Task>, anyhow::Error> {
        let tasks = sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks WHERE status = $1 ORDER BY reward DESC",
        )
        .bind(TaskStatus::Active.as_str())
        .fetch_all(&self.conn)
        .await?;

        Ok(tasks)
    }

    pub async fn list_all_tasks(&self) -> Result<Vec<Task>, anyhow::Error> {
        let tasks = sqlx::query_as::<_, Task>("SELECT * FROM tasks ORDER BY created_at DESC")
            .fetch_all(&self.conn)
            .await?;

        Ok(tasks)
    }
}
