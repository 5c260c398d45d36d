use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::settlement::SettlementRequest;
use super::shortener::ShortenerRequest;
use super::{RequestHandler, Service, ServiceError};
use crate::models::submissions::{StartedTask, Submission, VerifyOutcome};
use crate::models::tasks::{NewTask, Task, TaskMode, TaskStatus, TaskUpdate};
use crate::repositories::submissions::SubmissionRepository;
use crate::repositories::tasks::TaskRepository;

pub enum TaskRequest {
    ListActive {
        response: oneshot::Sender<Result<Vec<Task>, ServiceError>>,
    },
    /// User opens a task: record the attempt and hand back the link to
    /// follow (shortened for auto tasks).
    StartTask {
        user_id: String,
        task_id: String,
        response: oneshot::Sender<Result<StartedTask, ServiceError>>,
    },
    /// User came back with a verification code.
    VerifySubmission {
        user_id: String,
        submission_id: String,
        code: String,
        response: oneshot::Sender<Result<VerifyOutcome, ServiceError>>,
    },
    ListMySubmissions {
        user_id: String,
        response: oneshot::Sender<Result<Vec<Submission>, ServiceError>>,
    },
    // Admin side.
    CreateTask {
        new_task: NewTask,
        response: oneshot::Sender<Result<Task, ServiceError>>,
    },
    UpdateTask {
        task_id: String,
        update: TaskUpdate,
        response: oneshot::Sender<Result<Task, ServiceError>>,
    },
    ListAllTasks {
        response: oneshot::Sender<Result<Vec<Task>, ServiceError>>,
    },
    ListPendingSubmissions {
        response: oneshot::Sender<Result<Vec<Submission>, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct TaskRequestHandler {
    tasks: TaskRepository,
    submissions: SubmissionRepository,
    settlement_channel: mpsc::Sender<SettlementRequest>,
    shortener_channel: mpsc::Sender<ShortenerRequest>,
    verify_base_url: String,
}

/// Manual tasks get the code up front so the user can submit it after doing
/// the work. For auto tasks the code must only be reachable by walking the
/// shortened link, so handing it out here would defeat verification.
fn disclosed_code(task: &Task, code: &str) -> Option<String> {
    if task.is_auto() {
        None
    } else {
        Some(code.to_string())
    }
}

fn validate_new_task(new_task: &NewTask) -> Result<(), String> {
    if new_task.title.trim().is_empty() {
        return Err("title must not be empty".to_string());
    }
    if new_task.reward <= 0 {
        return Err("reward must be positive".to_string());
    }
    let mode = match TaskMode::parse(&new_task.mode) {
        Some(mode) => mode,
        None => return Err(format!("unknown task mode '{}'", new_task.mode)),
    };
    if mode == TaskMode::Auto && new_task.provider.is_none() {
        return Err("auto tasks need a shortener provider".to_string());
    }
    Ok(())
}

fn validate_task_update(update: &TaskUpdate) -> Result<(), String> {
    if let Some(reward) = update.reward {
        if reward <= 0 {
            return Err("reward must be positive".to_string());
        }
    }
    if let Some(ref mode) = update.mode {
        if TaskMode::parse(mode).is_none() {
            return Err(format!("unknown task mode '{}'", mode));
        }
    }
    if let Some(ref status) = update.status {
        if TaskStatus::parse(status).is_none() {
            return Err(format!("unknown task status '{}'", status));
        }
    }
    Ok(())
}

impl TaskRequestHandler {
    pub fn new(
        sql_conn: PgPool,
        settlement_channel: mpsc::Sender<SettlementRequest>,
        shortener_channel: mpsc::Sender<ShortenerRequest>,
        verify_base_url: String,
    ) -> Self {
        let tasks = TaskRepository::new(sql_conn.clone());
        let submissions = SubmissionRepository::new(sql_conn);

        TaskRequestHandler {
            tasks,
            submissions,
            settlement_channel,
            shortener_channel,
            verify_base_url,
        }
    }

    async fn list_active(&self) -> Result<Vec<Task>, ServiceError> {
        self.tasks
            .list_active_tasks()
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))
    }

    async fn start_task(&self, user_id: &str, task_id: &str) -> Result<StartedTask, ServiceError> {
        let task = self
            .tasks
            .get_task(task_id)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?
            .ok_or_else(|| ServiceError::NotFound(format!("task {}", task_id)))?;

        if !task.is_active() {
            return Err(ServiceError::Conflict(format!(
                "task {} is not active",
                task_id
            )));
        }

        let code = Uuid::new_v4().simple().to_string()[..10].to_string();
        let submission = self
            .submissions
            .insert_submission(user_id, task_id, &code)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;

        // The landing page at the end of the link chain reads both values
        // from the query string and shows the code to the user.
        let destination = format!(
            "{}/verify?submission={}&code={}",
            self.verify_base_url, submission.id, code
        );

        let link = if task.is_auto() {
            let provider = task.provider.clone().ok_or_else(|| {
                ServiceError::Conflict(format!("task {} has no provider configured", task_id))
            })?;
            self.shorten(&provider, &destination).await?
        } else {
            task.destination_url.clone()
        };

        Ok(StartedTask {
            submission_id: submission.id,
            task_id: task.id.clone(),
            link,
            verification_code: disclosed_code(&task, &code),
        })
    }

    async fn shorten(&self, provider: &str, destination: &str) -> Result<String, ServiceError> {
        let (shortener_tx, shortener_rx) = oneshot::channel();

        self.shortener_channel
            .send(ShortenerRequest::Shorten {
                provider: provider.to_string(),
                destination: destination.to_string(),
                response: shortener_tx,
            })
            .await
            .map_err(|e| ServiceError::Communication("Task => Shortener".to_string(), e.to_string()))?;

        shortener_rx
            .await
            .map_err(|e| ServiceError::Communication("Shortener => Task".to_string(), e.to_string()))?
    }

    async fn verify_submission(
        &self,
        user_id: &str,
        submission_id: &str,
        code: &str,
    ) -> Result<VerifyOutcome, ServiceError> {
        if code.trim().is_empty() {
            return Err(ServiceError::Validation(
                "verification code must not be empty".to_string(),
            ));
        }

        let submission = self
            .submissions
            .get_submission(submission_id)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?
            .ok_or_else(|| ServiceError::NotFound(format!("submission {}", submission_id)))?;

        if submission.user_id != user_id {
            return Err(ServiceError::Unauthorized(
                "submission belongs to another user".to_string(),
            ));
        }
        if !submission.is_pending() {
            return Err(ServiceError::Conflict(format!(
                "submission {} has already been settled",
                submission_id
            )));
        }
        if submission.verification_code != code.trim() {
            return Err(ServiceError::Validation(
                "verification code does not match".to_string(),
            ));
        }

        let task = self
            .tasks
            .get_task(&submission.task_id)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?
            .ok_or_else(|| ServiceError::Conflict(format!("task {} is missing", submission.task_id)))?;

        if !task.is_auto() {
            // Manual review: the code checks out, an admin settles it later.
            return Ok(VerifyOutcome::AwaitingReview);
        }

        let (settlement_tx, settlement_rx) = oneshot::channel();
        self.settlement_channel
            .send(SettlementRequest::Settle {
                submission_id: submission_id.to_string(),
                response: settlement_tx,
            })
            .await
            .map_err(|e| {
                ServiceError::Communication("Task => Settlement".to_string(), e.to_string())
            })?;

        let outcome = settlement_rx.await.map_err(|e| {
            ServiceError::Communication("Settlement => Task".to_string(), e.to_string())
        })??;

        Ok(VerifyOutcome::Settled {
            reward: outcome.reward,
        })
    }

    async fn list_my_submissions(&self, user_id: &str) -> Result<Vec<Submission>, ServiceError> {
        self.submissions
            .list_for_user(user_id)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))
    }

    async fn create_task(&self, new_task: NewTask) -> Result<Task, ServiceError> {
        validate_new_task(&new_task).map_err(ServiceError::Validation)?;

        let task = self
            .tasks
            .insert_task(&new_task)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;

        log::info!("created task {} ({} Xu, {})", task.id, task.reward, task.mode);
        Ok(task)
    }

    async fn update_task(&self, task_id: &str, update: TaskUpdate) -> Result<Task, ServiceError> {
        validate_task_update(&update).map_err(ServiceError::Validation)?;

        self.tasks.update_task(task_id, &update).await.map_err(|e| {
            if e.to_string() == "TaskNotFound" {
                ServiceError::NotFound(format!("task {}", task_id))
            } else {
                ServiceError::Database(e.to_string())
            }
        })
    }

    async fn list_all_tasks(&self) -> Result<Vec<Task>, ServiceError> {
        self.tasks
            .list_all_tasks()
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))
    }

    async fn list_pending_submissions(&self) -> Result<Vec<Submission>, ServiceError> {
        self.submissions
            .list_pending()
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))
    }
}

#[async_trait]
impl RequestHandler<TaskRequest> for TaskRequestHandler {
    async fn handle_request(&self, request: TaskRequest) {
        match request {
            TaskRequest::ListActive { response } => {
                let result = self.list_active().await;
                let _ = response.send(result);
            }
            TaskRequest::StartTask {
                user_id,
                task_id,
                response,
            } => {
                let result = self.start_task(&user_id, &task_id).await;
                let _ = response.send(result);
            }
            TaskRequest::VerifySubmission {
                user_id,
                submission_id,
                code,
                response,
            } => {
                let result = self.verify_submission(&user_id, &submission_id, &code).await;
                let _ = response.send(result);
            }
            TaskRequest::ListMySubmissions { user_id, response } => {
                let result = self.list_my_submissions(&user_id).await;
                let _ = response.send(result);
            }
            TaskRequest::CreateTask { new_task, response } => {
                let result = self.create_task(new_task).await;
                let _ = response.send(result);
            }
            TaskRequest::UpdateTask {
                task_id,
                update,
                response,
            } => {
                let result = self.update_task(&task_id, update).await;
                let _ = response.send(result);
            }
            TaskRequest::ListAllTasks { response } => {
                let result = self.list_all_tasks().await;
                let _ = response.send(result);
            }
            TaskRequest::ListPendingSubmissions { response } => {
                let result = self.list_pending_submissions().await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct TaskService;

impl TaskService {
    pub fn new() -> Self {
        TaskService {}
    }
}

#[async_trait]
impl Service<TaskRequest, TaskRequestHandler> for TaskService {}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_task(mode: &str, provider: Option<&str>) -> NewTask {
        NewTask {
            title: "Vuot link 1".to_string(),
            description: String::new(),
            reward: 500,
            mode: mode.to_string(),
            provider: provider.map(|p| p.to_string()),
            destination_url: "https://example.com/landing".to_string(),
        }
    }

    fn task(mode: &str) -> Task {
        Task {
            id: "t1".to_string(),
            title: "Vuot link 1".to_string(),
            description: String::new(),
            reward: 500,
            mode: mode.to_string(),
            status: "active".to_string(),
            provider: None,
            destination_url: "https://example.com/landing".to_string(),
            created_at: chrono::NaiveDateTime::default(),
            updated_at: chrono::NaiveDateTime::default(),
        }
    }

    #[test]
    fn manual_tasks_get_the_code_up_front() {
        // A manual-task user never walks the shortened link, so the start
        // response is the only place the code can come from.
        assert_eq!(
            disclosed_code(&task("manual"), "abc123"),
            Some("abc123".to_string())
        );
    }

    #[test]
    fn auto_tasks_never_leak_the_code() {
        assert_eq!(disclosed_code(&task("auto"), "abc123"), None);
    }

    #[test]
    fn auto_tasks_require_a_provider() {
        assert!(validate_new_task(&new_task("auto", Some("link4m"))).is_ok());
        assert!(validate_new_task(&new_task("auto", None)).is_err());
        assert!(validate_new_task(&new_task("manual", None)).is_ok());
    }

    #[test]
    fn rewards_must_be_positive() {
        let mut task = new_task("manual", None);
        task.reward = 0;
        assert!(validate_new_task(&task).is_err());
        task.reward = -500;
        assert!(validate_new_task(&task).is_err());
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(validate_new_task(&new_task("redirect", None)).is_err());
    }

    #[test]
    fn update_validation_checks_provided_fields_only() {
        assert!(validate_task_update(&TaskUpdate::default()).is_ok());

        let bad_reward = TaskUpdate {
            reward: Some(0),
            ..TaskUpdate::default()
        };
        assert!(validate_task_update(&bad_reward).is_err());

        let bad_status = TaskUpdate {
            status: Some("archived".to_string()),
            ..TaskUpdate::default()
        };
        assert!(validate_task_update(&bad_status).is_err());

        let ok = TaskUpdate {
            status: Some("inactive".to_string()),
            reward: Some(750),
            ..TaskUpdate::default()
        };
        assert!(validate_task_update(&ok).is_ok());
    }
}
