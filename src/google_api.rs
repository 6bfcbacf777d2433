use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::auth::CredentialStore;
use crate::error::{ApiError, ApiResult};

pub const TASKS_API_BASE: &str = "https://tasks.googleapis.com/tasks/v1";
pub const DEFAULT_LIST: &str = "@default";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    #[default]
    NeedsAction,
    Completed,
}

impl TaskStatus {
    pub fn toggled(self) -> Self {
        match self {
            TaskStatus::NeedsAction => TaskStatus::Completed,
            TaskStatus::Completed => TaskStatus::NeedsAction,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::NeedsAction => "needsAction",
            TaskStatus::Completed => "completed",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskList {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub updated: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: TaskStatus,
    pub due: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub completed: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub parent: Option<String>,
    pub position: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub deleted: bool,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

/// Parses `YYYY-MM-DD` into the midnight-UTC instant the API stores due dates as.
pub fn parse_due_date(input: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let date = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")?;
    Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
}

/// Body of a `tasks.insert` call.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Body of a `tasks.patch` call. Absent fields are left untouched remotely;
/// `Some(None)` sends an explicit `null` and clears the field.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
}

impl TaskPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Reopening a task also clears its completion timestamp.
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            completed: match status {
                TaskStatus::NeedsAction => Some(None),
                TaskStatus::Completed => None,
            },
            ..Self::default()
        }
    }

    pub fn due(due: Option<DateTime<Utc>>) -> Self {
        Self {
            due: Some(due),
            ..Self::default()
        }
    }

    pub fn notes(notes: Option<String>) -> Self {
        Self {
            notes: Some(notes),
            ..Self::default()
        }
    }
}

#[derive(Serialize)]
struct TaskListBody<'a> {
    title: &'a str,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    next_page_token: Option<String>,
}

/// Remote operations on task lists and tasks.
#[async_trait]
pub trait TasksApi: Send + Sync {
    async fn list_task_lists(&self) -> ApiResult<Vec<TaskList>>;
    async fn insert_task_list(&self, title: &str) -> ApiResult<TaskList>;
    async fn rename_task_list(&self, list_id: &str, title: &str) -> ApiResult<TaskList>;
    async fn delete_task_list(&self, list_id: &str) -> ApiResult<()>;

    async fn list_tasks(&self, list_id: &str) -> ApiResult<Vec<Task>>;
    async fn get_task(&self, list_id: &str, task_id: &str) -> ApiResult<Task>;
    async fn insert_task(&self, list_id: &str, task: &NewTask) -> ApiResult<Task>;
    async fn patch_task(&self, list_id: &str, task_id: &str, patch: &TaskPatch)
        -> ApiResult<Task>;
    async fn delete_task(&self, list_id: &str, task_id: &str) -> ApiResult<()>;
    /// Moves a task directly after `previous`, or to the top when `None`.
    async fn move_task(
        &self,
        list_id: &str,
        task_id: &str,
        previous: Option<&str>,
    ) -> ApiResult<Task>;
}

/// Google Tasks v1 over HTTPS, authorized with tokens from a [`CredentialStore`].
pub struct GoogleTasksClient {
    http: reqwest::Client,
    base: Url,
    page_size: u32,
    credentials: Mutex<CredentialStore>,
}

impl GoogleTasksClient {
    pub fn new(base: &str, page_size: u32, credentials: CredentialStore) -> ApiResult<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            base: Url::parse(base)?,
            page_size: page_size.clamp(1, 100),
            credentials: Mutex::new(credentials),
        })
    }

    /// Makes sure a usable access token exists, running the consent flow if needed.
    pub async fn authorize(&self) -> ApiResult<()> {
        self.credentials.lock().await.access_token().await?;
        Ok(())
    }

    pub fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, build: impl Fn(&str) -> RequestBuilder) -> ApiResult<Response> {
        let token = self.credentials.lock().await.access_token().await?;
        let res = check_status(build(&token).send().await?).await;

        match res {
            Err(e) if e.is_unauthorized() => {
                warn!("access token rejected, re-authorizing once");
                let token = self.credentials.lock().await.reauthorize().await?;
                check_status(build(&token).send().await?).await
            }
            other => other,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> ApiResult<T> {
        debug!(%url, "GET");
        let res = self
            .send(|token| self.http.get(url.clone()).bearer_auth(token))
            .await?;
        Ok(res.json::<T>().await?)
    }

    async fn send_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: &B,
    ) -> ApiResult<T> {
        debug!(%url, %method, "sending");
        let res = self
            .send(|token| {
                self.http
                    .request(method.clone(), url.clone())
                    .bearer_auth(token)
                    .json(body)
            })
            .await?;
        Ok(res.json::<T>().await?)
    }

    async fn delete(&self, url: Url) -> ApiResult<()> {
        debug!(%url, "DELETE");
        self.send(|token| self.http.delete(url.clone()).bearer_auth(token))
            .await?;
        Ok(())
    }

    async fn collect_pages<T: DeserializeOwned>(&self, url: Url) -> ApiResult<Vec<T>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut page_url = url.clone();
            {
                let mut query = page_url.query_pairs_mut();
                query.append_pair("maxResults", &self.page_size.to_string());
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let page: Page<T> = self.get_json(page_url).await?;
            items.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(items)
    }
}

async fn check_status(res: Response) -> ApiResult<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    Err(ApiError::Status { status, body })
}

#[async_trait]
impl TasksApi for GoogleTasksClient {
    async fn list_task_lists(&self) -> ApiResult<Vec<TaskList>> {
        let url = self.endpoint(&["users", "@me", "lists"])?;
        self.collect_pages(url).await
    }

    async fn insert_task_list(&self, title: &str) -> ApiResult<TaskList> {
        let url = self.endpoint(&["users", "@me", "lists"])?;
        self.send_json(Method::POST, url, &TaskListBody { title })
            .await
    }

    async fn rename_task_list(&self, list_id: &str, title: &str) -> ApiResult<TaskList> {
        let url = self.endpoint(&["users", "@me", "lists", list_id])?;
        self.send_json(Method::PATCH, url, &TaskListBody { title })
            .await
    }

    async fn delete_task_list(&self, list_id: &str) -> ApiResult<()> {
        let url = self.endpoint(&["users", "@me", "lists", list_id])?;
        self.delete(url).await
    }

    async fn list_tasks(&self, list_id: &str) -> ApiResult<Vec<Task>> {
        let mut url = self.endpoint(&["lists", list_id, "tasks"])?;
        url.query_pairs_mut()
            .append_pair("showCompleted", "true")
            .append_pair("showHidden", "true");
        self.collect_pages(url).await
    }

    async fn get_task(&self, list_id: &str, task_id: &str) -> ApiResult<Task> {
        let url = self.endpoint(&["lists", list_id, "tasks", task_id])?;
        self.get_json(url).await
    }

    async fn insert_task(&self, list_id: &str, task: &NewTask) -> ApiResult<Task> {
        let url = self.endpoint(&["lists", list_id, "tasks"])?;
        self.send_json(Method::POST, url, task).await
    }

    async fn patch_task(
        &self,
        list_id: &str,
        task_id: &str,
        patch: &TaskPatch,
    ) -> ApiResult<Task> {
        let url = self.endpoint(&["lists", list_id, "tasks", task_id])?;
        self.send_json(Method::PATCH, url, patch).await
    }

    async fn delete_task(&self, list_id: &str, task_id: &str) -> ApiResult<()> {
        let url = self.endpoint(&["lists", list_id, "tasks", task_id])?;
        self.delete(url).await
    }

    async fn move_task(
        &self,
        list_id: &str,
        task_id: &str,
        previous: Option<&str>,
    ) -> ApiResult<Task> {
        let mut url = self.endpoint(&["lists", list_id, "tasks", task_id, "move"])?;
        if let Some(previous) = previous {
            url.query_pairs_mut().append_pair("previous", previous);
        }
        debug!(%url, "POST");
        // Google rejects a bodyless POST without an explicit length (411).
        let res = self
            .send(|token| {
                self.http
                    .post(url.clone())
                    .bearer_auth(token)
                    .header(CONTENT_LENGTH, 0)
            })
            .await?;
        Ok(res.json::<Task>().await?)
    }
}
