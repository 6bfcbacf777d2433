//! In-memory stand-in for the Tasks API used by controller and view tests.

use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::error::{ApiError, ApiResult};
use crate::google_api::{NewTask, Task, TaskList, TaskPatch, TaskStatus, TasksApi};

#[derive(Default)]
struct State {
    lists: Vec<(TaskList, Vec<Task>)>,
    calls: Vec<String>,
    failing: Vec<String>,
    next_id: u32,
}

#[derive(Default)]
pub struct FakeTasks {
    state: Mutex<State>,
}

/// Mirrors what the service does with a `tasks.patch` body.
fn apply_patch(patch: &TaskPatch, task: &mut Task) {
    if let Some(title) = &patch.title {
        task.title = title.clone();
    }
    if let Some(status) = patch.status {
        task.status = status;
    }
    if let Some(completed) = patch.completed {
        task.completed = completed;
    }
    if let Some(due) = patch.due {
        task.due = due;
    }
    if let Some(notes) = &patch.notes {
        task.notes = notes.clone();
    }
}

pub fn task(id: &str, title: &str, status: TaskStatus) -> Task {
    Task {
        id: id.to_string(),
        title: title.to_string(),
        status,
        due: None,
        notes: None,
        completed: None,
        updated: None,
        parent: None,
        position: None,
        hidden: false,
        deleted: false,
    }
}

impl FakeTasks {
    pub fn with_list(self, id: &str, title: &str, tasks: Vec<Task>) -> Self {
        self.state.lock().unwrap().lists.push((
            TaskList {
                id: id.to_string(),
                title: title.to_string(),
                updated: None,
            },
            tasks,
        ));
        self
    }

    /// Makes every call of `op` fail with a 500.
    pub fn fail_on(&self, op: &str) {
        self.state.lock().unwrap().failing.push(op.to_string());
    }

    pub fn recover(&self, op: &str) {
        self.state.lock().unwrap().failing.retain(|f| f != op);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == op).count()
    }

    pub fn titles(&self, list_id: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .lists
            .iter()
            .find(|(l, _)| l.id == list_id)
            .map(|(_, tasks)| tasks.iter().map(|t| t.title.clone()).collect())
            .unwrap_or_default()
    }

    fn record(&self, op: &str) -> ApiResult<std::sync::MutexGuard<'_, State>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(op.to_string());
        if state.failing.iter().any(|f| f == op) {
            return Err(ApiError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: format!("{op} failed"),
            });
        }
        Ok(state)
    }
}

fn not_found(what: &str) -> ApiError {
    ApiError::Status {
        status: StatusCode::NOT_FOUND,
        body: format!("{what} not found"),
    }
}

fn tasks_mut<'a>(state: &'a mut State, list_id: &str) -> ApiResult<&'a mut Vec<Task>> {
    state
        .lists
        .iter_mut()
        .find(|(l, _)| l.id == list_id)
        .map(|(_, tasks)| tasks)
        .ok_or_else(|| not_found(list_id))
}

#[async_trait]
impl TasksApi for FakeTasks {
    async fn list_task_lists(&self) -> ApiResult<Vec<TaskList>> {
        let state = self.record("list_task_lists")?;
        Ok(state.lists.iter().map(|(l, _)| l.clone()).collect())
    }

    async fn insert_task_list(&self, title: &str) -> ApiResult<TaskList> {
        let mut state = self.record("insert_task_list")?;
        state.next_id += 1;
        let list = TaskList {
            id: format!("list-{}", state.next_id),
            title: title.to_string(),
            updated: None,
        };
        state.lists.push((list.clone(), Vec::new()));
        Ok(list)
    }

    async fn rename_task_list(&self, list_id: &str, title: &str) -> ApiResult<TaskList> {
        let mut state = self.record("rename_task_list")?;
        let (list, _) = state
            .lists
            .iter_mut()
            .find(|(l, _)| l.id == list_id)
            .ok_or_else(|| not_found(list_id))?;
        list.title = title.to_string();
        Ok(list.clone())
    }

    async fn delete_task_list(&self, list_id: &str) -> ApiResult<()> {
        let mut state = self.record("delete_task_list")?;
        state.lists.retain(|(l, _)| l.id != list_id);
        Ok(())
    }

    async fn list_tasks(&self, list_id: &str) -> ApiResult<Vec<Task>> {
        let mut state = self.record("list_tasks")?;
        Ok(tasks_mut(&mut state, list_id)?.clone())
    }

    async fn get_task(&self, list_id: &str, task_id: &str) -> ApiResult<Task> {
        let mut state = self.record("get_task")?;
        tasks_mut(&mut state, list_id)?
            .iter()
            .find(|t| t.id == task_id)
            .cloned()
            .ok_or_else(|| not_found(task_id))
    }

    async fn insert_task(&self, list_id: &str, new: &NewTask) -> ApiResult<Task> {
        let mut state = self.record("insert_task")?;
        state.next_id += 1;
        let mut created = task(&format!("task-{}", state.next_id), &new.title, new.status);
        created.due = new.due;
        created.notes = new.notes.clone();
        tasks_mut(&mut state, list_id)?.push(created.clone());
        Ok(created)
    }

    async fn patch_task(
        &self,
        list_id: &str,
        task_id: &str,
        patch: &TaskPatch,
    ) -> ApiResult<Task> {
        let mut state = self.record("patch_task")?;
        let task = tasks_mut(&mut state, list_id)?
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| not_found(task_id))?;
        apply_patch(patch, task);
        Ok(task.clone())
    }

    async fn delete_task(&self, list_id: &str, task_id: &str) -> ApiResult<()> {
        let mut state = self.record("delete_task")?;
        tasks_mut(&mut state, list_id)?.retain(|t| t.id != task_id);
        Ok(())
    }

    async fn move_task(
        &self,
        list_id: &str,
        task_id: &str,
        previous: Option<&str>,
    ) -> ApiResult<Task> {
        let mut state = self.record("move_task")?;
        let tasks = tasks_mut(&mut state, list_id)?;
        let from = tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or_else(|| not_found(task_id))?;
        let moved = tasks.remove(from);
        let to = match previous {
            Some(previous) => {
                tasks
                    .iter()
                    .position(|t| t.id == previous)
                    .ok_or_else(|| not_found(previous))?
                    + 1
            }
            None => 0,
        };
        tasks.insert(to, moved.clone());
        Ok(moved)
    }
}
