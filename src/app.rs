//! Controller state for the interactive view. Holds a transient copy of the
//! remote lists and tasks and turns user actions into API calls.

use tracing::{info, warn};
use unicode_segmentation::UnicodeSegmentation;

use crate::google_api::{parse_due_date, NewTask, Task, TaskList, TaskPatch, TasksApi};

pub struct ListEntry {
    pub list: TaskList,
    /// Tasks, or the error text if they could not be loaded.
    pub tasks: Result<Vec<Task>, String>,
}

/// One visible line of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Row {
    List(usize),
    Task(usize, usize),
    /// "No tasks" or load error line under a list.
    Notice(usize),
}

impl Row {
    fn list_index(self) -> usize {
        match self {
            Row::List(li) | Row::Task(li, _) | Row::Notice(li) => li,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputPurpose {
    AddTask,
    EditTitle,
    EditNotes,
    SetDue,
    AddList,
    RenameList,
}

impl InputPurpose {
    pub fn prompt(self) -> &'static str {
        match self {
            InputPurpose::AddTask => "New task title",
            InputPurpose::EditTitle => "Task title",
            InputPurpose::EditNotes => "Notes",
            InputPurpose::SetDue => "Due date (YYYY-MM-DD, empty clears)",
            InputPurpose::AddList => "New task list",
            InputPurpose::RenameList => "Task list name",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingDelete {
    Task {
        list_id: String,
        task_id: String,
        title: String,
    },
    List {
        list_id: String,
        title: String,
    },
}

impl PendingDelete {
    pub fn question(&self) -> String {
        match self {
            PendingDelete::Task { title, .. } => {
                format!("Are you sure you want to delete task '{title}'?")
            }
            PendingDelete::List { title, .. } => {
                format!("Are you sure you want to delete the task list '{title}' and all its tasks?")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Input {
        purpose: InputPurpose,
        buffer: String,
    },
    Confirm(PendingDelete),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

pub struct App<A> {
    api: A,
    lists: Vec<ListEntry>,
    selected_index: usize,
    mode: Mode,
    status: String,
}

impl<A: TasksApi> App<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            lists: Vec::new(),
            selected_index: 0,
            mode: Mode::Normal,
            status: String::new(),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn lists(&self) -> &[ListEntry] {
        &self.lists
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn selected_index(&self) -> usize {
        self.selected_index
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn rows(&self) -> Vec<Row> {
        let mut rows = Vec::new();
        for (li, entry) in self.lists.iter().enumerate() {
            rows.push(Row::List(li));
            match &entry.tasks {
                Ok(tasks) if !tasks.is_empty() => {
                    rows.extend((0..tasks.len()).map(|ti| Row::Task(li, ti)));
                }
                _ => rows.push(Row::Notice(li)),
            }
        }
        rows
    }

    pub fn selected_row(&self) -> Option<Row> {
        self.rows().get(self.selected_index).copied()
    }

    pub fn selected_task(&self) -> Option<&Task> {
        match self.selected_row()? {
            Row::Task(li, ti) => self.lists[li].tasks.as_ref().ok()?.get(ti),
            _ => None,
        }
    }

    pub fn previous(&mut self) {
        let len = self.rows().len();
        if len > 0 {
            if self.selected_index > 0 {
                self.selected_index -= 1;
            } else {
                self.selected_index = len - 1;
            }
        }
    }

    pub fn next(&mut self) {
        let len = self.rows().len();
        if len > 0 {
            if self.selected_index < len - 1 {
                self.selected_index += 1;
            } else {
                self.selected_index = 0;
            }
        }
    }

    fn select(&mut self, row: Row) {
        if let Some(index) = self.rows().iter().position(|r| *r == row) {
            self.selected_index = index;
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.rows().len();
        if self.selected_index >= len {
            self.selected_index = len.saturating_sub(1);
        }
    }

    /// Reloads everything from the remote. A failing list keeps its error
    /// inline; the others still load.
    pub async fn refresh(&mut self) {
        let lists = match self.api.list_task_lists().await {
            Ok(lists) => lists,
            Err(e) => {
                warn!(error = %e, "could not load task lists");
                self.lists.clear();
                self.clamp_selection();
                self.status = format!("Error loading task lists: {e}");
                return;
            }
        };

        let mut entries = Vec::with_capacity(lists.len());
        let mut failed = None;
        for list in lists {
            let tasks = match self.api.list_tasks(&list.id).await {
                Ok(tasks) => Ok(tasks),
                Err(e) => {
                    warn!(list = %list.id, error = %e, "could not load tasks");
                    failed = Some(format!("Error loading tasks for list {}: {e}", list.title));
                    Err(format!("Error loading tasks: {e}"))
                }
            };
            entries.push(ListEntry { list, tasks });
        }

        self.lists = entries;
        self.clamp_selection();
        self.status = match failed {
            Some(message) => message,
            None if self.lists.is_empty() => "No task lists found".to_string(),
            None => "Tasks loaded successfully".to_string(),
        };
    }

    pub fn begin_input(&mut self, purpose: InputPurpose) {
        let prefill = match purpose {
            InputPurpose::AddTask | InputPurpose::AddList => Some(String::new()),
            InputPurpose::EditTitle => self.selected_task().map(|t| t.title.clone()),
            InputPurpose::EditNotes => self
                .selected_task()
                .map(|t| t.notes.clone().unwrap_or_default()),
            InputPurpose::SetDue => self
                .selected_task()
                .map(|t| t.due.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()),
            InputPurpose::RenameList => self
                .selected_row()
                .map(|row| self.lists[row.list_index()].list.title.clone()),
        };

        match prefill {
            Some(buffer) if purpose != InputPurpose::AddTask || self.selected_row().is_some() => {
                self.mode = Mode::Input { purpose, buffer };
            }
            _ if purpose == InputPurpose::AddTask || purpose == InputPurpose::RenameList => {
                self.status = "Select a task list first".to_string();
            }
            _ => self.status = "Select a task first".to_string(),
        }
    }

    pub fn push_char(&mut self, c: char) {
        if let Mode::Input { buffer, .. } = &mut self.mode {
            buffer.push(c);
        }
    }

    /// Removes the last grapheme so combined characters go away as a whole.
    pub fn pop_char(&mut self) {
        if let Mode::Input { buffer, .. } = &mut self.mode {
            if let Some((offset, _)) = buffer.grapheme_indices(true).next_back() {
                buffer.truncate(offset);
            }
        }
    }

    pub fn cancel(&mut self) {
        self.mode = Mode::Normal;
    }

    pub async fn submit_input(&mut self) {
        let Mode::Input { purpose, buffer } = std::mem::replace(&mut self.mode, Mode::Normal)
        else {
            return;
        };

        match purpose {
            InputPurpose::AddTask => self.add_task(&buffer).await,
            InputPurpose::EditTitle => self.edit_title(&buffer).await,
            InputPurpose::EditNotes => self.edit_notes(&buffer).await,
            InputPurpose::SetDue => self.set_due(&buffer).await,
            InputPurpose::AddList => self.add_list(&buffer).await,
            InputPurpose::RenameList => self.rename_list(&buffer).await,
        }
    }

    /// Inserts into the list under the cursor.
    pub async fn add_task(&mut self, title: &str) {
        let title = title.trim();
        if title.is_empty() {
            self.status = "Task title cannot be empty".to_string();
            return;
        }
        let Some(li) = self.selected_row().map(Row::list_index) else {
            self.status = "Select a task list first".to_string();
            return;
        };

        let list_id = self.lists[li].list.id.clone();
        match self.api.insert_task(&list_id, &NewTask::titled(title)).await {
            Ok(task) => {
                info!(list = %list_id, task = %task.id, "task created");
                let ti = if let Ok(tasks) = &mut self.lists[li].tasks {
                    tasks.push(task);
                    Some(tasks.len() - 1)
                } else {
                    // The cached copy was never loaded, so fetch the list as it is now.
                    match self.api.list_tasks(&list_id).await {
                        Ok(tasks) => {
                            let ti = tasks.iter().position(|t| t.id == task.id);
                            self.lists[li].tasks = Ok(tasks);
                            ti
                        }
                        Err(e) => {
                            warn!(list = %list_id, error = %e, "reload after insert failed");
                            self.status = format!(
                                "Task '{title}' added, but the list could not be reloaded: {e}"
                            );
                            return;
                        }
                    }
                };
                match ti {
                    Some(ti) => self.select(Row::Task(li, ti)),
                    None => self.select(Row::List(li)),
                }
                self.status = format!("Task '{title}' added successfully");
            }
            Err(e) => self.status = format!("Error creating task: {e}"),
        }
    }

    pub async fn edit_title(&mut self, title: &str) {
        let title = title.trim();
        if title.is_empty() {
            self.status = "Task title cannot be empty".to_string();
            return;
        }
        self.patch_selected(TaskPatch::title(title), "Task renamed")
            .await;
    }

    pub async fn edit_notes(&mut self, notes: &str) {
        let notes = Some(notes.trim().to_string()).filter(|n| !n.is_empty());
        self.patch_selected(TaskPatch::notes(notes), "Notes updated")
            .await;
    }

    /// Accepts `YYYY-MM-DD`; an empty string clears the due date.
    pub async fn set_due(&mut self, input: &str) {
        let input = input.trim();
        let due = if input.is_empty() {
            None
        } else {
            match parse_due_date(input) {
                Ok(due) => Some(due),
                Err(_) => {
                    self.status = format!("Invalid date '{input}', expected YYYY-MM-DD");
                    return;
                }
            }
        };
        let done = if due.is_some() { "Due date set" } else { "Due date cleared" };
        self.patch_selected(TaskPatch::due(due), done).await;
    }

    pub async fn toggle_selected(&mut self) {
        let Some(task) = self.selected_task() else {
            return;
        };
        let status = task.status.toggled();
        self.patch_selected(
            TaskPatch::status(status),
            &format!("Task marked as {}", status.label()),
        )
        .await;
    }

    async fn patch_selected(&mut self, patch: TaskPatch, done: &str) {
        let Some(Row::Task(li, ti)) = self.selected_row() else {
            self.status = "Select a task first".to_string();
            return;
        };
        let Ok(tasks) = &self.lists[li].tasks else {
            return;
        };
        let list_id = self.lists[li].list.id.clone();
        let task_id = tasks[ti].id.clone();

        match self.api.patch_task(&list_id, &task_id, &patch).await {
            Ok(updated) => {
                if let Ok(tasks) = &mut self.lists[li].tasks {
                    tasks[ti] = updated;
                }
                self.status = done.to_string();
            }
            Err(e) => self.status = format!("Error updating task: {e}"),
        }
    }

    /// Asks for confirmation before deleting the task or list under the cursor.
    pub fn request_delete(&mut self) {
        let pending = match self.selected_row() {
            Some(Row::Task(li, ti)) => self.lists[li].tasks.as_ref().ok().map(|tasks| {
                PendingDelete::Task {
                    list_id: self.lists[li].list.id.clone(),
                    task_id: tasks[ti].id.clone(),
                    title: tasks[ti].title.clone(),
                }
            }),
            Some(Row::List(li)) => Some(PendingDelete::List {
                list_id: self.lists[li].list.id.clone(),
                title: self.lists[li].list.title.clone(),
            }),
            _ => None,
        };

        match pending {
            Some(pending) => self.mode = Mode::Confirm(pending),
            None => self.status = "No task or task list selected".to_string(),
        }
    }

    pub async fn confirm_delete(&mut self) {
        let Mode::Confirm(pending) = std::mem::replace(&mut self.mode, Mode::Normal) else {
            return;
        };

        match pending {
            PendingDelete::Task {
                list_id, task_id, ..
            } => match self.api.delete_task(&list_id, &task_id).await {
                Ok(()) => {
                    info!(list = %list_id, task = %task_id, "task deleted");
                    if let Some(Ok(tasks)) = self
                        .lists
                        .iter_mut()
                        .find(|e| e.list.id == list_id)
                        .map(|e| e.tasks.as_mut())
                    {
                        tasks.retain(|t| t.id != task_id);
                    }
                    self.clamp_selection();
                    self.status = "Task deleted successfully".to_string();
                }
                Err(e) => self.status = format!("Error deleting task: {e}"),
            },
            PendingDelete::List { list_id, .. } => {
                match self.api.delete_task_list(&list_id).await {
                    Ok(()) => {
                        info!(list = %list_id, "task list deleted");
                        self.lists.retain(|e| e.list.id != list_id);
                        self.clamp_selection();
                        self.status = "Task list deleted successfully".to_string();
                    }
                    Err(e) => self.status = format!("Error deleting task list: {e}"),
                }
            }
        }
    }

    pub async fn add_list(&mut self, title: &str) {
        let title = title.trim();
        if title.is_empty() {
            self.status = "Task list name cannot be empty".to_string();
            return;
        }
        match self.api.insert_task_list(title).await {
            Ok(list) => {
                info!(list = %list.id, "task list created");
                self.lists.push(ListEntry {
                    list,
                    tasks: Ok(Vec::new()),
                });
                self.select(Row::List(self.lists.len() - 1));
                self.status = format!("Task list '{title}' created");
            }
            Err(e) => self.status = format!("Error creating task list: {e}"),
        }
    }

    pub async fn rename_list(&mut self, title: &str) {
        let title = title.trim();
        if title.is_empty() {
            self.status = "Task list name cannot be empty".to_string();
            return;
        }
        let Some(li) = self.selected_row().map(Row::list_index) else {
            self.status = "Select a task list first".to_string();
            return;
        };
        let list_id = self.lists[li].list.id.clone();
        match self.api.rename_task_list(&list_id, title).await {
            Ok(list) => {
                self.lists[li].list = list;
                self.status = "Task list renamed".to_string();
            }
            Err(e) => self.status = format!("Error renaming task list: {e}"),
        }
    }

    /// Swaps the selected task with its neighbour. The remote is told the new
    /// predecessor; a failure reloads the whole view to restore the real order.
    pub async fn move_selected(&mut self, direction: MoveDirection) {
        let Some(Row::Task(li, ti)) = self.selected_row() else {
            return;
        };
        let Ok(tasks) = &self.lists[li].tasks else {
            return;
        };

        let target = match direction {
            MoveDirection::Up if ti > 0 => ti - 1,
            MoveDirection::Down if ti + 1 < tasks.len() => ti + 1,
            _ => return,
        };
        let previous = match direction {
            MoveDirection::Up => target.checked_sub(1).map(|p| tasks[p].id.clone()),
            MoveDirection::Down => Some(tasks[target].id.clone()),
        };
        let list_id = self.lists[li].list.id.clone();
        let task_id = tasks[ti].id.clone();

        match self
            .api
            .move_task(&list_id, &task_id, previous.as_deref())
            .await
        {
            Ok(_) => {
                if let Ok(tasks) = &mut self.lists[li].tasks {
                    tasks.swap(ti, target);
                }
                self.select(Row::Task(li, target));
                self.status = "Task position updated successfully".to_string();
            }
            Err(e) => {
                self.refresh().await;
                self.status = format!("Error updating task position: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google_api::TaskStatus;
    use crate::testing::{task, FakeTasks};

    fn fake() -> FakeTasks {
        FakeTasks::default()
            .with_list(
                "L1",
                "Groceries",
                vec![
                    task("t1", "Milk", TaskStatus::NeedsAction),
                    task("t2", "Bread", TaskStatus::Completed),
                    task("t3", "Eggs", TaskStatus::NeedsAction),
                ],
            )
            .with_list("L2", "Work", vec![])
    }

    async fn loaded() -> App<FakeTasks> {
        let mut app = App::new(fake());
        app.refresh().await;
        app
    }

    #[tokio::test]
    async fn refresh_builds_rows() {
        let app = loaded().await;
        assert_eq!(
            app.rows(),
            vec![
                Row::List(0),
                Row::Task(0, 0),
                Row::Task(0, 1),
                Row::Task(0, 2),
                Row::List(1),
                Row::Notice(1),
            ]
        );
        assert_eq!(app.status(), "Tasks loaded successfully");
    }

    #[tokio::test]
    async fn refresh_keeps_other_lists_when_one_fails() {
        let api = fake();
        api.fail_on("list_tasks");
        let mut app = App::new(api);
        app.refresh().await;

        assert_eq!(app.lists().len(), 2);
        assert!(app.lists()[0].tasks.is_err());
        assert!(app.status().starts_with("Error loading tasks for list"));
    }

    #[tokio::test]
    async fn refresh_reports_list_failure() {
        let api = fake();
        api.fail_on("list_task_lists");
        let mut app = App::new(api);
        app.refresh().await;

        assert!(app.rows().is_empty());
        assert!(app.status().starts_with("Error loading task lists"));
    }

    #[tokio::test]
    async fn add_task_into_unloaded_list_reloads_it() {
        let api = fake();
        api.fail_on("list_tasks");
        let mut app = App::new(api);
        app.refresh().await;
        app.api().recover("list_tasks");

        app.add_task("Tea").await;

        let titles: Vec<_> = app.lists()[0]
            .tasks
            .as_ref()
            .unwrap()
            .iter()
            .map(|t| t.title.as_str())
            .collect();
        assert_eq!(titles, ["Milk", "Bread", "Eggs", "Tea"]);
        assert_eq!(app.selected_task().unwrap().title, "Tea");
        assert_eq!(app.status(), "Task 'Tea' added successfully");
    }

    #[tokio::test]
    async fn add_task_keeps_load_error_when_reload_fails() {
        let api = fake();
        api.fail_on("list_tasks");
        let mut app = App::new(api);
        app.refresh().await;

        app.add_task("Tea").await;

        assert_eq!(app.api().count("insert_task"), 1);
        assert!(app.lists()[0].tasks.is_err());
        assert_eq!(app.rows()[1], Row::Notice(0));
        assert!(app.status().starts_with("Task 'Tea' added, but the list could not be reloaded"));
        assert_eq!(app.api().titles("L1"), ["Milk", "Bread", "Eggs", "Tea"]);
    }

    #[tokio::test]
    async fn add_task_inserts_once_and_is_listed_afterwards() {
        let mut app = loaded().await;
        app.next(); // Milk, inside Groceries

        app.add_task("Butter").await;

        assert_eq!(app.api().count("insert_task"), 1);
        assert_eq!(app.selected_task().unwrap().title, "Butter");

        app.refresh().await;
        let titles: Vec<_> = app.lists()[0]
            .tasks
            .as_ref()
            .unwrap()
            .iter()
            .map(|t| t.title.as_str())
            .collect();
        assert_eq!(titles, ["Milk", "Bread", "Eggs", "Butter"]);
        assert_eq!(app.api().count("insert_task"), 1);
    }

    #[tokio::test]
    async fn add_task_into_empty_list_from_notice_row() {
        let mut app = loaded().await;
        app.previous(); // wraps to the Work notice row
        assert_eq!(app.selected_row(), Some(Row::Notice(1)));

        app.add_task("Report").await;
        assert_eq!(app.api().titles("L2"), ["Report"]);
        assert_eq!(app.selected_row(), Some(Row::Task(1, 0)));
    }

    #[tokio::test]
    async fn blank_title_makes_no_call() {
        let mut app = loaded().await;
        app.add_task("   ").await;
        assert_eq!(app.api().count("insert_task"), 0);
        assert_eq!(app.status(), "Task title cannot be empty");
    }

    #[tokio::test]
    async fn delete_task_requires_confirmation_and_removes_it() {
        let mut app = loaded().await;
        app.next();
        app.request_delete();
        assert!(matches!(app.mode(), Mode::Confirm(PendingDelete::Task { .. })));
        assert_eq!(app.api().count("delete_task"), 0);

        app.confirm_delete().await;
        assert_eq!(app.status(), "Task deleted successfully");

        app.refresh().await;
        assert_eq!(app.api().titles("L1"), ["Bread", "Eggs"]);
        assert!(app.lists()[0]
            .tasks
            .as_ref()
            .unwrap()
            .iter()
            .all(|t| t.id != "t1"));
    }

    #[tokio::test]
    async fn cancelled_delete_keeps_task() {
        let mut app = loaded().await;
        app.next();
        app.request_delete();
        app.cancel();
        assert_eq!(app.mode(), &Mode::Normal);
        assert_eq!(app.api().count("delete_task"), 0);
    }

    #[tokio::test]
    async fn delete_list_row_deletes_whole_list() {
        let mut app = loaded().await;
        app.request_delete();
        app.confirm_delete().await;

        assert_eq!(app.api().count("delete_task_list"), 1);
        assert_eq!(app.lists().len(), 1);
        assert_eq!(app.lists()[0].list.title, "Work");
    }

    #[tokio::test]
    async fn failed_delete_leaves_local_copy() {
        let mut app = loaded().await;
        app.api().fail_on("delete_task");
        app.next();
        app.request_delete();
        app.confirm_delete().await;

        assert_eq!(app.lists()[0].tasks.as_ref().unwrap().len(), 3);
        assert!(app.status().starts_with("Error deleting task"));
    }

    #[tokio::test]
    async fn toggle_flips_status() {
        let mut app = loaded().await;
        app.next();
        app.toggle_selected().await;
        assert!(app.selected_task().unwrap().is_completed());
        assert_eq!(app.status(), "Task marked as completed");

        app.toggle_selected().await;
        assert!(!app.selected_task().unwrap().is_completed());
        assert_eq!(app.status(), "Task marked as needsAction");
    }

    #[tokio::test]
    async fn edits_go_through_patch() {
        let mut app = loaded().await;
        app.next();

        app.edit_title("Oat milk").await;
        app.edit_notes("  2 litres ").await;
        app.set_due("2024-06-01").await;

        let task = app.selected_task().unwrap();
        assert_eq!(task.title, "Oat milk");
        assert_eq!(task.notes.as_deref(), Some("2 litres"));
        assert_eq!(task.due.unwrap().format("%Y-%m-%d").to_string(), "2024-06-01");
        assert_eq!(app.api().count("patch_task"), 3);

        app.set_due("").await;
        assert!(app.selected_task().unwrap().due.is_none());
    }

    #[tokio::test]
    async fn invalid_due_date_is_rejected_locally() {
        let mut app = loaded().await;
        app.next();
        app.set_due("next tuesday").await;
        assert_eq!(app.api().count("patch_task"), 0);
        assert!(app.status().starts_with("Invalid date"));
    }

    #[tokio::test]
    async fn input_mode_prefills_and_submits() {
        let mut app = loaded().await;
        app.next();
        app.begin_input(InputPurpose::EditTitle);
        assert_eq!(
            app.mode(),
            &Mode::Input {
                purpose: InputPurpose::EditTitle,
                buffer: "Milk".to_string()
            }
        );

        app.pop_char();
        app.push_char('t');
        app.submit_input().await;
        assert_eq!(app.selected_task().unwrap().title, "Milt");
        assert_eq!(app.mode(), &Mode::Normal);
    }

    #[tokio::test]
    async fn pop_char_removes_whole_grapheme() {
        let mut app = loaded().await;
        app.begin_input(InputPurpose::AddList);
        for c in "cafe\u{301}".chars() {
            app.push_char(c);
        }
        app.pop_char();
        assert_eq!(
            app.mode(),
            &Mode::Input {
                purpose: InputPurpose::AddList,
                buffer: "caf".to_string()
            }
        );
    }

    #[tokio::test]
    async fn add_and_rename_list() {
        let mut app = loaded().await;
        app.add_list("Errands").await;
        assert_eq!(app.selected_row(), Some(Row::List(2)));

        app.rename_list("Chores").await;
        assert_eq!(app.lists()[2].list.title, "Chores");
        assert_eq!(app.api().count("rename_task_list"), 1);
    }

    #[tokio::test]
    async fn move_down_sends_new_predecessor() {
        let mut app = loaded().await;
        app.next();
        app.move_selected(MoveDirection::Down).await;

        assert_eq!(app.api().titles("L1"), ["Bread", "Milk", "Eggs"]);
        assert_eq!(app.selected_task().unwrap().title, "Milk");
        assert_eq!(app.selected_row(), Some(Row::Task(0, 1)));
    }

    #[tokio::test]
    async fn move_up_to_top() {
        let mut app = loaded().await;
        app.next();
        app.next();
        app.move_selected(MoveDirection::Up).await;
        assert_eq!(app.api().titles("L1"), ["Bread", "Milk", "Eggs"]);

        app.move_selected(MoveDirection::Up).await;
        assert_eq!(app.api().count("move_task"), 1);
    }

    #[tokio::test]
    async fn failed_move_reloads() {
        let mut app = loaded().await;
        app.api().fail_on("move_task");
        app.next();
        app.move_selected(MoveDirection::Down).await;

        assert_eq!(app.api().count("list_task_lists"), 2);
        assert!(app.status().starts_with("Error updating task position"));
    }

    #[tokio::test]
    async fn navigation_wraps() {
        let mut app = loaded().await;
        app.previous();
        assert_eq!(app.selected_index(), 5);
        app.next();
        assert_eq!(app.selected_index(), 0);
    }
}
