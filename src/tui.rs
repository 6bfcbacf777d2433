use crate::app::{App, InputPurpose, Mode, MoveDirection, Row};
use crate::google_api::{Task, TasksApi};
use anyhow::Result;
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row as TableRow, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::io::{self, stdout};
use std::panic;
use std::time::Duration;
use tracing::info;
use unicode_segmentation::UnicodeSegmentation;

const NOTES_PREVIEW_GRAPHEMES: usize = 40;

/// What the event loop should do after a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub async fn run<A: TasksApi>(api: A) -> Result<()> {
    let mut app = App::new(api);

    // start tui
    install_panic_hook();
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &mut app).await;

    restore_terminal()?;
    result
}

fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, cursor::Show)
}

/// A panic inside the UI would otherwise leave the shell in raw mode with the
/// message hidden on the alternate screen.
fn install_panic_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let _ = restore_terminal();
        previous(info);
    }));
}

async fn event_loop<B: Backend, A: TasksApi>(
    terminal: &mut Terminal<B>,
    app: &mut App<A>,
) -> Result<()> {
    app.set_status("Loading tasks...");
    terminal.draw(|f| draw(f, app))?;
    app.refresh().await;

    loop {
        terminal.draw(|f| draw(f, app))?;

        if event::poll(Duration::from_millis(250))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if is_remote_action(app, key) {
                    app.set_status("Working...");
                    terminal.draw(|f| draw(f, app))?;
                }
                if handle_key(app, key).await == Flow::Quit {
                    info!("quit requested");
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Keys whose handling waits on the network, so the status line can say so first.
fn is_remote_action<A: TasksApi>(app: &App<A>, key: KeyEvent) -> bool {
    match app.mode() {
        Mode::Normal => matches!(
            key.code,
            KeyCode::Char(' ' | 'r' | 'K' | 'J') | KeyCode::Enter
        ) || (key.modifiers.contains(KeyModifiers::SHIFT)
            && matches!(key.code, KeyCode::Up | KeyCode::Down)),
        Mode::Input { .. } => key.code == KeyCode::Enter,
        Mode::Confirm(_) => matches!(key.code, KeyCode::Char('y' | 'Y')),
    }
}

pub async fn handle_key<A: TasksApi>(app: &mut App<A>, key: KeyEvent) -> Flow {
    match app.mode() {
        Mode::Normal => return handle_normal_key(app, key).await,
        Mode::Input { .. } => match key.code {
            KeyCode::Enter => app.submit_input().await,
            KeyCode::Esc => app.cancel(),
            KeyCode::Backspace => app.pop_char(),
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                app.push_char(c)
            }
            _ => {}
        },
        Mode::Confirm(_) => match key.code {
            KeyCode::Char('y' | 'Y') => app.confirm_delete().await,
            KeyCode::Char('n' | 'N') | KeyCode::Esc => {
                app.cancel();
                app.set_status("Deletion cancelled");
            }
            _ => {}
        },
    }
    Flow::Continue
}

async fn handle_normal_key<A: TasksApi>(app: &mut App<A>, key: KeyEvent) -> Flow {
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return Flow::Quit,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Flow::Quit,
        KeyCode::Up if shift => app.move_selected(MoveDirection::Up).await,
        KeyCode::Down if shift => app.move_selected(MoveDirection::Down).await,
        KeyCode::Char('K') => app.move_selected(MoveDirection::Up).await,
        KeyCode::Char('J') => app.move_selected(MoveDirection::Down).await,
        KeyCode::Down | KeyCode::Char('j') => app.next(),
        KeyCode::Up | KeyCode::Char('k') => app.previous(),
        KeyCode::Char(' ') | KeyCode::Enter => app.toggle_selected().await,
        KeyCode::Char('a') => app.begin_input(InputPurpose::AddTask),
        KeyCode::Char('e') => app.begin_input(InputPurpose::EditTitle),
        KeyCode::Char('n') => app.begin_input(InputPurpose::EditNotes),
        KeyCode::Char('u') => app.begin_input(InputPurpose::SetDue),
        KeyCode::Char('L') => app.begin_input(InputPurpose::AddList),
        KeyCode::Char('R') => app.begin_input(InputPurpose::RenameList),
        KeyCode::Char('d') | KeyCode::Delete => app.request_delete(),
        KeyCode::Char('r') => app.refresh().await,
        _ => {}
    }
    Flow::Continue
}

pub fn draw<A: TasksApi>(f: &mut Frame, app: &App<A>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(f.area());

    let header_cells = ["Task", "Due", "Notes"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().bold().underlined()));
    let header = TableRow::new(header_cells).height(1);

    let rows = app.rows().into_iter().map(|row| table_row(app, row));

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(55),
            Constraint::Length(12),
            Constraint::Percentage(45),
        ],
    )
    .header(header)
    .row_highlight_style(Style::default().bg(Color::Blue))
    .block(Block::default().borders(Borders::ALL).title("Google Tasks"));

    let mut state = TableState::default().with_selected(Some(app.selected_index()));
    f.render_stateful_widget(table, chunks[0], &mut state);

    let status = Paragraph::new(app.status().to_string()).style(Style::default().fg(Color::Yellow));
    f.render_widget(status, chunks[1]);

    let footer = Paragraph::new(footer_text(app.mode()))
        .style(Style::default().fg(Color::White).bg(Color::DarkGray));
    f.render_widget(footer, chunks[2]);

    match app.mode() {
        Mode::Input { purpose, buffer } => {
            let area = popup_area(f.area(), 60, 3);
            let input = Paragraph::new(format!("{buffer}_"))
                .block(Block::default().borders(Borders::ALL).title(purpose.prompt()));
            f.render_widget(Clear, area);
            f.render_widget(input, area);
        }
        Mode::Confirm(pending) => {
            let area = popup_area(f.area(), 60, 4);
            let question = Paragraph::new(pending.question())
                .wrap(Wrap { trim: true })
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title("Confirm Deletion (y/n)"),
                );
            f.render_widget(Clear, area);
            f.render_widget(question, area);
        }
        Mode::Normal => {}
    }
}

fn table_row<A: TasksApi>(app: &App<A>, row: Row) -> TableRow<'static> {
    let lists = app.lists();
    match row {
        Row::List(li) => TableRow::new(vec![Cell::from(format!("▸ {}", lists[li].list.title))])
            .style(Style::default().add_modifier(Modifier::BOLD)),
        Row::Task(li, ti) => match &lists[li].tasks {
            Ok(tasks) => task_row(&tasks[ti]),
            Err(_) => TableRow::default(),
        },
        Row::Notice(li) => {
            let (text, color) = match &lists[li].tasks {
                Err(e) => (format!("  {e}"), Color::Red),
                Ok(_) => ("  No tasks in this list".to_string(), Color::DarkGray),
            };
            TableRow::new(vec![Cell::from(text)])
                .style(Style::default().fg(color).add_modifier(Modifier::ITALIC))
        }
    }
}

fn task_row(task: &Task) -> TableRow<'static> {
    let title = if task.is_completed() {
        format!("  ✓ {}", task.title)
    } else {
        format!("  {}", task.title)
    };
    let due = task
        .due
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    let notes = task
        .notes
        .as_deref()
        .and_then(|n| n.lines().next())
        .map(|line| truncate(line, NOTES_PREVIEW_GRAPHEMES))
        .unwrap_or_default();

    let style = if task.is_completed() {
        Style::default().fg(Color::Gray).add_modifier(Modifier::DIM)
    } else {
        Style::default()
    };
    TableRow::new(vec![Cell::from(title), Cell::from(due), Cell::from(notes)]).style(style)
}

fn footer_text(mode: &Mode) -> &'static str {
    match mode {
        Mode::Normal => {
            "↑/↓: Navigate | space: Toggle | a: Add | e: Edit | n: Notes | u: Due | d: Delete | L/R: New/Rename list | J/K: Move | r: Refresh | q: Quit"
        }
        Mode::Input { .. } => "enter: Save | esc: Cancel",
        Mode::Confirm(_) => "y: Delete | n: Keep",
    }
}

fn truncate(text: &str, max: usize) -> String {
    let mut graphemes = text.graphemes(true);
    let head: String = graphemes.by_ref().take(max).collect();
    if graphemes.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

fn popup_area(area: Rect, percent_x: u16, height: u16) -> Rect {
    let [row] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    let [popup] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(row);
    popup
}
