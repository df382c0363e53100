//! Full-screen dashboard over every site on the host.
//!
//! The main loop draws, then waits up to 100 ms for a key:
//! `q`/`Ctrl-C` quit, `r` rescans (blocking until done), arrows move the
//! selection. The terminal is restored on every exit path.

use std::{
    io::{self, Stdout},
    time::Duration,
};

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};

use crate::{
    context::Context,
    inventory::{self, DomainRecord, InventoryFilter},
    shell::ShellCommand,
};

type Term = Terminal<CrosstermBackend<Stdout>>;

/// `du -sh` prints `<size>\t<path>`.
pub fn parse_du(output: &str) -> String {
    output
        .split_whitespace()
        .next()
        .unwrap_or("-")
        .to_string()
}

/// Date of the last login from `lastlog -u <user>` output.
pub fn parse_lastlog(output: &str) -> String {
    let line = match output.lines().nth(1) {
        Some(line) => line,
        None => return "-".to_string(),
    };
    if line.contains("**Never logged in**") {
        return "Never".to_string();
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() >= 6 {
        format!("{} {} {}", fields[3], fields[4], fields[5])
    } else {
        "Never".to_string()
    }
}

/// Inventory rows enriched with disk usage and last login, sorted by
/// server then domain.
pub async fn collect(ctx: &Context) -> Vec<DomainRecord> {
    let filter = InventoryFilter {
        hide_system: true,
        ..InventoryFilter::default()
    };
    let mut records = inventory::list(&ctx.layout, &filter);
    records.sort_by(|a, b| (a.server, &a.domain).cmp(&(b.server, &b.domain)));

    for record in &mut records {
        let home = ctx.layout.home_dir(&record.user);
        let du = ctx
            .exec()
            .capture(&ShellCommand::new("du").args(["-sh".to_string(), home.to_string_lossy().to_string()]))
            .await;
        record.disk_usage = Some(parse_du(&du));

        let lastlog = ctx
            .exec()
            .capture(&ShellCommand::new("lastlog").args(["-u", record.user.as_str()]))
            .await;
        record.last_login = Some(parse_lastlog(&lastlog));
    }

    records
}

struct Dashboard {
    rows: Vec<DomainRecord>,
    state: TableState,
    should_quit: bool,
}

impl Dashboard {
    fn new(rows: Vec<DomainRecord>) -> Self {
        let mut state = TableState::default();
        if !rows.is_empty() {
            state.select(Some(0));
        }
        Self {
            rows,
            state,
            should_quit: false,
        }
    }

    fn set_rows(&mut self, rows: Vec<DomainRecord>) {
        let selected = self.state.selected().unwrap_or(0);
        self.rows = rows;
        if self.rows.is_empty() {
            self.state.select(None);
        } else {
            self.state.select(Some(selected.min(self.rows.len() - 1)));
        }
    }

    fn next(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < self.rows.len() => i + 1,
            Some(i) => i,
            None => 0,
        };
        self.state.select(Some(i));
    }

    fn previous(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        let i = self.state.selected().map_or(0, |i| i.saturating_sub(1));
        self.state.select(Some(i));
    }
}

enum Action {
    Quit,
    Refresh,
    Up,
    Down,
    Noop,
}

fn handle_key(key: KeyEvent) -> Action {
    if key.kind != KeyEventKind::Press {
        return Action::Noop;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('r') => Action::Refresh,
        KeyCode::Up | KeyCode::Char('k') => Action::Up,
        KeyCode::Down | KeyCode::Char('j') => Action::Down,
        _ => Action::Noop,
    }
}

fn render(frame: &mut Frame, dashboard: &mut Dashboard) {
    let [table_area, help_area] =
        Layout::vertical([Constraint::Min(3), Constraint::Length(1)]).areas(frame.area());

    let header = Row::new(["Domain", "User", "Enabled", "Disk Used", "Last Login", "Server"])
        .style(Style::default().add_modifier(Modifier::BOLD));

    let rows = dashboard.rows.iter().map(|r| {
        Row::new([
            r.domain.clone(),
            r.user.clone(),
            if r.enabled { "Yes" } else { "No" }.to_string(),
            r.disk_usage.clone().unwrap_or_else(|| "-".to_string()),
            r.last_login.clone().unwrap_or_else(|| "-".to_string()),
            r.server.to_string(),
        ])
    });

    let widths = [
        Constraint::Length(28),
        Constraint::Length(12),
        Constraint::Length(8),
        Constraint::Length(10),
        Constraint::Length(14),
        Constraint::Length(10),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Stackroost Monitor ")
                .title_style(Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)),
        )
        .row_highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    frame.render_stateful_widget(table, table_area, &mut dashboard.state);
    frame.render_widget(
        Paragraph::new("[↑↓ to scroll] [r]efresh [q]uit").style(Style::default().fg(Color::DarkGray)),
        help_area,
    );
}

fn init_terminal() -> Result<Term> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal(terminal: &mut Term) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

async fn event_loop(ctx: &Context, terminal: &mut Term, dashboard: &mut Dashboard) -> Result<()> {
    loop {
        terminal.draw(|frame| render(frame, dashboard))?;

        if dashboard.should_quit {
            return Ok(());
        }

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            match handle_key(key) {
                Action::Quit => dashboard.should_quit = true,
                Action::Refresh => dashboard.set_rows(collect(ctx).await),
                Action::Up => dashboard.previous(),
                Action::Down => dashboard.next(),
                Action::Noop => {}
            }
        }
    }
}

/// Runs the dashboard until the user quits.
pub async fn run(ctx: &Context) -> Result<()> {
    let mut dashboard = Dashboard::new(collect(ctx).await);

    let mut terminal = init_terminal()?;
    let result = event_loop(ctx, &mut terminal, &mut dashboard).await;
    restore_terminal(&mut terminal)?;

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::ServerType;

    #[test]
    fn du_size_is_first_field() {
        assert_eq!(parse_du("1.2G\t/home/blog\n"), "1.2G");
        assert_eq!(parse_du(""), "-");
    }

    #[test]
    fn lastlog_variants() {
        let logged = "Username         Port     From             Latest\n\
                      blog             pts/0    10.0.0.9         Mon Oct 13 10:00:00 +0000 2025\n";
        assert_eq!(parse_lastlog(logged), "Mon Oct 13");

        let never = "Username         Port     From             Latest\n\
                     blog                                        **Never logged in**\n";
        assert_eq!(parse_lastlog(never), "Never");
        assert_eq!(parse_lastlog(""), "-");
    }

    fn record(domain: &str) -> DomainRecord {
        DomainRecord {
            domain: domain.into(),
            server: ServerType::Nginx,
            enabled: true,
            user: "u".into(),
            disk_usage: None,
            last_login: None,
        }
    }

    #[test]
    fn selection_stays_in_bounds() {
        let mut dashboard = Dashboard::new(vec![record("a.io"), record("b.io")]);
        dashboard.previous();
        assert_eq!(dashboard.state.selected(), Some(0));
        dashboard.next();
        dashboard.next();
        assert_eq!(dashboard.state.selected(), Some(1));

        dashboard.set_rows(vec![record("a.io")]);
        assert_eq!(dashboard.state.selected(), Some(0));
        dashboard.set_rows(Vec::new());
        assert_eq!(dashboard.state.selected(), None);
    }

    #[test]
    fn ctrl_c_quits() {
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(matches!(handle_key(key), Action::Quit));
        let key = KeyEvent::new(KeyCode::Char('r'), KeyModifiers::NONE);
        assert!(matches!(handle_key(key), Action::Refresh));
    }
}
