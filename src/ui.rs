use anyhow::Result;
use chrono::{Local, NaiveDate};
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use operation_history::{
    flatten_accounts, group_accounts_operations_by_day, Account, DailyOperations,
    GroupOpsByDayOpts, Operation, OperationType,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

/// A line of the history table: a day header or one record
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryRow {
    Day { day: NaiveDate, records: usize },
    Record(Operation),
}

pub struct App {
    pub accounts: Vec<Account>,
    pub opts: GroupOpsByDayOpts,
    pub page_size: usize,
    pub page: DailyOperations<Operation>,
    pub rows: Vec<HistoryRow>,
    pub state: TableState,
    pub show_detail: bool,
}

impl App {
    pub fn new(accounts: Vec<Account>, page_size: usize, with_sub_accounts: bool) -> Self {
        let opts = GroupOpsByDayOpts::new(page_size).with_sub_accounts(with_sub_accounts);
        let mut app = Self {
            accounts,
            opts,
            page_size,
            page: DailyOperations::empty_completed(),
            rows: Vec::new(),
            state: TableState::default(),
            show_detail: false,
        };
        app.reload();
        app
    }

    /// Regroup from scratch with the current options, keeping the selection when possible
    pub fn reload(&mut self) {
        self.page = group_accounts_operations_by_day(&self.accounts, self.opts);
        self.rows = self
            .page
            .sections
            .iter()
            .flat_map(|section| {
                std::iter::once(HistoryRow::Day {
                    day: section.day,
                    records: section.data.len(),
                })
                .chain(section.data.iter().cloned().map(HistoryRow::Record))
            })
            .collect();

        let selected = match (self.state.selected(), self.rows.len()) {
            (_, 0) => None,
            (Some(i), len) => Some(i.min(len - 1)),
            (None, _) => Some(0),
        };
        self.state.select(selected);
    }

    pub fn load_more(&mut self) {
        if self.page.completed {
            return;
        }
        self.opts = self.opts.next_page(self.page_size);
        self.reload();
    }

    pub fn toggle_sub_accounts(&mut self) {
        self.opts = GroupOpsByDayOpts::new(self.page_size)
            .with_sub_accounts(!self.opts.with_sub_accounts);
        self.state.select(None);
        self.reload();
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected_operation(&self) -> Option<&Operation> {
        match self.state.selected().and_then(|i| self.rows.get(i)) {
            Some(HistoryRow::Record(op)) => Some(op),
            _ => None,
        }
    }

    pub fn account_name(&self, account_id: &str) -> String {
        flatten_accounts(&self.accounts)
            .into_iter()
            .find(|account| account.id == account_id)
            .map(|account| format!("{} ({})", account.name, account.currency))
            .unwrap_or_else(|| account_id.to_string())
    }

    pub fn next(&mut self) {
        let len = self.rows.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            Some(_) => {
                // Bottom reached: pull the next page in
                self.load_more();
                len.min(self.rows.len() - 1)
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let i = match self.state.selected() {
            Some(i) => i.saturating_sub(1),
            None => 0,
        };
        if !self.rows.is_empty() {
            self.state.select(Some(i));
        }
    }

    pub fn page_down(&mut self) {
        let len = self.rows.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => (i + 20).min(len - 1),
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let i = match self.state.selected() {
            Some(i) => i.saturating_sub(20),
            None => 0,
        };
        if !self.rows.is_empty() {
            self.state.select(Some(i));
        }
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Char('m') => app.load_more(),
                KeyCode::Char('s') => app.toggle_sub_accounts(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.state.select(Some(0)),
                KeyCode::End => {
                    if !app.rows.is_empty() {
                        app.state.select(Some(app.rows.len() - 1));
                    }
                }
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // History
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);

        render_table(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        render_table(f, chunks[1], app);
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let spans = vec![
        Span::styled(
            "Operation History",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Accounts: {}", app.accounts.len()),
            Style::default().fg(Color::White),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Loaded: {} / requested {}", app.page.len(), app.opts.count),
            Style::default().fg(Color::White),
        ),
        Span::raw("  |  "),
        Span::styled(
            if app.opts.with_sub_accounts { "with sub-accounts" } else { "top-level only" },
            Style::default().fg(Color::Cyan),
        ),
    ];

    let header = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn type_color(operation_type: OperationType) -> Color {
    match operation_type {
        OperationType::Out | OperationType::Fees => Color::Red,
        OperationType::In | OperationType::Reward => Color::Green,
        OperationType::Delegate | OperationType::Undelegate => Color::Cyan,
        OperationType::None => Color::DarkGray,
    }
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Time", "Type", "Value", "Account", "Status"]
        .iter()
        .map(|h| {
            Cell::from(*h).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.rows.iter().map(|row| match row {
        HistoryRow::Day { day, records } => Row::new(vec![
            Cell::from(day.format("%a %Y-%m-%d").to_string()).style(
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            ),
            Cell::from(""),
            Cell::from(format!("{} op(s)", records)).style(Style::default().fg(Color::DarkGray)),
            Cell::from(""),
            Cell::from(""),
        ]),
        HistoryRow::Record(op) => {
            let color = type_color(op.operation_type);
            Row::new(vec![
                Cell::from(format!("  {}", op.date.with_timezone(&Local).format("%H:%M:%S"))),
                Cell::from(op.operation_type.as_str()).style(Style::default().fg(color)),
                Cell::from(format!("{:.6}", op.value)).style(Style::default().fg(color)),
                Cell::from(truncate(&op.account_id, 24)),
                if op.is_pending() {
                    Cell::from("pending").style(Style::default().fg(Color::Yellow))
                } else {
                    Cell::from("confirmed")
                },
            ])
        }
    });

    let title = if app.page.completed {
        " History - end reached ".to_string()
    } else {
        " History - press m for more ".to_string()
    };

    let table = Table::new(
        rows,
        [
            Constraint::Length(16),
            Constraint::Length(12),
            Constraint::Length(18),
            Constraint::Length(26),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);

    let status_spans = vec![
        Span::styled(
            format!(" Row: {}/{} ", selected, app.rows.len()),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(" | "),
        Span::styled("Enter", Style::default().fg(Color::Yellow)),
        Span::raw(" Details | "),
        Span::styled("m", Style::default().fg(Color::Yellow)),
        Span::raw(" More | "),
        Span::styled("s", Style::default().fg(Color::Yellow)),
        Span::raw(" Sub-accounts | "),
        Span::styled("↑/↓", Style::default().fg(Color::Yellow)),
        Span::raw(" Nav | "),
        Span::styled("q", Style::default().fg(Color::Red)),
        Span::raw(" Quit"),
    ];

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let op = match app.selected_operation() {
        Some(op) => op,
        None => {
            let no_selection = Paragraph::new("No operation selected").block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Yellow))
                    .title(" Operation Details "),
            );
            f.render_widget(no_selection, area);
            return;
        }
    };

    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let field = |name: &'static str, value: String| {
        Line::from(vec![Span::styled(format!("  {}: ", name), label), Span::raw(value)])
    };

    let block_height = op
        .block_height
        .map(|h| h.to_string())
        .unwrap_or_else(|| "pending".to_string());

    let mut content = vec![
        Line::from(""),
        field("Date", op.date.with_timezone(&Local).to_rfc2822()),
        field("Account", app.account_name(&op.account_id)),
        field("Type", op.operation_type.as_str().to_string()),
        field("Value", format!("{:.8}", op.value)),
        field("Fee", format!("{:.8}", op.fee)),
        field("Block", block_height),
        Line::from(""),
        field("Hash", truncate(&op.hash, 32)),
    ];

    if !op.senders.is_empty() {
        content.push(field("From", op.senders.join(", ")));
    }
    if !op.recipients.is_empty() {
        content.push(field("To", op.recipients.join(", ")));
    }

    content.push(Line::from(""));
    content.push(Line::from(vec![Span::styled(
        "  Press Enter to close",
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
    )]));

    let detail_panel = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Operation Details "),
    );

    f.render_widget(detail_panel, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
