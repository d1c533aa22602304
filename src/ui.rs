use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use financial_reconciliation::{FieldComparison, ReconciliationReport};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    All,
    Mismatches,
}

pub struct App {
    pub report: ReconciliationReport,
    pub rows: Vec<(String, FieldComparison)>,
    pub state: TableState,
    pub filter: FilterType,
}

impl App {
    pub fn new(report: ReconciliationReport) -> Self {
        let mut app = Self {
            report,
            rows: Vec::new(),
            state: TableState::default(),
            filter: FilterType::All,
        };
        app.apply_filter(FilterType::All);
        app
    }

    pub fn apply_filter(&mut self, filter: FilterType) {
        self.filter = filter;
        self.rows = self
            .report
            .discrepancies
            .iter()
            .filter(|(_, c)| filter == FilterType::All || !c.matched)
            .map(|(field, c)| (field.to_string(), c.clone()))
            .collect();

        self.state
            .select(if self.rows.is_empty() { None } else { Some(0) });
    }

    pub fn toggle_filter(&mut self) {
        let next = match self.filter {
            FilterType::All => FilterType::Mismatches,
            FilterType::Mismatches => FilterType::All,
        };
        self.apply_filter(next);
    }

    pub fn next(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < self.rows.len() => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => self.rows.len() - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
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
                KeyCode::Char('m') | KeyCode::Tab => app.toggle_filter(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::Home => {
                    if !app.rows.is_empty() {
                        app.state.select(Some(0));
                    }
                }
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
            Constraint::Length(4), // Company header
            Constraint::Min(0),    // Field table
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);
    render_table(f, chunks[1], app);
    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let report = &app.report;
    let verdict = if report.is_clean() {
        Span::styled("ALL MATCH", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
    } else {
        Span::styled("DISCREPANCIES", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))
    };

    let lines = vec![
        Line::from(vec![
            Span::styled("Company: ", Style::default().fg(Color::Yellow)),
            Span::raw(report.company_name.clone()),
            Span::raw("  →  "),
            Span::styled(report.resolved_name.clone(), Style::default().fg(Color::Cyan)),
            Span::raw(format!(" ({:?} match)", report.match_kind)),
        ]),
        Line::from(vec![
            verdict,
            Span::raw(format!("  {}", report.discrepancies.summary())),
        ]),
    ];

    let header = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Reconciliation "),
    );

    f.render_widget(header, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Field", "Extracted", "Stored", "Match"]
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

    let rows = app.rows.iter().map(|(field, c)| {
        let (label, color) = if c.matched {
            ("✓", Color::Green)
        } else {
            ("✗", Color::Red)
        };

        Row::new(vec![
            Cell::from(field.clone()),
            Cell::from(c.extracted.to_string()).style(Style::default().fg(color)),
            Cell::from(c.stored.to_string()),
            Cell::from(label).style(Style::default().fg(color)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(34),
            Constraint::Length(24),
            Constraint::Length(24),
            Constraint::Length(6),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Fields "),
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
    let filter = match app.filter {
        FilterType::All => "all fields",
        FilterType::Mismatches => "mismatches only",
    };

    let status = Paragraph::new(Line::from(vec![
        Span::styled(
            format!(" Row: {}/{} ", selected, app.rows.len()),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(" | "),
        Span::styled(format!("Showing {}", filter), Style::default().fg(Color::Green)),
        Span::raw(" | "),
        Span::styled("m", Style::default().fg(Color::Yellow)),
        Span::raw(" toggle  "),
        Span::styled("j/k", Style::default().fg(Color::Yellow)),
        Span::raw(" move  "),
        Span::styled("q", Style::default().fg(Color::Yellow)),
        Span::raw(" quit"),
    ]))
    .block(Block::default().borders(Borders::ALL));

    f.render_widget(status, area);
}
