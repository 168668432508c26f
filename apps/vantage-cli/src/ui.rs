use std::{
    collections::VecDeque,
    sync::mpsc::{Receiver, Sender, TryRecvError},
    time::Duration,
};

use anyhow::Result;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event as CEvent, KeyCode, KeyEventKind,
        MouseButton, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Sparkline},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tracing::debug;
use vantage_session::{BoardCursor, BoardLayout, RenderFrame, Renderer, SessionInput};
use vantage_telemetry::{heatmap::HEAT_RGB, HistoryCell};
use vantage_types::{
    board::{self, Square},
    events::SessionEvent,
    telemetry::SeriesStyle,
};

const MAX_LOG_ENTRIES: usize = 120;
const CELL_WIDTH: u16 = 3;

const LIGHT: (u8, u8, u8) = (240, 217, 181);
const DARK: (u8, u8, u8) = (181, 136, 99);
const LAST_MOVE: (u8, u8, u8) = (205, 210, 106);
const SELECTED: (u8, u8, u8) = (130, 151, 105);

pub enum UiMessage {
    Frame(Box<RenderFrame>),
    Event(SessionEvent),
    Shutdown,
}

/// Hands frames to the terminal thread.
pub struct ChannelRenderer {
    tx: Sender<UiMessage>,
}

impl ChannelRenderer {
    pub fn new(tx: Sender<UiMessage>) -> Self {
        Self { tx }
    }
}

impl Renderer for ChannelRenderer {
    fn render(&mut self, frame: &RenderFrame) -> vantage_types::Result<()> {
        if self.tx.send(UiMessage::Frame(Box::new(frame.clone()))).is_err() {
            debug!("terminal closed, frame dropped");
        }
        Ok(())
    }
}

pub fn run(
    receiver: Receiver<UiMessage>,
    inputs: mpsc::Sender<SessionInput>,
    summary: String,
) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.hide_cursor()?;

    let res = run_loop(&mut terminal, receiver, inputs, summary.as_str());

    terminal.show_cursor()?;
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    res
}

struct ViewState {
    frame: Option<RenderFrame>,
    logs: VecDeque<String>,
    cursor: BoardCursor,
    layout: Option<BoardLayout>,
}

impl ViewState {
    fn new() -> Self {
        Self {
            frame: None,
            logs: VecDeque::with_capacity(MAX_LOG_ENTRIES),
            cursor: BoardCursor::new(Square { file: 4, rank: 1 }),
            layout: None,
        }
    }

    fn push_log(&mut self, event: &SessionEvent) {
        if self.logs.len() == MAX_LOG_ENTRIES {
            self.logs.pop_front();
        }
        self.logs.push_back(format!(
            "[{}] {:?} {}",
            event.timestamp.format("%H:%M:%S"),
            event.kind,
            event.payload.summary()
        ));
    }
}

fn run_loop<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    receiver: Receiver<UiMessage>,
    inputs: mpsc::Sender<SessionInput>,
    summary: &str,
) -> Result<()> {
    let mut view = ViewState::new();

    loop {
        loop {
            match receiver.try_recv() {
                Ok(UiMessage::Frame(frame)) => view.frame = Some(*frame),
                Ok(UiMessage::Event(event)) => view.push_log(&event),
                Ok(UiMessage::Shutdown) | Err(TryRecvError::Disconnected) => return Ok(()),
                Err(TryRecvError::Empty) => break,
            }
        }

        terminal.draw(|f| draw(f, &mut view, summary))?;

        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let input = match event::read()? {
            CEvent::Key(key) if key.kind == KeyEventKind::Press => {
                let orientation = view
                    .frame
                    .as_ref()
                    .map(|f| f.orientation)
                    .unwrap_or(board::Color::White);
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Up => move_cursor(&mut view, 0, 1, orientation),
                    KeyCode::Down => move_cursor(&mut view, 0, -1, orientation),
                    KeyCode::Left => move_cursor(&mut view, -1, 0, orientation),
                    KeyCode::Right => move_cursor(&mut view, 1, 0, orientation),
                    KeyCode::Enter | KeyCode::Char(' ') => Some(SessionInput::Click(view.cursor.square)),
                    KeyCode::Char('[') => Some(SessionInput::Step(-1)),
                    KeyCode::Char(']') => Some(SessionInput::Step(1)),
                    KeyCode::Home => Some(SessionInput::Goto(0)),
                    KeyCode::End => view.frame.as_ref().map(|f| SessionInput::Goto(f.len)),
                    KeyCode::Char('r') => Some(SessionInput::Refresh),
                    _ => None,
                }
            }
            CEvent::Mouse(mouse) if mouse.kind == MouseEventKind::Down(MouseButton::Left) => view
                .layout
                .and_then(|layout| layout.square_at(mouse.column, mouse.row))
                .map(|square| {
                    view.cursor.square = square;
                    SessionInput::Click(square)
                }),
            _ => None,
        };

        if let Some(input) = input {
            if inputs.blocking_send(input).is_err() {
                return Ok(());
            }
        }
    }
}

fn move_cursor(
    view: &mut ViewState,
    right: i8,
    up: i8,
    orientation: board::Color,
) -> Option<SessionInput> {
    view.cursor.shift(right, up, orientation);
    None
}

fn draw(f: &mut Frame, view: &mut ViewState, summary: &str) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(12),
            Constraint::Length(8),
        ])
        .split(f.size());

    draw_header(f, rows[0], view.frame.as_ref(), summary);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(CELL_WIDTH * 8 + 2),
            Constraint::Length(26),
            Constraint::Min(30),
        ])
        .split(rows[1]);

    match view.frame.clone() {
        Some(frame) => {
            view.layout = Some(draw_board(f, columns[0], &frame, view.cursor));
            draw_history(f, columns[1], &frame);
            draw_telemetry(f, columns[2], &frame);
        }
        None => {
            let waiting = Paragraph::new("waiting for backend...")
                .block(Block::default().borders(Borders::ALL).title("Board"));
            f.render_widget(waiting, rows[1]);
        }
    }

    let items: Vec<ListItem> = view
        .logs
        .iter()
        .rev()
        .map(|entry| ListItem::new(entry.clone()))
        .collect();
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Events"));
    f.render_widget(list, rows[2]);
}

fn draw_header(f: &mut Frame, area: Rect, frame: Option<&RenderFrame>, summary: &str) {
    let mut spans = vec![
        Span::styled(
            "Vantage",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
    ];
    if let Some(frame) = frame {
        spans.push(Span::raw(frame.status.clone()));
        spans.push(Span::raw(format!("  ply {}/{}", frame.view, frame.len)));
        if let Some(view) = frame.queued_goto {
            spans.push(Span::styled(
                format!("  (goto {view} queued)"),
                Style::default().fg(Color::Yellow),
            ));
        }
    }
    spans.extend([
        Span::raw("  "),
        Span::styled(summary.to_string(), Style::default().fg(Color::Magenta)),
        Span::raw("  "),
        Span::styled("q", Style::default().fg(Color::Yellow)),
        Span::raw(" quit  "),
        Span::styled("[ ]", Style::default().fg(Color::Yellow)),
        Span::raw(" step"),
    ]);
    let title = match frame {
        Some(frame) => format!("Session [{}]", frame.selection.label()),
        None => "Session".to_string(),
    };
    let header = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(header, area);
}

fn draw_board(f: &mut Frame, area: Rect, frame: &RenderFrame, cursor: BoardCursor) -> BoardLayout {
    let block = Block::default().borders(Borders::ALL).title(match frame.side_to_move {
        Some(board::Color::White) => "Board (white to move)",
        Some(board::Color::Black) => "Board (black to move)",
        None => "Board",
    });
    let inner = block.inner(area);
    f.render_widget(block, area);

    let layout = BoardLayout::new(inner.x, inner.y, CELL_WIDTH, 1, frame.orientation);
    let highlights = &frame.highlights;
    for square in Square::all() {
        let (x, y) = layout.cell_origin(square);
        if x + CELL_WIDTH > inner.right() || y >= inner.bottom() {
            continue;
        }
        let mut rgb = if (square.file + square.rank) % 2 == 0 { DARK } else { LIGHT };
        if highlights
            .last_move
            .is_some_and(|m| m.from == square || m.to == square)
        {
            rgb = LAST_MOVE;
        }
        if highlights.selected == Some(square) {
            rgb = SELECTED;
        }

        let glyph = match frame.placement.piece_at(square) {
            Some(piece) => piece.fen_char(),
            None if highlights.destinations.contains(&square) => '·',
            None => ' ',
        };
        let mut style = Style::default()
            .bg(Color::Rgb(rgb.0, rgb.1, rgb.2))
            .fg(match frame.placement.piece_at(square) {
                Some(piece) if piece.owner == board::Color::White => Color::White,
                Some(_) => Color::Black,
                None => Color::DarkGray,
            });
        if square == cursor.square {
            style = style.add_modifier(Modifier::REVERSED);
        }
        let cell = Paragraph::new(Span::styled(format!(" {glyph} "), style));
        f.render_widget(cell, Rect::new(x, y, CELL_WIDTH, 1));
    }
    layout
}

fn draw_history(f: &mut Frame, area: Rect, frame: &RenderFrame) {
    let items: Vec<ListItem> = frame
        .history
        .iter()
        .map(|row| {
            ListItem::new(Line::from(vec![
                Span::raw(format!("{:>3}. ", row.number)),
                history_span(row.white.as_ref()),
                Span::raw(" "),
                history_span(row.black.as_ref()),
            ]))
        })
        .collect();
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Moves"));
    f.render_widget(list, area);
}

fn history_span(cell: Option<&HistoryCell>) -> Span<'static> {
    let Some(cell) = cell else {
        return Span::raw(format!("{:<10}", ""));
    };
    let bar = "▮".repeat((cell.bar_fraction * 3.0).round() as usize);
    let text = format!("{:<6}{:<4}", cell.san, bar);
    if cell.active {
        Span::styled(
            text,
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    } else {
        Span::raw(text)
    }
}

fn draw_telemetry(f: &mut Frame, area: Rect, frame: &RenderFrame) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(6),
            Constraint::Length(4),
            Constraint::Length(4),
            Constraint::Length(10),
        ])
        .split(area);

    let stats = &frame.stats;
    let mut lines = vec![
        Line::from(format!("Win rate     {}", stats.win_rate)),
        Line::from(format!("Simulations  {}", stats.simulations)),
        Line::from(format!("Depth        {}", stats.depth)),
    ];
    for pv in &stats.principal_variations {
        lines.push(Line::from(vec![
            Span::styled(pv.line.clone(), Style::default().fg(Color::Cyan)),
            Span::raw(format!("  {}", pv.detail)),
        ]));
    }
    let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Engine"));
    f.render_widget(panel, sections[0]);

    draw_series(f, sections[1], &frame.eval_style, &to_bars(&frame.series.eval_values()), 100);
    let depths = to_bars(&frame.series.depth_values());
    let depth_max = depths.iter().copied().max().unwrap_or(1).max(1);
    draw_series(f, sections[2], &frame.depth_style, &depths, depth_max);

    let heat_rows: Vec<Line> = frame
        .heatmap
        .rows_top_down()
        .into_iter()
        .map(|row| {
            Line::from(
                row.into_iter()
                    .map(|(_, intensity)| {
                        let (r, g, b) = frame.heatmap_style.blend((32, 32, 32), intensity);
                        Span::styled("  ", Style::default().bg(Color::Rgb(r, g, b)))
                    })
                    .collect::<Vec<_>>(),
            )
        })
        .collect();
    let (r, g, b) = HEAT_RGB;
    let heatmap = Paragraph::new(heat_rows).block(
        Block::default()
            .borders(Borders::ALL)
            .title(Span::styled("Heatmap", Style::default().fg(Color::Rgb(r, g, b)))),
    );
    f.render_widget(heatmap, sections[3]);
}

fn draw_series(f: &mut Frame, area: Rect, style: &SeriesStyle, data: &[u64], max: u64) {
    let color = style
        .rgb()
        .map(|(r, g, b)| Color::Rgb(r, g, b))
        .unwrap_or(Color::White);
    let latest = match data.last() {
        Some(value) if style.is_percentage => format!("{value}%"),
        Some(value) => value.to_string(),
        None => "-".into(),
    };
    let sparkline = Sparkline::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("{} ({latest})", style.label)),
        )
        .data(data)
        .max(max)
        .style(Style::default().fg(color));
    f.render_widget(sparkline, area);
}

fn to_bars(values: &[f32]) -> Vec<u64> {
    values.iter().map(|v| v.max(0.0).round() as u64).collect()
}
