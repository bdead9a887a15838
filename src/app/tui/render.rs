use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Gauge, Paragraph};

use crate::catalog::Tier;
use crate::client::{PackClient, PackInfo, PackStatus};
use crate::kv::KeyValueStore;
use crate::packs::pack_card;

use super::super::{status_text, truncate};

const ACCENT: Color = Color::Rgb(110, 170, 255);
const MUTED: Color = Color::Rgb(185, 195, 210);

pub(super) fn draw_tui<S: KeyValueStore>(
    frame: &mut Frame,
    client: &PackClient<'_, S>,
    selected: usize,
    status: &str,
) {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(9),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    frame.render_widget(header(client), chunks[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 3); 3])
        .split(chunks[1]);
    for (idx, (tier, info)) in client.packs().enumerate() {
        if let Some(area) = columns.get(idx) {
            draw_card(frame, *area, tier, info, idx == selected);
        }
    }

    let stored = match client.inventory() {
        Some([]) => "nothing stored yet".to_string(),
        Some(packs) => packs.join(", "),
        None => "unknown (press r)".to_string(),
    };
    let inventory = Paragraph::new(Line::from(vec![
        Span::styled("Stores on device: ", Style::default().fg(MUTED)),
        Span::styled(stored, Style::default().fg(Color::Rgb(230, 230, 230))),
    ]))
    .block(panel_block("Inventory"));
    frame.render_widget(inventory, chunks[2]);

    let controls = Paragraph::new(Line::from(Span::styled(
        "↑/↓ select  Enter download/retry  r refresh inventory  q quit",
        Style::default().fg(MUTED),
    )))
    .alignment(Alignment::Center)
    .block(panel_block("Controls"));
    frame.render_widget(controls, chunks[3]);

    let status_widget = Paragraph::new(status.to_string())
        .style(status_style(status))
        .block(panel_block("Status"));
    frame.render_widget(status_widget, chunks[4]);
}

fn header<S: KeyValueStore>(client: &PackClient<'_, S>) -> Paragraph<'static> {
    let worker = match client.worker() {
        Some(worker) => Span::styled(
            format!(
                "worker #{} {} ({})",
                worker.id(),
                worker.state(),
                worker.version()
            ),
            Style::default().fg(Color::Rgb(140, 220, 150)),
        ),
        None => Span::styled("worker unavailable", Style::default().fg(Color::Yellow)),
    };
    Paragraph::new(Line::from(vec![
        Span::styled(
            "LETRAS OFFLINE",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
        Span::styled("audio packs", Style::default().fg(MUTED)),
        Span::raw("   "),
        worker,
    ]))
    .alignment(Alignment::Center)
    .block(panel_block("Offline"))
}

fn draw_card(frame: &mut Frame, area: Rect, tier: Tier, info: PackInfo, selected: bool) {
    let card = pack_card(tier);
    let mut block = panel_block(tier.label());
    if selected {
        block = block.border_style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD));
    }
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(inner);

    let width = usize::from(inner.width.max(4));
    let text = vec![
        Line::from(Span::styled(
            truncate(card.description, width),
            Style::default().fg(Color::Rgb(230, 230, 230)),
        )),
        Line::from(Span::styled(
            format!("{} files · {}", info.audio_count, card.size_hint),
            Style::default().fg(MUTED),
        )),
        Line::from(Span::styled(
            status_text(info.status, info.progress),
            pack_status_style(info.status),
        )),
    ];
    frame.render_widget(Paragraph::new(text), rows[0]);

    let gauge = Gauge::default()
        .gauge_style(
            Style::default()
                .fg(gauge_color(info.status))
                .bg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .label(format!("{}%", info.progress))
        .ratio(f64::from(info.progress.min(100)) / 100.0);
    frame.render_widget(gauge, rows[1]);
}

fn panel_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn gauge_color(status: PackStatus) -> Color {
    match status {
        PackStatus::Done => Color::Rgb(140, 220, 150),
        PackStatus::Error => Color::Rgb(255, 145, 120),
        PackStatus::Idle | PackStatus::Downloading => Color::Rgb(130, 190, 255),
    }
}

fn pack_status_style(status: PackStatus) -> Style {
    Style::default().fg(gauge_color(status))
}

fn status_style(status: &str) -> Style {
    if status.starts_with("ERROR:") {
        Style::default()
            .fg(Color::Rgb(255, 145, 120))
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Rgb(205, 165, 255))
    }
}
