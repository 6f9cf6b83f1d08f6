use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Cell, Paragraph, Row, Table, Widget},
};

use crate::format::{format_distance, format_steps};
use crate::walk::Walk;

/// Pure presenter for a single history row:
/// id | distance | steps | weekday | start date and time
pub fn present_row(walk: &Walk) -> Row<'static> {
    Row::new(vec![
        Cell::from(format!("#{}", walk.id)).style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Cell::from(format_distance(walk.distance_km()))
            .style(Style::default().add_modifier(Modifier::BOLD)),
        Cell::from(format!("{} steps", format_steps(walk.total_steps))),
        Cell::from(walk.date.format("%A").to_string()),
        Cell::from(walk.start_time.format("%b %d, %Y, %H:%M").to_string())
            .style(Style::default().add_modifier(Modifier::DIM)),
    ])
}

pub fn render_history(walks: &[Walk], area: Rect, buf: &mut Buffer) {
    if walks.is_empty() {
        let lines = vec![
            Line::styled("No walks yet", Style::default().add_modifier(Modifier::BOLD)),
            Line::from(""),
            Line::styled(
                "Start your first walk from the Home screen!",
                Style::default().add_modifier(Modifier::DIM),
            ),
        ];
        let top = area.height.saturating_sub(3) / 2;
        let centered = Rect {
            y: area.y + top,
            height: area.height.saturating_sub(top),
            ..area
        };
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .render(centered, buf);
        return;
    }

    let header = Row::new(vec!["Walk", "Distance", "Steps", "Day", "Started"]).style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );

    let widths = [
        Constraint::Length(6),
        Constraint::Length(14),
        Constraint::Length(16),
        Constraint::Length(11),
        Constraint::Min(20),
    ];

    Table::new(walks.iter().map(present_row), widths)
        .header(header)
        .column_spacing(2)
        .render(area, buf);
}
