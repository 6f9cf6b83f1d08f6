pub mod history;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Tabs, Widget, Wrap},
};

use crate::{
    app::{App, Screen},
    format::{format_distance_from_meters, format_elapsed_time, format_steps},
    session::SessionState,
    step_source::StepSource,
};

const HORIZONTAL_MARGIN: u16 = 2;

impl<S: StepSource> Widget for &App<S> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(3),
                Constraint::Length(1),
            ])
            .split(area);

        Tabs::new(Screen::ALL.iter().map(|s| s.to_string()))
            .select(self.screen.index())
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" StepEeeasy "),
            )
            .highlight_style(
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )
            .render(chunks[0], buf);

        let body = Rect {
            x: chunks[1].x + HORIZONTAL_MARGIN,
            width: chunks[1].width.saturating_sub(HORIZONTAL_MARGIN * 2),
            ..chunks[1]
        };

        match self.screen {
            Screen::Home => render_home(self, body, buf),
            Screen::History => history::render_history(self.history(), body, buf),
            Screen::Settings => render_settings(self, body, buf),
        }

        Paragraph::new(Span::styled(
            help_text(self),
            Style::default().add_modifier(Modifier::DIM),
        ))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

        if self.settings.show_clear_dialog {
            render_clear_dialog(area, buf);
        }
    }
}

fn help_text<S: StepSource>(app: &App<S>) -> String {
    let mut help = String::from("tab switch screen");
    match app.screen {
        Screen::Home => {
            if app.session_state().is_active() {
                help.push_str(" / (s)top walk");
            } else {
                help.push_str(" / (s)tart walk");
            }
        }
        Screen::History => {}
        Screen::Settings => help.push_str(" / enter save height / (a)ctivity / (c)lear walks"),
    }
    if app.has_simulated_sensor() {
        help.push_str(" / space step");
    }
    help.push_str(" / (q)uit");
    help
}

fn render_home<S: StepSource>(app: &App<S>, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let dim_style = Style::default().add_modifier(Modifier::DIM);

    let lines: Vec<Line> = match app.session_state() {
        SessionState::Idle => vec![
            Line::styled("Ready to walk", bold_style),
            Line::from(""),
            Line::styled(
                format!("Stride {:.2} m", app.saved_height.stride_length_meters()),
                dim_style,
            ),
            Line::from(""),
            Line::styled("press s to START", Style::default().fg(Color::Green)),
        ],
        SessionState::Active(active) => vec![
            Line::styled(
                format_elapsed_time(active.elapsed_seconds),
                bold_style.fg(Color::Cyan),
            ),
            Line::from(""),
            Line::from(vec![
                Span::styled(format_steps(active.steps), bold_style),
                Span::raw(" steps"),
            ]),
            Line::styled(format_distance_from_meters(active.distance_meters), bold_style),
            Line::from(""),
            Line::styled("press s to STOP", Style::default().fg(Color::Red)),
        ],
        SessionState::Error { message } => vec![
            Line::styled(message.clone(), bold_style.fg(Color::Red)),
            Line::from(""),
            Line::styled("press s to try again", dim_style),
        ],
    };

    let top = area.height.saturating_sub(lines.len() as u16) / 2;
    let centered = Rect {
        y: area.y + top,
        height: area.height.saturating_sub(top),
        ..area
    };

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(centered, buf);
}

fn render_settings<S: StepSource>(app: &App<S>, area: Rect, buf: &mut Buffer) {
    let dim_style = Style::default().add_modifier(Modifier::DIM);
    let settings = &app.settings;

    let mut lines = vec![
        Line::styled("Height (cm)", dim_style),
        Line::from(vec![
            Span::raw("> "),
            Span::styled(
                settings.height_input.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
        ]),
    ];

    match &settings.error_message {
        Some(err) => lines.push(Line::styled(err.clone(), Style::default().fg(Color::Red))),
        None => lines.push(Line::styled(
            format!(
                "Current: {} · Used to estimate stride length automatically",
                app.saved_height
            ),
            dim_style,
        )),
    }

    lines.push(Line::from(""));
    lines.push(Line::from(format!(
        "Activity Recognition: {}",
        if app.activity_recognition_enabled {
            "on"
        } else {
            "off"
        }
    )));
    lines.push(Line::from(""));
    lines.push(Line::styled(
        "CLEAR RECORDED WALKS (c)",
        Style::default().fg(Color::Yellow),
    ));

    if let Some(notice) = &settings.notice {
        lines.push(Line::from(""));
        lines.push(Line::styled(notice.clone(), Style::default().fg(Color::Green)));
    }

    lines.push(Line::from(""));
    lines.push(Line::styled("App data stored locally only.", dim_style));

    Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .render(area, buf);
}

fn render_clear_dialog(area: Rect, buf: &mut Buffer) {
    let width = area.width.min(54);
    let height = area.height.min(7);
    let dialog = Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    };

    Clear.render(dialog, buf);
    Paragraph::new(vec![
        Line::from("This will permanently delete all recorded walks."),
        Line::from("This action cannot be undone."),
        Line::from(""),
        Line::styled(
            "(y) CONFIRM    (n) CANCEL",
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Clear All Walks? "),
    )
    .render(dialog, buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileConfigStore;
    use crate::session::WalkSession;
    use crate::step_source::{NoStepCounter, SimulatedStepCounter};
    use crate::store::{SqliteWalkStore, WalkStore};
    use std::rc::Rc;

    fn buffer_text(buf: &Buffer) -> String {
        let width = buf.area.width as usize;
        buf.content
            .chunks(width)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render<S: StepSource>(app: &App<S>) -> String {
        let area = Rect::new(0, 0, 90, 20);
        let mut buf = Buffer::empty(area);
        app.render(area, &mut buf);
        buffer_text(&buf)
    }

    fn create_test_app<S: StepSource>(
        dir: &tempfile::TempDir,
        steps: S,
        sensor: Option<crate::step_source::SimulatedSensor>,
    ) -> App<S> {
        let store: Rc<dyn WalkStore> = Rc::new(SqliteWalkStore::open_in_memory().unwrap());
        let config = FileConfigStore::with_path(dir.path().join("config.json"));
        let session = WalkSession::new(Rc::clone(&store), steps, config.clone());
        App::new(session, store, Box::new(config), sensor).unwrap()
    }

    #[test]
    fn test_home_idle_and_active() {
        let dir = tempfile::tempdir().unwrap();
        let counter = SimulatedStepCounter::new();
        let sensor = counter.sensor();
        let mut app = create_test_app(&dir, counter, Some(sensor.clone()));

        let idle = render(&app);
        assert!(idle.contains("Ready to walk"));
        assert!(idle.contains("space step"));

        app.toggle_walk();
        sensor.take_steps(1234);
        app.on_tick();
        let active = render(&app);
        assert!(active.contains("00:00:0"));
        assert!(active.contains("1,234 steps"));
        assert!(active.contains("STOP"));
    }

    #[test]
    fn test_home_error_message() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = create_test_app(&dir, NoStepCounter, None);
        app.toggle_walk();

        let text = render(&app);
        assert!(text.contains("Step counter sensor not available on this device"));
        assert!(!text.contains("space step"));
    }

    #[test]
    fn test_history_empty_and_filled() {
        let dir = tempfile::tempdir().unwrap();
        let counter = SimulatedStepCounter::new();
        let sensor = counter.sensor();
        let mut app = create_test_app(&dir, counter, Some(sensor.clone()));
        app.screen = Screen::History;
        assert!(render(&app).contains("No walks yet"));

        app.toggle_walk();
        sensor.take_steps(7860);
        app.toggle_walk();
        app.on_tick();

        let text = render(&app);
        assert!(text.contains("#1"));
        assert!(text.contains("7,860 steps"));
        // 7860 steps at 170 cm
        assert!(text.contains("5 km 745 m"));
    }

    #[test]
    fn test_settings_and_dialog() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = create_test_app(&dir, NoStepCounter, None);
        app.screen = Screen::Settings;
        app.settings.height_input = "18".to_string();

        let text = render(&app);
        assert!(text.contains("> 18_"));
        assert!(text.contains("Current: 170 cm"));
        assert!(text.contains("Activity Recognition: off"));

        app.settings.show_clear_dialog = true;
        let text = render(&app);
        assert!(text.contains("Clear All Walks?"));
        assert!(text.contains("(y) CONFIRM"));
    }
}
