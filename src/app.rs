use crate::config::ConfigStore;
use crate::session::{SessionState, WalkSession};
use crate::step_source::{SimulatedSensor, StepSource};
use crate::store::{LiveQuery, StoreError, WalkStore};
use crate::stride::HeightCm;
use crate::walk::Walk;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Screen {
    Home,
    History,
    Settings,
}

impl Screen {
    pub const ALL: [Screen; 3] = [Screen::Home, Screen::History, Screen::Settings];

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn previous(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Draft input and dialogs of the settings screen
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SettingsState {
    pub height_input: String,
    pub error_message: Option<String>,
    pub show_clear_dialog: bool,
    /// One-shot confirmation shown until the next key press
    pub notice: Option<String>,
}

pub struct App<S: StepSource = Box<dyn StepSource>> {
    pub session: WalkSession<S>,
    pub screen: Screen,
    pub settings: SettingsState,
    pub saved_height: HeightCm,
    pub activity_recognition_enabled: bool,
    pub should_quit: bool,
    store: Rc<dyn WalkStore>,
    config: Box<dyn ConfigStore>,
    history: LiveQuery<Vec<Walk>>,
    sensor: Option<SimulatedSensor>,
}

impl<S: StepSource> App<S> {
    pub fn new(
        session: WalkSession<S>,
        store: Rc<dyn WalkStore>,
        config: Box<dyn ConfigStore>,
        sensor: Option<SimulatedSensor>,
    ) -> Result<Self, StoreError> {
        let history = LiveQuery::<Vec<Walk>>::completed_walks(&*store)?;
        let cfg = config.load();
        Ok(Self {
            session,
            screen: Screen::Home,
            settings: SettingsState::default(),
            saved_height: cfg.height_cm,
            activity_recognition_enabled: cfg.activity_recognition_enabled,
            should_quit: false,
            store,
            config,
            history,
            sensor,
        })
    }

    /// Completed walks, newest first
    pub fn history(&self) -> &[Walk] {
        self.history.current()
    }

    pub fn session_state(&self) -> &SessionState {
        self.session.state()
    }

    pub fn has_simulated_sensor(&self) -> bool {
        self.sensor.is_some()
    }

    /// Apply queued session updates and refresh the history view.
    /// Returns whether anything visible changed.
    pub fn on_tick(&mut self) -> bool {
        let mut changed = self.session.pump();
        match self.history.refresh(&*self.store) {
            Ok(refreshed) => changed |= refreshed,
            Err(e) => log::error!("failed to refresh walk history: {e}"),
        }
        changed
    }

    pub fn on_key(&mut self, key: KeyEvent) {
        self.handle_key(key);
        self.on_tick();
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit();
            return;
        }

        self.settings.notice = None;

        if self.settings.show_clear_dialog {
            match key.code {
                KeyCode::Char('y') | KeyCode::Enter => self.confirm_clear_walks(),
                KeyCode::Char('n') | KeyCode::Esc => self.settings.show_clear_dialog = false,
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.quit(),
            KeyCode::Tab => self.screen = self.screen.next(),
            KeyCode::BackTab => self.screen = self.screen.previous(),
            KeyCode::Char(' ') => self.simulate_step(),
            _ => match self.screen {
                Screen::Home => self.on_home_key(key),
                Screen::History => {}
                Screen::Settings => self.on_settings_key(key),
            },
        }
    }

    fn on_home_key(&mut self, key: KeyEvent) {
        if let KeyCode::Char('s') | KeyCode::Enter = key.code {
            self.toggle_walk();
        }
    }

    fn on_settings_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char(c) if c.is_ascii_digit() => {
                self.settings.height_input.push(c);
                self.settings.error_message = None;
            }
            KeyCode::Backspace => {
                self.settings.height_input.pop();
                self.settings.error_message = None;
            }
            KeyCode::Enter => self.save_height(),
            KeyCode::Char('a') => self.toggle_activity_recognition(),
            KeyCode::Char('c') => self.settings.show_clear_dialog = true,
            _ => {}
        }
    }

    pub fn toggle_walk(&mut self) {
        if self.session.state().is_active() {
            self.session.stop();
        } else {
            self.session.start();
        }
    }

    pub fn simulate_step(&mut self) {
        if let Some(sensor) = &self.sensor {
            sensor.take_steps(1);
        }
    }

    pub fn save_height(&mut self) {
        let Ok(cm) = self.settings.height_input.parse::<u32>() else {
            self.settings.error_message = Some("Please enter a valid number".to_string());
            return;
        };

        match self.config.save_height(cm) {
            Ok(height) => {
                self.saved_height = height;
                self.settings.height_input.clear();
                self.settings.error_message = None;
                self.settings.notice = Some("Height saved successfully".to_string());
            }
            Err(e) => self.settings.error_message = Some(e.to_string()),
        }
    }

    fn toggle_activity_recognition(&mut self) {
        let enabled = !self.activity_recognition_enabled;
        match self.config.save_activity_recognition_enabled(enabled) {
            Ok(()) => self.activity_recognition_enabled = enabled,
            Err(e) => self.settings.error_message = Some(e.to_string()),
        }
    }

    pub fn confirm_clear_walks(&mut self) {
        self.settings.show_clear_dialog = false;
        match self.store.delete_all_walks() {
            Ok(()) => self.settings.notice = Some("All walks cleared".to_string()),
            Err(e) => self.settings.error_message = Some(e.to_string()),
        }
    }

    /// Leave the app, saving the walk in progress
    pub fn quit(&mut self) {
        if self.session.state().is_active() {
            log::info!("saving walk in progress before exit");
            self.session.stop();
        }
        self.should_quit = true;
    }
}
