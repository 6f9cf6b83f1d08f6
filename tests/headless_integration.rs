use std::rc::Rc;
use std::sync::mpsc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{Local, TimeZone};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use stepeeeasy::app::App;
use stepeeeasy::clock::ManualClock;
use stepeeeasy::config::{ConfigStore, FileConfigStore};
use stepeeeasy::runtime::{AppEvent, FixedTicker, Runner, TestEventSource};
use stepeeeasy::session::{SessionState, WalkSession};
use stepeeeasy::step_source::{NoStepCounter, SimulatedStepCounter};
use stepeeeasy::store::{SqliteWalkStore, WalkStore};

fn key(c: char) -> AppEvent {
    AppEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
}

fn clock() -> ManualClock {
    ManualClock::new(Local.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap())
}

// Headless walk driven through the runtime Runner without a TTY:
// start, feed sensor readings, let the clock move, stop.
#[test]
fn headless_walk_is_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();
    let store: Rc<dyn WalkStore> = Rc::new(
        SqliteWalkStore::open(dir.path().join("walks.db"))
            .unwrap()
            .with_clock(clock.clone()),
    );
    let config = FileConfigStore::with_path(dir.path().join("config.json"));
    config.save_height(175).unwrap();

    // the device has been counting since boot
    let counter = SimulatedStepCounter::with_boot_count(10_000);
    let sensor = counter.sensor();
    let session = WalkSession::new(Rc::clone(&store), counter, config.clone())
        .with_clock(clock.clone())
        .with_tick_interval(Duration::from_millis(5));
    let mut app = App::new(session, Rc::clone(&store), Box::new(config), Some(sensor.clone()))
        .unwrap();

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );

    tx.send(key('s')).unwrap();
    for _ in 0..20u32 {
        match runner.step() {
            AppEvent::Key(k) => app.on_key(k),
            AppEvent::Resize => {}
            AppEvent::Tick => {
                app.on_tick();
            }
        }
        if app.session_state().is_active() {
            break;
        }
    }
    assert_matches!(app.session_state(), SessionState::Active(a) if a.steps == 0);

    sensor.take_steps(5432);
    clock.advance(chrono::Duration::seconds(95));
    for _ in 0..50u32 {
        if let AppEvent::Tick = runner.step() {
            app.on_tick();
        }
        if let SessionState::Active(a) = app.session_state() {
            if a.elapsed_seconds == 95 && a.steps == 5432 {
                break;
            }
        }
    }
    assert_matches!(
        app.session_state(),
        SessionState::Active(a) if a.elapsed_seconds == 95 && a.steps == 5432
    );
    assert_eq!(app.session.height().get(), 175);

    tx.send(key('s')).unwrap();
    if let AppEvent::Key(k) = runner.step() {
        app.on_key(k);
    }

    assert_eq!(*app.session_state(), SessionState::Idle);
    assert!(!app.session.is_timer_running());
    assert_eq!(app.history().len(), 1);

    let walk = &app.history()[0];
    assert_eq!(walk.total_steps, 5432);
    assert!((walk.distance_meters - 4087.58).abs() < 1e-6);
    assert!(!walk.is_active);
    assert_eq!(walk.duration_seconds(), 95);
    assert!(store.active_walk().unwrap().is_none());
}

#[test]
fn headless_sensor_reboot_keeps_counted_steps() {
    let dir = tempfile::tempdir().unwrap();
    let store: Rc<dyn WalkStore> = Rc::new(SqliteWalkStore::open_in_memory().unwrap());
    let config = FileConfigStore::with_path(dir.path().join("config.json"));

    let counter = SimulatedStepCounter::with_boot_count(800);
    let sensor = counter.sensor();
    let mut session = WalkSession::new(Rc::clone(&store), counter, config);

    session.start();
    sensor.take_steps(120);
    session.pump();
    sensor.reboot();
    sensor.take_steps(30);
    session.pump();

    assert_matches!(session.state(), SessionState::Active(a) if a.steps == 150);

    let walk = session.stop().unwrap();
    assert_eq!(walk.total_steps, 150);
}

#[test]
fn headless_unavailable_sensor_creates_no_walk() {
    let dir = tempfile::tempdir().unwrap();
    let store: Rc<dyn WalkStore> = Rc::new(SqliteWalkStore::open_in_memory().unwrap());
    let config = FileConfigStore::with_path(dir.path().join("config.json"));
    let session = WalkSession::new(Rc::clone(&store), NoStepCounter, config.clone());
    let mut app = App::new(session, Rc::clone(&store), Box::new(config), None).unwrap();

    app.on_key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::NONE));

    assert_matches!(
        app.session_state(),
        SessionState::Error { message }
            if message == "Step counter sensor not available on this device"
    );
    assert!(store.all_walks().unwrap().is_empty());
}

#[test]
fn headless_orphaned_walk_is_closed_on_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("walks.db");

    {
        let store = SqliteWalkStore::open(&db).unwrap();
        store.start_walk().unwrap();
    }

    let store = SqliteWalkStore::open(&db).unwrap();
    let closed = store.close_orphaned_walk().unwrap().unwrap();
    assert!(!closed.is_active);
    assert!(closed.end_time.is_some());
    assert!(store.active_walk().unwrap().is_none());

    // a new walk can start afterwards
    assert!(store.start_walk().is_ok());
}
