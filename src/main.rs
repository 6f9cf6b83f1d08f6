use chrono::{Local, NaiveDate};
use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    fs::{self, OpenOptions},
    io::{self, stdin, BufRead, Write},
    path::{Path, PathBuf},
    rc::Rc,
    time::Duration,
};
use stepeeeasy::{
    app::App,
    app_dirs::AppDirs,
    config::{ConfigStore, FileConfigStore, SensorKind},
    format::{format_distance, format_elapsed_time, format_steps},
    runtime::{AppEvent, CrosstermEventSource, FixedTicker, Runner},
    session::WalkSession,
    step_source::{
        FileStepCounter, NoStepCounter, Pacer, SimulatedSensor, SimulatedStepCounter, StepSource,
        IIO_DEVICES_DIR,
    },
    store::{SqliteWalkStore, WalkStore},
    walk::{Walk, WalkRecord},
};

const TICK_RATE_MS: u64 = 250;

/// Days covered by `daily` when no range is given, today included
const DEFAULT_DAILY_SPAN: i64 = 7;

/// step counting walk tracker for the terminal
#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "Track walks from your device's step counter: elapsed time, steps and distance estimated from your height, with a local history of every walk."
)]
pub struct Cli {
    /// walk database (default: ~/.local/state/stepeeeasy/walks.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// step counter to use, overriding the settings file
    #[arg(long, value_enum, global = true)]
    sensor: Option<SensorKind>,

    /// steps per minute generated by the simulated sensor
    #[arg(long, global = true)]
    cadence: Option<u32>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// record walks in the terminal UI (default)
    Track,
    /// list recorded walks, newest first
    History {
        /// first date to include (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// last date to include (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// per-day totals of completed walks
    Daily {
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// write every walk as CSV
    Export {
        /// output file, stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// show the saved height, or save a new one
    Height {
        /// height in centimeters (50-250)
        cm: Option<u32>,
    },
    /// delete all recorded walks
    Clear {
        /// skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging();

    let config = match &cli.config {
        Some(path) => FileConfigStore::with_path(path),
        None => FileConfigStore::new(),
    };

    match &cli.command {
        None | Some(Command::Track) => run_tracker(&cli, config),
        Some(Command::History { from, to }) => print_history(&open_store(&cli)?, *from, *to),
        Some(Command::Daily { from, to }) => print_daily(&open_store(&cli)?, *from, *to),
        Some(Command::Export { output }) => export_csv(&open_store(&cli)?, output.as_deref()),
        Some(Command::Height { cm }) => height(&config, *cm),
        Some(Command::Clear { yes }) => clear(&open_store(&cli)?, *yes),
    }
}

/// Log to a file under the state directory; the terminal belongs to the UI.
fn init_logging() {
    let Some(path) = AppDirs::log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
}

fn open_store(cli: &Cli) -> Result<SqliteWalkStore, Box<dyn Error>> {
    let store = match &cli.db {
        Some(path) => SqliteWalkStore::open(path)?,
        None => SqliteWalkStore::open_default()?,
    };
    Ok(store)
}

/// Step source chosen from the flags and settings, plus the handle that
/// drives it when it is simulated
fn build_step_source(
    cli: &Cli,
    config: &FileConfigStore,
) -> (Box<dyn StepSource>, Option<SimulatedSensor>, Option<Pacer>) {
    let cfg = config.load();
    let kind = cli.sensor.unwrap_or(cfg.sensor);
    let poll = Duration::from_millis(cfg.iio_poll_ms.max(10));
    log::info!("step sensor: {kind}");

    let mut sensor = None;
    let mut pacer = None;
    let source: Box<dyn StepSource> = match kind {
        SensorKind::Auto => {
            let counter = FileStepCounter::discover(Path::new(IIO_DEVICES_DIR), poll);
            if counter.is_available() {
                Box::new(counter)
            } else {
                Box::new(NoStepCounter)
            }
        }
        SensorKind::Iio => Box::new(FileStepCounter::discover(Path::new(IIO_DEVICES_DIR), poll)),
        SensorKind::Simulated => {
            let counter = SimulatedStepCounter::new();
            pacer = cli
                .cadence
                .or(cfg.cadence_spm)
                .map(|spm| Pacer::start(counter.sensor(), spm));
            sensor = Some(counter.sensor());
            Box::new(counter)
        }
        SensorKind::None => Box::new(NoStepCounter),
    };

    (source, sensor, pacer)
}

fn run_tracker(cli: &Cli, config: FileConfigStore) -> Result<(), Box<dyn Error>> {
    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let store: Rc<dyn WalkStore> = Rc::new(open_store(cli)?);
    if let Some(walk) = store.close_orphaned_walk()? {
        log::info!("recovered walk #{} with {} steps", walk.id, walk.total_steps);
    }

    let (steps, sensor, pacer) = build_step_source(cli, &config);
    let session = WalkSession::new(Rc::clone(&store), steps, config.clone());
    let mut app = App::new(session, store, Box::new(config), sensor)?;

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Some(pacer) = pacer {
        pacer.stop();
    }

    result
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    terminal.draw(|f| f.render_widget(&*app, f.area()))?;

    while !app.should_quit {
        let redraw = match runner.step() {
            AppEvent::Key(key) => {
                app.on_key(key);
                true
            }
            AppEvent::Resize => true,
            AppEvent::Tick => app.on_tick(),
        };

        if redraw && !app.should_quit {
            terminal.draw(|f| f.render_widget(&*app, f.area()))?;
        }
    }

    Ok(())
}

fn describe_walk(walk: &Walk) -> String {
    let duration = if walk.is_active {
        "in progress".to_string()
    } else {
        format_elapsed_time(walk.duration_seconds())
    };
    format!(
        "#{:<5} {} {:<9} {}  {:>11}  {:>12}  {}",
        walk.id,
        walk.date.format("%Y-%m-%d"),
        walk.date.format("%A"),
        walk.start_time.format("%H:%M"),
        duration,
        format!("{} steps", format_steps(walk.total_steps)),
        format_distance(walk.distance_km()),
    )
}

fn print_history(
    store: &dyn WalkStore,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<(), Box<dyn Error>> {
    let walks = match (from, to) {
        (None, None) => store.all_walks()?,
        (Some(start), end) => {
            let end = end.unwrap_or_else(|| Local::now().date_naive());
            store.walks_by_date_range(start, end)?
        }
        (None, Some(end)) => store
            .all_walks()?
            .into_iter()
            .filter(|w| w.date <= end)
            .collect(),
    };

    if walks.is_empty() {
        println!("No walks yet");
        return Ok(());
    }

    let mut out = io::stdout().lock();
    for walk in &walks {
        writeln!(out, "{}", describe_walk(walk))?;
    }
    Ok(())
}

fn print_daily(
    store: &dyn WalkStore,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<(), Box<dyn Error>> {
    let end = to.unwrap_or_else(|| Local::now().date_naive());
    let start = from.unwrap_or(end - chrono::Duration::days(DEFAULT_DAILY_SPAN - 1));

    let stats = store.daily_stats(start, end)?;
    if stats.is_empty() {
        println!("No walks between {start} and {end}");
        return Ok(());
    }

    let mut out = io::stdout().lock();
    for day in &stats {
        writeln!(
            out,
            "{} {:<9}  {:>2} {}  {:>12}  {}",
            day.date.format("%Y-%m-%d"),
            day.date.format("%A"),
            day.walk_count,
            if day.walk_count == 1 { "walk " } else { "walks" },
            format!("{} steps", format_steps(day.total_steps)),
            format_distance(day.total_distance_km()),
        )?;
    }
    Ok(())
}

fn export_csv(store: &dyn WalkStore, output: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let sink: Box<dyn Write> = match output {
        Some(path) => Box::new(fs::File::create(path)?),
        None => Box::new(io::stdout().lock()),
    };

    let walks = store.all_walks()?;
    let mut writer = csv::Writer::from_writer(sink);
    for walk in &walks {
        writer.serialize(WalkRecord::from(walk))?;
    }
    writer.flush()?;

    if let Some(path) = output {
        log::info!("exported {} walks to {}", walks.len(), path.display());
        eprintln!("Exported {} walks to {}", walks.len(), path.display());
    }
    Ok(())
}

fn height(config: &FileConfigStore, cm: Option<u32>) -> Result<(), Box<dyn Error>> {
    let height = match cm {
        Some(cm) => {
            let height = config.save_height(cm)?;
            println!("Height saved successfully");
            height
        }
        None => config.load().height_cm,
    };
    println!(
        "Height: {height} (stride {:.2} m)",
        height.stride_length_meters()
    );
    Ok(())
}

fn clear(store: &dyn WalkStore, yes: bool) -> Result<(), Box<dyn Error>> {
    if !yes {
        print!("This will permanently delete all recorded walks. Continue? [y/N] ");
        io::stdout().flush()?;
        let mut answer = String::new();
        stdin().lock().read_line(&mut answer)?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("Cancelled");
            return Ok(());
        }
    }

    store.delete_all_walks()?;
    println!("All walks cleared");
    Ok(())
}
