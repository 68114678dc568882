//! Backdrop - headless driver for the appearance engine
//!
//! Runs the engine against a logging surface, or reads and edits the stored
//! preferences directly.
//!
//! ```text
//! backdrop run [SECONDS]          apply preferences and keep timers running
//! backdrop get [KEY]              print stored preferences
//! backdrop set KEY=VALUE...       write preferences in order
//! backdrop upload [--carousel] FILE...
//! backdrop theme [dark|light|toggle]
//! backdrop reset                  delete every preference
//! ```

mod surface;

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use backdrop_config::{Config, FileStore, PrefKey, PreferenceEvent, PreferenceWatcher, Preferences};
use backdrop_engine::{Engine, EngineOptions, Upload};

use surface::{LogNotifier, LogSurface};

/// Longest sleep between loop iterations, so file changes are picked up promptly
const MAX_IDLE: Duration = Duration::from_millis(100);
/// Time allowed for fades to finish before a one-shot command exits
const SETTLE: Duration = Duration::from_secs(1);

type HeadlessEngine = Engine<LogSurface, LogNotifier>;

struct App {
    config: Config,
    config_dir: PathBuf,
}

impl App {
    fn load() -> Result<Self> {
        let config_dir = Config::config_dir().context("Failed to locate config directory")?;
        let config = Config::load_or_create_in(&config_dir).context("Failed to load configuration")?;
        Ok(Self { config, config_dir })
    }

    fn preferences_path(&self) -> PathBuf {
        self.config.preferences_path(&self.config_dir)
    }

    fn preferences(&self) -> Preferences {
        Preferences::new(
            FileStore::open(self.preferences_path()),
            self.config.preference_defaults(),
        )
    }

    fn engine(&self) -> HeadlessEngine {
        let mut engine = Engine::new(
            LogSurface::new(),
            LogNotifier,
            self.preferences(),
            EngineOptions::from_config(&self.config),
        );
        engine.initialize();
        engine
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn,backdrop=info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, rest) = match args.split_first() {
        Some((command, rest)) => (command.as_str(), rest),
        None => ("run", &[][..]),
    };

    let app = App::load()?;
    match command {
        "run" => run(&app, rest),
        "get" => get(&app, rest),
        "set" => set(&app, rest),
        "upload" => upload(&app, rest),
        "theme" => theme(&app, rest),
        "reset" => reset(&app),
        "help" | "--help" | "-h" => {
            println!("usage: backdrop [run|get|set|upload|theme|reset] ...");
            Ok(())
        }
        other => bail!("Unknown command '{}'", other),
    }
}

/// Drive the engine from the wall clock until `limit` elapses, reloading
/// when the preferences file changes
fn drive(engine: &mut HeadlessEngine, watcher: Option<&mut PreferenceWatcher>, limit: Option<Duration>) -> Result<()> {
    let started = Instant::now();
    let mut last = started;
    let mut watcher = watcher;

    loop {
        let now = Instant::now();
        engine.advance(now - last);
        last = now;

        if let Some(watcher) = watcher.as_deref_mut() {
            match watcher.poll() {
                Some(PreferenceEvent::Changed) => {
                    engine
                        .reload_preferences()
                        .context("Failed to reload preferences")?;
                }
                Some(PreferenceEvent::WatchError(e)) => log::warn!("Preference watcher: {}", e),
                None => {}
            }
        }

        if limit.is_some_and(|limit| started.elapsed() >= limit) {
            return Ok(());
        }

        let idle = engine
            .next_deadline()
            .map(|deadline| deadline.saturating_sub(engine.now()))
            .unwrap_or(MAX_IDLE)
            .min(MAX_IDLE);
        thread::sleep(idle);
    }
}

fn run(app: &App, args: &[String]) -> Result<()> {
    let limit = match args.first() {
        Some(secs) => Some(Duration::from_secs(
            secs.parse().with_context(|| format!("Invalid duration '{}'", secs))?,
        )),
        None => None,
    };

    let mut engine = app.engine();
    if let Some(state) = engine.derived_state() {
        log::info!(
            "theme={} glass={} image={}",
            state.theme,
            state.glass_mode,
            state.image_mode
        );
    }

    let mut watcher = match PreferenceWatcher::new(&app.preferences_path()) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            log::warn!("Preference changes will not be picked up: {}", e);
            None
        }
    };

    drive(&mut engine, watcher.as_mut(), limit)?;
    engine.teardown();
    Ok(())
}

fn get(app: &App, args: &[String]) -> Result<()> {
    let prefs = app.preferences();
    let keys: Vec<PrefKey> = match args.first() {
        Some(name) => vec![parse_key(name)?],
        None => PrefKey::ALL.to_vec(),
    };

    for key in keys {
        match prefs.raw(key) {
            Some(value) => println!("{} = {}", key, value),
            None if args.is_empty() => {}
            None => println!("{} (unset)", key),
        }
    }
    for unknown in prefs.unknown_keys() {
        log::warn!("Unrecognized stored key '{}'", unknown);
    }
    Ok(())
}

fn set(app: &App, args: &[String]) -> Result<()> {
    if args.is_empty() {
        bail!("Expected KEY=VALUE");
    }
    let mut entries = Vec::with_capacity(args.len());
    for arg in args {
        let (name, value) = arg
            .split_once('=')
            .with_context(|| format!("Expected KEY=VALUE, got '{}'", arg))?;
        entries.push((parse_key(name)?, value.to_string()));
    }

    let mut prefs = app.preferences();
    prefs.save_many(&entries).map_err(|e| {
        for key in &e.written {
            log::warn!("'{}' was saved before the failure", key);
        }
        e
    })?;
    println!("Saved {} preference(s)", entries.len());
    Ok(())
}

fn upload(app: &App, args: &[String]) -> Result<()> {
    let (carousel, paths) = match args.split_first() {
        Some((flag, paths)) if flag == "--carousel" => (true, paths),
        _ => (false, args),
    };
    if paths.is_empty() {
        bail!("Expected at least one file");
    }
    if !carousel && paths.len() > 1 {
        bail!("Only one background can be uploaded at a time; use --carousel for several");
    }

    let uploads = paths.iter().map(|p| read_upload(p)).collect::<Result<Vec<_>>>()?;

    let mut engine = app.engine();
    if carousel {
        let added = engine.add_carousel_images(&uploads);
        println!("Added {} of {} image(s) to the carousel", added, uploads.len());
    } else {
        engine.upload_background(&uploads[0])?;
        println!("Background set from {}", uploads[0].name);
    }
    drive(&mut engine, None, Some(SETTLE))?;
    engine.teardown();
    Ok(())
}

fn theme(app: &App, args: &[String]) -> Result<()> {
    let mut engine = app.engine();
    match args.first().map(String::as_str) {
        Some("dark") => engine.set_dark_mode(true),
        Some("light") => engine.set_dark_mode(false),
        Some("toggle") | None => {
            engine.toggle_dark_mode();
        }
        Some(other) => bail!("Unknown theme '{}'", other),
    }
    engine.teardown();
    Ok(())
}

fn reset(app: &App) -> Result<()> {
    let mut engine = app.engine();
    engine.reset().context("Failed to clear preferences")?;
    engine.teardown();
    println!("Preferences cleared");
    Ok(())
}

fn parse_key(name: &str) -> Result<PrefKey> {
    PrefKey::parse(name).with_context(|| format!("Unknown preference '{}'", name))
}

fn read_upload(path: &str) -> Result<Upload> {
    let path = Path::new(path);
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Upload::new(name, bytes))
}
