pub mod config;
pub mod history;
pub mod metrics;
pub mod normalizer;
pub mod runtime;
pub mod session;
pub mod ui;

use crate::{
    config::{Config, ConfigStore, FileConfigStore},
    history::HistoryLog,
    runtime::{to_keystroke, AppEvent, CrosstermEventSource, FixedTicker, Runner},
    session::{LockoutPolicy, Session},
};
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyModifiers},
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
    fs,
    io::{self, stdin},
    path::PathBuf,
    time::{Duration, SystemTime},
};

const TICK_RATE_MS: u64 = 100;

/// terminal typing trainer: bring your own text and type it back
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Paste or load any text and type it back character by character, with live wpm, accuracy and error feedback. Three wrong keystrokes in a row lock the input for a moment, so mashing keys never pays."
)]
pub struct Cli {
    /// text to practice on
    #[clap(short = 'p', long, conflicts_with = "file")]
    prompt: Option<String>,

    /// file to read the practice text from
    #[clap(short = 'f', long)]
    file: Option<PathBuf>,

    /// disable the consecutive-error lockout
    #[clap(long)]
    no_lockout: bool,

    /// consecutive errors before the lockout engages
    #[clap(long)]
    lockout_threshold: Option<u32>,

    /// hide the live stats bar while typing
    #[clap(long)]
    simple: bool,
}

impl Cli {
    fn apply_to(&self, cfg: &mut Config) {
        if self.no_lockout {
            cfg.lockout = false;
        }
        if let Some(threshold) = self.lockout_threshold {
            cfg.lockout_threshold = threshold;
        }
        if self.simple {
            cfg.simple = true;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Typing,
    Results,
}

pub struct App {
    pub session: Session,
    pub screen: Screen,
    pub simple: bool,
    pub history: HistoryLog,
}

impl App {
    pub fn new(reference: &str, policy: LockoutPolicy, simple: bool) -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            session: Session::new(reference, policy)?,
            screen: Screen::Typing,
            simple,
            history: HistoryLog::new(),
        })
    }
}

fn resolve_text(cli: &Cli) -> Result<String, String> {
    let raw = if let Some(prompt) = &cli.prompt {
        prompt.clone()
    } else if let Some(path) = &cli.file {
        fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))?
    } else {
        return Err("provide a practice text with --prompt or --file".to_string());
    };

    let result = normalizer::validate(&raw);
    if !result.is_valid {
        return Err(format!("{}: {}", result.message, result.issues.join(", ")));
    }
    Ok(normalizer::normalize(&raw))
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let reference = match resolve_text(&cli) {
        Ok(text) => text,
        Err(msg) => {
            let mut cmd = Cli::command();
            cmd.error(ErrorKind::ValueValidation, msg).exit();
        }
    };

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let mut config = FileConfigStore::new().load();
    cli.apply_to(&mut config);

    let mut app = App::new(&reference, config.lockout_policy(), config.simple)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let run = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    run
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> Result<(), Box<dyn Error>> {
    let event_source = CrosstermEventSource::new();
    let ticker = FixedTicker::new(Duration::from_millis(TICK_RATE_MS));
    let runner = Runner::new(event_source, ticker);

    terminal.draw(|f| f.render_widget(&*app, f.area()))?;

    loop {
        match runner.step() {
            AppEvent::Tick => {
                let now = SystemTime::now();
                app.session.tick(now);

                if app.screen == Screen::Typing {
                    if let Some(record) = app.session.poll_completion(now) {
                        // Best-effort log; a read-only data dir should not
                        // break the results screen
                        let _ = app.history.append(&record);
                        app.screen = Screen::Results;
                        terminal.draw(|f| f.render_widget(&*app, f.area()))?;
                    } else if app.session.has_started() {
                        // Live wpm and the lockout countdown move with time
                        terminal.draw(|f| f.render_widget(&*app, f.area()))?;
                    }
                }
            }
            AppEvent::Resize => {
                terminal.draw(|f| f.render_widget(&*app, f.area()))?;
            }
            AppEvent::Key(key) => {
                match key.code {
                    KeyCode::Esc => break,
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
                    _ => match app.screen {
                        Screen::Typing => {
                            if let Some(keystroke) = to_keystroke(&key) {
                                app.session.keystroke(keystroke);
                            }
                        }
                        Screen::Results => {
                            if key.code == KeyCode::Char('r') {
                                app.session.restart();
                                app.screen = Screen::Typing;
                            }
                        }
                    },
                }
                terminal.draw(|f| f.render_widget(&*app, f.area()))?;
            }
        }
    }

    Ok(())
}
