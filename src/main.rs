use anyhow::{bail, Context, Result};
use crossbeam_channel::{unbounded, Receiver};
use display_info::DisplayInfo;
use std::io::BufRead;
use std::path::Path;
use std::thread;
use std::time::Duration;
use sysinfo::System;

use encounter_scout::actuation::DesktopActuator;
use encounter_scout::bot::flee;
use encounter_scout::catalog::TargetCatalog;
use encounter_scout::config::Settings;
use encounter_scout::detection::{header_detected, identify_target, Identification};
use encounter_scout::perception::{Detection, Perception, ScreenPerception};
use encounter_scout::runtime::{BotRunner, LogConduit, LogLine, LogTag};

const LOG_TARGET_STARTUP: &str = "encounter_scout::startup";
const RENDER_INTERVAL: Duration = Duration::from_millis(100);

/// Initialize tracing with file rotation
///
/// Logs are written to:
/// - macOS: ~/Library/Application Support/EncounterScout/logs/
/// - Windows: %APPDATA%/EncounterScout/logs/
/// - Linux: ~/.config/EncounterScout/logs/
///
/// Debug builds also log to the console.
fn initialize_tracing() {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = Settings::app_dir()
        .map(|dir| dir.join("logs"))
        .unwrap_or_else(|_| std::path::PathBuf::from("logs"));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    let file_appender = rolling::daily(&log_dir, "encounter-scout.log");

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true);

    #[cfg(debug_assertions)]
    {
        let console_layer = fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();
    }

    tracing::info!("Log directory: {}", log_dir.display());
}

fn log_runtime_environment() {
    let version = env!("CARGO_PKG_VERSION");
    let os_name = System::long_os_version()
        .or_else(System::name)
        .unwrap_or_else(|| "Unknown OS".to_string());
    let kernel = System::kernel_version().unwrap_or_else(|| "Unknown Kernel".to_string());
    let architecture = std::env::consts::ARCH;

    tracing::info!(target: LOG_TARGET_STARTUP, "Starting Encounter Scout v{} on ({})", version, architecture);
    tracing::info!(target: LOG_TARGET_STARTUP, "Operating System: {} (kernel {})", os_name, kernel);

    if let Ok(displays) = DisplayInfo::all() {
        tracing::info!(
            target: LOG_TARGET_STARTUP,
            "Displays: {} detected",
            displays.len()
        );
        for (index, disp) in displays.iter().enumerate() {
            tracing::debug!(
                target: LOG_TARGET_STARTUP,
                "  Display {}: {}x{}{}",
                index,
                disp.width,
                disp.height,
                if disp.is_primary { " (primary)" } else { "" }
            );
        }
    }
}

fn main() {
    initialize_tracing();
    log_runtime_environment();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.first().map(String::as_str) {
        None | Some("--run") => run_bot(),
        Some("--test-header") => test_header(),
        Some("--test-ocr") => test_ocr(),
        Some("--test-match") => match (args.get(1), args.get(2)) {
            (Some(target), Some(label)) => test_match(target, label),
            _ => Err(anyhow::anyhow!("usage: --test-match <target> <label>")),
        },
        Some("--test-run-away") => test_run_away(),
        Some("--screenshot") => match args.get(1) {
            Some(path) => save_screenshot(Path::new(path)),
            None => Err(anyhow::anyhow!("usage: --screenshot <path>")),
        },
        Some(other) => {
            print_usage();
            Err(anyhow::anyhow!("unknown argument '{}'", other))
        }
    };

    if let Err(e) = result {
        tracing::error!("{:#}", e);
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}

fn print_usage() {
    println!("Usage: encounter-scout [MODE]");
    println!();
    println!("  (none)                       run the bot");
    println!("  --test-header                check the encounter header on screen");
    println!("  --test-ocr                   read the name plate");
    println!("  --test-match <target> <form> score one form photo against the screen");
    println!("  --test-run-away              run the run-away action once");
    println!("  --screenshot <path>          save a full-screen capture");
}

fn load_inputs() -> Result<(Settings, TargetCatalog)> {
    let settings = Settings::load().context("Failed to load settings")?;
    let catalog = TargetCatalog::load().context("Failed to load target catalog")?;
    Ok((settings, catalog))
}

/// Console commands typed while the bot runs
enum ConsoleCommand {
    Toggle,
    Start,
    Stop,
    Status,
    Quit,
}

fn spawn_console_reader() -> Result<Receiver<ConsoleCommand>> {
    let (tx, rx) = unbounded();
    thread::Builder::new()
        .name("console".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                let command = match line.trim().to_ascii_lowercase().as_str() {
                    "" => continue,
                    "toggle" | "t" => ConsoleCommand::Toggle,
                    "start" => ConsoleCommand::Start,
                    "stop" => ConsoleCommand::Stop,
                    "status" => ConsoleCommand::Status,
                    "quit" | "exit" | "q" => ConsoleCommand::Quit,
                    other => {
                        println!("Unknown command '{}'. Use toggle, start, stop, status or quit.", other);
                        continue;
                    }
                };
                if tx.send(command).is_err() {
                    break;
                }
            }
        })
        .context("Failed to start console reader")?;
    Ok(rx)
}

fn run_bot() -> Result<()> {
    let conduit = LogConduit::new();
    let runner = BotRunner::new(conduit.logger());

    let (settings, catalog) = load_inputs()?;
    let pause = settings.pause_hotkey.clone();
    let shutdown = settings.shutdown_hotkey.clone();
    runner.start(settings, catalog)?;

    println!("===========================================");
    println!("  Encounter Scout");
    println!("===========================================");
    println!("  {}  toggle scanning", pause);
    println!("  {}  emergency shutdown", shutdown);
    println!("  Console: toggle | stop | start | status | quit");
    println!();

    let commands = spawn_console_reader()?;
    loop {
        for line in conduit.drain() {
            render(&line);
        }

        match commands.recv_timeout(RENDER_INTERVAL) {
            Ok(ConsoleCommand::Toggle) => {
                if runner.is_running() {
                    runner.toggle_scan();
                } else {
                    println!("Bot is not running. Type 'start' first.");
                }
            }
            Ok(ConsoleCommand::Start) => match load_inputs() {
                Ok((settings, catalog)) => {
                    if let Err(e) = runner.start(settings, catalog) {
                        println!("✗ {}", e);
                    }
                }
                Err(e) => println!("✗ {:#}", e),
            },
            Ok(ConsoleCommand::Stop) => {
                if let Err(e) = runner.stop() {
                    println!("✗ {}", e);
                }
            }
            Ok(ConsoleCommand::Status) => print_status(&runner),
            Ok(ConsoleCommand::Quit) => break,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                // stdin closed; keep rendering until the process is killed
                thread::sleep(RENDER_INTERVAL);
            }
        }
    }

    if !runner.phase().is_stopped() {
        runner.stop()?;
    }
    for line in conduit.drain() {
        render(&line);
    }
    Ok(())
}

fn print_status(runner: &BotRunner) {
    let phase = runner.phase();
    if phase.is_running() && !runner.is_running() {
        println!("Bot: run ended on its own. Type 'start' to try again.");
        return;
    }

    let mut status = format!("Bot: {}", phase.description());
    if let Some(uptime) = phase.uptime() {
        let secs = uptime.as_secs();
        status.push_str(&format!(
            " for {:02}:{:02}:{:02}, scanning {}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60,
            if runner.is_scanning() { "active" } else { "paused" }
        ));
    }
    println!("{}", status);
}

fn render(line: &LogLine) {
    let colour = match line.tag {
        LogTag::Success => "\x1b[32m",
        LogTag::Warning => "\x1b[33m",
        LogTag::Error | LogTag::Fatal => "\x1b[31m",
        LogTag::Action => "\x1b[36m",
        LogTag::Status => "\x1b[1;35m",
        LogTag::Scan => "\x1b[90m",
        LogTag::Info => "",
    };
    if colour.is_empty() {
        println!("{}", line);
    } else {
        println!("{}{}\x1b[0m", colour, line);
    }
}

fn live_perception(settings: &Settings) -> Result<ScreenPerception> {
    ScreenPerception::new(settings.tessdata_path.as_deref())
}

fn test_header() -> Result<()> {
    let (settings, _) = load_inputs()?;
    let conduit = LogConduit::new();
    let mut perception = live_perception(&settings)?;
    let scene = perception.capture()?;

    let found = header_detected(&mut perception, &scene, &settings, &conduit.logger());
    conduit.drain().iter().for_each(render);
    println!(
        "Header detection: {}",
        if found { "✓ detected" } else { "✗ not detected" }
    );
    Ok(())
}

fn test_ocr() -> Result<()> {
    let (settings, catalog) = load_inputs()?;
    let conduit = LogConduit::new();
    let mut perception = live_perception(&settings)?;
    let scene = perception.capture()?;

    let identification =
        identify_target(&mut perception, &scene, &settings, &catalog, &conduit.logger());
    conduit.drain().iter().for_each(render);
    match identification {
        Identification::NoText => println!("OCR: no text"),
        Identification::Unknown(text) => println!("OCR: '{}' (not in catalog)", text),
        Identification::Known(target) => println!("OCR: '{}' (rare target)", target.name),
    }
    Ok(())
}

fn test_match(target_name: &str, label: &str) -> Result<()> {
    let (settings, catalog) = load_inputs()?;
    let Some(target) = catalog.find(target_name) else {
        bail!("'{}' is not in the catalog", target_name);
    };
    let Some(form) = target
        .forms
        .iter()
        .find(|f| f.label.eq_ignore_ascii_case(label))
    else {
        bail!("'{}' has no form '{}'", target.name, label);
    };

    let mut perception = live_perception(&settings)?;
    let scene = perception.capture()?;
    match perception.similarity(&scene, &form.image, settings.photo_region) {
        Detection::Found(score) => {
            let verdict = if score >= settings.photo_match_threshold {
                "MATCH"
            } else {
                "NO MATCH"
            };
            println!(
                "Score for '{}' ({}): {:.3} vs threshold {:.2} → {}",
                target.name, form.label, score, settings.photo_match_threshold, verdict
            );
        }
        Detection::NotFound => println!("Photo region could not be compared"),
        Detection::Failed(reason) => bail!("Comparison failed: {}", reason),
    }
    Ok(())
}

fn test_run_away() -> Result<()> {
    let (settings, _) = load_inputs()?;
    let mut actuator = DesktopActuator::new(settings.automation_executable.clone());
    flee(&mut actuator, &settings).context("Run away failed")?;
    println!("✓ Run away executed");
    Ok(())
}

fn save_screenshot(path: &Path) -> Result<()> {
    let (settings, _) = load_inputs()?;
    let mut perception = live_perception(&settings)?;
    let frame = perception.capture()?;
    frame
        .save(path)
        .with_context(|| format!("Failed to save screenshot to {}", path.display()))?;
    println!(
        "✓ Saved {}x{} screenshot to {}",
        frame.width(),
        frame.height(),
        path.display()
    );
    Ok(())
}
