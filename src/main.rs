use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use motor_move::command::CommandLoop;
use motor_move::config::MotorConfig;
use motor_move::gpio::{Gpio, MemoryGpio, SysfsGpio};
use motor_move::motor::MotorDriver;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

/// Exit status after Ctrl+C (128 + SIGINT)
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Exit status when the pins cannot be exported or configured
const STARTUP_FAILURE_EXIT_CODE: i32 = -1;

/// Interactive DC motor control over sysfs GPIO
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file with gpio_root, cw_pin and ccw_pin
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root of the sysfs GPIO tree (overrides the config file)
    #[arg(long)]
    gpio_root: Option<PathBuf>,

    /// GPIO line driving clockwise rotation (overrides the config file)
    #[arg(long)]
    cw_pin: Option<u32>,

    /// GPIO line driving counterclockwise rotation (overrides the config file)
    #[arg(long)]
    ccw_pin: Option<u32>,

    /// Record GPIO writes in memory instead of touching the hardware
    #[arg(short, long)]
    dry_run: bool,

    /// Unexport both pins when interrupted with Ctrl+C
    #[arg(long)]
    release_on_exit: bool,
}

fn load_config(args: &Args) -> Result<MotorConfig> {
    let mut config = match args.config {
        Some(ref path) => MotorConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => MotorConfig::default(),
    };

    if let Some(ref root) = args.gpio_root {
        config.gpio_root = root.clone();
    }
    if let Some(pin) = args.cw_pin {
        config.cw_pin = pin;
    }
    if let Some(pin) = args.ccw_pin {
        config.ccw_pin = pin;
    }

    config.validate().context("Invalid motor configuration")?;
    Ok(config)
}

/// Drive both pins low, then optionally unexport them
fn stop_on_interrupt<G: Gpio>(motor: &Mutex<MotorDriver<G>>, release: bool) {
    let mut motor = motor.lock().unwrap_or_else(PoisonError::into_inner);
    motor.stop();
    if release {
        if let Err(e) = motor.release() {
            error!("Failed to release GPIO pins: {}", e);
        }
    }
}

/// Stop the shared driver and exit on Ctrl+C.
///
/// Writes only to stderr: the command loop may be mid-prompt on stdout.
fn install_interrupt_handler<G>(motor: Arc<Mutex<MotorDriver<G>>>, release: bool) -> Result<()>
where
    G: Gpio + Send + 'static,
{
    ctrlc::set_handler(move || {
        eprintln!("\nReceived Ctrl+C, stopping motor...");
        stop_on_interrupt(&motor, release);
        std::process::exit(INTERRUPTED_EXIT_CODE);
    })
    .context("Failed to set Ctrl+C handler")
}

fn start<G: Gpio>(motor: &mut MotorDriver<G>) -> Result<()> {
    motor.reserve().context("Failed to initialize GPIO pins")?;
    motor.configure_outputs().context("Failed to set direction for GPIO pins")?;
    Ok(())
}

fn command_loop<G: Gpio>(motor: &Mutex<MotorDriver<G>>) -> Result<()> {
    // Stdout is locked per write, never across the blocking read
    let summary = CommandLoop::new(motor)
        .run(io::stdin().lock(), io::stdout())
        .context("Command loop I/O failed")?;

    info!(
        "Input closed after {} commands ({} unknown)",
        summary.handled + summary.unknown,
        summary.unknown
    );
    Ok(())
}

/// Bring the pins up, then serve commands until stdin closes.
///
/// A startup failure exits with status -1 before the loop is entered.
fn run<G: Gpio + Send + 'static>(mut motor: MotorDriver<G>, release_on_exit: bool) -> Result<Arc<Mutex<MotorDriver<G>>>> {
    if let Err(e) = start(&mut motor) {
        eprintln!("Error: {:?}", e);
        std::process::exit(STARTUP_FAILURE_EXIT_CODE);
    }

    let motor = Arc::new(Mutex::new(motor));
    install_interrupt_handler(Arc::clone(&motor), release_on_exit)?;
    command_loop(&motor)?;
    Ok(motor)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let pins = config.pins();

    info!(
        "Motor on GPIO {} (cw) / GPIO {} (ccw) under {}",
        pins.cw,
        pins.ccw,
        config.gpio_root.display()
    );

    if args.dry_run {
        info!("Dry run: GPIO writes are recorded in memory only");
        let gpio = MemoryGpio::new().with_root(config.gpio_root.clone());
        let motor = run(MotorDriver::new(gpio, pins), args.release_on_exit)?;
        let recorded = motor.lock().unwrap_or_else(PoisonError::into_inner).gpio().events().len();
        info!("Recorded {} GPIO operations", recorded);
    } else {
        let gpio = SysfsGpio::new(config.gpio_root.clone());
        run(MotorDriver::new(gpio, pins), args.release_on_exit)?;
    }

    Ok(())
}
