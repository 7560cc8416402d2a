use anyhow::{Context, Result};
use clap::Parser;
use motor_move::config::MotorConfig;
use motor_move::gpio::SysfsGpio;
use motor_move::motor::MotorDriver;
use std::path::PathBuf;

/// Drive both motor pins low, optionally handing them back to the kernel
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file with gpio_root, cw_pin and ccw_pin
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Unexport both pins after stopping
    #[arg(short, long)]
    release: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = match args.config {
        Some(ref path) => MotorConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => MotorConfig::default(),
    };

    let mut motor = MotorDriver::new(SysfsGpio::new(config.gpio_root.clone()), config.pins());

    let failures = motor.stop();
    if failures > 0 {
        anyhow::bail!("{} of 2 stop writes failed, motor state unknown", failures);
    }
    println!("Motor stopped.");

    if args.release {
        motor.release().context("Failed to release GPIO pins")?;
        println!("GPIO {} and GPIO {} released.", config.cw_pin, config.ccw_pin);
    }

    Ok(())
}
