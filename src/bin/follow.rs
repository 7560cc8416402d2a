use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, warn};
use motor_move::command::Command;
use motor_move::tracking::{steer, PositionSmoother, TrackingThresholds, SMOOTHING_WINDOW};
use std::io::{self, BufRead, Write};

/// Turn target positions into motor commands.
///
/// Reads `<target_x> <frame_width>` lines on stdin and writes `cw`, `ccw`
/// or `stop` lines on stdout, ready to be piped into `motor_move`.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Pixels left of center before turning counterclockwise
    #[arg(long, default_value_t = 100)]
    left: i32,

    /// Pixels right of center before turning clockwise
    #[arg(long, default_value_t = 100)]
    right: i32,

    /// Half-width of the centered band that stops the motor
    #[arg(long, default_value_t = 50)]
    center: i32,

    /// Number of positions averaged before steering
    #[arg(long, default_value_t = SMOOTHING_WINDOW)]
    window: usize,

    /// Skip a command identical to the previous one instead of sending it every frame
    #[arg(long)]
    dedupe: bool,
}

fn parse_sample(line: &str) -> Option<(i32, i32)> {
    let mut fields = line.split_whitespace();
    let x = fields.next()?.parse().ok()?;
    let width = fields.next()?.parse().ok()?;
    if fields.next().is_some() || width <= 0 {
        return None;
    }
    Some((x, width))
}

/// Every sample gets a command unless deduplicating against the last one
fn should_send(dedupe: bool, last: Option<Command>, command: Command) -> bool {
    !dedupe || last != Some(command)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let thresholds = TrackingThresholds {
        left: args.left,
        right: args.right,
        center: args.center,
    };
    let mut smoother = PositionSmoother::new(args.window);
    let mut last: Option<Command> = None;

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    for line in stdin.lock().lines() {
        let line = line.context("Failed to read target position")?;
        if line.trim().is_empty() {
            continue;
        }

        let Some((x, width)) = parse_sample(&line) else {
            warn!("Ignoring malformed sample: {:?}", line);
            continue;
        };

        let smoothed = smoother.push(x);
        debug!("target x={} smoothed={} width={}", x, smoothed, width);

        if let Some(command) = steer(smoothed, width, &thresholds) {
            if should_send(args.dedupe, last, command) {
                writeln!(stdout, "{}", command.as_str()).context("Failed to write command")?;
                stdout.flush().context("Failed to write command")?;
            }
            last = Some(command);
        }
    }

    Ok(())
}
