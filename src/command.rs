use crate::gpio::Gpio;
use crate::motor::{MotorDriver, Rotation};
use std::io::{self, BufRead, Write};
use std::sync::{Mutex, PoisonError};

pub const PROMPT: &str = "Enter command (cw, ccw, stop): ";
pub const UNKNOWN_COMMAND: &str = "Unknown command. Use 'cw', 'ccw', or 'stop'.";

/// Operator command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Clockwise,
    CounterClockwise,
    Stop,
}

impl Command {
    /// Text form accepted by [`parse_command`]
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Clockwise => "cw",
            Command::CounterClockwise => "ccw",
            Command::Stop => "stop",
        }
    }

    fn announcement(self) -> &'static str {
        match self {
            Command::Clockwise => "Running motor clockwise",
            Command::CounterClockwise => "Running motor counterclockwise",
            Command::Stop => "Stopping motor",
        }
    }
}

/// Classify one input line by case-sensitive prefix.
///
/// The line is not trimmed, so `" cw"` is unknown while `"cwx"` is
/// clockwise.
pub fn parse_command(line: &str) -> Option<Command> {
    [Command::Clockwise, Command::CounterClockwise, Command::Stop]
        .into_iter()
        .find(|command| line.starts_with(command.as_str()))
}

/// Counters reported when the input ends
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    pub handled: usize,
    pub unknown: usize,
}

/// Reads operator lines and turns them into motor actions.
///
/// The driver is locked only while a command executes, never while
/// waiting for input, so an interrupt handler sharing it can always stop
/// the motor.
pub struct CommandLoop<'a, G: Gpio> {
    motor: &'a Mutex<MotorDriver<G>>,
}

impl<'a, G: Gpio> CommandLoop<'a, G> {
    pub fn new(motor: &'a Mutex<MotorDriver<G>>) -> Self {
        Self { motor }
    }

    /// Execute one command. Motor write failures are logged by the driver
    /// and do not interrupt the loop.
    pub fn execute(&mut self, command: Command) {
        let mut motor = self.motor.lock().unwrap_or_else(PoisonError::into_inner);
        match command {
            Command::Clockwise => motor.run(Rotation::Clockwise),
            Command::CounterClockwise => motor.run(Rotation::CounterClockwise),
            Command::Stop => motor.stop(),
        };
    }

    /// Prompt, read and dispatch until `input` is exhausted.
    ///
    /// Lines are matched as raw bytes; invalid UTF-8 is just an unknown
    /// command. Only I/O errors on `input` or `output` end the loop early.
    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, mut output: W) -> io::Result<LoopSummary> {
        let mut summary = LoopSummary::default();
        let mut line = Vec::new();

        loop {
            write!(output, "{}", PROMPT)?;
            output.flush()?;

            line.clear();
            if input.read_until(b'\n', &mut line)? == 0 {
                writeln!(output)?;
                return Ok(summary);
            }

            match parse_command(&String::from_utf8_lossy(&line)) {
                Some(command) => {
                    writeln!(output, "{}", command.announcement())?;
                    self.execute(command);
                    summary.handled += 1;
                }
                None => {
                    writeln!(output, "{}", UNKNOWN_COMMAND)?;
                    summary.unknown += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::{MemoryGpio, PinValue};
    use crate::motor::MotorPins;
    use std::io::{BufReader, Cursor, Read};
    use std::sync::mpsc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn run_script(script: &[u8]) -> (MotorDriver<MemoryGpio>, LoopSummary, String) {
        let motor = Mutex::new(MotorDriver::new(MemoryGpio::new(), MotorPins::default()));
        let mut output = Vec::new();
        let summary = CommandLoop::new(&motor)
            .run(Cursor::new(script), &mut output)
            .unwrap();
        (motor.into_inner().unwrap(), summary, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("cw\n"), Some(Command::Clockwise));
        assert_eq!(parse_command("ccw\n"), Some(Command::CounterClockwise));
        assert_eq!(parse_command("stop\n"), Some(Command::Stop));
        assert_eq!(parse_command("foo\n"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn test_parse_is_prefix_and_case_sensitive() {
        assert_eq!(parse_command("cwise"), Some(Command::Clockwise));
        assert_eq!(parse_command("stopnow\n"), Some(Command::Stop));
        assert_eq!(parse_command("CW\n"), None);
        assert_eq!(parse_command(" cw\n"), None);
        assert_eq!(parse_command("c\n"), None);
    }

    #[test]
    fn test_cw_line() {
        let (motor, summary, output) = run_script(b"cw\n");
        assert_eq!(summary, LoopSummary { handled: 1, unknown: 0 });
        assert_eq!(
            motor.gpio().value_writes(),
            vec![(17, PinValue::High), (27, PinValue::Low)]
        );
        assert!(output.contains("Running motor clockwise\n"));
    }

    #[test]
    fn test_ccw_line() {
        let (motor, _, output) = run_script(b"ccw\n");
        assert_eq!(
            motor.gpio().value_writes(),
            vec![(17, PinValue::Low), (27, PinValue::High)]
        );
        assert!(output.contains("Running motor counterclockwise\n"));
    }

    #[test]
    fn test_stop_line() {
        let (motor, _, output) = run_script(b"stop\n");
        assert_eq!(
            motor.gpio().value_writes(),
            vec![(17, PinValue::Low), (27, PinValue::Low)]
        );
        assert!(output.contains("Stopping motor\n"));
    }

    #[test]
    fn test_unknown_line() {
        let (motor, summary, output) = run_script(b"foo\n");
        assert!(motor.gpio().events().is_empty());
        assert_eq!(summary, LoopSummary { handled: 0, unknown: 1 });
        assert!(output.contains(UNKNOWN_COMMAND));
    }

    #[test]
    fn test_prompt_per_line() {
        let (_, summary, output) = run_script(b"cw\nfoo\nstop\n");
        assert_eq!(summary, LoopSummary { handled: 2, unknown: 1 });
        // One prompt per line plus the one answered by end of input
        assert_eq!(output.matches(PROMPT).count(), 4);
    }

    #[test]
    fn test_last_line_without_newline() {
        let (motor, summary, _) = run_script(b"stop");
        assert_eq!(summary.handled, 1);
        assert_eq!(motor.gpio().level(27), Some(PinValue::Low));
    }

    #[test]
    fn test_loop_survives_write_failures() {
        let motor = Mutex::new(MotorDriver::new(MemoryGpio::new().fail_writes(17), MotorPins::default()));
        let mut output = Vec::new();

        let summary = CommandLoop::new(&motor)
            .run(Cursor::new("cw\nccw\nstop\n"), &mut output)
            .unwrap();

        assert_eq!(summary.handled, 3);
        assert_eq!(
            motor.lock().unwrap().gpio().value_writes(),
            vec![(27, PinValue::Low), (27, PinValue::High), (27, PinValue::Low)]
        );
    }

    #[test]
    fn test_invalid_utf8_line_is_unknown() {
        let (motor, summary, output) = run_script(b"\xe9t\xe9\ncw\n");

        assert_eq!(summary, LoopSummary { handled: 1, unknown: 1 });
        assert!(output.contains(UNKNOWN_COMMAND));
        assert_eq!(
            motor.gpio().value_writes(),
            vec![(17, PinValue::High), (27, PinValue::Low)]
        );
    }

    #[test]
    fn test_motor_unlocked_while_waiting_for_input() {
        let motor = Mutex::new(MotorDriver::new(MemoryGpio::new(), MotorPins::default()));
        let (tx, rx) = mpsc::channel::<Vec<u8>>();

        thread::scope(|scope| {
            let worker = scope.spawn(|| {
                CommandLoop::new(&motor).run(BufReader::new(ChannelReader(rx)), io::sink())
            });

            tx.send(b"cw\n".to_vec()).unwrap();
            let deadline = Instant::now() + Duration::from_secs(5);
            while motor.lock().unwrap().gpio().value_writes().len() < 2 {
                assert!(Instant::now() < deadline, "cw was never executed");
                thread::sleep(Duration::from_millis(5));
            }

            // The loop is now blocked on input; another thread must still get the driver
            let mut driver = motor.try_lock().expect("driver held across read");
            assert_eq!(driver.stop(), 0);
            drop(driver);

            drop(tx);
            let summary = worker.join().unwrap().unwrap();
            assert_eq!(summary.handled, 1);
        });

        assert_eq!(motor.lock().unwrap().gpio().level(17), Some(PinValue::Low));
        assert_eq!(motor.lock().unwrap().gpio().level(27), Some(PinValue::Low));
    }

    /// Blocking reader fed line by line from a channel; EOF once the sender is gone
    struct ChannelReader(mpsc::Receiver<Vec<u8>>);

    impl Read for ChannelReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.recv() {
                Ok(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    Ok(n)
                }
                Err(_) => Ok(0),
            }
        }
    }
}
