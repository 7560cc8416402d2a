use log::{debug, info};
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Mount point of the kernel's sysfs GPIO interface
pub const DEFAULT_GPIO_ROOT: &str = "/sys/class/gpio";

/// Kernel number of a GPIO line
pub type PinId = u32;

const EBUSY: i32 = 16;
const EIO: i32 = 5;

/// Control files exposed under the GPIO root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioOp {
    Export,
    Unexport,
    Direction,
    Value,
}

impl GpioOp {
    fn file_name(self) -> &'static str {
        match self {
            GpioOp::Export => "export",
            GpioOp::Unexport => "unexport",
            GpioOp::Direction => "direction",
            GpioOp::Value => "value",
        }
    }
}

/// Build the control file path for `op` on `pin`.
///
/// Export and unexport live directly under the root, per-pin attributes
/// live under `gpio<N>/`.
pub fn access_path(root: &Path, pin: PinId, op: GpioOp) -> PathBuf {
    match op {
        GpioOp::Export | GpioOp::Unexport => root.join(op.file_name()),
        GpioOp::Direction | GpioOp::Value => root.join(format!("gpio{}", pin)).join(op.file_name()),
    }
}

/// Signal direction of a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logic level driven onto an output pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinValue {
    Low = 0,
    High = 1,
}

impl PinValue {
    pub fn as_str(self) -> &'static str {
        match self {
            PinValue::Low => "0",
            PinValue::High => "1",
        }
    }
}

impl fmt::Display for PinValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum GpioError {
    #[error("cannot open {} for writing: error code {code}", .path.display())]
    Open {
        path: PathBuf,
        code: i32,
        #[source]
        source: io::Error,
    },

    #[error("write to {} failed: error code {code}", .path.display())]
    Write {
        path: PathBuf,
        code: i32,
        #[source]
        source: io::Error,
    },

    #[error("GPIO {pin}: direction '{direction}' is not supported, only 'out'")]
    UnsupportedDirection { pin: PinId, direction: Direction },
}

impl GpioError {
    /// OS error code behind an I/O failure, if any
    pub fn code(&self) -> Option<i32> {
        match self {
            GpioError::Open { code, .. } | GpioError::Write { code, .. } => Some(*code),
            GpioError::UnsupportedDirection { .. } => None,
        }
    }
}

fn errno(err: &io::Error) -> i32 {
    err.raw_os_error().unwrap_or(0)
}

/// Only output mode is driven by this crate; anything else is rejected
/// before touching the device.
fn check_direction(pin: PinId, direction: Direction) -> Result<(), GpioError> {
    match direction {
        Direction::Out => Ok(()),
        other => Err(GpioError::UnsupportedDirection {
            pin,
            direction: other,
        }),
    }
}

/// The three primitive pin interactions, plus unexport
pub trait Gpio {
    /// Make `pin` addressable (export)
    fn reserve(&mut self, pin: PinId) -> Result<(), GpioError>;

    /// Configure the signal direction of an exported pin
    fn set_direction(&mut self, pin: PinId, direction: Direction) -> Result<(), GpioError>;

    /// Drive a logic level onto an output pin
    fn write_value(&mut self, pin: PinId, value: PinValue) -> Result<(), GpioError>;

    /// Hand the pin back to the kernel (unexport)
    fn release(&mut self, pin: PinId) -> Result<(), GpioError>;
}

/// GPIO backend writing to the sysfs control files under `root`.
///
/// Holds no open handles between calls: every operation opens its file,
/// writes once and drops the handle on all paths.
#[derive(Debug, Clone)]
pub struct SysfsGpio {
    root: PathBuf,
}

impl SysfsGpio {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn write_attribute(&self, pin: PinId, op: GpioOp, contents: &str) -> Result<(), GpioError> {
        let path = access_path(&self.root, pin, op);

        let mut file = File::create(&path).map_err(|source| GpioError::Open {
            code: errno(&source),
            path: path.clone(),
            source,
        })?;

        debug!("{} <- {}", path.display(), contents);
        file.write_all(contents.as_bytes())
            .map_err(|source| GpioError::Write {
                code: errno(&source),
                path,
                source,
            })
    }
}

impl Gpio for SysfsGpio {
    fn reserve(&mut self, pin: PinId) -> Result<(), GpioError> {
        self.write_attribute(pin, GpioOp::Export, &pin.to_string())
    }

    fn set_direction(&mut self, pin: PinId, direction: Direction) -> Result<(), GpioError> {
        check_direction(pin, direction)?;
        self.write_attribute(pin, GpioOp::Direction, direction.as_str())
    }

    fn write_value(&mut self, pin: PinId, value: PinValue) -> Result<(), GpioError> {
        self.write_attribute(pin, GpioOp::Value, value.as_str())
    }

    fn release(&mut self, pin: PinId) -> Result<(), GpioError> {
        self.write_attribute(pin, GpioOp::Unexport, &pin.to_string())
    }
}

/// One successful call recorded by [`MemoryGpio`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioEvent {
    Reserve(PinId),
    Direction(PinId, Direction),
    Value(PinId, PinValue),
    Release(PinId),
}

/// In-memory GPIO backend.
///
/// Records every successful call in order and can be told to fail
/// reservation or writes for given pins. Used for `--dry-run` and tests.
#[derive(Debug, Clone)]
pub struct MemoryGpio {
    root: PathBuf,
    events: Vec<GpioEvent>,
    attempts: usize,
    failing_reserve: HashSet<PinId>,
    failing_writes: HashSet<PinId>,
}

impl Default for MemoryGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGpio {
    pub fn new() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_GPIO_ROOT),
            events: Vec::new(),
            attempts: 0,
            failing_reserve: HashSet::new(),
            failing_writes: HashSet::new(),
        }
    }

    /// Use `root` when reporting simulated failures
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Make `reserve(pin)` fail as if the pin were already exported
    pub fn fail_reserve(mut self, pin: PinId) -> Self {
        self.failing_reserve.insert(pin);
        self
    }

    /// Make direction and value writes to `pin` fail
    pub fn fail_writes(mut self, pin: PinId) -> Self {
        self.failing_writes.insert(pin);
        self
    }

    pub fn events(&self) -> &[GpioEvent] {
        &self.events
    }

    /// Number of calls that reached the device, failed ones included
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Value writes only, in order
    pub fn value_writes(&self) -> Vec<(PinId, PinValue)> {
        self.events
            .iter()
            .filter_map(|event| match *event {
                GpioEvent::Value(pin, value) => Some((pin, value)),
                _ => None,
            })
            .collect()
    }

    /// Last level written to `pin`
    pub fn level(&self, pin: PinId) -> Option<PinValue> {
        self.value_writes()
            .into_iter()
            .rev()
            .find(|(p, _)| *p == pin)
            .map(|(_, value)| value)
    }

    fn record(&mut self, event: GpioEvent) {
        info!("[memory] {:?}", event);
        self.events.push(event);
    }

    fn simulated_failure(&self, pin: PinId, op: GpioOp, code: i32) -> GpioError {
        GpioError::Open {
            path: access_path(&self.root, pin, op),
            code,
            source: io::Error::from_raw_os_error(code),
        }
    }
}

impl Gpio for MemoryGpio {
    fn reserve(&mut self, pin: PinId) -> Result<(), GpioError> {
        self.attempts += 1;
        if self.failing_reserve.contains(&pin) {
            return Err(self.simulated_failure(pin, GpioOp::Export, EBUSY));
        }
        self.record(GpioEvent::Reserve(pin));
        Ok(())
    }

    fn set_direction(&mut self, pin: PinId, direction: Direction) -> Result<(), GpioError> {
        check_direction(pin, direction)?;
        self.attempts += 1;
        if self.failing_writes.contains(&pin) {
            return Err(self.simulated_failure(pin, GpioOp::Direction, EIO));
        }
        self.record(GpioEvent::Direction(pin, direction));
        Ok(())
    }

    fn write_value(&mut self, pin: PinId, value: PinValue) -> Result<(), GpioError> {
        self.attempts += 1;
        if self.failing_writes.contains(&pin) {
            return Err(self.simulated_failure(pin, GpioOp::Value, EIO));
        }
        self.record(GpioEvent::Value(pin, value));
        Ok(())
    }

    fn release(&mut self, pin: PinId) -> Result<(), GpioError> {
        self.attempts += 1;
        self.record(GpioEvent::Release(pin));
        Ok(())
    }
}
