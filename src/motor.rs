use crate::gpio::{Direction, Gpio, GpioError, PinId, PinValue};
use log::{error, info};

/// GPIO17 drives the clockwise input of the H-bridge
pub const DEFAULT_CW_PIN: PinId = 17;

/// GPIO27 drives the counterclockwise input
pub const DEFAULT_CCW_PIN: PinId = 27;

/// Rotation direction of the motor shaft
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
}

/// The two driver inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorPins {
    pub cw: PinId,
    pub ccw: PinId,
}

impl Default for MotorPins {
    fn default() -> Self {
        Self {
            cw: DEFAULT_CW_PIN,
            ccw: DEFAULT_CCW_PIN,
        }
    }
}

/// Two-pin DC motor driver on top of a [`Gpio`] backend.
///
/// Holds no memory of the last commanded state; every action is a fresh
/// pair of writes.
pub struct MotorDriver<G: Gpio> {
    gpio: G,
    pins: MotorPins,
}

impl<G: Gpio> MotorDriver<G> {
    pub fn new(gpio: G, pins: MotorPins) -> Self {
        Self { gpio, pins }
    }

    pub fn gpio(&self) -> &G {
        &self.gpio
    }

    /// Export CW then CCW.
    ///
    /// Stops at the first failure. A pin already exported stays exported.
    pub fn reserve(&mut self) -> Result<(), GpioError> {
        self.gpio.reserve(self.pins.cw)?;
        self.gpio.reserve(self.pins.ccw)?;
        info!("Exported GPIO {} (cw) and GPIO {} (ccw)", self.pins.cw, self.pins.ccw);
        Ok(())
    }

    /// Set CW then CCW to output
    pub fn configure_outputs(&mut self) -> Result<(), GpioError> {
        self.gpio.set_direction(self.pins.cw, Direction::Out)?;
        self.gpio.set_direction(self.pins.ccw, Direction::Out)?;
        info!("GPIO {} and GPIO {} configured as outputs", self.pins.cw, self.pins.ccw);
        Ok(())
    }

    /// Run the motor in `rotation`.
    ///
    /// Best-effort: failures are logged, not returned. Returns the number
    /// of writes that failed.
    pub fn run(&mut self, rotation: Rotation) -> usize {
        match rotation {
            Rotation::Clockwise => self.drive(PinValue::High, PinValue::Low),
            Rotation::CounterClockwise => self.drive(PinValue::Low, PinValue::High),
        }
    }

    /// Drive both inputs low. Best-effort like [`MotorDriver::run`].
    pub fn stop(&mut self) -> usize {
        self.drive(PinValue::Low, PinValue::Low)
    }

    /// Unexport CW then CCW
    pub fn release(&mut self) -> Result<(), GpioError> {
        self.gpio.release(self.pins.cw)?;
        self.gpio.release(self.pins.ccw)?;
        info!("Released GPIO {} and GPIO {}", self.pins.cw, self.pins.ccw);
        Ok(())
    }

    // CW is always written first. No interlock or delay between the two writes.
    fn drive(&mut self, cw: PinValue, ccw: PinValue) -> usize {
        let mut failures = 0;
        for (pin, value) in [(self.pins.cw, cw), (self.pins.ccw, ccw)] {
            if let Err(e) = self.gpio.write_value(pin, value) {
                error!("Failed to write {} to GPIO {}: {}", value, pin, e);
                failures += 1;
            }
        }
        failures
    }
}
