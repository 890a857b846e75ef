//! DM856 device driver: parameters, EEPROM persist and self-tests.

use std::fmt;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::SerialConfig;
use crate::delay::{Delay, TokioDelay};
use crate::error::{DriverError, Result};
use crate::link::{RegisterIo, RtuLink};
use crate::registers::{Register, RegisterMap};
use crate::sample::{SAMPLE_COUNT, SampleBuffer};

/// Target current for the current-loop test, in mA.
pub const TEST_CURRENT_MA: u16 = 3000;

/// Settings written before the resonance test motion starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResonanceProfile {
    pub both_directions: u16,
    pub positive_direction: u16,
    pub nb_tests: u16,
    /// Unit: 0.01 revolution.
    pub rev_per_test: u16,
    /// Unit: 0.01 revolution per second.
    pub speed: u16,
    /// Unit: ms.
    pub time_between_tests: u16,
    /// How long the motor is left running before it is stopped.
    pub motion_window: Duration,
}

impl ResonanceProfile {
    pub const STANDARD: ResonanceProfile = ResonanceProfile {
        both_directions: 1,
        positive_direction: 1,
        nb_tests: 2,
        rev_per_test: 500,
        speed: 500,
        time_between_tests: 50,
        motion_window: Duration::from_secs(5),
    };

    /// Configuration writes, in the order the device expects them.
    fn writes(&self) -> [(Register, u16); 6] {
        [
            (Register::BothDirection, self.both_directions),
            (Register::PositiveDirection, self.positive_direction),
            (Register::NbTests, self.nb_tests),
            (Register::RevPerTest, self.rev_per_test),
            (Register::Speed, self.speed),
            (Register::TimeBetweenTest, self.time_between_tests),
        ]
    }
}

/// One row of [`DeviceDriver::list_param`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterValue {
    pub index: usize,
    pub name: &'static str,
    pub address: u16,
    pub value: u16,
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:2}. {:<19}: {}", self.index, self.name, self.value)
    }
}

/// A self-test in progress, held until its control register is written back to 0.
///
/// [`TestScope::close`] consumes the scope and always issues the stop write,
/// whatever the outcome of the test body.
struct TestScope<'a, L: RegisterIo> {
    link: &'a mut L,
    control: Register,
    closed: bool,
}

impl<'a, L: RegisterIo> TestScope<'a, L> {
    fn open(link: &'a mut L, control: Register) -> Self {
        debug!(control = %control, "Self-test scope opened");
        Self {
            link,
            control,
            closed: false,
        }
    }

    fn link(&mut self) -> &mut L {
        &mut *self.link
    }

    /// Write 0 to the control register, then merge the body's outcome with
    /// the stop write's.
    async fn close<T>(mut self, outcome: Result<T>) -> Result<T> {
        let stop = self.link.write_word(self.control.address(), 0).await;
        self.closed = true;

        match (outcome, stop) {
            (Ok(value), Ok(())) => {
                debug!(control = %self.control, "Self-test scope closed");
                Ok(value)
            }
            (Ok(_), Err(e)) => {
                error!(control = %self.control, "Stop write failed: {}", e);
                Err(DriverError::StopFailed {
                    register: self.control,
                    source: e,
                })
            }
            (Err(cause), Ok(())) => {
                warn!(control = %self.control, "Self-test aborted, device stopped: {}", cause);
                Err(cause)
            }
            (Err(cause), Err(cleanup)) => {
                error!(
                    control = %self.control,
                    "Stop write failed after earlier error, device may still be active: {}",
                    cleanup
                );
                Err(DriverError::CleanupFailed {
                    register: self.control,
                    cause: Box::new(cause),
                    cleanup,
                })
            }
        }
    }
}

impl<L: RegisterIo> Drop for TestScope<'_, L> {
    fn drop(&mut self) {
        if !self.closed {
            error!(
                control = %self.control,
                "Self-test abandoned before its stop write; device may still be active"
            );
        }
    }
}

/// Driver for one DM856 on an exclusively owned Modbus link.
pub struct DeviceDriver<L, D = TokioDelay> {
    link: L,
    delay: D,
    map: RegisterMap,
}

impl DeviceDriver<RtuLink, TokioDelay> {
    /// Open the serial port and build a driver over it.
    pub fn open(serial: &SerialConfig) -> Result<Self> {
        let link = RtuLink::open(serial)?;
        Ok(Self::new(link, TokioDelay))
    }
}

impl<L: RegisterIo, D: Delay> DeviceDriver<L, D> {
    pub fn new(link: L, delay: D) -> Self {
        Self {
            link,
            delay,
            map: RegisterMap::new(),
        }
    }

    /// The configuration parameter table.
    pub fn parameters(&self) -> &RegisterMap {
        &self.map
    }

    /// Read every configuration parameter, in table order.
    pub async fn list_param(&mut self) -> Result<Vec<ParameterValue>> {
        let mut values = Vec::with_capacity(self.map.len());

        for (index, parameter) in self.map.iter() {
            let value = self.link.read_word(parameter.address).await?;
            values.push(ParameterValue {
                index,
                name: parameter.name,
                address: parameter.address,
                value,
            });
        }

        debug!(count = values.len(), "Listed parameters");
        Ok(values)
    }

    /// Read one configuration parameter.
    pub async fn get_param(&mut self, index: usize) -> Result<u16> {
        let parameter = self.map.get(index)?;
        let value = self.link.read_word(parameter.address).await?;
        debug!(name = parameter.name, value, "Read parameter");
        Ok(value)
    }

    /// Write one configuration parameter. The value is not read back.
    pub async fn set_param(&mut self, index: usize, value: u16) -> Result<()> {
        let parameter = self.map.get(index)?;
        self.link.write_word(parameter.address, value).await?;
        info!(name = parameter.name, value, "Parameter set");
        Ok(())
    }

    /// Ask the device to store its current registers in EEPROM.
    pub async fn persist(&mut self) -> Result<()> {
        self.link
            .write_word(Register::EepromSave.address(), 1)
            .await?;
        info!("EEPROM save requested");
        Ok(())
    }

    /// Run the current-loop test and return the captured current samples.
    ///
    /// The test is disarmed on every exit path.
    pub async fn current_loop_test(&mut self) -> Result<SampleBuffer> {
        info!(target_ma = TEST_CURRENT_MA, "Starting current-loop test");

        let mut scope = TestScope::open(&mut self.link, Register::StartTest);
        let outcome = capture_current_loop(scope.link()).await;
        let raw = scope.close(outcome).await?;

        let samples = SampleBuffer::from_raw(&raw);
        info!(
            count = samples.len(),
            range = ?samples.range(),
            "Current-loop test complete"
        );
        Ok(samples)
    }

    /// Run the resonance test: configure, start the motor, wait, stop.
    ///
    /// The stop write is issued even when configuration fails.
    pub async fn resonance_test(&mut self) -> Result<()> {
        let profile = ResonanceProfile::STANDARD;
        info!(?profile, "Starting resonance test");

        let mut scope = TestScope::open(&mut self.link, Register::RunTest);
        let outcome = run_resonance(scope.link(), &mut self.delay, &profile).await;
        scope.close(outcome).await?;

        info!("Resonance test complete");
        Ok(())
    }

    /// Close the connection.
    pub async fn close(mut self) -> Result<()> {
        self.link.close().await?;
        Ok(())
    }
}

async fn capture_current_loop<L: RegisterIo>(link: &mut L) -> Result<Vec<u16>> {
    link.write_word(Register::TestCurrent.address(), TEST_CURRENT_MA)
        .await?;
    link.write_word(Register::StartTest.address(), 1).await?;
    debug!("Current-loop test armed");

    let raw = link
        .read_words(Register::TestResult.address(), SAMPLE_COUNT)
        .await?;
    Ok(raw)
}

async fn run_resonance<L: RegisterIo, D: Delay>(
    link: &mut L,
    delay: &mut D,
    profile: &ResonanceProfile,
) -> Result<()> {
    for (register, value) in profile.writes() {
        link.write_word(register.address(), value).await?;
    }

    link.write_word(Register::RunTest.address(), 1).await?;
    debug!(window = ?profile.motion_window, "Resonance motion running");
    delay.sleep(profile.motion_window).await;
    Ok(())
}
