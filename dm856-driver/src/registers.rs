//! Register addresses and the ordered parameter table.

use std::fmt;

use thiserror::Error;

/// Every holding register the programmer touches.
///
/// Configuration parameters are listed in [`RegisterMap`]; the remaining
/// variants are control registers used by persist and the self-tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Register {
    CurrentKp = 0x00,
    CurrentKi = 0x01,
    PeakCurrent = 0x1F,
    Microstep = 0x20,
    AntiresAmp1 = 0x40,
    AntiresPhase1 = 0x41,
    AntiresAmp2 = 0x44,
    AntiresPhase2 = 0x45,
    AntiresAmp3 = 0x48,
    AntiresPhase3 = 0x49,
    IdleCurrent = 0x4E,
    IdleTime = 0x4F,
    FilterEnable = 0x50,
    ElectronicDamping = 0x99,
    PulseMode = 0xFF,

    /// Arms the current-loop test (1) or disarms it (0).
    StartTest = 0x02,
    /// Target current for the current-loop test, in mA.
    TestCurrent = 0x04,
    /// First word of the captured current samples.
    TestResult = 0x05,
    AutoTest = 0x61,
    /// Writing 1 flushes the current registers to EEPROM.
    EepromSave = 0x0C,
    BothDirection = 0x1C,
    PositiveDirection = 0x1A,
    NbTests = 0x19,
    /// Unit: 0.01 revolution.
    RevPerTest = 0x18,
    /// Unit: ms.
    TimeBetweenTest = 0x1B,
    /// Unit: 0.01 revolution per second.
    Speed = 0x16,
    /// Starts (1) or stops (0) the resonance test motion.
    RunTest = 0x09,
}

impl Register {
    /// Configuration parameters in display order.
    pub const PARAMETERS: [Register; 15] = [
        Register::CurrentKp,
        Register::CurrentKi,
        Register::PeakCurrent,
        Register::Microstep,
        Register::AntiresAmp1,
        Register::AntiresPhase1,
        Register::AntiresAmp2,
        Register::AntiresPhase2,
        Register::AntiresAmp3,
        Register::AntiresPhase3,
        Register::IdleCurrent,
        Register::IdleTime,
        Register::FilterEnable,
        Register::ElectronicDamping,
        Register::PulseMode,
    ];

    /// Control-only registers, never listed for display.
    pub const CONTROL: [Register; 12] = [
        Register::StartTest,
        Register::TestCurrent,
        Register::TestResult,
        Register::AutoTest,
        Register::EepromSave,
        Register::BothDirection,
        Register::PositiveDirection,
        Register::NbTests,
        Register::RevPerTest,
        Register::TimeBetweenTest,
        Register::Speed,
        Register::RunTest,
    ];

    /// Holding register address.
    pub const fn address(self) -> u16 {
        self as u16
    }

    /// Device-manual name of the register.
    pub const fn name(self) -> &'static str {
        match self {
            Register::CurrentKp => "CURRENT_KP",
            Register::CurrentKi => "CURRENT_KI",
            Register::PeakCurrent => "PEAK_CURRENT",
            Register::Microstep => "MICROSTEP",
            Register::AntiresAmp1 => "ANTIRES_AMP_1",
            Register::AntiresPhase1 => "ANTIRES_PHASE_1",
            Register::AntiresAmp2 => "ANTIRES_AMP_2",
            Register::AntiresPhase2 => "ANTIRES_PHASE_2",
            Register::AntiresAmp3 => "ANTIRES_AMP_3",
            Register::AntiresPhase3 => "ANTIRES_PHASE_3",
            Register::IdleCurrent => "IDLE_CURRENT",
            Register::IdleTime => "IDLE_TIME",
            Register::FilterEnable => "FILTER_ENABLE",
            Register::ElectronicDamping => "ELECTRONIC_DAMPING",
            Register::PulseMode => "PULSE_MODE",
            Register::StartTest => "START_TEST",
            Register::TestCurrent => "TEST_CURRENT",
            Register::TestResult => "TEST_RESULT",
            Register::AutoTest => "AUTOTEST",
            Register::EepromSave => "EEPROM_SAVE",
            Register::BothDirection => "BOTH_DIRECTION",
            Register::PositiveDirection => "POSITIVE_DIRECTION",
            Register::NbTests => "NB_TESTS",
            Register::RevPerTest => "REV_PER_TEST",
            Register::TimeBetweenTest => "TIME_BETWEEN_TEST",
            Register::Speed => "SPEED",
            Register::RunTest => "RUN_TEST",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.address())
    }
}

/// A named configuration parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parameter {
    pub name: &'static str,
    pub address: u16,
}

impl From<Register> for Parameter {
    fn from(register: Register) -> Self {
        Self {
            name: register.name(),
            address: register.address(),
        }
    }
}

/// Lookup past the end of the parameter table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("parameter index {index} out of range (0..{count})")]
pub struct IndexOutOfRange {
    pub index: usize,
    pub count: usize,
}

/// Ordered table of the configuration parameters.
#[derive(Debug, Clone, Copy)]
pub struct RegisterMap {
    entries: &'static [Register],
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterMap {
    pub const fn new() -> Self {
        Self {
            entries: &Register::PARAMETERS,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a display index to its parameter.
    pub fn get(&self, index: usize) -> Result<Parameter, IndexOutOfRange> {
        self.entries
            .get(index)
            .map(|register| Parameter::from(*register))
            .ok_or(IndexOutOfRange {
                index,
                count: self.entries.len(),
            })
    }

    /// Find a parameter index by name, ignoring case.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|register| register.name().eq_ignore_ascii_case(name))
    }

    /// Iterate `(index, parameter)` pairs in display order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Parameter)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, register)| (index, Parameter::from(*register)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_parameter_table_order() {
        let map = RegisterMap::new();
        assert_eq!(map.len(), 15);

        let first = map.get(0).unwrap();
        assert_eq!(first.name, "CURRENT_KP");
        assert_eq!(first.address, 0x00);

        let last = map.get(14).unwrap();
        assert_eq!(last.name, "PULSE_MODE");
        assert_eq!(last.address, 0xFF);

        assert_eq!(map.get(13).unwrap().address, 0x99);
    }

    #[test]
    fn test_index_out_of_range() {
        let map = RegisterMap::new();
        assert_eq!(
            map.get(15),
            Err(IndexOutOfRange {
                index: 15,
                count: 15
            })
        );
    }

    #[test]
    fn test_addresses_unique() {
        let all: Vec<u16> = Register::PARAMETERS
            .iter()
            .chain(Register::CONTROL.iter())
            .map(|r| r.address())
            .collect();
        let unique: HashSet<u16> = all.iter().copied().collect();
        assert_eq!(unique.len(), all.len());
    }

    #[test]
    fn test_control_addresses() {
        assert_eq!(Register::StartTest.address(), 0x02);
        assert_eq!(Register::TestCurrent.address(), 0x04);
        assert_eq!(Register::TestResult.address(), 0x05);
        assert_eq!(Register::AutoTest.address(), 0x61);
        assert_eq!(Register::EepromSave.address(), 0x0C);
        assert_eq!(Register::BothDirection.address(), 0x1C);
        assert_eq!(Register::PositiveDirection.address(), 0x1A);
        assert_eq!(Register::NbTests.address(), 0x19);
        assert_eq!(Register::RevPerTest.address(), 0x18);
        assert_eq!(Register::TimeBetweenTest.address(), 0x1B);
        assert_eq!(Register::Speed.address(), 0x16);
        assert_eq!(Register::RunTest.address(), 0x09);
    }

    #[test]
    fn test_find_by_name() {
        let map = RegisterMap::new();
        assert_eq!(map.find("MICROSTEP"), Some(3));
        assert_eq!(map.find("idle_time"), Some(11));
        // Control registers are not parameters.
        assert_eq!(map.find("RUN_TEST"), None);
    }

    #[test]
    fn test_register_display() {
        assert_eq!(Register::EepromSave.to_string(), "EEPROM_SAVE (0x0C)");
    }
}
