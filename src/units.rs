//! Engine vector type codes and their units.
//!
//! ngspice tags every vector with a small integer (`enum simvar_type` on the
//! C side). The table below is indexed by that code; anything outside it is
//! rejected rather than guessed.

use std::fmt;

use crate::decode::DecodeError;

/// Semantic type of a result vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VectorType {
    NoType,
    Time,
    Frequency,
    Voltage,
    Current,
    VoltageDensity,
    CurrentDensity,
    SqrVoltageDensity,
    SqrCurrentDensity,
    SqrVoltage,
    SqrCurrent,
    Pole,
    Zero,
    SParameter,
    Temperature,
    Res,
    Impedance,
    Admittance,
    Power,
    Phase,
    Db,
    Capacitance,
    Charge,
}

/// (variant, unit symbol, type name), in engine code order.
const CATALOG: [(VectorType, &str, &str); 23] = [
    (VectorType::NoType, "", "no_type"),
    (VectorType::Time, "s", "time"),
    (VectorType::Frequency, "Hz", "frequency"),
    (VectorType::Voltage, "V", "voltage"),
    (VectorType::Current, "A", "current"),
    (VectorType::VoltageDensity, "V/Hz", "voltage_density"),
    (VectorType::CurrentDensity, "A/Hz", "current_density"),
    (VectorType::SqrVoltageDensity, "sqrt(V)/Hz", "sqr_voltage_density"),
    (VectorType::SqrCurrentDensity, "sqrt(I)/Hz", "sqr_current_density"),
    (VectorType::SqrVoltage, "sqrt(V)", "sqr_voltage"),
    (VectorType::SqrCurrent, "sqrt(I)", "sqr_current"),
    (VectorType::Pole, "Hz", "pole"),
    (VectorType::Zero, "Hz", "zero"),
    (VectorType::SParameter, "", "s_parameter"),
    (VectorType::Temperature, "C", "temperature"),
    (VectorType::Res, "Ohm", "res"),
    (VectorType::Impedance, "Ohm", "impedance"),
    (VectorType::Admittance, "S", "admittance"),
    (VectorType::Power, "W", "power"),
    (VectorType::Phase, "deg", "phase"),
    (VectorType::Db, "dB", "db"),
    (VectorType::Capacitance, "C", "capacitance"),
    (VectorType::Charge, "Q", "charge"),
];

impl VectorType {
    /// Number of type codes the engine defines.
    pub const COUNT: usize = CATALOG.len();

    /// Look up an engine type code.
    pub fn from_code(code: i32) -> Result<Self, DecodeError> {
        usize::try_from(code)
            .ok()
            .and_then(|i| CATALOG.get(i))
            .map(|(ty, _, _)| *ty)
            .ok_or(DecodeError::UnknownTypeCode(code))
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    /// Unit symbol, e.g. `"V"`. Empty for dimensionless types.
    pub fn unit(self) -> &'static str {
        CATALOG[self as usize].1
    }

    /// Semantic name, e.g. `"voltage"`.
    pub fn name(self) -> &'static str {
        CATALOG[self as usize].2
    }

    /// The `(unit, type name)` tag pair.
    pub fn as_pair(self) -> (&'static str, &'static str) {
        (self.unit(), self.name())
    }
}

impl fmt::Display for VectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit().is_empty() {
            write!(f, "{}", self.name())
        } else {
            write!(f, "{} [{}]", self.name(), self.unit())
        }
    }
}
