use super::{Flag, HemoData, Unit};
use crate::error::{invalid, Result};

/// Pascals per millimetre of mercury.
pub const PA_PER_MMHG: f64 = 133.322_387_415;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Time,
    Pressure,
    Velocity,
}

impl Unit {
    pub fn dimension(self) -> Dimension {
        match self {
            Unit::Seconds | Unit::Milliseconds => Dimension::Time,
            Unit::Pascals | Unit::MmHg => Dimension::Pressure,
            Unit::MetersPerSecond | Unit::CentimetersPerSecond => Dimension::Velocity,
        }
    }

    fn si_factor(self) -> f64 {
        match self {
            Unit::Seconds | Unit::Pascals | Unit::MetersPerSecond => 1.0,
            Unit::Milliseconds => 1e-3,
            Unit::MmHg => PA_PER_MMHG,
            Unit::CentimetersPerSecond => 1e-2,
        }
    }

    /// Multiplier taking a value in `self` to `to`.
    pub fn factor_to(self, to: Unit) -> Result<f64> {
        if self.dimension() != to.dimension() {
            return Err(invalid(format!("cannot convert {self} to {to}")));
        }
        Ok(self.si_factor() / to.si_factor())
    }
}

impl HemoData {
    /// Convert the domain between seconds and milliseconds. Cached derivatives of every
    /// channel are recomputed against the converted domain.
    pub fn convert_x_units(&mut self, to: Unit) -> Result<()> {
        let Some(x) = self.x.as_mut() else {
            return Err(invalid("no domain to convert"));
        };
        let from = x
            .unit()
            .ok_or_else(|| invalid(format!("domain '{}' has no unit", x.header)))?;
        if from.dimension() != super::units::Dimension::Time {
            return Err(invalid(format!("domain unit {from} is not a time unit")));
        }
        let factor = from.factor_to(to)?;
        if from == to {
            return Ok(());
        }
        let values = x.values.iter().map(|v| v * factor).collect();
        x.values = values;
        x.flags.retain(|f| !matches!(f, Flag::Unit(_)));
        x.flags.insert(Flag::Unit(to));
        for ch in &mut self.ys {
            if let Some(d) = ch.derivative.as_mut() {
                d.fixed_interval = d.fixed_interval.map(|dx| dx * factor);
            }
        }
        self.refresh_all_caches();
        Ok(())
    }

    /// Convert one channel (Pa ↔ mmHg, m/s ↔ cm/s), recomputing its cached arrays.
    pub fn convert_y_units(&mut self, header: &str, to: Unit) -> Result<()> {
        let idx = self.index_of(header)?;
        let from = self.ys[idx]
            .unit()
            .ok_or_else(|| invalid(format!("channel '{header}' has no unit")))?;
        let factor = from.factor_to(to)?;
        if from == to {
            return Ok(());
        }
        let x = self.x.as_ref().map(|c| c.values.as_slice()).unwrap_or(&[]);
        let ch = &mut self.ys[idx];
        ch.values = ch.values.iter().map(|v| v * factor).collect();
        ch.flags.retain(|f| !matches!(f, Flag::Unit(_)));
        ch.flags.insert(Flag::Unit(to));
        ch.refresh_caches(x);
        Ok(())
    }
}
