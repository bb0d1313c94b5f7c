// Scale Domain Model - USB HID Point-of-Sale scale data report
//
// Ref: USB HID Point of Sale Usage Tables 1.02, "Scale Data Report"

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::{DomainError, Result};

/// Report IDs defined for HID scales
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReportId {
    ScaleAttributes = 0x01,
    ScaleControl = 0x02,
    ScaleData = 0x03,
    ScaleStatus = 0x04,
    ScaleWeightLimit = 0x05,
    ScaleStatistics = 0x06,
}

/// Byte offsets within the scale data report payload (report ID excluded)
mod offset {
    pub const STATUS: usize = 0;
    pub const UNIT: usize = 1;
    pub const SCALING: usize = 2;
    pub const WEIGHT_LSB: usize = 3;
    pub const WEIGHT_MSB: usize = 4;
}

/// Minimum payload length of a scale data report
pub const SCALE_DATA_LEN: usize = offset::WEIGHT_MSB + 1;

/// Largest power-of-ten scale representable without loss
const MAX_DECIMAL_SCALE: u32 = 28;

/// USB vendor/product pair identifying a scale model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceIdentity {
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }
}

impl std::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04X}:{:04X}", self.vendor_id, self.product_id)
    }
}

/// Scale status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleStatus {
    Fault,
    StableAtZero,
    InMotion,
    Stable,
    UnderZero,
    OverWeightLimit,
    RequiresCalibration,
    RequiresRezeroing,
    Unknown(u8),
}

impl From<u8> for ScaleStatus {
    fn from(value: u8) -> Self {
        match value {
            0x01 => ScaleStatus::Fault,
            0x02 => ScaleStatus::StableAtZero,
            0x03 => ScaleStatus::InMotion,
            0x04 => ScaleStatus::Stable,
            0x05 => ScaleStatus::UnderZero,
            0x06 => ScaleStatus::OverWeightLimit,
            0x07 => ScaleStatus::RequiresCalibration,
            0x08 => ScaleStatus::RequiresRezeroing,
            other => ScaleStatus::Unknown(other),
        }
    }
}

impl std::fmt::Display for ScaleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleStatus::Fault => write!(f, "fault"),
            ScaleStatus::StableAtZero => write!(f, "stable at zero"),
            ScaleStatus::InMotion => write!(f, "in motion"),
            ScaleStatus::Stable => write!(f, "stable"),
            ScaleStatus::UnderZero => write!(f, "under zero"),
            ScaleStatus::OverWeightLimit => write!(f, "over weight limit"),
            ScaleStatus::RequiresCalibration => write!(f, "requires calibration"),
            ScaleStatus::RequiresRezeroing => write!(f, "requires re-zeroing"),
            ScaleStatus::Unknown(code) => write!(f, "unknown (0x{:02X})", code),
        }
    }
}

/// Weight unit byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightUnit {
    None,
    Milligram,
    Gram,
    Kilogram,
    Carat,
    Tael,
    Grain,
    Pennyweight,
    MetricTon,
    AvoirTon,
    TroyOunce,
    Ounce,
    Pound,
}

impl WeightUnit {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x01 => WeightUnit::Milligram,
            0x02 => WeightUnit::Gram,
            0x03 => WeightUnit::Kilogram,
            0x04 => WeightUnit::Carat,
            0x05 => WeightUnit::Tael,
            0x06 => WeightUnit::Grain,
            0x07 => WeightUnit::Pennyweight,
            0x08 => WeightUnit::MetricTon,
            0x09 => WeightUnit::AvoirTon,
            0x0A => WeightUnit::TroyOunce,
            0x0B => WeightUnit::Ounce,
            0x0C => WeightUnit::Pound,
            _ => WeightUnit::None,
        }
    }

    pub fn abbreviation(&self) -> &'static str {
        match self {
            WeightUnit::None => "",
            WeightUnit::Milligram => "mg",
            WeightUnit::Gram => "g",
            WeightUnit::Kilogram => "kg",
            WeightUnit::Carat => "ct",
            WeightUnit::Tael => "ozt",
            WeightUnit::Grain => "gr",
            WeightUnit::Pennyweight => "dwt",
            WeightUnit::MetricTon => "mt",
            WeightUnit::AvoirTon => "t",
            WeightUnit::TroyOunce => "t oz",
            WeightUnit::Ounce => "oz",
            WeightUnit::Pound => "lb",
        }
    }
}

/// A usable weight reading (stable or stable-at-zero)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleReading {
    pub weight: Decimal,
    pub unit: WeightUnit,
    pub status: ScaleStatus,
}

impl std::fmt::Display for ScaleReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.weight, self.unit.abbreviation())
    }
}

impl ScaleReading {
    /// Decode a scale data report payload.
    ///
    /// Returns `Ok(None)` when the report carries no usable reading (other
    /// report type, scale in motion, unknown status). Overweight, fault,
    /// under-zero and calibration statuses are errors.
    pub fn decode(report_id: u8, data: &[u8]) -> Result<Option<Self>> {
        if report_id != ReportId::ScaleData as u8 {
            return Ok(None);
        }
        if data.len() < SCALE_DATA_LEN {
            return Err(DomainError::TruncatedReport(data.len()));
        }

        let status = ScaleStatus::from(data[offset::STATUS]);
        match status {
            ScaleStatus::Stable | ScaleStatus::StableAtZero => {}
            ScaleStatus::InMotion | ScaleStatus::Unknown(_) => return Ok(None),
            ScaleStatus::OverWeightLimit => return Err(DomainError::ScaleOverweight),
            ScaleStatus::Fault
            | ScaleStatus::UnderZero
            | ScaleStatus::RequiresCalibration
            | ScaleStatus::RequiresRezeroing => {
                return Err(DomainError::ScaleNeedsCalibration(status.to_string()))
            }
        }

        let raw = u16::from_le_bytes([data[offset::WEIGHT_LSB], data[offset::WEIGHT_MSB]]);
        let exponent = data[offset::SCALING] as i8;

        Ok(Some(Self {
            weight: scale_weight(raw, exponent)?,
            unit: WeightUnit::from_code(data[offset::UNIT]),
            status,
        }))
    }
}

/// weight = raw * 10^exponent, in exact decimal arithmetic
pub fn scale_weight(raw: u16, exponent: i8) -> Result<Decimal> {
    if exponent < 0 {
        let scale = u32::from(exponent.unsigned_abs());
        if scale > MAX_DECIMAL_SCALE {
            return Err(DomainError::ScaleFactorOutOfRange(exponent));
        }
        return Ok(Decimal::new(i64::from(raw), scale));
    }

    let ten = Decimal::from(10u8);
    let mut weight = Decimal::from(raw);
    for _ in 0..exponent {
        weight = weight
            .checked_mul(ten)
            .ok_or(DomainError::ScaleFactorOutOfRange(exponent))?;
    }
    Ok(weight)
}
