//! Kubernetes resource quantity parsing and formatting
//!
//! Quantities are split into number and suffix, then handed to `uom`:
//! CPU as a ratio in cpu units (`m`, `u`, `n` prefixes), memory as
//! `Information` (decimal `k`/`M`/`G`, binary `Ki`/`Mi`/`Gi`). Exponent
//! forms (`1e3`) are part of the number.

pub mod cpu;

use crate::error::QuantityError;
use lazy_regex::regex;
use uom::si::f64::{Information, Ratio};
use uom::si::information::byte;

const KI: u64 = 1024;
const MI: u64 = KI * 1024;
const GI: u64 = MI * 1024;

/// Number and suffix of a quantity string
fn split(quantity: &str) -> Result<(f64, &str), QuantityError> {
    let re = regex!(r"^([0-9]+(?:\.[0-9]*)?|\.[0-9]+)((?:[eE][-+]?[0-9]+)?)([A-Za-z]*)$");

    let captures = re
        .captures(quantity.trim())
        .ok_or_else(|| QuantityError::QuantityParsing(quantity.to_string()))?;
    let mantissa = captures
        .get(1)
        .ok_or_else(|| QuantityError::QuantityParsing(quantity.to_string()))?
        .as_str();
    let exponent = captures.get(2).map_or("", |m| m.as_str());
    let suffix = captures.get(3).map_or("", |m| m.as_str());

    let measure = format!("{}{}", mantissa, exponent)
        .parse::<f64>()
        .map_err(|_| QuantityError::QuantityParsing(quantity.to_string()))?;
    if !measure.is_finite() {
        return Err(QuantityError::OutOfRange(quantity.to_string()));
    }
    Ok((measure, suffix))
}

/// Parse a CPU quantity (`2`, `500m`, `250000u`, `123456789n`)
pub fn parse_cpu(quantity: &str) -> Result<Ratio, QuantityError> {
    let (measure, suffix) = split(quantity)?;
    match suffix {
        "" => Ok(Ratio::new::<cpu::cpu>(measure)),
        "m" => Ok(Ratio::new::<cpu::millicpu>(measure)),
        "u" => Ok(Ratio::new::<cpu::microcpu>(measure)),
        "n" => Ok(Ratio::new::<cpu::nanocpu>(measure)),
        other => Err(QuantityError::UnknownSuffix(other.to_string())),
    }
}

/// Parse a memory quantity (`512Mi`, `129M`, `128974848`)
pub fn parse_memory(quantity: &str) -> Result<Information, QuantityError> {
    let (measure, suffix) = split(quantity)?;
    let unit = match suffix {
        "" => "B",
        "k" => "kB",
        "M" => "MB",
        "G" => "GB",
        "T" => "TB",
        "P" => "PB",
        "E" => "EB",
        "Ki" => "KiB",
        "Mi" => "MiB",
        "Gi" => "GiB",
        "Ti" => "TiB",
        "Pi" => "PiB",
        "Ei" => "EiB",
        other => return Err(QuantityError::UnknownSuffix(other.to_string())),
    };

    format!("{} {}", measure, unit)
        .parse::<Information>()
        .map_err(|_| QuantityError::QuantityParsing(quantity.to_string()))
}

/// Parse a CPU quantity into millicores, rounding up
pub fn parse_cpu_millicores(quantity: &str) -> Result<u64, QuantityError> {
    let value = parse_cpu(quantity)?.get::<cpu::millicpu>();
    ceil_whole(value).ok_or_else(|| QuantityError::OutOfRange(quantity.to_string()))
}

/// Parse a memory quantity into bytes, rounding up
pub fn parse_memory_bytes(quantity: &str) -> Result<u64, QuantityError> {
    let value = parse_memory(quantity)?.get::<byte>();
    ceil_whole(value).ok_or_else(|| QuantityError::OutOfRange(quantity.to_string()))
}

/// Round up, treating values within float noise of an integer as that integer
fn ceil_whole(value: f64) -> Option<u64> {
    if !value.is_finite() || value < 0.0 || value >= u64::MAX as f64 {
        return None;
    }
    let nearest = value.round();
    if (value - nearest).abs() < 1e-6 {
        Some(nearest as u64)
    } else {
        Some(value.ceil() as u64)
    }
}

/// Format millicores the way the API server would (`2`, `250m`)
pub fn format_cpu(millicores: u64) -> String {
    if millicores % 1000 == 0 {
        format!("{}", millicores / 1000)
    } else {
        format!("{}m", millicores)
    }
}

/// Format bytes with the largest exact binary suffix
pub fn format_memory(bytes: u64) -> String {
    if bytes == 0 {
        return "0".to_string();
    }
    for (unit, suffix) in [(GI, "Gi"), (MI, "Mi"), (KI, "Ki")] {
        if bytes % unit == 0 {
            return format!("{}{}", bytes / unit, suffix);
        }
    }
    bytes.to_string()
}
