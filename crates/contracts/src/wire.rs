//! Actuator wire format
//!
//! One text frame per report: `"<signal>, <distance>, <outer>, <inner>\r"`.
//! Must stay byte-compatible with the actuator firmware, which tokenizes on
//! `", "` and terminates on `\r`.

use bytes::Bytes;

use crate::{ContractError, HazardSignal, ProximityReport};

/// Field delimiter
pub const DELIMITER: &str = ", ";

/// Record terminator
pub const TERMINATOR: char = '\r';

/// Encode a report into its wire frame
///
/// Numbers use the shortest round-trip decimal form, so `10.0` is written
/// as `10` and `3.25` as `3.25`.
///
/// # Errors
/// Returns `WireFormat` if any number is NaN or infinite.
pub fn encode(report: &ProximityReport) -> Result<Bytes, ContractError> {
    let fields = [
        ("distance_cm", report.distance_cm),
        ("outer_threshold_cm", report.outer_threshold_cm),
        ("inner_threshold_cm", report.inner_threshold_cm),
    ];
    for (name, value) in fields {
        if !value.is_finite() {
            return Err(ContractError::wire_format(format!(
                "{name} is not finite: {value}"
            )));
        }
    }

    let frame = format!(
        "{}{DELIMITER}{}{DELIMITER}{}{DELIMITER}{}{TERMINATOR}",
        report.signal.code(),
        normalize_zero(report.distance_cm),
        normalize_zero(report.outer_threshold_cm),
        normalize_zero(report.inner_threshold_cm),
    );
    Ok(Bytes::from(frame))
}

/// Parse a wire frame back into a report
///
/// The trailing `\r` is optional so that frames read line-by-line parse too.
pub fn parse(frame: &str) -> Result<ProximityReport, ContractError> {
    let body = frame.strip_suffix(TERMINATOR).unwrap_or(frame);
    let fields: Vec<&str> = body.split(DELIMITER).collect();

    let [signal, distance, outer, inner] = fields.as_slice() else {
        return Err(ContractError::wire_format(format!(
            "expected 4 fields, got {}",
            fields.len()
        )));
    };

    let signal = signal
        .parse::<u8>()
        .ok()
        .and_then(HazardSignal::from_code)
        .ok_or_else(|| ContractError::wire_format(format!("invalid signal '{signal}'")))?;

    Ok(ProximityReport {
        signal,
        distance_cm: parse_number("distance_cm", distance)?,
        outer_threshold_cm: parse_number("outer_threshold_cm", outer)?,
        inner_threshold_cm: parse_number("inner_threshold_cm", inner)?,
    })
}

/// Parse raw frame bytes
pub fn parse_bytes(frame: &[u8]) -> Result<ProximityReport, ContractError> {
    let text = std::str::from_utf8(frame)
        .map_err(|e| ContractError::wire_format(format!("frame is not utf-8: {e}")))?;
    parse(text)
}

fn parse_number(field: &str, raw: &str) -> Result<f64, ContractError> {
    let value: f64 = raw
        .parse()
        .map_err(|_| ContractError::wire_format(format!("invalid {field} '{raw}'")))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ContractError::wire_format(format!("{field} is not finite")))
    }
}

// `-0` is not something the firmware's atoi path expects
fn normalize_zero(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        value
    }
}
