use rust_decimal::Decimal;

use crate::domain::model::{DailySeries, Direction, VariationResult};
use crate::utils::error::{ReportError, Result};

/// Percentage change between the two most recent days of `total`, rounded to
/// 2 decimals (banker's rounding).
///
/// Fewer than two days is `InsufficientData`; a zero previous day is
/// `ZeroBaseline` rather than an infinite ratio.
pub fn compute_variation(total: &DailySeries) -> Result<VariationResult> {
    let mut recent = total.iter().rev();
    let (latest, previous) = match (recent.next(), recent.next()) {
        (Some(latest), Some(previous)) => (latest, previous),
        _ => {
            return Err(ReportError::InsufficientData {
                found: total.len(),
            })
        }
    };

    if previous.1.is_zero() {
        return Err(ReportError::ZeroBaseline { date: previous.0 });
    }

    let change = latest
        .1
        .checked_sub(previous.1)
        .and_then(|delta| delta.checked_div(previous.1))
        .and_then(|fraction| fraction.checked_mul(Decimal::ONE_HUNDRED))
        .ok_or_else(|| ReportError::Variation {
            message: format!("overflow comparing {} with {}", latest.1, previous.1),
        })?;

    let rounded = change.round_dp(2);
    let ratio = if rounded.is_zero() {
        0.0
    } else {
        rounded
            .to_string()
            .parse::<f64>()
            .map_err(|e| ReportError::Variation {
                message: format!("{} is not representable as f64: {}", rounded, e),
            })?
    };

    Ok(VariationResult {
        ratio,
        direction: Direction::from_ratio(ratio),
        latest,
        previous,
    })
}
