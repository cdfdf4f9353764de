//! Pure trigger arithmetic for monitor sessions.
//!
//! Everything here is synchronous and side-effect free. The session loop in
//! `crates/monitor` feeds observed prices in and acts on the answers.

use common::{Basis, ConditionKind, Error, Result, StopLossKind};

/// Offset applied below entry when a request carries no usable stop-loss
/// configuration (`StopLossKind::Default`).
pub const DEFAULT_STOP_OFFSET: f64 = 10.0;

/// Reject a (kind, basis) pair the evaluator cannot handle, without needing
/// a live price. Callers check this before a session starts so unsupported
/// requests never reach the polling loop.
pub fn ensure_supported(kind: ConditionKind, basis: Basis) -> Result<()> {
    match basis {
        Basis::Fixed => Ok(()),
        Basis::Reference => Err(Error::UnsupportedCondition { kind, basis }),
    }
}

/// Decide whether an entry condition has triggered at the observed price.
///
/// Equality triggers `GreaterOrEqual` but not `GreaterThan`.
/// `reference_price` is carried for reference-relative bases; the fixed
/// basis ignores it.
pub fn entry_triggered(
    kind: ConditionKind,
    basis: Basis,
    threshold: f64,
    _reference_price: f64,
    price: f64,
) -> Result<bool> {
    ensure_supported(kind, basis)?;
    Ok(match kind {
        ConditionKind::GreaterOrEqual => price >= threshold,
        ConditionKind::GreaterThan => price > threshold,
    })
}

/// Price level that closes the position, derived exactly once from the
/// realized entry price. `value` is ignored for `StopLossKind::Default`.
pub fn stop_line(entry_price: f64, kind: StopLossKind, value: f64) -> f64 {
    match kind {
        StopLossKind::Percentage => entry_price * (1.0 - value / 100.0),
        StopLossKind::Points => entry_price - value,
        StopLossKind::Fixed => value,
        StopLossKind::Default => entry_price - DEFAULT_STOP_OFFSET,
    }
}
