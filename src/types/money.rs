//! Currency arithmetic helpers
//!
//! All balances and amounts in the ledger are `Decimal` values carried at
//! two decimal places. Every arithmetic result is passed through [`round`]
//! before it is committed, so binary floating point never touches money.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of fractional digits kept for every currency value
pub const CURRENCY_SCALE: u32 = 2;

/// Largest amount a single credit or debit may move (1,000,000.00)
pub const MAX_TRANSACTION_AMOUNT: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 2);

/// Round a currency value to two decimal places, half-up on the midpoint
///
/// Rounding an already rounded value returns it unchanged.
pub fn round(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Render a currency value with exactly two fractional digits
pub fn format(value: Decimal) -> String {
    format!("{:.2}", round(value))
}

/// Render a value the way clients print a double: shortest form, at least
/// one fractional digit
///
/// Magnitudes outside `[0.001, 10,000,000)` switch to `d.dddE±n` notation,
/// so `500` renders as `500.0`, `25.50` as `25.5` and `1e7` as `1.0E7`.
pub fn format_shortest(value: Decimal) -> String {
    let value = value.normalize();
    let abs = value.abs();
    let scientific =
        !abs.is_zero() && (abs >= Decimal::from(10_000_000) || abs < Decimal::new(1, 3));

    if !scientific {
        let plain = value.to_string();
        return if plain.contains('.') {
            plain
        } else {
            format!("{}.0", plain)
        };
    }

    let digits = abs.mantissa().to_string();
    let exponent = digits.len() as i64 - 1 - i64::from(abs.scale());
    let (lead, rest) = digits.split_at(1);
    let rest = rest.trim_end_matches('0');
    let sign = if value.is_sign_negative() { "-" } else { "" };
    format!(
        "{}{}.{}E{}",
        sign,
        lead,
        if rest.is_empty() { "0" } else { rest },
        exponent
    )
}
