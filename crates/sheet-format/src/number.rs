use rust_decimal::{Decimal, RoundingStrategy};

/// Mirrors the rounding modes the original `GetRoundMode`/`SetRoundMode`
/// built-ins expose (`spec.md` §4.6). `Nearest` breaks ties away from zero,
/// matching the conventional spreadsheet `ROUND` built-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RoundMode {
    Nearest,
    Up,
    Down,
    Floor,
    Ceiling,
}

impl Default for RoundMode {
    fn default() -> Self {
        RoundMode::Nearest
    }
}

impl RoundMode {
    fn strategy(self) -> RoundingStrategy {
        match self {
            RoundMode::Nearest => RoundingStrategy::MidpointAwayFromZero,
            RoundMode::Up => RoundingStrategy::AwayFromZero,
            RoundMode::Down => RoundingStrategy::ToZero,
            RoundMode::Floor => RoundingStrategy::ToNegativeInfinity,
            RoundMode::Ceiling => RoundingStrategy::ToPositiveInfinity,
        }
    }
}

/// Rounds `value` to `precision` fractional digits under `mode`, then
/// renders it with a plain decimal `Display`. Callers needing NaN/Infinity
/// text render those cases themselves (this module only ever sees finite
/// decimals — see `sheet_model::value::Number`).
pub fn format_decimal(value: Decimal, precision: u32, mode: RoundMode) -> String {
    value.round_dp_with_strategy(precision, mode.strategy()).normalize().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_half_away_from_zero_by_default() {
        assert_eq!(format_decimal(dec!(2.5), 0, RoundMode::Nearest), "3");
        assert_eq!(format_decimal(dec!(-2.5), 0, RoundMode::Nearest), "-3");
    }

    #[test]
    fn floor_and_ceiling_modes() {
        assert_eq!(format_decimal(dec!(2.1), 0, RoundMode::Floor), "2");
        assert_eq!(format_decimal(dec!(-2.1), 0, RoundMode::Floor), "-3");
        assert_eq!(format_decimal(dec!(2.1), 0, RoundMode::Ceiling), "3");
    }
}
