//! Engine-wide configuration (`spec.md` §9 ambient stack: the default round
//! mode and precision used whenever a new `Value::Float` is synthesized
//! without one already attached, e.g. literals and arithmetic results).

use sheet_format::RoundMode;

/// The decimal places a freshly-constructed `Value::Float` carries until a
/// `SetPrecision` call changes it on that particular value.
pub const DEFAULT_PRECISION: u32 = 10;

/// Engine-wide knobs that are not part of any one cell's state. Threaded
/// into the evaluator's `CallingContext` rather than made `thread_local` or
/// global, so multiple engines can coexist with different settings in the
/// same process.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub round_mode: RoundMode,
    pub default_precision: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig { round_mode: RoundMode::default(), default_precision: DEFAULT_PRECISION }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_the_module_constant() {
        let config = EngineConfig::default();
        assert_eq!(config.default_precision, DEFAULT_PRECISION);
    }
}
