//! Built-in strategies and the name-based registry.

pub mod breakout;
pub mod ma_crossover;
pub mod mtf_momentum;
pub mod rsi_reversion;

use crate::domain::error::PerpsimError;
use crate::ports::config_port::ConfigPort;
use crate::ports::strategy_port::Strategy;

use breakout::Breakout;
use ma_crossover::MaCrossover;
use mtf_momentum::MtfMomentum;
use rsi_reversion::RsiReversion;

/// Registered strategy names, as accepted by [`build`].
pub const AVAILABLE: [&str; 4] = ["breakout", "ma_crossover", "mtf_momentum", "rsi_reversion"];

/// Instantiates a registered strategy by name, with parameters drawn
/// from the config section matching that name.
pub fn build(name: &str, config: &dyn ConfigPort) -> Result<Box<dyn Strategy>, PerpsimError> {
    match name {
        "breakout" => Ok(Box::new(Breakout::from_config(config))),
        "ma_crossover" => Ok(Box::new(MaCrossover::from_config(config))),
        "mtf_momentum" => Ok(Box::new(MtfMomentum::from_config(config))),
        "rsi_reversion" => Ok(Box::new(RsiReversion::from_config(config))),
        _ => Err(PerpsimError::UnknownStrategy {
            name: name.to_string(),
            available: AVAILABLE.join(", "),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Defaults;

    impl ConfigPort for Defaults {
        fn get_string(&self, _: &str, _: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _: &str, _: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _: &str, _: &str, default: f64) -> f64 {
            default
        }
        fn get_bool(&self, _: &str, _: &str, default: bool) -> bool {
            default
        }
    }

    #[test]
    fn every_registered_name_builds() {
        for name in AVAILABLE {
            let strategy = build(name, &Defaults).unwrap();
            assert_eq!(strategy.name(), name);
            assert!(!strategy.timeframes().is_empty());
        }
    }

    #[test]
    fn unknown_name_lists_the_alternatives() {
        let err = build("momentum_god_mode", &Defaults).unwrap_err();
        match err {
            PerpsimError::UnknownStrategy { name, available } => {
                assert_eq!(name, "momentum_god_mode");
                assert!(available.contains("ma_crossover"));
                assert!(available.contains("breakout"));
            }
            other => panic!("expected UnknownStrategy, got {other}"),
        }
    }
}
