use serde::{Deserialize, Serialize};

use crate::config::CombatConfig;

/// Combat parameterization applied to a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Category {
    /// Controller-friendly combat, cooldown effectively disabled
    Fast,
    /// Cooldown-based combat, also the fair mode forced during PvP
    #[default]
    Traditional,
}

impl Category {
    /// Attack speed that realizes this category on the host
    pub fn attack_speed(&self, config: &CombatConfig) -> f64 {
        match self {
            Category::Fast => config.fast_attack_speed,
            Category::Traditional => config.traditional_attack_speed,
        }
    }

    /// Whether the cooldown indicator is visible in this category
    pub fn shows_indicator(&self, config: &CombatConfig) -> bool {
        match self {
            Category::Fast => config.show_fast_indicator,
            Category::Traditional => true,
        }
    }

    pub fn is_fast(&self) -> bool {
        matches!(self, Category::Fast)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Fast => write!(f, "fast"),
            Category::Traditional => write!(f, "traditional"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" | "bedrock" => Ok(Category::Fast),
            "traditional" | "java" | "default" => Ok(Category::Traditional),
            other => Err(format!("unknown combat category '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_traditional() {
        assert_eq!(Category::default(), Category::Traditional);
    }

    #[test]
    fn test_attack_speed_mapping() {
        let config = CombatConfig::default();
        assert_eq!(Category::Fast.attack_speed(&config), 1024.0);
        assert_eq!(Category::Traditional.attack_speed(&config), 4.0);
    }

    #[test]
    fn test_indicator_visibility() {
        let mut config = CombatConfig::default();
        assert!(!Category::Fast.shows_indicator(&config));
        assert!(Category::Traditional.shows_indicator(&config));

        config.show_fast_indicator = true;
        assert!(Category::Fast.shows_indicator(&config));
    }

    #[test]
    fn test_parse() {
        assert_eq!("Fast".parse::<Category>(), Ok(Category::Fast));
        assert_eq!("java".parse::<Category>(), Ok(Category::Traditional));
        assert!("turbo".parse::<Category>().is_err());
    }
}
