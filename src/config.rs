use std::time::Duration;

use hashbrown::HashMap;

/// Combat-mode configuration
#[derive(Debug, Clone)]
pub struct CombatConfig {
    /// Detect PvP and force the traditional category during fights
    pub pvp_detection_enabled: bool,
    /// How long a PvP window stays open after the last qualifying event
    pub pvp_timeout: Duration,
    /// Radius around a dead participant in which bystanders get their window re-armed
    pub death_radius: f64,
    /// Notify bystanders whose window was re-armed by a nearby death
    pub notify_bystanders: bool,
    /// Send PvP enter/exit and welcome notices to fast participants
    pub notifications_enabled: bool,
    /// Detect the client category on join
    pub detection_enabled: bool,
    /// Name prefix marking fast clients when no companion integration answers
    pub fast_name_prefix: String,
    /// Attack speed applied for the fast category
    pub fast_attack_speed: f64,
    /// Attack speed applied for the traditional category
    pub traditional_attack_speed: f64,
    /// Show the cooldown indicator while in the fast category
    pub show_fast_indicator: bool,
    /// Whether PvP is permitted in zones without an override
    pub pvp_default_enabled: bool,
    /// Per-zone PvP overrides, consulted before the default
    pub pvp_zones: HashMap<String, bool>,
    /// Host tick interval used by the binary's event loop
    pub tick_interval: Duration,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            pvp_detection_enabled: true,
            pvp_timeout: Duration::from_secs(10),
            death_radius: 20.0,
            notify_bystanders: false,
            notifications_enabled: true,
            detection_enabled: true,
            fast_name_prefix: ".".to_string(),
            fast_attack_speed: 1024.0,
            traditional_attack_speed: 4.0,
            show_fast_indicator: false,
            pvp_default_enabled: true,
            pvp_zones: HashMap::new(),
            tick_interval: Duration::from_millis(50),
        }
    }
}

impl CombatConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        Self::load_from(|key| std::env::var(key).ok())
    }

    /// Load config from an arbitrary key lookup (environment in production)
    pub fn load_from<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("COMBAT_PVP_DETECTION") {
            match parse_bool(&value) {
                Some(parsed) => config.pvp_detection_enabled = parsed,
                None => tracing::warn!("Invalid COMBAT_PVP_DETECTION '{}', using default", value),
            }
        }

        if let Some(value) = lookup("COMBAT_PVP_TIMEOUT_SECS") {
            match value.parse::<u64>() {
                Ok(secs) if secs <= 3600 => config.pvp_timeout = Duration::from_secs(secs),
                Ok(_) => tracing::warn!("COMBAT_PVP_TIMEOUT_SECS must be 0-3600, using default"),
                Err(_) => tracing::warn!("Invalid COMBAT_PVP_TIMEOUT_SECS '{}', using default", value),
            }
        }

        if let Some(value) = lookup("COMBAT_DEATH_RADIUS") {
            match value.parse::<f64>() {
                Ok(radius) if radius.is_finite() && radius >= 0.0 => config.death_radius = radius,
                _ => tracing::warn!("Invalid COMBAT_DEATH_RADIUS '{}', using default", value),
            }
        }

        if let Some(value) = lookup("COMBAT_NOTIFY_BYSTANDERS") {
            match parse_bool(&value) {
                Some(parsed) => config.notify_bystanders = parsed,
                None => tracing::warn!("Invalid COMBAT_NOTIFY_BYSTANDERS '{}', using default", value),
            }
        }

        if let Some(value) = lookup("COMBAT_NOTIFICATIONS") {
            match parse_bool(&value) {
                Some(parsed) => config.notifications_enabled = parsed,
                None => tracing::warn!("Invalid COMBAT_NOTIFICATIONS '{}', using default", value),
            }
        }

        if let Some(value) = lookup("COMBAT_DETECTION") {
            match parse_bool(&value) {
                Some(parsed) => config.detection_enabled = parsed,
                None => tracing::warn!("Invalid COMBAT_DETECTION '{}', using default", value),
            }
        }

        if let Some(prefix) = lookup("COMBAT_FAST_PREFIX") {
            if prefix.is_empty() {
                tracing::warn!("COMBAT_FAST_PREFIX cannot be empty, using default");
            } else {
                config.fast_name_prefix = prefix;
            }
        }

        if let Some(value) = lookup("COMBAT_FAST_ATTACK_SPEED") {
            match value.parse::<f64>() {
                Ok(speed) if speed > 0.0 => config.fast_attack_speed = speed,
                _ => tracing::warn!("Invalid COMBAT_FAST_ATTACK_SPEED '{}', using default", value),
            }
        }

        if let Some(value) = lookup("COMBAT_TRADITIONAL_ATTACK_SPEED") {
            match value.parse::<f64>() {
                Ok(speed) if speed > 0.0 => config.traditional_attack_speed = speed,
                _ => tracing::warn!(
                    "Invalid COMBAT_TRADITIONAL_ATTACK_SPEED '{}', using default",
                    value
                ),
            }
        }

        if let Some(value) = lookup("COMBAT_SHOW_FAST_INDICATOR") {
            match parse_bool(&value) {
                Some(parsed) => config.show_fast_indicator = parsed,
                None => tracing::warn!("Invalid COMBAT_SHOW_FAST_INDICATOR '{}', using default", value),
            }
        }

        if let Some(value) = lookup("COMBAT_PVP_DEFAULT") {
            match parse_bool(&value) {
                Some(parsed) => config.pvp_default_enabled = parsed,
                None => tracing::warn!("Invalid COMBAT_PVP_DEFAULT '{}', using default", value),
            }
        }

        // Shorthand deny-list, applied before the explicit overrides
        if let Some(value) = lookup("COMBAT_PVP_DISABLED_ZONES") {
            for zone in value.split(',').map(str::trim).filter(|zone| !zone.is_empty()) {
                config.pvp_zones.insert(zone.to_string(), false);
            }
        }

        // "zone=on,other=off"
        if let Some(value) = lookup("COMBAT_PVP_ZONES") {
            for entry in value.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
                match entry.split_once('=') {
                    Some((zone, flag)) if !zone.trim().is_empty() => match parse_bool(flag) {
                        Some(enabled) => {
                            config.pvp_zones.insert(zone.trim().to_string(), enabled);
                        }
                        None => tracing::warn!("Invalid COMBAT_PVP_ZONES entry '{}', skipping", entry),
                    },
                    _ => tracing::warn!("Invalid COMBAT_PVP_ZONES entry '{}', skipping", entry),
                }
            }
        }

        if let Some(value) = lookup("COMBAT_TICK_MS") {
            match value.parse::<u64>() {
                Ok(ms) if ms > 0 && ms <= 1000 => config.tick_interval = Duration::from_millis(ms),
                _ => tracing::warn!("COMBAT_TICK_MS must be 1-1000, using default"),
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if !(self.fast_attack_speed > 0.0) {
            return Err("fast_attack_speed must be positive".to_string());
        }
        if !(self.traditional_attack_speed > 0.0) {
            return Err("traditional_attack_speed must be positive".to_string());
        }
        if !self.death_radius.is_finite() || self.death_radius < 0.0 {
            return Err("death_radius must be a non-negative number".to_string());
        }
        if self.tick_interval.is_zero() {
            return Err("tick_interval cannot be zero".to_string());
        }
        if self.fast_name_prefix.is_empty() {
            return Err("fast_name_prefix cannot be empty".to_string());
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = CombatConfig::default();
        assert!(config.pvp_detection_enabled);
        assert_eq!(config.pvp_timeout, Duration::from_secs(10));
        assert_eq!(config.death_radius, 20.0);
        assert!(!config.notify_bystanders);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_overrides() {
        let config = CombatConfig::load_from(lookup_from(&[
            ("COMBAT_PVP_TIMEOUT_SECS", "25"),
            ("COMBAT_DEATH_RADIUS", "32.5"),
            ("COMBAT_NOTIFY_BYSTANDERS", "yes"),
            ("COMBAT_PVP_DISABLED_ZONES", "spawn, lobby ,"),
        ]));

        assert_eq!(config.pvp_timeout, Duration::from_secs(25));
        assert_eq!(config.death_radius, 32.5);
        assert!(config.notify_bystanders);
        assert_eq!(config.pvp_zones.len(), 2);
        assert_eq!(config.pvp_zones.get("spawn"), Some(&false));
        assert_eq!(config.pvp_zones.get("lobby"), Some(&false));
        assert!(config.pvp_default_enabled);
    }

    #[test]
    fn test_pvp_default_off_with_enabled_zones() {
        let config = CombatConfig::load_from(lookup_from(&[
            ("COMBAT_PVP_DEFAULT", "off"),
            ("COMBAT_PVP_DISABLED_ZONES", "arena"),
            ("COMBAT_PVP_ZONES", "arena=on, wilderness=true, bogus, =on, spawn=maybe"),
        ]));

        assert!(!config.pvp_default_enabled);
        // Explicit overrides win over the shorthand list
        assert_eq!(config.pvp_zones.get("arena"), Some(&true));
        assert_eq!(config.pvp_zones.get("wilderness"), Some(&true));
        assert_eq!(config.pvp_zones.get("spawn"), None);
        assert_eq!(config.pvp_zones.len(), 2);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = CombatConfig::load_from(lookup_from(&[
            ("COMBAT_PVP_TIMEOUT_SECS", "forever"),
            ("COMBAT_DEATH_RADIUS", "-4"),
            ("COMBAT_FAST_ATTACK_SPEED", "0"),
            ("COMBAT_PVP_DETECTION", "maybe"),
            ("COMBAT_FAST_PREFIX", ""),
        ]));

        assert_eq!(config.pvp_timeout, Duration::from_secs(10));
        assert_eq!(config.death_radius, 20.0);
        assert_eq!(config.fast_attack_speed, 1024.0);
        assert!(config.pvp_detection_enabled);
        assert_eq!(config.fast_name_prefix, ".");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = CombatConfig::default();
        config.traditional_attack_speed = 0.0;
        assert!(config.validate().is_err());

        let mut config = CombatConfig::default();
        config.death_radius = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = CombatConfig::default();
        config.tick_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default() {
        let config = CombatConfig::load_or_default();
        assert!(config.fast_attack_speed > 0.0);
    }
}
