use std::sync::Arc;

use tracing::info;

use crate::combat::category::Category;
use crate::combat::ParticipantId;
use crate::config::CombatConfig;
use crate::host::{CompanionLookup, DetectError};

/// How client categories are detected, chosen once at startup.
///
/// The name prefix is read from the live configuration on every call, so a
/// reload changes it for later joins.
#[derive(Clone)]
pub enum Detection {
    /// Companion integration present; the name prefix is the fallback
    Companion { lookup: Arc<dyn CompanionLookup> },
    /// No integration; names starting with the prefix are fast clients
    NamePrefix,
}

impl Detection {
    /// Pick the detection capability for this run
    pub fn resolve(companion: Option<Arc<dyn CompanionLookup>>, config: &CombatConfig) -> Self {
        match companion {
            Some(lookup) => {
                info!("Companion integration enabled for client detection");
                Detection::Companion { lookup }
            }
            None => {
                info!(
                    "Companion integration not found - using name prefix '{}'",
                    config.fast_name_prefix
                );
                Detection::NamePrefix
            }
        }
    }

    /// Detect the client category. Only the companion path can fail.
    pub fn detect(
        &self,
        id: ParticipantId,
        name: &str,
        prefix: &str,
    ) -> Result<Category, DetectError> {
        match self {
            Detection::Companion { lookup } => Ok(if lookup.is_fast_client(id)? {
                Category::Fast
            } else {
                Category::Traditional
            }),
            Detection::NamePrefix => Ok(Self::by_prefix(name, prefix)),
        }
    }

    /// Prefix-based detection, also the fallback when the companion fails
    pub fn by_prefix(name: &str, prefix: &str) -> Category {
        if name.starts_with(prefix) {
            Category::Fast
        } else {
            Category::Traditional
        }
    }

    /// Short label for status output
    pub fn source(&self) -> &'static str {
        match self {
            Detection::Companion { .. } => "companion",
            Detection::NamePrefix => "name-prefix",
        }
    }
}

impl std::fmt::Debug for Detection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Detection::Companion { .. } => f.debug_struct("Companion").finish_non_exhaustive(),
            Detection::NamePrefix => f.write_str("NamePrefix"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    struct FixedLookup(Result<bool, DetectError>);

    impl CompanionLookup for FixedLookup {
        fn is_fast_client(&self, _id: ParticipantId) -> Result<bool, DetectError> {
            self.0.clone()
        }
    }

    #[test]
    fn test_resolve_without_companion() {
        let detection = Detection::resolve(None, &CombatConfig::default());
        assert_eq!(detection.source(), "name-prefix");
        assert_eq!(
            detection.detect(Uuid::new_v4(), ".Steve", ".").unwrap(),
            Category::Fast
        );
        assert_eq!(
            detection.detect(Uuid::new_v4(), "Alex", ".").unwrap(),
            Category::Traditional
        );
    }

    #[test]
    fn test_companion_answer_wins_over_prefix() {
        let detection = Detection::resolve(
            Some(Arc::new(FixedLookup(Ok(true)))),
            &CombatConfig::default(),
        );
        assert_eq!(detection.source(), "companion");
        assert_eq!(
            detection.detect(Uuid::new_v4(), "Alex", ".").unwrap(),
            Category::Fast
        );
    }

    #[test]
    fn test_companion_failure_surfaces_and_prefix_still_works() {
        let detection = Detection::resolve(
            Some(Arc::new(FixedLookup(Err(DetectError::Unavailable(
                "not loaded".to_string(),
            ))))),
            &CombatConfig::default(),
        );

        assert!(detection.detect(Uuid::new_v4(), ".Steve", ".").is_err());
        assert_eq!(Detection::by_prefix(".Steve", "."), Category::Fast);
        assert_eq!(Detection::by_prefix("Steve", "."), Category::Traditional);
    }

    #[test]
    fn test_prefix_comes_from_caller() {
        let detection = Detection::resolve(None, &CombatConfig::default());
        assert_eq!(
            detection.detect(Uuid::new_v4(), "*Steve", "*").unwrap(),
            Category::Fast
        );
        assert_eq!(
            detection.detect(Uuid::new_v4(), ".Steve", "*").unwrap(),
            Category::Traditional
        );
    }
}
