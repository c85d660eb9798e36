use crate::config::Config;
use crate::providers::ProviderKind;

/// Per-provider fetch counters, capped at provider-specific ceilings.
///
/// Loaded from the persisted config at startup; callers write changes back
/// through [`UsageLedger::write_back`] and save the config immediately so no
/// successful fetch goes unaccounted. Counters only ever grow on their own;
/// resetting is an explicit user action via [`UsageLedger::override_count`].
#[derive(Debug, Clone)]
pub struct UsageLedger {
    direct: u32,
    polling: u32,
}

impl UsageLedger {
    pub fn from_config(config: &Config) -> Self {
        // Clamp on load in case the file was edited past a ceiling
        Self {
            direct: config.usage.direct.min(ProviderKind::Direct.ceiling()),
            polling: config.usage.polling.min(ProviderKind::Polling.ceiling()),
        }
    }

    pub fn count(&self, provider: ProviderKind) -> u32 {
        match provider {
            ProviderKind::Direct => self.direct,
            ProviderKind::Polling => self.polling,
        }
    }

    fn count_mut(&mut self, provider: ProviderKind) -> &mut u32 {
        match provider {
            ProviderKind::Direct => &mut self.direct,
            ProviderKind::Polling => &mut self.polling,
        }
    }

    /// Increment a provider's counter, clamped at its ceiling. Returns the
    /// new count.
    pub fn increment(&mut self, provider: ProviderKind) -> u32 {
        let ceiling = provider.ceiling();
        let count = self.count_mut(provider);
        *count = (*count + 1).min(ceiling);
        *count
    }

    /// Explicit user override, clamped to `[0, ceiling]`
    pub fn override_count(&mut self, provider: ProviderKind, value: u32) -> u32 {
        let ceiling = provider.ceiling();
        let count = self.count_mut(provider);
        *count = value.min(ceiling);
        *count
    }

    pub fn is_exhausted(&self, provider: ProviderKind) -> bool {
        self.count(provider) >= provider.ceiling()
    }

    /// Copy the live counters back into the config for persistence
    pub fn write_back(&self, config: &mut Config) {
        config.usage.direct = self.direct;
        config.usage.polling = self.polling;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_and_clamp() {
        let mut ledger = UsageLedger::from_config(&Config::default());
        assert_eq!(ledger.increment(ProviderKind::Direct), 1);
        assert_eq!(ledger.increment(ProviderKind::Direct), 2);
        assert_eq!(ledger.count(ProviderKind::Polling), 0);

        ledger.override_count(ProviderKind::Direct, 20);
        assert_eq!(ledger.increment(ProviderKind::Direct), 20);
        assert_eq!(ledger.count(ProviderKind::Direct), 20);
    }

    #[test]
    fn test_exhaustion_at_ceiling() {
        let mut ledger = UsageLedger::from_config(&Config::default());
        assert!(!ledger.is_exhausted(ProviderKind::Polling));
        ledger.override_count(ProviderKind::Polling, 100);
        assert!(ledger.is_exhausted(ProviderKind::Polling));
        assert!(!ledger.is_exhausted(ProviderKind::Direct));
    }

    #[test]
    fn test_override_clamps_to_ceiling() {
        let mut ledger = UsageLedger::from_config(&Config::default());
        assert_eq!(ledger.override_count(ProviderKind::Direct, 9999), 20);
        assert_eq!(ledger.override_count(ProviderKind::Direct, 0), 0);
    }

    #[test]
    fn test_clamps_oversized_persisted_counts() {
        let mut config = Config::default();
        config.usage.direct = 500;
        let ledger = UsageLedger::from_config(&config);
        assert_eq!(ledger.count(ProviderKind::Direct), 20);
    }

    #[test]
    fn test_write_back() {
        let mut config = Config::default();
        let mut ledger = UsageLedger::from_config(&config);
        ledger.increment(ProviderKind::Polling);
        ledger.write_back(&mut config);
        assert_eq!(config.usage.polling, 1);
    }
}
