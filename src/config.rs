use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::matches::elo::{is_valid_k_factor, KFactorPolicy, MAX_K_FACTOR};
use crate::rating::models::{MembershipPolicy, DEFAULT_RATING};
use crate::store::StoreConfig;
use crate::tournament::scheduler::{ByePolicy, DEFAULT_STEP_LIMIT};

/// Engine-wide configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Rating assigned on club join
    pub default_rating: i32,
    /// K-factor used for clubs without an override
    pub k_factor: KFactorPolicy,
    pub club_k_factors: HashMap<String, KFactorPolicy>,
    pub membership: MembershipPolicy,
    pub bye_policy: ByePolicy,
    /// Upper bound on backtracking steps for one round
    pub pairing_step_limit: usize,
    pub store: StoreConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_rating: DEFAULT_RATING,
            k_factor: KFactorPolicy::default(),
            club_k_factors: HashMap::new(),
            membership: MembershipPolicy::Strict,
            bye_policy: ByePolicy::OncePerPlayer,
            pairing_step_limit: DEFAULT_STEP_LIMIT,
            store: StoreConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Reads overrides from `CLUBRANK_*` environment variables,
    /// falling back to defaults for anything unset or unparsable
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let k = env_parse::<f64>("CLUBRANK_K_FACTOR").and_then(checked_k_factor);
        let k_factor = match std::env::var("CLUBRANK_K_POLICY").ok().as_deref() {
            Some("tiered") => KFactorPolicy::tiered(),
            Some("fixed") | None => k.map(KFactorPolicy::fixed).unwrap_or(defaults.k_factor),
            Some(other) => {
                warn!(value = %other, "Unknown CLUBRANK_K_POLICY, using default");
                defaults.k_factor
            }
        };

        let membership = if env_parse::<bool>("CLUBRANK_AUTO_ENROLL").unwrap_or(false) {
            MembershipPolicy::AutoEnroll
        } else {
            MembershipPolicy::Strict
        };

        let store = StoreConfig {
            timeout: env_parse::<u64>("CLUBRANK_STORE_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.store.timeout),
            retries: env_parse("CLUBRANK_STORE_RETRIES").unwrap_or(defaults.store.retries),
        };

        Self {
            default_rating: env_parse("CLUBRANK_DEFAULT_RATING").unwrap_or(defaults.default_rating),
            k_factor,
            club_k_factors: HashMap::new(),
            membership,
            bye_policy: env_parse("CLUBRANK_BYE_POLICY").unwrap_or(defaults.bye_policy),
            pairing_step_limit: env_parse("CLUBRANK_PAIRING_STEP_LIMIT")
                .unwrap_or(defaults.pairing_step_limit),
            store,
        }
    }

    pub fn with_club_k_factor(mut self, club_id: &str, policy: KFactorPolicy) -> Self {
        self.club_k_factors.insert(club_id.to_string(), policy);
        self
    }

    pub fn k_factor_for(&self, club_id: &str) -> &KFactorPolicy {
        self.club_k_factors.get(club_id).unwrap_or(&self.k_factor)
    }
}

fn checked_k_factor(k: f64) -> Option<f64> {
    if is_valid_k_factor(k) {
        Some(k)
    } else {
        warn!(value = k, max = MAX_K_FACTOR, "Ignoring out of range CLUBRANK_K_FACTOR");
        None
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparsable configuration value");
            None
        }
    }
}
