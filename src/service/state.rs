//! Service state management.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::pipeline::Pipeline;
use crate::policy::AttributionPolicyV1;
use crate::store::MessageStore;
use crate::verification::{CacheConfig, CachedVerifier};

/// Reference to the active attribution policy.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PolicyRef {
    /// Policy identifier (e.g., "attribution_policy_v1").
    pub policy_id: String,
    /// Hash of the canonical policy JSON.
    pub params_hash: String,
}

impl PolicyRef {
    /// Reference for a policy.
    pub fn from_policy(policy: &AttributionPolicyV1) -> Self {
        Self {
            policy_id: policy.policy_id().to_string(),
            params_hash: policy.params_hash(),
        }
    }
}

/// Shared service state.
///
/// Holds the per-message pipeline (store, classifier, policy) and the
/// memoising quote verifier.
pub struct ServiceState<S: MessageStore + 'static> {
    /// The forensic pipeline.
    pub pipeline: Arc<Pipeline<S>>,
    /// Cached quote verifier.
    pub verifier: Arc<CachedVerifier>,
}

impl<S: MessageStore + 'static> ServiceState<S> {
    /// State around a configured pipeline with a default verification cache.
    pub fn new(pipeline: Pipeline<S>) -> Self {
        Self::with_cache(pipeline, CacheConfig::default())
    }

    /// State with an explicit verification cache configuration.
    pub fn with_cache(pipeline: Pipeline<S>, cache: CacheConfig) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            verifier: Arc::new(CachedVerifier::new(cache)),
        }
    }

    /// Reference to the policy in use.
    pub fn policy_ref(&self) -> PolicyRef {
        PolicyRef::from_policy(self.pipeline.engine().policy())
    }
}

impl<S: MessageStore + 'static> Clone for ServiceState<S> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
            verifier: Arc::clone(&self.verifier),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryMessageStore;

    #[test]
    fn test_policy_ref_matches_pipeline_policy() {
        let state = ServiceState::new(Pipeline::new(Arc::new(InMemoryMessageStore::new())));
        let policy_ref = state.policy_ref();
        assert_eq!(policy_ref.policy_id, "attribution_policy_v1");
        assert_eq!(policy_ref, PolicyRef::from_policy(&AttributionPolicyV1::default()));
    }

    #[test]
    fn test_clone_shares_verifier() {
        let state = ServiceState::new(Pipeline::new(Arc::new(InMemoryMessageStore::new())));
        let cloned = state.clone();
        state.verifier.verify("a", "a");
        assert_eq!(cloned.verifier.cache_stats().map(|s| s.len), Some(1));
    }
}
