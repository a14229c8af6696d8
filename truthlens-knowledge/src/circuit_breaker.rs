//! Per-provider circuit breaker.
//!
//! Tracks consecutive failures per registered provider and temporarily
//! skips providers that fail repeatedly. After a cooldown a tripped
//! provider enters a half-open state where the next search acts as a trial
//! deciding whether to restore or re-trip the circuit.
//!
//! # State Machine
//!
//! ```text
//! ┌────────┐  N failures   ┌────────┐  cooldown   ┌──────────┐
//! │ Closed ├──────────────►│  Open  ├────────────►│ HalfOpen │
//! └───▲────┘               └────────┘             └────┬─────┘
//!     │                         ▲                      │
//!     │  success                │  failure             │
//!     └─────────────────────────┴──────────────────────┘
//! ```

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Circuit state for a single provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Provider is healthy and queried normally.
    Closed,
    /// Provider failed too often and is skipped until the cooldown expires.
    Open,
    /// Cooldown elapsed; the next search tries the provider again.
    HalfOpen,
}

/// Health tracking data for one provider.
#[derive(Debug, Clone)]
struct ProviderHealth {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
        }
    }
}

/// Health line reported in manager statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Registered provider name.
    pub provider: String,
    /// Current circuit state.
    pub state: CircuitState,
    /// Failures since the last success.
    pub consecutive_failures: u32,
}

/// Configuration for circuit breaker behaviour.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// Time spent open before a trial search is allowed.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(60),
        }
    }
}

/// Circuit breaker keyed by provider name. Owned by one manager.
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    providers: HashMap<String, ProviderHealth>,
}

impl CircuitBreaker {
    /// Create a breaker with the given configuration.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            providers: HashMap::new(),
        }
    }

    /// Record a successful search. Closes the circuit.
    pub fn record_success(&mut self, provider: &str) {
        let health = self.providers.entry(provider.to_owned()).or_default();
        health.state = CircuitState::Closed;
        health.consecutive_failures = 0;
    }

    /// Record a failed or timed-out search. Opens the circuit at the
    /// threshold, and immediately when a half-open trial fails.
    pub fn record_failure(&mut self, provider: &str) {
        let health = self.providers.entry(provider.to_owned()).or_default();
        health.consecutive_failures += 1;
        health.last_failure_at = Some(Instant::now());

        if health.state == CircuitState::HalfOpen
            || health.consecutive_failures >= self.config.failure_threshold
        {
            if health.state != CircuitState::Open {
                tracing::warn!(
                    provider,
                    failures = health.consecutive_failures,
                    "provider circuit opened"
                );
            }
            health.state = CircuitState::Open;
        }
    }

    /// Whether the provider should be queried now. An open circuit whose
    /// cooldown has elapsed moves to half-open and allows one attempt.
    pub fn should_attempt(&mut self, provider: &str) -> bool {
        let Some(health) = self.providers.get_mut(provider) else {
            return true;
        };

        match health.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooldown_elapsed = health
                    .last_failure_at
                    .is_none_or(|t| t.elapsed() >= self.config.cooldown);
                if cooldown_elapsed {
                    health.state = CircuitState::HalfOpen;
                }
                cooldown_elapsed
            }
        }
    }

    /// Current state for a provider; unknown providers are closed.
    pub fn state(&self, provider: &str) -> CircuitState {
        self.providers
            .get(provider)
            .map_or(CircuitState::Closed, |h| h.state)
    }

    /// Health of every provider seen so far, sorted by name.
    pub fn health_report(&self) -> Vec<HealthReport> {
        let mut report = self
            .providers
            .iter()
            .map(|(provider, health)| HealthReport {
                provider: provider.clone(),
                state: health.state,
                consecutive_failures: health.consecutive_failures,
            })
            .collect::<Vec<_>>();
        report.sort_by(|a, b| a.provider.cmp(&b.provider));
        report
    }

    /// Forget one provider's history (for example after reconfiguration).
    pub fn forget(&mut self, provider: &str) {
        self.providers.remove(provider);
    }
}
