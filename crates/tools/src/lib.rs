//! Capability implementations for Wayfarer.
//!
//! Capabilities give the agent its view of the world: current weather,
//! exchange rates, and encyclopedic summaries. Each one validates its
//! typed input before making any network call.

pub mod cache;
pub mod currency;
mod http;
pub mod weather;
pub mod wikipedia;

use std::time::Duration;
use wayfarer_config::CapabilitiesConfig;
use wayfarer_core::capability::{Capability, CapabilityInvoker};

pub use cache::CachedCapability;
pub use currency::CurrencyCapability;
pub use weather::WeatherCapability;
pub use wikipedia::WikipediaCapability;

/// Create an invoker with every capability registered.
///
/// When `cache_ttl_secs` is non-zero each capability is wrapped in a
/// [`CachedCapability`].
pub fn default_invoker(config: &CapabilitiesConfig) -> CapabilityInvoker {
    let capabilities: Vec<Box<dyn Capability>> = vec![
        Box::new(WeatherCapability::new(config)),
        Box::new(CurrencyCapability::new(config)),
        Box::new(WikipediaCapability::new(config)),
    ];

    let mut invoker = CapabilityInvoker::new();
    for capability in capabilities {
        if config.cache_ttl_secs > 0 {
            let ttl = Duration::from_secs(config.cache_ttl_secs);
            invoker.register(Box::new(CachedCapability::new(capability, ttl)));
        } else {
            invoker.register(capability);
        }
    }
    invoker
}
