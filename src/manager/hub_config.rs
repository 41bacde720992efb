// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration for the sensor hub.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::discovery::{DEFAULT_ALLOWED_NAMES, DEFAULT_SCAN_PERIOD, DiscoveryOptions, NameFilter};
use crate::error::ConfigError;
use crate::subscriber::{DecoderCatalog, SensorProfile};

/// Default capacity of the normalized event channel.
const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Configuration for a [`SensorHub`](super::SensorHub).
///
/// Every field has a default, so a JSON document only needs the fields it
/// changes.
///
/// # Examples
///
/// ```
/// use gattmux::manager::HubConfig;
///
/// let config = HubConfig::from_json_str(r#"{ "event_capacity": 64 }"#).unwrap();
/// assert_eq!(config.event_capacity, 64);
/// assert_eq!(config.scan_period_ms, 6000);
///
/// assert!(HubConfig::from_json_str(r#"{ "event_capacity": 0 }"#).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Events buffered per subscriber before it is reported as lagging.
    pub event_capacity: usize,
    /// How long a scan listens for advertisements, in milliseconds.
    pub scan_period_ms: u64,
    /// Advertised names accepted as candidates.
    pub allowed_names: Vec<String>,
    /// Known sensors, matched by service UUID.
    pub profiles: Vec<SensorProfile>,
}

impl HubConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is out of range.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero event capacity, a zero
    /// scan period, or two profiles sharing a service UUID.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid(
                "event_capacity must be greater than zero".to_string(),
            ));
        }
        if self.scan_period_ms == 0 {
            return Err(ConfigError::Invalid(
                "scan_period_ms must be greater than zero".to_string(),
            ));
        }

        let mut services = HashSet::new();
        for profile in &self.profiles {
            if !services.insert(profile.service) {
                return Err(ConfigError::Invalid(format!(
                    "service {} is used by more than one profile",
                    profile.service
                )));
            }
        }

        Ok(())
    }

    /// Sets the event capacity.
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Sets the scan period.
    #[must_use]
    pub fn with_scan_period(mut self, period: Duration) -> Self {
        self.scan_period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Replaces the accepted advertised names.
    #[must_use]
    pub fn with_allowed_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a sensor profile.
    #[must_use]
    pub fn with_profile(mut self, profile: SensorProfile) -> Self {
        self.profiles.push(profile);
        self
    }

    /// Returns the scan period.
    #[must_use]
    pub fn scan_period(&self) -> Duration {
        Duration::from_millis(self.scan_period_ms)
    }

    /// Builds the scan options described by this configuration.
    #[must_use]
    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions::new()
            .with_period(self.scan_period())
            .with_filter(NameFilter::new(self.allowed_names.iter().cloned()))
    }

    /// Builds the decoder catalog described by this configuration.
    #[must_use]
    pub fn catalog(&self) -> DecoderCatalog {
        DecoderCatalog::new(self.profiles.clone())
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            scan_period_ms: u64::try_from(DEFAULT_SCAN_PERIOD.as_millis()).unwrap_or(u64::MAX),
            allowed_names: DEFAULT_ALLOWED_NAMES.iter().map(ToString::to_string).collect(),
            profiles: vec![SensorProfile::luxometer()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn default_config_is_valid() {
        let config = HubConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.event_capacity, 256);
        assert_eq!(config.scan_period(), Duration::from_secs(6));
        assert_eq!(config.profiles, vec![SensorProfile::luxometer()]);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = HubConfig::from_json_str(r#"{ "allowed_names": ["Thermo"] }"#).unwrap();

        assert_eq!(config.allowed_names, vec!["Thermo".to_string()]);
        assert_eq!(config.event_capacity, 256);
        assert_eq!(config.profiles.len(), 1);
    }

    #[test]
    fn profiles_from_json() {
        let json = r#"{
            "profiles": [{
                "kind": "luxometer",
                "service": "f000aa70-0451-4000-b000-000000000000",
                "data": "f000aa71-0451-4000-b000-000000000000",
                "config": "f000aa72-0451-4000-b000-000000000000",
                "enable_value": [1]
            }]
        }"#;

        let config = HubConfig::from_json_str(json).unwrap();
        assert_eq!(config.profiles, vec![SensorProfile::luxometer()]);
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(
            HubConfig::from_json_str("{ event_capacity"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn zero_values_are_rejected() {
        assert!(HubConfig::new().with_event_capacity(0).validate().is_err());
        assert!(HubConfig::new()
            .with_scan_period(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn duplicate_profile_services_are_rejected() {
        let config = HubConfig::new().with_profile(SensorProfile::luxometer());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than one profile"));
    }

    #[test]
    fn builders_feed_discovery_and_catalog() {
        let mut other = SensorProfile::luxometer();
        other.service = Uuid::from_u128(42);

        let config = HubConfig::new()
            .with_scan_period(Duration::from_millis(1500))
            .with_allowed_names(["Thermo"])
            .with_profile(other);

        let options = config.discovery_options();
        assert_eq!(options.period(), Duration::from_millis(1500));
        assert_eq!(options.filter().allowed(), ["Thermo".to_string()]);
        assert_eq!(config.catalog().profiles().len(), 2);
    }
}
