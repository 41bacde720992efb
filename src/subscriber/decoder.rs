// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoder trait and the known-UUID sensor table.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DecodeError;
use crate::gatt::Service;

use super::LuxometerDecoder;

/// Sensor families a decoder exists for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// Ambient light sensor reporting lux.
    Luxometer,
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Luxometer => f.write_str("luxometer"),
        }
    }
}

/// Attribute layout of one sensor.
///
/// A device is recognized as carrying the sensor when its discovered
/// services contain `service` exactly.
///
/// # Examples
///
/// ```
/// use gattmux::subscriber::{SensorKind, SensorProfile};
///
/// let profile = SensorProfile::luxometer();
/// assert_eq!(profile.kind, SensorKind::Luxometer);
/// assert_eq!(
///     profile.service.to_string(),
///     "f000aa70-0451-4000-b000-000000000000"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorProfile {
    /// Which decoder handles this sensor.
    pub kind: SensorKind,
    /// Service exposing the sensor.
    pub service: Uuid,
    /// Characteristic carrying measurements.
    pub data: Uuid,
    /// Characteristic switching the sensor on.
    pub config: Uuid,
    /// Value written to `config` to start measuring.
    pub enable_value: Vec<u8>,
}

impl SensorProfile {
    /// The SensorTag ambient light sensor.
    #[must_use]
    pub fn luxometer() -> Self {
        Self {
            kind: SensorKind::Luxometer,
            service: Uuid::from_u128(0xf000_aa70_0451_4000_b000_0000_0000_0000),
            data: Uuid::from_u128(0xf000_aa71_0451_4000_b000_0000_0000_0000),
            config: Uuid::from_u128(0xf000_aa72_0451_4000_b000_0000_0000_0000),
            enable_value: vec![0x01],
        }
    }

    /// Returns `true` if `services` expose this sensor.
    #[must_use]
    pub fn matches(&self, services: &[Service]) -> bool {
        services.iter().any(|s| s.uuid() == self.service)
    }
}

/// Turns raw notification payloads of one device into a displayable reading.
pub trait Decoder: Send + fmt::Debug {
    /// Returns the profile this decoder was built for.
    fn profile(&self) -> &SensorProfile;

    /// Decodes a payload and keeps it as the current reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not hold a full frame. The
    /// previous reading is kept.
    fn decode(&mut self, payload: &[u8]) -> Result<(), DecodeError>;

    /// Renders the current reading.
    fn render(&self) -> String;

    /// Marks the decoder as stale. The next decoded payload re-enables it.
    fn disable(&mut self);

    /// Returns `false` after [`disable`](Self::disable) until a new payload arrives.
    fn is_enabled(&self) -> bool;
}

/// Exact-match table from service UUID to decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderCatalog {
    profiles: Vec<SensorProfile>,
}

impl DecoderCatalog {
    /// Creates a catalog over `profiles`. Earlier profiles win on overlap.
    #[must_use]
    pub fn new(profiles: Vec<SensorProfile>) -> Self {
        Self { profiles }
    }

    /// Returns the known profiles.
    #[must_use]
    pub fn profiles(&self) -> &[SensorProfile] {
        &self.profiles
    }

    /// Finds the first profile whose service appears in `services`.
    #[must_use]
    pub fn match_profile(&self, services: &[Service]) -> Option<&SensorProfile> {
        self.profiles.iter().find(|p| p.matches(services))
    }

    /// Builds a decoder for a device exposing `services`.
    ///
    /// Returns `None` if no known sensor is found, which includes the case
    /// where discovery has not completed yet.
    #[must_use]
    pub fn build(&self, services: &[Service]) -> Option<Box<dyn Decoder>> {
        self.match_profile(services).map(|p| decoder_for(p.clone()))
    }
}

impl Default for DecoderCatalog {
    fn default() -> Self {
        Self::new(vec![SensorProfile::luxometer()])
    }
}

fn decoder_for(profile: SensorProfile) -> Box<dyn Decoder> {
    match profile.kind {
        SensorKind::Luxometer => Box::new(LuxometerDecoder::new(profile)),
    }
}
