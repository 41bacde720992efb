// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ambient light sensor decoder.

use crate::error::DecodeError;

use super::{Decoder, SensorProfile};

/// Decoder for the SensorTag luxometer.
///
/// A frame is a little-endian `u16` in a float format: the low 12 bits
/// are the mantissa, the high 4 bits the exponent, and
/// `lux = mantissa * 0.01 * 2^exponent`.
///
/// # Examples
///
/// ```
/// use gattmux::subscriber::{Decoder, LuxometerDecoder, SensorProfile};
///
/// let mut decoder = LuxometerDecoder::new(SensorProfile::luxometer());
/// decoder.decode(&[0x64, 0x10]).unwrap();
///
/// assert_eq!(decoder.lux(), Some(2.0));
/// assert_eq!(decoder.render(), "2.00 lux");
/// ```
#[derive(Debug, Clone)]
pub struct LuxometerDecoder {
    profile: SensorProfile,
    lux: Option<f64>,
    enabled: bool,
}

impl LuxometerDecoder {
    /// Frame length in bytes.
    pub const FRAME_LEN: usize = 2;

    /// Creates a decoder with no reading yet.
    #[must_use]
    pub fn new(profile: SensorProfile) -> Self {
        Self {
            profile,
            lux: None,
            enabled: true,
        }
    }

    /// Returns the last decoded illuminance.
    #[must_use]
    pub fn lux(&self) -> Option<f64> {
        self.lux
    }

    /// Converts a raw sample to lux.
    #[must_use]
    pub fn convert(raw: u16) -> f64 {
        let mantissa = raw & 0x0FFF;
        let exponent = i32::from(raw >> 12);
        f64::from(mantissa) * 0.01 * 2f64.powi(exponent)
    }
}

impl Decoder for LuxometerDecoder {
    fn profile(&self) -> &SensorProfile {
        &self.profile
    }

    fn decode(&mut self, payload: &[u8]) -> Result<(), DecodeError> {
        let Some(&[lo, hi]) = payload.first_chunk::<2>() else {
            return Err(DecodeError::TooShort {
                expected: Self::FRAME_LEN,
                actual: payload.len(),
            });
        };

        self.lux = Some(Self::convert(u16::from_le_bytes([lo, hi])));
        self.enabled = true;
        Ok(())
    }

    fn render(&self) -> String {
        match self.lux {
            Some(lux) => format!("{lux:.2} lux"),
            None => "no reading".to_string(),
        }
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
