//! Input device descriptors and format negotiation

use std::fmt;

use ac_core::PcmFormat;

use crate::{AudioError, AudioResult};

/// One supported configuration range of an input device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportedInput {
    pub channels: u16,
    pub min_rate: u32,
    pub max_rate: u32,
    pub format: PcmFormat,
}

impl SupportedInput {
    #[inline]
    pub fn supports_rate(&self, rate: u32) -> bool {
        rate >= self.min_rate && rate <= self.max_rate
    }
}

/// Input device information
#[derive(Debug, Clone, Default)]
pub struct DeviceDescriptor {
    /// Stable identifier used to select the device
    pub id: String,
    pub name: String,
    pub is_default: bool,
    pub supported: Vec<SupportedInput>,
    /// Set when the backend could not query the device's capabilities
    pub probe_error: Option<String>,
}

impl DeviceDescriptor {
    pub fn max_channels(&self) -> u16 {
        self.supported.iter().map(|s| s.channels).max().unwrap_or(0)
    }

    /// Distinct formats in backend order
    pub fn formats(&self) -> Vec<PcmFormat> {
        let mut formats = Vec::new();
        for s in &self.supported {
            if !formats.contains(&s.format) {
                formats.push(s.format);
            }
        }
        formats
    }

    /// Distinct `(min, max)` rate ranges
    pub fn rate_ranges(&self) -> Vec<(u32, u32)> {
        let mut ranges: Vec<(u32, u32)> = self
            .supported
            .iter()
            .map(|s| (s.min_rate, s.max_rate))
            .collect();
        ranges.sort_unstable();
        ranges.dedup();
        ranges
    }

    /// Error out if the device could not be probed
    pub fn ensure_probed(&self) -> AudioResult<()> {
        match &self.probe_error {
            Some(reason) => Err(AudioError::ProbeError {
                device: self.name.clone(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Write the listing entry; `verbose` adds capabilities
    pub fn describe(&self, f: &mut impl fmt::Write, verbose: bool) -> fmt::Result {
        if !verbose {
            return writeln!(f, "{}\t({})", self.name, self.id);
        }

        let default = if self.is_default { " (default)" } else { "" };
        writeln!(f, "{}{}", self.name, default)?;
        writeln!(f, "  id: {}", self.id)?;

        if let Some(reason) = &self.probe_error {
            return writeln!(f, "  probe error: {}", reason);
        }

        writeln!(f, "  max channels: {}", self.max_channels())?;
        writeln!(f, "  sample rates:")?;
        for (min, max) in self.rate_ranges() {
            writeln!(f, "    {} - {}", min, max)?;
        }

        let formats: Vec<&str> = self.formats().iter().map(|f| f.name()).collect();
        writeln!(f, "  formats: {}", formats.join(", "))
    }
}

/// Stream parameters agreed with a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedFormat {
    pub format: PcmFormat,
    pub sample_rate: u32,
    pub channels: u16,
}

impl NegotiatedFormat {
    #[inline]
    pub fn frame_bytes(&self) -> usize {
        self.format.bytes_per_sample() * self.channels as usize
    }
}

impl fmt::Display for NegotiatedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ch {}Hz {} interleaved",
            self.channels, self.sample_rate, self.format
        )
    }
}

/// Pick format and rate from prioritized lists.
///
/// The first format in `formats` that the device offers wins. Within that
/// format the first rate in `rates` covered by any range wins; when none is
/// covered the highest supported rate of that format is used.
pub fn negotiate(
    device: &DeviceDescriptor,
    formats: &[PcmFormat],
    rates: &[u32],
) -> AudioResult<NegotiatedFormat> {
    device.ensure_probed()?;

    for &format in formats {
        let candidates: Vec<&SupportedInput> = device
            .supported
            .iter()
            .filter(|s| s.format == format && s.channels > 0)
            .collect();

        if candidates.is_empty() {
            continue;
        }

        for &rate in rates {
            if let Some(s) = candidates.iter().find(|s| s.supports_rate(rate)) {
                return Ok(NegotiatedFormat {
                    format,
                    sample_rate: rate,
                    channels: s.channels,
                });
            }
        }

        let fallback = candidates.iter().max_by_key(|s| s.max_rate);
        if let Some(s) = fallback {
            log::debug!(
                "{}: no prioritized rate for {}, using {}Hz",
                device.name,
                format,
                s.max_rate
            );
            return Ok(NegotiatedFormat {
                format,
                sample_rate: s.max_rate,
                channels: s.channels,
            });
        }
    }

    Err(AudioError::UnsupportedFormat(device.name.clone()))
}

/// Find a device by id
pub fn find_device<'a>(
    devices: &'a [DeviceDescriptor],
    id: &str,
) -> AudioResult<&'a DeviceDescriptor> {
    devices
        .iter()
        .find(|d| d.id == id)
        .ok_or_else(|| AudioError::DeviceNotFound(id.to_string()))
}
