//! Bus and link configuration.

use core::fmt;
use core::net::{IpAddr, Ipv4Addr, SocketAddr};
use core::str::FromStr;
use core::time::Duration;

use crate::error::UnsupportedRate;

/// Default remote host.
pub const DEFAULT_REMOTE: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 42, 182)), caneth::PORT);

/// Controller clock the timing profiles are computed for.
pub const CONTROLLER_CLOCK_HZ: u32 = 80_000_000;

/// Supported bus bit rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub enum BitRate {
    Rate1M,
    Rate800K,
    #[default]
    Rate500K,
    Rate250K,
    Rate125K,
    Rate100K,
    Rate50K,
    Rate25K,
}

impl BitRate {
    /// All profiles, fastest first.
    pub const ALL: [BitRate; 8] = [
        BitRate::Rate1M,
        BitRate::Rate800K,
        BitRate::Rate500K,
        BitRate::Rate250K,
        BitRate::Rate125K,
        BitRate::Rate100K,
        BitRate::Rate50K,
        BitRate::Rate25K,
    ];

    /// Profile name as used by configuration requests.
    pub fn name(self) -> &'static str {
        match self {
            BitRate::Rate1M => "1MBITS",
            BitRate::Rate800K => "800KBITS",
            BitRate::Rate500K => "500KBITS",
            BitRate::Rate250K => "250KBITS",
            BitRate::Rate125K => "125KBITS",
            BitRate::Rate100K => "100KBITS",
            BitRate::Rate50K => "50KBITS",
            BitRate::Rate25K => "25KBITS",
        }
    }

    pub fn bits_per_second(self) -> u32 {
        match self {
            BitRate::Rate1M => 1_000_000,
            BitRate::Rate800K => 800_000,
            BitRate::Rate500K => 500_000,
            BitRate::Rate250K => 250_000,
            BitRate::Rate125K => 125_000,
            BitRate::Rate100K => 100_000,
            BitRate::Rate50K => 50_000,
            BitRate::Rate25K => 25_000,
        }
    }

    /// Transceiver timing for a [`CONTROLLER_CLOCK_HZ`] controller.
    pub fn timing(self) -> TimingProfile {
        let (brp, tseg_1, tseg_2) = match self {
            BitRate::Rate1M => (4, 15, 4),
            BitRate::Rate800K => (4, 16, 8),
            BitRate::Rate500K => (8, 15, 4),
            BitRate::Rate250K => (16, 15, 4),
            BitRate::Rate125K => (32, 15, 4),
            BitRate::Rate100K => (40, 15, 4),
            BitRate::Rate50K => (80, 15, 4),
            BitRate::Rate25K => (128, 16, 8),
        };

        TimingProfile {
            brp,
            tseg_1,
            tseg_2,
            sjw: 3,
            triple_sampling: false,
        }
    }
}

impl FromStr for BitRate {
    type Err = UnsupportedRate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BitRate::ALL
            .into_iter()
            .find(|rate| rate.name() == s)
            .ok_or(UnsupportedRate)
    }
}

impl fmt::Display for BitRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bit timing in time quanta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct TimingProfile {
    /// Baud rate prescaler.
    pub brp: u32,
    pub tseg_1: u8,
    pub tseg_2: u8,
    /// Synchronisation jump width.
    pub sjw: u8,
    pub triple_sampling: bool,
}

impl TimingProfile {
    /// Quanta per bit, including the sync segment.
    pub fn quanta(&self) -> u32 {
        1 + u32::from(self.tseg_1) + u32::from(self.tseg_2)
    }

    /// Nominal bit rate on a controller clocked at `clock_hz`.
    pub fn bit_rate(&self, clock_hz: u32) -> u32 {
        clock_hz / self.brp / self.quanta()
    }
}

/// Bus and remote endpoint settings owned by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    pub bit_rate: BitRate,
    /// Where frames received from the bus are sent.
    pub remote: SocketAddr,
}

impl Default for BusConfig {
    fn default() -> Self {
        BusConfig {
            bit_rate: BitRate::default(),
            remote: DEFAULT_REMOTE,
        }
    }
}

/// Forwarding loop timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Pause between forwarding cycles.
    pub poll_interval: Duration,
    /// Upper bound for a single bus transmit.
    pub transmit_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            poll_interval: Duration::from_millis(100),
            transmit_timeout: Duration::from_millis(1000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_names() {
        for rate in BitRate::ALL {
            assert_eq!(rate.name().parse::<BitRate>(), Ok(rate));
        }
        assert_eq!("500KBITS".parse::<BitRate>(), Ok(BitRate::Rate500K));
    }

    #[test]
    fn parse_rejects_unknown() {
        assert_eq!("2MBITS".parse::<BitRate>(), Err(UnsupportedRate));
        assert_eq!("500kbits".parse::<BitRate>(), Err(UnsupportedRate));
        assert_eq!("".parse::<BitRate>(), Err(UnsupportedRate));
    }

    #[test]
    fn timing_matches_rate() {
        for rate in BitRate::ALL {
            assert_eq!(
                rate.timing().bit_rate(CONTROLLER_CLOCK_HZ),
                rate.bits_per_second(),
                "{rate}"
            );
        }
    }

    #[test]
    fn defaults() {
        let config = BusConfig::default();
        assert_eq!(config.bit_rate, BitRate::Rate500K);
        assert_eq!(config.remote.port(), 4210);

        let timing = Timing::default();
        assert_eq!(timing.poll_interval, Duration::from_millis(100));
    }
}
