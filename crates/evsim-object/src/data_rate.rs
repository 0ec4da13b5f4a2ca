//! Bit rates

use std::fmt;
use std::str::FromStr;

use evsim_core::{KernelError, Time, TimeUnit};

/// A rate in bits per second
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataRate(u64);

/// `(suffix, bits per unit)`, longest suffixes first
const UNITS: &[(&str, u64)] = &[
    ("Kibps", 1 << 10),
    ("Mibps", 1 << 20),
    ("Gibps", 1 << 30),
    ("KiBps", 8 << 10),
    ("MiBps", 8 << 20),
    ("GiBps", 8 << 30),
    ("Kib/s", 1 << 10),
    ("Mib/s", 1 << 20),
    ("Gib/s", 1 << 30),
    ("KiB/s", 8 << 10),
    ("MiB/s", 8 << 20),
    ("GiB/s", 8 << 30),
    ("kbps", 1_000),
    ("Kbps", 1_000),
    ("Mbps", 1_000_000),
    ("Gbps", 1_000_000_000),
    ("kBps", 8_000),
    ("KBps", 8_000),
    ("MBps", 8_000_000),
    ("GBps", 8_000_000_000),
    ("kb/s", 1_000),
    ("Kb/s", 1_000),
    ("Mb/s", 1_000_000),
    ("Gb/s", 1_000_000_000),
    ("kB/s", 8_000),
    ("KB/s", 8_000),
    ("MB/s", 8_000_000),
    ("GB/s", 8_000_000_000),
    ("bps", 1),
    ("Bps", 8),
    ("b/s", 1),
    ("B/s", 8),
];

impl DataRate {
    pub const fn from_bps(bps: u64) -> Self {
        DataRate(bps)
    }

    #[inline]
    pub fn bit_rate(self) -> u64 {
        self.0
    }

    /// Time needed to send `bytes` at this rate
    pub fn calculate_bytes_tx_time(self, bytes: u64) -> Time {
        self.calculate_bits_tx_time(bytes.saturating_mul(8))
    }

    pub fn calculate_bits_tx_time(self, bits: u64) -> Time {
        if self.0 == 0 {
            return Time::MAX;
        }
        Time::from_f64(bits as f64 / self.0 as f64, TimeUnit::S)
    }
}

impl fmt::Display for DataRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}bps", self.0)
    }
}

impl FromStr for DataRate {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || KernelError::MalformedValue {
            expected: "DataRate".into(),
            value: s.into(),
        };
        let text = s.trim();
        let (number, factor) = UNITS
            .iter()
            .find_map(|(suffix, factor)| text.strip_suffix(suffix).map(|n| (n.trim(), *factor)))
            .ok_or_else(malformed)?;
        if let Ok(v) = number.parse::<u64>() {
            return v.checked_mul(factor).map(DataRate).ok_or_else(malformed);
        }
        let v: f64 = number.parse().map_err(|_| malformed())?;
        if !v.is_finite() || v < 0.0 {
            return Err(malformed());
        }
        Ok(DataRate((v * factor as f64) as u64))
    }
}
