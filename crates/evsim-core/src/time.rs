//! Virtual time for the simulation kernel
//!
//! A [`Time`] is a signed 64-bit count of ticks of the current resolution
//! unit. The resolution belongs to the kernel context: it may change freely
//! until the first unit-aware time value is built or the first event is
//! scheduled, and is frozen from then on. Operations between two `Time`
//! values are exact integer arithmetic; conversions from real quantities
//! truncate toward zero.

use std::cell::Cell;
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Rem, Sub, SubAssign};
use std::str::FromStr;

use crate::{KernelError, KernelResult};

/// Units a time value can be expressed in
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimeUnit {
    /// 365-day year
    Y,
    D,
    H,
    Min,
    S,
    Ms,
    Us,
    Ns,
    Ps,
    Fs,
}

impl TimeUnit {
    /// All units, coarsest first
    pub const ALL: [TimeUnit; 10] = [
        TimeUnit::Y,
        TimeUnit::D,
        TimeUnit::H,
        TimeUnit::Min,
        TimeUnit::S,
        TimeUnit::Ms,
        TimeUnit::Us,
        TimeUnit::Ns,
        TimeUnit::Ps,
        TimeUnit::Fs,
    ];

    /// Length of one unit in femtoseconds
    #[inline]
    pub fn femtos(self) -> i128 {
        const S: i128 = 1_000_000_000_000_000;
        match self {
            TimeUnit::Y => 365 * 86_400 * S,
            TimeUnit::D => 86_400 * S,
            TimeUnit::H => 3_600 * S,
            TimeUnit::Min => 60 * S,
            TimeUnit::S => S,
            TimeUnit::Ms => S / 1_000,
            TimeUnit::Us => S / 1_000_000,
            TimeUnit::Ns => S / 1_000_000_000,
            TimeUnit::Ps => 1_000,
            TimeUnit::Fs => 1,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            TimeUnit::Y => "y",
            TimeUnit::D => "d",
            TimeUnit::H => "h",
            TimeUnit::Min => "min",
            TimeUnit::S => "s",
            TimeUnit::Ms => "ms",
            TimeUnit::Us => "us",
            TimeUnit::Ns => "ns",
            TimeUnit::Ps => "ps",
            TimeUnit::Fs => "fs",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "y" => Some(TimeUnit::Y),
            "d" => Some(TimeUnit::D),
            "h" => Some(TimeUnit::H),
            "min" => Some(TimeUnit::Min),
            "s" => Some(TimeUnit::S),
            "ms" => Some(TimeUnit::Ms),
            "us" | "µs" => Some(TimeUnit::Us),
            "ns" => Some(TimeUnit::Ns),
            "ps" => Some(TimeUnit::Ps),
            "fs" => Some(TimeUnit::Fs),
            _ => None,
        }
    }

    /// Whether this unit may serve as the global resolution
    #[inline]
    pub fn is_resolution(self) -> bool {
        self >= TimeUnit::S
    }

    /// Digits printed after the decimal point by the default time printer
    fn printer_precision(self) -> usize {
        match self {
            TimeUnit::Us => 6,
            TimeUnit::Ns => 9,
            TimeUnit::Ps => 12,
            TimeUnit::Fs => 15,
            _ => 5,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

thread_local! {
    static RESOLUTION: Cell<TimeUnit> = const { Cell::new(TimeUnit::Ns) };
    static FROZEN: Cell<bool> = const { Cell::new(false) };
}

/// Current resolution unit of the kernel context
#[inline]
pub fn resolution() -> TimeUnit {
    RESOLUTION.with(|r| r.get())
}

/// Select the resolution unit.
///
/// Succeeds until the resolution is frozen; re-selecting the current unit
/// always succeeds.
pub fn set_resolution(unit: TimeUnit) -> KernelResult<()> {
    if !unit.is_resolution() {
        return Err(KernelError::MalformedValue {
            expected: "resolution unit (s, ms, us, ns, ps, fs)".into(),
            value: unit.symbol().into(),
        });
    }
    if unit == resolution() {
        return Ok(());
    }
    if is_resolution_frozen() {
        return Err(KernelError::ResolutionFrozen);
    }
    RESOLUTION.with(|r| r.set(unit));
    Ok(())
}

/// Freeze the resolution; called on unit-aware construction and scheduling
#[inline]
pub fn freeze_resolution() {
    FROZEN.with(|f| f.set(true));
}

#[inline]
pub fn is_resolution_frozen() -> bool {
    FROZEN.with(|f| f.get())
}

/// Restore the default resolution (ns) and unfreeze it. Part of a kernel reset.
pub fn reset_resolution() {
    RESOLUTION.with(|r| r.set(TimeUnit::Ns));
    FROZEN.with(|f| f.set(false));
}

#[inline]
fn clamp_ticks(v: i128) -> i64 {
    v.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Virtual time, in ticks of the current resolution
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Time(i64);

impl Time {
    pub const ZERO: Time = Time(0);
    pub const MAX: Time = Time(i64::MAX);
    pub const MIN: Time = Time(i64::MIN);

    /// Build from a raw tick count of the current resolution
    #[inline]
    pub fn from_ticks(ticks: i64) -> Self {
        freeze_resolution();
        Time(ticks)
    }

    /// Build from an integer quantity of `unit`, truncating toward zero
    pub fn from_integer(value: i64, unit: TimeUnit) -> Self {
        freeze_resolution();
        let ticks = value as i128 * unit.femtos() / resolution().femtos();
        Time(clamp_ticks(ticks))
    }

    /// Build from a real quantity of `unit`, truncating toward zero
    pub fn from_f64(value: f64, unit: TimeUnit) -> Self {
        freeze_resolution();
        let factor = unit.femtos() as f64 / resolution().femtos() as f64;
        let ticks = (value * factor).trunc();
        if ticks.is_nan() {
            return Time::ZERO;
        }
        Time(clamp_ticks(ticks as i128))
    }

    #[inline]
    pub fn years(v: f64) -> Self {
        Self::from_f64(v, TimeUnit::Y)
    }

    #[inline]
    pub fn days(v: f64) -> Self {
        Self::from_f64(v, TimeUnit::D)
    }

    #[inline]
    pub fn hours(v: f64) -> Self {
        Self::from_f64(v, TimeUnit::H)
    }

    #[inline]
    pub fn minutes(v: f64) -> Self {
        Self::from_f64(v, TimeUnit::Min)
    }

    #[inline]
    pub fn seconds(v: f64) -> Self {
        Self::from_f64(v, TimeUnit::S)
    }

    #[inline]
    pub fn millis(v: i64) -> Self {
        Self::from_integer(v, TimeUnit::Ms)
    }

    #[inline]
    pub fn micros(v: i64) -> Self {
        Self::from_integer(v, TimeUnit::Us)
    }

    #[inline]
    pub fn nanos(v: i64) -> Self {
        Self::from_integer(v, TimeUnit::Ns)
    }

    #[inline]
    pub fn picos(v: i64) -> Self {
        Self::from_integer(v, TimeUnit::Ps)
    }

    #[inline]
    pub fn femtos(v: i64) -> Self {
        Self::from_integer(v, TimeUnit::Fs)
    }

    /// Raw tick count
    #[inline]
    pub fn ticks(self) -> i64 {
        self.0
    }

    /// Integer quantity of `unit`, truncated toward zero
    pub fn to_integer(self, unit: TimeUnit) -> i64 {
        clamp_ticks(self.0 as i128 * resolution().femtos() / unit.femtos())
    }

    pub fn to_f64(self, unit: TimeUnit) -> f64 {
        self.0 as f64 * (resolution().femtos() as f64 / unit.femtos() as f64)
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.to_f64(TimeUnit::S)
    }

    #[inline]
    pub fn as_millis(self) -> i64 {
        self.to_integer(TimeUnit::Ms)
    }

    #[inline]
    pub fn as_micros(self) -> i64 {
        self.to_integer(TimeUnit::Us)
    }

    #[inline]
    pub fn as_nanos(self) -> i64 {
        self.to_integer(TimeUnit::Ns)
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// `true` for zero as well
    #[inline]
    pub fn is_positive(self) -> bool {
        self.0 >= 0
    }

    /// `true` for zero as well
    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 <= 0
    }

    #[inline]
    pub fn is_strictly_positive(self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub fn is_strictly_negative(self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub fn abs(self) -> Self {
        Time(self.0.saturating_abs())
    }

    #[inline]
    pub fn saturating_add(self, rhs: Time) -> Self {
        Time(self.0.saturating_add(rhs.0))
    }

    #[inline]
    pub fn saturating_sub(self, rhs: Time) -> Self {
        Time(self.0.saturating_sub(rhs.0))
    }

    #[inline]
    pub fn checked_add(self, rhs: Time) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Time)
    }

    /// Printer expressing this time in a fixed unit, e.g. `+1.5s`
    pub fn as_unit(self, unit: TimeUnit) -> TimeWithUnit {
        TimeWithUnit { time: self, unit }
    }

    /// Seconds with a precision matched to the resolution, e.g.
    /// `+5.000000000s` at nanosecond resolution. Used as the default log
    /// time prefix.
    pub fn format_seconds(self) -> String {
        const FS_PER_S: i128 = 1_000_000_000_000_000;
        let res = resolution();
        let precision = res.printer_precision();
        let femtos = self.0 as i128 * res.femtos();
        let sign = if femtos < 0 { '-' } else { '+' };
        let femtos = femtos.abs();
        let whole = femtos / FS_PER_S;
        let frac = (femtos % FS_PER_S) / 10i128.pow(15 - precision as u32);
        format!("{sign}{whole}.{frac:0precision$}s")
    }
}

impl Add for Time {
    type Output = Time;

    #[inline]
    fn add(self, rhs: Time) -> Time {
        Time(self.0 + rhs.0)
    }
}

impl Sub for Time {
    type Output = Time;

    #[inline]
    fn sub(self, rhs: Time) -> Time {
        Time(self.0 - rhs.0)
    }
}

impl AddAssign for Time {
    #[inline]
    fn add_assign(&mut self, rhs: Time) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Time {
    #[inline]
    fn sub_assign(&mut self, rhs: Time) {
        self.0 -= rhs.0;
    }
}

impl Neg for Time {
    type Output = Time;

    #[inline]
    fn neg(self) -> Time {
        Time(-self.0)
    }
}

impl Mul<i64> for Time {
    type Output = Time;

    #[inline]
    fn mul(self, rhs: i64) -> Time {
        Time(self.0 * rhs)
    }
}

impl Div<i64> for Time {
    type Output = Time;

    #[inline]
    fn div(self, rhs: i64) -> Time {
        Time(self.0 / rhs)
    }
}

impl Div<Time> for Time {
    type Output = i64;

    #[inline]
    fn div(self, rhs: Time) -> i64 {
        self.0 / rhs.0
    }
}

impl Rem<Time> for Time {
    type Output = Time;

    #[inline]
    fn rem(self, rhs: Time) -> Time {
        Time(self.0 % rhs.0)
    }
}

impl fmt::Debug for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Time({})", self)
    }
}

/// `+<ticks><resolution>`; parses back exactly through [`FromStr`]
impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}{}", self.0, resolution().symbol())
    }
}

impl FromStr for Time {
    type Err = KernelError;

    /// Accepts `<number><unit>`; a bare number is taken as seconds.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || KernelError::MalformedValue {
            expected: "Time".into(),
            value: s.into(),
        };
        let text = s.trim();
        if text.is_empty() {
            return Err(malformed());
        }

        // Longest symbols first so "ms" is not read as "m" + "s"
        const SUFFIXES: [&str; 11] = ["min", "ms", "us", "µs", "ns", "ps", "fs", "s", "h", "d", "y"];
        let (number, unit) = SUFFIXES
            .iter()
            .find_map(|sym| {
                text.strip_suffix(sym)
                    .and_then(|n| TimeUnit::from_symbol(sym).map(|u| (n, u)))
            })
            .unwrap_or((text, TimeUnit::S));

        if let Ok(v) = number.parse::<i64>() {
            return Ok(Time::from_integer(v, unit));
        }
        let v: f64 = number.parse().map_err(|_| malformed())?;
        if !v.is_finite() {
            return Err(malformed());
        }
        Ok(Time::from_f64(v, unit))
    }
}

/// A time bound to a display unit
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeWithUnit {
    pub time: Time,
    pub unit: TimeUnit,
}

impl fmt::Display for TimeWithUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}{}", self.time.to_f64(self.unit), self.unit.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_resolution_is_nanoseconds() {
        assert_eq!(resolution(), TimeUnit::Ns);
        assert_eq!(Time::seconds(5.0).ticks(), 5_000_000_000);
    }

    #[test]
    fn test_resolution_freezes_on_construction() {
        reset_resolution();
        assert!(set_resolution(TimeUnit::Us).is_ok());
        let _t = Time::millis(3);
        assert_eq!(set_resolution(TimeUnit::Ps), Err(KernelError::ResolutionFrozen));
        // Same unit is not a change
        assert!(set_resolution(TimeUnit::Us).is_ok());
        reset_resolution();
    }

    #[test]
    fn test_rejects_coarse_resolution() {
        assert!(set_resolution(TimeUnit::Min).is_err());
    }

    #[test]
    fn test_real_quantities_truncate() {
        reset_resolution();
        set_resolution(TimeUnit::Us).unwrap();
        assert_eq!(Time::nanos(1500).ticks(), 1);
        assert_eq!(Time::nanos(-1500).ticks(), -1);
        assert_eq!(Time::seconds(0.1).ticks(), 100_000);
        reset_resolution();
    }

    #[test]
    fn test_conversion_rounds_toward_zero() {
        let t = Time::nanos(2_999_999);
        assert_eq!(t.to_integer(TimeUnit::Ms), 2);
        assert_eq!((-t).to_integer(TimeUnit::Ms), -2);
        assert_eq!(Time::hours(1.0).to_integer(TimeUnit::Min), 60);
    }

    #[test]
    fn test_exact_arithmetic() {
        let a = Time::millis(1500);
        let b = Time::micros(250);
        assert_eq!((a + b).ticks(), 1_500_250_000);
        assert_eq!((a - b).ticks(), 1_499_750_000);
        assert_eq!(a / b, 6000);
        assert_eq!((a * 2).as_millis(), 3000);
        assert!(-a < Time::ZERO);
    }

    #[test]
    fn test_default_printer_precision() {
        assert_eq!(Time::seconds(5.0).format_seconds(), "+5.000000000s");
        assert_eq!(Time::millis(-1500).format_seconds(), "-1.500000000s");
    }

    #[test]
    fn test_parse_units() {
        assert_eq!("100ms".parse::<Time>().unwrap(), Time::millis(100));
        assert_eq!("1.5us".parse::<Time>().unwrap(), Time::nanos(1500));
        assert_eq!("2".parse::<Time>().unwrap(), Time::seconds(2.0));
        assert_eq!("1e-3s".parse::<Time>().unwrap(), Time::millis(1));
        assert_eq!("+5000000000ns".parse::<Time>().unwrap(), Time::seconds(5.0));
        assert!("12parsecs".parse::<Time>().is_err());
        assert!("".parse::<Time>().is_err());
    }

    #[test]
    fn test_display_with_unit() {
        assert_eq!(Time::millis(1500).as_unit(TimeUnit::S).to_string(), "+1.5s");
        assert_eq!(Time::millis(3).to_string(), "+3000000ns");
    }

    proptest! {
        #[test]
        fn prop_display_parse_roundtrip(ticks in any::<i64>()) {
            let t = Time::from_ticks(ticks);
            let back: Time = t.to_string().parse().unwrap();
            prop_assert_eq!(back, t);
        }

        #[test]
        fn prop_ordering_matches_ticks(a in any::<i64>(), b in any::<i64>()) {
            prop_assert_eq!(Time::from_ticks(a) < Time::from_ticks(b), a < b);
        }
    }
}
