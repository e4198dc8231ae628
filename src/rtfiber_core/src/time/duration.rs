//! A [`Tick`] tagged with a rational period relative to one second.
use core::fmt;
use core::ops;

use super::tick::{Tick, TickRep};
use crate::utils::Init;

/// Rounding policy for [`duration_cast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Round toward positive infinity.
    Up,
    /// Round toward zero (truncate).
    Down,
    /// Round to the nearest representable value, ties rounding up.
    Nearest,
}

/// A span of time expressed as a count of ticks of period `NUM/DEN` seconds.
///
/// `Duration<U, MAX, NUM, DEN>` reuses [`Tick`]'s overflow-aware arithmetic:
/// a duration measured in, say, 1 ms units with an 8-bit counter wraps
/// around every 256 ms exactly the way the underlying hardware timer would.
/// The period is carried at the type level (`NUM` ticks per `DEN` seconds)
/// so conversions between periods are explicit, checked casts rather than
/// implicit lossy ones — spec §4.1 forbids the latter.
#[derive(Clone, Copy)]
pub struct Duration<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> {
    ticks: Tick<U, MAX>,
}

impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> Duration<U, MAX, NUM, DEN> {
    pub const ZERO: Self = Self {
        ticks: Tick::ZERO,
    };

    #[inline]
    pub fn from_ticks(ticks: Tick<U, MAX>) -> Self {
        Self { ticks }
    }

    #[inline]
    pub fn ticks(self) -> Tick<U, MAX> {
        self.ticks
    }

    /// Numerator of this duration's period, in seconds, as `NUM/DEN`.
    pub const PERIOD_NUM: u64 = NUM;
    /// Denominator of this duration's period, in seconds, as `NUM/DEN`.
    pub const PERIOD_DEN: u64 = DEN;
}

impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> Init
    for Duration<U, MAX, NUM, DEN>
{
    const INIT: Self = Self::ZERO;
}

impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> PartialEq
    for Duration<U, MAX, NUM, DEN>
{
    fn eq(&self, other: &Self) -> bool {
        self.ticks == other.ticks
    }
}
impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> Eq
    for Duration<U, MAX, NUM, DEN>
{
}

impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> PartialOrd
    for Duration<U, MAX, NUM, DEN>
{
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        self.ticks.partial_cmp(&other.ticks)
    }
}
impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> Ord
    for Duration<U, MAX, NUM, DEN>
{
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.ticks.cmp(&other.ticks)
    }
}

impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> ops::Add
    for Duration<U, MAX, NUM, DEN>
{
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::from_ticks(self.ticks + rhs.ticks)
    }
}
impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> ops::Sub
    for Duration<U, MAX, NUM, DEN>
{
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::from_ticks(self.ticks - rhs.ticks)
    }
}

impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> fmt::Debug
    for Duration<U, MAX, NUM, DEN>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Duration({:?} x {}/{}s)", self.ticks, NUM, DEN)
    }
}

/// Converts a duration from period `NUM1/DEN1` to period `NUM2/DEN2`,
/// rounding according to `rounding`.
///
/// The conversion factor is `(NUM1 * DEN2) / (DEN1 * NUM2)`. Intermediate
/// arithmetic is carried out in `u128` to avoid overflow for reasonable
/// period ratios; the result is folded back into the target `Tick` via
/// [`Tick::new`], which wraps exactly like any other tick arithmetic.
///
/// This is the only sanctioned way to change a duration's period — spec
/// §4.1 calls implicit lossy conversion forbidden.
pub fn duration_cast<
    U1: TickRep,
    const MAX1: u128,
    const NUM1: u64,
    const DEN1: u64,
    U2: TickRep,
    const MAX2: u128,
    const NUM2: u64,
    const DEN2: u64,
>(
    d: Duration<U1, MAX1, NUM1, DEN1>,
    rounding: Rounding,
) -> Duration<U2, MAX2, NUM2, DEN2> {
    let x = d.ticks.get().as_u128();
    let num = NUM1 as u128 * DEN2 as u128;
    let den = DEN1 as u128 * NUM2 as u128;

    let result = match rounding {
        Rounding::Up => (x * num + (den - 1)) / den,
        Rounding::Down => (x * num) / den,
        Rounding::Nearest => (x * num + den / 2) / den,
    };

    Duration::from_ticks(Tick::new(U2::from_u128(result)))
}

/// The error returned by [`Duration`]'s `TryFrom<chrono_0p4::Duration>`
/// impl when the source value doesn't fit.
#[cfg(feature = "chrono")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TryFromChronoDurationError(());

#[cfg(feature = "chrono")]
impl fmt::Display for TryFromChronoDurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chrono duration out of range for this tick representation")
    }
}

/// Host-side interop for test traces that want wall-clock-correlated
/// output (spec §10.1's `chrono` feature) — never used by the scheduling
/// hot path. Grounded on the teacher's own
/// `impl TryFrom<chrono_0p4::Duration> for Duration` /
/// `impl From<Duration> for chrono_0p4::Duration` pair, generalized from a
/// fixed microsecond representation to this crate's const-generic period.
///
/// `rtfiber`'s `Duration` is an unsigned wraparound quantity (spec §4.1), so
/// unlike the teacher's signed `Duration`, a negative `chrono_0p4::Duration`
/// has no representation here and is rejected.
#[cfg(feature = "chrono")]
impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> TryFrom<chrono_0p4::Duration>
    for Duration<U, MAX, NUM, DEN>
{
    type Error = TryFromChronoDurationError;

    fn try_from(value: chrono_0p4::Duration) -> Result<Self, Self::Error> {
        let nanos = value
            .num_nanoseconds()
            .ok_or(TryFromChronoDurationError(()))?;
        let nanos: u128 = nanos
            .try_into()
            .map_err(|_| TryFromChronoDurationError(()))?;
        let ticks = nanos
            .checked_mul(DEN as u128)
            .and_then(|x| x.checked_div(NUM as u128 * 1_000_000_000))
            .ok_or(TryFromChronoDurationError(()))?;
        Ok(Self::from_ticks(Tick::new(U::from_u128(ticks))))
    }
}

#[cfg(feature = "chrono")]
impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> From<Duration<U, MAX, NUM, DEN>>
    for chrono_0p4::Duration
{
    fn from(value: Duration<U, MAX, NUM, DEN>) -> Self {
        let nanos = value.ticks.get().as_u128() * NUM as u128 * 1_000_000_000 / DEN as u128;
        chrono_0p4::Duration::nanoseconds(nanos as i64)
    }
}
