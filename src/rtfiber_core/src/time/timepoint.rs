//! A [`Duration`] measured from an unspecified epoch.
use core::fmt;
use core::ops;

use super::duration::Duration;
use super::tick::TickRep;
use crate::utils::Init;

/// An instant in time, relative to whatever epoch the host's `now()` hook
/// uses. Only differences between two `TimePoint`s (a [`Duration`]) are
/// meaningful; the epoch itself is never observed.
///
/// `t2 - t1` wraps and compares the same way [`Tick`](super::tick::Tick)
/// does: beyond half the representable range a difference is ambiguous by
/// construction, which is exactly the behavior a free-running hardware
/// counter exhibits and exactly what spec §3.1 calls "signed-semantics
/// distance under half-range ordering".
#[derive(Clone, Copy)]
pub struct TimePoint<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> {
    since_epoch: Duration<U, MAX, NUM, DEN>,
}

impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> TimePoint<U, MAX, NUM, DEN> {
    pub const ZERO: Self = Self {
        since_epoch: Duration::ZERO,
    };

    #[inline]
    pub fn from_duration_since_epoch(d: Duration<U, MAX, NUM, DEN>) -> Self {
        Self { since_epoch: d }
    }

    #[inline]
    pub fn duration_since_epoch(self) -> Duration<U, MAX, NUM, DEN> {
        self.since_epoch
    }
}

impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> Init
    for TimePoint<U, MAX, NUM, DEN>
{
    const INIT: Self = Self::ZERO;
}

impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> PartialEq
    for TimePoint<U, MAX, NUM, DEN>
{
    fn eq(&self, other: &Self) -> bool {
        self.since_epoch == other.since_epoch
    }
}
impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> Eq
    for TimePoint<U, MAX, NUM, DEN>
{
}
impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> PartialOrd
    for TimePoint<U, MAX, NUM, DEN>
{
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        self.since_epoch.partial_cmp(&other.since_epoch)
    }
}
impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> Ord
    for TimePoint<U, MAX, NUM, DEN>
{
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.since_epoch.cmp(&other.since_epoch)
    }
}

/// `t1 - t2`: the (wrapped, half-range) duration between two time points.
impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> ops::Sub
    for TimePoint<U, MAX, NUM, DEN>
{
    type Output = Duration<U, MAX, NUM, DEN>;
    fn sub(self, rhs: Self) -> Duration<U, MAX, NUM, DEN> {
        self.since_epoch - rhs.since_epoch
    }
}

/// `t + d`: advances a time point by a duration of the same period.
impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> ops::Add<Duration<U, MAX, NUM, DEN>>
    for TimePoint<U, MAX, NUM, DEN>
{
    type Output = Self;
    fn add(self, rhs: Duration<U, MAX, NUM, DEN>) -> Self {
        Self::from_duration_since_epoch(self.since_epoch + rhs)
    }
}

impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> fmt::Debug
    for TimePoint<U, MAX, NUM, DEN>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimePoint({:?})", self.since_epoch)
    }
}

/// Error type returned when a checked `TimePoint`/`chrono` conversion fails.
#[cfg(feature = "chrono")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TryFromDateTimeError(());

/// Host-side interop (spec §10.1's `chrono` feature), grounded on the
/// teacher's own `TryFrom<chrono_0p4::DateTime<Utc>> for Time` /
/// `TryFrom<Time> for chrono_0p4::DateTime<Utc>` pair. Treats a
/// `TimePoint`'s epoch as the Unix epoch purely for the purpose of this
/// conversion — spec §3.1 leaves the epoch host-defined, so a host whose
/// `now()` hook isn't actually wall-clock-anchored shouldn't enable this
/// feature.
#[cfg(feature = "chrono")]
impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64>
    TryFrom<chrono_0p4::DateTime<chrono_0p4::Utc>> for TimePoint<U, MAX, NUM, DEN>
{
    type Error = TryFromDateTimeError;

    fn try_from(value: chrono_0p4::DateTime<chrono_0p4::Utc>) -> Result<Self, Self::Error> {
        if value.timestamp() < 0 {
            return Err(TryFromDateTimeError(()));
        }
        let nanos = chrono_0p4::Duration::seconds(value.timestamp())
            + chrono_0p4::Duration::nanoseconds(value.timestamp_subsec_nanos() as i64);
        let d = Duration::<U, MAX, NUM, DEN>::try_from(nanos).map_err(|_| TryFromDateTimeError(()))?;
        Ok(Self::from_duration_since_epoch(d))
    }
}

#[cfg(feature = "chrono")]
impl<U: TickRep, const MAX: u128, const NUM: u64, const DEN: u64> TryFrom<TimePoint<U, MAX, NUM, DEN>>
    for chrono_0p4::DateTime<chrono_0p4::Utc>
{
    type Error = TryFromDateTimeError;

    fn try_from(value: TimePoint<U, MAX, NUM, DEN>) -> Result<Self, Self::Error> {
        use chrono_0p4::TimeZone;
        let nanos: chrono_0p4::Duration = value.since_epoch.into();
        let secs = nanos.num_seconds();
        let sub_nanos = (nanos - chrono_0p4::Duration::seconds(secs)).num_nanoseconds().unwrap_or(0);
        chrono_0p4::Utc
            .timestamp_opt(secs, sub_nanos as u32)
            .single()
            .ok_or(TryFromDateTimeError(()))
    }
}
