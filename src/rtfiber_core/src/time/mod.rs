//! Overflow-aware time arithmetic modeling hardware timer wraparound.
//!
//! See [`Tick`], [`Duration`], and [`TimePoint`] for the three layered
//! types: a raw wrapping counter, a counter tagged with a real-world period,
//! and a duration anchored to an (unspecified) epoch.
mod duration;
mod tick;
mod timepoint;

pub use duration::{duration_cast, Duration, Rounding};
#[cfg(feature = "chrono")]
pub use duration::TryFromChronoDurationError;
pub use tick::{Tick, TickRep};
#[cfg(feature = "chrono")]
pub use timepoint::TryFromDateTimeError;
pub use timepoint::TimePoint;

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    type T1023 = Tick<u16, 1023>;

    /// S1 from spec §8.3.
    #[test]
    fn s1_tick_comparison_across_wrap() {
        assert!(T1023::new(900) < T1023::new(20));
        assert!(!(T1023::new(400) < T1023::new(999)));
        assert!(T1023::new(1) > T1023::new(1023));
    }

    #[test]
    fn natural_wraparound_u8() {
        type TFull = Tick<u8, 255>;
        let a = TFull::new(250);
        let b = TFull::new(10);
        assert_eq!((a + b).get(), 4);
    }

    #[test]
    fn power_of_two_modulo() {
        type T255 = Tick<u16, 255>;
        let a = T255::new(200);
        let b = T255::new(100);
        assert_eq!((a + b).get(), 44);
    }

    #[test]
    fn arbitrary_modulo() {
        type T999 = Tick<u16, 999>;
        let a = T999::new(998);
        let b = T999::new(5);
        // 998 + 5 = 1003; modulo 1000 => 3
        assert_eq!((a + b).get(), 3);
    }

    #[test]
    fn negation_wraps() {
        type T1023Neg = Tick<u16, 1023>;
        let a = T1023Neg::new(1);
        assert_eq!((-a).get(), 1023);
        assert_eq!((-T1023Neg::ZERO).get(), 0);
    }

    type Micros = Duration<u32, { u32::MAX as u128 }, 1, 1_000_000>;
    type Millis = Duration<u32, { u32::MAX as u128 }, 1, 1_000>;

    #[test]
    fn duration_cast_down_truncates() {
        let micros = Micros::from_ticks(Tick::new(1_500));
        let millis: Millis = duration_cast(micros, Rounding::Down);
        assert_eq!(millis.ticks().get(), 1);
    }

    #[test]
    fn duration_cast_nearest_rounds() {
        let micros = Micros::from_ticks(Tick::new(1_500));
        let millis: Millis = duration_cast(micros, Rounding::Nearest);
        assert_eq!(millis.ticks().get(), 2);
    }

    #[test]
    fn duration_cast_round_trip_when_lossless() {
        let millis = Millis::from_ticks(Tick::new(7));
        let micros: Micros = duration_cast(millis, Rounding::Down);
        let back: Millis = duration_cast(micros, Rounding::Down);
        assert_eq!(millis, back);
    }

    type Ticks1023 = TimePoint<u16, 1023, 1, 1000>;

    #[test]
    fn timepoint_subtraction_yields_duration() {
        let t1 = Ticks1023::from_duration_since_epoch(Duration::from_ticks(Tick::new(10)));
        let t2 = Ticks1023::from_duration_since_epoch(Duration::from_ticks(Tick::new(30)));
        let d = t2 - t1;
        assert_eq!(d.ticks().get(), 20);
    }

    #[cfg(feature = "chrono")]
    #[test]
    fn chrono_duration_round_trips_through_nanos() {
        type NanoDur = Duration<u64, { u64::MAX as u128 }, 1, 1_000_000_000>;

        let chrono_d = chrono_0p4::Duration::nanoseconds(123_456);
        let ours: NanoDur = chrono_d.try_into().unwrap();
        assert_eq!(ours.ticks().get(), 123_456);

        let back: chrono_0p4::Duration = ours.into();
        assert_eq!(back, chrono_d);
    }

    #[cfg(feature = "chrono")]
    #[test]
    fn chrono_negative_duration_is_rejected() {
        type NanoDur = Duration<u64, { u64::MAX as u128 }, 1, 1_000_000_000>;
        let chrono_d = chrono_0p4::Duration::nanoseconds(-1);
        assert!(NanoDur::try_from(chrono_d).is_err());
    }

    #[cfg(feature = "chrono")]
    #[test]
    fn chrono_datetime_round_trips_through_timepoint() {
        use chrono_0p4::TimeZone;

        type NanoTp = TimePoint<u64, { u64::MAX as u128 }, 1, 1_000_000_000>;

        let dt = chrono_0p4::Utc.timestamp_opt(1_000, 500).single().unwrap();
        let tp = NanoTp::try_from(dt).unwrap();
        let back = chrono_0p4::DateTime::<chrono_0p4::Utc>::try_from(tp).unwrap();
        assert_eq!(back, dt);
    }

    /// Spec §8.1: `a + b - b == a` under wraparound, for any two ticks.
    #[quickcheck]
    fn tick_add_then_sub_round_trips(x: u16, y: u16) -> bool {
        let a = T1023::new(x);
        let b = T1023::new(y);
        a + b - b == a
    }

    /// Spec §8.1/§8.2's half-range comparison law: `cmp` is a strict total
    /// order (trichotomy) and antisymmetric, for any two ticks in range.
    #[quickcheck]
    fn tick_half_range_ord_is_antisymmetric(x: u16, y: u16) -> bool {
        let a = T1023::new(x);
        let b = T1023::new(y);
        a.cmp(&b) == b.cmp(&a).reverse()
    }

    /// A lossless period conversion (to a finer unit and back) is its own
    /// inverse, for any tick value.
    #[quickcheck]
    fn duration_cast_round_trips_when_lossless(x: u16) -> bool {
        let millis = Millis::from_ticks(Tick::new(x as u32 % 1000));
        let micros: Micros = duration_cast(millis, Rounding::Down);
        let back: Millis = duration_cast(micros, Rounding::Down);
        millis == back
    }
}
