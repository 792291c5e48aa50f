//! Strongly typed segment identifier and weekday indexing.
//!
//! `SegmentId` wraps the opaque road-segment key returned by the reverse
//! geocoder.  Weekdays use `chrono::Weekday` with Monday = 0 as the persisted
//! integer form.

use std::fmt;

use chrono::Weekday;

/// Generate a typed ID wrapper around a primitive integer.
macro_rules! typed_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident($inner:ty);) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        $vis struct $name(pub $inner);

        impl $name {
            /// Sentinel meaning "no valid ID".
            pub const INVALID: $name = $name(<$inner>::MAX);
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<$inner> for $name {
            #[inline(always)]
            fn from(n: $inner) -> $name {
                $name(n)
            }
        }
    };
}

typed_id! {
    /// Road-segment key from the reverse geocoder (e.g. an OSM way id).
    pub struct SegmentId(u64);
}

impl SegmentId {
    /// Bit-preserving conversion to SQLite's signed INTEGER.
    #[inline]
    pub fn to_sql(self) -> i64 {
        self.0 as i64
    }

    /// Inverse of [`to_sql`](Self::to_sql).
    #[inline]
    pub fn from_sql(n: i64) -> Self {
        SegmentId(n as u64)
    }
}

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Persisted integer form of a weekday, Monday = 0 … Sunday = 6.
#[inline]
pub fn weekday_index(day: Weekday) -> u8 {
    day.num_days_from_monday() as u8
}

/// Inverse of [`weekday_index`]; `None` outside `0..=6`.
#[inline]
pub fn weekday_from_index(index: u8) -> Option<Weekday> {
    WEEKDAYS.get(index as usize).copied()
}
