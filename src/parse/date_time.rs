use chrono::{
    offset::{Local, TimeZone, Utc},
    DateTime, Datelike, FixedOffset, NaiveDateTime, Timelike,
};
use std::fmt;
use winnow::{binary::le_u16, seq, PResult, Parser, Partial};

/// ZIP timestamps are quantized to 2 seconds on disk; every comparison made
/// for reproducibility purposes happens at this granularity.
const DOS_QUANTUM_MILLIS: i64 = 2_000;

/// A timestamp in MS-DOS format
///
/// Represents dates from year 1980 to 2107, with 2 second precision. The
/// on-disk encoding is the writing machine's local wall-clock time, so
/// converting to or from a UTC instant requires a [DosZone].
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct MsdosTimestamp {
    /// Packed seconds/2, minute, hour
    pub time: u16,
    /// Packed day, month, year-since-1980
    pub date: u16,
}

impl fmt::Debug for MsdosTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.to_wall_clock() {
            Some(dt) => write!(f, "MsdosTimestamp({})", dt),
            None => write!(f, "MsdosTimestamp(?)"),
        }
    }
}

impl MsdosTimestamp {
    /// Parse an MS-DOS timestamp from a byte slice
    pub fn parser(i: &mut Partial<&'_ [u8]>) -> PResult<Self> {
        seq! {Self {
            time: le_u16,
            date: le_u16,
        }}
        .parse_next(i)
    }

    /// Rebuild a timestamp from the 4 bytes stored at LOCTIM/CENTIM.
    pub fn from_bytes(b: [u8; 4]) -> Self {
        Self {
            time: u16::from_le_bytes([b[0], b[1]]),
            date: u16::from_le_bytes([b[2], b[3]]),
        }
    }

    /// The 4 bytes as they appear on disk: time first, then date, both
    /// little-endian.
    pub fn to_bytes(self) -> [u8; 4] {
        let t = self.time.to_le_bytes();
        let d = self.date.to_le_bytes();
        [t[0], t[1], d[0], d[1]]
    }

    /// Decode the packed fields as a wall-clock date and time.
    ///
    /// Returns `None` for fields that do not form a valid date, notably the
    /// all-zero "no time" sentinel.
    pub fn to_wall_clock(self) -> Option<NaiveDateTime> {
        // see https://docs.microsoft.com/en-us/windows/win32/api/winbase/nf-winbase-dosdatetimetofiletime
        // bits 0-4: day of the month (1-31)
        let d = (self.date & 0b1_1111) as u32;
        // bits 5-8: month (1 = january, 2 = february and so on)
        let m = ((self.date >> 5) & 0b1111) as u32;
        // bits 9-15: year offset from 1980
        let y = ((self.date >> 9) + 1980) as i32;

        // bits 0-4: second divided by 2
        let s = (self.time & 0b1_1111) as u32 * 2;
        // bits 5-10: minute (0-59)
        let min = (self.time >> 5 & 0b11_1111) as u32;
        // bits 11-15: hour (0-23 on a 24-hour clock)
        let h = (self.time >> 11) as u32;

        chrono::NaiveDate::from_ymd_opt(y, m, d)?.and_hms_opt(h, min, s)
    }

    /// Encode a wall-clock date and time, flooring seconds to the DOS
    /// 2-second resolution. `None` when the year is outside 1980..=2107.
    pub fn from_wall_clock(wall: NaiveDateTime) -> Option<Self> {
        let year = wall.year();
        if !(1980..=2107).contains(&year) {
            return None;
        }
        let date = (((year - 1980) as u16) << 9) | ((wall.month() as u16) << 5) | wall.day() as u16;
        let time =
            ((wall.hour() as u16) << 11) | ((wall.minute() as u16) << 5) | (wall.second() as u16 / 2);
        Some(Self { time, date })
    }

    /// Resolve to a UTC instant through the given zone ("unpack").
    pub fn to_utc(self, zone: DosZone) -> Option<DateTime<Utc>> {
        zone.from_wall_clock(self.to_wall_clock()?)
    }

    /// Encode a UTC instant through the given zone ("pack").
    ///
    /// `unpack(pack(t))` equals [round_down_to_dos_quantum]`(t)` for every
    /// representable `t`.
    pub fn from_utc(utc: DateTime<Utc>, zone: DosZone) -> Option<Self> {
        Self::from_wall_clock(zone.to_wall_clock(utc))
    }
}

/// The wall-clock zone used to interpret DOS timestamps.
///
/// Historical ZIP writers store the writing machine's local time, so both
/// directions of the conversion need a zone. [DosZone::Local] matches what
/// those writers do on this host; [DosZone::Fixed] produces bit-identical
/// output on any host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DosZone {
    /// The process-default local zone.
    #[default]
    Local,

    /// A fixed offset from UTC.
    Fixed(FixedOffset),
}

impl DosZone {
    /// UTC, as a fixed offset. Handy for deterministic pipelines.
    pub fn utc() -> Self {
        Self::Fixed(FixedOffset::east_opt(0).unwrap())
    }

    fn to_wall_clock(self, utc: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Self::Local => utc.with_timezone(&Local).naive_local(),
            Self::Fixed(offset) => utc.with_timezone(&offset).naive_local(),
        }
    }

    /// Ambiguous wall-clock times (DST fold) resolve to the earliest
    /// instant; nonexistent ones (DST gap) resolve to `None`.
    fn from_wall_clock(self, wall: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            Self::Local => Local
                .from_local_datetime(&wall)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            Self::Fixed(offset) => offset
                .from_local_datetime(&wall)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

/// Floor an instant to the 2-second DOS quantum.
pub fn round_down_to_dos_quantum(t: DateTime<Utc>) -> DateTime<Utc> {
    let millis = t.timestamp_millis().div_euclid(DOS_QUANTUM_MILLIS) * DOS_QUANTUM_MILLIS;
    Utc.timestamp_millis_opt(millis).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone() -> DosZone {
        // UTC+2, no DST surprises
        DosZone::Fixed(FixedOffset::east_opt(2 * 3600).unwrap())
    }

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn round_trip_is_quantum_floor() {
        for s in [
            "1980-01-01T00:00:00Z",
            "2023-09-07T01:38:34Z",
            "2023-09-07T01:38:35Z",
            "2023-12-31T23:59:59Z",
            "2107-06-15T12:00:01Z",
        ] {
            let t = utc(s);
            let packed = MsdosTimestamp::from_utc(t, zone()).unwrap();
            assert_eq!(
                packed.to_utc(zone()).unwrap(),
                round_down_to_dos_quantum(t),
                "round trip for {s}"
            );
        }
    }

    #[test]
    fn odd_seconds_share_a_packing() {
        let a = MsdosTimestamp::from_utc(utc("2023-09-07T01:38:34Z"), zone()).unwrap();
        let b = MsdosTimestamp::from_utc(utc("2023-09-07T01:38:35Z"), zone()).unwrap();
        assert_eq!(a, b);
        let c = MsdosTimestamp::from_utc(utc("2023-09-07T01:38:36Z"), zone()).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn quantum_floors_never_rounds_up() {
        assert_eq!(
            round_down_to_dos_quantum(utc("2023-09-07T01:38:35Z")),
            utc("2023-09-07T01:38:34Z")
        );
        assert_eq!(
            round_down_to_dos_quantum(utc("2023-09-07T01:38:34Z")),
            utc("2023-09-07T01:38:34Z")
        );
    }

    #[test]
    fn out_of_dos_range() {
        assert!(MsdosTimestamp::from_utc(utc("1979-12-31T21:00:00Z"), zone()).is_none());
        assert!(MsdosTimestamp::from_utc(utc("2108-01-01T02:00:00Z"), zone()).is_none());
    }

    #[test]
    fn no_time_sentinel() {
        let sentinel = MsdosTimestamp { time: 0, date: 0 };
        assert!(sentinel.to_wall_clock().is_none());
        assert!(sentinel.to_utc(zone()).is_none());
    }

    #[test]
    fn byte_order_is_time_then_date() {
        let ts = MsdosTimestamp {
            time: 0x1234,
            date: 0x5678,
        };
        assert_eq!(ts.to_bytes(), [0x34, 0x12, 0x78, 0x56]);
        assert_eq!(MsdosTimestamp::from_bytes(ts.to_bytes()), ts);
    }

    #[test]
    fn zone_offset_shifts_the_wall_clock() {
        let t = utc("2023-09-07T01:38:34Z");
        let packed = MsdosTimestamp::from_utc(t, zone()).unwrap();
        let wall = packed.to_wall_clock().unwrap();
        assert_eq!(wall.hour(), 3);
        assert_eq!(wall.minute(), 38);
    }
}
