//! Fixed-width little-endian field encoders and the two SMB1 time formats.
//!
//! The offset-based readers and writers do no bounds checking: callers size
//! the buffer first. Use [`crate::protocol::wire`] when the input is untrusted.

/// Milliseconds between 1601-01-01 (FILETIME epoch) and 1970-01-01.
pub const MILLISECONDS_BETWEEN_1970_AND_1601: i64 = 11_644_473_600_000;

const ONE_HOUR_MILLIS: i64 = 3_600_000;
const UTIME_NONE: u32 = 0xFFFF_FFFF;

pub fn bytes_to_u16(bytes: &[u8]) -> u16 {
    (bytes[0] as u16) | ((bytes[1] as u16) << 8)
}

pub fn u16_to_bytes(num: u16) -> [u8; 2] {
    [(num & 0xFF) as u8, ((num >> 8) & 0xFF) as u8]
}

pub fn bytes_to_u32(bytes: &[u8]) -> u32 {
    (bytes[0] as u32) |
    ((bytes[1] as u32) << 8) |
    ((bytes[2] as u32) << 16) |
    ((bytes[3] as u32) << 24)
}

pub fn u32_to_bytes(num: u32) -> [u8; 4] {
    [
        (num & 0xFF) as u8,
        ((num >> 8) & 0xFF) as u8,
        ((num >> 16) & 0xFF) as u8,
        ((num >> 24) & 0xFF) as u8,
    ]
}

pub fn bytes_to_u64(bytes: &[u8]) -> u64 {
    (bytes_to_u32(&bytes[0..4]) as u64) | ((bytes_to_u32(&bytes[4..8]) as u64) << 32)
}

pub fn u64_to_bytes(num: u64) -> [u8; 8] {
    let low = u32_to_bytes(num as u32);
    let high = u32_to_bytes((num >> 32) as u32);
    [low[0], low[1], low[2], low[3], high[0], high[1], high[2], high[3]]
}

pub fn read_u16(src: &[u8], index: usize) -> u16 {
    bytes_to_u16(&src[index..])
}

pub fn read_u32(src: &[u8], index: usize) -> u32 {
    bytes_to_u32(&src[index..])
}

pub fn read_u64(src: &[u8], index: usize) -> u64 {
    bytes_to_u64(&src[index..])
}

pub fn write_u16(value: u16, dst: &mut [u8], index: usize) {
    dst[index..index + 2].copy_from_slice(&u16_to_bytes(value));
}

pub fn write_u32(value: u32, dst: &mut [u8], index: usize) {
    dst[index..index + 4].copy_from_slice(&u32_to_bytes(value));
}

pub fn write_u64(value: u64, dst: &mut [u8], index: usize) {
    dst[index..index + 8].copy_from_slice(&u64_to_bytes(value));
}

/// FILETIME (100ns ticks since 1601) to Unix milliseconds. A zero FILETIME
/// means "not set" and stays zero.
pub fn filetime_to_millis(ticks: u64) -> i64 {
    if ticks == 0 {
        return 0;
    }
    (ticks / 10_000) as i64 - MILLISECONDS_BETWEEN_1970_AND_1601
}

pub fn millis_to_filetime(millis: i64) -> u64 {
    if millis == 0 {
        return 0;
    }
    ((millis + MILLISECONDS_BETWEEN_1970_AND_1601).max(0) as u64) * 10_000
}

pub fn read_time(src: &[u8], index: usize) -> i64 {
    filetime_to_millis(read_u64(src, index))
}

pub fn write_time(millis: i64, dst: &mut [u8], index: usize) {
    write_u64(millis_to_filetime(millis), dst, index);
}

/// Daylight saving rule of the zone the legacy UTime fields are expressed in.
pub trait LocalTimeZone {
    fn in_daylight_time(&self, millis: i64) -> bool;
}

/// A zone without daylight saving.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NoDaylightSaving;

impl LocalTimeZone for NoDaylightSaving {
    fn in_daylight_time(&self, _millis: i64) -> bool {
        false
    }
}

impl<F: Fn(i64) -> bool> LocalTimeZone for F {
    fn in_daylight_time(&self, millis: i64) -> bool {
        self(millis)
    }
}

/// UTime (seconds since 1970) to milliseconds. Both `0` and `0xFFFFFFFF`
/// read as `0`, the unset value [`write_utime`] turns back into
/// `0xFFFFFFFF`.
pub fn read_utime(src: &[u8], index: usize) -> i64 {
    match read_u32(src, index) {
        0 | UTIME_NONE => 0,
        seconds => seconds as i64 * 1000,
    }
}

/// Writes `millis` as UTime, shifting by an hour when `now` and `millis` sit
/// on different sides of a daylight saving boundary.
pub fn write_utime<Z: LocalTimeZone + ?Sized>(millis: i64, now: i64, zone: &Z, dst: &mut [u8], index: usize) {
    write_u32(utime_from_millis(millis, now, zone), dst, index);
}

pub fn utime_from_millis<Z: LocalTimeZone + ?Sized>(millis: i64, now: i64, zone: &Z) -> u32 {
    if millis == 0 || millis == -1 {
        return UTIME_NONE;
    }
    let corrected = match (zone.in_daylight_time(now), zone.in_daylight_time(millis)) {
        (true, false) => millis - ONE_HOUR_MILLIS,
        (false, true) => millis + ONE_HOUR_MILLIS,
        _ => millis,
    };
    (corrected / 1000) as u32
}

/// The negotiate response carries the server zone as minutes in a signed
/// 16-bit field; values read unsigned need two's-complement correction.
pub fn timezone_from_raw(raw: u16) -> i16 {
    if raw > i16::MAX as u16 {
        (raw as i32 - 65536) as i16
    } else {
        raw as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_written_little_endian_at_offset() {
        let mut buffer = [0_u8; 16];
        write_u16(0xBEEF, &mut buffer, 1);
        write_u32(0x01020304, &mut buffer, 3);
        write_u64(0x1122334455667788, &mut buffer, 7);
        assert_eq!(&buffer[1..3], &[0xEF, 0xBE]);
        assert_eq!(&buffer[3..7], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(read_u16(&buffer, 1), 0xBEEF);
        assert_eq!(read_u32(&buffer, 3), 0x01020304);
        assert_eq!(read_u64(&buffer, 7), 0x1122334455667788);
    }

    #[test]
    fn high_bytes_of_u64_survive() {
        let bytes = u64_to_bytes(0xFF00_0000_0000_0000);
        assert_eq!(bytes[7], 0xFF);
        assert_eq!(bytes_to_u64(&bytes), 0xFF00_0000_0000_0000);
    }

    /// MS-DTYP 2.3.3: 1970-01-01 is 116444736000000000 ticks.
    #[test]
    fn filetime_epoch_offset() {
        assert_eq!(filetime_to_millis(116_444_736_000_000_000), 0);
        assert_eq!(millis_to_filetime(1_000), 116_444_736_010_000_000);
        assert_eq!(filetime_to_millis(0), 0);
        assert_eq!(millis_to_filetime(0), 0);
    }

    #[test]
    fn time_round_trips_at_millisecond_precision() {
        let mut buffer = [0_u8; 8];
        write_time(1_700_000_000_123, &mut buffer, 0);
        assert_eq!(read_time(&buffer, 0), 1_700_000_000_123);
    }

    #[test]
    fn utime_none_is_all_ones() {
        let mut buffer = [0_u8; 4];
        write_utime(0, 1, &NoDaylightSaving, &mut buffer, 0);
        assert_eq!(buffer, [0xFF; 4]);
        assert_eq!(read_utime(&buffer, 0), 0);
        assert_eq!(read_utime(&[0; 4], 0), 0);
        assert_eq!(read_utime(&[0x01, 0, 0, 0], 0), 1000);
    }

    #[test]
    fn utime_shifts_across_daylight_boundary() {
        let summer = |millis: i64| millis >= 1_000_000_000;
        // now in daylight time, value is not: one hour earlier
        assert_eq!(utime_from_millis(500_000_000, 2_000_000_000, &summer), (500_000_000 - 3_600_000) / 1000);
        // now standard, value in daylight: one hour later
        assert_eq!(utime_from_millis(1_500_000_000, 0, &summer), (1_500_000_000 + 3_600_000) / 1000);
        assert_eq!(utime_from_millis(1_500_000_000, 2_000_000_000, &summer), 1_500_000);
    }

    #[test]
    fn timezone_correction_is_twos_complement() {
        assert_eq!(timezone_from_raw(0xFE20), -480);
        assert_eq!(timezone_from_raw(300), 300);
        assert_eq!(timezone_from_raw(0x8000), i16::MIN);
        assert_eq!(timezone_from_raw(0xFFFF), -1);
    }
}
