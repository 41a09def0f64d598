//! Calendar arithmetic for the DCF77 400-year cyclic epoch.
//!
//! This crate provides the pure date/time arithmetic used by the decoder: leap-year and
//! month-length rules, minute increment/decrement with daylight-saving adjustment, inference of
//! the century within the repeating 400-year epoch, and conversions between the signal's field
//! convention and a host calendar representation.
//!
//! The signal transmits a two-digit year, so the absolute year is only known modulo 100. The
//! Gregorian calendar repeats exactly every 400 years, which makes the weekday the tie breaker:
//! for a given two-digit year, month, day and weekday there is exactly one consistent century
//! within the epoch (see [`century_offset`]). All arithmetic in this crate wraps at the epoch
//! boundary rather than extending past it.
//!
//! # Examples
//!
//! ```
//! # use calendar::{CalendarTime, Dst, add_minute};
//! let mut time = CalendarTime {
//! 	year: 2024, month: 6, day: 15, wday: 6, hour: 9, minute: 59, dst: Dst::Daylight
//! };
//! add_minute(&mut time, false);
//! assert_eq!(time.hour, 10);
//! assert_eq!(time.minute, 0);
//! ```

#![no_std]

#[cfg(feature = "now")]
use core::mem::MaybeUninit;
#[cfg(feature = "now")]
use libc::{timespec, clock_gettime, CLOCK_REALTIME};

/// First year of the cyclic 400-year epoch.
///
/// All [`CalendarTime`] years are interpreted within `[BASE_YEAR, BASE_YEAR + 399]`; minute
/// arithmetic wraps around at the epoch boundary.
pub const BASE_YEAR: u16 = 2000;

/// Number of years in the epoch.
pub const YEARS_PER_ERA: u16 = 400;

/// Seconds per minute.
const SECONDS_PER_MINUTE: i64 = 60;
/// Seconds per hour.
const SECONDS_PER_HOUR: i64 = SECONDS_PER_MINUTE * 60;
/// Seconds per day.
const SECONDS_PER_DAY: i64 = SECONDS_PER_HOUR * 24;
/// Days per non-leap year.
const DAYS_PER_NON_LEAP_YEAR: i64 = 365;
/// Leap years occur every 4 years...
const YEARS_PER_LEAP_YEAR_1: i64 = 4;
/// ... except every 100, unless it's the end of the era.
const YEARS_PER_LEAP_YEAR_2: i64 = 100;
/// Number of days every era (400 years).
const DAYS_PER_ERA: i64 = 400 * DAYS_PER_NON_LEAP_YEAR + 100 - 4 + 1;
/// Days from January 1 to February 28, inclusive.
const DAYS_FROM_JAN_TO_FEB: i64 = 31 + 28;
/// Days from March 1, 0000 to January 1, 1970.
const DAYS_FROM_JAN_1970_TO_MARCH_0000: i64 = (1970 / 400) * DAYS_PER_ERA
                                            + (1970 % 400) * DAYS_PER_NON_LEAP_YEAR
                                            + (1970 % 400) / YEARS_PER_LEAP_YEAR_1
                                            - (1970 % 400) / YEARS_PER_LEAP_YEAR_2
                                            - DAYS_FROM_JAN_TO_FEB;
/// Years to add to [`Tm::year`][Tm#structfield.year] to get the absolute Gregorian year.
pub const YEAR_ADJUST: i64 = 1900;

/// Cumulative days before the start of each month in a leap year.
const DAYS_BEFORE_MONTH: [u16; 12] = [0, 31, 60, 91, 121, 152, 182, 213, 244, 274, 305, 335];

/// Daylight-saving state of a calendar time.
///
/// The decoder starts out with [`Dst::Unknown`] until the first error-free minute fixes the
/// state. [`Dst::Utc`] tags times that have been converted out of broadcast local time by
/// [`to_utc`] so they cannot be mistaken for local times.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dst {
	/// Standard time (CET, UTC+1).
	Standard,
	/// Daylight-saving time (CEST, UTC+2).
	Daylight,
	/// Not yet determined from the signal.
	Unknown,
	/// Converted to UTC, no local offset remaining.
	Utc
}

/// Date and time in the signal's field convention.
///
/// Months are 1-based, the weekday follows the DCF77 wire convention (Monday = 1 through
/// Sunday = 7), and the year is the absolute year within the cyclic epoch. A freshly constructed
/// [`CalendarTime::default`] is all zeros with [`Dst::Unknown`]; the decoder replaces the fields
/// as soon as a valid frame arrives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CalendarTime {
	/// Absolute year, ranged `[BASE_YEAR, BASE_YEAR + 399]` once valid.
	pub year: u16,
	/// Month of the year, ranged [1, 12] once valid.
	pub month: u8,
	/// Day of the month, ranged [1, 31] once valid.
	pub day: u8,
	/// Day of the week, ranged [1, 7] => [Monday, Sunday] once valid.
	pub wday: u8,
	/// Hours, ranged [0, 23].
	pub hour: u8,
	/// Minutes, ranged [0, 59].
	pub minute: u8,
	/// Daylight-saving state.
	pub dst: Dst
}

impl Default for CalendarTime {
	fn default() -> CalendarTime {
		CalendarTime {
			year: 0,
			month: 0,
			day: 0,
			wday: 0,
			hour: 0,
			minute: 0,
			dst: Dst::Unknown
		}
	}
}

/// Check whether a given `year` is a leap year.
///
/// # Examples
///
/// ```
/// # use calendar::is_leap_year;
/// assert_eq!(is_leap_year(1900), false);
/// assert_eq!(is_leap_year(2000), true);
/// assert_eq!(is_leap_year(2023), false);
/// assert_eq!(is_leap_year(2024), true);
/// ```
#[inline(always)]
pub fn is_leap_year(year: u16) -> bool {
	let l = if year % 100 != 0 { 3 } else { 15 };
	(year & l) == 0
}

/// The last day of a given month, ranged [28, 31].
///
/// `year` must be the absolute Gregorian year, and `month` the 1-indexed month starting at
/// January.
pub fn last_day_of_month(year: u16, month: u8) -> u8 {
	// Details: https://www.youtube.com/watch?v=J9KijLyP-yg&t=1470s
	if month == 2 {
		if is_leap_year(year) { 29 } else { 28 }
	} else {
		30 | (month ^ (month >> 3))
	}
}

/// Get the weekday (0-6 => Sunday-Saturday) for a given year, month, and day.
///
/// `year` must be the absolute Gregorian year, `month` the 1-indexed month starting at January,
/// and `day` the day of the month.
///
/// # Examples
///
/// ```
/// # use calendar::wday_from_ymd;
/// assert_eq!(wday_from_ymd(2024, 1, 1), 1);   // Monday
/// assert_eq!(wday_from_ymd(2024, 2, 29), 4);  // Thursday
/// assert_eq!(wday_from_ymd(2024, 10, 27), 0); // Sunday
/// ```
pub fn wday_from_ymd(year: u16, month: u8, day: u8) -> u8 {
	// The linear equation for the number of days prior to month m works on the Jan-Dec year,
	// with January and February handled separately to dodge the leap day.
	//
	// More details: https://arxiv.org/pdf/2102.06959
	let factor = if month < 3 {
		3 * month.wrapping_sub(1) as i64
	} else {
		(153 * month as i64 - 447) / 5
	};
	let y = if month < 3 { year.wrapping_sub(1) as i64 } else { year as i64 };
	((
		y
		+ y / YEARS_PER_LEAP_YEAR_1
		- y / YEARS_PER_LEAP_YEAR_2
		+ y / YEARS_PER_ERA as i64
		+ factor
		+ day as i64
	) % 7) as u8
}

/// Infer which century of the epoch a transmitted date belongs to.
///
/// The signal only carries a two-digit year, but together with the transmitted weekday the
/// century within the 400-year epoch is unambiguous. `year2` is the two-digit year, `month` and
/// `day` are 1-based, and `wday` uses the wire convention (Monday = 1 through Sunday = 7).
///
/// Returns the century offset (0 to 3 centuries after [`BASE_YEAR`]), or `None` if no century is
/// consistent with the weekday, which signals a corrupt or ambiguous date.
///
/// # Examples
///
/// ```
/// # use calendar::century_offset;
/// // June 15, 2024 is a Saturday
/// assert_eq!(century_offset(24, 6, 15, 6), Some(0));
/// // ... so claiming it is a Thursday matches June 15, 2124 instead
/// assert_eq!(century_offset(24, 6, 15, 4), Some(1));
/// // ... and a nonexistent date matches nothing
/// assert_eq!(century_offset(24, 2, 30, 6), None);
/// ```
pub fn century_offset(year2: u8, month: u8, day: u8, wday: u8) -> Option<u8> {
	if year2 > 99 || !(1..=12).contains(&month) || !(1..=7).contains(&wday) {
		return None
	}
	for c in 0..4u8 {
		let year = BASE_YEAR + 100 * c as u16 + year2 as u16;
		if day < 1 || day > last_day_of_month(year, month) {
			continue
		}
		// Wire convention counts Sunday as 7, wday_from_ymd as 0
		if wday_from_ymd(year, month, day) == wday % 7 {
			return Some(c)
		}
	}
	None
}

/// Advance `time` by one hour, rolling over day, month, and year as needed.
///
/// The year wraps from `BASE_YEAR + 399` back to [`BASE_YEAR`]: the epoch is cyclic, not
/// absolute.
fn increase_hour(time: &mut CalendarTime) {
	time.hour += 1;
	if time.hour < 24 {
		return
	}
	time.hour = 0;
	time.wday = if time.wday >= 7 { 1 } else { time.wday + 1 };
	time.day += 1;
	if time.day <= last_day_of_month(time.year, time.month) {
		return
	}
	time.day = 1;
	time.month += 1;
	if time.month <= 12 {
		return
	}
	time.month = 1;
	time.year += 1;
	if time.year == BASE_YEAR + YEARS_PER_ERA {
		time.year = BASE_YEAR;
	}
}

/// Move `time` back by one hour, rolling under day, month, and year as needed.
///
/// The year wraps from `BASE_YEAR - 1` to `BASE_YEAR + 399`.
fn decrease_hour(time: &mut CalendarTime) {
	if time.hour > 0 {
		time.hour -= 1;
		return
	}
	time.hour = 23;
	time.wday = if time.wday <= 1 { 7 } else { time.wday - 1 };
	if time.day > 1 {
		time.day -= 1;
		return
	}
	if time.month > 1 {
		time.month -= 1;
	} else {
		time.month = 12;
		time.year = if time.year == BASE_YEAR {
			BASE_YEAR + YEARS_PER_ERA - 1
		} else {
			time.year.wrapping_sub(1)
		};
	}
	time.day = last_day_of_month(time.year, time.month);
}

/// Advance `time` by one minute.
///
/// If `dst_change` is set and the minute rolls over into a new hour, the hour is additionally
/// adjusted for the daylight-saving transition: entering daylight-saving time skips an hour,
/// leaving it repeats one. The direction is taken from the current [`CalendarTime::dst`] flag,
/// which this function does not modify; updating the flag itself is the decoder's job.
///
/// # Examples
///
/// ```
/// # use calendar::{CalendarTime, Dst, add_minute};
/// let mut time = CalendarTime {
/// 	year: 2024, month: 3, day: 31, wday: 7, hour: 1, minute: 59, dst: Dst::Standard
/// };
/// // 01:59 CET rolls over to 03:00 CEST on the last Sunday of March
/// add_minute(&mut time, true);
/// assert_eq!((time.hour, time.minute), (3, 0));
/// ```
pub fn add_minute(time: &mut CalendarTime, dst_change: bool) {
	time.minute += 1;
	if time.minute < 60 {
		return
	}
	time.minute = 0;
	let hours = match (dst_change, time.dst) {
		(true, Dst::Daylight) => 0, // fall back, the hour repeats
		(true, _) => 2,             // spring forward, an hour is skipped
		(false, _) => 1
	};
	for _ in 0..hours {
		increase_hour(time);
	}
}

/// Move `time` back by one minute; the exact inverse of [`add_minute`].
///
/// As with [`add_minute`], the daylight-saving direction is taken from the current
/// [`CalendarTime::dst`] flag, so subtracting a minute that was just added with the same
/// `dst_change` flag restores every field.
pub fn subtract_minute(time: &mut CalendarTime, dst_change: bool) {
	if time.minute > 0 {
		time.minute -= 1;
		return
	}
	time.minute = 59;
	let hours = match (dst_change, time.dst) {
		(true, Dst::Daylight) => 0,
		(true, _) => 2,
		(false, _) => 1
	};
	for _ in 0..hours {
		decrease_hour(time);
	}
}

/// Convert broadcast local time to UTC.
///
/// Subtracts one hour for standard time or two for daylight-saving time and tags the result with
/// [`Dst::Utc`]. Returns `None` when the daylight-saving state is not yet known, since the local
/// offset is then undefined.
///
/// # Examples
///
/// ```
/// # use calendar::{CalendarTime, Dst, to_utc};
/// let local = CalendarTime {
/// 	year: 2024, month: 6, day: 15, wday: 6, hour: 0, minute: 30, dst: Dst::Daylight
/// };
/// let utc = to_utc(&local).unwrap();
/// assert_eq!((utc.day, utc.hour, utc.minute), (14, 22, 30));
/// assert_eq!(utc.dst, Dst::Utc);
/// ```
pub fn to_utc(time: &CalendarTime) -> Option<CalendarTime> {
	let hours = match time.dst {
		Dst::Standard => 1,
		Dst::Daylight => 2,
		Dst::Unknown | Dst::Utc => return None
	};
	let mut utc = *time;
	utc.dst = Dst::Utc;
	for _ in 0..hours {
		decrease_hour(&mut utc);
	}
	Some(utc)
}

/// Gregorian calendar date in the host convention, similar to `libc::tm`.
///
/// Key differences from `libc::tm`:
/// - `mon` is [0, 11] in `libc::tm` but [1, 12] here.
/// - `yday` is [0, 365] in `libc::tm` but [1, 366] here.
/// - `year` is `u16` so the full cyclic epoch (through 2399) is representable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tm {
	/// Minutes, ranged [0, 59].
	pub min: u8,
	/// Hours, ranged [0, 23].
	pub hour: u8,
	/// Day of the month, ranged [1, 31].
	pub day: u8,
	/// Month of the year, ranged [1, 12].
	pub mon: u8,
	/// Years since 1900.
	pub year: u16,
	/// Day of the week, ranged [0, 6] => [Sunday, Saturday].
	pub wday: u8,
	/// Day of the year, ranged [1, 366].
	pub yday: u16
}

impl CalendarTime {
	/// Convert to the host calendar convention.
	///
	/// Computes the day of year, adjusting for the missing leap day in non-leap Februaries, and
	/// maps the weekday from the wire convention (Sunday = 7) to the host convention
	/// (Sunday = 0). Returns `None` when the fields are not a valid date, including years before
	/// 1900 which cannot be expressed as an offset.
	pub fn to_tm(&self) -> Option<Tm> {
		if self.year < YEAR_ADJUST as u16
			|| !(1..=12).contains(&self.month)
			|| self.day < 1 || self.day > last_day_of_month(self.year, self.month)
			|| !(1..=7).contains(&self.wday)
			|| self.hour > 23 || self.minute > 59
		{
			return None
		}
		let mut yday = DAYS_BEFORE_MONTH[self.month as usize - 1] + self.day as u16;
		if self.month > 2 && !is_leap_year(self.year) {
			yday -= 1;
		}
		Some(Tm {
			min: self.minute,
			hour: self.hour,
			day: self.day,
			mon: self.month,
			year: self.year - YEAR_ADJUST as u16,
			wday: self.wday % 7,
			yday
		})
	}

	/// Convert from the host calendar convention.
	///
	/// The daylight-saving state is set to [`Dst::Unknown`] since the host representation does
	/// not carry it.
	pub fn from_tm(tm: &Tm) -> CalendarTime {
		CalendarTime {
			year: tm.year + YEAR_ADJUST as u16,
			month: tm.mon,
			day: tm.day,
			wday: if tm.wday == 0 { 7 } else { tm.wday },
			hour: tm.hour,
			minute: tm.min,
			dst: Dst::Unknown
		}
	}
}

/// Get the Unix timestamp for a given host calendar time, interpreted as UTC.
///
/// This is the pure-function counterpart of `timegm`. `tm.wday` and `tm.yday` are ignored.
///
/// # Examples
///
/// ```
/// # use calendar::{Tm, timestamp_from_tm};
/// let tm = Tm { min: 0, hour: 0, day: 29, mon: 2, year: 124, wday: 4, yday: 60 };
/// assert_eq!(timestamp_from_tm(&tm), 1709164800);
/// ```
pub fn timestamp_from_tm(tm: &Tm) -> i64 {
	// The Gregorian calendar repeats every 400 years. Rotating the year to Mar-Feb puts the leap
	// day last, which makes the day arithmetic branchless.
	//
	// More details: http://howardhinnant.github.io/date_algorithms.html#days_from_civil
	let y = if tm.mon < 3 { tm.year as i64 + YEAR_ADJUST - 1 } else { tm.year as i64 + YEAR_ADJUST };
	let era = y / 400;
	let yoe = y - era * 400;
	let m2 = if tm.mon > 2 { tm.mon as i64 - 3 } else { tm.mon as i64 + 9 };
	let doy = (153 * m2 + 2) / 5 + tm.day as i64 - 1;
	let doe = yoe * DAYS_PER_NON_LEAP_YEAR
			+ yoe / YEARS_PER_LEAP_YEAR_1
			- yoe / YEARS_PER_LEAP_YEAR_2
			+ doy;
	SECONDS_PER_DAY * (era * DAYS_PER_ERA + doe - DAYS_FROM_JAN_1970_TO_MARCH_0000)
		+ SECONDS_PER_HOUR * tm.hour as i64
		+ SECONDS_PER_MINUTE * tm.min as i64
}

/// Unix time with nanosecond granularity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeSpec {
	/// Seconds since the Unix epoch.
	pub sec: i64,
	/// Nanoseconds since the beginning of `sec`, ranged [0, 999999999].
	pub nsec: i64
}

#[cfg(feature = "now")]
impl From<timespec> for TimeSpec {
	/// Convert from `libc::timespec` to [`TimeSpec`] for better ergonomics.
	fn from(value: timespec) -> Self {
		TimeSpec {
			sec: value.tv_sec,
			nsec: value.tv_nsec
		}
	}
}

/// Get the current time as a Unix timestamp with nanosecond granularity.
///
/// This function will return `None` if `libc::clock_gettime` fails.
#[cfg(feature = "now")]
pub fn now() -> Option<TimeSpec> {
	let mut time = MaybeUninit::<timespec>::uninit();
	// Safety:
	// - clock_gettime does not read time, only writes
	// - if clock_gettime returns zero, time is successfully initialized
	unsafe {
		match clock_gettime(CLOCK_REALTIME, time.as_mut_ptr()) {
			0 => Some(time.assume_init().into()),
			_ => None
		}
	}
}
