//! Decoding of framed minute buffers into calendar time.
//!
//! A DCF77 minute frame carries the time of the minute that starts at its end marker:
//!
//! | Bits  | Content                                          |
//! |-------|--------------------------------------------------|
//! | 0     | Start of minute, always 0                        |
//! | 1-14  | Third-party channel (see [`crate::thirdparty`])  |
//! | 15    | Transmitter call bit                             |
//! | 16    | Daylight-saving change announcement              |
//! | 17-18 | Daylight-saving state, exactly one bit set       |
//! | 19    | Leap-second announcement                         |
//! | 20    | Start of time, always 1                          |
//! | 21-28 | Minute, BCD with even parity                     |
//! | 29-35 | Hour, BCD with even parity                       |
//! | 36-57 | Day, weekday, month, year-in-century, BCD        |
//! | 58    | Even parity over bits 36-57                      |
//! | 59    | Leap second, only present in announced minutes   |
//!
//! [`TimeDecoder`] holds the running calendar time and validates every frame against it: the
//! clock is advanced by the wall-clock duration of the frame first, and freshly decoded fields
//! are only committed when they are consistent with that prediction. A field that differs from
//! the prediction right after an error-free minute is a reception error with valid parity, so it
//! is rejected once; if the new value persists into the next minute the decoder accepts that the
//! time really changed. Daylight-saving and leap-second announcements are counted across the
//! minutes of an hour and honored at minute 0 only when a majority of error-free minutes carried
//! them, which makes single flipped announcement bits harmless.

use core::ops::RangeInclusive;

use calendar::{add_minute, century_offset, BASE_YEAR, CalendarTime, Dst};

/// Bit positions within a minute frame.
pub mod bits {
	use core::ops::RangeInclusive;

	/// Start of minute, always 0.
	pub const START: usize = 0;
	/// Transmitter call bit (set during transmitter trouble).
	pub const CALL: usize = 15;
	/// Daylight-saving change announcement.
	pub const DST_ANNOUNCE: usize = 16;
	/// Set when the transmitted time is daylight-saving time.
	pub const DST_DAYLIGHT: usize = 17;
	/// Set when the transmitted time is standard time.
	pub const DST_STANDARD: usize = 18;
	/// Leap-second announcement.
	pub const LEAP_ANNOUNCE: usize = 19;
	/// Start of time, always 1.
	pub const TIME_START: usize = 20;
	/// Minute of the hour, BCD.
	pub const MINUTE: RangeInclusive<usize> = 21..=27;
	/// Even parity over [`MINUTE`].
	pub const MINUTE_PARITY: usize = 28;
	/// Hour of the day, BCD.
	pub const HOUR: RangeInclusive<usize> = 29..=34;
	/// Even parity over [`HOUR`].
	pub const HOUR_PARITY: usize = 35;
	/// Day of the month, BCD.
	pub const DAY: RangeInclusive<usize> = 36..=41;
	/// Day of the week, Monday = 1 through Sunday = 7.
	pub const WDAY: RangeInclusive<usize> = 42..=44;
	/// Month of the year, BCD.
	pub const MONTH: RangeInclusive<usize> = 45..=49;
	/// Year within the century, BCD.
	pub const YEAR: RangeInclusive<usize> = 50..=57;
	/// The whole date group covered by [`DATE_PARITY`].
	pub const DATE: RangeInclusive<usize> = 36..=57;
	/// Even parity over [`DATE`].
	pub const DATE_PARITY: usize = 58;
	/// The inserted leap second, transmitted as 0.
	pub const LEAP_SECOND: usize = 59;
}

/// Milliseconds per nominal minute.
const MS_PER_MINUTE: u64 = 60_000;
/// Accumulated leftovers above this count as a whole minute.
const MS_ROUND_UP: u64 = 59_000;

/// Classification of a frame's bit count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MinuteLength {
	/// 59 bits, or 60 in an announced leap-second minute.
	Ok,
	/// Fewer than 59 bits arrived before the minute marker.
	Short,
	/// More than 60 bits, an unannounced 60-bit minute, or no marker at all.
	Long
}

/// Validation result of one time field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldStatus {
	/// Parity and encoding check out and the value matches the running clock.
	Ok,
	/// The bits are not a valid BCD value, or the date is inconsistent.
	BcdError,
	/// The even-parity check failed.
	ParityError,
	/// The value is well formed but contradicts the running clock; rejected once.
	Jumped
}

/// Validation result of the daylight-saving bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DstStatus {
	/// Consistent with the running state.
	Ok,
	/// Bits 17 and 18 are equal, which never occurs in a valid frame.
	Error,
	/// The state flipped without a majority announcement; rejected once.
	Jumped,
	/// An announced transition happened at this minute 0.
	JustChanged
}

/// Leap-second processing state of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeapStatus {
	/// Not a leap-second minute.
	None,
	/// The leap second was processed at this minute 0.
	Processed,
	/// The leap second was transmitted as 1 instead of 0; the frame is suspect.
	OneInsteadOfZero
}

/// Everything the decoder determined about one minute frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeResult {
	/// Bit-count classification, after leap-second reconciliation.
	pub minute_length: MinuteLength,
	/// Bit 0 was 0 as required.
	pub bit0: bool,
	/// Bit 20 was 1 as required.
	pub bit20: bool,
	/// Minute field status.
	pub minute: FieldStatus,
	/// Hour field status.
	pub hour: FieldStatus,
	/// Day-of-month field status.
	pub day: FieldStatus,
	/// Weekday field status.
	pub wday: FieldStatus,
	/// Month field status.
	pub month: FieldStatus,
	/// Year field status, including century inference.
	pub year: FieldStatus,
	/// Daylight-saving status.
	pub dst: DstStatus,
	/// Leap-second status.
	pub leap: LeapStatus,
	/// A daylight-saving change has majority announcement this hour.
	pub dst_announced: bool,
	/// A leap second has majority announcement this hour.
	pub leap_announced: bool,
	/// The transmitter call bit was set in a structurally valid frame.
	pub transmitter_call: bool,
	/// The decoded fields were committed to the running clock.
	pub committed: bool
}

/// Decode a BCD field, least significant bit first.
///
/// The ones digit occupies the first four bits and must not exceed 9; remaining bits count tens.
/// Returns `None` for values that are not valid two-digit BCD.
fn bcd(bits: &[u8]) -> Option<u8> {
	let mut value = 0u8;
	let mut mult = 1u8;
	for &b in bits {
		if mult == 16 {
			if value > 9 {
				return None
			}
			mult = 10;
		}
		value += mult * b;
		mult *= 2;
	}
	if value < 100 { Some(value) } else { None }
}

/// Check even parity of a data range together with its parity bit.
fn parity_ok(buffer: &[u8; 60], data: RangeInclusive<usize>, parity_bit: usize) -> bool {
	buffer[data].iter().fold(buffer[parity_bit], |acc, &b| acc ^ b) == 0
}

/// Validate one field against its parity, value range, and the running clock.
///
/// Returns the status together with the value to use: the decoded value when it is well formed,
/// otherwise the running clock's `current` value.
fn decode_field(
	value: Option<u8>,
	parity: bool,
	range: RangeInclusive<u8>,
	jump_check: bool,
	current: u8
) -> (FieldStatus, u8) {
	if !parity {
		return (FieldStatus::ParityError, current)
	}
	match value {
		Some(v) if range.contains(&v) => {
			if jump_check && v != current {
				(FieldStatus::Jumped, v)
			} else {
				(FieldStatus::Ok, v)
			}
		},
		_ => (FieldStatus::BcdError, current)
	}
}

/// Validates minute frames and maintains the running calendar time.
pub struct TimeDecoder {
	/// Daylight-saving announcements seen in error-free minutes this hour.
	dst_count: u8,
	/// Leap-second announcements seen in error-free minutes this hour.
	leap_count: u8,
	/// Minutes decoded since the last minute 0.
	minutes_counted: u8,
	/// Leftover milliseconds not yet accounted as a whole minute.
	acc_ms: u64,
	/// The previous minute had an error, so a changed value may be the recovery, not a jump.
	old_error: bool,
	/// Minute of the hour the running clock reached, for third-party cycle alignment.
	minute_phase: u8
}

impl TimeDecoder {
	/// Create a decoder with no reference time.
	///
	/// The first decoded minute is accepted without consistency checks since there is nothing
	/// yet to be consistent with.
	pub fn new() -> TimeDecoder {
		TimeDecoder {
			dst_count: 0,
			leap_count: 0,
			minutes_counted: 0,
			acc_ms: 0,
			old_error: true,
			minute_phase: 0
		}
	}

	/// Minute of the hour the running clock reached with the last decoded frame.
	pub fn minute_phase(&self) -> u8 {
		self.minute_phase
	}

	/// Whether a daylight-saving change has majority announcement this hour.
	pub fn dst_announced(&self) -> bool {
		self.dst_count > self.minutes_counted / 2
	}

	/// Decode one completed minute frame.
	///
	/// `startup` is the number of startup minutes remaining; while it is nonzero, decoded values
	/// are accepted without cross-checking against the running clock. `minute_length` and
	/// `duration_ms` come from the framer: the bit count of the frame and its wall-clock
	/// duration including replay gaps. `time` is the running clock, advanced by the elapsed
	/// duration and updated with the decoded fields when they validate.
	pub fn decode(
		&mut self,
		startup: u8,
		minute_length: i8,
		duration_ms: u64,
		buffer: &[u8; 60],
		time: &mut CalendarTime
	) -> DecodeResult {
		let provisional_length = match minute_length {
			59 | 60 => MinuteLength::Ok,
			0..=58 => MinuteLength::Short,
			_ => MinuteLength::Long
		};
		let bit0 = buffer[bits::START] == 0;
		let bit20 = buffer[bits::TIME_START] == 1;
		let dst_bits_valid = buffer[bits::DST_DAYLIGHT] != buffer[bits::DST_STANDARD];
		let structural_ok = provisional_length == MinuteLength::Ok
			&& bit0 && bit20 && dst_bits_valid;

		// Advance the running clock by however many whole minutes really elapsed, before the
		// announcement counters pick up this frame's bits
		let dst_change = self.dst_announced();
		self.acc_ms += duration_ms;
		while self.acc_ms >= MS_PER_MINUTE {
			add_minute(time, dst_change);
			self.acc_ms -= MS_PER_MINUTE;
		}
		if self.acc_ms > MS_ROUND_UP {
			add_minute(time, dst_change);
			self.acc_ms = 0;
		}

		let jump_check = startup == 0 && !self.old_error;

		let (minute_status, minute_val) = decode_field(
			bcd(&buffer[bits::MINUTE]),
			parity_ok(buffer, bits::MINUTE, bits::MINUTE_PARITY),
			0..=59, jump_check, time.minute
		);
		let (hour_status, hour_val) = decode_field(
			bcd(&buffer[bits::HOUR]),
			parity_ok(buffer, bits::HOUR, bits::HOUR_PARITY),
			0..=23, jump_check, time.hour
		);
		let date_parity = parity_ok(buffer, bits::DATE, bits::DATE_PARITY);
		let (day_status, day_val) = decode_field(
			bcd(&buffer[bits::DAY]), date_parity, 1..=31, jump_check, time.day
		);
		let (wday_status, wday_val) = decode_field(
			bcd(&buffer[bits::WDAY]), date_parity, 1..=7, jump_check, time.wday
		);
		let (month_status, month_val) = decode_field(
			bcd(&buffer[bits::MONTH]), date_parity, 1..=12, jump_check, time.month
		);
		let (mut year_status, year2) = decode_field(
			bcd(&buffer[bits::YEAR]), date_parity, 0..=99, jump_check,
			(time.year % 100) as u8
		);
		// The century is inferred from the weekday; without a plausible full date the year
		// cannot be resolved at all
		let mut year_val = time.year;
		if matches!(year_status, FieldStatus::Ok | FieldStatus::Jumped) {
			let date_plausible = matches!(day_status, FieldStatus::Ok | FieldStatus::Jumped)
				&& matches!(wday_status, FieldStatus::Ok | FieldStatus::Jumped)
				&& matches!(month_status, FieldStatus::Ok | FieldStatus::Jumped);
			match date_plausible
				.then(|| century_offset(year2, month_val, day_val, wday_val))
				.flatten()
			{
				Some(c) => year_val = BASE_YEAR + 100 * c as u16 + year2 as u16,
				None => year_status = FieldStatus::BcdError
			}
		}

		// Announcement bits are only trusted in error-free minutes, and honored at minute 0
		// when a majority of the hour's minutes carried them
		let field_error = [minute_status, hour_status, day_status, wday_status, month_status,
		                   year_status].iter()
			.any(|s| matches!(s, FieldStatus::BcdError | FieldStatus::ParityError));
		let error_free = structural_ok && !field_error;
		self.minutes_counted = self.minutes_counted.saturating_add(1);
		if error_free && buffer[bits::DST_ANNOUNCE] == 1 {
			self.dst_count = self.dst_count.saturating_add(1);
		}
		if error_free && buffer[bits::LEAP_ANNOUNCE] == 1 {
			self.leap_count = self.leap_count.saturating_add(1);
		}
		let dst_announced = self.dst_announced();
		let leap_announced = self.leap_count > self.minutes_counted / 2;

		let minute_now = match minute_status {
			FieldStatus::Ok | FieldStatus::Jumped => minute_val,
			_ => time.minute
		};

		// A 60-bit frame is only legitimate as the announced leap-second minute; conversely an
		// announced minute 0 with 59 bits lost its leap second somewhere
		let mut length = provisional_length;
		let mut leap = LeapStatus::None;
		if minute_length == 60 && !(minute_now == 0 && leap_announced) {
			length = MinuteLength::Long;
		}
		if minute_now == 0 && leap_announced {
			if minute_length == 60 {
				leap = if buffer[bits::LEAP_SECOND] == 1 {
					LeapStatus::OneInsteadOfZero
				} else {
					LeapStatus::Processed
				};
			} else {
				length = MinuteLength::Long;
			}
		}

		let observed_dst = if dst_bits_valid {
			Some(if buffer[bits::DST_DAYLIGHT] == 1 { Dst::Daylight } else { Dst::Standard })
		} else {
			None
		};
		let dst_status = match observed_dst {
			None => DstStatus::Error,
			Some(observed) => {
				if time.dst == Dst::Unknown || observed == time.dst {
					DstStatus::Ok
				} else if dst_announced && minute_now == 0 {
					DstStatus::JustChanged
				} else if startup > 0 || self.old_error {
					DstStatus::Ok
				} else {
					DstStatus::Jumped
				}
			}
		};

		if minute_now == 0 {
			self.dst_count = 0;
			self.leap_count = 0;
			self.minutes_counted = 0;
		}

		let committed = length == MinuteLength::Ok && bit0 && bit20
			&& [minute_status, hour_status, day_status, wday_status, month_status, year_status]
				.iter().all(|s| *s == FieldStatus::Ok);
		if committed {
			time.minute = minute_val;
			time.hour = hour_val;
			time.day = day_val;
			time.wday = wday_val;
			time.month = month_val;
			time.year = year_val;
			if let (Some(observed), DstStatus::Ok | DstStatus::JustChanged)
				= (observed_dst, dst_status)
			{
				time.dst = observed;
			}
		}

		self.old_error = !committed
			|| !matches!(dst_status, DstStatus::Ok | DstStatus::JustChanged)
			|| leap == LeapStatus::OneInsteadOfZero;
		self.minute_phase = time.minute;

		DecodeResult {
			minute_length: length,
			bit0,
			bit20,
			minute: minute_status,
			hour: hour_status,
			day: day_status,
			wday: wday_status,
			month: month_status,
			year: year_status,
			dst: dst_status,
			leap,
			dst_announced,
			leap_announced,
			transmitter_call: structural_ok && buffer[bits::CALL] == 1,
			committed
		}
	}
}

impl Default for TimeDecoder {
	fn default() -> TimeDecoder {
		TimeDecoder::new()
	}
}
