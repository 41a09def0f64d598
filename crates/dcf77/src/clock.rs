//! Gating and applying decoded time to a host clock.
//!
//! Setting the host clock is the one irreversible action of the pipeline, so it happens only
//! when a decoded minute is beyond suspicion: [`is_safe`] demands a flawless decode result, a
//! marker at exactly the expected position, and clean reception of the final bit. The actual
//! conversion and system call live behind the [`ClockApplier`] trait so the decision logic stays
//! testable without touching the real clock.

use calendar::{timestamp_from_tm, to_utc, BASE_YEAR, CalendarTime, TimeSpec};

use crate::decode::{DecodeResult, DstStatus, FieldStatus, LeapStatus, MinuteLength};
use crate::{BitSymbol, BitValue, HardwareStatus, MinuteMarker};

/// Subsecond offset applied to set instants, compensating the marker detection delay.
const SET_DELAY_NSEC: i64 = 50_000_000;

/// Outcome of a clock-set attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockStatus {
	/// The clock was set.
	Ok,
	/// The decoded time could not be converted to a host instant.
	InvalidTime,
	/// The host refused to set the clock.
	SetFailed,
	/// The gate refused; nothing was attempted.
	Unsafe
}

/// Per-minute clock decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockDecision {
	/// The gate considered this minute safe to apply.
	pub safe: bool,
	/// What happened.
	pub status: ClockStatus
}

/// Host clock access.
pub trait ClockApplier {
	/// The host's local-minus-UTC offset in seconds, or `None` if the host clock cannot be
	/// read.
	fn utc_offset(&mut self) -> Option<i64>;

	/// Set the host clock. Returns whether the host accepted.
	fn set(&mut self, time: TimeSpec) -> bool;
}

/// Decide whether a decoded minute is trustworthy enough to set the clock from.
///
/// `last_bit` is the final data symbol received before the minute marker; a reception problem
/// that late makes the whole frame suspect even when all checks passed.
pub fn is_safe(
	startup: u8,
	result: &DecodeResult,
	marker: MinuteMarker,
	last_bit: &BitSymbol
) -> bool {
	startup == 0
		&& marker == MinuteMarker::MinuteEnd
		&& result.bit0 && result.bit20
		&& result.minute_length == MinuteLength::Ok
		&& [result.minute, result.hour, result.day, result.wday, result.month, result.year]
			.iter().all(|s| *s == FieldStatus::Ok)
		&& matches!(result.dst, DstStatus::Ok | DstStatus::JustChanged)
		&& result.leap != LeapStatus::OneInsteadOfZero
		&& !last_bit.io_error
		&& last_bit.value != BitValue::Unknown
		&& last_bit.hardware == HardwareStatus::Ok
}

/// Apply a decoded local time to the host clock.
///
/// The decoded time is broadcast German civil time. On a host with a local offset the civil
/// fields are interpreted in the host's zone and shifted back by that offset; on a host running
/// UTC the broadcast daylight-saving offset is applied instead. Years before [`BASE_YEAR`] mark
/// replayed historic logs and are never applied.
pub fn apply(time: &CalendarTime, applier: &mut dyn ClockApplier) -> ClockDecision {
	let status = apply_status(time, applier);
	ClockDecision { safe: true, status }
}

fn apply_status(time: &CalendarTime, applier: &mut dyn ClockApplier) -> ClockStatus {
	if time.year < BASE_YEAR {
		return ClockStatus::InvalidTime
	}
	let Some(offset) = applier.utc_offset() else {
		return ClockStatus::InvalidTime
	};
	let sec = if offset == 0 {
		let Some(utc) = to_utc(time) else {
			return ClockStatus::InvalidTime
		};
		let Some(tm) = utc.to_tm() else {
			return ClockStatus::InvalidTime
		};
		timestamp_from_tm(&tm)
	} else {
		let Some(tm) = time.to_tm() else {
			return ClockStatus::InvalidTime
		};
		timestamp_from_tm(&tm) - offset
	};
	if applier.set(TimeSpec { sec, nsec: SET_DELAY_NSEC }) {
		ClockStatus::Ok
	} else {
		ClockStatus::SetFailed
	}
}
