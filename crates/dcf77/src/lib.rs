//! Decode the DCF77 time signal.
//!
//! [DCF77](https://en.wikipedia.org/wiki/DCF77) broadcasts one amplitude-modulated bit per
//! second; 59 or 60 bits form a minute frame carrying the local time in Germany, daylight-saving
//! and leap-second announcements, and a multiplexed third-party data channel. This crate turns a
//! stream of per-second bit symbols into validated calendar time and decides whether the result
//! is trustworthy enough to set a clock from.
//!
//! The pipeline, one module per stage:
//! - [`framer`] collects bit symbols into minute-aligned buffers and resynchronizes on framing
//!   faults.
//! - [`decode`] validates parity and BCD encoding of each time field, tracks daylight-saving and
//!   leap-second announcements across minutes, and maintains the running calendar time.
//! - [`thirdparty`] demultiplexes the auxiliary 40-bit message spread over three minutes.
//! - [`clock`] gates and applies the decoded time to a host clock.
//! - [`mainloop`] sequences one tick per incoming symbol and forwards results to injected
//!   display, persistence, and clock capabilities.
//!
//! # Examples
//!
//! ```
//! # use dcf77::framer::SignalFramer;
//! # use dcf77::decode::TimeDecoder;
//! # use dcf77::BitSymbol;
//! # use calendar::CalendarTime;
//! let mut framer = SignalFramer::new();
//! let mut decoder = TimeDecoder::new();
//! let mut time = CalendarTime::default();
//!
//! // Feed one minute of symbols: 59 bits, then the minute marker
//! for _ in 0..59 {
//! 	framer.accept(&BitSymbol::bit(0));
//! }
//! let framed = framer.accept(&BitSymbol::minute_marker());
//! assert!(framed.minute_end);
//!
//! let result = decoder.decode(2, framer.minute_length(), framer.take_duration(),
//!                             framer.buffer(), &mut time);
//! // All-zero bits fail the bit-20 check, so nothing was committed
//! assert!(!result.bit20);
//! ```

#![no_std]

pub mod framer;
pub mod decode;
pub mod thirdparty;
pub mod clock;
pub mod mainloop;

/// Value carried by one second of signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BitValue {
	/// A 100 ms reduction: binary zero.
	Zero,
	/// A 200 ms reduction: binary one.
	One,
	/// No usable value this second (fault, I/O error, or a replay gap).
	Unknown
}

/// Receiver hardware condition reported with a symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HardwareStatus {
	/// Normal reception.
	Ok,
	/// The transmitter appears stuck (no modulation seen).
	TransmitStuck,
	/// The receiver appears stuck (input pinned to one level).
	ReceiveStuck,
	/// Random noise, no coherent pulse.
	RandomNoise
}

/// Minute-marker classification of a symbol.
///
/// The source reports [`MinuteMarker::MinuteEnd`] for the missing pulse ending a minute frame;
/// [`framer::SignalFramer`] upgrades or downgrades that classification when the marker arrives a
/// position late or not at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MinuteMarker {
	/// Ordinary data second.
	None,
	/// The missing pulse ending a minute frame.
	MinuteEnd,
	/// Sixty bits passed without a marker; the frame overflowed.
	TooLong,
	/// The marker arrived one position late (a 60-bit leap-second minute, or a recombined
	/// split minute).
	LateMinuteEnd
}

/// One second of received signal.
///
/// Produced once per second by the source and consumed exactly once per tick; immutable after
/// creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitSymbol {
	/// Decoded bit value, if any.
	pub value: BitValue,
	/// Receiver hardware condition.
	pub hardware: HardwareStatus,
	/// An I/O error occurred while sampling this second.
	pub io_error: bool,
	/// Minute-marker classification from the source.
	pub marker: MinuteMarker,
	/// The symbol carries no signal content at all and consumes no time (for example an
	/// unrecognized log character).
	pub skip: bool
}

impl BitSymbol {
	/// A clean data bit. Any nonzero `value` is treated as one.
	pub fn bit(value: u8) -> BitSymbol {
		BitSymbol {
			value: if value == 0 { BitValue::Zero } else { BitValue::One },
			hardware: HardwareStatus::Ok,
			io_error: false,
			marker: MinuteMarker::None,
			skip: false
		}
	}

	/// The minute-end marker (the missing 60th pulse).
	pub fn minute_marker() -> BitSymbol {
		BitSymbol {
			value: BitValue::Unknown,
			hardware: HardwareStatus::Ok,
			io_error: false,
			marker: MinuteMarker::MinuteEnd,
			skip: false
		}
	}

	/// A second with a hardware fault and no usable bit value.
	pub fn fault(hardware: HardwareStatus) -> BitSymbol {
		BitSymbol {
			value: BitValue::Unknown,
			hardware,
			io_error: false,
			marker: MinuteMarker::None,
			skip: false
		}
	}

	/// A second lost to an I/O error.
	pub fn io_error() -> BitSymbol {
		BitSymbol {
			value: BitValue::Unknown,
			hardware: HardwareStatus::Ok,
			io_error: true,
			marker: MinuteMarker::None,
			skip: false
		}
	}

	/// A replay gap: the position advances but the previous buffer content is kept.
	pub fn unknown() -> BitSymbol {
		BitSymbol {
			value: BitValue::Unknown,
			hardware: HardwareStatus::Ok,
			io_error: false,
			marker: MinuteMarker::None,
			skip: false
		}
	}

	/// A symbol to be ignored entirely.
	pub fn skipped() -> BitSymbol {
		BitSymbol {
			value: BitValue::Unknown,
			hardware: HardwareStatus::Ok,
			io_error: false,
			marker: MinuteMarker::None,
			skip: true
		}
	}
}
