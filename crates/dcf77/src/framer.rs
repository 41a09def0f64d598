//! Framing of per-second bit symbols into minute-aligned buffers.
//!
//! A DCF77 minute frame is 59 bits (60 in a leap-second minute) terminated by a missing pulse.
//! [`SignalFramer`] writes each incoming bit at the current position of a 60-slot ring buffer,
//! resets the position on minute markers, and recovers from three kinds of framing damage:
//!
//! - **Overflow**: sixty bits arrive without a marker. The frame is flagged
//!   [`MinuteMarker::TooLong`] and the position resynchronizes to zero.
//! - **Late marker**: the marker arrives one symbol after the position already reached sixty.
//!   This is the normal shape of a 60-bit leap-second minute, so the tentative overflow is
//!   reclassified as [`MinuteMarker::LateMinuteEnd`] with minute length 60.
//! - **Split minutes**: recorded logs occasionally split one minute across two fragments,
//!   leaving a short minute followed by a single stray bit and another marker. The stray bit is
//!   folded back into the previous minute (a one-position backward correction) and the combined
//!   frame is republished.
//!
//! The framer also accumulates wall-clock milliseconds per minute: every consumed symbol counts
//! as one second, and replayed logs may inject additional raw durations for the gaps between
//! fragments. The decoder uses the accumulated total to know how many minutes really elapsed.

use crate::{BitSymbol, BitValue, MinuteMarker};

/// Number of bit positions in a minute frame buffer.
pub const BUFLEN: usize = 60;

/// Milliseconds represented by one consumed symbol.
const MS_PER_SYMBOL: u64 = 1000;

/// Split-minute reconciliation state.
///
/// Tracks whether the previous minute ended short and whether exactly one stray bit has been
/// seen since, which together arm the one-position backward correction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Reconcile {
	/// No correction pending.
	Idle,
	/// The previous minute ended short at the recorded length.
	Short(u8),
	/// One stray bit has been written since the short minute; a marker now recombines them.
	Stray(u8)
}

/// Result of feeding one symbol to the framer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Framed {
	/// Marker classification after the framer's adjustments.
	pub marker: MinuteMarker,
	/// Bit position the symbol was written at (or would have been).
	pub position: usize,
	/// A minute frame completed with this symbol; the buffer and minute length are ready to
	/// decode.
	pub minute_end: bool
}

/// Accumulates bit symbols into minute frames.
///
/// The buffer has ring semantics: the position wraps to zero on minute end or overflow and old
/// content is overwritten in place, which is what lets symbols with an unknown value preserve
/// the previous minute's bit at that position.
pub struct SignalFramer {
	buffer: [u8; BUFLEN],
	bit_pos: usize,
	minute_length: i8,
	acc_ms: u64,
	pending_overflow: bool,
	reconcile: Reconcile
}

impl SignalFramer {
	/// Create a framer with an empty buffer at position zero.
	pub fn new() -> SignalFramer {
		SignalFramer {
			buffer: [0; BUFLEN],
			bit_pos: 0,
			minute_length: -1,
			acc_ms: 0,
			pending_overflow: false,
			reconcile: Reconcile::Idle
		}
	}

	/// Feed one symbol and return its framing classification.
	///
	/// When the returned [`Framed::minute_end`] is set, [`SignalFramer::buffer`] and
	/// [`SignalFramer::minute_length`] describe the completed frame until the next data symbol
	/// arrives.
	pub fn accept(&mut self, symbol: &BitSymbol) -> Framed {
		let mut out = Framed {
			marker: symbol.marker,
			position: self.bit_pos,
			minute_end: false
		};
		if symbol.skip {
			return out
		}
		self.acc_ms += MS_PER_SYMBOL;

		// Resolve a tentative overflow from the previous symbol: a marker now means the frame
		// was a 60-bit leap-second minute, anything else confirms the overflow.
		if self.pending_overflow {
			self.pending_overflow = false;
			if symbol.marker == MinuteMarker::MinuteEnd {
				self.minute_length = BUFLEN as i8;
				self.bit_pos = 0;
				self.reconcile = Reconcile::Idle;
				out.marker = MinuteMarker::LateMinuteEnd;
				out.position = 0;
				out.minute_end = true;
				return out
			}
			out.marker = MinuteMarker::TooLong;
			out.position = 0;
			out.minute_end = true;
			self.minute_length = -1;
			self.bit_pos = 0;
			self.reconcile = Reconcile::Idle;
			// fall through: the current symbol starts the resynchronized minute
		}

		if symbol.marker == MinuteMarker::MinuteEnd {
			if self.bit_pos == 0 {
				// Marker with an empty frame (duplicated in the log); nothing to publish
				return out
			}
			if let Reconcile::Stray(previous) = self.reconcile {
				if self.bit_pos == 1 {
					// The single bit since the short minute belongs to that minute: republish
					// the combined frame, one position longer than first reported
					self.minute_length = previous as i8 + 1;
					self.bit_pos = 0;
					self.reconcile = Reconcile::Idle;
					out.marker = MinuteMarker::LateMinuteEnd;
					out.minute_end = true;
					return out
				}
			}
			self.minute_length = self.bit_pos as i8;
			self.reconcile = if self.bit_pos < BUFLEN - 1 {
				Reconcile::Short(self.bit_pos as u8)
			} else {
				Reconcile::Idle
			};
			self.bit_pos = 0;
			out.minute_end = true;
			return out
		}

		// A data second: write the bit unless the value is unknown, which preserves the
		// previous content at this position (used for replay gaps)
		match symbol.value {
			BitValue::Zero | BitValue::One => {
				let v = (symbol.value == BitValue::One) as u8;
				self.buffer[self.bit_pos] = v;
				self.reconcile = match self.reconcile {
					Reconcile::Short(previous) if self.bit_pos == 0 => {
						// Tentatively extend the short minute in case a marker follows
						self.buffer[previous as usize] = v;
						Reconcile::Stray(previous)
					},
					_ => Reconcile::Idle
				};
			},
			BitValue::Unknown => {
				self.reconcile = Reconcile::Idle;
			}
		}
		self.bit_pos += 1;
		if self.bit_pos >= BUFLEN {
			// Decide on the next symbol whether this is a late marker or a real overflow
			self.pending_overflow = true;
			self.bit_pos = 0;
			out.position = BUFLEN - 1;
		}
		out
	}

	/// The live minute buffer. Positions at and beyond the current bit position hold the
	/// previous minute's content.
	pub fn buffer(&self) -> &[u8; BUFLEN] {
		&self.buffer
	}

	/// Current bit position, always in `[0, 60)`.
	pub fn bit_position(&self) -> usize {
		self.bit_pos
	}

	/// Length of the most recently completed minute: 0-60, or -1 if unknown or overflowed.
	pub fn minute_length(&self) -> i8 {
		self.minute_length
	}

	/// Add externally recorded milliseconds to the running minute duration.
	///
	/// Replayed logs inject these for the wall-clock gaps between log fragments.
	pub fn add_duration(&mut self, ms: u64) {
		self.acc_ms += ms;
	}

	/// Take the accumulated duration of the completed minute, resetting the accumulator.
	pub fn take_duration(&mut self) -> u64 {
		let ms = self.acc_ms;
		self.acc_ms = 0;
		ms
	}
}

impl Default for SignalFramer {
	fn default() -> SignalFramer {
		SignalFramer::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn feed_bits(framer: &mut SignalFramer, bits: &[u8]) -> Option<Framed> {
		let mut last = None;
		for &b in bits {
			last = Some(framer.accept(&BitSymbol::bit(b)));
		}
		last
	}

	#[test]
	fn normal_minute_test() {
		let mut framer = SignalFramer::new();
		for i in 0..59u8 {
			let f = framer.accept(&BitSymbol::bit(i & 1));
			assert_eq!(f.position, i as usize);
			assert!(!f.minute_end);
		}
		let f = framer.accept(&BitSymbol::minute_marker());
		assert_eq!(f.marker, MinuteMarker::MinuteEnd);
		assert!(f.minute_end);
		assert_eq!(framer.minute_length(), 59);
		assert_eq!(framer.bit_position(), 0);
		assert_eq!(framer.take_duration(), 60000);
		assert_eq!(framer.buffer()[1], 1);
		assert_eq!(framer.buffer()[2], 0);
	}

	#[test]
	fn leap_second_minute_test() {
		// 60 bits followed by the marker: the marker is one position late, which is the normal
		// shape of a leap-second minute
		let mut framer = SignalFramer::new();
		feed_bits(&mut framer, &[0; 60]);
		let f = framer.accept(&BitSymbol::minute_marker());
		assert_eq!(f.marker, MinuteMarker::LateMinuteEnd);
		assert!(f.minute_end);
		assert_eq!(framer.minute_length(), 60);
		assert_eq!(framer.bit_position(), 0);
		// 61 symbols consumed
		assert_eq!(framer.take_duration(), 61000);
	}

	#[test]
	fn overflow_test() {
		// 60 bits and then another bit: the frame overflowed
		let mut framer = SignalFramer::new();
		feed_bits(&mut framer, &[1; 60]);
		let f = framer.accept(&BitSymbol::bit(0));
		assert_eq!(f.marker, MinuteMarker::TooLong);
		assert!(f.minute_end);
		assert_eq!(framer.minute_length(), -1);
		// The overflowing bit started the resynchronized minute at position 0
		assert_eq!(framer.buffer()[0], 0);
		assert_eq!(framer.bit_position(), 1);
	}

	#[test]
	fn unknown_preserves_buffer_test() {
		let mut framer = SignalFramer::new();
		feed_bits(&mut framer, &[1, 1, 1]);
		framer.accept(&BitSymbol::minute_marker());
		// Next minute: a replay gap at position 1 keeps the old bit
		framer.accept(&BitSymbol::bit(0));
		framer.accept(&BitSymbol::unknown());
		let f = framer.accept(&BitSymbol::bit(0));
		assert_eq!(f.position, 2);
		assert_eq!(framer.buffer()[0], 0);
		assert_eq!(framer.buffer()[1], 1);
	}

	#[test]
	fn skip_test() {
		let mut framer = SignalFramer::new();
		framer.accept(&BitSymbol::bit(1));
		let f = framer.accept(&BitSymbol::skipped());
		assert_eq!(f.position, 1);
		assert!(!f.minute_end);
		assert_eq!(framer.bit_position(), 1);
		// Skipped symbols consume no time
		assert_eq!(framer.take_duration(), 1000);
	}

	#[test]
	fn split_minute_recombination_test() {
		// Characterization: a 58-bit fragment, a marker, one stray bit, and another marker must
		// recombine into a 59-bit minute with the stray bit at position 58.
		let mut framer = SignalFramer::new();
		feed_bits(&mut framer, &[0; 58]);
		let f = framer.accept(&BitSymbol::minute_marker());
		assert!(f.minute_end);
		assert_eq!(framer.minute_length(), 58);

		let f = framer.accept(&BitSymbol::bit(1));
		assert!(!f.minute_end);
		let f = framer.accept(&BitSymbol::minute_marker());
		assert_eq!(f.marker, MinuteMarker::LateMinuteEnd);
		assert!(f.minute_end);
		assert_eq!(framer.minute_length(), 59);
		assert_eq!(framer.buffer()[58], 1);
		assert_eq!(framer.bit_position(), 0);
	}

	#[test]
	fn no_recombination_after_two_bits_test() {
		// Two bits between the markers is a genuinely short second minute, not a split
		let mut framer = SignalFramer::new();
		feed_bits(&mut framer, &[0; 58]);
		framer.accept(&BitSymbol::minute_marker());
		feed_bits(&mut framer, &[1, 1]);
		let f = framer.accept(&BitSymbol::minute_marker());
		assert_eq!(f.marker, MinuteMarker::MinuteEnd);
		assert_eq!(framer.minute_length(), 2);
	}

	#[test]
	fn duplicated_marker_test() {
		let mut framer = SignalFramer::new();
		feed_bits(&mut framer, &[0; 59]);
		framer.accept(&BitSymbol::minute_marker());
		// A doubled marker publishes nothing
		let f = framer.accept(&BitSymbol::minute_marker());
		assert!(!f.minute_end);
		assert_eq!(framer.bit_position(), 0);
	}

	#[test]
	fn injected_duration_test() {
		let mut framer = SignalFramer::new();
		framer.add_duration(120000);
		feed_bits(&mut framer, &[0; 59]);
		framer.accept(&BitSymbol::minute_marker());
		assert_eq!(framer.take_duration(), 180000);
		assert_eq!(framer.take_duration(), 0);
	}
}
