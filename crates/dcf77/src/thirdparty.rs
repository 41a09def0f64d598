//! Demultiplexing of the third-party data channel.
//!
//! Bits 1-14 of every minute frame carry an auxiliary channel that was historically leased for
//! weather broadcasts and the German civil-warning system. A full message is 40 bits spread over
//! a repeating three-minute cycle: the first minute of the cycle carries a two-bit content
//! indicator and 12 data bits, the other two minutes carry 14 data bits each. Which minute of
//! the cycle a frame belongs to follows from the decoded minute of the hour, so reconstruction
//! is independent of where in the cycle observation starts.
//!
//! The civil-alarm layout ([`AlarmMessage`]) is decoded by fixed bit-position tables without
//! validation; the channel is long dead and no authoritative checksum definition survives. The
//! message repeats its region record, which at least allows an internal consistency check.

use core::fmt;

/// Number of slots in a complete third-party message.
pub const SLOTS: usize = 40;

/// Data bits carried per minute: frame bits 1-14.
const BITS_PER_MINUTE: usize = 14;

/// Per-phase slot mapping: frame bit of the first data bit, first message slot, bit count.
const PHASE_LAYOUT: [(usize, usize, usize); 3] = [
	(3, 0, 12),
	(1, 12, BITS_PER_MINUTE),
	(1, 26, BITS_PER_MINUTE)
];

/// Frame bits of the content indicator, present in phase 0 only.
const KIND_BITS: (usize, usize) = (1, 2);

/// Content classification of a third-party message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
	/// Indicator bits match no known content type.
	Unknown,
	/// Weather broadcast (encrypted, not decoded further).
	Weather,
	/// Civil-alarm broadcast, see [`AlarmMessage`].
	CivilAlarm
}

/// A complete 40-slot third-party message with its classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThirdPartyBuffer {
	/// Message bits in slot order.
	pub data: [u8; SLOTS],
	/// Content classification from the phase-0 indicator bits.
	pub kind: MessageKind
}

/// Reassembles third-party messages from the per-minute bit stream.
pub struct ThirdPartyDemux {
	data: [u8; SLOTS],
	kind_bits: (u8, u8),
	filled: [bool; 3],
	complete: Option<ThirdPartyBuffer>
}

impl ThirdPartyDemux {
	/// Create a demux with no message collected yet.
	pub fn new() -> ThirdPartyDemux {
		ThirdPartyDemux {
			data: [0; SLOTS],
			kind_bits: (0, 0),
			filled: [false; 3],
			complete: None
		}
	}

	/// Feed one data bit.
	///
	/// `minute` is the minute of the hour the frame belongs to, which keys the three-minute
	/// cycle; `position` is the frame bit position. Positions outside the channel are ignored,
	/// so the whole frame can be fed unconditionally.
	pub fn feed(&mut self, minute: u8, position: usize, value: u8) {
		let phase = (minute % 3) as usize;
		if phase == 0 {
			if position == KIND_BITS.0 {
				self.kind_bits.0 = value;
			} else if position == KIND_BITS.1 {
				self.kind_bits.1 = value;
			}
		}
		let (first_bit, first_slot, count) = PHASE_LAYOUT[phase];
		if (first_bit..first_bit + count).contains(&position) {
			self.data[first_slot + (position - first_bit)] = value;
		}
	}

	/// Close out the minute belonging to `minute` of the hour.
	///
	/// At the end of the third cycle minute, if all three minutes were observed, the completed
	/// message is published and returned; otherwise `None`.
	pub fn end_minute(&mut self, minute: u8) -> Option<ThirdPartyBuffer> {
		let phase = (minute % 3) as usize;
		self.filled[phase] = true;
		if phase != 2 {
			return None
		}
		let all = self.filled.iter().all(|&f| f);
		self.filled = [false; 3];
		if !all {
			return None
		}
		let buffer = ThirdPartyBuffer {
			data: self.data,
			kind: match self.kind_bits {
				(1, 0) => MessageKind::CivilAlarm,
				(0, 1) => MessageKind::Weather,
				_ => MessageKind::Unknown
			}
		};
		self.complete = Some(buffer);
		Some(buffer)
	}

	/// The most recently completed message, if any cycle has completed.
	pub fn snapshot(&self) -> Option<&ThirdPartyBuffer> {
		self.complete.as_ref()
	}
}

impl Default for ThirdPartyDemux {
	fn default() -> ThirdPartyDemux {
		ThirdPartyDemux::new()
	}
}

/// Slot layout of one alarm region record: region code, extension code, and two detail codes.
const REGION_FIELDS: [[(usize, usize); 4]; 2] = [
	[(0, 4), (4, 4), (8, 2), (10, 2)],
	[(20, 4), (24, 4), (28, 2), (30, 2)]
];

/// Slot layout of the two parity bytes following each region record.
const PARITY_FIELDS: [(usize, usize); 2] = [(12, 8), (32, 8)];

/// Zones covered by each 4-bit region code, up to three per region.
const REGION_ZONES: [&[&str]; 16] = [
	&["Schleswig-Holstein", "Hamburg"],
	&["Niedersachsen", "Bremen"],
	&["Nordrhein-Westfalen"],
	&["Hessen"],
	&["Rheinland-Pfalz", "Saarland"],
	&["Baden-W\u{fc}rttemberg"],
	&["Bayern (Nord)"],
	&["Bayern (S\u{fc}d)"],
	&["Berlin", "Brandenburg"],
	&["Mecklenburg-Vorpommern"],
	&["Sachsen", "Sachsen-Anhalt", "Th\u{fc}ringen"],
	&["Testgebiet"],
	&["Reserve 12"],
	&["Reserve 13"],
	&["Reserve 14"],
	&["Reserve 15"]
];

/// One of the two redundant region records of an alarm message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlarmRecord {
	/// 4-bit region code, see [`AlarmMessage::area`].
	pub region: u8,
	/// 4-bit extension code.
	pub extension: u8,
	/// First 2-bit detail code.
	pub detail1: u8,
	/// Second 2-bit detail code.
	pub detail2: u8
}

/// Area addressed by an alarm message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlarmArea {
	/// The two region records disagree; the message is not trustworthy.
	Inconsistent,
	/// The named zones.
	Zones(&'static [&'static str])
}

impl fmt::Display for AlarmArea {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			AlarmArea::Inconsistent => f.write_str("inconsistent"),
			AlarmArea::Zones(zones) => {
				for (i, zone) in zones.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					f.write_str(zone)?;
				}
				Ok(())
			}
		}
	}
}

/// Decoded civil-alarm message: two redundant region records and their parity bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlarmMessage {
	/// The two region records.
	pub records: [AlarmRecord; 2],
	/// The raw parity bytes; no check is defined, they are surfaced as received.
	pub parity: [u8; 2]
}

/// Read a little-endian field from message slots.
fn field(data: &[u8; SLOTS], offset: usize, len: usize) -> u8 {
	data[offset..offset + len].iter().rev().fold(0, |acc, &b| acc << 1 | b)
}

/// Extract the alarm layout from a third-party message.
///
/// Purely positional; the caller decides based on [`ThirdPartyBuffer::kind`] whether the layout
/// applies.
pub fn decode_alarm(buffer: &ThirdPartyBuffer) -> AlarmMessage {
	let mut records = [AlarmRecord { region: 0, extension: 0, detail1: 0, detail2: 0 }; 2];
	for (record, fields) in records.iter_mut().zip(REGION_FIELDS.iter()) {
		record.region = field(&buffer.data, fields[0].0, fields[0].1);
		record.extension = field(&buffer.data, fields[1].0, fields[1].1);
		record.detail1 = field(&buffer.data, fields[2].0, fields[2].1);
		record.detail2 = field(&buffer.data, fields[3].0, fields[3].1);
	}
	AlarmMessage {
		records,
		parity: [
			field(&buffer.data, PARITY_FIELDS[0].0, PARITY_FIELDS[0].1),
			field(&buffer.data, PARITY_FIELDS[1].0, PARITY_FIELDS[1].1)
		]
	}
}

impl AlarmMessage {
	/// Resolve the addressed area, or flag the message as inconsistent when the two region
	/// records disagree.
	pub fn area(&self) -> AlarmArea {
		if self.records[0].region != self.records[1].region {
			AlarmArea::Inconsistent
		} else {
			AlarmArea::Zones(REGION_ZONES[self.records[0].region as usize])
		}
	}
}

#[cfg(test)]
mod tests {
	extern crate std;
	use std::string::ToString;
	use super::*;

	/// Feed one minute's worth of channel bits for a given message.
	fn feed_minute(demux: &mut ThirdPartyDemux, minute: u8, message: &[u8; SLOTS],
	               kind_bits: (u8, u8)) {
		let phase = (minute % 3) as usize;
		if phase == 0 {
			demux.feed(minute, KIND_BITS.0, kind_bits.0);
			demux.feed(minute, KIND_BITS.1, kind_bits.1);
		}
		let (first_bit, first_slot, count) = PHASE_LAYOUT[phase];
		for i in 0..count {
			demux.feed(minute, first_bit + i, message[first_slot + i]);
		}
	}

	fn message() -> [u8; SLOTS] {
		let mut m = [0u8; SLOTS];
		for (i, slot) in m.iter_mut().enumerate() {
			*slot = ((i * 7) % 3 == 0) as u8;
		}
		m
	}

	#[test]
	fn full_cycle_test() {
		let mut demux = ThirdPartyDemux::new();
		let m = message();
		assert_eq!(demux.snapshot(), None);
		feed_minute(&mut demux, 0, &m, (0, 1));
		assert_eq!(demux.end_minute(0), None);
		feed_minute(&mut demux, 1, &m, (0, 1));
		assert_eq!(demux.end_minute(1), None);
		feed_minute(&mut demux, 2, &m, (0, 1));
		let buffer = demux.end_minute(2).unwrap();
		assert_eq!(buffer.data, m);
		assert_eq!(buffer.kind, MessageKind::Weather);
		assert_eq!(demux.snapshot(), Some(&buffer));
	}

	#[test]
	fn phase_offset_independence_test() {
		// Starting observation at any minute of the cycle must reconstruct the same message
		let m = message();
		let mut results = [None; 3];
		for offset in 0..3u8 {
			let mut demux = ThirdPartyDemux::new();
			let mut published = None;
			for minute in offset..offset + 6 {
				feed_minute(&mut demux, minute, &m, (1, 0));
				if let Some(buffer) = demux.end_minute(minute) {
					published = Some(buffer);
				}
			}
			results[offset as usize] = published;
		}
		let reference = results[0].unwrap();
		assert_eq!(reference.data, m);
		assert_eq!(reference.kind, MessageKind::CivilAlarm);
		assert_eq!(results[1], results[0]);
		assert_eq!(results[2], results[0]);
	}

	#[test]
	fn incomplete_cycle_not_published_test() {
		let mut demux = ThirdPartyDemux::new();
		let m = message();
		// Phase 0 was never observed
		feed_minute(&mut demux, 1, &m, (0, 0));
		demux.end_minute(1);
		feed_minute(&mut demux, 2, &m, (0, 0));
		assert_eq!(demux.end_minute(2), None);
		assert_eq!(demux.snapshot(), None);
	}

	#[test]
	fn kind_classification_test() {
		let m = message();
		for (kind_bits, expected) in [
			((1, 0), MessageKind::CivilAlarm),
			((0, 1), MessageKind::Weather),
			((0, 0), MessageKind::Unknown),
			((1, 1), MessageKind::Unknown)
		] {
			let mut demux = ThirdPartyDemux::new();
			for minute in 0..3 {
				feed_minute(&mut demux, minute, &m, kind_bits);
			}
			demux.end_minute(0);
			demux.end_minute(1);
			let buffer = demux.end_minute(2).unwrap();
			assert_eq!(buffer.kind, expected, "kind bits {:?}", kind_bits);
		}
	}

	#[test]
	fn decode_alarm_test() {
		let mut data = [0u8; SLOTS];
		// Region 10 with extension 3, details 1 and 2, repeated in the second record
		for offset in [0, 20] {
			data[offset + 1] = 1;
			data[offset + 3] = 1;
			data[offset + 4] = 1;
			data[offset + 5] = 1;
			data[offset + 8] = 1;
			data[offset + 11] = 1;
		}
		// Parity bytes 0xa5 and 0x5a
		for (i, &(offset, len)) in PARITY_FIELDS.iter().enumerate() {
			let byte: u8 = if i == 0 { 0xa5 } else { 0x5a };
			for bit in 0..len {
				data[offset + bit] = (byte >> bit) & 1;
			}
		}
		let message = decode_alarm(&ThirdPartyBuffer { data, kind: MessageKind::CivilAlarm });
		for record in &message.records {
			assert_eq!(record.region, 10);
			assert_eq!(record.extension, 3);
			assert_eq!(record.detail1, 1);
			assert_eq!(record.detail2, 2);
		}
		assert_eq!(message.parity, [0xa5, 0x5a]);
		assert_eq!(
			message.area().to_string(),
			"Sachsen, Sachsen-Anhalt, Th\u{fc}ringen"
		);
	}

	#[test]
	fn inconsistent_region_test() {
		let mut data = [0u8; SLOTS];
		data[0] = 1; // region 1 in the first record, 0 in the second
		let message = decode_alarm(&ThirdPartyBuffer { data, kind: MessageKind::CivilAlarm });
		assert_eq!(message.area(), AlarmArea::Inconsistent);
		assert_eq!(message.area().to_string(), "inconsistent");
	}
}
