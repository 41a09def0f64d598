//! Plain terminal output for the decoding pipeline.

use calendar::{CalendarTime, Dst};
use dcf77::clock::{ClockDecision, ClockStatus};
use dcf77::decode::{DecodeResult, DstStatus, FieldStatus, LeapStatus, MinuteLength};
use dcf77::framer::{Framed, BUFLEN};
use dcf77::mainloop::Display;
use dcf77::thirdparty::{AlarmMessage, MessageKind, ThirdPartyBuffer};
use dcf77::BitSymbol;

use crate::logfile::symbol_byte;

/// Weekday names in the wire convention, Monday = 1 through Sunday = 7.
const WDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Writes per-second bits and per-minute reports to standard output.
pub struct ConsoleDisplay {
	/// Suppress the per-second bit row.
	quiet: bool
}

impl ConsoleDisplay {
	pub fn new(quiet: bool) -> ConsoleDisplay {
		ConsoleDisplay { quiet }
	}
}

/// Annotation for a field status, empty when the field is fine.
fn field_note(name: &str, status: FieldStatus) -> Option<String> {
	let what = match status {
		FieldStatus::Ok => return None,
		FieldStatus::BcdError => "invalid",
		FieldStatus::ParityError => "parity",
		FieldStatus::Jumped => "jumped"
	};
	Some(format!("{} {}", name, what))
}

impl Display for ConsoleDisplay {
	fn symbol(&mut self, symbol: &BitSymbol, _framed: &Framed, _buffer: &[u8; BUFLEN]) {
		if self.quiet || symbol.skip {
			return
		}
		let byte = symbol_byte(symbol);
		if byte != b'\n' {
			print!("{}", byte as char);
		}
	}

	fn minute(&mut self, result: &DecodeResult, time: &CalendarTime) {
		if !self.quiet {
			println!();
		}
		let wday = WDAYS.get(time.wday.wrapping_sub(1) as usize).unwrap_or(&"???");
		let dst = match time.dst {
			Dst::Standard => "CET",
			Dst::Daylight => "CEST",
			Dst::Unknown | Dst::Utc => "?"
		};
		let mut notes: Vec<String> = Vec::new();
		match result.minute_length {
			MinuteLength::Ok => (),
			MinuteLength::Short => notes.push(String::from("minute too short")),
			MinuteLength::Long => notes.push(String::from("minute too long"))
		}
		if !result.bit0 {
			notes.push(String::from("bit 0 not 0"));
		}
		if !result.bit20 {
			notes.push(String::from("bit 20 not 1"));
		}
		notes.extend(field_note("minute", result.minute));
		notes.extend(field_note("hour", result.hour));
		notes.extend(field_note("day", result.day));
		notes.extend(field_note("weekday", result.wday));
		notes.extend(field_note("month", result.month));
		notes.extend(field_note("year", result.year));
		match result.dst {
			DstStatus::Ok => (),
			DstStatus::Error => notes.push(String::from("daylight-saving bits invalid")),
			DstStatus::Jumped => notes.push(String::from("daylight-saving jumped")),
			DstStatus::JustChanged => notes.push(String::from("daylight-saving changed"))
		}
		match result.leap {
			LeapStatus::None => (),
			LeapStatus::Processed => notes.push(String::from("leap second processed")),
			LeapStatus::OneInsteadOfZero => notes.push(String::from("leap second bit not 0"))
		}
		if result.dst_announced {
			notes.push(String::from("daylight-saving change announced"));
		}
		if result.leap_announced {
			notes.push(String::from("leap second announced"));
		}
		if result.transmitter_call {
			notes.push(String::from("transmitter call"));
		}

		print!(
			"{} {:02}.{:02}.{:04} {:02}:{:02} {}",
			wday, time.day, time.month, time.year, time.hour, time.minute, dst
		);
		if !result.committed {
			print!(" (not committed)");
		}
		if !notes.is_empty() {
			print!(" [{}]", notes.join(", "));
		}
		println!();
	}

	fn third_party(&mut self, buffer: &ThirdPartyBuffer, alarm: Option<&AlarmMessage>) {
		match buffer.kind {
			MessageKind::Unknown => println!("third party: unknown content"),
			MessageKind::Weather => println!("third party: weather broadcast"),
			MessageKind::CivilAlarm => println!("third party: civil alarm")
		}
		if let Some(alarm) = alarm {
			println!(
				"  alarm region {} ({}), extension {}, details {}/{}",
				alarm.records[0].region,
				alarm.area(),
				alarm.records[0].extension,
				alarm.records[0].detail1,
				alarm.records[0].detail2
			);
		}
	}

	fn clock(&mut self, decision: &ClockDecision) {
		// Startup and error minutes are never safe; stay silent about those
		if !decision.safe {
			return
		}
		match decision.status {
			ClockStatus::Ok => println!("clock: set"),
			ClockStatus::InvalidTime => println!("clock: decoded time not applicable"),
			ClockStatus::SetFailed => println!("clock: setting the system clock failed"),
			ClockStatus::Unsafe => println!("clock: minute is trustworthy (clock setting disabled)")
		}
	}

	fn cutoff(&mut self, value: f64) {
		if !self.quiet {
			println!("cutoff {}", value);
		}
	}
}
