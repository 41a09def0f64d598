//! Log file replay and recording.
//!
//! Receiver logs use a one-character-per-second alphabet:
//!
//! | Character | Meaning                                        |
//! | --------- | ---------------------------------------------- |
//! | `0`, `1`  | Bit value                                      |
//! | `\n`      | Minute-end marker                              |
//! | `x`       | Transmitter appears stuck, no bit value        |
//! | `r`       | Receiver appears stuck, no bit value           |
//! | `#`       | Random noise, no bit value                     |
//! | `*`       | I/O error reading the receiver                 |
//! | `_`       | Unknown value, keep the previous buffer bit    |
//! | `a<uint>` | Accumulated duration in milliseconds (gaps)    |
//! | `c<float>`| Diagnostic cutoff value                        |
//!
//! Any other character is skipped. `\r` is normalized to `\n`, and doubled minute markers (as
//! produced by logs concatenated from several recording sessions) collapse to one. [`LogSink`]
//! writes the same alphabet back out verbatim, so a recorded run replays bit-for-bit.

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::{fs, io};

use dcf77::mainloop::{self, Event};
use dcf77::{BitSymbol, BitValue, HardwareStatus, MinuteMarker};

use crate::error::RunError;

/// Replays a receiver log as a stream of events.
pub struct LogSource {
	data: Vec<u8>,
	pos: usize,
	last_was_marker: bool
}

impl LogSource {
	/// Read a log file for replay.
	///
	/// # Errors
	///
	/// Returns [`RunError::LogOpen`] if the file cannot be read.
	pub fn open(path: &OsString) -> Result<LogSource, RunError> {
		let data = fs::read(path).map_err(|e| RunError::LogOpen(path.clone(), e))?;
		Ok(LogSource::new(data))
	}

	fn new(data: Vec<u8>) -> LogSource {
		LogSource { data, pos: 0, last_was_marker: false }
	}

	/// Consume leading bytes matching `matches` and parse them with [`str::parse`].
	fn number<T: std::str::FromStr>(&mut self, matches: fn(u8) -> bool) -> Option<T> {
		let start = self.pos;
		while self.pos < self.data.len() && matches(self.data[self.pos]) {
			self.pos += 1;
		}
		std::str::from_utf8(&self.data[start..self.pos]).ok()?.parse().ok()
	}
}

impl mainloop::Source for LogSource {
	fn next_event(&mut self) -> Option<Event> {
		while self.pos < self.data.len() {
			let byte = self.data[self.pos];
			self.pos += 1;
			let byte = if byte == b'\r' { b'\n' } else { byte };
			let event = match byte {
				b'0' => Event::Symbol(BitSymbol::bit(0)),
				b'1' => Event::Symbol(BitSymbol::bit(1)),
				b'\n' => {
					if self.last_was_marker {
						continue
					}
					self.last_was_marker = true;
					return Some(Event::Symbol(BitSymbol::minute_marker()))
				},
				b'x' => Event::Symbol(BitSymbol::fault(HardwareStatus::TransmitStuck)),
				b'r' => Event::Symbol(BitSymbol::fault(HardwareStatus::ReceiveStuck)),
				b'#' => Event::Symbol(BitSymbol::fault(HardwareStatus::RandomNoise)),
				b'*' => Event::Symbol(BitSymbol::io_error()),
				b'_' => Event::Symbol(BitSymbol::unknown()),
				b'a' => match self.number(|b| b.is_ascii_digit()) {
					Some(ms) => Event::Duration(ms),
					None => Event::Symbol(BitSymbol::skipped())
				},
				b'c' => match self.number(
					|b| matches!(b, b'0'..=b'9' | b'.' | b'-' | b'+' | b'e' | b'E')
				) {
					Some(value) => Event::Cutoff(value),
					None => Event::Symbol(BitSymbol::skipped())
				},
				// Unrecognized characters consume no time and leave marker collapsing intact
				_ => return Some(Event::Symbol(BitSymbol::skipped()))
			};
			self.last_was_marker = false;
			return Some(event)
		}
		None
	}
}

/// The log character for a symbol, inverse of the [`LogSource`] alphabet.
pub fn symbol_byte(symbol: &BitSymbol) -> u8 {
	if symbol.marker != MinuteMarker::None {
		return b'\n'
	}
	if symbol.io_error {
		return b'*'
	}
	match symbol.hardware {
		HardwareStatus::TransmitStuck => b'x',
		HardwareStatus::ReceiveStuck => b'r',
		HardwareStatus::RandomNoise => b'#',
		HardwareStatus::Ok => match symbol.value {
			BitValue::Zero => b'0',
			BitValue::One => b'1',
			BitValue::Unknown => b'_'
		}
	}
}

/// Appends replayed events verbatim to an output log.
///
/// Write errors are sticky and surfaced through [`LogSink::take_error`] after the run; the tick
/// loop itself never stops for a persistence problem.
pub struct LogSink {
	writer: BufWriter<File>,
	error: Option<io::Error>
}

impl LogSink {
	/// Create (or truncate) an output log.
	///
	/// # Errors
	///
	/// Returns [`RunError::LogCreate`] if the file cannot be created.
	pub fn create(path: &OsString) -> Result<LogSink, RunError> {
		let file = File::create(path).map_err(|e| RunError::LogCreate(path.clone(), e))?;
		Ok(LogSink { writer: BufWriter::new(file), error: None })
	}

	/// Take the first write error of the run, if any.
	pub fn take_error(&mut self) -> Option<RunError> {
		self.error.take().map(RunError::LogWrite)
	}
}

impl mainloop::LogSink for LogSink {
	fn append(&mut self, event: &Event) {
		if self.error.is_some() {
			return
		}
		let result = match event {
			// Skipped symbols came from characters we do not understand; they are not replayable
			// and are dropped from the copy
			Event::Symbol(symbol) if symbol.skip => Ok(()),
			Event::Symbol(symbol) => self.writer.write_all(&[symbol_byte(symbol)]),
			Event::Duration(ms) => write!(self.writer, "a{}", ms),
			Event::Cutoff(value) => write!(self.writer, "c{}", value)
		};
		if let Err(e) = result {
			self.error = Some(e);
		}
	}

	fn flush(&mut self) {
		if self.error.is_none() {
			if let Err(e) = self.writer.flush() {
				self.error = Some(e);
			}
		}
	}
}
