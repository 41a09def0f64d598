//! The per-symbol tick loop tying the pipeline together.
//!
//! [`Orchestrator`] pulls events from a [`Source`] and sequences one synchronous tick per event:
//! feed the framer and the third-party demux, detect the minute boundary, run the decoder, gate
//! the clock, and forward everything to the injected capabilities. It holds no decoding logic of
//! its own. Decode and framing errors never stop the loop; it ends on source exhaustion or when
//! the [`InputController`] requests it.
//!
//! All capabilities except the display are optional: without a [`ClockApplier`] the safety gate
//! is still evaluated and reported but nothing is applied, and without a [`LogSink`] nothing is
//! persisted.

use calendar::CalendarTime;

use crate::clock::{self, ClockApplier, ClockDecision, ClockStatus};
use crate::decode::{DecodeResult, TimeDecoder};
use crate::framer::{Framed, SignalFramer, BUFLEN};
use crate::thirdparty::{decode_alarm, AlarmMessage, MessageKind, ThirdPartyBuffer,
                        ThirdPartyDemux};
use crate::{BitSymbol, BitValue, MinuteMarker};

/// Number of minutes after startup during which the decoded time is not trusted.
const STARTUP_MINUTES: u8 = 2;

/// One unit of input to the tick loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Event {
	/// One second of received signal.
	Symbol(BitSymbol),
	/// Raw milliseconds to add to the running minute duration (replay gaps).
	Duration(u64),
	/// A diagnostic cutoff value recorded alongside the signal.
	Cutoff(f64)
}

/// Supplies events to the loop.
///
/// `None` ends the run, whether from end of input or a fatal source error; sources that can fail
/// expose the failure separately after the loop finishes.
pub trait Source {
	fn next_event(&mut self) -> Option<Event>;
}

/// Receives everything the pipeline produces. All methods default to doing nothing.
pub trait Display {
	/// One symbol was framed.
	fn symbol(&mut self, _symbol: &BitSymbol, _framed: &Framed, _buffer: &[u8; BUFLEN]) {}

	/// A minute frame was decoded.
	fn minute(&mut self, _result: &DecodeResult, _time: &CalendarTime) {}

	/// A third-party message cycle completed.
	fn third_party(&mut self, _buffer: &ThirdPartyBuffer, _alarm: Option<&AlarmMessage>) {}

	/// The clock gate ran for a minute.
	fn clock(&mut self, _decision: &ClockDecision) {}

	/// A diagnostic cutoff value was seen.
	fn cutoff(&mut self, _value: f64) {}
}

/// Persists events verbatim so a run can be replayed bit-for-bit.
pub trait LogSink {
	fn append(&mut self, event: &Event);

	/// Called once when the loop ends.
	fn flush(&mut self) {}
}

/// External run control, polled once per tick.
pub trait InputController {
	fn quit_requested(&mut self) -> bool {
		false
	}
}

/// Sequences the decoding pipeline, one tick per source event.
pub struct Orchestrator<'a> {
	framer: SignalFramer,
	decoder: TimeDecoder,
	demux: ThirdPartyDemux,
	time: CalendarTime,
	startup: u8,
	last_bit: BitSymbol,
	display: &'a mut dyn Display,
	sink: Option<&'a mut dyn LogSink>,
	applier: Option<&'a mut dyn ClockApplier>,
	input: Option<&'a mut dyn InputController>
}

impl<'a> Orchestrator<'a> {
	/// Create an orchestrator with only the required display capability.
	pub fn new(display: &'a mut dyn Display) -> Orchestrator<'a> {
		Orchestrator {
			framer: SignalFramer::new(),
			decoder: TimeDecoder::new(),
			demux: ThirdPartyDemux::new(),
			time: CalendarTime::default(),
			startup: STARTUP_MINUTES,
			last_bit: BitSymbol::unknown(),
			display,
			sink: None,
			applier: None,
			input: None
		}
	}

	/// Persist all events to `sink`.
	pub fn with_sink(mut self, sink: &'a mut dyn LogSink) -> Orchestrator<'a> {
		self.sink = Some(sink);
		self
	}

	/// Apply gated minutes to the host clock through `applier`.
	pub fn with_applier(mut self, applier: &'a mut dyn ClockApplier) -> Orchestrator<'a> {
		self.applier = Some(applier);
		self
	}

	/// Poll `input` for quit requests once per tick.
	pub fn with_input(mut self, input: &'a mut dyn InputController) -> Orchestrator<'a> {
		self.input = Some(input);
		self
	}

	/// The running calendar time.
	pub fn time(&self) -> &CalendarTime {
		&self.time
	}

	/// Run the tick loop until the source ends or quit is requested.
	pub fn run(&mut self, source: &mut dyn Source) {
		while let Some(event) = source.next_event() {
			if let Some(input) = self.input.as_deref_mut() {
				if input.quit_requested() {
					break
				}
			}
			self.tick(&event);
		}
		if let Some(sink) = self.sink.as_deref_mut() {
			sink.flush();
		}
	}

	/// Process one event.
	pub fn tick(&mut self, event: &Event) {
		if let Some(sink) = self.sink.as_deref_mut() {
			sink.append(event);
		}
		match *event {
			Event::Duration(ms) => self.framer.add_duration(ms),
			Event::Cutoff(value) => self.display.cutoff(value),
			Event::Symbol(ref symbol) => self.symbol_tick(symbol)
		}
	}

	fn symbol_tick(&mut self, symbol: &BitSymbol) {
		let framed = self.framer.accept(symbol);
		if symbol.skip {
			return
		}
		if symbol.marker == MinuteMarker::None {
			// Channel bits are keyed by the minute the frame is transmitted in, which the
			// running clock reached with the previous frame
			if let BitValue::Zero | BitValue::One = symbol.value {
				let value = (symbol.value == BitValue::One) as u8;
				self.demux.feed(self.decoder.minute_phase(), framed.position, value);
			}
			self.last_bit = *symbol;
		}
		self.display.symbol(symbol, &framed, self.framer.buffer());
		if framed.minute_end {
			self.minute_tick(&framed);
		}
	}

	fn minute_tick(&mut self, framed: &Framed) {
		let third = self.demux.end_minute(self.decoder.minute_phase());
		let result = self.decoder.decode(
			self.startup,
			self.framer.minute_length(),
			self.framer.take_duration(),
			self.framer.buffer(),
			&mut self.time
		);
		self.display.minute(&result, &self.time);

		if let Some(buffer) = third {
			let alarm = (buffer.kind == MessageKind::CivilAlarm)
				.then(|| decode_alarm(&buffer));
			self.display.third_party(&buffer, alarm.as_ref());
		}

		let safe = clock::is_safe(self.startup, &result, framed.marker, &self.last_bit);
		let decision = match (self.applier.as_deref_mut(), safe) {
			(Some(applier), true) => clock::apply(&self.time, applier),
			_ => ClockDecision { safe, status: ClockStatus::Unsafe }
		};
		self.display.clock(&decision);

		if self.startup > 0 {
			self.startup -= 1;
		}
	}
}

#[cfg(test)]
mod tests {
	extern crate std;
	use std::vec::Vec;
	use calendar::{Dst, TimeSpec};
	use super::*;

	struct ScriptedSource {
		events: Vec<Event>,
		next: usize
	}

	impl ScriptedSource {
		fn new(events: Vec<Event>) -> ScriptedSource {
			ScriptedSource { events, next: 0 }
		}
	}

	impl Source for ScriptedSource {
		fn next_event(&mut self) -> Option<Event> {
			let event = self.events.get(self.next).copied();
			self.next += 1;
			event
		}
	}

	#[derive(Default)]
	struct RecordingDisplay {
		symbols: usize,
		minutes: Vec<(DecodeResult, CalendarTime)>,
		third_parties: usize,
		clocks: Vec<ClockDecision>,
		cutoffs: Vec<f64>
	}

	impl Display for RecordingDisplay {
		fn symbol(&mut self, _symbol: &BitSymbol, _framed: &Framed, _buffer: &[u8; BUFLEN]) {
			self.symbols += 1;
		}

		fn minute(&mut self, result: &DecodeResult, time: &CalendarTime) {
			self.minutes.push((*result, *time));
		}

		fn third_party(&mut self, _buffer: &ThirdPartyBuffer, _alarm: Option<&AlarmMessage>) {
			self.third_parties += 1;
		}

		fn clock(&mut self, decision: &ClockDecision) {
			self.clocks.push(*decision);
		}

		fn cutoff(&mut self, value: f64) {
			self.cutoffs.push(value);
		}
	}

	/// Encode a calendar time into the symbols of one minute frame, marker included.
	fn minute_symbols(time: &CalendarTime) -> Vec<Event> {
		let mut frame = [0u8; BUFLEN];
		frame[17] = (time.dst == Dst::Daylight) as u8;
		frame[18] = (time.dst == Dst::Standard) as u8;
		frame[20] = 1;
		let mut encode = |first: usize, count: usize, value: u8| {
			let mut v = (value % 10) | ((value / 10) << 4);
			for i in 0..count {
				frame[first + i] = v & 1;
				v >>= 1;
			}
		};
		encode(21, 7, time.minute);
		encode(29, 6, time.hour);
		encode(36, 6, time.day);
		encode(42, 3, time.wday);
		encode(45, 5, time.month);
		encode(50, 8, (time.year % 100) as u8);
		frame[28] = frame[21..28].iter().fold(0, |a, &b| a ^ b);
		frame[35] = frame[29..35].iter().fold(0, |a, &b| a ^ b);
		frame[58] = frame[36..58].iter().fold(0, |a, &b| a ^ b);

		let mut events: Vec<Event> = frame[..59].iter()
			.map(|&b| Event::Symbol(BitSymbol::bit(b)))
			.collect();
		events.push(Event::Symbol(BitSymbol::minute_marker()));
		events
	}

	fn june15(minute: u8) -> CalendarTime {
		CalendarTime {
			year: 2024, month: 6, day: 15, wday: 6, hour: 9, minute, dst: Dst::Daylight
		}
	}

	#[test]
	fn run_minute_test() {
		let mut display = RecordingDisplay::default();
		let mut events = minute_symbols(&june15(34));
		events.insert(0, Event::Cutoff(1.5));
		let mut source = ScriptedSource::new(events);
		let mut orchestrator = Orchestrator::new(&mut display);
		orchestrator.run(&mut source);
		assert_eq!(*orchestrator.time(), june15(34));
		assert_eq!(display.symbols, 60);
		assert_eq!(display.minutes.len(), 1);
		assert!(display.minutes[0].0.committed);
		assert_eq!(display.cutoffs, [1.5]);
		// Startup minutes are never safe
		assert_eq!(display.clocks, [
			ClockDecision { safe: false, status: ClockStatus::Unsafe }
		]);
	}

	#[test]
	fn quit_request_test() {
		struct QuitAfter(usize);
		impl InputController for QuitAfter {
			fn quit_requested(&mut self) -> bool {
				self.0 = self.0.saturating_sub(1);
				self.0 == 0
			}
		}
		let mut display = RecordingDisplay::default();
		let mut input = QuitAfter(10);
		let mut source = ScriptedSource::new(minute_symbols(&june15(34)));
		Orchestrator::new(&mut display).with_input(&mut input).run(&mut source);
		assert_eq!(display.symbols, 9);
		assert!(display.minutes.is_empty());
	}

	#[test]
	fn sink_records_all_events_test() {
		#[derive(Default)]
		struct RecordingSink {
			events: Vec<Event>,
			flushed: bool
		}
		impl LogSink for RecordingSink {
			fn append(&mut self, event: &Event) {
				self.events.push(*event);
			}

			fn flush(&mut self) {
				self.flushed = true;
			}
		}
		let mut display = RecordingDisplay::default();
		let mut sink = RecordingSink::default();
		let mut events = minute_symbols(&june15(34));
		events.push(Event::Duration(120_000));
		let mut source = ScriptedSource::new(events.clone());
		Orchestrator::new(&mut display).with_sink(&mut sink).run(&mut source);
		assert_eq!(sink.events, events);
		assert!(sink.flushed);
	}

	#[test]
	fn clock_applied_after_startup_test() {
		struct MockApplier {
			sets: Vec<TimeSpec>
		}
		impl ClockApplier for MockApplier {
			fn utc_offset(&mut self) -> Option<i64> {
				Some(7200)
			}

			fn set(&mut self, time: TimeSpec) -> bool {
				self.sets.push(time);
				true
			}
		}
		let mut display = RecordingDisplay::default();
		let mut applier = MockApplier { sets: Vec::new() };
		let mut events = Vec::new();
		for minute in 34..37 {
			events.extend(minute_symbols(&june15(minute)));
		}
		let mut source = ScriptedSource::new(events);
		Orchestrator::new(&mut display).with_applier(&mut applier).run(&mut source);

		// The first two minutes are startup, only the third passes the gate
		assert_eq!(display.clocks.len(), 3);
		assert!(!display.clocks[0].safe);
		assert!(!display.clocks[1].safe);
		assert_eq!(display.clocks[2],
		           ClockDecision { safe: true, status: ClockStatus::Ok });
		assert_eq!(applier.sets.len(), 1);
		// 09:36 CEST on a host two hours east of UTC
		assert_eq!(applier.sets[0].sec, 1718436840 + 120);
	}
}
