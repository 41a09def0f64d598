//! Decode the DCF77 time signal from recorded receiver logs.
//!
//! [DCF77](https://en.wikipedia.org/wiki/DCF77) broadcasts one amplitude-modulated bit per
//! second; 59 or 60 bits form a minute frame carrying the local time in Germany. This
//! application replays a receiver log through the full decoding pipeline (see the [`dcf77`]
//! crate): framing, parity/BCD validation, daylight-saving and leap-second tracking, third-party
//! channel reconstruction, and an optional, gated update of the system clock.
//!
//! # Command Line Arguments
//!
//! General form: `dcf77rx [options...] logfile`
//!
//! In addition to one required argument (the log file to replay), this application supports
//! several optional command line arguments:
//!
//! | Short form | Long form     | Argument | Default | Description                              |
//! | ---------- | ------------- | -------- | ------- | ---------------------------------------- |
//! | `-q`       | `--quiet`     |          | off     | Suppress the per-second bit output       |
//! | `-S`       | `--set-clock` |          | off     | Set the system clock from decoded time   |
//! | `-o`       | `--outlog`    | Filename | None    | Write a verbatim copy of the log         |
//!
//! Setting the system clock requires the privileges to do so and only ever happens for minutes
//! that pass every safety check; without `-S` the check still runs and its verdict is reported.
//! The output log uses the same symbol alphabet as the input (see [`logfile`]), so it replays
//! bit-for-bit.
//!
//! # Examples
//!
//! Replay a log, showing every received bit
//! ```sh
//! dcf77rx sample.log
//! ```
//!
//! Replay quietly and set the system clock from it
//! ```sh
//! dcf77rx -q -S sample.log
//! ```

use std::process::ExitCode;

use dcf77::mainloop::Orchestrator;

use args::{Arguments, ArgumentsError};
use console::ConsoleDisplay;
use error::RunError;
use logfile::{LogSink, LogSource};
use sysclock::SystemClock;

mod args;
mod console;
mod error;
mod logfile;
mod sysclock;

/// Replay the log through the decoding pipeline.
///
/// # Errors
///
/// Returns [`RunError`] when the input log cannot be read or the output log cannot be created
/// or written.
fn run(args: Arguments) -> Result<(), RunError> {
	let mut source = LogSource::open(&args.logfile)?;
	let mut display = ConsoleDisplay::new(args.quiet);
	let mut sink = match args.outlog.as_ref() {
		Some(path) => Some(LogSink::create(path)?),
		None => None
	};
	let mut clock = SystemClock;

	let mut orchestrator = Orchestrator::new(&mut display);
	if let Some(sink) = sink.as_mut() {
		orchestrator = orchestrator.with_sink(sink);
	}
	if args.set_clock {
		orchestrator = orchestrator.with_applier(&mut clock);
	}
	orchestrator.run(&mut source);

	match sink.as_mut().and_then(LogSink::take_error) {
		Some(e) => Err(e),
		None => Ok(())
	}
}

/// Main program entry point.
///
/// Parses input arguments and replays the given receiver log. See [`crate`] documentation for
/// details.
fn main() -> ExitCode {
	let args = match Arguments::parse(std::env::args_os().skip(1)) {
		Ok(a) => a,
		Err(e) => {
			return if let ArgumentsError::Help = e {
				println!("\
Decode the DCF77 time signal from a recorded receiver log.

Usage: dcf77rx [OPTIONS] <LOGFILE>

Options:
  -q, --quiet           suppress the per-second bit output
  -S, --set-clock       set the system clock from safely decoded minutes
  -o, --outlog <FILE>   write a verbatim, replayable copy of the log

Examples:
  dcf77rx sample.log
  dcf77rx -q -S sample.log
  dcf77rx -o copy.log sample.log\n");
				ExitCode::SUCCESS
			} else {
				eprintln!("{}", e);
				ExitCode::FAILURE
			}
		}
	};

	match run(args) {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			eprintln!("{}", e);
			ExitCode::FAILURE
		}
	}
}
