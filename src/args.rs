//! Support for command line argument parsing.
//!
//! See [crate] documentation for details on command line arguments and examples.

use std::error::Error;
use std::ffi::OsString;
use std::fmt::{Display, Debug};

/// The error type for parsing command line arguments.
#[cfg_attr(test, derive(PartialEq))]
pub enum ArgumentsError {
	/// The option was unrecognized. The option is returned as the payload of this variant.
	UnrecognizedOption(String),
	/// Error converting an option or parameter to UTF-8. The argument index and original
	/// [`OsString`] that could not be converted are returned as the payload of this variant.
	InvalidUTF8(usize, OsString),
	/// The required log file argument was missing.
	MissingLogfile,
	/// More than one log file argument was supplied. The extra argument is returned as the
	/// payload of this variant.
	ExtraLogfile(String),
	/// The parameter for an option was not supplied. The option is returned as the payload for
	/// this variant.
	MissingParameter(String),
	/// Help option (-h) was included, so print help details and exit.
	Help
}

impl Display for ArgumentsError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ArgumentsError::UnrecognizedOption(s) => write!(f, "Unrecognized option: {}", s),
			ArgumentsError::InvalidUTF8(i, v) => write!(f, "Invalid UTF-8 in argument {}: {:?}", i, v),
			ArgumentsError::MissingLogfile => write!(f, "Missing log file input"),
			ArgumentsError::ExtraLogfile(s) => write!(f, "Unexpected extra argument: {}", s),
			ArgumentsError::MissingParameter(s) => write!(f, "Missing parameter for option {}", s),
			ArgumentsError::Help => write!(f, "Help requested")
		}
	}
}

impl Debug for ArgumentsError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		Display::fmt(self, f)
	}
}

impl Error for ArgumentsError {}

/// Convert an argument to [`&str`].
///
/// The function takes the argument index `i`, optional argument name `a`, and the argument `s`.
///
/// # Errors
///
/// Returns [`ArgumentsError::InvalidUTF8`] if the argument could not be converted to UTF-8 or
/// [`ArgumentsError::MissingParameter`] if the argument is `None`.
fn arg_to_str<'a, 'b>(i: usize, a: Option<&'a str>, s: Option<&'b OsString>)
	-> Result<&'b str, ArgumentsError>
{
	match s {
		Some(v) => v.to_str().ok_or_else(|| ArgumentsError::InvalidUTF8(i, v.clone())),
		None => Err(ArgumentsError::MissingParameter(a.map(String::from).unwrap_or_default()))
	}
}

/// Parsed command line arguments.
#[cfg_attr(test, derive(Debug, PartialEq))]
pub struct Arguments {
	/// The log file to replay.
	pub logfile: OsString,
	/// Suppress the per-second bit output.
	pub quiet: bool,
	/// Set the system clock from safely decoded minutes.
	pub set_clock: bool,
	/// File to append a verbatim copy of the replayed log to (if provided).
	pub outlog: Option<OsString>
}

impl Arguments {
	/// Parse command line arguments.
	///
	/// The input can be any type that implements [`Iterator`] that yields [`OsString`], though
	/// typically this would be [`std::env::args_os`]. This function assumes that the application
	/// name is **not** supplied as the first item yielded by `args`, see examples for common use.
	///
	/// # Errors
	///
	/// This function can return any of the variants in [`ArgumentsError`]. See that documentation
	/// for more details.
	///
	/// # Examples
	///
	/// ```
	/// let args = match Arguments::parse(std::env::args_os().skip(1)) {
	/// 	Ok(a) => a,
	/// 	Err(e) => {
	/// 		// Handle error
	/// 		panic!("{}", e);
	/// 	}
	/// };
	/// ```
	pub fn parse(mut args: impl Iterator<Item = OsString>) -> Result<Arguments, ArgumentsError>
	{
		let mut logfile: Option<OsString> = None;
		let mut quiet = false;
		let mut set_clock = false;
		let mut outlog: Option<OsString> = None;
		let mut arg = args.next();
		let mut i = 0;
		loop {
			let Some(current) = arg.as_ref() else { break };
			match arg_to_str(i, None, Some(current))? {
				"-q" | "--quiet" => quiet = true,
				"-S" | "--set-clock" => set_clock = true,
				o @ ("-o" | "--outlog") => {
					match args.next() {
						Some(a) => outlog = Some(a),
						None => return Err(ArgumentsError::MissingParameter(o.to_string()))
					}
					// Increment because we called args.next()
					i += 1;
				},
				"-h" | "--help" => return Err(ArgumentsError::Help),
				v => {
					if v.starts_with('-') {
						return Err(ArgumentsError::UnrecognizedOption(v.to_string()));
					}
					if logfile.is_some() {
						return Err(ArgumentsError::ExtraLogfile(v.to_string()));
					}
					logfile = Some(current.clone());
				}
			}
			arg = args.next();
			// Increment because we called args.next()
			i += 1;
		}

		Ok(Arguments {
			logfile: logfile.ok_or(ArgumentsError::MissingLogfile)?,
			quiet,
			set_clock,
			outlog
		})
	}
}

#[cfg(test)]
mod tests {
	use std::str::FromStr;
	use super::*;

	fn os(args: &[&str]) -> Vec<OsString> {
		args.iter().map(|a| OsString::from_str(a).unwrap()).collect()
	}

	#[test]
	fn arg_to_str_test() {
		let valid = OsString::from_str("test").unwrap();
		assert_eq!(
			arg_to_str(1, Some("arg"), Some(&valid)),
			Ok("test")
		);
		assert_eq!(
			arg_to_str(1, Some("arg"), None),
			Err(ArgumentsError::MissingParameter(String::from("arg")))
		);

		let invalid = unsafe { OsString::from_encoded_bytes_unchecked(vec![b't', 0xff, b's', b't']) };
		assert_eq!(
			arg_to_str(1, Some("arg"), Some(&invalid)),
			Err(ArgumentsError::InvalidUTF8(1, invalid.clone()))
		);
	}

	#[test]
	fn arguments_parse_test() {
		assert_eq!(
			Arguments::parse(os(&["sample.log"]).into_iter()),
			Ok(Arguments {
				logfile: OsString::from_str("sample.log").unwrap(),
				quiet: false,
				set_clock: false,
				outlog: None
			})
		);

		assert_eq!(
			Arguments::parse(os(&["-q", "-S", "-o", "copy.log", "sample.log"]).into_iter()),
			Ok(Arguments {
				logfile: OsString::from_str("sample.log").unwrap(),
				quiet: true,
				set_clock: true,
				outlog: Some(OsString::from_str("copy.log").unwrap())
			})
		);

		assert_eq!(
			Arguments::parse(os(&["sample.log", "--quiet"]).into_iter()),
			Ok(Arguments {
				logfile: OsString::from_str("sample.log").unwrap(),
				quiet: true,
				set_clock: false,
				outlog: None
			})
		);

		assert_eq!(
			Arguments::parse(os(&["-q"]).into_iter()),
			Err(ArgumentsError::MissingLogfile)
		);

		assert_eq!(
			Arguments::parse(os(&["-o"]).into_iter()),
			Err(ArgumentsError::MissingParameter(String::from("-o")))
		);

		assert_eq!(
			Arguments::parse(os(&["--frobnicate", "sample.log"]).into_iter()),
			Err(ArgumentsError::UnrecognizedOption(String::from("--frobnicate")))
		);

		assert_eq!(
			Arguments::parse(os(&["one.log", "two.log"]).into_iter()),
			Err(ArgumentsError::ExtraLogfile(String::from("two.log")))
		);

		assert_eq!(
			Arguments::parse(os(&["-h"]).into_iter()),
			Err(ArgumentsError::Help)
		);
	}
}
