//! Error types used across modules.
//!
//! This module contains the error types that may be created and used within this crate. See
//! individual error types for documentation.

use std::ffi::OsString;
use std::{error, fmt, io};

/// The error type for a decoding run.
pub enum RunError {
	/// The input log file could not be read. The file name and underlying error are provided in
	/// the payload.
	LogOpen(OsString, io::Error),
	/// The output log file could not be created. The file name and underlying error are provided
	/// in the payload.
	LogCreate(OsString, io::Error),
	/// Writing to the output log file failed. The underlying error is provided in the payload.
	LogWrite(io::Error)
}

impl fmt::Display for RunError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RunError::LogOpen(n, e) => write!(f, "Failed to read log file {:?}: {}", n, e),
			RunError::LogCreate(n, e) => write!(f, "Failed to create output log {:?}: {}", n, e),
			RunError::LogWrite(e) => write!(f, "Failed to write output log: {}", e)
		}
	}
}

impl fmt::Debug for RunError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(self, f)
	}
}

impl error::Error for RunError {}
