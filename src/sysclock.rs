//! System clock access through libc.

use core::mem::MaybeUninit;

use calendar::{now, timestamp_from_tm, TimeSpec, Tm};
use dcf77::clock::ClockApplier;

/// Applies decoded time to the real system clock.
pub struct SystemClock;

impl ClockApplier for SystemClock {
	/// Compute the host's local-minus-UTC offset by decomposing the current clock into local
	/// calendar fields and re-encoding them as if they were UTC.
	fn utc_offset(&mut self) -> Option<i64> {
		let current = now()?;
		let t = current.sec as libc::time_t;
		let mut local = MaybeUninit::<libc::tm>::uninit();
		// Safety:
		// - localtime_r does not modify t and only writes local
		// - a non-null return means local is successfully initialized
		let local = unsafe {
			if libc::localtime_r(&t, local.as_mut_ptr()).is_null() {
				return None
			}
			local.assume_init()
		};
		if local.tm_year < 0 {
			return None
		}
		let tm = Tm {
			min: local.tm_min as u8,
			hour: local.tm_hour as u8,
			day: local.tm_mday as u8,
			mon: local.tm_mon as u8 + 1,
			year: local.tm_year as u16,
			wday: local.tm_wday as u8,
			yday: local.tm_yday as u16 + 1
		};
		Some(timestamp_from_tm(&tm) + local.tm_sec as i64 - current.sec)
	}

	fn set(&mut self, time: TimeSpec) -> bool {
		let ts = libc::timespec {
			tv_sec: time.sec as libc::time_t,
			tv_nsec: time.nsec as _
		};
		// Safety: clock_settime only reads ts
		unsafe { libc::clock_settime(libc::CLOCK_REALTIME, &ts) == 0 }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn utc_offset_test() {
		// Whatever the host timezone, the offset is a whole number of minutes within a day
		let offset = SystemClock.utc_offset().expect("Failed to read the host clock");
		assert_eq!(offset % 60, 0);
		assert!(offset.abs() < 24 * 3600);
	}
}
