// Copyright (c) The specfan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

/// CPU time consumed by this process and all of its waited-for children.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct CpuTimes {
    pub(crate) user: Duration,
    pub(crate) system: Duration,
}

impl CpuTimes {
    pub(crate) fn saturating_sub(self, earlier: Self) -> Self {
        Self {
            user: self.user.saturating_sub(earlier.user),
            system: self.system.saturating_sub(earlier.system),
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        impl CpuTimes {
            /// Returns the CPU time used so far, or `None` if it couldn't be determined.
            pub(crate) fn now() -> Option<Self> {
                let own = rusage(libc::RUSAGE_SELF)?;
                let children = rusage(libc::RUSAGE_CHILDREN)?;
                Some(Self {
                    user: own.user + children.user,
                    system: own.system + children.system,
                })
            }
        }

        fn rusage(who: libc::c_int) -> Option<CpuTimes> {
            let mut usage = std::mem::MaybeUninit::<libc::rusage>::zeroed();
            // SAFETY: `usage` is a valid, writable rusage struct.
            let ret = unsafe { libc::getrusage(who, usage.as_mut_ptr()) };
            if ret != 0 {
                tracing::debug!(
                    "getrusage failed: {}",
                    std::io::Error::last_os_error()
                );
                return None;
            }
            // SAFETY: getrusage returned success, so the struct is initialized.
            let usage = unsafe { usage.assume_init() };
            Some(CpuTimes {
                user: timeval_to_duration(usage.ru_utime),
                system: timeval_to_duration(usage.ru_stime),
            })
        }

        fn timeval_to_duration(tv: libc::timeval) -> Duration {
            Duration::from_secs(tv.tv_sec.max(0) as u64)
                + Duration::from_micros(tv.tv_usec.max(0) as u64)
        }
    } else {
        impl CpuTimes {
            /// CPU times aren't tracked on this platform.
            pub(crate) fn now() -> Option<Self> {
                None
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn cpu_times_are_monotonic() {
        let start = CpuTimes::now().expect("getrusage works");
        // Burn a little CPU.
        let mut acc = 0u64;
        for i in 0..2_000_000u64 {
            acc = acc.wrapping_add(i * i);
        }
        std::hint::black_box(acc);
        let end = CpuTimes::now().expect("getrusage works");
        assert!(end.user >= start.user);
        assert!(end.system >= start.system);
    }
}
