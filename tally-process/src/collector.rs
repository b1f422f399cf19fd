//! Pull-style collection of process resource usage.

/// A point-in-time snapshot of the current process's resource usage.
///
/// Fields the platform cannot supply are `None` and are simply skipped when
/// the poller reports the snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProcessUsage {
    /// Virtual memory size, in bytes.
    pub virtual_memory_bytes: Option<u64>,
    /// Resident set size, in bytes.
    pub resident_memory_bytes: Option<u64>,
    /// Process start time, in seconds since the Unix epoch.
    pub start_time_seconds: Option<f64>,
    /// Cumulative user plus system CPU time, in seconds.
    pub cpu_seconds_total: Option<f64>,
    /// Soft limit on the number of open file descriptors.
    pub max_file_descriptors: Option<u64>,
    /// Number of currently open file descriptors.
    pub open_file_descriptors: Option<u64>,
}

/// Collects a snapshot of the current process's resource usage.
///
/// Returns `None` on platforms without procfs support.
pub fn collect() -> Option<ProcessUsage> {
    imp::collect()
}

#[cfg(any(target_os = "linux", test))]
mod parse {
    pub(crate) struct StatTimes {
        pub(crate) utime: u64,
        pub(crate) stime: u64,
        pub(crate) starttime: u64,
    }

    /// Parses the clock-tick fields out of a `/proc/<pid>/stat` line.
    ///
    /// The second field, the command name, is parenthesized and may itself
    /// contain spaces and parentheses, so fixed-position parsing only starts
    /// after the last closing parenthesis.
    pub(crate) fn stat_times(stat: &str) -> Option<StatTimes> {
        let rest = stat.rsplit_once(')')?.1;
        let fields: Vec<&str> = rest.split_whitespace().collect();
        // proc(5) numbers utime, stime, and starttime as fields 14, 15, and
        // 22; the slice starts at field 3 (state).
        let utime = fields.get(11)?.parse().ok()?;
        let stime = fields.get(12)?.parse().ok()?;
        let starttime = fields.get(19)?.parse().ok()?;
        Some(StatTimes { utime, stime, starttime })
    }

    /// Parses a kilobyte-valued field such as `VmRSS:    1024 kB` out of
    /// `/proc/<pid>/status`, returning bytes.
    pub(crate) fn status_kb(status: &str, name: &str) -> Option<u64> {
        for line in status.lines() {
            if let Some(rest) = line.strip_prefix(name) {
                let value = rest.strip_prefix(':')?.trim().trim_end_matches("kB").trim();
                return value.parse::<u64>().ok().map(|kb| kb.saturating_mul(1024));
            }
        }
        None
    }

    /// Parses the soft "Max open files" limit out of `/proc/<pid>/limits`.
    pub(crate) fn max_open_files(limits: &str) -> Option<u64> {
        for line in limits.lines() {
            if let Some(rest) = line.strip_prefix("Max open files") {
                return rest.split_whitespace().next()?.parse().ok();
            }
        }
        None
    }

    /// Parses the boot time, in seconds since the epoch, out of `/proc/stat`.
    pub(crate) fn boot_time(stat: &str) -> Option<u64> {
        for line in stat.lines() {
            if let Some(rest) = line.strip_prefix("btime ") {
                return rest.trim().parse().ok();
            }
        }
        None
    }
}

#[cfg(target_os = "linux")]
mod imp {
    use std::fs;

    use super::{parse, ProcessUsage};

    pub(super) fn collect() -> Option<ProcessUsage> {
        let ticks = ticks_per_second()?;
        let mut usage = ProcessUsage::default();

        if let Ok(status) = fs::read_to_string("/proc/self/status") {
            usage.virtual_memory_bytes = parse::status_kb(&status, "VmSize");
            usage.resident_memory_bytes = parse::status_kb(&status, "VmRSS");
        }

        if let Some(times) =
            fs::read_to_string("/proc/self/stat").ok().and_then(|stat| parse::stat_times(&stat))
        {
            usage.cpu_seconds_total = Some((times.utime + times.stime) as f64 / ticks);
            usage.start_time_seconds = fs::read_to_string("/proc/stat")
                .ok()
                .and_then(|stat| parse::boot_time(&stat))
                .map(|btime| btime as f64 + times.starttime as f64 / ticks);
        }

        usage.max_file_descriptors = fs::read_to_string("/proc/self/limits")
            .ok()
            .and_then(|limits| parse::max_open_files(&limits));

        // The directory handle used for the walk is itself an open
        // descriptor; leave it out of the count.
        usage.open_file_descriptors = fs::read_dir("/proc/self/fd")
            .ok()
            .map(|entries| entries.filter_map(Result::ok).count().saturating_sub(1) as u64);

        Some(usage)
    }

    fn ticks_per_second() -> Option<f64> {
        let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        (ticks > 0).then(|| ticks as f64)
    }
}

#[cfg(not(target_os = "linux"))]
mod imp {
    use super::ProcessUsage;

    pub(super) fn collect() -> Option<ProcessUsage> {
        None
    }
}
