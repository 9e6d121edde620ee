//! `perf_event_open`-backed [`CounterGroup`].
//!
//! Grounded on `tools/llvm-mc-bench/counters_linux.cpp` in the original
//! implementation: one leader (`hardware cycles`), three followers
//! (`instructions`, `L1-D read misses`, `context switches`), and an
//! optional fifth follower for a retired-µops event, opened by trying each
//! of a short list of raw event codes until one succeeds.

use std::mem;
use std::os::unix::io::RawFd;

use tracing::warn;

use crate::error::CounterError;
use crate::group::{CounterGroup, CounterKind, CounterSample};
use crate::perf_sys::{
    self, GroupReadEntry, GroupReadHeader, PerfEventAttr, ATTR_FLAG_DISABLED,
    ATTR_FLAG_EXCLUDE_HV, ATTR_FLAG_EXCLUDE_KERNEL, L1D_READ_MISS_CONFIG, PERF_COUNT_HW_CPU_CYCLES,
    PERF_COUNT_HW_INSTRUCTIONS, PERF_COUNT_SW_CONTEXT_SWITCHES, PERF_EVENT_IOC_DISABLE,
    PERF_EVENT_IOC_ENABLE, PERF_EVENT_IOC_ID, PERF_EVENT_IOC_RESET, PERF_FORMAT_GROUP,
    PERF_FORMAT_ID, PERF_IOC_FLAG_GROUP, PERF_TYPE_HARDWARE, PERF_TYPE_HW_CACHE,
    PERF_TYPE_RAW, PERF_TYPE_SOFTWARE,
};

/// Raw `PERF_TYPE_RAW` event codes tried, in order, for a retired-µops
/// alias. The first one the kernel accepts is used; none succeeding means
/// the fifth counter is silently omitted rather than the group failing to
/// open.
const MICRO_OPS_RAW_ALIASES: &[u64] = &[
    0x01c2, // Intel: UOPS_RETIRED.RETIRE_SLOTS (event c2, umask 01)
    0x02c2, // Intel: UOPS_RETIRED.ALL (some microarchitectures, umask 02)
    0x000100aa, // AMD Zen: RETIRED_UOPS / OP_CACHE_HIT (approximate)
];

struct OpenCounter {
    fd: RawFd,
    id: u64,
    kind: CounterKind,
}

/// A live PMU counter group opened against the calling thread/CPU pair
/// (`pid = 0`, `cpu = -1`: "measure this thread wherever it runs").
pub struct PerfCounterGroup {
    leader_fd: RawFd,
    followers: Vec<OpenCounter>,
    leader_kind: CounterKind,
    leader_id: u64,
    read_buf: Vec<u8>,
}

impl PerfCounterGroup {
    /// Open the fixed counter list against the current thread. Any failure
    /// to open a counter is returned to the caller; treating that as fatal
    /// is the responsibility of the sandboxed child entry point, not this
    /// constructor.
    pub fn open() -> Result<Self, CounterError> {
        let leader = open_hardware(PERF_COUNT_HW_CPU_CYCLES, -1, "cycles")?;
        let mut followers = Vec::new();

        followers.push(OpenCounter {
            fd: open_hardware(PERF_COUNT_HW_INSTRUCTIONS, leader.0, "instructions")?.0,
            id: read_id(leader.0, "instructions")?,
            kind: CounterKind::Instructions,
        });
        followers.push(OpenCounter {
            fd: open_cache(L1D_READ_MISS_CONFIG, leader.0, "l1d_read_misses")?,
            id: read_id(leader.0, "l1d_read_misses")?,
            kind: CounterKind::CacheMisses,
        });
        followers.push(OpenCounter {
            fd: open_software(PERF_COUNT_SW_CONTEXT_SWITCHES, leader.0, "context_switches")?,
            id: read_id(leader.0, "context_switches")?,
            kind: CounterKind::ContextSwitches,
        });

        if let Some(fd) = open_micro_ops(leader.0) {
            match read_id(leader.0, "micro_ops") {
                Ok(id) => followers.push(OpenCounter {
                    fd,
                    id,
                    kind: CounterKind::MicroOps,
                }),
                Err(err) => warn!(%err, "micro-ops counter opened but id lookup failed, dropping"),
            }
        }

        let group_size = 4096;
        Ok(Self {
            leader_fd: leader.0,
            leader_kind: CounterKind::Cycles,
            leader_id: leader.1,
            followers,
            read_buf: vec![0u8; group_size],
        })
    }
}

impl Drop for PerfCounterGroup {
    fn drop(&mut self) {
        for follower in &self.followers {
            unsafe {
                libc::close(follower.fd);
            }
        }
        unsafe {
            libc::close(self.leader_fd);
        }
    }
}

impl CounterGroup for PerfCounterGroup {
    fn start(&mut self) -> Result<(), CounterError> {
        ioctl_group(self.leader_fd, PERF_EVENT_IOC_RESET, "RESET")?;
        ioctl_group(self.leader_fd, PERF_EVENT_IOC_ENABLE, "ENABLE")?;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CounterError> {
        ioctl_group(self.leader_fd, PERF_EVENT_IOC_DISABLE, "DISABLE")?;
        let n = unsafe {
            libc::read(
                self.leader_fd,
                self.read_buf.as_mut_ptr() as *mut libc::c_void,
                self.read_buf.len(),
            )
        };
        if n < 0 {
            return Err(CounterError::Read(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    fn flush(&mut self, callback: &mut dyn FnMut(&[CounterSample])) {
        let header = unsafe { &*(self.read_buf.as_ptr() as *const GroupReadHeader) };
        let entries_ptr = unsafe {
            self.read_buf
                .as_ptr()
                .add(mem::size_of::<GroupReadHeader>()) as *const GroupReadEntry
        };
        let entries = unsafe { std::slice::from_raw_parts(entries_ptr, header.nr as usize) };

        let mut samples = Vec::with_capacity(entries.len());
        for entry in entries {
            let kind = if entry.id == self.leader_id {
                Some(self.leader_kind)
            } else {
                self.followers
                    .iter()
                    .find(|f| f.id == entry.id)
                    .map(|f| f.kind)
            };
            if let Some(kind) = kind {
                samples.push(CounterSample {
                    kind,
                    value: entry.value,
                });
            }
        }
        callback(&samples);
    }
}

fn base_attr(type_: u32, config: u64, is_leader: bool) -> PerfEventAttr {
    let mut attr = PerfEventAttr {
        type_,
        size: mem::size_of::<PerfEventAttr>() as u32,
        config,
        read_format: PERF_FORMAT_GROUP | PERF_FORMAT_ID,
        flags: ATTR_FLAG_EXCLUDE_KERNEL | ATTR_FLAG_EXCLUDE_HV,
        ..Default::default()
    };
    if is_leader {
        attr.flags |= ATTR_FLAG_DISABLED;
    }
    attr
}

fn open_hardware(config: u64, group_fd: RawFd, name: &'static str) -> Result<(RawFd, u64), CounterError> {
    let is_leader = group_fd == -1;
    let attr = base_attr(PERF_TYPE_HARDWARE, config, is_leader);
    let fd = unsafe { perf_sys::perf_event_open(&attr, 0, -1, group_fd, 0) };
    if fd < 0 {
        return Err(CounterError::Open {
            event: name,
            source: std::io::Error::last_os_error(),
        });
    }
    let fd = fd as RawFd;
    let id = if is_leader { read_id(fd, name)? } else { 0 };
    Ok((fd, id))
}

fn open_cache(config: u64, group_fd: RawFd, name: &'static str) -> Result<RawFd, CounterError> {
    let attr = base_attr(PERF_TYPE_HW_CACHE, config, false);
    let fd = unsafe { perf_sys::perf_event_open(&attr, 0, -1, group_fd, 0) };
    if fd < 0 {
        return Err(CounterError::Open {
            event: name,
            source: std::io::Error::last_os_error(),
        });
    }
    Ok(fd as RawFd)
}

fn open_software(config: u64, group_fd: RawFd, name: &'static str) -> Result<RawFd, CounterError> {
    let attr = base_attr(PERF_TYPE_SOFTWARE, config, false);
    let fd = unsafe { perf_sys::perf_event_open(&attr, 0, -1, group_fd, 0) };
    if fd < 0 {
        return Err(CounterError::Open {
            event: name,
            source: std::io::Error::last_os_error(),
        });
    }
    Ok(fd as RawFd)
}

/// Try each recognized retired-µops alias until the kernel accepts one.
/// Unlike the other counters this is not fatal on failure: the event is
/// optional.
fn open_micro_ops(group_fd: RawFd) -> Option<RawFd> {
    for &config in MICRO_OPS_RAW_ALIASES {
        let attr = base_attr(PERF_TYPE_RAW, config, false);
        let fd = unsafe { perf_sys::perf_event_open(&attr, 0, -1, group_fd, 0) };
        if fd >= 0 {
            return Some(fd as RawFd);
        }
    }
    None
}

fn read_id(fd: RawFd, name: &'static str) -> Result<u64, CounterError> {
    let mut id: u64 = 0;
    let rc = unsafe { libc::ioctl(fd, PERF_EVENT_IOC_ID, &mut id as *mut u64) };
    if rc < 0 {
        return Err(CounterError::Ioctl {
            request: name,
            source: std::io::Error::last_os_error(),
        });
    }
    Ok(id)
}

fn ioctl_group(fd: RawFd, request: libc::c_ulong, name: &'static str) -> Result<(), CounterError> {
    let rc = unsafe { libc::ioctl(fd, request, PERF_IOC_FLAG_GROUP) };
    if rc < 0 {
        return Err(CounterError::Ioctl {
            request: name,
            source: std::io::Error::last_os_error(),
        });
    }
    Ok(())
}
