//! Raw `perf_event_open(2)` ABI bits `libc` doesn't expose.
//!
//! `libc` gives us `SYS_perf_event_open` but not the `perf_event_attr`
//! layout or the `PERF_EVENT_IOC_*` ioctl numbers, which aren't real
//! ioctls in the `_IOC`-registry sense — they're synthesized with the
//! kernel's `_IO`/_IOR` macros over the `'$'` (0x24) magic. Values below
//! are computed the same way `<linux/perf_event.h>` does and are stable
//! across kernel versions.

#![allow(dead_code)]

pub const PERF_TYPE_HARDWARE: u32 = 0;
pub const PERF_TYPE_SOFTWARE: u32 = 1;
pub const PERF_TYPE_HW_CACHE: u32 = 3;
pub const PERF_TYPE_RAW: u32 = 4;

pub const PERF_COUNT_HW_CPU_CYCLES: u64 = 0;
pub const PERF_COUNT_HW_INSTRUCTIONS: u64 = 1;

pub const PERF_COUNT_HW_CACHE_L1D: u64 = 0;
pub const PERF_COUNT_HW_CACHE_OP_READ: u64 = 0;
pub const PERF_COUNT_HW_CACHE_RESULT_MISS: u64 = 1;

pub const PERF_COUNT_SW_CONTEXT_SWITCHES: u64 = 3;

/// `config` for `PERF_TYPE_HW_CACHE`: `L1D | (READ << 8) | (MISS << 16)`.
pub const L1D_READ_MISS_CONFIG: u64 =
    PERF_COUNT_HW_CACHE_L1D | (PERF_COUNT_HW_CACHE_OP_READ << 8) | (PERF_COUNT_HW_CACHE_RESULT_MISS << 16);

pub const PERF_FORMAT_ID: u64 = 1 << 2;
pub const PERF_FORMAT_GROUP: u64 = 1 << 3;

pub const ATTR_FLAG_DISABLED: u64 = 1 << 0;
pub const ATTR_FLAG_EXCLUDE_KERNEL: u64 = 1 << 5;
pub const ATTR_FLAG_EXCLUDE_HV: u64 = 1 << 6;

pub const PERF_EVENT_IOC_ENABLE: libc::c_ulong = 0x2400;
pub const PERF_EVENT_IOC_DISABLE: libc::c_ulong = 0x2401;
pub const PERF_EVENT_IOC_RESET: libc::c_ulong = 0x2403;
pub const PERF_EVENT_IOC_ID: libc::c_ulong = 0x8008_2407;
pub const PERF_IOC_FLAG_GROUP: libc::c_ulong = 1;

/// Mirrors `struct perf_event_attr`'s fixed prefix — the fields every
/// kernel since `PERF_ATTR_SIZE_VER0` accepts. `flags` packs the bitfield
/// bits this crate sets (`disabled`, `exclude_kernel`, `exclude_hv`); all
/// other bitfield bits are left zero.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct PerfEventAttr {
    pub type_: u32,
    pub size: u32,
    pub config: u64,
    pub sample_period_or_freq: u64,
    pub sample_type: u64,
    pub read_format: u64,
    pub flags: u64,
    pub wakeup_events_or_bp_type: u32,
    pub config1: u32,
    pub config2: u64,
    pub branch_sample_type: u64,
    pub sample_regs_user: u64,
    pub sample_stack_user: u32,
    pub clockid: i32,
    pub sample_regs_intr: u64,
    pub aux_watermark: u32,
    pub sample_max_stack: u16,
    pub reserved_2: u16,
}

/// `read(2)` layout for `PERF_FORMAT_GROUP | PERF_FORMAT_ID`: a leading
/// count, then `(value, id)` pairs, one per counter in the group.
#[repr(C)]
pub struct GroupReadHeader {
    pub nr: u64,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct GroupReadEntry {
    pub value: u64,
    pub id: u64,
}

/// `perf_event_open(2)`. `group_fd = -1` opens a new group leader.
///
/// # Safety
/// `attr` must be a validly initialized `perf_event_attr` with `size` set
/// to `size_of::<PerfEventAttr>()`.
pub unsafe fn perf_event_open(
    attr: &PerfEventAttr,
    pid: libc::pid_t,
    cpu: libc::c_int,
    group_fd: libc::c_int,
    flags: libc::c_ulong,
) -> libc::c_long {
    libc::syscall(
        libc::SYS_perf_event_open,
        attr as *const PerfEventAttr,
        pid,
        cpu,
        group_fd,
        flags,
    )
}
