//! Best-effort real-time setup (Linux: mlockall, SCHED_FIFO, CPU affinity).
//!
//! Every step is optional: a failure is logged and the weld path runs on the
//! normal scheduler.

use crate::cli::{RtLock, RtOpts};

#[cfg(target_os = "linux")]
const CAP_SYS_NICE_BIT: u64 = 1 << 23;

/// Apply `opts` once per process. Later calls are no-ops.
pub fn setup_rt_once(opts: &RtOpts) {
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();

    if !opts.rt {
        return;
    }
    RT_ONCE.get_or_init(|| apply(opts));
}

#[cfg(target_os = "linux")]
fn apply(opts: &RtOpts) {
    let lock = opts.rt_lock.unwrap_or_else(RtLock::os_default);
    match lock_memory(lock) {
        Ok(()) => tracing::info!(mode = ?lock, "rt: memory lock applied"),
        Err(e) => tracing::warn!(error = %e, "rt: mlockall failed"),
    }
    match set_fifo_priority(opts.rt_prio) {
        Ok(prio) => tracing::info!(prio, "rt: SCHED_FIFO applied"),
        Err(e) => tracing::warn!(error = %e, "rt: SCHED_FIFO not applied"),
    }
    let cpu = opts.rt_cpu.unwrap_or(0);
    match pin_to_cpu(cpu) {
        Ok(()) => tracing::info!(cpu, "rt: affinity applied"),
        Err(e) => tracing::warn!(cpu, error = %e, "rt: affinity not applied"),
    }
}

#[cfg(not(target_os = "linux"))]
fn apply(_opts: &RtOpts) {
    tracing::warn!("rt: real-time settings are only supported on Linux; ignoring --rt");
}

#[cfg(target_os = "linux")]
fn memlock_hint() -> Option<String> {
    let mut rlim = std::mem::MaybeUninit::<libc::rlimit>::uninit();
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_MEMLOCK, rlim.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    let cur = unsafe { rlim.assume_init() }.rlim_cur;
    if cur == libc::RLIM_INFINITY {
        Some("memlock limit: unlimited".to_string())
    } else {
        Some(format!("memlock limit: {} KiB", cur / 1024))
    }
}

#[cfg(target_os = "linux")]
fn mlockall(flags: libc::c_int) -> std::io::Result<()> {
    if unsafe { libc::mlockall(flags) } != 0 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn lock_memory(lock: RtLock) -> eyre::Result<()> {
    let flags = match lock {
        RtLock::None => return Ok(()),
        RtLock::Current => libc::MCL_CURRENT,
        RtLock::All => libc::MCL_CURRENT | libc::MCL_FUTURE,
    };
    let Err(err) = mlockall(flags) else {
        return Ok(());
    };
    let retryable = matches!(err.raw_os_error(), Some(c) if c == libc::EPERM || c == libc::ENOMEM);

    // current|future can exceed the memlock limit where current alone fits
    if lock == RtLock::All && retryable && mlockall(libc::MCL_CURRENT).is_ok() {
        tracing::warn!(error = %err, "rt: mlockall(current|future) failed; locked current pages only");
        return Ok(());
    }

    let mut msg = format!("mlockall: {err}");
    if retryable {
        if let Some(h) = memlock_hint() {
            msg.push_str(&format!("; {h}"));
        }
        msg.push_str("; needs CAP_IPC_LOCK (or root) and a sufficient 'ulimit -l'");
    }
    Err(eyre::eyre!(msg))
}

#[cfg(target_os = "linux")]
fn has_sys_nice() -> bool {
    let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
        // Can't tell; let sched_setscheduler decide.
        return true;
    };
    let cap = status.lines().any(|line| {
        if line.starts_with("CapEff:")
            && let Some(hex) = line.split_whitespace().nth(1)
            && let Ok(caps) = u64::from_str_radix(hex, 16)
        {
            return caps & CAP_SYS_NICE_BIT != 0;
        }
        false
    });
    cap || unsafe { libc::geteuid() } == 0
}

#[cfg(target_os = "linux")]
fn set_fifo_priority(prio: Option<i32>) -> eyre::Result<i32> {
    if !has_sys_nice() {
        eyre::bail!(
            "needs CAP_SYS_NICE or root (euid {}); try 'sudo setcap cap_sys_nice=ep $(which welder)'",
            unsafe { libc::geteuid() }
        );
    }
    let (min, max) = unsafe {
        (
            libc::sched_get_priority_min(libc::SCHED_FIFO),
            libc::sched_get_priority_max(libc::SCHED_FIFO),
        )
    };
    let (min, max) = if min < 0 || max < 0 { (1, 99) } else { (min, max) };
    let prio = prio.unwrap_or(max).clamp(min, max);
    let param = libc::sched_param {
        sched_priority: prio,
    };
    if unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) } != 0 {
        return Err(eyre::eyre!(std::io::Error::last_os_error()));
    }
    Ok(prio)
}

#[cfg(target_os = "linux")]
fn pin_to_cpu(cpu: usize) -> eyre::Result<()> {
    let capacity = std::mem::size_of::<libc::cpu_set_t>() * 8;
    if cpu >= capacity {
        eyre::bail!("CPU {cpu} exceeds cpu_set_t capacity {capacity}");
    }
    let online = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if online < 1 {
        eyre::bail!("_SC_NPROCESSORS_ONLN < 1");
    }
    if cpu as libc::c_long >= online {
        eyre::bail!("requested CPU {cpu} >= online {online}");
    }

    let size = std::mem::size_of::<libc::cpu_set_t>();
    let mut allowed: libc::cpu_set_t = unsafe { std::mem::zeroed() };
    if unsafe { libc::sched_getaffinity(0, size, &mut allowed) } != 0 {
        return Err(eyre::eyre!(std::io::Error::last_os_error()));
    }
    if !unsafe { libc::CPU_ISSET(cpu, &allowed) } {
        eyre::bail!("CPU {cpu} not permitted by current affinity mask");
    }

    let mut desired: libc::cpu_set_t = unsafe { std::mem::zeroed() };
    unsafe {
        libc::CPU_ZERO(&mut desired);
        libc::CPU_SET(cpu, &mut desired);
    }
    if unsafe { libc::sched_setaffinity(0, size, &desired) } != 0 {
        return Err(eyre::eyre!(std::io::Error::last_os_error()));
    }
    Ok(())
}
