//! Host statistics for the status screen.
//!
//! Collection never fails as a whole: each field degrades to "unknown" on its
//! own, so one unreadable /proc file cannot blank the screen.

pub mod actions;
pub mod network;
pub mod probe;
pub mod procfs;

use std::path::{Path, PathBuf};

pub use network::NetworkInterface;

pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemSnapshot {
    pub uptime: String,
    pub cpu_model: String,
    pub cpu_cores: usize,
    pub memory_usage: String,
    pub disk_size: String,
    pub disk_count: usize,
    pub current_time: String,
    pub ip_address: String,
    pub device_id: Option<String>,
}

impl Default for SystemSnapshot {
    fn default() -> Self {
        Self {
            uptime: UNKNOWN.into(),
            cpu_model: UNKNOWN.into(),
            cpu_cores: 1,
            memory_usage: UNKNOWN.into(),
            disk_size: UNKNOWN.into(),
            disk_count: 1,
            current_time: UNKNOWN.into(),
            ip_address: UNKNOWN.into(),
            device_id: None,
        }
    }
}

impl SystemSnapshot {
    /// The status lines exactly as painted. The painter fingerprints these.
    pub fn field_lines(&self) -> Vec<String> {
        vec![
            format!("Uptime: {}", self.uptime),
            format!("Processor: {} x{} cores", self.cpu_model, self.cpu_cores),
            format!("Memory: {}", self.memory_usage),
            format!("System disk: {} ({} disks)", self.disk_size, self.disk_count),
            format!("Time: {}", self.current_time),
            format!("IP address: {}", self.ip_address),
            format!("Device ID: {}", self.device_id.as_deref().unwrap_or(UNKNOWN)),
        ]
    }
}

/// Where the status screen gets its numbers.
pub trait SystemInfoSource: Send + Sync {
    fn snapshot(&self) -> SystemSnapshot;
    fn network_interfaces(&self) -> Vec<NetworkInterface>;
}

/// Reads a live Linux host through /proc, statvfs and getifaddrs.
#[derive(Debug, Clone)]
pub struct ProcSystemInfo {
    proc_root: PathBuf,
    device_id_file: Option<PathBuf>,
}

impl ProcSystemInfo {
    pub fn new(device_id_file: Option<PathBuf>) -> Self {
        Self::with_proc_root("/proc", device_id_file)
    }

    pub fn with_proc_root(proc_root: impl Into<PathBuf>, device_id_file: Option<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            device_id_file,
        }
    }

    fn read_proc(&self, name: &str) -> Option<String> {
        std::fs::read_to_string(self.proc_root.join(name)).ok()
    }

    fn disk_size(&self) -> Option<String> {
        let stat = nix::sys::statvfs::statvfs("/").ok()?;
        let total = (stat.blocks() as u64).checked_mul(stat.fragment_size() as u64)?;
        (total > 0).then(|| procfs::format_bytes(total))
    }

    fn device_id(&self) -> Option<String> {
        read_device_id(self.device_id_file.as_deref()?)
    }
}

/// First non-empty line of the identifier file.
pub fn read_device_id(path: &Path) -> Option<String> {
    let raw = std::fs::read_to_string(path).ok()?;
    let id = raw.lines().next()?.trim();
    (!id.is_empty()).then(|| id.to_string())
}

impl SystemInfoSource for ProcSystemInfo {
    fn snapshot(&self) -> SystemSnapshot {
        let mut snap = SystemSnapshot::default();

        if let Some(uptime) = self.read_proc("uptime").and_then(|r| procfs::parse_uptime(&r)) {
            snap.uptime = uptime;
        }
        if let Some((model, cores)) = self.read_proc("cpuinfo").and_then(|r| procfs::parse_cpuinfo(&r)) {
            snap.cpu_model = model;
            snap.cpu_cores = cores;
        }
        if let Some(mem) = self.read_proc("meminfo").and_then(|r| procfs::parse_meminfo(&r)) {
            snap.memory_usage = mem;
        }
        if let Some(size) = self.disk_size() {
            snap.disk_size = size;
        }
        if let Some(mounts) = self.read_proc("mounts") {
            snap.disk_count = procfs::count_disk_devices(&mounts);
        }
        snap.current_time = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        snap.ip_address = network::primary_ipv4(&self.network_interfaces())
            .unwrap_or_else(|| "no address".to_string());
        snap.device_id = self.device_id();
        snap
    }

    fn network_interfaces(&self) -> Vec<NetworkInterface> {
        network::list_interfaces().unwrap_or_else(|e| {
            tracing::warn!("getifaddrs failed: {}", e);
            Vec::new()
        })
    }
}
