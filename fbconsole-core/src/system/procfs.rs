//! Parsers for the /proc files behind the status screen. Each returns `None`
//! on anything implausible so the caller can show "unknown".

const MAX_UPTIME_SECS: f64 = 100.0 * 365.0 * 24.0 * 3600.0;
const MAX_MODEL_LEN: usize = 100;
const MAX_CPUS: usize = 1024;
const MAX_MEM_KIB: u64 = 1024 * 1024 * 1024;
const MAX_DISK_DEVICES: usize = 100;

/// `/proc/uptime` -> "3d 4h 12m".
pub fn parse_uptime(raw: &str) -> Option<String> {
    let secs: f64 = raw.split_whitespace().next()?.parse().ok()?;
    if !(0.0..=MAX_UPTIME_SECS).contains(&secs) {
        return None;
    }
    let secs = secs as u64;
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    Some(format!("{}d {}h {}m", days, hours, minutes))
}

/// `/proc/cpuinfo` -> (model name, processor count).
pub fn parse_cpuinfo(raw: &str) -> Option<(String, usize)> {
    let mut model = None;
    let mut count = 0usize;
    for line in raw.lines().map(str::trim) {
        if line.starts_with("model name") {
            if let Some((_, value)) = line.split_once(':') {
                let value = value.trim();
                let truncated: String = value.chars().take(MAX_MODEL_LEN).collect();
                model = Some(if truncated.len() < value.len() {
                    format!("{}...", truncated)
                } else {
                    truncated
                });
            }
        } else if line.starts_with("processor") {
            count += 1;
            if count > MAX_CPUS {
                return None;
            }
        }
    }
    let count = if count == 0 {
        std::thread::available_parallelism().map_or(1, |n| n.get())
    } else {
        count
    };
    Some((model.unwrap_or_else(|| "unknown processor".to_string()), count))
}

/// `/proc/meminfo` -> "42.1% (used 1.2 GB / total 3.8 GB)".
pub fn parse_meminfo(raw: &str) -> Option<String> {
    let field = |name: &str| -> Option<u64> {
        raw.lines()
            .find(|l| l.starts_with(name))?
            .split_whitespace()
            .nth(1)?
            .parse()
            .ok()
    };
    let total = field("MemTotal:")?;
    if total == 0 || total > MAX_MEM_KIB {
        return None;
    }
    let available = field("MemAvailable:").filter(|&a| a <= total).unwrap_or(0);
    let used = total - available;
    let percent = used as f64 / total as f64 * 100.0;
    Some(format!(
        "{:.1}% (used {} / total {})",
        percent,
        format_bytes(used * 1024),
        format_bytes(total * 1024)
    ))
}

/// Distinct `/dev/*` sources in `/proc/mounts`, at least one.
pub fn count_disk_devices(raw: &str) -> usize {
    let mut devices: Vec<&str> = Vec::new();
    for source in raw.lines().filter_map(|l| l.split_whitespace().next()) {
        if source.starts_with("/dev/") && !devices.contains(&source) {
            devices.push(source);
            if devices.len() >= MAX_DISK_DEVICES {
                break;
            }
        }
    }
    devices.len().max(1)
}

/// Binary-prefixed size, one decimal.
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{} B", bytes);
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT && exp < 5 {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let prefix = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {}B", bytes as f64 / div as f64, prefix)
}
