use std::{fs, path::Path};

use serde::{Serialize, ser::SerializeStruct};
use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, RefreshKind, System};
use tracing::warn;

const PROC_STAT: &str = "/proc/stat";

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MemoryStats {
    /// Bytes.
    pub total: u64,
    /// Bytes.
    pub available: u64,
}

impl MemoryStats {
    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.available)
    }

    /// Ratio of *available* to total memory, despite the name. Kept as-is
    /// because consumers already read it this way.
    pub fn used_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.available as f64 / self.total as f64
    }
}

/// Root filesystem usage in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DiskStats {
    pub total: u64,
    pub free: u64,
    pub used: u64,
}

/// Aggregate tick counters from the `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuStats {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuStats {
    pub fn parse(contents: &str) -> Option<CpuStats> {
        let line = contents.lines().find(|line| line.starts_with("cpu "))?;
        let ticks = line
            .split_whitespace()
            .skip(1)
            .map(|field| field.parse::<u64>().ok())
            .collect::<Option<Vec<u64>>>()?;

        if ticks.len() < 4 {
            return None;
        }
        let tick = |i: usize| ticks.get(i).copied().unwrap_or(0);

        Some(CpuStats {
            user: tick(0),
            nice: tick(1),
            system: tick(2),
            idle: tick(3),
            iowait: tick(4),
            irq: tick(5),
            softirq: tick(6),
            steal: tick(7),
        })
    }

    /// Busy fraction of all ticks since boot, in `0.0..=1.0`.
    pub fn usage(&self) -> f64 {
        let idle = self.idle + self.iowait;
        let non_idle = self.user + self.nice + self.system + self.irq + self.softirq + self.steal;
        let total = idle + non_idle;

        if total == 0 {
            return 0.0;
        }
        (total - idle) as f64 / total as f64
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadStats {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

/// Host resource snapshot consumed by the scheduler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stats {
    pub memory: MemoryStats,
    pub disk: DiskStats,
    pub cpu: CpuStats,
    pub load: LoadStats,
    pub cpu_count: usize,
    pub task_count: usize,
}

impl Serialize for Stats {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("Stats", 14)?;
        state.serialize_field("mem_total", &self.memory.total)?;
        state.serialize_field("mem_available", &self.memory.available)?;
        state.serialize_field("mem_used", &self.memory.used())?;
        state.serialize_field("mem_used_percent", &self.memory.used_percent())?;
        state.serialize_field("disk_total", &self.disk.total)?;
        state.serialize_field("disk_free", &self.disk.free)?;
        state.serialize_field("disk_used", &self.disk.used)?;
        state.serialize_field("cpu_usage", &self.cpu.usage())?;
        state.serialize_field("cpu_count", &self.cpu_count)?;
        state.serialize_field("load_1", &self.load.one)?;
        state.serialize_field("load_5", &self.load.five)?;
        state.serialize_field("load_15", &self.load.fifteen)?;
        state.serialize_field("task_count", &self.task_count)?;
        state.serialize_field("system_name", &System::name().unwrap_or_default())?;
        state.end()
    }
}

pub fn get_stats(task_count: usize) -> Stats {
    let sysinfo = System::new_with_specifics(
        RefreshKind::nothing()
            .with_memory(MemoryRefreshKind::everything())
            .with_cpu(CpuRefreshKind::everything()),
    );

    Stats {
        memory: get_memory_info(&sysinfo),
        disk: get_disk_info(),
        cpu: get_cpu_stats(Path::new(PROC_STAT)),
        load: get_load_avg(),
        cpu_count: sysinfo.cpus().len(),
        task_count,
    }
}

fn get_memory_info(sysinfo: &System) -> MemoryStats {
    let total = sysinfo.total_memory();
    if total == 0 {
        warn!("Could not read memory statistics");
        return MemoryStats::default();
    }

    MemoryStats {
        total,
        available: sysinfo.available_memory(),
    }
}

fn get_disk_info() -> DiskStats {
    let disks = Disks::new_with_refreshed_list();
    match disks
        .iter()
        .find(|disk| disk.mount_point() == Path::new("/"))
    {
        Some(disk) => DiskStats {
            total: disk.total_space(),
            free: disk.available_space(),
            used: disk.total_space().saturating_sub(disk.available_space()),
        },
        None => {
            warn!("Could not read disk statistics for /");
            DiskStats::default()
        }
    }
}

pub fn get_cpu_stats(path: &Path) -> CpuStats {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Error reading cpu statistics");
            return CpuStats::default();
        }
    };

    CpuStats::parse(&contents).unwrap_or_else(|| {
        warn!(path = %path.display(), "Malformed cpu statistics");
        CpuStats::default()
    })
}

fn get_load_avg() -> LoadStats {
    let load = System::load_average();
    LoadStats {
        one: load.one,
        five: load.five,
        fifteen: load.fifteen,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROC_STAT_SAMPLE: &str = "\
cpu  4705 356 584 3699 23 23 0 0 0 0
cpu0 1393280 32966 572056 13343292 6130 0 17875 0 0 0
intr 114930548 113199788 3 0 5 263 0 4 [... lots more numbers ...]
";

    #[test]
    fn parses_aggregate_cpu_line() {
        let cpu = CpuStats::parse(PROC_STAT_SAMPLE).unwrap();
        assert_eq!(cpu.user, 4705);
        assert_eq!(cpu.idle, 3699);
        assert_eq!(cpu.iowait, 23);
        assert_eq!(cpu.steal, 0);
    }

    #[test]
    fn cpu_usage_excludes_idle_and_iowait() {
        let cpu = CpuStats {
            user: 30,
            system: 10,
            idle: 50,
            iowait: 10,
            ..Default::default()
        };
        assert!((cpu.usage() - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn cpu_usage_zero_without_ticks() {
        assert_eq!(CpuStats::default().usage(), 0.0);
    }

    #[test]
    fn malformed_cpu_line_is_rejected() {
        assert!(CpuStats::parse("cpu  12 x 3 4").is_none());
        assert!(CpuStats::parse("intr 1 2 3").is_none());
    }

    #[test]
    fn missing_proc_file_yields_zero() {
        let cpu = get_cpu_stats(Path::new("/nonexistent/proc/stat"));
        assert_eq!(cpu, CpuStats::default());
    }

    #[test]
    fn memory_percent_is_available_over_total() {
        let memory = MemoryStats {
            total: 1000,
            available: 250,
        };
        assert_eq!(memory.used(), 750);
        assert!((memory.used_percent() - 0.25).abs() < f64::EPSILON);
        assert_eq!(MemoryStats::default().used_percent(), 0.0);
    }

    #[test]
    fn serializes_derived_values() {
        let stats = Stats {
            memory: MemoryStats {
                total: 100,
                available: 40,
            },
            task_count: 3,
            ..Default::default()
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["mem_used"], 60);
        assert_eq!(json["task_count"], 3);
        assert_eq!(json["cpu_usage"], 0.0);
    }
}
