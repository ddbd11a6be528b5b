use std::sync::Mutex;
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, RefreshKind, System};

/// 單一階段的耗時 (從上一個階段結束算起)。
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseTiming {
    pub phase: String,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct SystemStats {
    pub cpu_usage: f32,
    pub memory_usage_mb: u64,
    pub memory_usage_percent: f32,
    pub peak_memory_mb: u64,
    pub elapsed_time: Duration,
}

#[derive(Debug)]
struct PhaseClock {
    last_mark: Instant,
    timings: Vec<PhaseTiming>,
}

/// 記錄載入、處理與預測、輸出各階段的耗時，啟用時另外取樣 CPU 與記憶體。
pub struct SystemMonitor {
    #[cfg(feature = "cli")]
    system: Mutex<System>,
    #[cfg(feature = "cli")]
    pid: Option<Pid>,
    start_time: Instant,
    clock: Mutex<PhaseClock>,
    peak_memory: Mutex<u64>,
    enabled: bool,
}

impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let start_time = Instant::now();
        Self {
            #[cfg(feature = "cli")]
            system: Mutex::new(Self::sampler(enabled)),
            #[cfg(feature = "cli")]
            pid: Self::current_pid(enabled),
            start_time,
            clock: Mutex::new(PhaseClock {
                last_mark: start_time,
                timings: Vec::new(),
            }),
            peak_memory: Mutex::new(0),
            enabled,
        }
    }

    #[cfg(feature = "cli")]
    fn sampler(enabled: bool) -> System {
        if enabled {
            let mut system = System::new_with_specifics(RefreshKind::everything());
            system.refresh_all();
            system
        } else {
            System::new()
        }
    }

    #[cfg(feature = "cli")]
    fn current_pid(enabled: bool) -> Option<Pid> {
        if !enabled {
            return None;
        }
        // 取不到 PID 時只停用資源取樣，不影響預測流程
        match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!("Resource sampling disabled: {}", e);
                None
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 結束一個階段並記下耗時。
    pub fn mark_phase(&self, phase: &str) -> Option<PhaseTiming> {
        let mut clock = self.clock.lock().ok()?;
        let now = Instant::now();
        let timing = PhaseTiming {
            phase: phase.to_string(),
            duration: now.duration_since(clock.last_mark),
        };
        clock.last_mark = now;
        clock.timings.push(timing.clone());
        Some(timing)
    }

    pub fn timings(&self) -> Vec<PhaseTiming> {
        self.clock
            .lock()
            .map(|clock| clock.timings.clone())
            .unwrap_or_default()
    }

    /// 耗時最長的階段 (通常是模型估計)。
    pub fn slowest_phase(&self) -> Option<PhaseTiming> {
        self.timings().into_iter().max_by_key(|t| t.duration)
    }

    #[cfg(feature = "cli")]
    pub fn get_stats(&self) -> Option<SystemStats> {
        if !self.enabled {
            return None;
        }

        let pid = self.pid?;
        let mut system = self.system.lock().ok()?;
        system.refresh_all();

        let process = system.process(pid)?;
        let memory_mb = process.memory() / 1024 / 1024;
        let total_memory = system.total_memory() / 1024 / 1024;
        let memory_percent = if total_memory > 0 {
            (memory_mb as f32 / total_memory as f32) * 100.0
        } else {
            0.0
        };

        let mut peak = self.peak_memory.lock().ok()?;
        *peak = (*peak).max(memory_mb);

        Some(SystemStats {
            cpu_usage: process.cpu_usage(),
            memory_usage_mb: memory_mb,
            memory_usage_percent: memory_percent,
            peak_memory_mb: *peak,
            elapsed_time: self.start_time.elapsed(),
        })
    }

    #[cfg(not(feature = "cli"))]
    pub fn get_stats(&self) -> Option<SystemStats> {
        None
    }

    pub fn log_stats(&self, phase: &str) {
        let timing = self.mark_phase(phase);
        if !self.enabled {
            return;
        }
        let took = timing.map(|t| t.duration).unwrap_or_default();
        match self.get_stats() {
            Some(stats) => tracing::info!(
                "📊 {} took {:?} - CPU: {:.1}%, Memory: {}MB ({:.1}%), Peak: {}MB",
                phase,
                took,
                stats.cpu_usage,
                stats.memory_usage_mb,
                stats.memory_usage_percent,
                stats.peak_memory_mb
            ),
            None => tracing::info!("📊 {} took {:?}", phase, took),
        }
    }

    pub fn log_final_stats(&self) {
        if !self.enabled {
            return;
        }
        let total = self.start_time.elapsed();
        let peak = self.peak_memory.lock().map(|p| *p).unwrap_or_default();
        tracing::info!("📊 Final Stats - Total Time: {:?}, Peak Memory: {}MB", total, peak);
        if let Some(slowest) = self.slowest_phase() {
            tracing::info!("📊 Slowest phase: {} ({:?})", slowest.phase, slowest.duration);
        }
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_monitor_reports_nothing() {
        let monitor = SystemMonitor::new(false);
        assert!(!monitor.is_enabled());
        assert!(monitor.get_stats().is_none());
    }

    #[test]
    fn test_phases_recorded_in_order() {
        let monitor = SystemMonitor::new(false);
        monitor.log_stats("Extract");
        std::thread::sleep(Duration::from_millis(5));
        monitor.log_stats("Transform");
        monitor.log_stats("Load");

        let phases: Vec<String> = monitor.timings().into_iter().map(|t| t.phase).collect();
        assert_eq!(phases, vec!["Extract", "Transform", "Load"]);
        assert_eq!(monitor.slowest_phase().unwrap().phase, "Transform");
    }
}
