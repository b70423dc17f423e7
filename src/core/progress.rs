//! 同步进度聚合
//!
//! 每个任务完成后在同一把锁内更新计数、记录该 worker 的最新吞吐样本、
//! 追加聚合吞吐到滑动窗口、计算 ETA 并通知观察者，
//! 因此观察者看到的 `completed_jobs` 严格递增。

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// 滑动窗口容量 = worker 数 × 此系数
pub const WINDOW_FACTOR: usize = 10;

/// 一次进度更新
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub percent: f64,
    pub completed_jobs: usize,
    pub total_jobs: usize,
    pub failed_jobs: usize,
    /// 字节/秒
    pub average_throughput: f64,
    pub eta: Option<Duration>,
    pub description: String,
}

/// 进度观察者，由外部渲染器实现。在进度锁内被调用，实现应尽快返回。
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

impl<F> ProgressObserver for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// 不做任何事的观察者
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

#[derive(Debug)]
struct ProgressState {
    total_jobs: usize,
    completed_jobs: usize,
    failed_jobs: usize,
    total_bytes: u64,
    completed_bytes: u64,
    /// worker -> 最近一次吞吐（字节/秒）
    worker_samples: HashMap<usize, f64>,
    window: VecDeque<f64>,
    window_capacity: usize,
}

impl ProgressState {
    fn percent(&self) -> f64 {
        if self.total_jobs == 0 {
            return 100.0;
        }
        100.0 * self.completed_jobs as f64 / self.total_jobs as f64
    }

    fn moving_average(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        self.window.iter().sum::<f64>() / self.window.len() as f64
    }

    fn eta(&self, average: f64) -> Option<Duration> {
        if average > 0.0 {
            let remaining = self.total_bytes.saturating_sub(self.completed_bytes);
            Duration::try_from_secs_f64(remaining as f64 / average).ok()
        } else {
            None
        }
    }

    fn push_aggregate(&mut self) {
        let aggregate: f64 = self.worker_samples.values().sum();
        self.window.push_back(aggregate);
        while self.window.len() > self.window_capacity {
            self.window.pop_front();
        }
    }

    fn event(&self, description: &str) -> ProgressEvent {
        let average = self.moving_average();
        ProgressEvent {
            percent: self.percent(),
            completed_jobs: self.completed_jobs,
            total_jobs: self.total_jobs,
            failed_jobs: self.failed_jobs,
            average_throughput: average,
            eta: self.eta(average),
            description: description.to_string(),
        }
    }
}

/// 一次同步运行的进度聚合器
pub struct ProgressTracker {
    state: Mutex<ProgressState>,
    observer: Arc<dyn ProgressObserver>,
}

impl ProgressTracker {
    pub fn new(total_jobs: usize, total_bytes: u64, workers: usize) -> Self {
        Self {
            observer: Arc::new(NoopObserver),
            state: Mutex::new(ProgressState {
                total_jobs,
                completed_jobs: 0,
                failed_jobs: 0,
                total_bytes,
                completed_bytes: 0,
                worker_samples: HashMap::new(),
                window: VecDeque::new(),
                window_capacity: WINDOW_FACTOR * workers.max(1),
            }),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// 记录一个成功完成的任务，返回更新后的进度
    pub fn record_completion(
        &self,
        worker: usize,
        elapsed: Duration,
        bytes: u64,
        description: &str,
    ) -> ProgressEvent {
        let mut state = self.state.lock();

        let secs = elapsed.as_secs_f64();
        let sample = if secs > 0.0 {
            bytes as f64 / secs
        } else {
            // 耗时为 0 时沿用该 worker 上一次的样本
            state.worker_samples.get(&worker).copied().unwrap_or(0.0)
        };
        state.worker_samples.insert(worker, sample);

        state.completed_jobs += 1;
        state.completed_bytes += bytes;
        state.push_aggregate();

        let event = state.event(description);
        self.observer.on_progress(&event);
        event
    }

    /// 记录一个失败的任务：计入已处理，但不更新吞吐样本
    pub fn record_failure(&self, description: &str) -> ProgressEvent {
        let mut state = self.state.lock();
        state.completed_jobs += 1;
        state.failed_jobs += 1;
        let event = state.event(description);
        self.observer.on_progress(&event);
        event
    }

    #[cfg(test)]
    fn snapshot(&self) -> ProgressEvent {
        self.state.lock().event("")
    }

    #[cfg(test)]
    fn completed_bytes(&self) -> u64 {
        self.state.lock().completed_bytes
    }
}
