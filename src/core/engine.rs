use crate::config::SyncSettings;
use crate::core::planner::{build_plan, ExecutionPlan, OpKind, Operation, Stage};
use crate::core::progress::{ProgressObserver, ProgressTracker};
use crate::core::scanner::{FileScanner, ScanConfig};
use crate::storage::Storage;
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};

/// 串行阶段在调用方任务上执行，使用 0 号 worker 记录吞吐
const SERIAL_WORKER: usize = 0;

/// 同步状态
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Completed,
    Failed,
}

/// 失败的任务
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobFailure {
    pub kind: Option<OpKind>,
    pub path: String,
    pub description: String,
    pub error: String,
}

/// 同步报告
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub run_id: String,
    pub start_time: i64,
    pub end_time: i64,
    pub status: SyncStatus,
    pub jobs_total: usize,
    pub dirs_created: u32,
    pub dirs_removed: u32,
    pub files_uploaded: u32,
    pub files_deleted: u32,
    pub jobs_failed: u32,
    pub bytes_transferred: u64,
    pub duration_ms: u64,
    pub failures: Vec<JobFailure>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.status == SyncStatus::Completed
    }
}

/// 单个任务的执行结果
struct JobResult {
    op: Operation,
    outcome: Result<u64, String>,
}

/// 结果统计
#[derive(Debug, Default)]
struct Tally {
    dirs_created: u32,
    dirs_removed: u32,
    files_uploaded: u32,
    files_deleted: u32,
    bytes_transferred: u64,
    failures: Vec<JobFailure>,
}

impl Tally {
    fn record(&mut self, result: JobResult) {
        match result.outcome {
            Ok(bytes) => {
                match result.op.kind {
                    OpKind::Mkdir => self.dirs_created += 1,
                    OpKind::Rmdir => self.dirs_removed += 1,
                    OpKind::Rm => self.files_deleted += 1,
                    OpKind::Upload | OpKind::SyncUpload => self.files_uploaded += 1,
                }
                self.bytes_transferred += bytes;
            }
            Err(error) => self.failures.push(JobFailure {
                kind: Some(result.op.kind),
                path: result.op.dest_path,
                description: result.op.description,
                error,
            }),
        }
    }

    /// worker 异常退出，无法归属到具体任务
    fn record_crash(&mut self, worker: usize, error: String) {
        self.failures.push(JobFailure {
            kind: None,
            path: String::new(),
            description: format!("worker {}", worker),
            error,
        });
    }
}

/// 同步引擎
pub struct SyncEngine {
    config: SyncSettings,
}

impl SyncEngine {
    pub fn new() -> Self {
        Self {
            config: SyncSettings::default(),
        }
    }

    pub fn with_config(config: SyncSettings) -> Self {
        Self { config }
    }

    fn workers(&self) -> usize {
        self.config.workers.max(1)
    }

    /// 扫描两侧并构建执行计划
    pub async fn plan(&self, origin: &dyn Storage, target: &dyn Storage) -> Result<ExecutionPlan> {
        let scanner = FileScanner::with_config(ScanConfig {
            exclude_patterns: self.config.exclude_patterns.clone(),
        });

        let (origin_entries, target_entries) = tokio::try_join!(
            scanner.scan_storage(origin, ""),
            scanner.scan_storage(target, "")
        )?;

        let plan = build_plan(origin_entries, target_entries)?;
        info!(
            "执行计划: {} 个阶段, {} 个任务, {} 字节待传输",
            plan.stages.len(),
            plan.nr_jobs_total,
            plan.bytes_sync_total
        );
        Ok(plan)
    }

    /// 运行同步任务：扫描、构建计划、执行
    pub async fn run_sync(
        &self,
        origin: Arc<dyn Storage>,
        target: Arc<dyn Storage>,
        observer: Arc<dyn ProgressObserver>,
    ) -> Result<SyncReport> {
        info!("开始同步: {} -> {}", origin.name(), target.name());
        let plan = self.plan(origin.as_ref(), target.as_ref()).await?;
        Ok(self.execute(plan, origin, target, observer).await)
    }

    /// 按阶段顺序执行计划。阶段之间是屏障：上一阶段全部结束后才开始下一阶段。
    pub async fn execute(
        &self,
        plan: ExecutionPlan,
        origin: Arc<dyn Storage>,
        target: Arc<dyn Storage>,
        observer: Arc<dyn ProgressObserver>,
    ) -> SyncReport {
        let run_id = uuid::Uuid::new_v4().to_string();
        let start_time = chrono::Utc::now().timestamp();
        let started = Instant::now();

        let tracker = Arc::new(
            ProgressTracker::new(plan.nr_jobs_total, plan.bytes_sync_total, self.workers())
                .with_observer(observer),
        );
        let mut tally = Tally::default();

        info!(
            "开始执行 {}: {} 个任务, {} 个 worker",
            run_id,
            plan.nr_jobs_total,
            self.workers()
        );

        for stage in plan.stages {
            match stage {
                Stage::Serial(op) => {
                    let result =
                        run_job(SERIAL_WORKER, op, origin.as_ref(), target.as_ref(), &tracker)
                            .await;
                    tally.record(result);
                }
                Stage::Parallel(ops) => {
                    self.run_parallel(ops, &origin, &target, &tracker, &mut tally)
                        .await;
                }
            }
        }

        let end_time = chrono::Utc::now().timestamp();
        let jobs_failed = tally.failures.len() as u32;
        let status = if jobs_failed > 0 {
            SyncStatus::Failed
        } else {
            SyncStatus::Completed
        };

        info!(
            "同步完成 {}: 创建目录 {}, 删除目录 {}, 上传 {}, 删除 {}, 失败 {}",
            run_id,
            tally.dirs_created,
            tally.dirs_removed,
            tally.files_uploaded,
            tally.files_deleted,
            jobs_failed
        );

        SyncReport {
            run_id,
            start_time,
            end_time,
            status,
            jobs_total: plan.nr_jobs_total,
            dirs_created: tally.dirs_created,
            dirs_removed: tally.dirs_removed,
            files_uploaded: tally.files_uploaded,
            files_deleted: tally.files_deleted,
            jobs_failed,
            bytes_transferred: tally.bytes_transferred,
            duration_ms: started.elapsed().as_millis() as u64,
            failures: tally.failures,
        }
    }

    /// 并行阶段：所有任务先放入通道并关闭发送端，固定数量的 worker
    /// 从通道取任务直到取空，然后全部 join。
    async fn run_parallel(
        &self,
        ops: Vec<Operation>,
        origin: &Arc<dyn Storage>,
        target: &Arc<dyn Storage>,
        tracker: &Arc<ProgressTracker>,
        tally: &mut Tally,
    ) {
        if ops.is_empty() {
            return;
        }

        let total = ops.len();
        let (tx, rx) = mpsc::channel(total);
        for op in ops {
            // 容量等于任务数，不会阻塞
            if tx.send(op).await.is_err() {
                break;
            }
        }
        drop(tx);

        let queue = Arc::new(Mutex::new(rx));
        // 每个任务结束即写入，worker 异常退出时已完成的结果不丢失
        let finished = Arc::new(parking_lot::Mutex::new(Vec::with_capacity(total)));
        let worker_count = self.workers().min(total);
        debug!("并行阶段: {} 个任务, {} 个 worker", total, worker_count);

        let mut handles = Vec::with_capacity(worker_count);
        for worker in 0..worker_count {
            let queue = queue.clone();
            let finished = finished.clone();
            let origin = origin.clone();
            let target = target.clone();
            let tracker = tracker.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    let next = queue.lock().await.recv().await;
                    let Some(op) = next else {
                        break;
                    };
                    let result =
                        run_job(worker, op, origin.as_ref(), target.as_ref(), &tracker).await;
                    finished.lock().push(result);
                }
            }));
        }

        for (worker, handle) in handles.into_iter().enumerate() {
            if let Err(e) = handle.await {
                error!("worker {} 异常退出: {}", worker, e);
                tally.record_crash(worker, format!("worker 异常退出: {}", e));
            }
        }

        let results = std::mem::take(&mut *finished.lock());
        for result in results {
            tally.record(result);
        }

        // 所有 worker 都已退出，通道中剩下的任务不会再被执行
        let mut queue = queue.lock().await;
        while let Ok(op) = queue.try_recv() {
            tracker.record_failure(&op.description);
            tally.record(JobResult {
                op,
                outcome: Err("worker 异常退出，任务未执行".to_string()),
            });
        }
    }
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// 执行单个任务并更新进度
async fn run_job(
    worker: usize,
    op: Operation,
    origin: &dyn Storage,
    target: &dyn Storage,
    tracker: &ProgressTracker,
) -> JobResult {
    let started = Instant::now();
    let outcome = execute_operation(&op, origin, target).await;

    match &outcome {
        Ok(bytes) => {
            debug!("[worker {}] {} 完成 ({} 字节)", worker, op.description, bytes);
            tracker.record_completion(worker, started.elapsed(), *bytes, &op.description);
        }
        Err(e) => {
            error!("[worker {}] {} 失败: {:#}", worker, op.description, e);
            tracker.record_failure(&op.description);
        }
    }

    JobResult {
        op,
        outcome: outcome.map_err(|e| format!("{:#}", e)),
    }
}

/// 执行单个操作，返回传输的字节数
pub async fn execute_operation(
    op: &Operation,
    origin: &dyn Storage,
    target: &dyn Storage,
) -> Result<u64> {
    match op.kind {
        OpKind::Mkdir => {
            target.mkdir(&op.dest_path).await?;
            Ok(0)
        }
        OpKind::Rmdir => {
            target.rmdir(&op.dest_path).await?;
            Ok(0)
        }
        OpKind::Rm => {
            target.rm(&op.dest_path).await?;
            Ok(0)
        }
        OpKind::Upload | OpKind::SyncUpload => {
            let data = origin.download(&op.source_path).await?;
            debug!("  读取完成: {} 实际{}字节", op.source_path, data.len());
            let written = target.upload(&op.dest_path, data).await?;
            debug!("  写入完成: {}", op.dest_path);
            Ok(written)
        }
    }
}
