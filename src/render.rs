//! 终端输出：进度条、执行计划和同步摘要

use crate::core::{ExecutionPlan, ProgressEvent, ProgressObserver, Stage, SyncReport};
use indicatif::{HumanBytes, HumanDuration, ProgressBar, ProgressStyle};
use std::time::Duration;

/// 基于 indicatif 的进度条
pub struct BarRenderer {
    bar: ProgressBar,
}

impl BarRenderer {
    pub fn new(total_jobs: usize) -> Self {
        let bar = ProgressBar::new(total_jobs as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// 不输出任何内容（`--no-progress` 或 JSON 输出时使用）
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressObserver for BarRenderer {
    fn on_progress(&self, event: &ProgressEvent) {
        self.bar.set_position(event.completed_jobs as u64);
        self.bar.set_message(progress_message(event));
    }
}

fn progress_message(event: &ProgressEvent) -> String {
    let eta = match event.eta {
        Some(eta) => HumanDuration(eta).to_string(),
        None => "-".to_string(),
    };
    let mut msg = format!(
        "{:.1}% {}/s 剩余 {}",
        event.percent,
        HumanBytes(event.average_throughput as u64),
        eta
    );
    if event.failed_jobs > 0 {
        msg.push_str(&format!(" 失败 {}", event.failed_jobs));
    }
    msg.push_str(&format!(" | {}", event.description));
    msg
}

/// 打印执行计划（dry run）
pub fn print_plan(plan: &ExecutionPlan) {
    if plan.is_empty() {
        println!("两侧已同步，无需操作");
        return;
    }

    for (index, stage) in plan.stages.iter().enumerate() {
        match stage {
            Stage::Serial(op) => println!("[{}] 串行  {}", index + 1, op.description),
            Stage::Parallel(ops) => {
                println!("[{}] 并行  {} 个任务", index + 1, ops.len());
                for op in ops {
                    match op.size_hint {
                        Some(size) => println!("      {} ({})", op.description, HumanBytes(size)),
                        None => println!("      {}", op.description),
                    }
                }
            }
        }
    }
    println!(
        "共 {} 个任务, {} 待传输",
        plan.nr_jobs_total,
        HumanBytes(plan.bytes_sync_total)
    );
}

/// 打印同步摘要和失败列表
pub fn print_summary(report: &SyncReport) {
    println!(
        "同步{}: 创建目录 {}, 删除目录 {}, 上传 {}, 删除 {}, 传输 {}, 耗时 {}",
        if report.is_success() { "完成" } else { "结束（有失败）" },
        report.dirs_created,
        report.dirs_removed,
        report.files_uploaded,
        report.files_deleted,
        HumanBytes(report.bytes_transferred),
        HumanDuration(Duration::from_millis(report.duration_ms))
    );

    if !report.failures.is_empty() {
        eprintln!("{} 个任务失败:", report.jobs_failed);
        for failure in &report.failures {
            eprintln!("  {}: {}", failure.description, failure.error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_message() {
        let event = ProgressEvent {
            percent: 30.0,
            completed_jobs: 3,
            total_jobs: 10,
            failed_jobs: 1,
            average_throughput: 2048.0,
            eta: Some(Duration::from_secs(3)),
            description: "上传 a.txt".to_string(),
        };
        let msg = progress_message(&event);
        assert!(msg.starts_with("30.0% 2.00 KiB/s"));
        assert!(msg.contains("失败 1"));
        assert!(msg.ends_with("| 上传 a.txt"));
    }

    #[test]
    fn test_hidden_renderer_accepts_events() {
        let renderer = BarRenderer::hidden();
        let event = ProgressEvent {
            percent: 100.0,
            completed_jobs: 1,
            total_jobs: 1,
            failed_jobs: 0,
            average_throughput: 0.0,
            eta: None,
            description: "创建目录 a".to_string(),
        };
        renderer.on_progress(&event);
        assert_eq!(renderer.bar.position(), 1);
        renderer.finish();
    }
}
