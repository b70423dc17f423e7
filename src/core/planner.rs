//! 执行计划构建
//!
//! 目录与文件分别比较，然后按依赖顺序拼出阶段列表：
//! 先建目录（父在前），再并行删文件，再删目录（子在前），最后并行上传文件。

use crate::core::comparator::diff_sorted;
use crate::core::entry::{compare_names, sort_entries, FsEntry};
use crate::error::SyncError;
use serde::Serialize;
use std::cmp::Ordering;

/// 操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OpKind {
    Mkdir,
    Rmdir,
    Rm,
    /// 新文件：从源端下载后上传到目标端
    Upload,
    /// 已存在但不同的文件：从源端下载后覆盖目标端
    SyncUpload,
}

impl OpKind {
    /// 是否需要传输数据
    pub fn transfers_data(&self) -> bool {
        matches!(self, OpKind::Upload | OpKind::SyncUpload)
    }
}

/// 单个计划操作，构建后不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OpKind,
    pub source_path: String,
    pub dest_path: String,
    pub size_hint: Option<u64>,
    pub description: String,
}

impl Operation {
    pub fn mkdir(path: &str) -> Self {
        Self {
            kind: OpKind::Mkdir,
            source_path: path.to_string(),
            dest_path: path.to_string(),
            size_hint: None,
            description: format!("创建目录 {}", path),
        }
    }

    pub fn rmdir(path: &str) -> Self {
        Self {
            kind: OpKind::Rmdir,
            source_path: path.to_string(),
            dest_path: path.to_string(),
            size_hint: None,
            description: format!("删除目录 {}", path),
        }
    }

    pub fn rm(path: &str) -> Self {
        Self {
            kind: OpKind::Rm,
            source_path: path.to_string(),
            dest_path: path.to_string(),
            size_hint: None,
            description: format!("删除文件 {}", path),
        }
    }

    pub fn upload(path: &str, size: u64) -> Self {
        Self {
            kind: OpKind::Upload,
            source_path: path.to_string(),
            dest_path: path.to_string(),
            size_hint: Some(size),
            description: format!("上传 {}", path),
        }
    }

    pub fn sync_upload(path: &str, size: u64) -> Self {
        Self {
            kind: OpKind::SyncUpload,
            source_path: path.to_string(),
            dest_path: path.to_string(),
            size_hint: Some(size),
            description: format!("更新 {}", path),
        }
    }
}

/// 执行阶段。阶段之间严格串行。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Serial(Operation),
    Parallel(Vec<Operation>),
}

impl Stage {
    pub fn operations(&self) -> &[Operation] {
        match self {
            Stage::Serial(op) => std::slice::from_ref(op),
            Stage::Parallel(ops) => ops,
        }
    }
}

/// 完整的执行计划
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub stages: Vec<Stage>,
    pub nr_jobs_total: usize,
    pub bytes_sync_total: u64,
}

impl ExecutionPlan {
    pub fn is_empty(&self) -> bool {
        self.nr_jobs_total == 0
    }

    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.stages.iter().flat_map(|s| s.operations())
    }
}

/// 创建目录的顺序：浅的在前
pub fn depth_ascending(a: &&FsEntry, b: &&FsEntry) -> Ordering {
    a.depth().cmp(&b.depth())
}

/// 删除目录的顺序：深的在前
pub fn depth_descending(a: &&FsEntry, b: &&FsEntry) -> Ordering {
    b.depth().cmp(&a.depth())
}

/// 根据两侧列表构建执行计划
///
/// 两侧名称需已相对于各自的扫描根目录。同名条目在两侧类型不同时返回
/// [`SyncError::TypeConflict`]。
///
/// 没有任务的并行阶段不会出现在计划中，已同步的两侧得到的计划没有任何阶段。
pub fn build_plan(
    mut origin: Vec<FsEntry>,
    mut target: Vec<FsEntry>,
) -> Result<ExecutionPlan, SyncError> {
    sort_entries(&mut origin);
    sort_entries(&mut target);
    check_type_conflicts(&origin, &target)?;

    let (origin_dirs, origin_files): (Vec<&FsEntry>, Vec<&FsEntry>) =
        origin.iter().partition(|e| e.is_dir());
    let (target_dirs, target_files): (Vec<&FsEntry>, Vec<&FsEntry>) =
        target.iter().partition(|e| e.is_dir());

    let mut dirs = diff_sorted(&origin_dirs, &target_dirs);
    let files = diff_sorted(&origin_files, &target_files);

    // 稳定排序，同深度保持名称顺序
    dirs.to_add.sort_by(depth_ascending);
    dirs.to_delete.sort_by(depth_descending);

    tracing::debug!(
        "比较完成: 目录 +{} -{}, 文件 +{} ~{} -{} ={}",
        dirs.to_add.len(),
        dirs.to_delete.len(),
        files.to_add.len(),
        files.to_sync.len(),
        files.to_delete.len(),
        files.synced.len()
    );

    if dirs.is_in_sync() && files.is_in_sync() {
        tracing::debug!("两侧已同步");
        return Ok(ExecutionPlan::default());
    }

    let mut stages = Vec::new();

    for dir in &dirs.to_add {
        stages.push(Stage::Serial(Operation::mkdir(dir.name())));
    }

    let removals: Vec<Operation> = files
        .to_delete
        .iter()
        .map(|f| Operation::rm(f.name()))
        .collect();
    if !removals.is_empty() {
        stages.push(Stage::Parallel(removals));
    }

    for dir in &dirs.to_delete {
        stages.push(Stage::Serial(Operation::rmdir(dir.name())));
    }

    let uploads: Vec<Operation> = files
        .to_add
        .iter()
        .map(|f| Operation::upload(f.name(), f.byte_length().unwrap_or(0)))
        .chain(
            files
                .to_sync
                .iter()
                .map(|f| Operation::sync_upload(f.name(), f.byte_length().unwrap_or(0))),
        )
        .collect();
    if !uploads.is_empty() {
        stages.push(Stage::Parallel(uploads));
    }

    let mut plan = ExecutionPlan {
        stages,
        ..Default::default()
    };
    for op in plan.stages.iter().flat_map(|s| s.operations()) {
        plan.nr_jobs_total += 1;
        if op.kind.transfers_data() {
            plan.bytes_sync_total += op.size_hint.unwrap_or(0);
        }
    }
    Ok(plan)
}

/// 两侧都已排序，归并查找同名但类型不同的条目
fn check_type_conflicts(origin: &[FsEntry], target: &[FsEntry]) -> Result<(), SyncError> {
    let (mut i, mut j) = (0, 0);
    while i < origin.len() && j < target.len() {
        match compare_names(origin[i].name(), target[j].name()) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                if origin[i].is_dir() != target[j].is_dir() {
                    return Err(SyncError::TypeConflict {
                        path: origin[i].name().to_string(),
                        origin: origin[i].kind(),
                        target: target[j].kind(),
                    });
                }
                i += 1;
                j += 1;
            }
        }
    }
    Ok(())
}
