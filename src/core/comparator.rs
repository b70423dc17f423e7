use crate::core::entry::{compare_names, is_sorted, FsEntry};
use std::cmp::Ordering;

/// 同种条目（全部目录或全部文件）的比较结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan<'a> {
    /// 两边都有且相同
    pub synced: Vec<&'a FsEntry>,
    /// 两边都有但不同（仅文件），保存源端条目
    pub to_sync: Vec<&'a FsEntry>,
    /// 只有源端有
    pub to_add: Vec<&'a FsEntry>,
    /// 只有目标端有
    pub to_delete: Vec<&'a FsEntry>,
}

impl SyncPlan<'_> {
    /// 是否无需任何操作
    pub fn is_in_sync(&self) -> bool {
        self.to_sync.is_empty() && self.to_add.is_empty() && self.to_delete.is_empty()
    }
}

/// 判断同名条目是否相同
///
/// 文件只比较大小，不比较修改时间（WebDAV 等存储不保留原始 mtime）；
/// 同名目录总是相同。
pub fn entries_equal(origin: &FsEntry, target: &FsEntry) -> bool {
    match (origin, target) {
        (FsEntry::Directory { .. }, FsEntry::Directory { .. }) => true,
        (
            FsEntry::File {
                byte_length: a, ..
            },
            FsEntry::File {
                byte_length: b, ..
            },
        ) => a == b,
        _ => false,
    }
}

/// 对两个按名称升序排列的同种列表做一次线性归并
///
/// 调用方负责保证输入已排序且类型一致。
pub fn diff_sorted<'a>(origin: &[&'a FsEntry], target: &[&'a FsEntry]) -> SyncPlan<'a> {
    debug_assert!(is_sorted(origin), "origin 列表未排序");
    debug_assert!(is_sorted(target), "target 列表未排序");

    let mut plan = SyncPlan::default();
    let (mut i, mut j) = (0, 0);

    while i < origin.len() && j < target.len() {
        let (src, dst) = (origin[i], target[j]);
        match compare_names(src.name(), dst.name()) {
            Ordering::Less => {
                plan.to_add.push(src);
                i += 1;
            }
            Ordering::Greater => {
                plan.to_delete.push(dst);
                j += 1;
            }
            Ordering::Equal => {
                if entries_equal(src, dst) {
                    plan.synced.push(src);
                } else {
                    tracing::debug!(
                        "文件大小不同: {} (src={:?}, dst={:?})",
                        src.name(),
                        src.byte_length(),
                        dst.byte_length()
                    );
                    plan.to_sync.push(src);
                }
                i += 1;
                j += 1;
            }
        }
    }

    plan.to_add.extend_from_slice(&origin[i..]);
    plan.to_delete.extend_from_slice(&target[j..]);
    plan
}
