/// 变更追踪模块
///
/// 记录每次命中的规则应用（含前后文本快照），支持撤销/重做。

use std::time::Instant;

use crate::utils::{preview, PatchError};

/// 补丁变更追踪器
///
/// # 实现细节
/// - 使用两个栈实现撤销/重做：undo_stack 和 redo_stack
/// - 所有变更按时间顺序存储在 changes 向量中
/// - 栈中存储的是索引而非实际数据，避免数据拷贝
#[derive(Debug, Clone)]
pub struct PatchDelta {
    /// 所有变更的完整记录
    changes: Vec<TextChange>,
    /// 撤销栈（存储 changes 中的索引）
    undo_stack: Vec<usize>,
    /// 重做栈（存储 changes 中的索引）
    redo_stack: Vec<usize>,
}

/// 变更来源：哪个规则集的第几条规则
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeOrigin {
    pub rule_set: String,
    /// 规则在规则集中的序号（从 1 开始）
    pub rule_index: usize,
}

impl ChangeOrigin {
    pub fn new(rule_set: impl Into<String>, rule_index: usize) -> Self {
        Self {
            rule_set: rule_set.into(),
            rule_index,
        }
    }
}

/// 单次规则应用产生的变更
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChange {
    pub origin: ChangeOrigin,
    /// 规则标签
    pub rule: String,
    /// 命中次数
    pub matches: usize,
    /// 应用前的完整文本
    pub before: String,
    /// 应用后的完整文本
    pub after: String,
    /// 应用时间戳
    pub applied_at: Instant,
}

impl PatchDelta {
    pub fn new() -> Self {
        Self {
            changes: Vec::new(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        }
    }

    /// 添加一个变更，新操作会清空重做栈
    pub fn add_change(&mut self, change: TextChange) {
        let index = self.changes.len();
        self.changes.push(change);
        self.undo_stack.push(index);
        self.redo_stack.clear();
    }

    /// 撤销最后一次操作，返回被撤销的变更
    pub fn undo(&mut self) -> Result<&TextChange, PatchError> {
        let index = self.undo_stack.pop().ok_or(PatchError::NothingToUndo)?;
        self.redo_stack.push(index);
        Ok(&self.changes[index])
    }

    /// 重做最后一次撤销的操作
    pub fn redo(&mut self) -> Result<&TextChange, PatchError> {
        let index = self.redo_stack.pop().ok_or(PatchError::NothingToRedo)?;
        self.undo_stack.push(index);
        Ok(&self.changes[index])
    }

    /// 当前有效变更的数量（撤销栈大小，不是总变更数）
    pub fn len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo_stack.is_empty()
    }

    /// 按应用顺序返回当前有效的变更
    pub fn iter(&self) -> impl Iterator<Item = &TextChange> {
        self.undo_stack.iter().map(|&idx| &self.changes[idx])
    }

    /// 获取所有变更（包括已撤销的）
    pub fn all_changes(&self) -> &[TextChange] {
        &self.changes
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.changes.clear();
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// 获取某个规则集的所有有效变更
    pub fn changes_for_rule_set(&self, rule_set: &str) -> Vec<&TextChange> {
        self.iter()
            .filter(|change| change.origin.rule_set == rule_set)
            .collect()
    }

    /// 生成变更摘要
    pub fn summary(&self) -> String {
        format!(
            "变更总数: {}, 有效变更: {}, 可撤销: {}, 可重做: {}",
            self.changes.len(),
            self.undo_stack.len(),
            self.can_undo(),
            self.can_redo()
        )
    }
}

impl Default for PatchDelta {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TextChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}#{}] {} ({} 处)",
            self.origin.rule_set,
            self.origin.rule_index,
            preview(&self.rule, 60),
            self.matches
        )
    }
}
