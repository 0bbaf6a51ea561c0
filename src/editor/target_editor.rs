/// 目标文件编辑器模块
///
/// 提供有状态的文本编辑接口，支持批量修改和延迟保存。
/// 遵循"修改-保存分离"原则，所有修改操作仅在内存中进行。

use std::path::{Path, PathBuf};
use std::time::Instant;

use super::delta::{ChangeOrigin, PatchDelta, TextChange};
use crate::io::{RawText, TargetReader, TargetWriter};
use crate::patch::{apply_rule, RuleReport};
use crate::rule::{CompiledRule, Precondition};
use crate::text::TextCodec;
use crate::utils::PatchError;

/// 目标文件：路径 + 内存中的文本缓冲区
#[derive(Debug, Clone)]
pub struct TargetFile {
    pub path: PathBuf,
    pub codec: TextCodec,
    pub had_bom: bool,
    /// 加载时的文本
    pub original: String,
    /// 当前文本
    pub text: String,
}

impl TargetFile {
    /// 从读取器加载并解码
    pub fn load(reader: &dyn TargetReader, codec: &TextCodec, path: &Path) -> Result<Self, PatchError> {
        let raw = reader.read(path)?;
        let decoded = codec.decode(&raw.bytes, path)?;
        Ok(Self {
            path: path.to_path_buf(),
            codec: *codec,
            had_bom: decoded.had_bom,
            original: decoded.content.clone(),
            text: decoded.content,
        })
    }

    /// 直接从文本创建（UTF-8，无 BOM）
    pub fn from_text(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            path: path.into(),
            codec: TextCodec::utf8(),
            had_bom: false,
            original: text.clone(),
            text,
        }
    }

    /// 编码为待写入的原始数据
    pub fn render(&self) -> Result<RawText, PatchError> {
        let bytes = self.codec.encode(&self.text, self.had_bom, &self.path)?;
        Ok(RawText { bytes })
    }
}

/// 目标文件编辑器 - 管理文本缓冲区的修改状态
///
/// # 核心特性
/// - **Stateful**: 维护修改状态，支持多次修改后统一保存
/// - **可追踪**: 记录所有命中的规则，支持撤销/重做
/// - **显式保存**: 不调用 `save` 就不会触碰磁盘
pub struct TargetEditor {
    file: TargetFile,
    modifications: PatchDelta,
    track_history: bool,
    untracked_changes: usize,
}

impl TargetEditor {
    pub fn new(file: TargetFile) -> Self {
        Self {
            file,
            modifications: PatchDelta::new(),
            track_history: true,
            untracked_changes: 0,
        }
    }

    /// 不保存文本快照，无法撤销/重做
    pub fn without_history(mut self) -> Self {
        self.track_history = false;
        self
    }

    /// 加载目标文件并创建编辑器
    pub fn load(reader: &dyn TargetReader, codec: &TextCodec, path: &Path) -> Result<Self, PatchError> {
        Ok(Self::new(TargetFile::load(reader, codec, path)?))
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }

    pub fn text(&self) -> &str {
        &self.file.text
    }

    pub fn original(&self) -> &str {
        &self.file.original
    }

    pub fn file(&self) -> &TargetFile {
        &self.file
    }

    pub fn contains(&self, fragment: &str) -> bool {
        self.file.text.contains(fragment)
    }

    /// 检查前置条件是否满足（基于当前文本）
    pub fn check(&self, precondition: &Precondition) -> bool {
        precondition.holds(&self.file.text)
    }

    /// 应用单条规则（仅修改内存状态）
    ///
    /// 命中时记录到变更追踪器，未命中时文本保持不变。
    pub fn apply_rule(&mut self, rule_set: &str, index: usize, rule: &CompiledRule) -> RuleReport {
        let (output, report) = apply_rule(&self.file.text, rule);

        if report.is_noop() {
            return report;
        }

        if self.track_history {
            let before = std::mem::replace(&mut self.file.text, output);
            self.modifications.add_change(TextChange {
                origin: ChangeOrigin::new(rule_set, index),
                rule: report.description.clone(),
                matches: report.matches,
                before,
                after: self.file.text.clone(),
                applied_at: Instant::now(),
            });
        } else {
            self.file.text = output;
            self.untracked_changes += 1;
        }

        report
    }

    /// 按顺序批量应用规则，规则序号从 1 开始
    pub fn apply_rules(&mut self, rule_set: &str, rules: &[CompiledRule]) -> Vec<RuleReport> {
        rules
            .iter()
            .enumerate()
            .map(|(i, rule)| self.apply_rule(rule_set, i + 1, rule))
            .collect()
    }

    /// 当前文本是否与加载时不同
    pub fn is_modified(&self) -> bool {
        self.file.text != self.file.original
    }

    /// 有效变更数量
    pub fn modified_count(&self) -> usize {
        self.modifications.len() + self.untracked_changes
    }

    pub fn modifications(&self) -> &PatchDelta {
        &self.modifications
    }

    /// 撤销最后一次修改，恢复文本快照
    pub fn undo(&mut self) -> Result<(), PatchError> {
        let change = self.modifications.undo()?;
        self.file.text = change.before.clone();
        Ok(())
    }

    /// 重做上一次撤销的修改
    pub fn redo(&mut self) -> Result<(), PatchError> {
        let change = self.modifications.redo()?;
        self.file.text = change.after.clone();
        Ok(())
    }

    pub fn render(&self) -> Result<RawText, PatchError> {
        self.file.render()
    }

    /// 保存到文件（需要显式调用）
    pub fn save(&self, writer: &dyn TargetWriter, path: &Path) -> Result<(), PatchError> {
        let data = self.render()?;
        writer.write(&data, path)
    }

    /// 保存到原路径
    pub fn save_to_original(&self, writer: &dyn TargetWriter) -> Result<(), PatchError> {
        self.save(writer, &self.file.path)
    }

    /// 清除所有修改记录（但不恢复文本）
    pub fn clear_modifications(&mut self) {
        self.modifications.clear();
        self.untracked_changes = 0;
    }

    pub fn summary(&self) -> String {
        format!(
            "文件: {}, 修改状态: {}, {}",
            self.file.path.display(),
            if self.is_modified() { "已修改" } else { "未修改" },
            self.modifications.summary()
        )
    }
}
