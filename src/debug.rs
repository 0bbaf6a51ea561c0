use std::fmt::Write as _;
use std::path::Path;

use crate::utils::PatchError;

/// 前后文本中发生变化的行窗口（去掉公共前缀和后缀）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedWindow {
    /// 变化区域在原文本中的起始行号（从 1 开始）
    pub old_start: usize,
    pub old_lines: Vec<String>,
    /// 变化区域在新文本中的起始行号（从 1 开始）
    pub new_start: usize,
    pub new_lines: Vec<String>,
}

/// 补丁前后对比调试器
pub struct PatchDebugger;

impl PatchDebugger {
    /// 计算变化的行窗口，文本相同时返回 None
    pub fn changed_lines(before: &str, after: &str) -> Option<ChangedWindow> {
        if before == after {
            return None;
        }

        let old: Vec<&str> = before.split('\n').collect();
        let new: Vec<&str> = after.split('\n').collect();

        let prefix = old
            .iter()
            .zip(new.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let max_suffix = old.len().min(new.len()) - prefix;
        let suffix = old
            .iter()
            .rev()
            .zip(new.iter().rev())
            .take(max_suffix)
            .take_while(|(a, b)| a == b)
            .count();

        Some(ChangedWindow {
            old_start: prefix + 1,
            old_lines: old[prefix..old.len() - suffix].iter().map(|s| s.to_string()).collect(),
            new_start: prefix + 1,
            new_lines: new[prefix..new.len() - suffix].iter().map(|s| s.to_string()).collect(),
        })
    }

    /// 生成对比报告文本
    pub fn render_comparison(label: &str, before: &str, after: &str) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "=== 补丁对比 ===");
        let _ = writeln!(output, "文件: {}", label);
        let _ = writeln!(output, "原始大小: {} 字节", before.len());
        let _ = writeln!(output, "新大小: {} 字节", after.len());

        match Self::changed_lines(before, after) {
            None => {
                let _ = writeln!(output, "无变化");
            }
            Some(window) => {
                let _ = writeln!(
                    output,
                    "@@ -{},{} +{},{} @@",
                    window.old_start,
                    window.old_lines.len(),
                    window.new_start,
                    window.new_lines.len()
                );
                for line in &window.old_lines {
                    let _ = writeln!(output, "-{}", line);
                }
                for line in &window.new_lines {
                    let _ = writeln!(output, "+{}", line);
                }
            }
        }
        output
    }

    /// 将对比报告写入文件
    pub fn dump_comparison(label: &str, before: &str, after: &str, output_path: &Path) -> Result<(), PatchError> {
        let report = Self::render_comparison(label, before, after);
        std::fs::write(output_path, report).map_err(|e| PatchError::file_access(output_path, e))
    }
}
