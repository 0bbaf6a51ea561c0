/// 补丁应用核心
///
/// 对文本依次应用规则：每条规则作用于前面所有规则处理后的累积结果。
/// 未命中的规则是静默的空操作，只在报告中体现为 `matches == 0`。
use serde::Serialize;
use std::path::Path;

use crate::io::{RawText, TargetReader, TargetWriter};
use crate::rule::CompiledRule;
use crate::text::TextCodec;
use crate::utils::PatchError;

/// 单条规则的应用结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleReport {
    pub label: String,
    pub description: String,
    pub matches: usize,
}

impl RuleReport {
    pub fn is_noop(&self) -> bool {
        self.matches == 0
    }
}

/// 一组规则的应用结果
#[derive(Debug, Clone)]
pub struct PatchOutcome {
    /// 处理后的文本
    pub text: String,
    /// 按顺序排列的规则报告
    pub rules: Vec<RuleReport>,
}

impl PatchOutcome {
    pub fn applied_count(&self) -> usize {
        self.rules.iter().filter(|r| !r.is_noop()).count()
    }

    pub fn noop_rules(&self) -> impl Iterator<Item = &RuleReport> {
        self.rules.iter().filter(|r| r.is_noop())
    }

    pub fn total_matches(&self) -> usize {
        self.rules.iter().map(|r| r.matches).sum()
    }
}

/// 应用单条规则
pub fn apply_rule(text: &str, rule: &CompiledRule) -> (String, RuleReport) {
    let (output, matches) = rule.apply(text);
    let report = RuleReport {
        label: rule.label().to_string(),
        description: rule.describe(),
        matches,
    };
    (output, report)
}

/// 按顺序应用所有规则（纯函数，不涉及 IO）
pub fn apply_rules(text: &str, rules: &[CompiledRule]) -> PatchOutcome {
    let mut current = text.to_string();
    let mut reports = Vec::with_capacity(rules.len());

    for rule in rules {
        let (next, report) = apply_rule(&current, rule);
        if report.is_noop() {
            tracing::debug!(rule = %report.label, "rule matched nothing");
        } else {
            tracing::debug!(rule = %report.label, matches = report.matches, "rule applied");
        }
        current = next;
        reports.push(report);
    }

    PatchOutcome {
        text: current,
        rules: reports,
    }
}

/// 读取目标文件、应用规则并整体写回
///
/// 即使所有规则都未命中，文件也会被重写（内容不变）。
/// 读取或解码失败时不会发生任何写入。
pub fn patch_file(
    reader: &dyn TargetReader,
    writer: &dyn TargetWriter,
    codec: &TextCodec,
    path: &Path,
    rules: &[CompiledRule],
) -> Result<PatchOutcome, PatchError> {
    let raw = reader.read(path)?;
    let decoded = codec.decode(&raw.bytes, path)?;

    let outcome = apply_rules(&decoded.content, rules);

    let bytes = codec.encode(&outcome.text, decoded.had_bom, path)?;
    writer.write(&RawText { bytes }, path)?;

    tracing::info!(
        path = %path.display(),
        applied = outcome.applied_count(),
        rules = outcome.rules.len(),
        "patched file"
    );

    Ok(outcome)
}
