use serde::Serialize;
use std::path::PathBuf;

use crate::patch::RuleReport;

/// 规则集的执行结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    /// 规则已应用（可能包含未命中的规则）
    Applied,
    /// 检测到已应用标记，未做任何修改
    AlreadyApplied,
    /// 宽松模式下前置条件不满足而跳过
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub name: String,
    pub target: PathBuf,
    #[serde(flatten)]
    pub outcome: StepOutcome,
    pub rules: Vec<RuleReport>,
    pub summary: Vec<String>,
}

impl StepReport {
    pub fn is_applied(&self) -> bool {
        self.outcome == StepOutcome::Applied
    }

    pub fn noop_rules(&self) -> impl Iterator<Item = &RuleReport> {
        self.rules.iter().filter(|r| r.is_noop())
    }
}

/// 修改过的目标文件的前后文本（用于对比输出，不参与序列化）
#[derive(Debug, Clone)]
pub struct TargetChange {
    pub path: PathBuf,
    pub before: String,
    pub after: String,
}

/// 一次流水线运行的报告
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub dry_run: bool,
    pub steps: Vec<StepReport>,
    pub written: Vec<PathBuf>,
    pub backups: Vec<PathBuf>,
    #[serde(skip)]
    pub changes: Vec<TargetChange>,
}

impl RunReport {
    pub fn applied_count(&self) -> usize {
        self.steps.iter().filter(|s| s.is_applied()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Skipped { .. }))
            .count()
    }

    pub fn noop_count(&self) -> usize {
        self.steps.iter().map(|s| s.noop_rules().count()).sum()
    }

    /// 所有规则集都已应用（或已应用过）且没有未命中的规则
    pub fn is_clean(&self) -> bool {
        self.skipped_count() == 0 && self.noop_count() == 0
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== 补丁运行报告 ===")?;

        for step in &self.steps {
            match &step.outcome {
                StepOutcome::Applied => {
                    let hit = step.rules.len() - step.noop_rules().count();
                    writeln!(
                        f,
                        "[已应用] {} -> {} ({}/{} 条规则命中)",
                        step.name,
                        step.target.display(),
                        hit,
                        step.rules.len()
                    )?;
                    for line in &step.summary {
                        writeln!(f, "    - {}", line)?;
                    }
                    for rule in step.noop_rules() {
                        writeln!(f, "    ⚠ 未命中: {}", rule.description)?;
                    }
                }
                StepOutcome::AlreadyApplied => {
                    writeln!(f, "[已应用过] {} -> {}", step.name, step.target.display())?;
                }
                StepOutcome::Skipped { reason } => {
                    writeln!(f, "[已跳过] {}: {}", step.name, reason)?;
                }
            }
        }

        if self.dry_run {
            writeln!(f, "演练模式，未写入任何文件")?;
        } else {
            writeln!(f, "写入文件: {}", self.written.len())?;
            for path in &self.written {
                writeln!(f, "  {}", path.display())?;
            }
            for path in &self.backups {
                writeln!(f, "备份: {}", path.display())?;
            }
        }
        Ok(())
    }
}
