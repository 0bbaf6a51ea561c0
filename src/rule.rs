use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils::{preview, PatchError};

/// 替换规则（清单中的原始形式）
///
/// 清单中通过 `kind` 字段区分：
/// - `literal`: 精确子串替换（替换所有出现）
/// - `regex`: 正则替换，模板使用 `$1` / `${name}` 引用分组
/// - `insert_before` / `insert_after`: 在锚点前/后插入文本
/// - `remove`: 删除所有出现的片段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleSpec {
    Literal {
        search: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        replace: Option<String>,
        /// 从其他文件读取替换文本
        #[serde(default, skip_serializing_if = "Option::is_none")]
        replace_from: Option<FragmentSource>,
    },
    Regex {
        pattern: String,
        template: String,
    },
    InsertBefore {
        anchor: String,
        text: String,
    },
    InsertAfter {
        anchor: String,
        text: String,
    },
    Remove {
        search: String,
    },
}

/// 外部片段来源
///
/// 从 `path` 读取文本，可选地从第一次出现的 `start` 截取到最后一次出现的 `end`（含）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentSource {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

impl FragmentSource {
    /// 从文件内容中截取片段
    pub fn extract(&self, content: &str) -> Result<String, PatchError> {
        let mut fragment = content;

        if let Some(start) = &self.start {
            let pos = fragment.find(start.as_str()).ok_or_else(|| {
                PatchError::InvalidRule(format!(
                    "start marker {:?} not found in {}",
                    start,
                    self.path.display()
                ))
            })?;
            fragment = &fragment[pos..];
        }

        if let Some(end) = &self.end {
            let pos = fragment.rfind(end.as_str()).ok_or_else(|| {
                PatchError::InvalidRule(format!(
                    "end marker {:?} not found in {}",
                    end,
                    self.path.display()
                ))
            })?;
            fragment = &fragment[..pos + end.len()];
        }

        Ok(fragment.to_string())
    }
}

impl RuleSpec {
    /// 便捷构造：精确替换
    pub fn literal(search: impl Into<String>, replace: impl Into<String>) -> Self {
        RuleSpec::Literal {
            search: search.into(),
            replace: Some(replace.into()),
            replace_from: None,
        }
    }

    /// 便捷构造：正则替换
    pub fn regex(pattern: impl Into<String>, template: impl Into<String>) -> Self {
        RuleSpec::Regex {
            pattern: pattern.into(),
            template: template.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RuleSpec::Literal { .. } => "literal",
            RuleSpec::Regex { .. } => "regex",
            RuleSpec::InsertBefore { .. } => "insert_before",
            RuleSpec::InsertAfter { .. } => "insert_after",
            RuleSpec::Remove { .. } => "remove",
        }
    }

    /// 编译规则（不支持 `replace_from`）
    pub fn compile(&self, label: &str) -> Result<CompiledRule, PatchError> {
        self.compile_with(label, &|source: &FragmentSource| {
            Err(PatchError::InvalidRule(format!(
                "{}: replace_from {} needs a fragment loader",
                label,
                source.path.display()
            )))
        })
    }

    /// 编译规则，`replace_from` 通过 `load_fragment` 解析
    pub fn compile_with(
        &self,
        label: &str,
        load_fragment: &dyn Fn(&FragmentSource) -> Result<String, PatchError>,
    ) -> Result<CompiledRule, PatchError> {
        match self {
            RuleSpec::Literal { search, replace, replace_from } => {
                let replacement = match (replace, replace_from) {
                    (Some(text), None) => text.clone(),
                    (None, Some(source)) => load_fragment(source)?,
                    (Some(_), Some(_)) => {
                        return Err(PatchError::InvalidRule(format!(
                            "{}: use either replace or replace_from, not both",
                            label
                        )))
                    }
                    (None, None) => {
                        return Err(PatchError::InvalidRule(format!(
                            "{}: literal rule needs replace or replace_from",
                            label
                        )))
                    }
                };
                CompiledRule::literal(label, search, replacement)
            }
            RuleSpec::Regex { pattern, template } => CompiledRule::regex(label, pattern, template),
            RuleSpec::InsertBefore { anchor, text } => {
                CompiledRule::literal(label, anchor, format!("{}{}", text, anchor))
            }
            RuleSpec::InsertAfter { anchor, text } => {
                CompiledRule::literal(label, anchor, format!("{}{}", anchor, text))
            }
            RuleSpec::Remove { search } => CompiledRule::literal(label, search, String::new()),
        }
    }
}

/// 匹配器
#[derive(Debug, Clone)]
pub enum Matcher {
    Literal(String),
    Pattern(Regex),
}

/// 编译后的规则
#[derive(Debug, Clone)]
pub struct CompiledRule {
    label: String,
    matcher: Matcher,
    replacement: String,
}

impl CompiledRule {
    /// 精确子串规则，空片段会被拒绝（否则会在每个字符间插入）
    pub fn literal(
        label: impl Into<String>,
        search: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Result<Self, PatchError> {
        let label = label.into();
        let search = search.into();
        if search.is_empty() {
            return Err(PatchError::InvalidRule(format!("{}: empty search fragment", label)));
        }
        Ok(Self {
            label,
            matcher: Matcher::Literal(search),
            replacement: replacement.into(),
        })
    }

    pub fn regex(
        label: impl Into<String>,
        pattern: &str,
        template: impl Into<String>,
    ) -> Result<Self, PatchError> {
        let label = label.into();
        let regex = Regex::new(pattern).map_err(|source| PatchError::InvalidPattern {
            rule: label.clone(),
            source,
        })?;
        Ok(Self {
            label,
            matcher: Matcher::Pattern(regex),
            replacement: template.into(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// 统计匹配次数
    pub fn count_matches(&self, text: &str) -> usize {
        match &self.matcher {
            Matcher::Literal(search) => text.matches(search.as_str()).count(),
            Matcher::Pattern(regex) => regex.find_iter(text).count(),
        }
    }

    /// 应用到文本，返回新文本和匹配次数
    ///
    /// 未匹配时返回原文本的副本。
    pub fn apply(&self, text: &str) -> (String, usize) {
        let matches = self.count_matches(text);
        if matches == 0 {
            return (text.to_string(), 0);
        }

        let output = match &self.matcher {
            Matcher::Literal(search) => text.replace(search.as_str(), &self.replacement),
            Matcher::Pattern(regex) => regex.replace_all(text, self.replacement.as_str()).into_owned(),
        };
        (output, matches)
    }

    /// 人类可读的描述
    pub fn describe(&self) -> String {
        match &self.matcher {
            Matcher::Literal(search) => format!(
                "{}: \"{}\" -> \"{}\"",
                self.label,
                preview(search, 40),
                preview(&self.replacement, 40)
            ),
            Matcher::Pattern(regex) => format!(
                "{}: /{}/ -> \"{}\"",
                self.label,
                preview(regex.as_str(), 40),
                preview(&self.replacement, 40)
            ),
        }
    }
}

/// 规则集前置条件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precondition {
    /// 片段必须存在
    Requires(String),
    /// 片段必须不存在
    Forbids(String),
}

impl Precondition {
    pub fn holds(&self, text: &str) -> bool {
        match self {
            Precondition::Requires(fragment) => text.contains(fragment.as_str()),
            Precondition::Forbids(fragment) => !text.contains(fragment.as_str()),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Precondition::Requires(fragment) => format!("requires \"{}\"", preview(fragment, 60)),
            Precondition::Forbids(fragment) => format!("forbids \"{}\"", preview(fragment, 60)),
        }
    }
}
