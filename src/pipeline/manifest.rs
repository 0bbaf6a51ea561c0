use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::PatchSettings;
use crate::rule::RuleSpec;
use crate::utils::PatchError;

/// 支持的清单扩展名
pub const MANIFEST_EXTENSIONS: &[&str] = &["toml", "json"];

/// 补丁清单
///
/// TOML 示例：
///
/// ```toml
/// [settings]
/// backup = true
///
/// [[ruleset]]
/// name = "tighten-sections"
/// target = "css/styles.css"
/// requires = ["padding: var(--spacing-xxl) 0;"]
/// applied_marker = "/* Tighter section spacing */"
///
/// [[ruleset.rules]]
/// kind = "literal"
/// search = "padding: var(--spacing-xxl) 0;"
/// replace = "padding: var(--spacing-lg) 0;"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub settings: PatchSettings,
    #[serde(default, rename = "ruleset")]
    pub rule_sets: Vec<RuleSetSpec>,
}

/// 规则集（清单中的原始形式）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSetSpec {
    pub name: String,
    /// 相对于清单根目录的目标文件路径
    pub target: PathBuf,
    /// 必须在本次运行中先于本规则集完成的规则集
    #[serde(default)]
    pub after: Vec<String>,
    /// 运行前必须存在的片段
    #[serde(default)]
    pub requires: Vec<String>,
    /// 运行前必须不存在的片段
    #[serde(default)]
    pub forbids: Vec<String>,
    /// 存在即表示本规则集已经应用过
    #[serde(default)]
    pub applied_marker: Option<String>,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
    /// 成功后打印的说明
    #[serde(default)]
    pub summary: Vec<String>,
}

impl Manifest {
    pub fn from_toml_str(content: &str) -> Result<Self, PatchError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self, PatchError> {
        Ok(serde_json::from_str(content)?)
    }

    /// 按扩展名选择格式读取清单
    pub fn from_path(path: &Path) -> Result<Self, PatchError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        let content = std::fs::read_to_string(path).map_err(|e| PatchError::file_access(path, e))?;

        match extension.as_deref() {
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Self::from_json_str(&content),
            _ => Err(PatchError::Manifest(format!(
                "{}: manifest must be one of {:?}",
                path.display(),
                MANIFEST_EXTENSIONS
            ))),
        }
    }
}
