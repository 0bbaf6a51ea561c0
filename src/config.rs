use serde::{Deserialize, Serialize};

use crate::text::{TextCodec, DEFAULT_ENCODING};
use crate::utils::PatchError;

/// 前置条件不满足时的处理方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// 任意规则集前置条件失败即中止，不写入任何文件
    #[default]
    Strict,
    /// 跳过前置条件失败的规则集，继续执行
    Lenient,
}

/// 运行配置（清单中的 `[settings]` 表）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchSettings {
    /// 目标文件编码标签
    pub encoding: String,
    /// 写入前创建带时间戳的备份
    pub backup: bool,
    pub mode: RunMode,
    /// 未命中的规则视为错误
    pub deny_noop: bool,
}

impl Default for PatchSettings {
    fn default() -> Self {
        Self {
            encoding: DEFAULT_ENCODING.to_string(),
            backup: false,
            mode: RunMode::Strict,
            deny_noop: false,
        }
    }
}

/// 命令行覆盖项，`None` 表示沿用清单配置
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub encoding: Option<String>,
    pub backup: Option<bool>,
    pub mode: Option<RunMode>,
    pub deny_noop: Option<bool>,
}

impl PatchSettings {
    pub fn codec(&self) -> Result<TextCodec, PatchError> {
        TextCodec::for_label(&self.encoding)
    }

    /// 合并命令行覆盖项
    pub fn with_overrides(mut self, overrides: &SettingsOverrides) -> Self {
        if let Some(encoding) = &overrides.encoding {
            self.encoding = encoding.clone();
        }
        if let Some(backup) = overrides.backup {
            self.backup = backup;
        }
        if let Some(mode) = overrides.mode {
            self.mode = mode;
        }
        if let Some(deny_noop) = overrides.deny_noop {
            self.deny_noop = deny_noop;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_table() {
        let settings: PatchSettings = toml::from_str("").unwrap();
        assert_eq!(settings, PatchSettings::default());
        assert_eq!(settings.codec().unwrap().name(), "UTF-8");
    }

    #[test]
    fn test_partial_table() {
        let settings: PatchSettings = toml::from_str("mode = \"lenient\"\nbackup = true").unwrap();
        assert_eq!(settings.mode, RunMode::Lenient);
        assert!(settings.backup);
        assert!(!settings.deny_noop);
        assert_eq!(settings.encoding, "utf-8");
    }

    #[test]
    fn test_overrides() {
        let settings = PatchSettings::default().with_overrides(&SettingsOverrides {
            encoding: Some("windows-1252".to_string()),
            backup: None,
            mode: Some(RunMode::Lenient),
            deny_noop: Some(true),
        });
        assert_eq!(settings.encoding, "windows-1252");
        assert!(!settings.backup);
        assert_eq!(settings.mode, RunMode::Lenient);
        assert!(settings.deny_noop);
    }

    #[test]
    fn test_unknown_encoding() {
        let settings = PatchSettings {
            encoding: "ebcdic-martian".to_string(),
            ..PatchSettings::default()
        };
        assert!(matches!(settings.codec(), Err(PatchError::UnknownEncoding(_))));
    }
}
