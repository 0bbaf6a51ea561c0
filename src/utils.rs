use thiserror::Error;
use std::path::{Component, Path, PathBuf};

/// 自定义错误类型
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("cannot access {path}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid {encoding} text")]
    Encoding { path: PathBuf, encoding: String },

    #[error("Unsupported encoding: {0}")]
    UnknownEncoding(String),

    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Invalid pattern in rule {rule}: {source}")]
    InvalidPattern {
        rule: String,
        #[source]
        source: regex::Error,
    },

    #[error("rule set '{rule_set}' cannot run: {detail}")]
    PreconditionFailed { rule_set: String, detail: String },

    #[error("rule #{index} of '{rule_set}' matched nothing")]
    NoopRule { rule_set: String, index: usize },

    #[error("Invalid manifest: {0}")]
    Manifest(String),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,
}

impl PatchError {
    /// 为 IO 错误附加文件路径
    pub fn file_access(path: &Path, source: std::io::Error) -> Self {
        PatchError::FileAccess {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// 截断过长文本用于显示（按字符计数，避免切断多字节字符）
pub fn preview(text: &str, max_chars: usize) -> String {
    let single_line = text.replace('\n', "\\n");
    if single_line.chars().count() > max_chars {
        format!("{}...", single_line.chars().take(max_chars).collect::<String>())
    } else {
        single_line
    }
}

/// 生成备份文件路径：`<文件名>.<时间戳>.bak`
pub fn backup_path_for(file_path: &Path) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y-%m-%d-%H-%M-%S");
    let file_name = file_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    file_path.with_file_name(format!("{}.{}.bak", file_name, timestamp))
}

/// 按词法规整路径：去掉 `.`，`..` 抵消前一段普通路径
///
/// 不访问文件系统，同一文件的不同写法得到相同结果。
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    let mut depth = 0usize;

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    normalized.pop();
                    depth -= 1;
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            Component::Normal(part) => {
                normalized.push(part);
                depth += 1;
            }
            Component::RootDir | Component::Prefix(_) => normalized.push(component.as_os_str()),
        }
    }

    normalized
}

/// 创建文件备份
pub fn create_backup(file_path: &Path) -> Result<PathBuf, PatchError> {
    if !file_path.exists() {
        return Err(PatchError::file_access(
            file_path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "原文件不存在"),
        ));
    }

    let backup_path = backup_path_for(file_path);

    std::fs::copy(file_path, &backup_path)
        .map_err(|e| PatchError::file_access(file_path, e))?;

    Ok(backup_path)
}
