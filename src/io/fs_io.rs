/// 文件系统 IO 实现
///
/// 写入先落到同目录的临时文件，再整体替换目标文件，
/// 中途失败不会留下半截内容。
use std::io::Write;
use std::path::{Path, PathBuf};

use super::traits::{RawText, TargetReader, TargetWriter};
use crate::utils::{create_backup, PatchError};

/// 默认的目标文件读写器（基于 std::fs）
#[derive(Debug, Clone, Copy, Default)]
pub struct FsTargetIo;

impl TargetReader for FsTargetIo {
    fn read(&self, path: &Path) -> Result<RawText, PatchError> {
        let bytes = std::fs::read(path).map_err(|e| PatchError::file_access(path, e))?;
        Ok(RawText { bytes })
    }
}

impl TargetWriter for FsTargetIo {
    fn write(&self, data: &RawText, path: &Path) -> Result<(), PatchError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        // 替换只需要目录写权限，只读目标必须在这里拒绝
        if path.exists() {
            std::fs::OpenOptions::new()
                .write(true)
                .open(path)
                .map_err(|e| PatchError::file_access(path, e))?;
        }

        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| PatchError::file_access(path, e))?;
        temp.write_all(&data.bytes)
            .map_err(|e| PatchError::file_access(path, e))?;

        // 保留原文件权限（临时文件默认 0600）
        if let Ok(metadata) = std::fs::metadata(path) {
            temp.as_file()
                .set_permissions(metadata.permissions())
                .map_err(|e| PatchError::file_access(path, e))?;
        }

        temp.persist(path)
            .map_err(|e| PatchError::file_access(path, e.error))?;
        Ok(())
    }

    fn backup(&self, path: &Path) -> Result<PathBuf, PatchError> {
        create_backup(path)
    }
}
