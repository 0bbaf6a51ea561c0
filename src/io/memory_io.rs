/// 内存文件系统
///
/// 实现 TargetReader/TargetWriter，用于测试和不落盘的演练。
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::traits::{RawText, TargetReader, TargetWriter};
use crate::utils::{backup_path_for, PatchError};

#[derive(Debug, Default)]
pub struct MemoryFs {
    files: RefCell<HashMap<PathBuf, Vec<u8>>>,
    read_only: RefCell<HashSet<PathBuf>>,
    writes: Cell<usize>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// 构建器风格添加文件
    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.files.borrow_mut().insert(path.into(), contents.into());
    }

    /// 标记为只读，写入时返回权限错误
    pub fn set_read_only(&self, path: impl Into<PathBuf>) {
        self.read_only.borrow_mut().insert(path.into());
    }

    pub fn get(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.borrow().get(path).cloned()
    }

    pub fn get_string(&self, path: &Path) -> Option<String> {
        self.get(path).and_then(|bytes| String::from_utf8(bytes).ok())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.borrow().contains_key(path)
    }

    /// 所有文件路径（排序后）
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.files.borrow().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// 成功写入的次数（不含备份）
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }
}

impl TargetReader for MemoryFs {
    fn read(&self, path: &Path) -> Result<RawText, PatchError> {
        self.get(path)
            .map(|bytes| RawText { bytes })
            .ok_or_else(|| {
                PatchError::file_access(
                    path,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
                )
            })
    }
}

impl TargetWriter for MemoryFs {
    fn write(&self, data: &RawText, path: &Path) -> Result<(), PatchError> {
        if self.read_only.borrow().contains(path) {
            return Err(PatchError::file_access(
                path,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only file"),
            ));
        }
        self.files.borrow_mut().insert(path.to_path_buf(), data.bytes.clone());
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn backup(&self, path: &Path) -> Result<PathBuf, PatchError> {
        let contents = self.read(path)?.bytes;
        let backup = backup_path_for(path);
        self.files.borrow_mut().insert(backup.clone(), contents);
        Ok(backup)
    }
}
