/// IO 抽象层 - trait 定义
///
/// 该模块定义了目标文件读写的抽象接口，支持依赖注入和测试 mock。

use std::path::{Path, PathBuf};

use crate::utils::PatchError;

/// 目标文件原始数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawText {
    /// 文件的原始字节数据
    pub bytes: Vec<u8>,
}

/// 目标文件读取 trait
///
/// # 职责
/// - 读取目标文件的完整字节内容
/// - 不负责解码，仅负责 IO
pub trait TargetReader {
    /// 读取目标文件
    ///
    /// 文件不存在或不可读时返回 `PatchError::FileAccess`
    fn read(&self, path: &Path) -> Result<RawText, PatchError>;
}

/// 目标文件写入 trait
///
/// # 职责
/// - 用新内容完整替换目标文件（不追加、不部分写入）
/// - 在写入前按需创建备份
pub trait TargetWriter {
    /// 覆盖写入目标文件
    fn write(&self, data: &RawText, path: &Path) -> Result<(), PatchError>;

    /// 备份目标文件，返回备份路径
    fn backup(&self, path: &Path) -> Result<PathBuf, PatchError>;
}
