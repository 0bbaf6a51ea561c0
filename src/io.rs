/// IO 抽象层模块
///
/// 该模块提供了目标文件读写的抽象接口，遵循依赖倒置原则。
/// 补丁核心只依赖 trait，测试时可以换成内存文件系统。
///
/// # 架构设计
///
/// - **traits**: 定义 TargetReader/TargetWriter trait 接口
/// - **fs_io**: 基于文件系统的默认实现（原子替换写入）
/// - **memory_io**: 内存文件系统，用于测试和演练
///
/// # 使用示例
///
/// ```rust,ignore
/// use site_patcher::io::{FsTargetIo, TargetReader};
///
/// let io = FsTargetIo;
/// let raw = io.read(Path::new("css/styles.css"))?;
/// ```
pub mod traits;
pub mod fs_io;
pub mod memory_io;

// === 导出 trait 定义 ===
pub use traits::{RawText, TargetReader, TargetWriter};

// === 导出默认实现 ===
pub use fs_io::FsTargetIo;
pub use memory_io::MemoryFs;
