/// 编辑器层模块
///
/// 该模块提供有状态的编辑接口，支持变更追踪、撤销/重做等功能。
/// 遵循"修改-保存分离"原则，所有修改操作仅在内存中进行，需要显式调用保存。
///
/// # 架构设计
///
/// - **target_editor**: 目标文件编辑器，管理文本缓冲区的修改状态
/// - **delta**: 变更追踪系统，支持撤销/重做
///
/// # 使用示例
///
/// ```rust,ignore
/// use site_patcher::{TargetEditor, TextCodec};
/// use site_patcher::io::FsTargetIo;
///
/// // 加载 + 编辑 + 保存工作流
/// let io = FsTargetIo;
/// let mut editor = TargetEditor::load(&io, &TextCodec::utf8(), Path::new("css/styles.css"))?;
///
/// editor.apply_rules("tighten-sections", &rules);
/// println!("修改了 {} 处", editor.modified_count());
///
/// editor.save_to_original(&io)?;
/// ```
pub mod delta;
pub mod target_editor;

// === 导出公共接口 ===
pub use delta::{ChangeOrigin, PatchDelta, TextChange};
pub use target_editor::{TargetEditor, TargetFile};
