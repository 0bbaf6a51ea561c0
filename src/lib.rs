pub mod config;
pub mod debug;
pub mod editor;
pub mod io;
pub mod patch;
pub mod pipeline;
pub mod rule;
pub mod text;
pub mod utils;

// 重新导出主要结构
pub use config::{PatchSettings, RunMode, SettingsOverrides};
pub use debug::PatchDebugger;
pub use editor::{PatchDelta, TargetEditor, TargetFile};
pub use patch::{apply_rules, patch_file, PatchOutcome, RuleReport};
pub use pipeline::{Manifest, Pipeline, RunOptions, RunReport, StepOutcome};
pub use rule::{CompiledRule, FragmentSource, Precondition, RuleSpec};
pub use text::TextCodec;
pub use utils::PatchError;

// 常量定义
pub const SUPPORTED_EXTENSIONS: &[&str] = &["css", "html", "htm", "js"];
