//! 基本使用示例
//!
//! 这个示例在内存文件系统上演示 site_patcher 库的基本功能：
//! 1. 用编辑器对单个文件应用规则并撤销
//! 2. 从清单构建流水线并演练
//! 3. 正式运行后再次运行，观察"已应用"检测
//!
//! 传入清单路径时改为对磁盘上的站点演练：
//! `cargo run --example basic_usage -- demos/site-refresh.toml`

use site_patcher::io::{FsTargetIo, MemoryFs};
use site_patcher::{
    CompiledRule, Manifest, PatchDebugger, Pipeline, RunOptions, TargetEditor, TextCodec,
};
use std::path::{Path, PathBuf};

const STYLES: &str = "\
.section {
    padding: var(--spacing-xxl) 0;
    position: relative;
}

/* ===== Responsive Design ===== */
";

const NEW_HERO: &str = "\
<!-- 新首页横幅 -->
<!-- Hero Section with Slider -->
<section class=\"hero-slider\" id=\"hero\"></section>
";

const MANIFEST: &str = include_str!("site-refresh.toml");

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    if let Some(manifest_path) = args.get(1) {
        return dry_run_on_disk(&PathBuf::from(manifest_path));
    }

    let fs = MemoryFs::new()
        .with_file("site/css/styles.css", STYLES)
        .with_file("site/NEW-HERO-HTML.html", NEW_HERO);

    // 1. 编辑器：修改只在内存中进行
    println!("=== 编辑器 ===");
    let mut editor = TargetEditor::load(&fs, &TextCodec::utf8(), Path::new("site/css/styles.css"))?;
    let rule = CompiledRule::literal(
        "padding",
        "padding: var(--spacing-xxl) 0;",
        "padding: var(--spacing-lg) 0;",
    )?;
    for report in editor.apply_rules("demo", &[rule]) {
        println!("{} -> 命中 {} 处", report.description, report.matches);
    }
    print!(
        "{}",
        PatchDebugger::render_comparison("css/styles.css", editor.original(), editor.text())
    );
    editor.undo()?;
    println!("撤销后: {}", editor.summary());

    // 2. 流水线演练
    println!("\n=== 演练 ===");
    let pipeline = Pipeline::from_manifest(Manifest::from_toml_str(MANIFEST)?, Path::new("site"), &fs)?;
    println!("{}", pipeline.plan());
    let dry_run = RunOptions {
        dry_run: true,
        only: vec!["tighten-sections".to_string()],
    };
    print!("{}", pipeline.run(&fs, &fs, &dry_run)?);

    // 3. 正式运行两次
    println!("\n=== 运行 ===");
    let only = RunOptions {
        dry_run: false,
        only: vec!["tighten-sections".to_string()],
    };
    print!("{}", pipeline.run(&fs, &fs, &only)?);
    print!("{}", pipeline.run(&fs, &fs, &only)?);
    println!("写入次数: {}", fs.write_count());

    Ok(())
}

fn dry_run_on_disk(manifest_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let io = FsTargetIo;
    let pipeline = Pipeline::load(manifest_path, None, &io)?;
    println!("{}", pipeline.plan());

    let report = pipeline.run(&io, &io, &RunOptions { dry_run: true, only: Vec::new() })?;
    print!("{}", report);
    for change in &report.changes {
        print!(
            "{}",
            PatchDebugger::render_comparison(&change.path.display().to_string(), &change.before, &change.after)
        );
    }
    Ok(())
}
