//! 补丁应用器集成测试
//!
//! 测试场景：
//! - 未命中的规则不改变文本，文件仍被整体重写
//! - 精确替换替换所有出现
//! - 规则顺序敏感：后一条规则看到前一条的结果
//! - 读取失败时不写入任何内容
//! - 未命中的内容逐字节保留

use std::path::Path;

use site_patcher::io::FsTargetIo;
use site_patcher::{patch_file, CompiledRule, PatchError, TextCodec};
use tempfile::TempDir;

const STYLES: &str = "\
:root {
    --primary: #1a73e8;
}

.section {
    padding: 6rem 0;
    position: relative;
}

.footer {
    background: #f5f5f5;
}
";

fn write_styles(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("styles.css");
    std::fs::write(&path, STYLES).unwrap();
    path
}

fn literal(search: &str, replace: &str) -> CompiledRule {
    CompiledRule::literal("test", search, replace).unwrap()
}

fn patch(path: &Path, rules: &[CompiledRule]) -> Result<site_patcher::PatchOutcome, PatchError> {
    patch_file(&FsTargetIo, &FsTargetIo, &TextCodec::utf8(), path, rules)
}

#[test]
fn test_section_padding_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_styles(&temp_dir);
    let rule = literal("padding: 6rem 0;", "padding: 3rem 0;");

    let first = patch(&path, std::slice::from_ref(&rule)).unwrap();
    assert_eq!(first.rules[0].matches, 1);

    let after_first = std::fs::read_to_string(&path).unwrap();
    assert_eq!(after_first, STYLES.replace("padding: 6rem 0;", "padding: 3rem 0;"));

    // 第二次运行：片段已不存在，文件内容不变
    let second = patch(&path, &[rule]).unwrap();
    assert!(second.rules[0].is_noop());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), after_first);
}

#[test]
fn test_noop_leaves_bytes_unchanged() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_styles(&temp_dir);

    let outcome = patch(&path, &[literal("rgba(0, 0, 0, 0.85)", "rgba(0, 0, 0, 0.15)")]).unwrap();

    assert_eq!(outcome.applied_count(), 0);
    assert_eq!(std::fs::read(&path).unwrap(), STYLES.as_bytes());
}

#[test]
fn test_all_occurrences_replaced() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("hero-slider.css");
    let css = "a { color: #C8E6FF; }\nb { color: #C8E6FF; }\nc { border-color: #C8E6FF; }\n";
    std::fs::write(&path, css).unwrap();

    let outcome = patch(&path, &[literal("#C8E6FF", "#ffffff")]).unwrap();

    assert_eq!(outcome.rules[0].matches, 3);
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(!written.contains("#C8E6FF"));
    assert_eq!(written.matches("#ffffff").count(), 3);
}

#[test]
fn test_order_sensitivity() {
    let temp_dir = TempDir::new().unwrap();
    let a = literal("padding: 6rem 0;", "padding: 3rem 0;");
    let b = literal("padding: 3rem 0;", "padding: var(--spacing-lg) 0;");

    let forward_path = write_styles(&temp_dir);
    patch(&forward_path, &[a.clone(), b.clone()]).unwrap();
    let forward = std::fs::read_to_string(&forward_path).unwrap();
    assert!(forward.contains("padding: var(--spacing-lg) 0;"));

    let backward_path = write_styles(&temp_dir);
    let outcome = patch(&backward_path, &[b, a]).unwrap();
    assert!(outcome.rules[0].is_noop());
    let backward = std::fs::read_to_string(&backward_path).unwrap();
    assert!(backward.contains("padding: 3rem 0;"));
    assert!(!backward.contains("var(--spacing-lg)"));
}

#[test]
fn test_missing_file_is_file_access_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("missing.css");

    let result = patch(&path, &[literal("a", "b")]);

    assert!(matches!(result, Err(PatchError::FileAccess { .. })));
    assert!(!path.exists());
}

#[test]
fn test_undecodable_file_is_left_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.css");
    let bytes = b"body { content: \"\xC3\x28\"; }".to_vec();
    std::fs::write(&path, &bytes).unwrap();

    let result = patch(&path, &[literal("body", "html")]);

    assert!(matches!(result, Err(PatchError::Encoding { .. })));
    assert_eq!(std::fs::read(&path).unwrap(), bytes);
}

#[test]
fn test_unrelated_content_roundtrips() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("index.html");
    let html = "<!DOCTYPE html>\r\n<html>\r\n<head>\r\n    <link rel=\"stylesheet\" href=\"css/styles.css\">\r\n</head>\r\n<body>\t中文 ✓\r\n</body>\r\n</html>";
    std::fs::write(&path, html).unwrap();

    patch(
        &path,
        &[literal(
            "<link rel=\"stylesheet\" href=\"css/styles.css\">",
            "<link rel=\"stylesheet\" href=\"css/styles.css\">\n    <link rel=\"stylesheet\" href=\"css/hero-slider.css\">",
        )],
    )
    .unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    let (head, tail) = html.split_once("<link").unwrap();
    assert!(written.starts_with(head));
    assert!(written.ends_with(tail.split_once('>').unwrap().1));
    assert!(written.contains("css/hero-slider.css"));
}

#[test]
fn test_regex_rule_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("index.html");
    std::fs::write(
        &path,
        "<link href=\"https://fonts.googleapis.com/css2?family=Inter:wght@300;400;500;600;700;800&display=swap\">",
    )
    .unwrap();

    let rule = CompiledRule::regex(
        "fonts",
        r"family=Inter:wght@([0-9;]+)",
        "family=Inter:wght@${1}&family=Playfair+Display:wght@400;500;600;700;800",
    )
    .unwrap();
    let outcome = patch(&path, &[rule]).unwrap();

    assert_eq!(outcome.rules[0].matches, 1);
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains(
        "family=Inter:wght@300;400;500;600;700;800&family=Playfair+Display:wght@400;500;600;700;800&display=swap"
    ));
}

#[cfg(unix)]
#[test]
fn test_read_only_target_is_file_access_error() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let path = write_styles(&temp_dir);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o444)).unwrap();
    // root 可以写入只读文件
    if std::fs::OpenOptions::new().write(true).open(&path).is_ok() {
        return;
    }

    let result = patch(&path, &[literal("padding: 6rem 0;", "padding: 3rem 0;")]);

    assert!(matches!(result, Err(PatchError::FileAccess { .. })));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), STYLES);
}
