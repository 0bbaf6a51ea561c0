/// 补丁流水线模块
///
/// 把"先运行脚本 1 再运行脚本 2"这种人为约定变成显式的有序规则集：
/// 每个规则集声明目标文件、依赖、前置条件和已应用标记，
/// 运行时可以发现顺序错误或重复运行，而不是静默地什么都不做。
///
/// 所有修改先在内存中完成，全部规则集通过后才统一写回；
/// 任何一步失败都不会写入任何文件。
pub mod manifest;
pub mod report;

pub use manifest::{Manifest, RuleSetSpec, MANIFEST_EXTENSIONS};
pub use report::{RunReport, StepOutcome, StepReport, TargetChange};

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::{PatchSettings, RunMode};
use crate::editor::TargetEditor;
use crate::io::{TargetReader, TargetWriter};
use crate::rule::{CompiledRule, FragmentSource, Precondition};
use crate::text::TextCodec;
use crate::utils::{normalize_path, PatchError};

/// 编译后的规则集
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub name: String,
    /// 已按根目录解析的目标路径
    pub target: PathBuf,
    pub after: Vec<String>,
    pub preconditions: Vec<Precondition>,
    pub applied_marker: Option<String>,
    pub rules: Vec<CompiledRule>,
    pub summary: Vec<String>,
}

/// 运行选项
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// 只在内存中执行，不写入文件
    pub dry_run: bool,
    /// 只运行指定的规则集（为空表示全部）
    pub only: Vec<String>,
}

/// 补丁流水线
#[derive(Debug, Clone)]
pub struct Pipeline {
    settings: PatchSettings,
    codec: TextCodec,
    root: PathBuf,
    rule_sets: Vec<RuleSet>,
}

impl Pipeline {
    /// 从清单构建流水线
    ///
    /// 校验规则集名称唯一、`after` 只引用前面的规则集，并编译所有规则。
    /// `replace_from` 引用的片段文件通过 `reader` 读取。
    pub fn from_manifest(
        manifest: Manifest,
        root: &Path,
        reader: &dyn TargetReader,
    ) -> Result<Self, PatchError> {
        let codec = manifest.settings.codec()?;
        let mut seen: HashSet<String> = HashSet::new();
        let mut rule_sets = Vec::with_capacity(manifest.rule_sets.len());

        let load_fragment = |source: &FragmentSource| -> Result<String, PatchError> {
            let path = root.join(&source.path);
            let raw = reader.read(&path)?;
            let decoded = codec.decode(&raw.bytes, &path)?;
            source.extract(&decoded.content)
        };

        for spec in manifest.rule_sets {
            if spec.name.trim().is_empty() {
                return Err(PatchError::Manifest("rule set without a name".to_string()));
            }
            if seen.contains(&spec.name) {
                return Err(PatchError::Manifest(format!("duplicate rule set '{}'", spec.name)));
            }
            if spec.target.as_os_str().is_empty() {
                return Err(PatchError::Manifest(format!("rule set '{}' has no target", spec.name)));
            }
            if spec.rules.is_empty() {
                return Err(PatchError::Manifest(format!("rule set '{}' has no rules", spec.name)));
            }
            if let Some(dep) = spec.after.iter().find(|dep| !seen.contains(*dep)) {
                return Err(PatchError::Manifest(format!(
                    "rule set '{}' must come after '{}', which is not declared before it",
                    spec.name, dep
                )));
            }
            if spec.applied_marker.as_deref() == Some("") {
                return Err(PatchError::Manifest(format!(
                    "rule set '{}' has an empty applied_marker",
                    spec.name
                )));
            }

            let rules = spec
                .rules
                .iter()
                .enumerate()
                .map(|(i, rule)| {
                    let label = format!("{}#{} {}", spec.name, i + 1, rule.kind());
                    rule.compile_with(&label, &load_fragment)
                })
                .collect::<Result<Vec<_>, _>>()?;

            let preconditions = spec
                .requires
                .into_iter()
                .map(Precondition::Requires)
                .chain(spec.forbids.into_iter().map(Precondition::Forbids))
                .collect();

            seen.insert(spec.name.clone());
            rule_sets.push(RuleSet {
                name: spec.name,
                target: normalize_path(&root.join(&spec.target)),
                after: spec.after,
                preconditions,
                applied_marker: spec.applied_marker,
                rules,
                summary: spec.summary,
            });
        }

        Ok(Self {
            settings: manifest.settings,
            codec,
            root: root.to_path_buf(),
            rule_sets,
        })
    }

    /// 从清单文件加载，根目录默认为清单所在目录
    pub fn load(path: &Path, root: Option<&Path>, reader: &dyn TargetReader) -> Result<Self, PatchError> {
        let manifest = Manifest::from_path(path)?;
        let root = root
            .map(Path::to_path_buf)
            .unwrap_or_else(|| path.parent().map(Path::to_path_buf).unwrap_or_default());
        Self::from_manifest(manifest, &root, reader)
    }

    /// 单个目标、单个规则集的流水线（无前置条件）
    pub fn single(
        settings: PatchSettings,
        name: &str,
        target: PathBuf,
        rules: Vec<CompiledRule>,
    ) -> Result<Self, PatchError> {
        let codec = settings.codec()?;
        Ok(Self {
            settings,
            codec,
            root: PathBuf::new(),
            rule_sets: vec![RuleSet {
                name: name.to_string(),
                target: normalize_path(&target),
                after: Vec::new(),
                preconditions: Vec::new(),
                applied_marker: None,
                rules,
                summary: Vec::new(),
            }],
        })
    }

    pub fn settings(&self) -> &PatchSettings {
        &self.settings
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn rule_sets(&self) -> &[RuleSet] {
        &self.rule_sets
    }

    pub fn get(&self, name: &str) -> Option<&RuleSet> {
        self.rule_sets.iter().find(|set| set.name == name)
    }

    /// 列出执行计划
    pub fn plan(&self) -> String {
        let mut lines = Vec::with_capacity(self.rule_sets.len());
        for (i, set) in self.rule_sets.iter().enumerate() {
            let mut line = format!(
                "{}. {} -> {} ({} 条规则)",
                i + 1,
                set.name,
                set.target.display(),
                set.rules.len()
            );
            if !set.after.is_empty() {
                line.push_str(&format!(" 依赖: {}", set.after.join(", ")));
            }
            if set.applied_marker.is_some() {
                line.push_str(" [可检测重复运行]");
            }
            lines.push(line);
        }
        lines.join("\n")
    }

    /// 执行流水线
    ///
    /// 前置条件失败时：严格模式返回 `PreconditionFailed`，宽松模式跳过该规则集。
    /// 只有至少一个规则集被应用的目标文件才会写回，每个文件只写一次。
    pub fn run(
        &self,
        reader: &dyn TargetReader,
        writer: &dyn TargetWriter,
        options: &RunOptions,
    ) -> Result<RunReport, PatchError> {
        if let Some(unknown) = options.only.iter().find(|name| self.get(name).is_none()) {
            return Err(PatchError::Manifest(format!("unknown rule set '{}'", unknown)));
        }

        let selected: Vec<&RuleSet> = self
            .rule_sets
            .iter()
            .filter(|set| options.only.is_empty() || options.only.contains(&set.name))
            .collect();

        let mut session = Session {
            reader,
            codec: &self.codec,
            editors: Vec::new(),
        };
        let mut completed: HashSet<&str> = HashSet::new();
        let mut dirty: Vec<usize> = Vec::new();
        let mut steps = Vec::with_capacity(selected.len());

        for set in &selected {
            let editor_index = session.editor_index(&set.target)?;

            let already_applied = set
                .applied_marker
                .as_deref()
                .is_some_and(|marker| session.editors[editor_index].contains(marker));
            if already_applied {
                tracing::info!(rule_set = %set.name, "applied marker present, skipping");
                completed.insert(&set.name);
                steps.push(StepReport {
                    name: set.name.clone(),
                    target: set.target.clone(),
                    outcome: StepOutcome::AlreadyApplied,
                    rules: Vec::new(),
                    summary: Vec::new(),
                });
                continue;
            }

            if let Some(reason) = self.unmet_dependency(set, &selected, &completed, &mut session)? {
                steps.push(self.precondition_failed(set, reason)?);
                continue;
            }

            let editor = &mut session.editors[editor_index];

            if let Some(failed) = set.preconditions.iter().find(|p| !editor.check(p)) {
                steps.push(self.precondition_failed(set, failed.describe())?);
                continue;
            }

            let rules = editor.apply_rules(&set.name, &set.rules);

            if let Some(index) = rules.iter().position(|r| r.is_noop()) {
                if self.settings.deny_noop {
                    return Err(PatchError::NoopRule {
                        rule_set: set.name.clone(),
                        index: index + 1,
                    });
                }
                for rule in rules.iter().filter(|r| r.is_noop()) {
                    tracing::warn!(rule_set = %set.name, rule = %rule.description, "rule matched nothing");
                }
            }

            tracing::info!(rule_set = %set.name, target = %set.target.display(), "rule set applied");
            completed.insert(&set.name);
            if !dirty.contains(&editor_index) {
                dirty.push(editor_index);
            }
            steps.push(StepReport {
                name: set.name.clone(),
                target: set.target.clone(),
                outcome: StepOutcome::Applied,
                rules,
                summary: set.summary.clone(),
            });
        }

        let mut report = RunReport {
            dry_run: options.dry_run,
            steps,
            ..RunReport::default()
        };

        for &index in &dirty {
            let editor = &session.editors[index];
            if editor.is_modified() {
                report.changes.push(TargetChange {
                    path: editor.path().to_path_buf(),
                    before: editor.original().to_string(),
                    after: editor.text().to_string(),
                });
            }
        }

        if options.dry_run {
            return Ok(report);
        }

        for &index in &dirty {
            let editor = &session.editors[index];
            if self.settings.backup {
                report.backups.push(writer.backup(editor.path())?);
            }
            editor.save_to_original(writer)?;
            tracing::info!(path = %editor.path().display(), "wrote target");
            report.written.push(editor.path().to_path_buf());
        }

        Ok(report)
    }

    /// 检查 `after` 依赖
    ///
    /// 依赖在本次运行中已完成即满足；不在本次选择范围内的依赖，
    /// 若其已应用标记存在于目标文件中也视为满足。
    fn unmet_dependency(
        &self,
        set: &RuleSet,
        selected: &[&RuleSet],
        completed: &HashSet<&str>,
        session: &mut Session<'_>,
    ) -> Result<Option<String>, PatchError> {
        for dep in &set.after {
            if completed.contains(dep.as_str()) {
                continue;
            }

            let in_selection = selected.iter().any(|s| &s.name == dep);
            if !in_selection {
                if let Some(dep_set) = self.get(dep) {
                    if let Some(marker) = &dep_set.applied_marker {
                        let index = session.editor_index(&dep_set.target)?;
                        if session.editors[index].contains(marker) {
                            continue;
                        }
                    }
                }
            }

            return Ok(Some(format!("must run after '{}', which has not been applied", dep)));
        }
        Ok(None)
    }

    fn precondition_failed(&self, set: &RuleSet, detail: String) -> Result<StepReport, PatchError> {
        match self.settings.mode {
            RunMode::Strict => Err(PatchError::PreconditionFailed {
                rule_set: set.name.clone(),
                detail,
            }),
            RunMode::Lenient => {
                tracing::warn!(rule_set = %set.name, reason = %detail, "skipping rule set");
                Ok(StepReport {
                    name: set.name.clone(),
                    target: set.target.clone(),
                    outcome: StepOutcome::Skipped { reason: detail },
                    rules: Vec::new(),
                    summary: Vec::new(),
                })
            }
        }
    }
}

/// 一次运行中加载的目标文件（每个路径只加载一次）
struct Session<'a> {
    reader: &'a dyn TargetReader,
    codec: &'a TextCodec,
    editors: Vec<TargetEditor>,
}

impl Session<'_> {
    fn editor_index(&mut self, path: &Path) -> Result<usize, PatchError> {
        if let Some(index) = self.editors.iter().position(|e| e.path() == path) {
            return Ok(index);
        }
        tracing::debug!(path = %path.display(), "loading target");
        let editor = TargetEditor::load(self.reader, self.codec, path)?.without_history();
        self.editors.push(editor);
        Ok(self.editors.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryFs;

    const STYLES: &str = "\
.section {
    padding: var(--spacing-xxl) 0;
    position: relative;
}

/* ===== Responsive Design ===== */
";

    const MANIFEST: &str = r#"
[[ruleset]]
name = "tighten-sections"
target = "css/styles.css"
requires = ["padding: var(--spacing-xxl) 0;"]
applied_marker = "/* Tighter section spacing for better flow */"
summary = ["Section padding: 6rem -> 3rem"]

[[ruleset.rules]]
kind = "literal"
search = "padding: var(--spacing-xxl) 0;"
replace = "padding: var(--spacing-lg) 0;"

[[ruleset.rules]]
kind = "insert_before"
anchor = "/* ===== Responsive Design ===== */"
text = """
/* Tighter section spacing for better flow */
.section + .section {
    padding-top: var(--spacing-md);
}

"""

[[ruleset]]
name = "tumbling"
target = "css/styles.css"
after = ["tighten-sections"]
applied_marker = "@keyframes tumbleIn"

[[ruleset.rules]]
kind = "insert_before"
anchor = "/* ===== Responsive Design ===== */"
text = """
@keyframes tumbleIn {
    0% { opacity: 0; }
    100% { opacity: 1; }
}

"""
"#;

    fn pipeline(fs: &MemoryFs, manifest: &str) -> Pipeline {
        let manifest = Manifest::from_toml_str(manifest).unwrap();
        Pipeline::from_manifest(manifest, Path::new("site"), fs).unwrap()
    }

    fn site() -> MemoryFs {
        MemoryFs::new().with_file("site/css/styles.css", STYLES)
    }

    #[test]
    fn test_run_applies_in_order_and_writes_once() {
        let fs = site();
        let report = pipeline(&fs, MANIFEST).run(&fs, &fs, &RunOptions::default()).unwrap();

        assert_eq!(report.applied_count(), 2);
        assert!(report.is_clean());
        assert_eq!(fs.write_count(), 1);
        assert_eq!(report.written, vec![PathBuf::from("site/css/styles.css")]);

        let css = fs.get_string(Path::new("site/css/styles.css")).unwrap();
        assert!(css.contains("padding: var(--spacing-lg) 0;"));
        let spacing = css.find("Tighter section spacing").unwrap();
        let keyframes = css.find("@keyframes tumbleIn").unwrap();
        let responsive = css.find("/* ===== Responsive Design ===== */").unwrap();
        assert!(spacing < keyframes && keyframes < responsive);
    }

    #[test]
    fn test_second_run_detects_already_applied() {
        let fs = site();
        let pipeline = pipeline(&fs, MANIFEST);
        pipeline.run(&fs, &fs, &RunOptions::default()).unwrap();
        let after_first = fs.get_string(Path::new("site/css/styles.css")).unwrap();

        let report = pipeline.run(&fs, &fs, &RunOptions::default()).unwrap();
        assert!(report
            .steps
            .iter()
            .all(|s| s.outcome == StepOutcome::AlreadyApplied));
        assert!(report.written.is_empty());
        assert_eq!(fs.write_count(), 1);
        assert_eq!(fs.get_string(Path::new("site/css/styles.css")).unwrap(), after_first);
    }

    #[test]
    fn test_strict_precondition_failure_writes_nothing() {
        let fs = MemoryFs::new().with_file("site/css/styles.css", "body {}\n/* ===== Responsive Design ===== */\n");
        let result = pipeline(&fs, MANIFEST).run(&fs, &fs, &RunOptions::default());

        match result {
            Err(PatchError::PreconditionFailed { rule_set, .. }) => assert_eq!(rule_set, "tighten-sections"),
            other => panic!("unexpected result: {:?}", other.map(|r| r.steps.len())),
        }
        assert_eq!(fs.write_count(), 0);
    }

    #[test]
    fn test_lenient_mode_skips_dependents() {
        let fs = MemoryFs::new().with_file("site/css/styles.css", "body {}\n/* ===== Responsive Design ===== */\n");
        let manifest = format!("[settings]\nmode = \"lenient\"\n{}", MANIFEST);
        let report = pipeline(&fs, &manifest).run(&fs, &fs, &RunOptions::default()).unwrap();

        assert_eq!(report.skipped_count(), 2);
        assert_eq!(report.applied_count(), 0);
        match &report.steps[1].outcome {
            StepOutcome::Skipped { reason } => assert!(reason.contains("tighten-sections")),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(fs.write_count(), 0);
    }

    #[test]
    fn test_only_respects_markers_of_unselected_dependencies() {
        let fs = site();
        let pipeline = pipeline(&fs, MANIFEST);
        let only_tumbling = RunOptions {
            dry_run: false,
            only: vec!["tumbling".to_string()],
        };

        // 依赖未应用：严格模式报错
        let result = pipeline.run(&fs, &fs, &only_tumbling);
        assert!(matches!(result, Err(PatchError::PreconditionFailed { .. })));

        // 先单独运行依赖，再运行 tumbling
        pipeline
            .run(&fs, &fs, &RunOptions { dry_run: false, only: vec!["tighten-sections".to_string()] })
            .unwrap();
        let report = pipeline.run(&fs, &fs, &only_tumbling).unwrap();
        assert_eq!(report.applied_count(), 1);
    }

    #[test]
    fn test_unknown_only_name() {
        let fs = site();
        let options = RunOptions { dry_run: false, only: vec!["nope".to_string()] };
        let result = pipeline(&fs, MANIFEST).run(&fs, &fs, &options);
        assert!(matches!(result, Err(PatchError::Manifest(_))));
    }

    #[test]
    fn test_dry_run_reports_changes_without_writing() {
        let fs = site();
        let options = RunOptions { dry_run: true, only: vec![] };
        let report = pipeline(&fs, MANIFEST).run(&fs, &fs, &options).unwrap();

        assert_eq!(fs.write_count(), 0);
        assert!(report.written.is_empty());
        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].before, STYLES);
        assert!(report.changes[0].after.contains("@keyframes tumbleIn"));
    }

    #[test]
    fn test_deny_noop() {
        let fs = MemoryFs::new().with_file("site/a.css", "a { color: red; }");
        let manifest = r#"
[settings]
deny_noop = true

[[ruleset]]
name = "recolor"
target = "a.css"

[[ruleset.rules]]
kind = "literal"
search = "red"
replace = "blue"

[[ruleset.rules]]
kind = "literal"
search = "green"
replace = "white"
"#;
        let result = pipeline(&fs, manifest).run(&fs, &fs, &RunOptions::default());
        match result {
            Err(PatchError::NoopRule { rule_set, index }) => {
                assert_eq!(rule_set, "recolor");
                assert_eq!(index, 2);
            }
            other => panic!("unexpected result: {:?}", other.map(|r| r.steps.len())),
        }
        assert_eq!(fs.get_string(Path::new("site/a.css")).unwrap(), "a { color: red; }");
    }

    #[test]
    fn test_noop_rule_still_writes_by_default() {
        let fs = MemoryFs::new().with_file("site/a.css", "a { color: red; }");
        let manifest = "[[ruleset]]\nname = \"recolor\"\ntarget = \"a.css\"\n[[ruleset.rules]]\nkind = \"literal\"\nsearch = \"green\"\nreplace = \"white\"\n";
        let report = pipeline(&fs, manifest).run(&fs, &fs, &RunOptions::default()).unwrap();

        assert_eq!(report.noop_count(), 1);
        assert_eq!(fs.write_count(), 1);
        assert!(report.changes.is_empty());
    }

    #[test]
    fn test_backup_before_write() {
        let fs = site();
        let manifest = format!("[settings]\nbackup = true\n{}", MANIFEST);
        let report = pipeline(&fs, &manifest).run(&fs, &fs, &RunOptions::default()).unwrap();

        assert_eq!(report.backups.len(), 1);
        assert_eq!(fs.get_string(&report.backups[0]).unwrap(), STYLES);
    }

    #[test]
    fn test_manifest_validation() {
        let fs = site();
        let cases = [
            "[[ruleset]]\nname = \"a\"\ntarget = \"x.css\"\n",
            "[[ruleset]]\nname = \"a\"\ntarget = \"x.css\"\nafter = [\"b\"]\n[[ruleset.rules]]\nkind = \"remove\"\nsearch = \"x\"\n",
            "[[ruleset]]\nname = \"a\"\ntarget = \"x.css\"\n[[ruleset.rules]]\nkind = \"remove\"\nsearch = \"x\"\n[[ruleset]]\nname = \"a\"\ntarget = \"y.css\"\n[[ruleset.rules]]\nkind = \"remove\"\nsearch = \"y\"\n",
        ];
        for case in cases {
            let manifest = Manifest::from_toml_str(case).unwrap();
            let result = Pipeline::from_manifest(manifest, Path::new("site"), &fs);
            assert!(matches!(result, Err(PatchError::Manifest(_))), "case should fail: {}", case);
        }
    }

    #[test]
    fn test_replace_from_fragment_file() {
        let fs = MemoryFs::new()
            .with_file("site/index.html", "<body>\n<!-- old hero -->\n</body>")
            .with_file(
                "site/NEW-HERO-HTML.html",
                "<!-- paste below -->\n<!-- Hero Section -->\n<section class=\"hero\"></section>\n<!-- end -->",
            );
        let manifest = r#"
[[ruleset]]
name = "integrate-hero"
target = "index.html"

[[ruleset.rules]]
kind = "literal"
search = "<!-- old hero -->"
replace_from = { path = "NEW-HERO-HTML.html", start = "<!-- Hero Section", end = "</section>" }
"#;
        pipeline(&fs, manifest).run(&fs, &fs, &RunOptions::default()).unwrap();
        assert_eq!(
            fs.get_string(Path::new("site/index.html")).unwrap(),
            "<body>\n<!-- Hero Section -->\n<section class=\"hero\"></section>\n</body>"
        );
    }

    #[test]
    fn test_aliased_targets_share_one_editor() {
        let fs = MemoryFs::new().with_file("site/css/styles.css", "a b");
        let manifest = r#"
[[ruleset]]
name = "upper-a"
target = "css/styles.css"

[[ruleset.rules]]
kind = "literal"
search = "a"
replace = "A"

[[ruleset]]
name = "upper-b"
target = "./css/../css/styles.css"
requires = ["A"]

[[ruleset.rules]]
kind = "literal"
search = "b"
replace = "B"
"#;

        let report = pipeline(&fs, manifest).run(&fs, &fs, &RunOptions::default()).unwrap();

        assert_eq!(report.applied_count(), 2);
        assert_eq!(report.written, vec![PathBuf::from("site/css/styles.css")]);
        assert_eq!(fs.write_count(), 1);
        assert_eq!(fs.get_string(Path::new("site/css/styles.css")).unwrap(), "A B");
    }

    #[test]
    fn test_plan() {
        let fs = site();
        let plan = pipeline(&fs, MANIFEST).plan();
        assert!(plan.contains("1. tighten-sections -> site/css/styles.css (2 条规则)"));
        assert!(plan.contains("2. tumbling"));
        assert!(plan.contains("依赖: tighten-sections"));
    }

    #[test]
    fn test_missing_target_fails_before_any_write() {
        let fs = MemoryFs::new();
        let result = pipeline(&fs, MANIFEST).run(&fs, &fs, &RunOptions::default());
        assert!(matches!(result, Err(PatchError::FileAccess { .. })));
        assert_eq!(fs.write_count(), 0);
    }
}
