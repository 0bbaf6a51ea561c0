use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use site_patcher::io::FsTargetIo;
use site_patcher::{
    Manifest, PatchDebugger, PatchSettings, Pipeline, RunMode, RunOptions, RunReport, RuleSpec,
    SettingsOverrides, SUPPORTED_EXTENSIONS,
};

#[derive(Parser)]
#[command(name = "site_patcher")]
#[command(about = "按顺序对静态站点的样式表和页面应用文本补丁")]
#[command(version)]
struct Cli {
    /// 补丁清单文件（TOML 或 JSON）
    #[arg(short, long)]
    manifest: Option<PathBuf>,

    /// 目标文件根目录（默认为清单所在目录）
    #[arg(long)]
    root: Option<PathBuf>,

    /// 只运行指定的规则集（可重复）
    #[arg(long, value_name = "NAME")]
    only: Vec<String>,

    /// 列出清单中的规则集后退出
    #[arg(long)]
    list: bool,

    /// 单文件模式：目标文件路径
    #[arg(short, long)]
    target: Option<PathBuf>,

    /// 单文件模式：从JSON字符串读取规则数组
    #[arg(long)]
    rules: Option<String>,

    /// 单文件模式：从JSON文件读取规则数组
    #[arg(long)]
    rules_file: Option<PathBuf>,

    /// 单文件模式：从标准输入读取JSON规则数组
    #[arg(long)]
    rules_stdin: bool,

    /// 单文件模式：要查找的片段
    #[arg(long)]
    search: Option<String>,

    /// 单文件模式：替换文本
    #[arg(long, allow_hyphen_values = true)]
    replace: Option<String>,

    /// 将 --search 视为正则表达式（模板使用 $1 引用分组）
    #[arg(long)]
    regex: bool,

    /// 演练模式：只报告，不写入文件
    #[arg(long)]
    dry_run: bool,

    /// 写入前创建带时间戳的备份
    #[arg(long)]
    backup: bool,

    /// 跳过前置条件不满足的规则集而不是中止
    #[arg(long)]
    lenient: bool,

    /// 任意规则未命中即视为错误
    #[arg(long)]
    deny_noop: bool,

    /// 目标文件编码（默认 utf-8）
    #[arg(long)]
    encoding: Option<String>,

    /// 将运行报告以JSON写入文件
    #[arg(long)]
    report_json: Option<PathBuf>,

    /// 为每个修改过的文件写出对比报告到该目录
    #[arg(long)]
    dump_diff: Option<PathBuf>,

    /// 静默模式(仅输出错误)
    #[arg(short, long)]
    quiet: bool,

    /// 输出调试日志
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    validate_mode_options(&cli)?;

    if let Some(manifest) = &cli.manifest {
        if cli.list {
            return handle_list(&cli, manifest);
        }
        return handle_manifest(&cli, manifest);
    }

    if let Some(target) = &cli.target {
        return handle_single_target(&cli, target);
    }

    bail!("需要 --manifest 或 --target 之一")
}

/// 初始化日志，RUST_LOG 优先
fn init_logging(cli: &Cli) {
    let default_filter = if cli.verbose {
        "site_patcher=debug"
    } else if cli.quiet {
        "site_patcher=error"
    } else {
        "site_patcher=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// 验证参数组合（确保只使用一种模式和一种规则来源）
fn validate_mode_options(cli: &Cli) -> Result<()> {
    if cli.manifest.is_some() && cli.target.is_some() {
        bail!("--manifest 与 --target 不能同时使用");
    }

    let rule_sources = [
        cli.rules.is_some(),
        cli.rules_file.is_some(),
        cli.rules_stdin,
        cli.search.is_some(),
    ]
    .iter()
    .filter(|&&x| x)
    .count();

    if cli.manifest.is_some() {
        if rule_sources > 0 || cli.replace.is_some() || cli.regex {
            bail!("清单模式下不能使用 --rules、--rules-file、--rules-stdin 或 --search");
        }
        return Ok(());
    }

    if !cli.only.is_empty() || cli.list || cli.root.is_some() {
        bail!("--only、--list 和 --root 只能与 --manifest 一起使用");
    }

    if cli.target.is_some() {
        if rule_sources != 1 {
            bail!("单文件模式需要且只能使用一种规则来源：--rules、--rules-file、--rules-stdin 或 --search/--replace");
        }
        if cli.search.is_some() != cli.replace.is_some() {
            bail!("--search 与 --replace 必须同时提供");
        }
        if cli.regex && cli.search.is_none() {
            bail!("--regex 只能与 --search 一起使用");
        }
    }

    Ok(())
}

/// 命令行覆盖项
fn overrides(cli: &Cli) -> SettingsOverrides {
    SettingsOverrides {
        encoding: cli.encoding.clone(),
        backup: cli.backup.then_some(true),
        mode: cli.lenient.then_some(RunMode::Lenient),
        deny_noop: cli.deny_noop.then_some(true),
    }
}

/// 加载清单并合并命令行覆盖项
fn load_pipeline(cli: &Cli, manifest_path: &Path, io: &FsTargetIo) -> Result<Pipeline> {
    if !manifest_path.exists() {
        bail!("清单文件不存在: {:?}", manifest_path);
    }

    let mut manifest = Manifest::from_path(manifest_path)
        .with_context(|| format!("读取清单失败: {:?}", manifest_path))?;
    manifest.settings = manifest.settings.with_overrides(&overrides(cli));

    let root = cli
        .root
        .clone()
        .unwrap_or_else(|| manifest_path.parent().map(Path::to_path_buf).unwrap_or_default());

    Pipeline::from_manifest(manifest, &root, io).with_context(|| format!("清单无效: {:?}", manifest_path))
}

/// 列出规则集
fn handle_list(cli: &Cli, manifest_path: &Path) -> Result<()> {
    let pipeline = load_pipeline(cli, manifest_path, &FsTargetIo)?;
    println!("{}", pipeline.plan());
    Ok(())
}

/// 处理清单模式
fn handle_manifest(cli: &Cli, manifest_path: &Path) -> Result<()> {
    let io = FsTargetIo;
    let pipeline = load_pipeline(cli, manifest_path, &io)?;

    if !cli.quiet {
        println!(
            "正在应用清单: {:?} ({} 个规则集)",
            manifest_path,
            pipeline.rule_sets().len()
        );
    }

    let options = RunOptions {
        dry_run: cli.dry_run,
        only: cli.only.clone(),
    };
    let report = pipeline
        .run(&io, &io, &options)
        .context("应用补丁失败，未写入任何文件")?;

    finish(cli, &report)
}

/// 处理单文件模式
fn handle_single_target(cli: &Cli, target: &Path) -> Result<()> {
    validate_target(target)?;

    let specs = load_rule_specs(cli)?;
    if specs.is_empty() {
        bail!("规则为空");
    }

    let rules = specs
        .iter()
        .enumerate()
        .map(|(i, spec)| spec.compile(&format!("#{} {}", i + 1, spec.kind())))
        .collect::<Result<Vec<_>, _>>()
        .context("规则无效")?;

    if !cli.quiet {
        println!("准备对 {:?} 应用 {} 条规则", target, rules.len());
        for rule in rules.iter().take(3) {
            println!("  {}", rule.describe());
        }
        if rules.len() > 3 {
            println!("  ... 还有 {} 条规则", rules.len() - 3);
        }
    }

    let settings = PatchSettings::default().with_overrides(&overrides(cli));
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "target".to_string());
    let pipeline = Pipeline::single(settings, &name, target.to_path_buf(), rules)?;

    let io = FsTargetIo;
    let options = RunOptions {
        dry_run: cli.dry_run,
        only: Vec::new(),
    };
    let report = pipeline
        .run(&io, &io, &options)
        .with_context(|| format!("修补文件失败: {:?}", target))?;

    finish(cli, &report)
}

/// 验证目标文件
fn validate_target(target: &Path) -> Result<()> {
    if !target.exists() {
        bail!("目标文件不存在: {:?}", target);
    }

    let extension = target
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    if !SUPPORTED_EXTENSIONS.iter().any(|&ext| Some(ext) == extension.as_deref()) {
        bail!("目标文件必须是 {} 文件之一", SUPPORTED_EXTENSIONS.join("/"));
    }

    Ok(())
}

/// 从命令行参数、文件或标准输入读取规则
fn load_rule_specs(cli: &Cli) -> Result<Vec<RuleSpec>> {
    if let (Some(search), Some(replace)) = (&cli.search, &cli.replace) {
        let spec = if cli.regex {
            RuleSpec::regex(search.clone(), replace.clone())
        } else {
            RuleSpec::literal(search.clone(), replace.clone())
        };
        return Ok(vec![spec]);
    }

    let json = if let Some(json) = &cli.rules {
        json.clone()
    } else if let Some(path) = &cli.rules_file {
        std::fs::read_to_string(path).with_context(|| format!("读取规则文件失败: {:?}", path))?
    } else {
        if !cli.quiet {
            eprintln!("等待从标准输入读取JSON规则... (Ctrl+D结束输入)");
        }
        let mut buffer = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut buffer)
            .context("从标准输入读取失败")?;
        buffer
    };

    serde_json::from_str(&json).context("解析规则JSON失败")
}

/// 输出报告、JSON 和对比文件
fn finish(cli: &Cli, report: &RunReport) -> Result<()> {
    if !cli.quiet {
        print!("{}", report);
        if report.noop_count() > 0 {
            println!("注意: {} 条规则未命中，可能是运行顺序错误或已经运行过", report.noop_count());
        }
    }

    if let Some(path) = &cli.report_json {
        let json = serde_json::to_string_pretty(report).context("序列化报告失败")?;
        std::fs::write(path, json).with_context(|| format!("写入报告失败: {:?}", path))?;
        if !cli.quiet {
            println!("报告已写入: {:?}", path);
        }
    }

    if let Some(dir) = &cli.dump_diff {
        dump_diffs(cli, report, dir)?;
    }

    Ok(())
}

/// 为每个修改过的文件生成对比报告
fn dump_diffs(cli: &Cli, report: &RunReport, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("创建目录失败: {:?}", dir))?;

    for change in &report.changes {
        let label = change.path.display().to_string();
        let file_name: String = label
            .chars()
            .map(|c| if c == '/' || c == '\\' || c == ':' { '_' } else { c })
            .collect();
        let output = dir.join(format!("{}.diff.txt", file_name));

        PatchDebugger::dump_comparison(&label, &change.before, &change.after, &output)?;
        if !cli.quiet {
            println!("对比报告: {:?}", output);
        }
    }

    Ok(())
}
