//! Subscriber setup driven by the `logging` config section.
//!
//! Console output goes to non-blocking stderr; file output is JSON, routed
//! per subsystem to size-rotated files. `RUST_LOG`, when set, caps both.

use crate::config::{LoggingConfig, Section};
use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};
use parking_lot::Mutex;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

const DEFAULT_SECTION: &str = "default";
const DEFAULT_MAX_SIZE_MB: u64 = 100;

// Dropping the guard would stop the console writer thread.
static CONSOLE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

fn parse_tracing_level(s: &str) -> Option<Level> {
    match s.to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        "off" | "none" => None,
        _ => Some(Level::INFO),
    }
}

/// `target` is `prefix` itself or a module below it.
fn matches_crate_prefix(target: &str, prefix: &str) -> bool {
    target
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

// ================= rotating file writers =================

type Rotating = Arc<Mutex<FileRotate<AppendTimestamp>>>;

struct RotWriterHandle(Rotating);

impl Write for RotWriterHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        self.0.lock().flush()
    }
}

/// Writes to the resolved file, or swallows the record when none applies.
struct RoutedWriterHandle(Option<RotWriterHandle>);

impl Write for RoutedWriterHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.0 {
            Some(w) => w.write(buf),
            None => Ok(buf.len()),
        }
    }
    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.0 {
            Some(w) => w.flush(),
            None => Ok(()),
        }
    }
}

/// Routes records to files by target prefix, e.g. `ctxkit::runtime`.
#[derive(Clone, Default)]
struct MultiFileRouter {
    default: Option<Rotating>,
    by_prefix: Vec<(String, Rotating)>,
}

impl MultiFileRouter {
    fn resolve_for(&self, target: &str) -> Option<&Rotating> {
        self.by_prefix
            .iter()
            .find(|(prefix, _)| matches_crate_prefix(target, prefix))
            .map(|(_, w)| w)
            .or(self.default.as_ref())
    }

    fn is_empty(&self) -> bool {
        self.default.is_none() && self.by_prefix.is_empty()
    }
}

impl<'a> fmt::MakeWriter<'a> for MultiFileRouter {
    type Writer = RoutedWriterHandle;

    fn make_writer(&'a self) -> Self::Writer {
        RoutedWriterHandle(self.default.clone().map(RotWriterHandle))
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        RoutedWriterHandle(self.resolve_for(meta.target()).cloned().map(RotWriterHandle))
    }
}

fn resolve_log_path(file: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

/// `None` when the section has no file or the file cannot be opened.
fn open_section_file(name: &str, section: &Section, base_dir: &Path) -> Option<Rotating> {
    if section.file.trim().is_empty() {
        return None;
    }
    let log_path = resolve_log_path(&section.file, base_dir);
    if let Some(parent) = log_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!(
                "Failed to init log file for subsystem '{name}': {} ({e})",
                log_path.display()
            );
            return None;
        }
    }

    // MaxFiles wins over Age when both are configured
    let limit = match section.max_backups {
        Some(n) => FileLimit::MaxFiles(n),
        None => FileLimit::Age(chrono::Duration::days(
            i64::from(section.max_age_days.unwrap_or(1)),
        )),
    };
    let max_bytes = section.max_size_mb.unwrap_or(DEFAULT_MAX_SIZE_MB) as usize * 1024 * 1024;

    let rot = FileRotate::new(
        &log_path,
        AppendTimestamp::default(limit),
        ContentLimit::BytesSurpassed(max_bytes),
        Compression::None,
        None,
    );
    Some(Arc::new(Mutex::new(rot)))
}

// ================= targets =================

enum SinkKind {
    Console,
    File { has_default_file: bool },
}

struct SplitConfig<'a> {
    default_section: Option<&'a Section>,
    subsystems: Vec<(&'a str, &'a Section)>,
}

fn split_config(cfg: &LoggingConfig) -> SplitConfig<'_> {
    let mut subsystems: Vec<_> = cfg
        .iter()
        .filter(|(k, _)| k.as_str() != DEFAULT_SECTION)
        .map(|(k, v)| (k.as_str(), v))
        .collect();
    // longest prefix first so nested subsystems win in the file router
    subsystems.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));
    SplitConfig {
        default_section: cfg.get(DEFAULT_SECTION),
        subsystems,
    }
}

fn build_targets(config: &SplitConfig<'_>, kind: SinkKind) -> Targets {
    let level_of = |s: &Section| -> Option<LevelFilter> {
        let raw = match kind {
            SinkKind::Console => &s.console_level,
            SinkKind::File { .. } => &s.file_level,
        };
        parse_tracing_level(raw).map(LevelFilter::from_level)
    };

    // records outside every subsystem have nowhere to go without a default file
    let default_level = match kind {
        SinkKind::File { has_default_file: false } => LevelFilter::OFF,
        _ => config
            .default_section
            .and_then(|s| level_of(s))
            .unwrap_or(LevelFilter::INFO),
    };

    let mut targets = Targets::new().with_default(default_level);
    for (name, section) in &config.subsystems {
        // a subsystem without a file has no file sink of its own
        if matches!(kind, SinkKind::File { .. }) && section.file.trim().is_empty() {
            continue;
        }
        if let Some(level) = level_of(section) {
            targets = targets.with_target(name.to_string(), level);
        }
    }
    targets
}

fn build_file_router(config: &SplitConfig<'_>, base_dir: &Path) -> MultiFileRouter {
    let mut router = MultiFileRouter::default();
    if let Some(section) = config.default_section {
        router.default = open_section_file(DEFAULT_SECTION, section, base_dir);
    }
    for (name, section) in &config.subsystems {
        if let Some(writer) = open_section_file(name, section, base_dir) {
            router.by_prefix.push((name.to_string(), writer));
        }
    }
    router
}

// ================= init =================

/// Install the global subscriber. Relative log files resolve under `base_dir`.
/// An empty config falls back to [`init_minimal`].
pub fn init_logging(cfg: &LoggingConfig, base_dir: &Path) {
    // Bridge `log` → `tracing` before installing the subscriber
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("LogTracer init skipped: {e}");
    }

    let split = split_config(cfg);
    if split.default_section.is_none() && split.subsystems.is_empty() {
        init_minimal();
        return;
    }

    let router = build_file_router(&split, base_dir);
    let console_targets = build_targets(&split, SinkKind::Console);
    let file_targets = build_targets(
        &split,
        SinkKind::File {
            has_default_file: router.default.is_some(),
        },
    );

    let (nb_stderr, guard) = tracing_appender::non_blocking(std::io::stderr());
    let _ = CONSOLE_GUARD.set(guard);

    let console_layer = fmt::layer()
        .with_writer(nb_stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(true)
        .with_level(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_filter(console_targets);

    let file_layer = (!router.is_empty()).then(|| {
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(router)
            .with_filter(file_targets)
    });

    let _ = Registry::default()
        .with(EnvFilter::try_from_default_env().ok())
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

/// INFO to stderr, capped by `RUST_LOG` when set.
pub fn init_minimal() {
    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339());

    let _ = Registry::default()
        .with(EnvFilter::try_from_default_env().ok())
        .with(fmt_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(console: &str, file: &str, file_level: &str) -> Section {
        Section {
            console_level: console.into(),
            file: file.into(),
            file_level: file_level.into(),
            max_age_days: None,
            max_backups: Some(2),
            max_size_mb: Some(1),
        }
    }

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!(parse_tracing_level("DEBUG"), Some(Level::DEBUG));
        assert_eq!(parse_tracing_level("off"), None);
        assert_eq!(parse_tracing_level("bogus"), Some(Level::INFO));
    }

    #[test]
    fn crate_prefix_respects_module_boundaries() {
        assert!(matches_crate_prefix("ctxkit", "ctxkit"));
        assert!(matches_crate_prefix("ctxkit::runtime", "ctxkit"));
        assert!(!matches_crate_prefix("ctxkit_bootstrap", "ctxkit"));
    }

    #[test]
    fn console_targets_follow_sections() {
        let mut cfg = LoggingConfig::new();
        cfg.insert("default".into(), section("warn", "", ""));
        cfg.insert("ctxkit".into(), section("debug", "", ""));
        let split = split_config(&cfg);

        let console = build_targets(&split, SinkKind::Console);
        assert!(console.would_enable("ctxkit::context", &Level::DEBUG));
        assert!(!console.would_enable("other", &Level::INFO));
        assert!(console.would_enable("other", &Level::WARN));

        // no files anywhere: file sink stays off
        let file = build_targets(&split, SinkKind::File { has_default_file: false });
        assert!(!file.would_enable("ctxkit", &Level::ERROR));
    }

    #[test]
    fn router_prefers_longest_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = LoggingConfig::new();
        cfg.insert("default".into(), section("info", "logs/all.log", "info"));
        cfg.insert("ctxkit".into(), section("info", "logs/core.log", "debug"));
        cfg.insert("ctxkit::runtime".into(), section("info", "logs/rt.log", "debug"));
        cfg.insert("quiet".into(), section("info", "", "debug"));
        let split = split_config(&cfg);
        let router = build_file_router(&split, tmp.path());

        assert_eq!(router.by_prefix.len(), 2);
        let rt = router.resolve_for("ctxkit::runtime::runner").unwrap();
        assert!(Arc::ptr_eq(rt, &router.by_prefix[0].1));
        let core = router.resolve_for("ctxkit::context").unwrap();
        assert!(Arc::ptr_eq(core, &router.by_prefix[1].1));
        let fallback = router.resolve_for("quiet").unwrap();
        assert!(Arc::ptr_eq(fallback, router.default.as_ref().unwrap()));
        assert!(tmp.path().join("logs").is_dir());
    }
}
