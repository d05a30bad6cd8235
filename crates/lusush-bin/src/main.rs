//! Lusush entrypoint.
use anyhow::Result;
use clap::Parser;
use core_buffers::BufferManager;
use core_config::{Config, load_from};
use core_events::{Event, EventBus, EventDetail, EventKind, Priority};
use core_fuzzy::{FuzzyConfig, combined_score};
use core_history::{HistoryConfig, HistoryCore, HistoryEntry, HistoryEntryState};
use core_mode::{Feature, Mode, ModeRegistry};
use core_render::apply::apply;
use core_render::continuation::{ContinuationLayer, ContinuationMode, HeuristicAnalyzer};
use core_render::diff::diff;
use core_render::dirty_region::DirtyRegionTracker;
use core_render::pipeline::{PipelineConfig, RenderContext, RenderPipeline};
use core_render::screen::ScreenBuffer;
use core_render::sync::StateSynchronizer;
use core_terminal::{CrosstermBackend, TerminalBackend, TerminalCapabilities, TerminalGuard};
use core_tokenizer::{Tokenizer, TokenKind};
use std::io::stdout;
use std::path::PathBuf;
use std::sync::Once;
use std::time::SystemTime;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "lusush", version, about = "Lusush interactive shell front-end")]
struct Args {
    /// Script to source at startup (unused by this front-end scope; kept for
    /// shebang-based mode detection).
    pub script: Option<PathBuf>,
    /// Optional configuration file path (overrides discovery of `lusush.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Force a shell mode instead of detecting one.
    #[arg(long = "mode")]
    pub mode: Option<String>,
}

struct AppStartup {
    backend: CrosstermBackend,
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self {
            backend: CrosstermBackend::new(),
            log_guard: None,
        }
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = std::path::Path::new(".");
        let log_path = log_dir.join("lusush.log");
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, "lusush.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if std::env::var_os("LLE_INTEGRATION_DEBUG").is_some() {
                tracing_subscriber::EnvFilter::new("trace")
            } else if std::env::var_os("LLE_DEBUG").is_some() {
                tracing_subscriber::EnvFilter::new("debug")
            } else {
                tracing_subscriber::EnvFilter::new("info")
            }
        });
        match tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(nb_writer)
            .try_init()
        {
            Ok(_) => self.log_guard = Some(guard),
            Err(_err) => {
                // Global subscriber already installed (e.g. under test harness).
            }
        }
        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }

    fn run<'a>(&'a mut self, args: &Args) -> Result<(Runtime, TerminalGuard<'a>)> {
        self.configure_logging()?;
        Self::install_panic_hook();

        info!(target: "runtime", "startup");
        self.backend.set_title("lusush")?;
        let guard = self.backend.enter_guard()?;

        let runtime = Runtime::bootstrap(args)?;
        Ok((runtime, guard))
    }
}

fn detect_mode(args: &Args) -> Mode {
    if let Some(name) = &args.mode
        && let Some(mode) = Mode::from_name(name)
    {
        return mode;
    }
    if let Some(path) = &args.script
        && let Ok(content) = std::fs::read_to_string(path)
        && let Some(first_line) = content.lines().next()
        && let Some(mode) = Mode::from_shebang(first_line)
    {
        return mode;
    }
    Mode::Lusush
}

/// Owns every subsystem (§3.1, §9): terminal adapter, mode registry, buffer
/// manager, history core, event bus, render pipeline, continuation layer,
/// dirty-region tracker, and state synchronizer. Constructed once in `main`
/// and threaded explicitly through the event loop; never a process-wide
/// global.
struct Runtime {
    config: Config,
    mode_registry: ModeRegistry,
    buffers: BufferManager,
    history: HistoryCore,
    history_path: PathBuf,
    events: EventBus,
    pipeline: RenderPipeline,
    continuation: ContinuationLayer<HeuristicAnalyzer>,
    dirty: DirtyRegionTracker,
    sync: StateSynchronizer,
    terminal_caps: TerminalCapabilities,
    fuzzy_config: FuzzyConfig,
    input: String,
    cursor_byte_offset: usize,
    line_number: usize,
    last_frame: Option<ScreenBuffer>,
}

impl Runtime {
    fn bootstrap(args: &Args) -> Result<Self> {
        let config = load_from(args.config.clone())?;
        let mode = detect_mode(args);
        let mode_registry = ModeRegistry::new(mode);

        let mut buffers = BufferManager::new(64);
        buffers.create_scratch().ok();

        let history_path = config.history_path();
        let history = HistoryCore::new(HistoryConfig {
            max_entries: config.file.history.max_entries,
            ignore_space_prefix: config.file.history.ignore_space_prefix,
            ..HistoryConfig::default()
        });
        if let Err(e) = history.load_file(&history_path) {
            warn!(target: "history", ?e, path = %history_path.display(), "history_file_load_failed_starting_empty");
        }

        let fuzzy_config = match config.file.fuzzy.preset {
            core_config::FuzzyPreset::Default => FuzzyConfig::default_preset(),
            core_config::FuzzyPreset::Completion => FuzzyConfig::completion(),
            core_config::FuzzyPreset::History => FuzzyConfig::history(),
            core_config::FuzzyPreset::Autocorrect => FuzzyConfig::autocorrect(),
        };
        let fuzzy_config = FuzzyConfig {
            min_similarity_score: config.file.fuzzy.min_similarity_score,
            cache_size: config.file.fuzzy.cache_size,
            ..fuzzy_config
        };

        let terminal_caps = TerminalCapabilities::detect();

        info!(
            target: "runtime.startup",
            mode = mode.name(),
            history_entries = history.count(),
            terminal_class = ?terminal_caps.class,
            "bootstrap_complete"
        );

        Ok(Self {
            config,
            mode_registry,
            buffers,
            history,
            history_path,
            events: EventBus::default(),
            pipeline: RenderPipeline::new(PipelineConfig::default()),
            continuation: ContinuationLayer::new(
                ContinuationMode::ContextAware,
                HeuristicAnalyzer::new(),
                fuzzy_config.cache_size.max(1),
            ),
            dirty: DirtyRegionTracker::new(),
            sync: StateSynchronizer::new(),
            terminal_caps,
            fuzzy_config,
            input: String::new(),
            cursor_byte_offset: 0,
            line_number: 0,
            last_frame: None,
        })
    }

    fn prompt(&mut self) -> String {
        if self.line_number == 0 {
            format!("{}> ", self.mode_registry.get().name())
        } else {
            self.continuation.continuation_prompt(&self.input, self.line_number)
        }
    }

    fn render(&mut self, sink: &mut impl std::io::Write) -> Result<()> {
        let (cols, rows) = core_terminal::window_size();
        let prompt = self.prompt();
        let ctx = RenderContext {
            content: self.input.clone(),
            cursor_byte_offset: self.cursor_byte_offset,
            supports_colors: self.terminal_caps.supports("truecolor") || self.terminal_caps.supports("colors256"),
        };
        let output = self.pipeline.run(&ctx, None);
        self.dirty.mark_range(0, output.content.len().max(1));

        let new_frame = ScreenBuffer::render(&prompt, &output.content, output.cursor_byte_offset, cols, rows);
        let force_full = self.sync.needs_full_redraw() || self.dirty.is_full_redraw_needed();
        let blank = ScreenBuffer::render("", "", 0, cols, rows);
        let baseline = if force_full {
            &blank
        } else {
            self.last_frame.as_ref().unwrap_or(&blank)
        };
        let changes = diff(baseline, &new_frame);

        match apply(&changes, sink) {
            Ok(()) => self.sync.acknowledge_resync(),
            Err(e) => {
                self.sync.note_display_failed();
                return Err(e);
            }
        }
        self.sync.record_rendered(new_frame.clone());
        self.last_frame = Some(new_frame);
        self.dirty.take();
        Ok(())
    }

    /// Feed a finished line into the tokenizer purely to detect still-open
    /// quoting/substitution constructs (an `Error` token from an unterminated
    /// construct supplements the heuristic continuation analyzer).
    fn needs_more_input(&self) -> bool {
        let mut tok = Tokenizer::new(&self.input);
        loop {
            let token = tok.advance();
            match token.kind {
                TokenKind::Eof => return false,
                TokenKind::Error(msg) if msg.contains("unterminated") => return true,
                _ => {}
            }
        }
    }

    fn submit_line(&mut self, line: &str) -> Result<Option<String>> {
        if !self.input.is_empty() {
            self.input.push('\n');
        }
        self.input.push_str(line);
        self.cursor_byte_offset = self.input.len();

        if self.needs_more_input() {
            self.line_number += 1;
            self.events.publish(Event::new(
                EventKind::ContinuationInvalidated,
                EventDetail::None,
                Priority::Low,
            ))?;
            return Ok(None);
        }

        let command = std::mem::take(&mut self.input);
        self.line_number = 0;
        self.cursor_byte_offset = 0;
        Ok(Some(command))
    }

    fn record_history(&mut self, command: &str, exit_code: i32) {
        match self.history.add(command, exit_code) {
            Ok(Some(id)) => {
                let entry = HistoryEntry {
                    id,
                    command: command.to_string(),
                    timestamp: now_secs(),
                    exit_code,
                    state: HistoryEntryState::Active,
                    prev: None,
                    next: None,
                };
                if let Err(e) = self.history.append_entry_to_file(&self.history_path, &entry) {
                    warn!(target: "history", ?e, "history_append_failed");
                }
                self.events
                    .publish(Event::new(EventKind::HistoryUpdated, EventDetail::None, Priority::Normal))
                    .ok();
            }
            Ok(None) => {}
            Err(e) => warn!(target: "history", ?e, "history_add_failed"),
        }
    }

    /// Rank candidate completions against the current word using the active
    /// fuzzy preset.
    fn rank_completions(&self, word: &str, candidates: &[String]) -> Vec<(String, u32)> {
        let threshold = self.fuzzy_config.min_similarity_score.max(1);
        let mut scored: Vec<(String, u32)> = candidates
            .iter()
            .map(|c| (c.clone(), combined_score(word, c, &self.fuzzy_config)))
            .filter(|(_, score)| *score >= threshold)
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut startup = AppStartup::new();
    let (mut runtime, _guard) = startup.run(&args)?;

    let mut stdout = stdout();
    let mut shutdown = false;
    while !shutdown {
        runtime.events.process_pending(64, 5);
        runtime.render(&mut stdout)?;

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line)? == 0 {
            shutdown = true;
            continue;
        }
        let line = line.trim_end_matches(['\n', '\r']);

        if line == "exit" && runtime.line_number == 0 {
            shutdown = true;
            continue;
        }

        if let Some(command) = runtime.submit_line(line)? {
            let exit_code = 0;
            runtime.record_history(&command, exit_code);
        }
    }

    info!(target: "runtime", "shutdown");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_with_mode(mode: &str) -> Args {
        Args {
            script: None,
            config: None,
            mode: Some(mode.to_string()),
        }
    }

    #[test]
    fn detect_mode_prefers_explicit_flag() {
        assert_eq!(detect_mode(&args_with_mode("zsh")), Mode::Zsh);
    }

    #[test]
    fn detect_mode_falls_back_to_lusush() {
        let args = Args {
            script: None,
            config: None,
            mode: None,
        };
        assert_eq!(detect_mode(&args), Mode::Lusush);
    }

    #[test]
    fn detect_mode_reads_shebang_from_script() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "#!/bin/sh\necho hi\n").unwrap();
        let args = Args {
            script: Some(tmp.path().to_path_buf()),
            config: None,
            mode: None,
        };
        assert_eq!(detect_mode(&args), Mode::Posix);
    }

    fn test_runtime() -> (Runtime, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let history_path = dir.path().join("history.jsonl");
        let config_path = dir.path().join("lusush.toml");
        std::fs::write(
            &config_path,
            format!(
                "[history]\npath = \"{}\"\n",
                history_path.to_string_lossy().replace('\\', "\\\\")
            ),
        )
        .unwrap();
        let args = Args {
            script: None,
            config: Some(config_path),
            mode: Some("lusush".to_string()),
        };
        let runtime = Runtime::bootstrap(&args).unwrap();
        (runtime, dir)
    }

    #[test]
    fn unterminated_quote_requests_more_input() {
        let (mut runtime, _dir) = test_runtime();
        let result = runtime.submit_line("echo \"unterminated").unwrap();
        assert!(result.is_none());
        assert_eq!(runtime.line_number, 1);
    }

    #[test]
    fn complete_command_submits_and_resets() {
        let (mut runtime, _dir) = test_runtime();
        let result = runtime.submit_line("echo hi").unwrap();
        assert_eq!(result.as_deref(), Some("echo hi"));
        assert_eq!(runtime.line_number, 0);
        assert!(runtime.input.is_empty());
    }

    #[test]
    fn multiline_command_joins_with_newline() {
        let (mut runtime, _dir) = test_runtime();
        assert!(runtime.submit_line("echo \"a").unwrap().is_none());
        let result = runtime.submit_line("b\"").unwrap();
        assert_eq!(result.as_deref(), Some("echo \"a\nb\""));
    }

    #[test]
    fn rank_completions_orders_by_similarity() {
        let (runtime, _dir) = test_runtime();
        let candidates = vec!["status".to_string(), "stash".to_string(), "log".to_string()];
        let ranked = runtime.rank_completions("sta", &candidates);
        assert!(!ranked.is_empty());
        assert_eq!(ranked[0].0, "status");
    }

    #[test]
    fn record_history_appends_entry_to_file() {
        let (mut runtime, _dir) = test_runtime();
        let path = runtime.history_path.clone();
        runtime.record_history("echo hi", 0);
        assert_eq!(runtime.history.count(), 1);
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("echo hi"));
    }
}
