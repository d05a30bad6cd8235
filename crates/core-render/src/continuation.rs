//! Continuation-prompt layer: given a line number and the command content
//! typed so far, returns the prompt string for a wrapped/continued line
//! (e.g. `"> "` for an unterminated quote or open bracket).

use std::time::Instant;

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn cache_key(command_content: &str, line_number: usize) -> String {
    format!("{:016x}:{}", fnv1a(command_content.as_bytes()), line_number)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuationMode {
    Simple,
    ContextAware,
}

/// Out-of-scope collaborator boundary: a real implementation would drive
/// a parser-aware analyzer over the command's lines so far. This crate
/// ships only `HeuristicAnalyzer`, a reference implementation sufficient
/// for tests and manual exercising.
pub trait ContinuationAnalyzer {
    /// Feed one line of the command, in order, up to and including
    /// `line_number`. Returns the continuation prompt once all lines have
    /// been fed.
    fn feed_line(&mut self, line: &str);
    fn prompt(&self) -> String;
    fn reset(&mut self);
}

/// Bracket/quote/backslash-continuation heuristic.
#[derive(Debug, Default)]
pub struct HeuristicAnalyzer {
    paren_depth: i32,
    brace_depth: i32,
    bracket_depth: i32,
    in_single_quote: bool,
    in_double_quote: bool,
    trailing_backslash: bool,
}

impl HeuristicAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContinuationAnalyzer for HeuristicAnalyzer {
    fn feed_line(&mut self, line: &str) {
        self.trailing_backslash = false;
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            if self.in_single_quote {
                if c == '\'' {
                    self.in_single_quote = false;
                }
                continue;
            }
            if self.in_double_quote {
                if c == '\\' {
                    chars.next();
                } else if c == '"' {
                    self.in_double_quote = false;
                }
                continue;
            }
            match c {
                '\'' => self.in_single_quote = true,
                '"' => self.in_double_quote = true,
                '(' => self.paren_depth += 1,
                ')' => self.paren_depth = (self.paren_depth - 1).max(0),
                '{' => self.brace_depth += 1,
                '}' => self.brace_depth = (self.brace_depth - 1).max(0),
                '[' => self.bracket_depth += 1,
                ']' => self.bracket_depth = (self.bracket_depth - 1).max(0),
                '\\' if chars.peek().is_none() => self.trailing_backslash = true,
                _ => {}
            }
        }
    }

    fn prompt(&self) -> String {
        if self.in_single_quote || self.in_double_quote {
            "quote> ".to_string()
        } else if self.paren_depth > 0 || self.brace_depth > 0 || self.bracket_depth > 0 {
            "> ".to_string()
        } else if self.trailing_backslash {
            "\\> ".to_string()
        } else {
            "> ".to_string()
        }
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ContinuationMetrics {
    pub generation_count: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub total_ns: u64,
    pub max_ns: u64,
    pub min_ns: u64,
}

impl ContinuationMetrics {
    pub fn avg_ns(&self) -> u64 {
        if self.generation_count == 0 {
            0
        } else {
            self.total_ns / self.generation_count
        }
    }

    fn record(&mut self, elapsed_ns: u64) {
        self.generation_count += 1;
        self.total_ns += elapsed_ns;
        self.max_ns = self.max_ns.max(elapsed_ns);
        self.min_ns = if self.min_ns == 0 {
            elapsed_ns
        } else {
            self.min_ns.min(elapsed_ns)
        };
    }
}

struct Slot {
    key: String,
    value: String,
    occupied: bool,
}

/// Fixed-slot round-robin cache keyed by `(hash(command_content), line_number)`.
pub struct ContinuationLayer<A: ContinuationAnalyzer> {
    mode: ContinuationMode,
    analyzer: A,
    slots: Vec<Slot>,
    next_slot: usize,
    metrics: ContinuationMetrics,
}

impl<A: ContinuationAnalyzer> ContinuationLayer<A> {
    pub fn new(mode: ContinuationMode, analyzer: A, cache_slots: usize) -> Self {
        let slots = (0..cache_slots.max(1))
            .map(|_| Slot {
                key: String::new(),
                value: String::new(),
                occupied: false,
            })
            .collect();
        Self {
            mode,
            analyzer,
            slots,
            next_slot: 0,
            metrics: ContinuationMetrics::default(),
        }
    }

    pub fn mode(&self) -> ContinuationMode {
        self.mode
    }

    /// Changing mode invalidates the cache.
    pub fn set_mode(&mut self, mode: ContinuationMode) {
        if mode != self.mode {
            self.mode = mode;
            for slot in &mut self.slots {
                slot.occupied = false;
            }
        }
    }

    fn find(&self, key: &str) -> Option<&str> {
        self.slots
            .iter()
            .find(|s| s.occupied && s.key == key)
            .map(|s| s.value.as_str())
    }

    fn insert(&mut self, key: String, value: String) {
        let idx = self.next_slot;
        self.slots[idx] = Slot {
            key,
            value,
            occupied: true,
        };
        self.next_slot = (self.next_slot + 1) % self.slots.len();
    }

    pub fn metrics(&self) -> ContinuationMetrics {
        self.metrics
    }

    /// Resolve the continuation prompt for `line_number` given all lines
    /// of `command_content` up to and including it.
    pub fn continuation_prompt(&mut self, command_content: &str, line_number: usize) -> String {
        if self.mode == ContinuationMode::Simple {
            return "> ".to_string();
        }

        let key = cache_key(command_content, line_number);
        if let Some(hit) = self.find(&key) {
            self.metrics.cache_hits += 1;
            return hit.to_string();
        }

        let start = Instant::now();
        self.analyzer.reset();
        for line in command_content.lines().take(line_number + 1) {
            self.analyzer.feed_line(line);
        }
        let prompt = self.analyzer.prompt();
        let elapsed_ns = start.elapsed().as_nanos().min(u128::from(u64::MAX)) as u64;

        self.metrics.cache_misses += 1;
        self.metrics.record(elapsed_ns);
        self.insert(key, prompt.clone());
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_mode_always_returns_default_prompt() {
        let mut layer = ContinuationLayer::new(ContinuationMode::Simple, HeuristicAnalyzer::new(), 8);
        assert_eq!(layer.continuation_prompt("echo (", 0), "> ");
    }

    #[test]
    fn open_paren_yields_bracket_continuation() {
        let mut layer =
            ContinuationLayer::new(ContinuationMode::ContextAware, HeuristicAnalyzer::new(), 8);
        assert_eq!(layer.continuation_prompt("foo(", 0), "> ");
    }

    #[test]
    fn open_quote_yields_quote_continuation() {
        let mut layer =
            ContinuationLayer::new(ContinuationMode::ContextAware, HeuristicAnalyzer::new(), 8);
        assert_eq!(layer.continuation_prompt("echo \"abc", 0), "quote> ");
    }

    #[test]
    fn repeated_request_hits_cache() {
        let mut layer =
            ContinuationLayer::new(ContinuationMode::ContextAware, HeuristicAnalyzer::new(), 8);
        layer.continuation_prompt("foo(", 0);
        layer.continuation_prompt("foo(", 0);
        assert_eq!(layer.metrics().cache_hits, 1);
        assert_eq!(layer.metrics().cache_misses, 1);
    }

    #[test]
    fn mode_change_invalidates_cache() {
        let mut layer =
            ContinuationLayer::new(ContinuationMode::ContextAware, HeuristicAnalyzer::new(), 8);
        layer.continuation_prompt("foo(", 0);
        layer.set_mode(ContinuationMode::Simple);
        layer.set_mode(ContinuationMode::ContextAware);
        layer.continuation_prompt("foo(", 0);
        assert_eq!(layer.metrics().cache_misses, 2);
    }

    #[test]
    fn ring_cache_evicts_oldest_slot() {
        let mut layer =
            ContinuationLayer::new(ContinuationMode::ContextAware, HeuristicAnalyzer::new(), 1);
        layer.continuation_prompt("foo(", 0);
        layer.continuation_prompt("bar{", 0);
        // Single slot: the first key was evicted, so re-requesting it misses again.
        layer.continuation_prompt("foo(", 0);
        assert_eq!(layer.metrics().cache_misses, 3);
    }
}
