//! Caller source access: files located from `file!()` paths, split into lines, cached per process.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use tracing::{debug, trace};

use crate::config::PeekConfig;
use crate::scan::net_depth;

#[derive(Clone, Debug)]
pub struct SourceFile {
    pub path: PathBuf,
    pub source: Arc<str>,
    line_starts: Arc<Vec<usize>>,
}

impl SourceFile {
    pub fn new(path: PathBuf, source: &str) -> Self {
        Self {
            path,
            source: Arc::from(source),
            line_starts: Arc::new(compute_line_starts(source)),
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// 1-based line lookup without the trailing newline.
    pub fn line_text(&self, line: usize) -> Option<&str> {
        if line == 0 {
            return None;
        }
        let idx = line - 1;
        let start = *self.line_starts.get(idx)?;
        let end = self
            .line_starts
            .get(idx + 1)
            .copied()
            .unwrap_or_else(|| self.source.len());
        self.source
            .get(start..end)
            .map(|s| s.trim_end_matches('\n').trim_end_matches('\r'))
    }

    /// The text of `line` plus as many following lines (at most `max_lines`) as it takes to
    /// close every delimiter opened on it.
    pub fn call_text(&self, line: usize, max_lines: usize) -> Option<String> {
        let first = self.line_text(line)?;
        let mut text = first.trim().to_string();
        let mut depth = net_depth(first);
        let mut next = line + 1;
        while depth > 0 && next <= line + max_lines {
            let Some(continuation) = self.line_text(next) else {
                break;
            };
            join_continuation(&mut text, continuation.trim());
            depth += net_depth(continuation);
            next += 1;
        }
        Some(text)
    }
}

/// Append a continuation line, gluing with a single space unless the seam sits next to a
/// delimiter.
fn join_continuation(text: &mut String, continuation: &str) {
    if continuation.is_empty() {
        return;
    }
    let tight_before = text.ends_with(&['(', '[', '{'][..]);
    let tight_after = continuation.starts_with(&[')', ']', '}', '.', ','][..]);
    if !text.is_empty() && !tight_before && !tight_after {
        text.push(' ');
    }
    text.push_str(continuation);
}

fn compute_line_starts(source: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (idx, ch) in source.char_indices() {
        if ch == '\n' {
            starts.push(idx + 1);
        }
    }
    starts
}

type CacheKey = (Option<&'static str>, String);

#[derive(Debug)]
pub struct SourceCache {
    roots: Vec<PathBuf>,
    max_call_lines: usize,
    // `None` records a file that could not be read
    files: DashMap<CacheKey, Option<SourceFile>>,
    overrides: DashMap<String, SourceFile>,
}

impl SourceCache {
    pub fn new(roots: Vec<PathBuf>, max_call_lines: usize) -> Self {
        Self {
            roots,
            max_call_lines,
            files: DashMap::new(),
            overrides: DashMap::new(),
        }
    }

    pub fn from_config(config: &PeekConfig) -> Self {
        Self::new(config.source_roots.clone(), config.max_call_lines)
    }

    /// Serve `source` for `file` instead of reading the filesystem.
    pub fn register(&self, file: impl Into<String>, source: &str) {
        let file = file.into();
        let source_file = SourceFile::new(PathBuf::from(&file), source);
        self.overrides.insert(file, source_file);
    }

    pub fn file(&self, file: &str, manifest_dir: Option<&'static str>) -> Option<SourceFile> {
        if let Some(registered) = self.overrides.get(file) {
            return Some(registered.clone());
        }
        let key = (manifest_dir, file.to_string());
        if let Some(cached) = self.files.get(&key) {
            return cached.clone();
        }
        let loaded = self.load(file, manifest_dir);
        self.files.insert(key, loaded.clone());
        loaded
    }

    /// The (possibly multi-line) source text of the call starting at `line`.
    pub fn call_text(
        &self,
        file: &str,
        line: usize,
        manifest_dir: Option<&'static str>,
    ) -> Option<String> {
        self.file(file, manifest_dir)?
            .call_text(line, self.max_call_lines)
    }

    /// Paths tried for `file`, in order.
    pub fn candidates(&self, file: &str, manifest_dir: Option<&str>) -> Vec<PathBuf> {
        let relative = Path::new(file);
        if relative.is_absolute() {
            return vec![relative.to_path_buf()];
        }
        let mut candidates = Vec::new();
        if let Some(dir) = manifest_dir {
            candidates.extend(Path::new(dir).ancestors().map(|ancestor| ancestor.join(relative)));
        }
        candidates.push(relative.to_path_buf());
        candidates.extend(self.roots.iter().map(|root| root.join(relative)));
        candidates
    }

    fn load(&self, file: &str, manifest_dir: Option<&str>) -> Option<SourceFile> {
        for candidate in self.candidates(file, manifest_dir) {
            match std::fs::read_to_string(&candidate) {
                Ok(source) => {
                    trace!("loaded source for {} from {}", file, candidate.display());
                    return Some(SourceFile::new(candidate, &source));
                }
                Err(err) => trace!("{}: {}", candidate.display(), err),
            }
        }
        debug!("no readable source for {}", file);
        None
    }
}

static GLOBAL_SOURCE_CACHE: Lazy<SourceCache> =
    Lazy::new(|| SourceCache::from_config(PeekConfig::global()));

pub fn source_cache() -> &'static SourceCache {
    &GLOBAL_SOURCE_CACHE
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = "fn main() {\n    pv!(lst[i]);\n    pe!(compute(\n        a,\n        b\n    ));\r\n}\n";

    #[test]
    fn line_text_is_one_based() {
        let file = SourceFile::new(PathBuf::from("main.rs"), SOURCE);
        assert_eq!(file.line_text(0), None);
        assert_eq!(file.line_text(2), Some("    pv!(lst[i]);"));
        assert_eq!(file.line_text(6), Some("    ));"));
        assert_eq!(file.line_text(99), None);
    }

    #[test]
    fn call_text_joins_open_calls() {
        let file = SourceFile::new(PathBuf::from("main.rs"), SOURCE);
        assert_eq!(file.call_text(2, 16).as_deref(), Some("pv!(lst[i]);"));
        assert_eq!(file.call_text(3, 16).as_deref(), Some("pe!(compute(a, b));"));
        assert_eq!(file.call_text(3, 1).as_deref(), Some("pe!(compute(a,"));
    }

    #[test]
    fn cache_searches_manifest_ancestors_and_roots() {
        let dir = tempfile::tempdir().unwrap();
        let crate_dir = dir.path().join("crates").join("app");
        std::fs::create_dir_all(crate_dir.join("src")).unwrap();
        std::fs::write(crate_dir.join("src").join("main.rs"), SOURCE).unwrap();

        let manifest: &'static str = Box::leak(
            crate_dir.to_string_lossy().into_owned().into_boxed_str(),
        );
        let cache = SourceCache::new(Vec::new(), 16);
        assert_eq!(
            cache.call_text("crates/app/src/main.rs", 2, Some(manifest)).as_deref(),
            Some("pv!(lst[i]);")
        );
        assert_eq!(cache.call_text("crates/app/src/main.rs", 2, None), None);

        let rooted = SourceCache::new(vec![dir.path().to_path_buf()], 16);
        assert!(rooted.file("crates/app/src/main.rs", None).is_some());
    }

    #[test]
    fn registered_source_wins() {
        let cache = SourceCache::new(Vec::new(), 16);
        cache.register("virtual.rs", "po!(1, 2)\n");
        assert_eq!(
            cache.call_text("virtual.rs", 1, None).as_deref(),
            Some("po!(1, 2)")
        );
    }
}
