use std::collections::btree_set;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::utils::ensure_dir;

/// Sorted, deduplicated set of non-blank trimmed lines.
///
/// This is the contract between stages: every stage persists its results as a
/// `LineSet` artifact and downstream stages read them back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineSet(BTreeSet<String>);

impl LineSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a trimmed copy of `line`. Blank lines are ignored.
    pub fn insert(&mut self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return false;
        }
        self.0.insert(line.to_string())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, line: &str) -> bool {
        self.0.contains(line)
    }

    pub fn iter(&self) -> btree_set::Iter<'_, String> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0.into_iter().collect()
    }

    /// Newline-delimited rendering; non-empty sets end with a trailing newline.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.0 {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

impl<S: AsRef<str>> FromIterator<S> for LineSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = LineSet::new();
        set.extend(iter);
        set
    }
}

impl<S: AsRef<str>> Extend<S> for LineSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for line in iter {
            self.insert(line.as_ref());
        }
    }
}

impl<'a> IntoIterator for &'a LineSet {
    type Item = &'a String;
    type IntoIter = btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for LineSet {
    type Item = String;
    type IntoIter = btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A persisted stage artifact and its cardinality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    pub path: PathBuf,
    pub count: usize,
}

impl StageResult {
    pub fn new(path: PathBuf, count: usize) -> Self {
        Self { path, count }
    }

    /// Re-count an existing artifact (used when a stage is resumed).
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let count = read_set(path)?.len();
        Ok(Self::new(path.to_path_buf(), count))
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Read every line of `path`. A missing file reads as no lines.
pub fn read_lines(path: &Path) -> anyhow::Result<Vec<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text.lines().map(str::to_string).collect()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

pub fn read_set(path: &Path) -> anyhow::Result<LineSet> {
    Ok(read_lines(path)?.into_iter().collect())
}

/// Deduplicate, sort and persist `lines` to `path`, returning the entry count.
pub fn write_dedup<I, S>(path: &Path, lines: I) -> anyhow::Result<usize>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let set: LineSet = lines.into_iter().collect();
    write_set(path, &set)
}

/// Persist `set` via a sibling temp file and a rename so readers never observe a partial write.
pub fn write_set(path: &Path, set: &LineSet) -> anyhow::Result<usize> {
    write_atomic(path, set.render().as_bytes())?;
    Ok(set.len())
}

/// Persist raw tool output (e.g. JSON-lines dumps) without any filtering.
pub fn write_raw(path: &Path, lines: &[String]) -> anyhow::Result<()> {
    let mut body = lines.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }
    write_atomic(path, body.as_bytes())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    fs::write(&tmp, bytes).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("failed to move {} into place", path.display()))?;
    Ok(())
}
