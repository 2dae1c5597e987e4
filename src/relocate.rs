//! Diagnostic relocation.
//!
//! A failing fixture should be reported at the line that declared it, not inside
//! the generic dispatch code that called the shared test function. Instead of
//! rewriting stack frames, failures are wrapped in a [`Relocated`] value that
//! carries the original [`Failure`] untouched together with the fixture's
//! [`SourceLocation`]; the reporting boundary formats the wrapper.

use std::collections::HashMap;
use std::fmt;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::Failure;

/// A `(file, line, enclosing-name)` triple, captured when a fixture or group is
/// declared. Used only for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SourceLocation {
    /// Source file path as recorded by the compiler.
    pub file: String,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
    /// Name of the enclosing declaration (the group).
    pub enclosing: String,
}

impl SourceLocation {
    /// Build a location. Angle brackets around `enclosing` are stripped.
    pub fn new(file: impl Into<String>, line: u32, enclosing: impl AsRef<str>) -> Self {
        Self {
            file: file.into(),
            line,
            column: 1,
            enclosing: normalize_enclosing(enclosing.as_ref()),
        }
    }

    /// Location of the caller of the enclosing `#[track_caller]` function.
    #[track_caller]
    pub fn caller(enclosing: impl AsRef<str>) -> Self {
        Self::from_location(Location::caller(), enclosing)
    }

    /// Convert a compiler-provided location.
    pub fn from_location(location: &Location<'_>, enclosing: impl AsRef<str>) -> Self {
        Self {
            file: location.file().to_string(),
            line: location.line(),
            column: location.column(),
            enclosing: normalize_enclosing(enclosing.as_ref()),
        }
    }

    /// Same location under a different enclosing name.
    #[must_use]
    pub fn with_enclosing(&self, enclosing: impl AsRef<str>) -> Self {
        Self {
            enclosing: normalize_enclosing(enclosing.as_ref()),
            ..self.clone()
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} in {}", self.file, self.line, self.enclosing)
    }
}

fn normalize_enclosing(name: &str) -> String {
    name.trim_matches(|c| c == '<' || c == '>').to_string()
}

/// A failure re-pointed at the declaration site of the fixture that produced it.
///
/// The wrapped failure's kind and payload are exactly those of the original.
#[derive(Debug, Clone)]
pub struct Relocated {
    /// The original failure.
    pub failure: Failure,
    /// Where the fixture was declared.
    pub location: SourceLocation,
    /// Text of the declaring line, when the source file could be read.
    pub source_line: Option<String>,
    /// Label of the combination that failed, for multi-combination units.
    pub subcase: Option<String>,
}

impl Relocated {
    /// Tag the failure with the combination label it occurred under.
    #[must_use]
    pub fn with_subcase(mut self, label: impl Into<String>) -> Self {
        self.subcase = Some(label.into());
        self
    }
}

impl fmt::Display for Relocated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.failure)?;
        write!(f, "  --> {}", self.location)?;
        if let Some(label) = &self.subcase {
            write!(f, " [{}]", label)?;
        }
        if let Some(line) = &self.source_line {
            write!(f, "\n   |  {}", line.trim())?;
        }
        Ok(())
    }
}

impl std::error::Error for Relocated {}

type SourceLines = Arc<[String]>;

/// Resolves fixture declaration sites and wraps failures.
///
/// Source files are read lazily, only when a failure needs a fallback location or
/// the text of its declaring line, and cached per path. Unreadable files degrade
/// to coarser locations, never to an error.
pub struct Relocator {
    read_source: bool,
    roots: Vec<PathBuf>,
    cache: Mutex<HashMap<String, Option<SourceLines>>>,
}

impl Default for Relocator {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl fmt::Debug for Relocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relocator")
            .field("read_source", &self.read_source)
            .field("roots", &self.roots)
            .finish_non_exhaustive()
    }
}

impl Relocator {
    /// Create a relocator using the source settings of `config`.
    pub fn new(config: &Config) -> Self {
        Self {
            read_source: config.read_source,
            roots: config.source_roots.clone(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Best location for fixture `name`.
    ///
    /// Uses `declared` when it was captured. Otherwise scans the file of
    /// `container` for the first line after the container's own line that
    /// declares `name`, and falls back to `container` unchanged.
    pub fn locate(
        &self,
        name: &str,
        declared: Option<&SourceLocation>,
        container: &SourceLocation,
    ) -> SourceLocation {
        if let Some(declared) = declared {
            return declared.clone();
        }
        self.scan_for_declaration(name, container)
            .unwrap_or_else(|| container.clone())
    }

    /// Wrap `failure` so it is reported at `at`.
    pub fn relocate(&self, failure: Failure, at: &SourceLocation) -> Relocated {
        Relocated {
            failure,
            location: at.clone(),
            source_line: self.source_line(at),
            subcase: None,
        }
    }

    /// Text of the line `at` points to.
    pub fn source_line(&self, at: &SourceLocation) -> Option<String> {
        let lines = self.lines(&at.file)?;
        let index = usize::try_from(at.line).ok()?.checked_sub(1)?;
        lines.get(index).cloned()
    }

    fn scan_for_declaration(&self, name: &str, container: &SourceLocation) -> Option<SourceLocation> {
        let lines = self.lines(&container.file)?;
        let start = usize::try_from(container.line).ok()?;
        let (index, line) = lines
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, line)| declares(line, name))?;
        let column = line.len() - line.trim_start().len() + 1;
        Some(SourceLocation {
            file: container.file.clone(),
            line: u32::try_from(index + 1).ok()?,
            column: u32::try_from(column).ok()?,
            enclosing: container.enclosing.clone(),
        })
    }

    fn lines(&self, file: &str) -> Option<SourceLines> {
        if !self.read_source {
            return None;
        }
        let mut cache = self.cache.lock();
        if let Some(cached) = cache.get(file) {
            return cached.clone();
        }
        let loaded = self.resolve_path(file).and_then(|path| {
            std::fs::read_to_string(path)
                .ok()
                .map(|text| text.lines().map(str::to_string).collect::<SourceLines>())
        });
        cache.insert(file.to_string(), loaded.clone());
        loaded
    }

    fn resolve_path(&self, file: &str) -> Option<PathBuf> {
        let path = Path::new(file);
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        if path.is_absolute() {
            return None;
        }
        self.roots
            .iter()
            .map(|root| root.join(path))
            .find(|candidate| candidate.is_file())
    }
}

/// Returns `true` if `line` looks like the declaration of fixture `name`:
/// an assignment `name = ...`, a function definition `fn name(`, or the string
/// literal `"name"` (as passed to a builder).
fn declares(line: &str, name: &str) -> bool {
    let trimmed = line.trim_start();
    let trimmed = match trimmed.strip_prefix("let ") {
        Some(rest) => rest.trim_start().strip_prefix("mut ").unwrap_or(rest),
        None => trimmed,
    };
    if let Some(rest) = trimmed.strip_prefix(name) {
        if rest.trim_start().starts_with('=') && !rest.trim_start().starts_with("==") {
            return true;
        }
    }
    line.contains(&format!("fn {}(", name)) || line.contains(&format!("\"{}\"", name))
}
