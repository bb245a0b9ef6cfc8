//! Include-path resolution and header classification
//!
//! These helpers are pure: they take the include path sets as arguments and
//! only touch the filesystem to test whether a candidate header exists. Both
//! the coordinator and the engines resolve against an [`IncludeContext`]
//! snapshot, never against the live path sets.

use std::path::{Component, Path, PathBuf};

/// A parsed `#include` directive
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IncludeDirective {
    /// Header name as written between the delimiters
    pub target: String,
    /// `true` for `<...>`, `false` for `"..."`
    pub system: bool,
}

impl IncludeDirective {
    /// Parse a source line holding an `#include` (or `#import`) directive
    ///
    /// Whitespace between `#` and the keyword is accepted. Returns `None` for
    /// any other line, including unterminated or empty header names.
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.trim_start().strip_prefix('#')?.trim_start();
        let rest = rest
            .strip_prefix("include_next")
            .or_else(|| rest.strip_prefix("include"))
            .or_else(|| rest.strip_prefix("import"))?
            .trim_start();

        let (close, system) = match rest.chars().next()? {
            '<' => ('>', true),
            '"' => ('"', false),
            _ => return None,
        };
        let body = &rest[1..];
        let end = body.find(close)?;
        let target = body[..end].trim();
        if target.is_empty() {
            return None;
        }
        Some(Self {
            target: target.to_string(),
            system,
        })
    }
}

/// Snapshot of the include path sets handed to an engine for one parse
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeContext {
    /// System (compiler) include directories
    pub include_paths: Vec<PathBuf>,
    /// Project include directories
    pub project_include_paths: Vec<PathBuf>,
}

impl IncludeContext {
    /// Create a context from the two path lists
    pub fn new(include_paths: Vec<PathBuf>, project_include_paths: Vec<PathBuf>) -> Self {
        Self {
            include_paths,
            project_include_paths,
        }
    }

    /// Resolve a directive found in `relative_to` to an existing header
    pub fn resolve(&self, relative_to: &Path, directive: &IncludeDirective) -> Option<PathBuf> {
        resolve_include(
            relative_to,
            directive,
            &self.include_paths,
            &self.project_include_paths,
        )
    }

    /// Resolve the header named by an include `line` written in `relative_to`
    ///
    /// Returns `None` when the line is not an include directive or no
    /// candidate exists on disk.
    pub fn header_file_name(&self, relative_to: &Path, line: &str) -> Option<PathBuf> {
        let directive = IncludeDirective::parse(line)?;
        self.resolve(relative_to, &directive)
    }

    /// Check if a header belongs to the system include directories
    pub fn is_system_header(&self, file: &Path) -> bool {
        is_header_in_paths(file, &self.include_paths)
    }

    /// Check if a header belongs to the project include directories
    pub fn is_project_header(&self, file: &Path) -> bool {
        is_header_in_paths(file, &self.project_include_paths)
    }
}

/// Resolve a directive against the including file's directory and the path sets
///
/// Quoted includes look next to the including file first, then in project
/// include paths, then in system include paths. Angle includes look in system
/// include paths first, then in project include paths.
pub fn resolve_include<'a, S, P>(
    relative_to: &Path,
    directive: &IncludeDirective,
    include_paths: S,
    project_include_paths: P,
) -> Option<PathBuf>
where
    S: IntoIterator<Item = &'a PathBuf>,
    P: IntoIterator<Item = &'a PathBuf>,
{
    let target = Path::new(&directive.target);
    if target.is_absolute() {
        return target.is_file().then(|| normalize(target));
    }

    let system: Vec<&PathBuf> = include_paths.into_iter().collect();
    let project: Vec<&PathBuf> = project_include_paths.into_iter().collect();

    let mut candidates: Vec<PathBuf> = Vec::new();
    if !directive.system {
        if let Some(dir) = relative_to.parent() {
            candidates.push(dir.join(target));
        }
        candidates.extend(project.iter().map(|dir| dir.join(target)));
        candidates.extend(system.iter().map(|dir| dir.join(target)));
    } else {
        candidates.extend(system.iter().map(|dir| dir.join(target)));
        candidates.extend(project.iter().map(|dir| dir.join(target)));
    }

    candidates
        .into_iter()
        .find(|candidate| candidate.is_file())
        .map(|found| normalize(&found))
}

/// Check if a header lives under (or is reachable from) one of `include_paths`
///
/// Absolute names match when they sit below an include directory. Relative
/// names match when joining them onto an include directory names an existing
/// file. An empty path set never matches.
pub fn is_header_in_paths<'a, I>(file: &Path, include_paths: I) -> bool
where
    I: IntoIterator<Item = &'a PathBuf>,
{
    let file = normalize(file);
    include_paths.into_iter().any(|dir| {
        if file.is_absolute() {
            file.starts_with(normalize(dir))
        } else {
            dir.join(&file).is_file()
        }
    })
}

/// Lexically normalize a path: drop `.` components and fold `..` where possible
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                ) && out.pop();
                if !popped {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
