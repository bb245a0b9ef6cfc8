//! Language detection and tree-sitter grammar loading

use std::path::Path;
use tree_sitter::Language;

use crate::error::EngineError;

/// Supported source languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lang {
    C,
    Cpp,
}

impl Lang {
    /// Detect language from file path extension
    pub fn from_path(path: &Path) -> Result<Self, EngineError> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| EngineError::UnsupportedLanguage {
                path: path.to_path_buf(),
            })
    }

    /// Detect language from file extension string
    ///
    /// Plain `.h` headers are parsed as C++ since the C++ grammar accepts
    /// nearly all C and headers are shared between both.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "c" => Some(Self::C),
            "h" | "cpp" | "cc" | "cxx" | "c++" | "hpp" | "hxx" | "hh" | "h++" | "inl" => {
                Some(Self::Cpp)
            }
            _ => None,
        }
    }

    /// Get the canonical name of the language
    pub fn name(&self) -> &'static str {
        match self {
            Self::C => "c",
            Self::Cpp => "cpp",
        }
    }

    /// Get the tree-sitter Language for parsing
    pub fn tree_sitter_language(&self) -> Language {
        match self {
            Self::C => tree_sitter_c::LANGUAGE.into(),
            Self::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        }
    }
}

/// Role of a file within a C/C++ project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Header meant to be included (`.h`, `.hpp`, ...)
    Header,
    /// Compilation unit (`.c`, `.cpp`, ...)
    Source,
    /// Anything else
    Other,
}

impl FileKind {
    /// Classify a path by extension
    pub fn of(path: &Path) -> Self {
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => ext.to_lowercase(),
            None => return Self::Other,
        };
        match ext.as_str() {
            "h" | "hpp" | "hxx" | "hh" | "h++" | "inl" => Self::Header,
            "c" | "cpp" | "cc" | "cxx" | "c++" => Self::Source,
            _ => Self::Other,
        }
    }
}

/// Check if a path names a header file
pub fn is_header_file(path: &Path) -> bool {
    FileKind::of(path) == FileKind::Header
}

/// Check if a path names a compilation unit
pub fn is_source_file(path: &Path) -> bool {
    FileKind::of(path) == FileKind::Source
}
