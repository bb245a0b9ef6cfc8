//! CLI argument definitions using clap

use clap::Parser;
use std::path::PathBuf;

use crate::error::{CoordinatorError, Result};

/// Parse C/C++ files into a translation-unit cache and query it
#[derive(Parser, Debug)]
#[command(name = "tucache")]
#[command(about = "Parse C/C++ files into a translation-unit cache and query statement kinds")]
#[command(version)]
pub struct Cli {
    /// Files to parse (registered as project files)
    pub files: Vec<PathBuf>,

    /// Configuration file (TOML)
    #[arg(short, long, env = "TUCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// System include directory (repeatable)
    #[arg(short = 'I', long = "include", value_name = "DIR")]
    pub include: Vec<PathBuf>,

    /// Project include directory (repeatable)
    #[arg(long = "project-include", value_name = "DIR")]
    pub project_include: Vec<PathBuf>,

    /// Print parse notifications as JSON lines on stdout
    #[arg(long)]
    pub events: bool,

    /// Report the statement kind at FILE:LINE:COL (repeatable)
    #[arg(long = "at", value_name = "FILE:LINE:COL")]
    pub at: Vec<String>,

    /// Show verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Parse every `--at` argument
    pub fn locations(&self) -> Result<Vec<Location>> {
        self.at.iter().map(|spec| Location::parse(spec)).collect()
    }
}

/// A 1-based position in a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl Location {
    /// Parse `FILE:LINE:COL`; the file part may itself contain colons
    pub fn parse(spec: &str) -> Result<Self> {
        let invalid = || CoordinatorError::InvalidLocation {
            spec: spec.to_string(),
        };

        let mut parts = spec.rsplitn(3, ':');
        let column = parts.next().ok_or_else(invalid)?;
        let line = parts.next().ok_or_else(invalid)?;
        let file = parts.next().ok_or_else(invalid)?;

        let line: u32 = line.parse().map_err(|_| invalid())?;
        let column: u32 = column.parse().map_err(|_| invalid())?;
        if file.is_empty() || line == 0 || column == 0 {
            return Err(invalid());
        }

        Ok(Self {
            file: PathBuf::from(file),
            line,
            column,
        })
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}
