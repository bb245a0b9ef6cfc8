//! Statement kinds reported by location lookups

use serde::{Deserialize, Serialize};

/// Kind of statement found at a source location
///
/// `Unknown` is the explicit "nothing resolved" answer: lookups on files that
/// are not cached, or locations the engine cannot resolve, return it instead
/// of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    /// Nothing resolved at the location
    #[default]
    Unknown,
    /// Preprocessor directive or macro
    Preprocessor,
    /// `enum` type
    EnumType,
    /// `enum class` type
    EnumClassType,
    /// Enumerator inside an enum
    Enum,
    /// `typedef` or `using` alias
    Typedef,
    /// `class`, `struct` or `union`
    Class,
    /// Free function or method
    Function,
    /// Operator overload
    Operator,
    /// Constructor
    Constructor,
    /// Destructor
    Destructor,
    /// Variable or field
    Variable,
    /// Function parameter
    Parameter,
    /// Namespace
    Namespace,
    /// Namespace alias
    NamespaceAlias,
    /// Compound statement / block scope
    Block,
    /// Language keyword
    Keyword,
    /// Variable declared at file scope
    GlobalVariable,
    /// Variable declared inside a function body
    LocalVariable,
}

impl StatementKind {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Preprocessor => "preprocessor",
            Self::EnumType => "enum_type",
            Self::EnumClassType => "enum_class_type",
            Self::Enum => "enum",
            Self::Typedef => "typedef",
            Self::Class => "class",
            Self::Function => "function",
            Self::Operator => "operator",
            Self::Constructor => "constructor",
            Self::Destructor => "destructor",
            Self::Variable => "variable",
            Self::Parameter => "parameter",
            Self::Namespace => "namespace",
            Self::NamespaceAlias => "namespace_alias",
            Self::Block => "block",
            Self::Keyword => "keyword",
            Self::GlobalVariable => "global_variable",
            Self::LocalVariable => "local_variable",
        }
    }
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
