//! C/C++ keyword tables

/// Reserved words of C and C++ (C++20 plus common C extensions)
const KEYWORDS: &[&str] = &[
    "alignas", "alignof", "asm", "auto", "break", "case", "catch", "class", "co_await",
    "co_return", "co_yield", "concept", "const", "const_cast", "consteval", "constexpr",
    "constinit", "continue", "decltype", "default", "delete", "do", "dynamic_cast", "else",
    "enum", "explicit", "export", "extern", "false", "final", "for", "friend", "goto", "if",
    "inline", "mutable", "namespace", "new", "noexcept", "nullptr", "operator", "override",
    "private", "protected", "public", "register", "reinterpret_cast", "requires", "restrict",
    "return", "sizeof", "static", "static_assert", "static_cast", "struct", "switch",
    "template", "this", "thread_local", "throw", "true", "try", "typedef", "typeid",
    "typename", "union", "using", "virtual", "volatile", "while", "_Alignas", "_Alignof",
    "_Atomic", "_Generic", "_Noreturn", "_Static_assert", "_Thread_local",
];

/// Keywords that name built-in types
const TYPE_KEYWORDS: &[&str] = &[
    "bool", "char", "char8_t", "char16_t", "char32_t", "double", "float", "int", "long",
    "short", "signed", "unsigned", "void", "wchar_t", "_Bool", "_Complex",
];

/// Check if a token is a C/C++ keyword (type keywords included)
pub fn is_keyword(token: &str) -> bool {
    KEYWORDS.contains(&token) || is_type_keyword(token)
}

/// Check if a token is a built-in type keyword
pub fn is_type_keyword(token: &str) -> bool {
    TYPE_KEYWORDS.contains(&token)
}
