//! Tree-sitter backed parsing engine for C and C++
//!
//! This is the default [`ParseEngine`]. A translation unit keeps the source
//! it was parsed from next to its tree, which makes reparsing incremental:
//!
//! 1. Compute a single `InputEdit` spanning the changed bytes
//! 2. Apply the edit to a clone of the old tree (the cached unit is untouched)
//! 3. Parse the new source with the edited tree as the old tree
//! 4. Tree-sitter reuses unchanged subtrees
//!
//! Location lookups map the smallest node at a point, and its ancestors, to a
//! [`StatementKind`]. Identifiers used as references are resolved against
//! the enclosing scopes of the same unit (parameters, earlier locals, file
//! scope declarations); anything the unit cannot resolve is `None`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tree_sitter::{InputEdit, Node, Parser, Point, Tree};

use super::{ParseEngine, ParseInput};
use crate::error::EngineError;
use crate::keywords;
use crate::lang::Lang;
use crate::paths::{IncludeContext, IncludeDirective};
use crate::statement::StatementKind;

/// An `#include` found in a unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitInclude {
    /// The directive as written
    pub directive: IncludeDirective,
    /// 1-based line of the directive
    pub line: u32,
    /// Header it resolves to with the include paths of the parse, if found
    pub resolved: Option<PathBuf>,
}

/// A parsed C/C++ file
#[derive(Debug, Clone)]
pub struct TranslationUnit {
    path: PathBuf,
    lang: Lang,
    source: String,
    tree: Tree,
    includes: Vec<UnitInclude>,
}

impl TranslationUnit {
    /// File identity the unit was parsed for
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Language the unit was parsed as
    pub fn lang(&self) -> Lang {
        self.lang
    }

    /// Source the tree was built from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The syntax tree
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Include directives in source order
    pub fn includes(&self) -> &[UnitInclude] {
        &self.includes
    }

    /// Check if the tree contains syntax errors
    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }
}

/// Reusable parsers, one per language
#[derive(Default)]
pub struct TreeSitterContext {
    parsers: HashMap<Lang, Parser>,
}

impl TreeSitterContext {
    fn parser_for(&mut self, lang: Lang) -> Result<&mut Parser, EngineError> {
        if !self.parsers.contains_key(&lang) {
            let mut parser = Parser::new();
            parser
                .set_language(&lang.tree_sitter_language())
                .map_err(|e| EngineError::Grammar(format!("{}: {}", lang.name(), e)))?;
            self.parsers.insert(lang, parser);
        }
        self.parsers
            .get_mut(&lang)
            .ok_or_else(|| EngineError::Grammar(format!("{}: parser missing", lang.name())))
    }

    /// Number of languages with a live parser
    pub fn parser_count(&self) -> usize {
        self.parsers.len()
    }
}

impl std::fmt::Debug for TreeSitterContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeSitterContext")
            .field("languages", &self.parsers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Tree-sitter engine for C and C++ sources
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeSitterEngine;

impl TreeSitterEngine {
    /// Create the engine
    pub fn new() -> Self {
        Self
    }

    fn load_source(input: &ParseInput<'_>) -> Result<String, EngineError> {
        match input.source {
            Some(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
            None => std::fs::read(input.path)
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .map_err(|_| EngineError::SourceUnavailable {
                    path: input.path.to_path_buf(),
                }),
        }
    }

    fn build_unit(
        path: &Path,
        lang: Lang,
        source: String,
        tree: Tree,
        includes: &IncludeContext,
    ) -> TranslationUnit {
        let includes = collect_includes(path, &source, &tree, includes);
        TranslationUnit {
            path: path.to_path_buf(),
            lang,
            source,
            tree,
            includes,
        }
    }
}

impl ParseEngine for TreeSitterEngine {
    type Unit = TranslationUnit;
    type Context = TreeSitterContext;

    fn create_context(&self) -> Result<Self::Context, EngineError> {
        Ok(TreeSitterContext::default())
    }

    fn parse(
        &self,
        ctx: &mut Self::Context,
        input: ParseInput<'_>,
    ) -> Result<Self::Unit, EngineError> {
        let lang = Lang::from_path(input.path)?;
        let source = Self::load_source(&input)?;
        let tree = ctx
            .parser_for(lang)?
            .parse(&source, None)
            .ok_or_else(|| EngineError::Parse {
                path: input.path.to_path_buf(),
                message: "Full parse failed".to_string(),
            })?;
        Ok(Self::build_unit(input.path, lang, source, tree, input.includes))
    }

    fn reparse(
        &self,
        ctx: &mut Self::Context,
        unit: &Self::Unit,
        input: ParseInput<'_>,
    ) -> Result<Self::Unit, EngineError> {
        let lang = Lang::from_path(input.path)?;
        if lang != unit.lang {
            return self.parse(ctx, input);
        }
        let source = Self::load_source(&input)?;
        if source == unit.source {
            // Include paths may have changed even if the text did not
            let tree = unit.tree.clone();
            return Ok(Self::build_unit(input.path, lang, source, tree, input.includes));
        }

        let edit = compute_edit(&unit.source, &source);
        let mut old_tree = unit.tree.clone();
        old_tree.edit(&edit);

        let tree = ctx
            .parser_for(lang)?
            .parse(&source, Some(&old_tree))
            .ok_or_else(|| EngineError::Parse {
                path: input.path.to_path_buf(),
                message: "Incremental parse failed".to_string(),
            })?;
        Ok(Self::build_unit(input.path, lang, source, tree, input.includes))
    }

    fn resolve_location(
        &self,
        unit: &Self::Unit,
        line: u32,
        column: u32,
    ) -> Option<StatementKind> {
        if line == 0 || column == 0 {
            return None;
        }
        let point = Point {
            row: (line - 1) as usize,
            column: (column - 1) as usize,
        };
        let root = unit.tree.root_node();
        if point > root.end_position() {
            return None;
        }
        let node = root.descendant_for_point_range(point, point)?;
        classify(node, unit.source.as_bytes())
    }
}

// ============================================================================
// Include collection
// ============================================================================

fn collect_includes(
    path: &Path,
    source: &str,
    tree: &Tree,
    includes: &IncludeContext,
) -> Vec<UnitInclude> {
    let mut found = Vec::new();
    let mut stack = vec![tree.root_node()];
    while let Some(node) = stack.pop() {
        if node.kind() == "preproc_include" {
            let text = node.utf8_text(source.as_bytes()).unwrap_or("");
            let first_line = text.lines().next().unwrap_or("");
            if let Some(directive) = IncludeDirective::parse(first_line) {
                let resolved = includes.resolve(path, &directive);
                found.push(UnitInclude {
                    directive,
                    line: node.start_position().row as u32 + 1,
                    resolved,
                });
            }
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    found
}

// ============================================================================
// Location classification
// ============================================================================

const PREPROCESSOR_KINDS: &[&str] = &[
    "preproc_include",
    "preproc_def",
    "preproc_function_def",
    "preproc_call",
    "preproc_if",
    "preproc_ifdef",
    "preproc_else",
    "preproc_elif",
    "preproc_elifdef",
    "preproc_directive",
];

const NAME_KINDS: &[&str] = &[
    "identifier",
    "field_identifier",
    "type_identifier",
    "namespace_identifier",
];

fn text<'a>(node: Node<'_>, src: &'a [u8]) -> &'a str {
    node.utf8_text(src).unwrap_or("")
}

fn classify(node: Node<'_>, src: &[u8]) -> Option<StatementKind> {
    if (!node.is_named() && keywords::is_keyword(node.kind()))
        || matches!(node.kind(), "primitive_type" | "sized_type_specifier")
    {
        return Some(StatementKind::Keyword);
    }

    let mut construct = None;
    let mut current = Some(node);
    while let Some(n) = current {
        if let Some(kind) = construct_kind(n, src) {
            construct = Some((n, kind));
            break;
        }
        current = n.parent();
    }

    if NAME_KINDS.contains(&node.kind()) {
        let declares_node = construct
            .map(|(n, _)| declared_names(n).iter().any(|name| name.id() == node.id()))
            .unwrap_or(false);
        if declares_node {
            return construct.map(|(_, kind)| kind);
        }
        if PREPROCESSOR_KINDS.contains(&construct.map(|(n, _)| n.kind()).unwrap_or("")) {
            return Some(StatementKind::Preprocessor);
        }
        return resolve_reference(node, src);
    }

    construct.map(|(_, kind)| kind)
}

/// Statement kind of a construct node, or `None` to keep walking up
fn construct_kind(n: Node<'_>, src: &[u8]) -> Option<StatementKind> {
    let kind = n.kind();
    if PREPROCESSOR_KINDS.contains(&kind) {
        return Some(StatementKind::Preprocessor);
    }
    match kind {
        "enumerator" => Some(StatementKind::Enum),
        "enum_specifier" => Some(enum_flavor(n)),
        "struct_specifier" | "class_specifier" | "union_specifier" => Some(StatementKind::Class),
        "type_definition" | "alias_declaration" => Some(StatementKind::Typedef),
        "namespace_alias_definition" => Some(StatementKind::NamespaceAlias),
        "namespace_definition" => Some(StatementKind::Namespace),
        "parameter_declaration"
        | "optional_parameter_declaration"
        | "variadic_parameter_declaration" => Some(StatementKind::Parameter),
        "function_definition" => Some(function_flavor(n, src)),
        "field_declaration" => {
            if function_declarator(n).is_some() {
                Some(function_flavor(n, src))
            } else {
                Some(StatementKind::Variable)
            }
        }
        "declaration" => {
            if function_declarator(n).is_some() {
                Some(function_flavor(n, src))
            } else if is_local(n) {
                Some(StatementKind::LocalVariable)
            } else {
                Some(StatementKind::GlobalVariable)
            }
        }
        "lambda_expression" => Some(StatementKind::Function),
        "compound_statement" => Some(StatementKind::Block),
        _ => None,
    }
}

fn enum_flavor(n: Node<'_>) -> StatementKind {
    let mut cursor = n.walk();
    let scoped = n
        .children(&mut cursor)
        .any(|c| !c.is_named() && matches!(c.kind(), "class" | "struct"));
    if scoped {
        StatementKind::EnumClassType
    } else {
        StatementKind::EnumType
    }
}

/// Check if a declaration sits inside a function body
fn is_local(n: Node<'_>) -> bool {
    let mut current = n.parent();
    while let Some(p) = current {
        match p.kind() {
            "compound_statement" | "for_statement" | "for_range_loop" | "condition_clause" => {
                return true
            }
            "translation_unit" | "declaration_list" | "field_declaration_list" => return false,
            _ => current = p.parent(),
        }
    }
    false
}

/// Find the function declarator in a declaration's declarator chain
fn function_declarator(n: Node<'_>) -> Option<Node<'_>> {
    let mut current = n.child_by_field_name("declarator");
    while let Some(d) = current {
        if d.kind() == "function_declarator" {
            return Some(d);
        }
        current = d.child_by_field_name("declarator");
    }
    None
}

fn function_flavor(n: Node<'_>, src: &[u8]) -> StatementKind {
    let name = match function_declarator(n).and_then(|d| d.child_by_field_name("declarator")) {
        Some(name) => name,
        None => return StatementKind::Function,
    };

    let (scope, last) = if name.kind() == "qualified_identifier" {
        let mut last = name;
        while let Some(inner) = last.child_by_field_name("name") {
            last = inner;
            if inner.kind() != "qualified_identifier" {
                break;
            }
        }
        let scope = name.child_by_field_name("scope").map(|s| text(s, src));
        (scope, last)
    } else {
        (None, name)
    };

    match last.kind() {
        "operator_name" => return StatementKind::Operator,
        "destructor_name" => return StatementKind::Destructor,
        _ => {}
    }

    let fname = text(last, src);
    if scope.is_some_and(|s| s.rsplit("::").next() == Some(fname)) {
        return StatementKind::Constructor;
    }
    if enclosing_class_name(n, src) == Some(fname) {
        return StatementKind::Constructor;
    }
    StatementKind::Function
}

fn enclosing_class_name<'a>(n: Node<'_>, src: &'a [u8]) -> Option<&'a str> {
    let mut current = n.parent();
    while let Some(p) = current {
        match p.kind() {
            "field_declaration_list" => {
                return p
                    .parent()
                    .and_then(|class| class.child_by_field_name("name"))
                    .map(|name| text(name, src));
            }
            "compound_statement" | "translation_unit" => return None,
            _ => current = p.parent(),
        }
    }
    None
}

/// Follow a declarator chain down to the declared name
fn declarator_name(d: Node<'_>) -> Option<Node<'_>> {
    match d.kind() {
        "identifier" | "field_identifier" | "type_identifier" | "namespace_identifier"
        | "operator_name" | "destructor_name" => Some(d),
        "qualified_identifier" | "template_function" => {
            d.child_by_field_name("name").and_then(declarator_name)
        }
        _ => d.child_by_field_name("declarator").and_then(declarator_name),
    }
}

/// Names introduced by a construct
fn declared_names(n: Node<'_>) -> Vec<Node<'_>> {
    match n.kind() {
        "declaration" | "field_declaration" | "type_definition" => {
            let mut cursor = n.walk();
            let names: Vec<Node> = n
                .children_by_field_name("declarator", &mut cursor)
                .filter_map(declarator_name)
                .collect();
            names
        }
        "parameter_declaration" | "optional_parameter_declaration" | "function_definition" => n
            .child_by_field_name("declarator")
            .and_then(declarator_name)
            .into_iter()
            .collect(),
        "struct_specifier" | "class_specifier" | "union_specifier" | "enum_specifier"
        | "namespace_definition" | "alias_declaration" | "namespace_alias_definition"
        | "enumerator" | "preproc_def" | "preproc_function_def" => {
            n.child_by_field_name("name").into_iter().collect()
        }
        _ => Vec::new(),
    }
}

// ============================================================================
// Reference resolution
// ============================================================================

fn resolve_reference(node: Node<'_>, src: &[u8]) -> Option<StatementKind> {
    let name = text(node, src);
    if name.is_empty() {
        return None;
    }

    let mut current = node.parent();
    while let Some(scope) = current {
        match scope.kind() {
            "compound_statement" => {
                if let Some(kind) = search_scope(scope, name, node, src, true) {
                    return Some(kind);
                }
            }
            "for_statement" | "for_range_loop" => {
                let mut cursor = scope.walk();
                let inits: Vec<Node> = scope
                    .named_children(&mut cursor)
                    .filter(|c| c.kind() == "declaration")
                    .collect();
                for decl in inits {
                    if names_match(decl, name, src) {
                        return Some(StatementKind::LocalVariable);
                    }
                }
                if let Some(var) = scope.child_by_field_name("declarator") {
                    if declarator_name(var).is_some_and(|v| text(v, src) == name) {
                        return Some(StatementKind::LocalVariable);
                    }
                }
            }
            "function_definition" | "lambda_expression" => {
                if let Some(kind) = search_parameters(scope, name, src) {
                    return Some(kind);
                }
            }
            "translation_unit" | "declaration_list" | "field_declaration_list" => {
                if let Some(kind) = search_scope(scope, name, node, src, false) {
                    return Some(kind);
                }
            }
            _ => {}
        }
        current = scope.parent();
    }
    None
}

fn names_match(n: Node<'_>, name: &str, src: &[u8]) -> bool {
    declared_names(n).iter().any(|d| text(*d, src) == name)
}

fn search_parameters(scope: Node<'_>, name: &str, src: &[u8]) -> Option<StatementKind> {
    let params = function_declarator(scope)
        .or_else(|| scope.child_by_field_name("declarator"))
        .and_then(|d| d.child_by_field_name("parameters"))?;
    let mut cursor = params.walk();
    let found = params
        .named_children(&mut cursor)
        .any(|p| names_match(p, name, src));
    found.then_some(StatementKind::Parameter)
}

/// Look for a declaration of `name` among the children of a scope node
///
/// Block scopes only see declarations that start before the reference.
fn search_scope(
    scope: Node<'_>,
    name: &str,
    reference: Node<'_>,
    src: &[u8],
    block: bool,
) -> Option<StatementKind> {
    let mut cursor = scope.walk();
    let children: Vec<Node> = scope.named_children(&mut cursor).collect();
    for child in children {
        if block && child.start_byte() >= reference.start_byte() {
            break;
        }
        if let Some(kind) = search_item(child, name, src, block) {
            return Some(kind);
        }
    }
    None
}

fn search_item(item: Node<'_>, name: &str, src: &[u8], block: bool) -> Option<StatementKind> {
    match item.kind() {
        "template_declaration" | "linkage_specification" | "export_declaration" => {
            let mut cursor = item.walk();
            let inner: Vec<Node> = item.named_children(&mut cursor).collect();
            return inner
                .into_iter()
                .find_map(|child| search_item(child, name, src, block));
        }
        "preproc_ifdef" | "preproc_if" | "preproc_else" | "preproc_elif" => {
            let mut cursor = item.walk();
            let inner: Vec<Node> = item.named_children(&mut cursor).collect();
            return inner
                .into_iter()
                .find_map(|child| search_item(child, name, src, block));
        }
        _ => {}
    }

    if names_match(item, name, src) {
        let kind = match item.kind() {
            "declaration" if block && function_declarator(item).is_none() => {
                StatementKind::LocalVariable
            }
            _ => construct_kind(item, src)?,
        };
        return Some(kind);
    }

    // `struct A { ... } a;` and `typedef enum { X } E;` declare types and
    // enumerators inside the type field.
    let specifier = if matches!(
        item.kind(),
        "struct_specifier" | "class_specifier" | "union_specifier" | "enum_specifier"
    ) {
        Some(item)
    } else {
        item.child_by_field_name("type")
    };
    if let Some(spec) = specifier {
        if spec.id() != item.id() && names_match(spec, name, src) {
            return construct_kind(spec, src);
        }
        if spec.kind() == "enum_specifier" {
            if let Some(body) = spec.child_by_field_name("body") {
                let mut cursor = body.walk();
                let hit = body
                    .named_children(&mut cursor)
                    .any(|e| e.kind() == "enumerator" && names_match(e, name, src));
                if hit {
                    return Some(StatementKind::Enum);
                }
            }
        }
    }
    None
}

// ============================================================================
// Incremental edits
// ============================================================================

/// Compute the InputEdit for tree-sitter given old and new source
///
/// Finds the first and last differing bytes and produces a single edit
/// spanning them. Multiple distant changes collapse into one wider edit,
/// which is less optimal but still correct.
pub fn compute_edit(old_source: &str, new_source: &str) -> InputEdit {
    let old_bytes = old_source.as_bytes();
    let new_bytes = new_source.as_bytes();

    let start_byte = old_bytes
        .iter()
        .zip(new_bytes.iter())
        .position(|(a, b)| a != b)
        .unwrap_or(old_bytes.len().min(new_bytes.len()));

    let suffix_len = old_bytes[start_byte..]
        .iter()
        .rev()
        .zip(new_bytes[start_byte..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let old_end_byte = old_bytes.len() - suffix_len;
    let new_end_byte = new_bytes.len() - suffix_len;

    InputEdit {
        start_byte,
        old_end_byte,
        new_end_byte,
        start_position: byte_to_point(old_bytes, start_byte),
        old_end_position: byte_to_point(old_bytes, old_end_byte),
        new_end_position: byte_to_point(new_bytes, new_end_byte),
    }
}

/// Convert a byte offset to a Point (row, byte column)
fn byte_to_point(source: &[u8], byte_offset: usize) -> Point {
    let upto = &source[..byte_offset.min(source.len())];
    let row = upto.iter().filter(|&&b| b == b'\n').count();
    let line_start = upto
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    Point {
        row,
        column: upto.len() - line_start,
    }
}

// ============================================================================
// Tests
// ============================================================================
