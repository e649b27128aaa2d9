//! Tree-sitter backed structure extraction.
//!
//! Parses Python, Java, TypeScript/JavaScript and Go with native grammars and
//! reads imports, classes and functions off the syntax tree. Languages without
//! a grammar, and sources the grammar cannot be loaded for, go through the
//! regex extractor instead.

use tracing::debug;
use tree_sitter::{Node, Parser, Tree};

use crate::indexer::symbols::{RegexExtractor, StructureExtractor};
use crate::models::{ClassSymbol, FileStructure, FunctionSymbol, Language};

const SUPPORTED_LANGUAGES: &[Language] = &[
    Language::Python,
    Language::Java,
    Language::Typescript,
    Language::Javascript,
    Language::Go,
];

fn grammar(language: Language) -> Option<tree_sitter::Language> {
    match language {
        Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
        Language::Java => Some(tree_sitter_java::LANGUAGE.into()),
        Language::Typescript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        // TSX is a superset of JavaScript with JSX.
        Language::Javascript => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
        Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
        _ => None,
    }
}

pub fn parse_source(source: &str, language: Language) -> Result<Tree, String> {
    let ts_language =
        grammar(language).ok_or_else(|| format!("No tree-sitter grammar for: {language}"))?;
    let mut parser = Parser::new();
    parser
        .set_language(&ts_language)
        .map_err(|e| format!("Failed to set language: {e}"))?;
    parser
        .parse(source, None)
        .ok_or_else(|| format!("Failed to parse {language} source"))
}

/// Pre-order walk over every node of `tree`.
fn for_each_node<'t>(tree: &'t Tree, mut visit: impl FnMut(Node<'t>)) {
    let mut cursor = tree.walk();
    loop {
        visit(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

fn text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

fn unquote(raw: &str) -> String {
    raw.trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .to_string()
}

fn field_text(node: Node<'_>, field: &str, source: &str) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| text(n, source).to_string())
        .filter(|s| !s.is_empty())
}

fn node_imports(node: Node<'_>, source: &str, language: Language, out: &mut Vec<String>) {
    match (language, node.kind()) {
        (Language::Python, "import_statement") => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                match child.kind() {
                    "dotted_name" => out.push(text(child, source).to_string()),
                    "aliased_import" => {
                        if let Some(name) = field_text(child, "name", source) {
                            out.push(name);
                        }
                    }
                    _ => {}
                }
            }
        }
        (Language::Python, "import_from_statement") => {
            if let Some(module) = field_text(node, "module_name", source) {
                out.push(module);
            }
        }
        (Language::Java, "import_declaration") => {
            if let Some(child) = node.named_child(0) {
                out.push(text(child, source).to_string());
            }
        }
        (Language::Typescript | Language::Javascript, "import_statement") => {
            if let Some(src) = field_text(node, "source", source) {
                out.push(unquote(&src));
            }
        }
        (Language::Typescript | Language::Javascript, "call_expression") => {
            let callee = node.child_by_field_name("function").map(|f| text(f, source));
            if matches!(callee, Some("require") | Some("import")) {
                let first_arg = node
                    .child_by_field_name("arguments")
                    .and_then(|args| args.named_child(0));
                if let Some(arg) = first_arg.filter(|a| a.kind() == "string") {
                    out.push(unquote(text(arg, source)));
                }
            }
        }
        (Language::Go, "import_spec") => {
            if let Some(path) = field_text(node, "path", source) {
                out.push(unquote(&path));
            }
        }
        _ => {}
    }
}

fn node_structure(
    node: Node<'_>,
    source: &str,
    language: Language,
    classes: &mut Vec<ClassSymbol>,
    functions: &mut Vec<FunctionSymbol>,
) {
    let line = node.start_position().row + 1;
    match (language, node.kind()) {
        (Language::Python, "class_definition") => {
            if let Some(name) = field_text(node, "name", source) {
                let base = node
                    .child_by_field_name("superclasses")
                    .and_then(|args| args.named_child(0))
                    .map(|b| text(b, source).to_string());
                classes.push(ClassSymbol { name, base, line });
            }
        }
        (Language::Java, "class_declaration") => {
            if let Some(name) = field_text(node, "name", source) {
                let base = node
                    .child_by_field_name("superclass")
                    .and_then(|s| s.named_child(0))
                    .map(|b| text(b, source).to_string());
                classes.push(ClassSymbol { name, base, line });
            }
        }
        (Language::Typescript | Language::Javascript, "class_declaration") => {
            if let Some(name) = field_text(node, "name", source) {
                classes.push(ClassSymbol {
                    name,
                    base: None,
                    line,
                });
            }
        }
        (Language::Go, "type_spec") => {
            let is_struct = node
                .child_by_field_name("type")
                .is_some_and(|t| t.kind() == "struct_type");
            if let Some(name) = field_text(node, "name", source).filter(|_| is_struct) {
                classes.push(ClassSymbol {
                    name,
                    base: None,
                    line,
                });
            }
        }
        (Language::Python, "function_definition")
        | (Language::Java, "method_declaration")
        | (Language::Typescript | Language::Javascript, "function_declaration")
        | (Language::Typescript | Language::Javascript, "method_definition")
        | (Language::Go, "function_declaration")
        | (Language::Go, "method_declaration") => {
            if let Some(name) = field_text(node, "name", source) {
                functions.push(FunctionSymbol { name, line });
            }
        }
        _ => {}
    }
}

/// Structure extractor over native tree-sitter grammars.
#[derive(Debug, Default, Clone, Copy)]
pub struct TreeSitterExtractor {
    fallback: RegexExtractor,
}

impl TreeSitterExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn supports(language: Language) -> bool {
        SUPPORTED_LANGUAGES.contains(&language)
    }

    fn tree(&self, source: &str, language: Language) -> Option<Tree> {
        if !Self::supports(language) {
            return None;
        }
        match parse_source(source, language) {
            Ok(tree) => Some(tree),
            Err(e) => {
                debug!("tree-sitter unavailable, using regex extractor: {e}");
                None
            }
        }
    }
}

impl StructureExtractor for TreeSitterExtractor {
    fn name(&self) -> &'static str {
        "tree-sitter"
    }

    fn raw_imports(&self, source: &str, language: Language) -> Vec<String> {
        let Some(tree) = self.tree(source, language) else {
            return self.fallback.raw_imports(source, language);
        };
        let mut imports = Vec::new();
        for_each_node(&tree, |node| node_imports(node, source, language, &mut imports));
        imports
    }

    fn structure(&self, source: &str, language: Language) -> FileStructure {
        let Some(tree) = self.tree(source, language) else {
            return self.fallback.structure(source, language);
        };
        let mut classes = Vec::new();
        let mut functions = Vec::new();
        for_each_node(&tree, |node| {
            node_structure(node, source, language, &mut classes, &mut functions)
        });
        FileStructure {
            classes,
            functions,
            exports: self.fallback.exports(source, language),
            comment_density: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imports(source: &str, language: Language) -> Vec<String> {
        TreeSitterExtractor::new().imports(source, language)
    }

    #[test]
    fn test_python_imports_include_indented() {
        let src = "\
import os, pkg.sub as sub
from .helpers import x

def f():
    import lazy_mod
";
        assert_eq!(
            imports(src, Language::Python),
            vec!["helpers", "lazy_mod", "os", "pkg.sub"]
        );
    }

    #[test]
    fn test_go_import_block() {
        let src = "\
package main

import (
    \"fmt\"
    store \"example.com/app/store\"
)
";
        assert_eq!(
            imports(src, Language::Go),
            vec!["example.com/app/store", "fmt"]
        );
    }

    #[test]
    fn test_typescript_imports_and_require() {
        let src = "\
import { a } from './lib/a';
const b = require('../b');
";
        assert_eq!(imports(src, Language::Typescript), vec!["b", "lib/a"]);
    }

    #[test]
    fn test_java_imports() {
        let src = "package a;\nimport com.example.Service;\npublic class A {}\n";
        assert_eq!(imports(src, Language::Java), vec!["com.example.Service"]);
    }

    #[test]
    fn test_python_structure() {
        let src = "\
class Service(Base):
    def run(self):
        pass

def helper():
    pass
";
        let structure = TreeSitterExtractor::new().structure(src, Language::Python);
        assert_eq!(structure.classes.len(), 1);
        assert_eq!(structure.classes[0].name, "Service");
        assert_eq!(structure.classes[0].base.as_deref(), Some("Base"));
        let names: Vec<&str> = structure.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["run", "helper"]);
        assert_eq!(structure.functions[1].line, 5);
    }

    #[test]
    fn test_go_structure() {
        let src = "package s\n\ntype Store struct{}\n\nfunc (s *Store) Get() {}\n";
        let structure = TreeSitterExtractor::new().structure(src, Language::Go);
        assert_eq!(structure.classes[0].name, "Store");
        assert_eq!(structure.functions[0].name, "Get");
    }

    #[test]
    fn test_unsupported_language_uses_regex_fallback() {
        assert!(!TreeSitterExtractor::supports(Language::Rust));
        assert!(imports("use crate::x;", Language::Rust).is_empty());
    }
}
