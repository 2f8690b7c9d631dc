//! Import specifier scanner.
//!
//! Scans JavaScript/TypeScript source for `import`, `export ... from`,
//! dynamic `import()` and `require()` specifiers. Comments and unrelated
//! string literals are skipped.

use crate::resolver::SpecifierKind;
use serde::Serialize;
use std::collections::HashSet;

/// How a dependency was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    /// `import x from "y"` or `import "y"`.
    Static,
    /// `export ... from "y"`.
    Export,
    /// `import("y")`.
    Dynamic,
    /// `require("y")`.
    Require,
}

impl ImportKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Export => "export",
            Self::Dynamic => "dynamic",
            Self::Require => "require",
        }
    }

    /// Resolver hint for a dependency of this kind.
    #[must_use]
    pub fn specifier_kind(self) -> SpecifierKind {
        match self {
            Self::Require => SpecifierKind::CommonJs,
            Self::Static | Self::Export | Self::Dynamic => SpecifierKind::Esm,
        }
    }
}

/// Import specifier found in source code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSpec {
    /// Specifier exactly as written.
    pub specifier: String,
    pub kind: ImportKind,
    /// Line of the specifier (1-indexed).
    pub line: u32,
}

/// Scan source code for dependency specifiers.
///
/// Returns imports in first-appearance order, deduplicated by
/// (specifier, kind).
#[must_use]
pub fn scan_imports(source: &str) -> Vec<ImportSpec> {
    let mut scanner = Scanner::new(source);
    let mut seen = HashSet::new();
    let mut results = Vec::new();

    while let Some((specifier, kind, offset)) = scanner.next_import() {
        if specifier.is_empty() || !seen.insert((specifier, kind)) {
            continue;
        }
        results.push(ImportSpec {
            specifier: specifier.to_string(),
            kind,
            line: scanner.line_of(offset),
        });
    }

    results
}

/// Upper bound on how far an import clause is searched for `from`.
const MAX_CLAUSE_LEN: usize = 2048;

struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    newlines: Vec<usize>,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        let newlines = src
            .bytes()
            .enumerate()
            .filter_map(|(i, b)| (b == b'\n').then_some(i))
            .collect();
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            newlines,
        }
    }

    fn line_of(&self, offset: usize) -> u32 {
        let line = self.newlines.partition_point(|&nl| nl < offset) + 1;
        u32::try_from(line).unwrap_or(u32::MAX)
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    /// The next specifier with its kind and byte offset.
    fn next_import(&mut self) -> Option<(&'a str, ImportKind, usize)> {
        while let Some(b) = self.peek(0) {
            match b {
                b'/' if self.peek(1) == Some(b'/') => self.skip_line_comment(),
                b'/' if self.peek(1) == Some(b'*') => self.skip_block_comment(),
                b'"' | b'\'' | b'`' => self.skip_string(),
                b'i' if self.at_keyword("import") => {
                    self.pos += "import".len();
                    let resume = self.pos;
                    if let Some(found) = self.import_clause() {
                        return Some(found);
                    }
                    self.pos = resume;
                }
                b'e' if self.at_keyword("export") => {
                    self.pos += "export".len();
                    let resume = self.pos;
                    if let Some((spec, offset)) = self.export_clause() {
                        return Some((spec, ImportKind::Export, offset));
                    }
                    self.pos = resume;
                }
                b'r' if self.at_keyword("require") => {
                    self.pos += "require".len();
                    let resume = self.pos;
                    if let Some((spec, offset)) = self.call_argument() {
                        return Some((spec, ImportKind::Require, offset));
                    }
                    self.pos = resume;
                }
                _ => self.pos += 1,
            }
        }
        None
    }

    /// After `import`: dynamic call, side-effect import or `... from "x"`.
    fn import_clause(&mut self) -> Option<(&'a str, ImportKind, usize)> {
        self.skip_trivia();
        match self.peek(0)? {
            b'(' => self
                .call_argument()
                .map(|(spec, offset)| (spec, ImportKind::Dynamic, offset)),
            b'"' | b'\'' => self
                .read_string()
                .map(|(spec, offset)| (spec, ImportKind::Static, offset)),
            // import.meta
            b'.' => None,
            _ => self
                .from_clause()
                .map(|(spec, offset)| (spec, ImportKind::Static, offset)),
        }
    }

    /// After `export`: only re-exports (`*` or `{ ... }` followed by `from`).
    fn export_clause(&mut self) -> Option<(&'a str, usize)> {
        self.skip_trivia();
        if self.at_keyword("type") {
            self.pos += "type".len();
            self.skip_trivia();
        }
        match self.peek(0)? {
            b'*' => self.pos += 1,
            b'{' => {
                while self.peek(0)? != b'}' {
                    self.pos += 1;
                }
                self.pos += 1;
            }
            _ => return None,
        }
        self.from_clause()
    }

    /// Scan forward to `from` and read the string after it.
    fn from_clause(&mut self) -> Option<(&'a str, usize)> {
        let limit = self.pos + MAX_CLAUSE_LEN;
        while self.pos < limit {
            match self.peek(0)? {
                b'/' if self.peek(1) == Some(b'/') => self.skip_line_comment(),
                b'/' if self.peek(1) == Some(b'*') => self.skip_block_comment(),
                b';' | b'"' | b'\'' | b'`' | b'=' | b'(' => return None,
                b'f' if self.at_keyword("from") => {
                    self.pos += "from".len();
                    self.skip_trivia();
                    return self.read_string();
                }
                _ => self.pos += 1,
            }
        }
        None
    }

    /// `( "x" )` after `require` or `import`.
    fn call_argument(&mut self) -> Option<(&'a str, usize)> {
        self.skip_trivia();
        if self.peek(0)? != b'(' {
            return None;
        }
        self.pos += 1;
        self.skip_trivia();
        let found = self.read_string()?;
        self.skip_trivia();
        // a second argument (import attributes) is allowed
        matches!(self.peek(0), Some(b')' | b',')).then_some(found)
    }

    /// Read a string literal at the cursor. Template literals with
    /// substitutions are not static specifiers.
    fn read_string(&mut self) -> Option<(&'a str, usize)> {
        let quote = self.peek(0)?;
        if !matches!(quote, b'"' | b'\'' | b'`') {
            return None;
        }
        let start = self.pos + 1;
        let mut i = start;
        while let Some(&b) = self.bytes.get(i) {
            match b {
                b'\\' => i += 2,
                b'\n' if quote != b'`' => return None,
                _ if b == quote => {
                    let content = &self.src[start..i];
                    self.pos = i + 1;
                    if quote == b'`' && content.contains("${") {
                        return None;
                    }
                    return Some((content, start));
                }
                _ => i += 1,
            }
        }
        None
    }

    fn skip_string(&mut self) {
        let quote = self.bytes[self.pos];
        self.pos += 1;
        while let Some(b) = self.peek(0) {
            self.pos += 1;
            match b {
                b'\\' => self.pos += 1,
                b'\n' if quote != b'`' => return,
                _ if b == quote => return,
                _ => {}
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while self.peek(0).is_some_and(|b| b != b'\n') {
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) {
        self.pos += 2;
        while let Some(b) = self.peek(0) {
            if b == b'*' && self.peek(1) == Some(b'/') {
                self.pos += 2;
                return;
            }
            self.pos += 1;
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek(0) {
                Some(b) if b.is_ascii_whitespace() => self.pos += 1,
                Some(b'/') if self.peek(1) == Some(b'/') => self.skip_line_comment(),
                Some(b'/') if self.peek(1) == Some(b'*') => self.skip_block_comment(),
                _ => return,
            }
        }
    }

    /// `keyword` at the cursor as a whole word, not a property access.
    fn at_keyword(&self, keyword: &str) -> bool {
        let end = self.pos + keyword.len();
        if !self.bytes[self.pos..].starts_with(keyword.as_bytes()) {
            return false;
        }
        if self.pos > 0 {
            let before = self.bytes[self.pos - 1];
            if is_ident_byte(before) || before == b'.' {
                return false;
            }
        }
        !self.bytes.get(end).copied().is_some_and(is_ident_byte)
    }
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(source: &str) -> Vec<(String, ImportKind)> {
        scan_imports(source)
            .into_iter()
            .map(|i| (i.specifier, i.kind))
            .collect()
    }

    fn one(spec: &str, kind: ImportKind) -> Vec<(String, ImportKind)> {
        vec![(spec.to_string(), kind)]
    }

    #[test]
    fn test_static_import_forms() {
        assert_eq!(specs(r#"import { foo } from "./dep";"#), one("./dep", ImportKind::Static));
        assert_eq!(specs("import foo from 'lodash';"), one("lodash", ImportKind::Static));
        assert_eq!(specs(r#"import * as utils from "./utils""#), one("./utils", ImportKind::Static));
        assert_eq!(specs(r#"import "./polyfill";"#), one("./polyfill", ImportKind::Static));
        assert_eq!(
            specs(r#"import type { Props } from "./types";"#),
            one("./types", ImportKind::Static)
        );
    }

    #[test]
    fn test_multiline_import_clause() {
        let source = "import {\n  a,\n  b,\n} from './ab';\n";
        let imports = scan_imports(source);
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].specifier, "./ab");
        assert_eq!(imports[0].line, 4);
    }

    #[test]
    fn test_reexports() {
        let source = r#"
export * from "./all";
export * as ns from "./ns";
export { a, b as c } from "./named";
export type { T } from "./types";
"#;
        assert_eq!(
            specs(source),
            vec![
                ("./all".to_string(), ImportKind::Export),
                ("./ns".to_string(), ImportKind::Export),
                ("./named".to_string(), ImportKind::Export),
                ("./types".to_string(), ImportKind::Export),
            ]
        );
    }

    #[test]
    fn test_local_export_does_not_swallow_next_import() {
        let source = "export const x = 1;\nexport { x };\nimport y from './y';\n";
        assert_eq!(specs(source), one("./y", ImportKind::Static));
    }

    #[test]
    fn test_dynamic_import() {
        assert_eq!(
            specs(r#"const m = await import("./lazy");"#),
            one("./lazy", ImportKind::Dynamic)
        );
        assert_eq!(
            specs(r#"import("./data.json", { with: { type: "json" } })"#),
            one("./data.json", ImportKind::Dynamic)
        );
    }

    #[test]
    fn test_computed_dynamic_import_is_skipped() {
        assert!(specs("import(`./locale/${lang}.js`)").is_empty());
        assert!(specs("import(name)").is_empty());
        assert_eq!(specs("import(`./fixed.js`)"), one("./fixed.js", ImportKind::Dynamic));
    }

    #[test]
    fn test_require() {
        assert_eq!(
            specs("const fs = require('fs');"),
            one("fs", ImportKind::Require)
        );
        assert!(specs("const r = require;").is_empty());
        assert!(specs("loader.require('./x')").is_empty());
    }

    #[test]
    fn test_import_meta_is_not_an_import() {
        assert!(specs("const url = import.meta.url;").is_empty());
    }

    #[test]
    fn test_comments_are_skipped() {
        let source = r#"
// import a from "./commented";
/* require("./block");
   import "./also-commented"; */
import b from "./real";
"#;
        assert_eq!(specs(source), one("./real", ImportKind::Static));
    }

    #[test]
    fn test_strings_are_skipped() {
        let source = r#"
const s = "import x from './not-real'";
const t = 'require("./nope")';
import real from "./real";
"#;
        assert_eq!(specs(source), one("./real", ImportKind::Static));
    }

    #[test]
    fn test_identifiers_containing_keywords() {
        let source = "const reimport = 1; myrequire('./x'); exported('y');";
        assert!(specs(source).is_empty());
    }

    #[test]
    fn test_dedup_by_specifier_and_kind() {
        let source = r#"
import a from "./a";
import { b } from "./a";
const c = require("./a");
"#;
        assert_eq!(
            specs(source),
            vec![
                ("./a".to_string(), ImportKind::Static),
                ("./a".to_string(), ImportKind::Require),
            ]
        );
    }

    #[test]
    fn test_line_numbers() {
        let source = "import a from './a';\n\nconst b = require('./b');\n\nimport('./c');\n";
        let lines: Vec<u32> = scan_imports(source).iter().map(|i| i.line).collect();
        assert_eq!(lines, vec![1, 3, 5]);
    }

    #[test]
    fn test_unterminated_input() {
        assert!(specs("import x from \"./unterminated").is_empty());
        assert!(specs("export { a").is_empty());
        assert!(specs("require(").is_empty());
        assert!(specs("/* open").is_empty());
    }

    #[test]
    fn test_specifier_kind_hint() {
        assert_eq!(ImportKind::Require.specifier_kind(), SpecifierKind::CommonJs);
        assert_eq!(ImportKind::Dynamic.specifier_kind(), SpecifierKind::Esm);
    }
}
