//! Source transformation
//!
//! Turns one file of the tree into executable module text. JSX is lowered
//! with [`JsxLowerer`], TypeScript types are stripped with `oxc_transformer`,
//! and every import in the final text is reported with its byte spans so the
//! linker can rewrite specifiers without reparsing.

use std::path::Path;

use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_ast_visit::{walk, Visit, VisitMut};
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::{SourceType, Span};
use oxc_transformer::{TransformOptions, Transformer};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::config::JsxConfig;
use crate::diagnostics::SourceLocation;
use crate::jsx_lowerer::{first_jsx_span, JsxLowerer};
use crate::path;

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FileKind {
    /// `.js`, `.mjs`, `.cjs`
    Script,
    /// `.jsx`
    Component,
    /// `.ts`, `.mts`, `.cts`
    TypeScript,
    /// `.tsx`
    TypeScriptComponent,
    Style,
    Json,
    Asset,
}

impl FileKind {
    pub fn from_path(file_path: &str) -> Self {
        match path::extension(file_path).map(|e| e.to_ascii_lowercase()).as_deref() {
            Some("js") | Some("mjs") | Some("cjs") => FileKind::Script,
            Some("jsx") => FileKind::Component,
            Some("ts") | Some("mts") | Some("cts") => FileKind::TypeScript,
            Some("tsx") => FileKind::TypeScriptComponent,
            Some("css") => FileKind::Style,
            Some("json") => FileKind::Json,
            _ => FileKind::Asset,
        }
    }

    /// Kinds that go through the parser.
    pub fn is_code(&self) -> bool {
        matches!(
            self,
            FileKind::Script
                | FileKind::Component
                | FileKind::TypeScript
                | FileKind::TypeScriptComponent
        )
    }

    pub fn is_typescript(&self) -> bool {
        matches!(self, FileKind::TypeScript | FileKind::TypeScriptComponent)
    }

    fn source_type(&self) -> SourceType {
        SourceType::default()
            .with_module(true)
            .with_jsx(!matches!(self, FileKind::TypeScript))
            .with_typescript(self.is_typescript())
    }
}

/// Byte range into a module's code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TextSpan {
    pub start: u32,
    pub end: u32,
}

impl From<Span> for TextSpan {
    fn from(span: Span) -> Self {
        Self {
            start: span.start,
            end: span.end,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportKind {
    /// `import ... from "x"` and `import "x"`
    Static,
    /// `export ... from "x"`
    ReExport,
    /// `import("x")`
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    pub specifier: String,
    pub kind: ImportKind,
    /// The string literal, quotes included.
    pub literal_span: TextSpan,
    /// The whole declaration, or the `import(...)` call for dynamic imports.
    pub statement_span: TextSpan,
    /// Where the specifier sits in the file as written. `None` for imports
    /// the transform added, such as the JSX runtime.
    pub source_location: Option<SourceLocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformOutput {
    pub file_path: String,
    pub kind: FileKind,
    pub code: String,
    pub imports: Vec<ImportRecord>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{file_path}:{line}:{column}: {message}")]
#[serde(rename_all = "camelCase")]
pub struct TransformError {
    pub file_path: String,
    pub message: String,
    /// 1-based; 0 when the parser gave no position.
    pub line: u32,
    pub column: u32,
}

impl TransformError {
    fn at(file_path: &str, message: impl Into<String>, source: &str, offset: Option<usize>) -> Self {
        let (line, column) = match offset {
            Some(offset) => {
                let loc = SourceLocation::from_offset(source, offset);
                (loc.line, loc.column)
            }
            None => (0, 0),
        };
        Self {
            file_path: file_path.to_string(),
            message: message.into(),
            line,
            column,
        }
    }

    pub fn location(&self) -> Option<SourceLocation> {
        if self.line == 0 {
            None
        } else {
            Some(SourceLocation {
                line: self.line,
                column: self.column,
            })
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSFORM
// ═══════════════════════════════════════════════════════════════════════════════

pub fn transform_file(
    file_path: &str,
    source: &str,
    jsx: &JsxConfig,
) -> Result<TransformOutput, TransformError> {
    let kind = FileKind::from_path(file_path);
    if !kind.is_code() {
        return Ok(TransformOutput {
            file_path: file_path.to_string(),
            kind,
            code: source.to_string(),
            imports: Vec::new(),
        });
    }

    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, kind.source_type()).parse();
    if let Some(err) = ret.errors.first() {
        let offset = err
            .labels
            .as_ref()
            .and_then(|labels| labels.first())
            .map(|label| label.offset());
        return Err(TransformError::at(
            file_path,
            err.message.to_string(),
            source,
            offset,
        ));
    }
    let mut program = ret.program;

    let has_jsx = first_jsx_span(&program).is_some();
    if !has_jsx && !kind.is_typescript() {
        debug!(path = %file_path, "no JSX, passing through");
        let mut imports = scan_imports(&program);
        for record in &mut imports {
            record.source_location = Some(SourceLocation::from_offset(
                source,
                record.literal_span.start as usize,
            ));
        }
        return Ok(TransformOutput {
            file_path: file_path.to_string(),
            kind,
            code: source.to_string(),
            imports,
        });
    }

    let written = scan_imports(&program);
    let mut lowerer = JsxLowerer::new(&allocator, jsx);
    lowerer.visit_program(&mut program);
    if let Some((message, span)) = lowerer.errors.first() {
        return Err(TransformError::at(
            file_path,
            message.clone(),
            source,
            Some(span.start as usize),
        ));
    }
    let helpers = lowerer.helpers;

    if kind.is_typescript() {
        let scoping = SemanticBuilder::new()
            .build(&program)
            .semantic
            .into_scoping();
        let options = TransformOptions::default();
        let ret = Transformer::new(&allocator, Path::new(file_path), &options)
            .build_with_scoping(scoping, &mut program);
        if let Some(err) = ret.errors.first() {
            return Err(TransformError::at(
                file_path,
                err.message.to_string(),
                source,
                None,
            ));
        }
    }

    let mut code = String::new();
    if let Some(runtime_import) = helpers.import_statement(&jsx.import_source) {
        code.push_str(&runtime_import);
    }
    code.push_str(&Codegen::new().build(&program).code);

    let mut imports = scan_generated(file_path, &code)?;
    attach_source_locations(&mut imports, &written, source);
    debug!(path = %file_path, imports = imports.len(), "transformed");

    Ok(TransformOutput {
        file_path: file_path.to_string(),
        kind,
        code,
        imports,
    })
}

/// Re-parse emitted code so import spans index into it.
fn scan_generated(file_path: &str, code: &str) -> Result<Vec<ImportRecord>, TransformError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, SourceType::mjs()).parse();
    if let Some(err) = ret.errors.first() {
        return Err(TransformError::at(
            file_path,
            format!("generated code failed to parse: {}", err.message),
            code,
            None,
        ));
    }
    Ok(scan_imports(&ret.program))
}

/// Pair each emitted import with the one it came from. Both lists are in
/// source order; emitted-only imports and imports dropped by type stripping
/// are skipped over.
fn attach_source_locations(emitted: &mut [ImportRecord], written: &[ImportRecord], source: &str) {
    let mut cursor = 0;
    for record in emitted.iter_mut() {
        let found = written[cursor..]
            .iter()
            .position(|w| w.specifier == record.specifier && w.kind == record.kind);
        if let Some(offset) = found {
            let original = &written[cursor + offset];
            record.source_location = Some(SourceLocation::from_offset(
                source,
                original.literal_span.start as usize,
            ));
            cursor += offset + 1;
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// IMPORT SCANNING
// ═══════════════════════════════════════════════════════════════════════════════

/// Every value import in source order. Type-only imports and exports are skipped,
/// as are dynamic imports whose argument is not a plain string.
pub fn scan_imports(program: &Program<'_>) -> Vec<ImportRecord> {
    let mut scanner = ImportScanner {
        records: Vec::new(),
    };
    scanner.visit_program(program);
    scanner.records
}

struct ImportScanner {
    records: Vec<ImportRecord>,
}

impl ImportScanner {
    fn push(&mut self, source: &StringLiteral<'_>, kind: ImportKind, statement: Span) {
        self.records.push(ImportRecord {
            specifier: source.value.to_string(),
            kind,
            literal_span: source.span.into(),
            statement_span: statement.into(),
            source_location: None,
        });
    }
}

impl<'a> Visit<'a> for ImportScanner {
    fn visit_import_declaration(&mut self, it: &ImportDeclaration<'a>) {
        if !it.import_kind.is_type() {
            self.push(&it.source, ImportKind::Static, it.span);
        }
    }

    fn visit_export_named_declaration(&mut self, it: &ExportNamedDeclaration<'a>) {
        match &it.source {
            Some(source) if !it.export_kind.is_type() => {
                self.push(source, ImportKind::ReExport, it.span);
            }
            Some(_) => {}
            None => walk::walk_export_named_declaration(self, it),
        }
    }

    fn visit_export_all_declaration(&mut self, it: &ExportAllDeclaration<'a>) {
        if !it.export_kind.is_type() {
            self.push(&it.source, ImportKind::ReExport, it.span);
        }
    }

    fn visit_import_expression(&mut self, it: &ImportExpression<'a>) {
        if let Expression::StringLiteral(lit) = &it.source {
            self.push(lit, ImportKind::Dynamic, it.span);
        }
        walk::walk_import_expression(self, it);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JsxRuntime;

    fn run(path: &str, src: &str) -> TransformOutput {
        transform_file(path, src, &JsxConfig::default()).unwrap()
    }

    #[test]
    fn test_file_kinds() {
        assert_eq!(FileKind::from_path("/a.js"), FileKind::Script);
        assert_eq!(FileKind::from_path("/a.JSX"), FileKind::Component);
        assert_eq!(FileKind::from_path("/a.tsx"), FileKind::TypeScriptComponent);
        assert_eq!(FileKind::from_path("/a.css"), FileKind::Style);
        assert_eq!(FileKind::from_path("/data.json"), FileKind::Json);
        assert_eq!(FileKind::from_path("/logo.svg"), FileKind::Asset);
        assert_eq!(FileKind::from_path("/README"), FileKind::Asset);
    }

    #[test]
    fn test_plain_script_passes_through() {
        let src = "import { x } from './x.js';\nexport const y = x + 1;\n";
        let out = run("/a.js", src);
        assert_eq!(out.code, src);
        assert_eq!(out.imports.len(), 1);
        let rec = &out.imports[0];
        assert_eq!(rec.specifier, "./x.js");
        assert_eq!(rec.kind, ImportKind::Static);
        assert_eq!(
            &src[rec.literal_span.start as usize..rec.literal_span.end as usize],
            "'./x.js'"
        );
    }

    #[test]
    fn test_jsx_is_lowered_with_automatic_runtime() {
        let src = r#"import Button from "./Button.jsx";
export default function App() {
  return <div className="app"><Button label="Go" /><span>hi</span></div>;
}
"#;
        let out = run("/App.jsx", src);
        let code = out.code.replace('\'', "\"");
        assert!(!code.contains("<div"), "{}", code);
        assert!(code
            .starts_with("import { jsx as _jsx, jsxs as _jsxs } from \"react/jsx-runtime\";"));
        assert!(code.contains("_jsxs(\"div\""), "{}", code);
        assert!(code.contains("_jsx(Button"), "{}", code);

        let specifiers: Vec<&str> = out.imports.iter().map(|i| i.specifier.as_str()).collect();
        assert_eq!(specifiers, vec!["react/jsx-runtime", "./Button.jsx"]);
        for rec in &out.imports {
            let text = &out.code[rec.literal_span.start as usize..rec.literal_span.end as usize];
            assert!(text.contains(&rec.specifier));
        }
    }

    #[test]
    fn test_classic_runtime_uses_pragma() {
        let config = JsxConfig {
            runtime: JsxRuntime::Classic,
            ..JsxConfig::default()
        };
        let out =
            transform_file("/a.jsx", "export const A = () => <><b>x</b></>;", &config).unwrap();
        let code = out.code.replace('\'', "\"");
        assert!(code.contains("React.createElement(React.Fragment, null"), "{}", code);
        assert!(code.contains("React.createElement(\"b\", null, \"x\")"), "{}", code);
        assert!(!out.code.contains("jsx-runtime"));
    }

    #[test]
    fn test_js_file_with_jsx_is_lowered() {
        let out = run("/App.js", "export default () => <p>hello</p>;");
        let code = out.code.replace('\'', "\"");
        assert!(code.contains("_jsx(\"p\""), "{}", code);
    }

    #[test]
    fn test_typescript_types_are_stripped() {
        let src = "interface Props { n: number }\nexport const double = (p: Props): number => p.n * 2;\n";
        let out = run("/util.ts", src);
        assert!(!out.code.contains("interface"), "{}", out.code);
        assert!(!out.code.contains(": number"), "{}", out.code);
        assert!(out.code.contains("p.n * 2"));
    }

    #[test]
    fn test_import_kinds() {
        let src = r#"import "./side.css";
export { a } from "./a.js";
export * from "./b.js";
const lazy = () => import("./c.js");
const dynamic = (n) => import(n);
"#;
        let out = run("/m.js", src);
        let kinds: Vec<(&str, ImportKind)> = out
            .imports
            .iter()
            .map(|i| (i.specifier.as_str(), i.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("./side.css", ImportKind::Static),
                ("./a.js", ImportKind::ReExport),
                ("./b.js", ImportKind::ReExport),
                ("./c.js", ImportKind::Dynamic),
            ]
        );
    }

    #[test]
    fn test_syntax_error_reports_position() {
        let err = transform_file(
            "/App.js",
            "export default function App() {\n  return 1;\n",
            &JsxConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.file_path, "/App.js");
        assert!(err.line >= 1);
        assert!(err.to_string().starts_with("/App.js:"));
    }

    #[test]
    fn test_spread_children_rejected() {
        let err = transform_file(
            "/a.jsx",
            "const x = <div>{...items}</div>;",
            &JsxConfig::default(),
        )
        .unwrap_err();
        assert!(err.message.contains("Spread children"));
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_non_code_files_are_raw() {
        let out = run("/styles.css", "body { color: red; }");
        assert_eq!(out.kind, FileKind::Style);
        assert_eq!(out.code, "body { color: red; }");
        assert!(out.imports.is_empty());
    }

    #[test]
    fn test_attribute_entities_are_decoded() {
        let out = run("/a.jsx", "export const A = () => <div title=\"a &amp; b\">x &lt; y</div>;");
        let code = out.code.replace('\'', "\"");
        assert!(code.contains("title: \"a & b\""), "{}", code);
        assert!(code.contains("children: \"x < y\""), "{}", code);
    }

    #[test]
    fn test_lowered_imports_keep_written_locations() {
        let src = "import type { T } from \"./types\";\nimport X from \"./Nope\";\nexport const A = (p: T) => <X />;\n";
        let out = run("/App.tsx", src);
        let located: Vec<(&str, Option<SourceLocation>)> = out
            .imports
            .iter()
            .map(|i| (i.specifier.as_str(), i.source_location))
            .collect();
        assert_eq!(
            located,
            vec![
                ("react/jsx-runtime", None),
                ("./Nope", Some(SourceLocation { line: 2, column: 15 })),
            ]
        );
    }
}
