//! The built-in `modelc` compiler: parses `.cls` class descriptions into
//! structured models and encodes them through the configured codec.
//!
//! One source file declares exactly one top-level type; nested declarations
//! compile to their own outputs under `Outer$Inner` names.

use std::path::Path;
use std::sync::Arc;

use crate::compile::{CompileError, CompiledBatch, CompiledClass, CompilerBackend, Diagnostic};
use crate::core::QualifiedName;
use crate::model::{ClassCodec, ClassKind, ClassModel, FieldModel, MethodModel, Op, TypeRef};
use crate::source::SourceUnit;

pub struct Modelc {
    codec: Arc<dyn ClassCodec>,
}

impl Modelc {
    pub fn new(codec: Arc<dyn ClassCodec>) -> Self {
        Self { codec }
    }
}

impl CompilerBackend for Modelc {
    fn engine(&self) -> &'static str {
        "modelc"
    }

    fn compile(&self, units: &[SourceUnit]) -> Result<CompiledBatch, CompileError> {
        let mut classes = Vec::new();
        let mut diagnostics = Vec::new();
        for unit in units {
            let text = unit
                .source_text()
                .map_err(|e| CompileError::Read(unit.source_file.clone(), e))?;
            match parse_unit(unit, text) {
                Ok(models) => {
                    for model in models {
                        let bytes = self.codec.encode(&model)?;
                        classes.push(CompiledClass {
                            name: model.name.clone(),
                            bytes,
                            output_root: unit.output_dir.clone(),
                        });
                    }
                }
                // Keep going: the batch reports every failed unit at once.
                Err(diag) => diagnostics.push(diag),
            }
        }
        if diagnostics.is_empty() {
            Ok(CompiledBatch { classes })
        } else {
            Err(CompileError::Diagnostics(diagnostics))
        }
    }
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    LBrace,
    RBrace,
    LParen,
    RParen,
    Semi,
    Dot,
    Eof,
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Tok::Ident(s) => format!("`{s}`"),
            Tok::LBrace => "`{`".into(),
            Tok::RBrace => "`}`".into(),
            Tok::LParen => "`(`".into(),
            Tok::RParen => "`)`".into(),
            Tok::Semi => "`;`".into(),
            Tok::Dot => "`.`".into(),
            Tok::Eof => "end of file".into(),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    line: usize,
    col: usize,
}

fn lex(text: &str, file: &Path) -> Result<Vec<Token>, Diagnostic> {
    let mut tokens = Vec::new();
    let mut line = 1usize;
    let mut col = 1usize;
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            '\n' => {
                chars.next();
                line += 1;
                col = 1;
            }
            c if c.is_whitespace() => {
                chars.next();
                col += 1;
            }
            '/' => {
                let start = col;
                chars.next();
                col += 1;
                if chars.peek() != Some(&'/') {
                    return Err(Diagnostic::error(file.to_path_buf(), line, start, "unexpected `/`"));
                }
                while let Some(&c) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                    col += 1;
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = col;
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                        col += 1;
                    } else {
                        break;
                    }
                }
                tokens.push(Token { tok: Tok::Ident(ident), line, col: start });
            }
            _ => {
                let tok = match c {
                    '{' => Tok::LBrace,
                    '}' => Tok::RBrace,
                    '(' => Tok::LParen,
                    ')' => Tok::RParen,
                    ';' => Tok::Semi,
                    '.' => Tok::Dot,
                    other => {
                        return Err(Diagnostic::error(
                            file.to_path_buf(),
                            line,
                            col,
                            format!("unexpected character `{other}`"),
                        ));
                    }
                };
                tokens.push(Token { tok, line, col });
                chars.next();
                col += 1;
            }
        }
    }
    tokens.push(Token { tok: Tok::Eof, line, col });
    Ok(tokens)
}

// ============================================================================
// Parser
// ============================================================================

const KINDS: &[&str] = &["class", "interface", "enum", "annotation"];

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    file: &'a Path,
}

fn parse_unit(unit: &SourceUnit, text: &str) -> Result<Vec<ClassModel>, Diagnostic> {
    let mut parser = Parser {
        tokens: lex(text, &unit.source_file)?,
        pos: 0,
        file: &unit.source_file,
    };

    parser.expect_keyword("package")?;
    let (package, pkg_tok) = parser.dotted("package name")?;
    parser.expect(Tok::Semi)?;
    if package != unit.name.package() {
        return Err(parser.error(
            &pkg_tok,
            format!(
                "package `{package}` does not match the file's directory (expected `{}`)",
                unit.name.package()
            ),
        ));
    }

    let mut models = Vec::new();
    let outer_tok = parser.peek().clone();
    let outer = parser.parse_decl(&package, None, &mut models)?;
    if outer != unit.name.simple_name() {
        return Err(parser.error(
            &outer_tok,
            format!(
                "top-level type `{outer}` does not match the file name (expected `{}`)",
                unit.name.simple_name()
            ),
        ));
    }
    let trailing = parser.peek().clone();
    if trailing.tok != Tok::Eof {
        return Err(parser.error(&trailing, "expected end of file: one top-level type per file"));
    }
    Ok(models)
}

impl Parser<'_> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if token.tok != Tok::Eof {
            self.pos += 1;
        }
        token
    }

    fn error(&self, token: &Token, message: impl Into<String>) -> Diagnostic {
        Diagnostic::error(self.file.to_path_buf(), token.line, token.col, message)
    }

    fn expect(&mut self, tok: Tok) -> Result<Token, Diagnostic> {
        let token = self.advance();
        if token.tok == tok {
            Ok(token)
        } else {
            Err(self.error(
                &token,
                format!("expected {}, found {}", tok.describe(), token.tok.describe()),
            ))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<(String, Token), Diagnostic> {
        let token = self.advance();
        match &token.tok {
            Tok::Ident(s) => Ok((s.clone(), token.clone())),
            other => Err(self.error(&token, format!("expected {what}, found {}", other.describe()))),
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<(), Diagnostic> {
        let (ident, token) = self.expect_ident(&format!("`{kw}`"))?;
        if ident == kw {
            Ok(())
        } else {
            Err(self.error(&token, format!("expected `{kw}`, found `{ident}`")))
        }
    }

    fn peek_ident(&self) -> Option<&str> {
        match &self.peek().tok {
            Tok::Ident(s) => Some(s),
            _ => None,
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.peek_ident() == Some(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// `ident (. ident)*`, returned joined with dots.
    fn dotted(&mut self, what: &str) -> Result<(String, Token), Diagnostic> {
        let (mut name, first) = self.expect_ident(what)?;
        while self.peek().tok == Tok::Dot {
            self.advance();
            let (part, _) = self.expect_ident("name segment")?;
            name.push('.');
            name.push_str(&part);
        }
        Ok((name, first))
    }

    /// One type declaration, recursing into nested ones. Pushes every parsed
    /// model (inner types first) and returns the declared simple name.
    fn parse_decl(
        &mut self,
        package: &str,
        outer: Option<&str>,
        out: &mut Vec<ClassModel>,
    ) -> Result<String, Diagnostic> {
        let entity = self.eat_keyword("entity");
        let (kind_word, kind_tok) = self.expect_ident("type declaration")?;
        let kind = match kind_word.as_str() {
            "class" => ClassKind::Class,
            "interface" => ClassKind::Interface,
            "enum" => ClassKind::Enum,
            "annotation" => ClassKind::Annotation,
            other => {
                return Err(self.error(
                    &kind_tok,
                    format!("expected `class`, `interface`, `enum` or `annotation`, found `{other}`"),
                ));
            }
        };
        if entity && kind != ClassKind::Class {
            return Err(self.error(&kind_tok, "`entity` applies to classes only"));
        }

        let (name, _) = self.expect_ident("type name")?;
        let simple = match outer {
            Some(outer) => format!("{outer}${name}"),
            None => name.clone(),
        };
        let mut model = ClassModel::new(qualify(package, &simple), kind);
        model.entity = entity;

        if self.eat_keyword("extends") {
            let (superclass, _) = self.dotted("superclass name")?;
            model.superclass = Some(resolve(package, &superclass));
        }

        self.expect(Tok::LBrace)?;
        loop {
            let token = self.peek().clone();
            match &token.tok {
                Tok::RBrace => {
                    self.advance();
                    break;
                }
                Tok::Ident(word) if word == "fn" => self.parse_method(&mut model)?,
                Tok::Ident(word) if word == "entity" || KINDS.contains(&word.as_str()) => {
                    self.parse_decl(package, Some(&simple), out)?;
                }
                Tok::Ident(_) => self.parse_field(&mut model)?,
                other => {
                    return Err(self.error(
                        &token,
                        format!("expected a member declaration, found {}", other.describe()),
                    ));
                }
            }
        }

        out.push(model);
        Ok(name)
    }

    fn parse_field(&mut self, model: &mut ClassModel) -> Result<(), Diagnostic> {
        let mut is_final = false;
        let mut inject = false;
        loop {
            if self.eat_keyword("final") {
                is_final = true;
            } else if self.eat_keyword("inject") {
                inject = true;
            } else {
                break;
            }
        }

        let (type_word, _) = self.dotted("field type")?;
        let ty = match type_word.as_str() {
            "bool" => TypeRef::Bool,
            "int" => TypeRef::Int,
            "str" => TypeRef::Str,
            named => TypeRef::Named(named.to_string()),
        };
        let (name, name_tok) = self.expect_ident("field name")?;
        self.expect(Tok::Semi)?;

        if model.field(&name).is_some() {
            return Err(self.error(&name_tok, format!("duplicate field `{name}`")));
        }
        model.fields.push(FieldModel { name, ty, is_final, inject });
        Ok(())
    }

    fn parse_method(&mut self, model: &mut ClassModel) -> Result<(), Diagnostic> {
        self.expect_keyword("fn")?;
        let (name, name_tok) = self.expect_ident("method name")?;
        self.expect(Tok::LParen)?;
        self.expect(Tok::RParen)?;
        self.expect(Tok::LBrace)?;

        let mut body = Vec::new();
        loop {
            let token = self.advance();
            match &token.tok {
                Tok::RBrace => break,
                Tok::Ident(word) => {
                    let op = match word.as_str() {
                        "get" => Op::GetField(self.expect_ident("field name")?.0),
                        "set" => Op::SetField(self.expect_ident("field name")?.0),
                        "call" => Op::Call(self.dotted("call target")?.0),
                        other => {
                            return Err(self.error(
                                &token,
                                format!("unknown statement `{other}`, expected `get`, `set` or `call`"),
                            ));
                        }
                    };
                    self.expect(Tok::Semi)?;
                    body.push(op);
                }
                other => {
                    return Err(self.error(
                        &token,
                        format!("expected a statement or `}}`, found {}", other.describe()),
                    ));
                }
            }
        }

        if model.has_method(&name) {
            return Err(self.error(&name_tok, format!("duplicate method `{name}`")));
        }
        model.methods.push(MethodModel::new(name, body));
        Ok(())
    }
}

fn qualify(package: &str, simple: &str) -> QualifiedName {
    if package.is_empty() {
        QualifiedName::new(simple)
    } else {
        QualifiedName::new(format!("{package}.{simple}"))
    }
}

/// Resolve a possibly-unqualified reference: dotted names stand as written,
/// plain names live in the declaring package.
fn resolve(package: &str, name: &str) -> QualifiedName {
    if name.contains('.') {
        QualifiedName::new(name)
    } else {
        qualify(package, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JsonCodec;

    fn compile_one(name: &str, text: &str) -> Result<Vec<ClassModel>, CompileError> {
        let unit = SourceUnit::with_text(name, text);
        let batch = Modelc::new(Arc::new(JsonCodec)).compile(std::slice::from_ref(&unit))?;
        Ok(batch
            .classes
            .iter()
            .map(|c| JsonCodec.decode(&c.bytes).unwrap())
            .collect())
    }

    #[test]
    fn test_full_declaration() {
        let models = compile_one(
            "com.example.Account",
            r#"
            package com.example;

            // A persistent account.
            entity class Account extends base.Record {
                final str owner;
                inject audit.Logger logger;
                bool active;

                fn describe() {
                    get owner;
                    call logger.write;
                }
            }
            "#,
        )
        .unwrap();

        assert_eq!(models.len(), 1);
        let model = &models[0];
        assert_eq!(model.name.as_str(), "com.example.Account");
        assert!(model.entity);
        assert_eq!(model.superclass.as_ref().unwrap().as_str(), "base.Record");
        assert_eq!(model.fields.len(), 3);
        assert!(model.field("owner").unwrap().is_final);
        assert!(model.field("logger").unwrap().inject);
        assert_eq!(model.field("active").unwrap().ty, TypeRef::Bool);
        assert_eq!(
            model.method("describe").unwrap().body,
            vec![Op::GetField("owner".into()), Op::Call("logger.write".into())]
        );
    }

    #[test]
    fn test_inner_types_get_dollar_names() {
        let models = compile_one(
            "com.example.Outer",
            "package com.example;\n\
             class Outer {\n\
               int x;\n\
               class Inner {\n\
                 class Deep { }\n\
               }\n\
             }\n",
        )
        .unwrap();

        let names: Vec<_> = models.iter().map(|m| m.name.as_str()).collect();
        assert!(names.contains(&"com.example.Outer"));
        assert!(names.contains(&"com.example.Outer$Inner"));
        assert!(names.contains(&"com.example.Outer$Inner$Deep"));
    }

    #[test]
    fn test_plain_superclass_resolves_in_package() {
        let models = compile_one(
            "com.example.Foo",
            "package com.example;\nclass Foo extends Base { }\n",
        )
        .unwrap();
        assert_eq!(
            models[0].superclass.as_ref().unwrap().as_str(),
            "com.example.Base"
        );
    }

    #[test]
    fn test_missing_semicolon_positions_diagnostic() {
        let err = compile_one(
            "com.example.Foo",
            "package com.example;\nclass Foo {\n  int x\n}\n",
        )
        .unwrap_err();
        let diag = err.primary().unwrap().clone();
        assert_eq!((diag.line, diag.col), (4, 1));
        assert!(diag.message.contains("expected `;`"));
    }

    #[test]
    fn test_package_mismatch_rejected() {
        let err = compile_one("com.example.Foo", "package com.other;\nclass Foo { }\n")
            .unwrap_err();
        assert!(err.primary().unwrap().message.contains("does not match"));
    }

    #[test]
    fn test_wrong_type_name_rejected() {
        let err = compile_one("com.example.Foo", "package com.example;\nclass Bar { }\n")
            .unwrap_err();
        assert!(err.primary().unwrap().message.contains("`Bar`"));
    }

    #[test]
    fn test_entity_interface_rejected() {
        let err = compile_one("com.example.Foo", "package com.example;\nentity interface Foo { }\n")
            .unwrap_err();
        assert!(err.primary().unwrap().message.contains("classes only"));
    }

    #[test]
    fn test_batch_collects_all_failures() {
        let good = SourceUnit::with_text("a.Good", "package a;\nclass Good { }\n");
        let bad1 = SourceUnit::with_text("a.BadOne", "package a;\nclass BadOne { int }\n");
        let bad2 = SourceUnit::with_text("a.BadTwo", "package a;\nklass BadTwo { }\n");

        let err = Modelc::new(Arc::new(JsonCodec))
            .compile(&[good, bad1, bad2])
            .unwrap_err();
        match err {
            CompileError::Diagnostics(diags) => assert_eq!(diags.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }
}
