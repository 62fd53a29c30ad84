//! Parser for type expressions such as `Complex{T} where T<:Real`.

use logos::Logos;
use miette::Diagnostic;
use std::ops::Range;
use thiserror::Error;

use super::{Signature, Type, TypeVar};

/// Error produced when a type expression cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
#[error("invalid type expression `{text}`: {message} (at offset {offset})")]
#[diagnostic(code(stabcheck::types::parse))]
pub struct TypeParseError {
    /// The full text being parsed
    pub text: String,
    /// Byte offset of the offending token
    pub offset: usize,
    /// What went wrong
    pub message: String,
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum Token {
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token("<:")]
    SubtypeOf,
    #[token("where")]
    Where,
    #[regex(r"\$[0-9]+", |lex| lex.slice().to_string())]
    Placeholder(String),
    #[regex(r"[A-Za-z_][A-Za-z0-9_.!]*", |lex| lex.slice().to_string())]
    Ident(String),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::LBrace => "`{`".to_string(),
            Token::RBrace => "`}`".to_string(),
            Token::LParen => "`(`".to_string(),
            Token::RParen => "`)`".to_string(),
            Token::Comma => "`,`".to_string(),
            Token::SubtypeOf => "`<:`".to_string(),
            Token::Where => "`where`".to_string(),
            Token::Placeholder(p) => format!("placeholder `{}`", p),
            Token::Ident(name) => format!("identifier `{}`", name),
        }
    }
}

/// Parse a single type expression
pub fn parse_type(text: &str) -> Result<Type, TypeParseError> {
    let mut parser = TypeParser::new(text)?;
    let ty = parser.parse_type()?;
    if let Some((tok, span)) = parser.peek_spanned() {
        return Err(parser.error_at(span.start, format!("unexpected {}", tok.describe())));
    }
    Ok(ty)
}

/// Parse one type expression per parameter position
pub fn parse_signature<S: AsRef<str>>(params: &[S]) -> Result<Signature, TypeParseError> {
    params
        .iter()
        .map(|p| parse_type(p.as_ref()))
        .collect::<Result<Vec<_>, _>>()
        .map(Signature::new)
}

/// Parse a method signature whose positions may name method-level type
/// parameters (`f(x::T, y::Vector{T}) where T`). References to those
/// parameters come back as free variables.
pub fn parse_generic_signature<S, P>(params: &[S], type_params: &[P]) -> Result<Signature, TypeParseError>
where
    S: AsRef<str>,
    P: AsRef<str>,
{
    let sig = parse_signature(params)?;
    let types: Vec<Type> = sig
        .into_types()
        .into_iter()
        .map(|ty| {
            type_params
                .iter()
                .fold(ty, |ty, param| bind_var(&ty, param.as_ref()))
        })
        .collect();
    Ok(Signature::new(types))
}

struct TypeParser<'a> {
    text: &'a str,
    tokens: Vec<(Token, Range<usize>)>,
    pos: usize,
}

impl<'a> TypeParser<'a> {
    fn new(text: &'a str) -> Result<Self, TypeParseError> {
        let mut tokens = Vec::new();
        let mut lexer = Token::lexer(text);
        while let Some(result) = lexer.next() {
            match result {
                Ok(tok) => tokens.push((tok, lexer.span())),
                Err(()) => {
                    return Err(TypeParseError {
                        text: text.to_string(),
                        offset: lexer.span().start,
                        message: format!("unexpected character `{}`", lexer.slice()),
                    })
                }
            }
        }
        Ok(Self {
            text,
            tokens,
            pos: 0,
        })
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> TypeParseError {
        TypeParseError {
            text: self.text.to_string(),
            offset,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_spanned(&self) -> Option<(&Token, Range<usize>)> {
        self.tokens.get(self.pos).map(|(t, s)| (t, s.clone()))
    }

    fn advance(&mut self) -> Option<(Token, Range<usize>)> {
        let item = self.tokens.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn expect(&mut self, expected: Token) -> Result<(), TypeParseError> {
        match self.advance() {
            Some((tok, _)) if tok == expected => Ok(()),
            Some((tok, span)) => Err(self.error_at(
                span.start,
                format!("expected {}, found {}", expected.describe(), tok.describe()),
            )),
            None => Err(self.error_at(
                self.text.len(),
                format!("expected {}, found end of input", expected.describe()),
            )),
        }
    }

    /// type := primary ('where' IDENT ('<:' primary)?)*
    fn parse_type(&mut self) -> Result<Type, TypeParseError> {
        let mut ty = self.parse_primary()?;
        while self.peek() == Some(&Token::Where) {
            self.advance();
            let name = match self.advance() {
                Some((Token::Ident(name), _)) => name,
                Some((tok, span)) => {
                    return Err(self.error_at(
                        span.start,
                        format!("expected a type variable, found {}", tok.describe()),
                    ))
                }
                None => {
                    return Err(
                        self.error_at(self.text.len(), "expected a type variable after `where`")
                    )
                }
            };
            let upper = if self.peek() == Some(&Token::SubtypeOf) {
                self.advance();
                self.parse_primary()?
            } else {
                Type::Any
            };
            let body = bind_var(&ty, &name);
            ty = Type::exists(TypeVar::new(name, upper), body);
        }
        Ok(ty)
    }

    /// primary := IDENT ('{' args '}')? | PLACEHOLDER | '(' type ')'
    fn parse_primary(&mut self) -> Result<Type, TypeParseError> {
        let Some((tok, span)) = self.advance() else {
            return Err(self.error_at(self.text.len(), "expected a type, found end of input"));
        };
        match tok {
            Token::Placeholder(p) => Ok(Type::Var(p)),
            Token::LParen => {
                let inner = self.parse_type()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) => {
                let args = if self.peek() == Some(&Token::LBrace) {
                    self.advance();
                    Some(self.parse_args()?)
                } else {
                    None
                };
                self.build_named(name, args, span.start)
            }
            other => Err(self.error_at(
                span.start,
                format!("expected a type, found {}", other.describe()),
            )),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Type>, TypeParseError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RBrace) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_type()?);
            match self.advance() {
                Some((Token::Comma, _)) => continue,
                Some((Token::RBrace, _)) => break,
                Some((tok, span)) => {
                    return Err(self.error_at(
                        span.start,
                        format!("expected `,` or `}}`, found {}", tok.describe()),
                    ))
                }
                None => return Err(self.error_at(self.text.len(), "unclosed `{`")),
            }
        }
        Ok(args)
    }

    fn build_named(
        &self,
        name: String,
        args: Option<Vec<Type>>,
        offset: usize,
    ) -> Result<Type, TypeParseError> {
        match (name.as_str(), args) {
            ("Any", None) => Ok(Type::Any),
            ("Box", None) => Ok(Type::Boxed),
            ("Union", Some(members)) => Ok(Type::union(members)),
            ("Vararg", Some(mut elems)) if elems.len() == 1 => Ok(Type::vararg(elems.remove(0))),
            ("Vararg", None) => Ok(Type::vararg(Type::Any)),
            ("Any" | "Box" | "Vararg", Some(_)) => Err(self.error_at(
                offset,
                format!("`{}` takes no type arguments here", name),
            )),
            ("Union", None) => Err(self.error_at(offset, "`Union` requires `{...}`")),
            (_, args) => Ok(Type::applied(name, args.unwrap_or_default())),
        }
    }
}

/// Turn bare references to `name` inside `ty` into variable references.
/// Stops at an inner `where` that rebinds the same name.
fn bind_var(ty: &Type, name: &str) -> Type {
    match ty {
        Type::Nominal { name: n, args } if n == name && args.is_empty() => {
            Type::Var(name.to_string())
        }
        Type::Nominal { name: n, args } => Type::Nominal {
            name: n.clone(),
            args: args.iter().map(|a| bind_var(a, name)).collect(),
        },
        Type::Union(members) => Type::union(members.iter().map(|m| bind_var(m, name))),
        Type::Exists { var, body } => {
            let upper = bind_var(&var.upper, name);
            let body = if var.name == name {
                (**body).clone()
            } else {
                bind_var(body, name)
            };
            Type::exists(TypeVar::new(var.name.clone(), upper), body)
        }
        Type::Vararg(elem) => Type::vararg(bind_var(elem, name)),
        Type::Any | Type::Boxed | Type::Var(_) => ty.clone(),
    }
}
