//! `${...}` placeholder parsing, shared by
//! the Cypher emitter and the native engine's command-string substitution
//! (stage 9).

use std::fmt::{Display, Formatter, Result as FmtResult};

/// What a single `${...}` token in a template's `Commands`/`Cypher` strings
/// binds to, resolved against a template's own `Depends`/`Affects`/`Grants`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Placeholder {
    /// `${}` — the attacking source node.
    Source,
    /// `${<Affects>}` — the target node.
    Target,
    /// `${<Depends>}` — the dependency/option node.
    Option,
    /// `${<Grants>}` — the granted capability node.
    Grant,
    /// Any other `${AWS::...}` — a fresh typed match variable, not bound to
    /// any of the other four roles.
    TypedVar(String),
}

impl Placeholder {
    /// Resolve a raw `${...}` token (without the surrounding braces) against
    /// a template's role-bearing resource types.
    pub fn resolve(token: &str, depends: Option<&str>, affects: &str, grants: Option<&str>) -> Self {
        if token.is_empty() {
            return Self::Source;
        }
        if token == affects {
            return Self::Target;
        }
        if Some(token) == depends {
            return Self::Option;
        }
        if Some(token) == grants {
            return Self::Grant;
        }
        Self::TypedVar(token.to_string())
    }
}

impl Display for Placeholder {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Source => write!(f, "${{}}"),
            Self::Target => write!(f, "${{target}}"),
            Self::Option => write!(f, "${{option}}"),
            Self::Grant => write!(f, "${{grant}}"),
            Self::TypedVar(t) => write!(f, "${{{}}}", t),
        }
    }
}

/// A `${<type>}[.Field]` reference inside one of a template's `Commands`
/// entries, as stage 9 needs it: the placeholder's role plus the optional
/// trailing field (defaulting to `Name`).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandPlaceholder {
    pub placeholder: Placeholder,
    pub field: String,
    /// The full matched text (`${AWS::Iam::Policy}.Arn`), so callers can do a
    /// literal string replacement without re-deriving it.
    pub raw: String,
}

/// Extract every `${...}[.Field]` occurrence from a command string.
pub fn parse_command(command: &str, depends: Option<&str>, affects: &str, grants: Option<&str>) -> Vec<CommandPlaceholder> {
    let mut out = Vec::new();
    let bytes = command.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() && bytes[i + 1] == b'{' {
            if let Some(close) = command[i..].find('}') {
                let token_end = i + close;
                let token = &command[i + 2..token_end];
                let mut end = token_end + 1;
                let mut field = "Name".to_string();
                if command[end..].starts_with('.') {
                    let rest = &command[end + 1..];
                    let field_len = rest.find(|c: char| !(c.is_alphanumeric() || c == '_')).unwrap_or(rest.len());
                    if field_len > 0 {
                        field = rest[..field_len].to_string();
                        end += 1 + field_len;
                    }
                }
                out.push(CommandPlaceholder {
                    placeholder: Placeholder::resolve(token, depends, affects, grants),
                    field,
                    raw: command[i..end].to_string(),
                });
                i = end;
                continue;
            }
        }
        i += 1;
    }
    out
}
