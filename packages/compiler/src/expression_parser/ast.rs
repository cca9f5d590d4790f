//! Binding Expression AST

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    Plus,
    Minus,
    Equals,
    NotEquals,
    And,
    Or,
}

impl BinaryOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Equals => "==",
            BinaryOperator::NotEquals => "!=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Ast {
    /// The component (or local) scope a bare name is read from.
    ImplicitReceiver,
    Literal(Value),
    PropertyRead {
        receiver: Box<Ast>,
        name: String,
    },
    MethodCall {
        receiver: Box<Ast>,
        name: String,
        args: Vec<Ast>,
    },
    Binary {
        operation: BinaryOperator,
        left: Box<Ast>,
        right: Box<Ast>,
    },
    PrefixNot(Box<Ast>),
    Conditional {
        condition: Box<Ast>,
        true_exp: Box<Ast>,
        false_exp: Box<Ast>,
    },
    /// `strings.len() == expressions.len() + 1`.
    Interpolation {
        strings: Vec<String>,
        expressions: Vec<Ast>,
    },
    Pipe {
        exp: Box<Ast>,
        name: String,
        args: Vec<Ast>,
    },
}

impl Ast {
    /// A bare name read from the implicit receiver.
    pub fn property(name: impl Into<String>) -> Self {
        Ast::PropertyRead {
            receiver: Box::new(Ast::ImplicitReceiver),
            name: name.into(),
        }
    }

    pub fn property_of(receiver: Ast, name: impl Into<String>) -> Self {
        Ast::PropertyRead {
            receiver: Box::new(receiver),
            name: name.into(),
        }
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Ast::Literal(value.into())
    }

    pub fn method_call(name: impl Into<String>, args: Vec<Ast>) -> Self {
        Ast::MethodCall {
            receiver: Box::new(Ast::ImplicitReceiver),
            name: name.into(),
            args,
        }
    }

    pub fn binary(operation: BinaryOperator, left: Ast, right: Ast) -> Self {
        Ast::Binary {
            operation,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn interpolation<S: Into<String>>(strings: Vec<S>, expressions: Vec<Ast>) -> Self {
        Ast::Interpolation {
            strings: strings.into_iter().map(Into::into).collect(),
            expressions,
        }
    }

    pub fn pipe(exp: Ast, name: impl Into<String>, args: Vec<Ast>) -> Self {
        Ast::Pipe {
            exp: Box::new(exp),
            name: name.into(),
            args,
        }
    }

    /// Names of every pipe used, in evaluation order.
    pub fn pipe_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_pipe_names(&mut names);
        names
    }

    fn collect_pipe_names(&self, names: &mut Vec<String>) {
        match self {
            Ast::ImplicitReceiver | Ast::Literal(_) => {}
            Ast::PropertyRead { receiver, .. } => receiver.collect_pipe_names(names),
            Ast::MethodCall { receiver, args, .. } => {
                receiver.collect_pipe_names(names);
                args.iter().for_each(|a| a.collect_pipe_names(names));
            }
            Ast::Binary { left, right, .. } => {
                left.collect_pipe_names(names);
                right.collect_pipe_names(names);
            }
            Ast::PrefixNot(exp) => exp.collect_pipe_names(names),
            Ast::Conditional {
                condition,
                true_exp,
                false_exp,
            } => {
                condition.collect_pipe_names(names);
                true_exp.collect_pipe_names(names);
                false_exp.collect_pipe_names(names);
            }
            Ast::Interpolation { expressions, .. } => {
                expressions.iter().for_each(|e| e.collect_pipe_names(names))
            }
            Ast::Pipe { exp, name, args } => {
                exp.collect_pipe_names(names);
                args.iter().for_each(|a| a.collect_pipe_names(names));
                names.push(name.clone());
            }
        }
    }
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ast::ImplicitReceiver => Ok(()),
            Ast::Literal(Value::String(s)) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Ast::Literal(value) => write!(f, "{}", value),
            Ast::PropertyRead { receiver, name } => match **receiver {
                Ast::ImplicitReceiver => write!(f, "{}", name),
                _ => write!(f, "{}.{}", receiver, name),
            },
            Ast::MethodCall {
                receiver,
                name,
                args,
            } => {
                if !matches!(**receiver, Ast::ImplicitReceiver) {
                    write!(f, "{}.", receiver)?;
                }
                write!(f, "{}({})", name, join(args, ", "))
            }
            Ast::Binary {
                operation,
                left,
                right,
            } => write!(f, "{} {} {}", left, operation.as_str(), right),
            Ast::PrefixNot(exp) => write!(f, "!{}", exp),
            Ast::Conditional {
                condition,
                true_exp,
                false_exp,
            } => write!(f, "{} ? {} : {}", condition, true_exp, false_exp),
            Ast::Interpolation {
                strings,
                expressions,
            } => {
                for (i, s) in strings.iter().enumerate() {
                    write!(f, "{}", s)?;
                    if let Some(exp) = expressions.get(i) {
                        write!(f, "{{{{{}}}}}", exp)?;
                    }
                }
                Ok(())
            }
            Ast::Pipe { exp, name, args } => {
                write!(f, "({} | {}", exp, name)?;
                for arg in args {
                    write!(f, ":{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

fn join(asts: &[Ast], separator: &str) -> String {
    asts.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(separator)
}

/// A parsed expression with the text it was parsed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AstWithSource {
    pub ast: Ast,
    pub source: String,
    pub location: String,
}

impl AstWithSource {
    pub fn new(ast: Ast, source: impl Into<String>, location: impl Into<String>) -> Self {
        AstWithSource {
            ast,
            source: source.into(),
            location: location.into(),
        }
    }

    /// Wrap an AST whose source text is its own serialization.
    pub fn from_ast(ast: Ast, location: impl Into<String>) -> Self {
        let source = ast.to_string();
        AstWithSource::new(ast, source, location)
    }
}

impl fmt::Display for AstWithSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}
