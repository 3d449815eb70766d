use crate::{Span, Type};

use super::TypeCheckError;

/// Static summary of how control leaves a statement or block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Returns {
    /// Falls through without returning
    Never,
    /// Always leaves through a return of this type
    Always(Type),
    /// Returns with this type on some paths and falls through on others
    Maybe(Type),
}

impl Returns {
    /// The type of the return, if there is one at all
    pub fn typ(self) -> Option<Type> {
        match self {
            Returns::Never => None,
            Returns::Always(typ) | Returns::Maybe(typ) => Some(typ),
        }
    }

    /// A return that might be skipped, e.g. inside a loop body
    pub fn demote(self) -> Self {
        match self {
            Returns::Always(typ) => Returns::Maybe(typ),
            other => other,
        }
    }

    /// Return behaviour of `self` followed by `next`
    ///
    /// `span` locates `next`; a statement after a guaranteed return is rejected.
    pub fn sequence(self, next: Returns, span: Span) -> Result<Returns, TypeCheckError> {
        match (self, next) {
            (Returns::Never, next) => Ok(next),
            (Returns::Always(_), _) => Err(TypeCheckError::Unreachable { span }),
            (Returns::Maybe(typ), Returns::Never) => Ok(Returns::Maybe(typ)),
            (Returns::Maybe(typ), Returns::Always(found) | Returns::Maybe(found))
                if found == typ =>
            {
                Ok(next)
            }
            (Returns::Maybe(expected), Returns::Always(found) | Returns::Maybe(found)) => {
                Err(TypeCheckError::InconsistentReturns {
                    expected,
                    found,
                    span,
                })
            }
        }
    }

    /// Return behaviour of two alternative paths, e.g. the branches of an if/else
    pub fn merge_branches(self, other: Returns, span: Span) -> Result<Returns, TypeCheckError> {
        match (self, other) {
            (Returns::Never, other) => Ok(other.demote()),
            (this, Returns::Never) => Ok(this.demote()),
            (Returns::Always(a), Returns::Always(b)) if a == b => Ok(Returns::Always(a)),
            (
                Returns::Always(a) | Returns::Maybe(a),
                Returns::Always(b) | Returns::Maybe(b),
            ) if a == b => Ok(Returns::Maybe(a)),
            (
                Returns::Always(expected) | Returns::Maybe(expected),
                Returns::Always(found) | Returns::Maybe(found),
            ) => Err(TypeCheckError::InconsistentReturns {
                expected,
                found,
                span,
            }),
        }
    }
}
