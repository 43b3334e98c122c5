//! Type variable identities, capability flags, and the structural type terms
//! the graph inspects when tracking incidence.
//!
//! The graph never interprets a type semantically; it only needs to know
//! which type variables a term mentions, whether a term desugars to a bare
//! type variable, and whether an `inout` shape occurs anywhere inside it.

use smallvec::SmallVec;
use std::fmt;

/// Identifier assigned to type variables by the owning constraint system.
///
/// The numeric value doubles as the deterministic tie-break for union-find
/// reparenting during component analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeVarId(u32);

impl TypeVarId {
    /// Creates a type variable identifier from its raw numeric representation.
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw numeric identifier.
    pub fn to_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TypeVarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$T{}", self.0)
    }
}

/// Capability flags carried by a type variable.
///
/// The flags are owned by the constraint system; the graph consults them
/// only when deciding whether an equality-like edge may be contracted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeVarOptions {
    pub can_bind_to_lvalue: bool,
    pub can_bind_to_inout: bool,
}

impl TypeVarOptions {
    pub fn lvalue() -> Self {
        Self {
            can_bind_to_lvalue: true,
            ..Self::default()
        }
    }

    pub fn inout() -> Self {
        Self {
            can_bind_to_inout: true,
            ..Self::default()
        }
    }
}

/// Structural type term as seen by the constraint graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTerm {
    /// A reference to a type variable.
    Var(TypeVarId),
    /// A nominal type applied to zero or more arguments.
    Named { name: String, args: Vec<TypeTerm> },
    /// A tuple of element types.
    Tuple(Vec<TypeTerm>),
    /// A function type.
    Function {
        params: Vec<TypeTerm>,
        result: Box<TypeTerm>,
    },
    /// An `inout` parameter shape.
    InOut(Box<TypeTerm>),
    /// A sugared alias; `desugared` sees through it.
    Alias { name: String, target: Box<TypeTerm> },
}

impl TypeTerm {
    /// Convenience constructor for a type variable reference.
    pub fn var(id: TypeVarId) -> Self {
        TypeTerm::Var(id)
    }

    /// Convenience constructor for a nominal type without arguments.
    pub fn named(name: impl Into<String>) -> Self {
        TypeTerm::Named {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Resolves through alias sugar to the underlying term.
    pub fn desugared(&self) -> &TypeTerm {
        let mut term = self;
        while let TypeTerm::Alias { target, .. } = term {
            term = target;
        }
        term
    }

    /// Returns the referenced type variable when the term is a bare variable.
    pub fn as_type_variable(&self) -> Option<TypeVarId> {
        match self {
            TypeTerm::Var(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns true when the term is an `inout` shape.
    pub fn is_inout(&self) -> bool {
        matches!(self, TypeTerm::InOut(_))
    }

    /// Returns true when any type variable occurs inside the term.
    pub fn has_type_variables(&self) -> bool {
        match self {
            TypeTerm::Var(_) => true,
            TypeTerm::Named { args, .. } => args.iter().any(TypeTerm::has_type_variables),
            TypeTerm::Tuple(elements) => elements.iter().any(TypeTerm::has_type_variables),
            TypeTerm::Function { params, result } => {
                params.iter().any(TypeTerm::has_type_variables) || result.has_type_variables()
            }
            TypeTerm::InOut(inner) => inner.has_type_variables(),
            TypeTerm::Alias { target, .. } => target.has_type_variables(),
        }
    }

    /// Appends every type variable occurrence to `output` in occurrence
    /// order. Duplicates are preserved; callers that need uniqueness dedup
    /// on their side.
    pub fn collect_type_variables(&self, output: &mut SmallVec<[TypeVarId; 4]>) {
        match self {
            TypeTerm::Var(id) => output.push(*id),
            TypeTerm::Named { args, .. } => {
                for arg in args {
                    arg.collect_type_variables(output);
                }
            }
            TypeTerm::Tuple(elements) => {
                for element in elements {
                    element.collect_type_variables(output);
                }
            }
            TypeTerm::Function { params, result } => {
                for param in params {
                    param.collect_type_variables(output);
                }
                result.collect_type_variables(output);
            }
            TypeTerm::InOut(inner) => inner.collect_type_variables(output),
            TypeTerm::Alias { target, .. } => target.collect_type_variables(output),
        }
    }

    /// Returns true when `predicate` holds for any nested term, the term
    /// itself included. Alias wrappers and their targets are both visited.
    pub fn find_if(&self, predicate: &mut impl FnMut(&TypeTerm) -> bool) -> bool {
        if predicate(self) {
            return true;
        }
        match self {
            TypeTerm::Var(_) => false,
            TypeTerm::Named { args, .. } => args.iter().any(|arg| arg.find_if(predicate)),
            TypeTerm::Tuple(elements) => elements.iter().any(|element| element.find_if(predicate)),
            TypeTerm::Function { params, result } => {
                params.iter().any(|param| param.find_if(predicate)) || result.find_if(predicate)
            }
            TypeTerm::InOut(inner) => inner.find_if(predicate),
            TypeTerm::Alias { target, .. } => target.find_if(predicate),
        }
    }
}

impl fmt::Display for TypeTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTerm::Var(id) => write!(f, "{id}"),
            TypeTerm::Named { name, args } => {
                write!(f, "{name}")?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (index, arg) in args.iter().enumerate() {
                        if index > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            TypeTerm::Tuple(elements) => {
                write!(f, "(")?;
                for (index, element) in elements.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, ")")
            }
            TypeTerm::Function { params, result } => {
                write!(f, "(")?;
                for (index, param) in params.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ") -> {result}")
            }
            TypeTerm::InOut(inner) => write!(f, "inout {inner}"),
            TypeTerm::Alias { name, .. } => write!(f, "{name}"),
        }
    }
}
