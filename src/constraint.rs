//! Constraint records as the graph indexes them.
//!
//! Constraints are owned by the constraint system and addressed by
//! [`ConstraintId`]; the graph only reads their kind, operand types, and the
//! cached list of mentioned type variables.

use crate::types::{TypeTerm, TypeVarId};
use smallvec::SmallVec;
use std::fmt;

/// Identifier assigned to constraints registered with the constraint system.
///
/// Identifiers stay resolvable for the lifetime of the system even after a
/// constraint leaves the active/inactive lists; the change journal relies on
/// this to re-add removed constraints when a scope unwinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstraintId(u32);

impl ConstraintId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn to_raw(self) -> u32 {
        self.0
    }
}

/// Relational kinds the graph distinguishes.
///
/// Only two distinctions matter here: the equality-like kinds eligible for
/// edge contraction, and the directional kinds that participate in one-way
/// component ordering instead of merging components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    Bind,
    BindParam,
    BindToPointerType,
    Equal,
    Subtype,
    Conversion,
    Defaultable,
    OneWayBind,
    OneWayBindParam,
}

impl ConstraintKind {
    /// Returns true for directional constraints whose right-hand side must
    /// be solved before the left-hand side.
    pub fn is_one_way(self) -> bool {
        matches!(
            self,
            ConstraintKind::OneWayBind | ConstraintKind::OneWayBindParam
        )
    }

    fn label(self) -> &'static str {
        match self {
            ConstraintKind::Bind => "bind",
            ConstraintKind::BindParam => "bind param",
            ConstraintKind::BindToPointerType => "bind to pointer",
            ConstraintKind::Equal => "equal",
            ConstraintKind::Subtype => "subtype",
            ConstraintKind::Conversion => "conv",
            ConstraintKind::Defaultable => "defaultable",
            ConstraintKind::OneWayBind => "one-way bind",
            ConstraintKind::OneWayBindParam => "one-way bind param",
        }
    }
}

/// A relation between two type terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    kind: ConstraintKind,
    first: TypeTerm,
    second: TypeTerm,
    type_variables: SmallVec<[TypeVarId; 4]>,
}

impl Constraint {
    /// Creates a constraint, caching the unique type variables mentioned by
    /// either operand in first-mention order.
    pub fn new(kind: ConstraintKind, first: TypeTerm, second: TypeTerm) -> Self {
        let mut occurrences: SmallVec<[TypeVarId; 4]> = SmallVec::new();
        first.collect_type_variables(&mut occurrences);
        second.collect_type_variables(&mut occurrences);

        let mut type_variables: SmallVec<[TypeVarId; 4]> = SmallVec::new();
        for var in occurrences {
            if !type_variables.contains(&var) {
                type_variables.push(var);
            }
        }

        Self {
            kind,
            first,
            second,
            type_variables,
        }
    }

    pub fn kind(&self) -> ConstraintKind {
        self.kind
    }

    pub fn first_type(&self) -> &TypeTerm {
        &self.first
    }

    pub fn second_type(&self) -> &TypeTerm {
        &self.second
    }

    /// Every type variable mentioned by the constraint, in first-mention
    /// order. Empty for orphan constraints.
    pub fn type_variables(&self) -> &[TypeVarId] {
        &self.type_variables
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.first, self.kind.label(), self.second)
    }
}
