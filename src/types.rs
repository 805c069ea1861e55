//! # Common Types for Model Counting
//!
//! Common types used throughout the library to guarantee type safety.

use std::{collections::BTreeMap, fmt, ops};

use thiserror::Error;

pub mod constraints;
pub mod number;
pub use constraints::{Clause, Constraint, ConstraintKind, PbComparator, PbConstraint, XorConstraint};
pub use number::{Number, NumberMode};

/// Type representing boolean variables. Variable indexing starts from 0 and
/// the maximum index is `(u32::MAX - 1) / 2`. This is because literals are
/// represented as a single `u32` as well. The memory representation of
/// variables is `u32`.
#[derive(Hash, Eq, PartialEq, PartialOrd, Clone, Copy, Ord, Debug)]
#[repr(transparent)]
pub struct Var {
    idx: u32,
}

impl Var {
    /// The maximum index that can be represented.
    pub const MAX_IDX: u32 = (u32::MAX - 1) / 2;

    /// Creates a new variable with a given index.
    /// Indices start from 0.
    /// Panics if `idx > Var::MAX_IDX`.
    pub fn new(idx: u32) -> Var {
        if idx > Var::MAX_IDX {
            panic!("variable index too high")
        }
        Var { idx }
    }

    /// Creates a new variable with a given index.
    /// Indices start from 0.
    /// Returns `Err(TypeError::IdxTooHigh(idx, Var::MAX_IDX))` if
    /// `idx > Var::MAX_IDX`.
    pub fn new_with_error(idx: u32) -> Result<Var, TypeError> {
        if idx > Var::MAX_IDX {
            return Err(TypeError::IdxTooHigh(idx, Var::MAX_IDX));
        }
        Ok(Var { idx })
    }

    /// Creates a new variable with a given index.
    /// Does not perform any check on the index, therefore might produce an inconsistent variable.
    /// Only use this for performance reasons if you are sure that `idx <= Var::MAX_IDX`.
    #[inline]
    pub fn new_unchecked(idx: u32) -> Var {
        Var { idx }
    }

    /// Creates a variable from its 1-based DIMACS index.
    pub fn from_dimacs(val: i64) -> Result<Var, TypeError> {
        if val < 1 {
            return Err(TypeError::DimacsVar(val));
        }
        let idx: u32 = (val - 1)
            .try_into()
            .map_err(|_| TypeError::DimacsVar(val))?;
        Var::new_with_error(idx)
    }

    /// Creates a literal that is not negated.
    ///
    /// # Examples
    ///
    /// ```
    /// use jtcount::types::{Var, Lit};
    ///
    /// let var = Var::new(5);
    /// let lit = Lit::positive(5);
    ///
    /// assert_eq!(lit, var.pos_lit());
    /// ```
    #[inline]
    pub fn pos_lit(self) -> Lit {
        Lit::positive_unchecked(self.idx)
    }

    /// Creates a negated literal.
    #[inline]
    pub fn neg_lit(self) -> Lit {
        Lit::negative_unchecked(self.idx)
    }

    /// Returns the index of the variable. This is a `usize` to enable easier
    /// indexing of data structures like vectors, even though the internal
    /// representation of a variable is `u32`. For the 32 bit index use
    /// [`Var::idx32`].
    #[inline]
    pub fn idx(&self) -> usize {
        self.idx as usize
    }

    /// Returns the 32 bit index of the variable.
    #[inline]
    pub fn idx32(&self) -> u32 {
        self.idx
    }

    /// Converts the variable to its 1-based DIMACS index.
    pub fn to_dimacs(self) -> i64 {
        self.idx as i64 + 1
    }
}

/// Incrementing variables
impl ops::Add<u32> for Var {
    type Output = Var;

    fn add(self, rhs: u32) -> Self::Output {
        Var {
            idx: self.idx + rhs,
        }
    }
}

/// Decrementing variables
impl ops::Sub<u32> for Var {
    type Output = Var;

    fn sub(self, rhs: u32) -> Self::Output {
        Var {
            idx: self.idx - rhs,
        }
    }
}

/// Variables can be printed with the [`Display`](std::fmt::Display) trait
impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.idx)
    }
}

/// More easily creates variables. Mainly used in tests.
///
/// # Examples
///
/// ```
/// use jtcount::{var, types::Var};
///
/// assert_eq!(var![42], Var::new(42));
/// ```
#[macro_export]
macro_rules! var {
    ($v:expr) => {
        $crate::types::Var::new($v)
    };
}

/// Type representing literals, possibly negated boolean variables.
#[derive(Hash, Eq, PartialEq, PartialOrd, Ord, Clone, Copy, Debug)]
#[repr(transparent)]
pub struct Lit {
    /// Literal representation is `idx << 1` with the last bit representing
    /// whether the literal is negated or not. This way the literal can directly
    /// be used to index data structures with the two literals of a variable
    /// being close together.
    lidx: u32,
}

impl Lit {
    /// Represents a literal in memory
    #[inline]
    fn represent(idx: u32, negated: bool) -> u32 {
        (idx << 1) + (negated as u32)
    }

    /// Creates a new (negated or not) literal with a given index.
    /// Panics if `idx > Var::MAX_IDX`.
    pub fn new(idx: u32, negated: bool) -> Lit {
        if idx > Var::MAX_IDX {
            panic!("variable index too high")
        }
        Lit {
            lidx: Lit::represent(idx, negated),
        }
    }

    /// Creates a new (negated or not) literal with a given index.
    /// Returns `Err(TypeError::IdxTooHigh(idx, Var::MAX_IDX))` if
    /// `idx > Var::MAX_IDX`.
    pub fn new_with_error(idx: u32, negated: bool) -> Result<Lit, TypeError> {
        if idx > Var::MAX_IDX {
            return Err(TypeError::IdxTooHigh(idx, Var::MAX_IDX));
        }
        Ok(Lit {
            lidx: Lit::represent(idx, negated),
        })
    }

    /// Creates a new (negated or not) literal with a given index.
    /// Does not perform any check on the index, therefore might produce an inconsistent literal.
    /// Only use this for performance reasons if you are sure that `idx <= Var::MAX_IDX`.
    pub fn new_unchecked(idx: u32, negated: bool) -> Lit {
        Lit {
            lidx: Lit::represent(idx, negated),
        }
    }

    /// Creates a new positive literal with a given index.
    /// Panics if `idx > Var::MAX_IDX`.
    #[inline]
    pub fn positive(idx: u32) -> Lit {
        Lit::new(idx, false)
    }

    /// Creates a new negated literal with a given index.
    /// Panics if `idx > Var::MAX_IDX`.
    #[inline]
    pub fn negative(idx: u32) -> Lit {
        Lit::new(idx, true)
    }

    /// Creates a new positive literal with a given index.
    /// Does not perform any check on the index, therefore might produce an inconsistent literal.
    /// Only use this for performance reasons if you are sure that `idx <= Var::MAX_IDX`.
    #[inline]
    pub fn positive_unchecked(idx: u32) -> Lit {
        Lit::new_unchecked(idx, false)
    }

    /// Creates a new negated literal with a given index.
    /// Does not perform any check on the index, therefore might produce an inconsistent literal.
    /// Only use this for performance reasons if you are sure that `idx <= Var::MAX_IDX`.
    #[inline]
    pub fn negative_unchecked(idx: u32) -> Lit {
        Lit::new_unchecked(idx, true)
    }

    /// Creates a literal from a signed DIMACS integer value. Returns an error
    /// if the value is zero or the index too high.
    pub fn from_dimacs(val: i64) -> Result<Lit, TypeError> {
        if val == 0 {
            return Err(TypeError::DimacsZero);
        }
        let negated = val < 0;
        let idx: u32 = (val.unsigned_abs() - 1)
            .try_into()
            .map_err(|_| TypeError::DimacsVar(val))?;
        Lit::new_with_error(idx, negated)
    }

    /// Gets the variable index of the literal
    #[inline]
    pub fn vidx(&self) -> usize {
        (self.lidx >> 1) as usize
    }

    /// Gets the 32bit variable index of the literal
    #[inline]
    pub fn vidx32(&self) -> u32 {
        self.lidx >> 1
    }

    /// Gets a literal representation for indexing data structures
    #[inline]
    pub fn lidx(&self) -> usize {
        self.lidx as usize
    }

    /// Gets the variable that the literal corresponds to.
    ///
    /// # Examples
    ///
    /// ```
    /// use jtcount::types::{Var, Lit};
    ///
    /// let var = Var::new(5);
    /// let lit = Lit::negative(5);
    ///
    /// assert_eq!(var, lit.var());
    /// ```
    #[inline]
    pub fn var(&self) -> Var {
        Var::new_unchecked(self.vidx32())
    }

    /// True if the literal is positive.
    #[inline]
    pub fn is_pos(&self) -> bool {
        (self.lidx & 1u32) == 0
    }

    /// True if the literal is negated.
    #[inline]
    pub fn is_neg(&self) -> bool {
        (self.lidx & 1u32) == 1
    }

    /// Converts the literal to a signed DIMACS integer. The DIMACS literal has
    /// the variable index plus one and is negative if the literal is negated.
    pub fn to_dimacs(self) -> i64 {
        let idx = self.vidx() as i64 + 1;
        if self.is_neg() {
            -idx
        } else {
            idx
        }
    }
}

/// Trait implementation allowing for negating literals with the `!` operator.
impl ops::Not for Lit {
    type Output = Lit;

    #[inline]
    fn not(self) -> Lit {
        Lit {
            lidx: self.lidx ^ 1u32,
        }
    }
}

/// Trait implementation allowing for negating literals with the unary `-` operator.
impl ops::Neg for Lit {
    type Output = Lit;

    #[inline]
    fn neg(self) -> Lit {
        Lit {
            lidx: self.lidx ^ 1u32,
        }
    }
}

/// Literals can be printed with the [`Display`](std::fmt::Display) trait
impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.is_neg() {
            true => write!(f, "~x{}", self.vidx()),
            false => write!(f, "x{}", self.vidx()),
        }
    }
}

/// More easily creates literals. Mainly used in tests.
///
/// # Examples
///
/// ```
/// use jtcount::{lit, types::Lit};
///
/// assert_eq!(lit![42], Lit::positive(42));
/// assert_eq!(!lit![42], Lit::negative(42));
/// ```
#[macro_export]
macro_rules! lit {
    ($l:expr) => {
        $crate::types::Lit::positive($l)
    };
}

/// More easily creates literals with DIMACS indexing (starts from 1) and
/// negation (negative value is negation). Mainly used in tests.
///
/// # Examples
///
/// ```
/// use jtcount::{lit, dimacs_lit, types::Lit};
///
/// assert_eq!(dimacs_lit![42], lit![41]);
/// assert_eq!(dimacs_lit![-42], !lit![41]);
/// ```
#[macro_export]
macro_rules! dimacs_lit {
    ($l:expr) => {
        $crate::types::Lit::from_dimacs($l).unwrap()
    };
}

/// Type representing a partial assignment of variables to truth values.
///
/// Variables are kept in ascending order, so iteration and printing are
/// deterministic.
#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct Assignment {
    assignment: BTreeMap<Var, bool>,
}

impl Assignment {
    /// Creates a new empty assignment
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an assignment binding a single variable
    pub fn singleton(var: Var, val: bool) -> Self {
        let mut assignment = Assignment::default();
        assignment.assign_var(var, val);
        assignment
    }

    /// Get the value that the assignment binds a variable to, if any.
    pub fn var_value(&self, var: Var) -> Option<bool> {
        self.assignment.get(&var).copied()
    }

    /// Same as [`Assignment::var_value`], but for literals.
    pub fn lit_value(&self, lit: Lit) -> Option<bool> {
        self.var_value(lit.var())
            .map(|val| if lit.is_neg() { !val } else { val })
    }

    /// Binds a variable in the assignment
    pub fn assign_var(&mut self, var: Var, val: bool) {
        self.assignment.insert(var, val);
    }

    /// Checks whether a variable is bound
    pub fn contains_var(&self, var: Var) -> bool {
        self.assignment.contains_key(&var)
    }

    /// Gets the number of bound variables
    pub fn len(&self) -> usize {
        self.assignment.len()
    }

    /// Checks if no variable is bound
    pub fn is_empty(&self) -> bool {
        self.assignment.is_empty()
    }

    /// Iterates over the bound variables in ascending order
    pub fn vars(&self) -> impl Iterator<Item = Var> + '_ {
        self.assignment.keys().copied()
    }

    /// Extends every assignment in `assignments` by the variable `var`, once
    /// bound to false and once bound to true. The result has `2 * n`
    /// assignments for `n` inputs (or 2 for an empty input), and each input
    /// yields its false-extension immediately followed by its true-extension.
    pub fn extend_assignments(assignments: Vec<Assignment>, var: Var) -> Vec<Assignment> {
        if assignments.is_empty() {
            return vec![
                Assignment::singleton(var, false),
                Assignment::singleton(var, true),
            ];
        }
        let mut extended = Vec::with_capacity(2 * assignments.len());
        for mut assignment in assignments {
            assignment.assign_var(var, false);
            extended.push(assignment.clone());
            assignment.assign_var(var, true);
            extended.push(assignment);
        }
        extended
    }
}

/// Assignments print as signed DIMACS literals in ascending variable order
impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (var, val)) in self.assignment.iter().enumerate() {
            if i != 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", if *val { var.to_dimacs() } else { -var.to_dimacs() })?;
        }
        Ok(())
    }
}

impl FromIterator<(Var, bool)> for Assignment {
    fn from_iter<T: IntoIterator<Item = (Var, bool)>>(iter: T) -> Self {
        Self {
            assignment: BTreeMap::from_iter(iter),
        }
    }
}

/// Errors related to types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TypeError {
    /// The requested index is too high.
    /// Contains the requested and the maximum index.
    #[error("index {0} is too high (maximum {1})")]
    IdxTooHigh(u32, u32),
    /// DIMACS index is zero
    #[error("zero is an invalid DIMACS literal")]
    DimacsZero,
    /// DIMACS variable out of representable range
    #[error("{0} is an invalid DIMACS variable")]
    DimacsVar(i64),
}

/// An iterator over integer-weighted literals
pub trait IWLitIter: IntoIterator<Item = (Lit, isize)> {}
impl<I: IntoIterator<Item = (Lit, isize)>> IWLitIter for I {}

#[cfg(test)]
mod tests {
    use std::mem::size_of;

    use super::{Assignment, Lit, Var};

    #[test]
    fn var_index() {
        let idx = 5;
        let var = Var::new(idx);
        assert_eq!(var.idx(), idx as usize);
        assert_eq!(var.idx32(), idx);
    }

    #[test]
    fn var_pos_lit() {
        let idx = 5;
        let var = Var::new(idx);
        let lit = Lit::positive(idx);
        assert_eq!(var.pos_lit(), lit);
    }

    #[test]
    fn var_neg_lit() {
        let idx = 5;
        let var = Var::new(idx);
        let lit = Lit::negative(idx);
        assert_eq!(var.neg_lit(), lit);
    }

    #[test]
    fn lit_representation() {
        let lidx = Lit::represent(5, true);
        assert_eq!(lidx, 0b1011);
    }

    #[test]
    fn lit_is_pos() {
        let lit = Lit::positive(0);
        assert!(lit.is_pos());
        assert!(!lit.is_neg());
    }

    #[test]
    fn lit_negation() {
        let lit1 = Lit::positive(0);
        let lit2 = !lit1;
        assert!(!lit2.is_pos());
        assert!(lit2.is_neg());
        assert_eq!(lit1.var(), lit2.var());
    }

    #[test]
    fn dimacs_lit_round_trip() {
        let lit = Lit::positive(5);
        assert_eq!(lit.to_dimacs(), 6);
        assert_eq!(Lit::from_dimacs(6).unwrap(), lit);
        let lit = !lit;
        assert_eq!(lit.to_dimacs(), -6);
        assert_eq!(Lit::from_dimacs(-6).unwrap(), lit);
    }

    #[test]
    fn dimacs_lit_not_zero() {
        assert!(Lit::from_dimacs(0).is_err());
    }

    #[test]
    fn dimacs_var_one_based() {
        assert_eq!(Var::from_dimacs(1).unwrap(), Var::new(0));
        assert!(Var::from_dimacs(0).is_err());
        assert!(Var::from_dimacs(-3).is_err());
    }

    #[test]
    fn assignment_values() {
        let mut assign = Assignment::new();
        assign.assign_var(var![0], true);
        assign.assign_var(var![1], false);
        assert_eq!(assign.var_value(var![0]), Some(true));
        assert_eq!(assign.var_value(var![1]), Some(false));
        assert_eq!(assign.var_value(var![2]), None);
        assert_eq!(assign.lit_value(!lit![0]), Some(false));
        assert_eq!(assign.lit_value(!lit![1]), Some(true));
        assert_eq!(assign.lit_value(lit![2]), None);
    }

    #[test]
    fn assignment_extension_from_empty() {
        let extended = Assignment::extend_assignments(vec![], var![3]);
        assert_eq!(extended.len(), 2);
        assert_eq!(extended[0].var_value(var![3]), Some(false));
        assert_eq!(extended[1].var_value(var![3]), Some(true));
    }

    #[test]
    fn assignment_extension_doubles() {
        let base = Assignment::extend_assignments(vec![], var![0]);
        let extended = Assignment::extend_assignments(base, var![1]);
        assert_eq!(extended.len(), 4);
        // stable order: each input yields false then true
        assert_eq!(extended[0].var_value(var![0]), Some(false));
        assert_eq!(extended[0].var_value(var![1]), Some(false));
        assert_eq!(extended[1].var_value(var![0]), Some(false));
        assert_eq!(extended[1].var_value(var![1]), Some(true));
        assert_eq!(extended[2].var_value(var![0]), Some(true));
        assert_eq!(extended[2].var_value(var![1]), Some(false));
        assert_eq!(extended[3].var_value(var![0]), Some(true));
        assert_eq!(extended[3].var_value(var![1]), Some(true));
    }

    #[test]
    fn assignment_display() {
        let assign = Assignment::from_iter(vec![(var![0], true), (var![2], false)]);
        assert_eq!(format!("{}", assign), "1 -3");
    }

    #[test]
    fn var_mem_size() {
        assert_eq!(size_of::<Var>(), size_of::<u32>());
    }

    #[test]
    fn lit_mem_size() {
        assert_eq!(size_of::<Lit>(), size_of::<u32>());
    }
}
