//! Unification over arrow sorts.
//!
//! A sort is either `*` or `(s1, ..., sn) -> *`, that is, the shape of a
//! grammar symbol that expects `n` parameters. Variables live in an arena
//! owned by [`SortUnifier`] and are merged by union-find; a bound variable
//! carries the operands of its arrow node as child variables, so no
//! pointer cycles are needed.

use crate::util::write_separated;
use std::fmt;

/// A handle to a sort variable in a [`SortUnifier`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Variable {
    raw: u32,
}

impl Variable {
    #[inline]
    fn index(self) -> usize {
        self.raw as usize
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.raw)
    }
}

#[derive(Debug, Clone)]
enum Cell {
    /// Not a representative; points toward one.
    Link(Variable),
    /// A representative, either unconstrained or bound to an arrow node.
    Root(Option<Vec<Variable>>),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnifyError {
    /// The two variables stand for arrows of different arities.
    #[error("cannot unify the sorts {0} and {1}")]
    Unify(Variable, Variable),

    /// Unifying the two variables would produce a cyclic sort.
    #[error("the sort {0} would occur in {1}")]
    Occurs(Variable, Variable),
}

/// The variable pool of a [`SortUnifier`] is exhausted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[error("too many sort variables")]
pub struct TooManyVariables;

/// The variable pool of a sort inference run.
#[derive(Debug)]
pub struct SortUnifier {
    cells: Vec<Cell>,
    limit: u32,
}

impl Default for SortUnifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SortUnifier {
    const STAR: Variable = Variable { raw: 0 };

    pub fn new() -> Self {
        Self::with_limit(u32::MAX)
    }

    /// A unifier holding at most `limit` variables, `star` included.
    pub fn with_limit(limit: u32) -> Self {
        Self {
            cells: vec![Cell::Root(Some(vec![]))],
            limit,
        }
    }

    /// The canonical variable standing for the nullary arrow `*`.
    pub fn star(&self) -> Variable {
        Self::STAR
    }

    /// Allocate a variable standing for `(v1, ..., vn) -> *`.
    pub fn arrow<I>(&mut self, domain: I) -> Result<Variable, TooManyVariables>
    where
        I: IntoIterator<Item = Variable>,
    {
        let domain = domain.into_iter().collect();
        self.alloc(Cell::Root(Some(domain)))
    }

    /// Allocate an unconstrained variable.
    pub fn fresh(&mut self) -> Result<Variable, TooManyVariables> {
        self.alloc(Cell::Root(None))
    }

    fn alloc(&mut self, cell: Cell) -> Result<Variable, TooManyVariables> {
        let raw = u32::try_from(self.cells.len()).map_err(|_| TooManyVariables)?;
        if raw >= self.limit {
            return Err(TooManyVariables);
        }
        self.cells.push(cell);
        Ok(Variable { raw })
    }

    /// Return the operands of `v` if it is currently known to be an arrow.
    ///
    /// The answer may change as long as unification goes on, so this should
    /// be consulted only once the relevant unifications are complete.
    pub fn domain(&self, v: Variable) -> Option<Vec<Variable>> {
        match &self.cells[self.root(v).index()] {
            Cell::Root(Some(domain)) => Some(domain.clone()),
            _ => None,
        }
    }

    /// Follow the links from `v` without compressing them.
    fn root(&self, mut v: Variable) -> Variable {
        while let Cell::Link(next) = self.cells[v.index()] {
            v = next;
        }
        v
    }

    /// Find the representative of `v`, compressing the path on the way.
    fn find(&mut self, v: Variable) -> Variable {
        let root = self.root(v);
        let mut current = v;
        while let Cell::Link(next) = self.cells[current.index()] {
            self.cells[current.index()] = Cell::Link(root);
            current = next;
        }
        root
    }

    fn structure(&self, root: Variable) -> Option<&[Variable]> {
        match &self.cells[root.index()] {
            Cell::Root(Some(domain)) => Some(domain),
            _ => None,
        }
    }

    /// Unify the sorts of `v1` and `v2`.
    pub fn unify(&mut self, v1: Variable, v2: Variable) -> Result<(), UnifyError> {
        let r1 = self.find(v1);
        let r2 = self.find(v2);
        if r1 == r2 {
            return Ok(());
        }

        let s1 = self.structure(r1).map(<[_]>::to_vec);
        let s2 = self.structure(r2).map(<[_]>::to_vec);
        match (s1, s2) {
            (None, None) => {
                self.cells[r1.index()] = Cell::Link(r2);
                Ok(())
            }

            (None, Some(..)) => {
                if self.occurs(r1, r2) {
                    return Err(UnifyError::Occurs(v1, v2));
                }
                self.cells[r1.index()] = Cell::Link(r2);
                Ok(())
            }

            (Some(..), None) => {
                if self.occurs(r2, r1) {
                    return Err(UnifyError::Occurs(v1, v2));
                }
                self.cells[r2.index()] = Cell::Link(r1);
                Ok(())
            }

            (Some(d1), Some(d2)) => {
                if d1.len() != d2.len() {
                    return Err(UnifyError::Unify(v1, v2));
                }
                // Merging two nodes creates a cycle iff one is reachable from the other.
                if self.occurs(r1, r2) || self.occurs(r2, r1) {
                    return Err(UnifyError::Occurs(v1, v2));
                }
                self.cells[r1.index()] = Cell::Link(r2);
                for (a, b) in d1.into_iter().zip(d2) {
                    self.unify(a, b)?;
                }
                Ok(())
            }
        }
    }

    /// Check whether the representative `target` is reachable from the
    /// operands of the node `from`.
    fn occurs(&mut self, target: Variable, from: Variable) -> bool {
        let mut visited = vec![false; self.cells.len()];
        let mut stack = vec![from];
        while let Some(node) = stack.pop() {
            let children = match self.structure(node) {
                Some(children) => children.to_vec(),
                None => continue,
            };
            for child in children {
                let child = self.find(child);
                if child == target {
                    return true;
                }
                if !visited[child.index()] {
                    visited[child.index()] = true;
                    stack.push(child);
                }
            }
        }
        false
    }

    /// Read back the sort currently denoted by `v`.
    ///
    /// Unconstrained variables are rendered as [`Sort::Var`], numbered after
    /// their representative.
    pub fn decode(&self, v: Variable) -> Sort {
        let root = self.root(v);
        match &self.cells[root.index()] {
            Cell::Root(Some(domain)) => {
                Sort::Arrow(domain.iter().map(|&child| self.decode(child)).collect())
            }
            _ => Sort::Var(root.raw),
        }
    }
}

/// A decoded sort, possibly containing unresolved variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Sort {
    Var(u32),
    Arrow(Vec<Sort>),
}

impl Sort {
    pub const STAR: Self = Self::Arrow(Vec::new());

    /// The number of operands, if this sort is known to be an arrow.
    pub fn arity(&self) -> Option<usize> {
        match self {
            Self::Var(..) => None,
            Self::Arrow(domain) => Some(domain.len()),
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(n) => write!(f, "?{}", n),
            Self::Arrow(domain) if domain.is_empty() => f.write_str("*"),
            Self::Arrow(domain) => {
                f.write_str("(")?;
                write_separated(f, ", ", domain)?;
                f.write_str(") -> *")
            }
        }
    }
}

/// A sort without variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroundSort(pub Vec<GroundSort>);

impl GroundSort {
    pub const STAR: Self = Self(Vec::new());

    /// The number of parameters a symbol of this sort expects.
    pub fn arity(&self) -> usize {
        self.0.len()
    }

    pub fn domain(&self) -> &[GroundSort] {
        &self.0
    }
}

impl fmt::Display for GroundSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("*");
        }
        f.write_str("(")?;
        write_separated(f, ", ", &self.0)?;
        f.write_str(") -> *")
    }
}

/// Replace every variable in `sort` with `*`.
pub fn ground(sort: &Sort) -> GroundSort {
    match sort {
        Sort::Var(..) => GroundSort::STAR,
        Sort::Arrow(domain) => GroundSort(domain.iter().map(ground).collect()),
    }
}

pub fn unground(sort: &GroundSort) -> Sort {
    Sort::Arrow(sort.0.iter().map(unground).collect())
}
