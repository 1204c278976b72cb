//! Boolean algebras the circuit evaluator is generic over.
//!
//! `Concrete` evaluates over plain `bool`. `TermArena` builds hash-consed
//! symbolic terms with light local simplification, so structurally equal
//! subcircuits share one `TermId`. Children always have smaller ids than their
//! parents, which lets a term be evaluated in one forward sweep.
//!
//! # Citations
//! - Hash-consing: Filliâtre & Conchon, "Type-safe modular hash-consing",
//!   ACM Workshop on ML (2006)

use std::collections::HashMap;
use std::fmt;

/// Operations the evaluator needs from a Boolean domain.
pub trait BoolAlgebra {
    type Value: Clone + fmt::Debug;

    fn constant(&mut self, value: bool) -> Self::Value;
    fn not(&mut self, a: &Self::Value) -> Self::Value;
    fn and(&mut self, a: &Self::Value, b: &Self::Value) -> Self::Value;
    fn or(&mut self, a: &Self::Value, b: &Self::Value) -> Self::Value;
    fn xor(&mut self, a: &Self::Value, b: &Self::Value) -> Self::Value;

    /// Returns `true` only if `a` and `b` are known to denote the same function.
    ///
    /// May return `false` for equivalent values it cannot identify.
    fn same(&self, a: &Self::Value, b: &Self::Value) -> bool;

    /// Three-input majority.
    fn majority(&mut self, a: &Self::Value, b: &Self::Value, c: &Self::Value) -> Self::Value {
        let ab = self.and(a, b);
        let bc = self.and(b, c);
        let ac = self.and(a, c);
        let t = self.or(&ab, &bc);
        self.or(&t, &ac)
    }
}

/// The two-element Boolean algebra.
#[derive(Debug, Clone, Copy, Default)]
pub struct Concrete;

impl BoolAlgebra for Concrete {
    type Value = bool;

    fn constant(&mut self, value: bool) -> bool {
        value
    }
    fn not(&mut self, a: &bool) -> bool {
        !a
    }
    fn and(&mut self, a: &bool, b: &bool) -> bool {
        *a && *b
    }
    fn or(&mut self, a: &bool, b: &bool) -> bool {
        *a || *b
    }
    fn xor(&mut self, a: &bool, b: &bool) -> bool {
        a ^ b
    }
    fn same(&self, a: &bool, b: &bool) -> bool {
        a == b
    }
}

/// Index of a term in a `TermArena`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TermId(u32);

impl TermId {
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// A symbolic Boolean term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Term {
    Const(bool),
    Var(u8),
    Not(TermId),
    And(TermId, TermId),
    Or(TermId, TermId),
    Xor(TermId, TermId),
}

/// Largest variable count `TermArena::equivalent` enumerates.
pub const MAX_DECIDED_VARS: u8 = 16;

/// Hash-consing store of symbolic terms.
#[derive(Debug, Clone, Default)]
pub struct TermArena {
    terms: Vec<Term>,
    interned: HashMap<Term, TermId>,
    var_count: u8,
}

impl TermArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the term for variable `index`.
    pub fn var(&mut self, index: u8) -> TermId {
        self.var_count = self.var_count.max(index + 1);
        self.intern(Term::Var(index))
    }

    /// Number of distinct variables referenced so far.
    pub fn var_count(&self) -> u8 {
        self.var_count
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn get(&self, id: TermId) -> Term {
        self.terms[id.as_usize()]
    }

    fn intern(&mut self, term: Term) -> TermId {
        if let Some(&id) = self.interned.get(&term) {
            return id;
        }
        let id = TermId(self.terms.len() as u32);
        self.terms.push(term);
        self.interned.insert(term, id);
        id
    }

    fn as_const(&self, id: TermId) -> Option<bool> {
        match self.get(id) {
            Term::Const(v) => Some(v),
            _ => None,
        }
    }

    fn ordered(a: TermId, b: TermId) -> (TermId, TermId) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    pub fn mk_not(&mut self, a: TermId) -> TermId {
        match self.get(a) {
            Term::Const(v) => self.intern(Term::Const(!v)),
            Term::Not(inner) => inner,
            _ => self.intern(Term::Not(a)),
        }
    }

    pub fn mk_and(&mut self, a: TermId, b: TermId) -> TermId {
        match (self.as_const(a), self.as_const(b)) {
            (Some(false), _) | (_, Some(false)) => return self.intern(Term::Const(false)),
            (Some(true), _) => return b,
            (_, Some(true)) => return a,
            _ => {}
        }
        if a == b {
            return a;
        }
        let (a, b) = Self::ordered(a, b);
        self.intern(Term::And(a, b))
    }

    pub fn mk_or(&mut self, a: TermId, b: TermId) -> TermId {
        match (self.as_const(a), self.as_const(b)) {
            (Some(true), _) | (_, Some(true)) => return self.intern(Term::Const(true)),
            (Some(false), _) => return b,
            (_, Some(false)) => return a,
            _ => {}
        }
        if a == b {
            return a;
        }
        let (a, b) = Self::ordered(a, b);
        self.intern(Term::Or(a, b))
    }

    pub fn mk_xor(&mut self, a: TermId, b: TermId) -> TermId {
        match (self.as_const(a), self.as_const(b)) {
            (Some(x), Some(y)) => return self.intern(Term::Const(x ^ y)),
            (Some(false), _) => return b,
            (_, Some(false)) => return a,
            (Some(true), _) => return self.mk_not(b),
            (_, Some(true)) => return self.mk_not(a),
            _ => {}
        }
        if a == b {
            return self.intern(Term::Const(false));
        }
        let (a, b) = Self::ordered(a, b);
        self.intern(Term::Xor(a, b))
    }

    /// Evaluates `root` under `assignment` (variable `i` is `assignment[i]`).
    ///
    /// Unassigned variables read as `false`.
    pub fn eval(&self, root: TermId, assignment: &[bool]) -> bool {
        let mut values = vec![false; root.as_usize() + 1];
        for i in 0..=root.as_usize() {
            values[i] = match self.terms[i] {
                Term::Const(v) => v,
                Term::Var(k) => assignment.get(k as usize).copied().unwrap_or(false),
                Term::Not(a) => !values[a.as_usize()],
                Term::And(a, b) => values[a.as_usize()] && values[b.as_usize()],
                Term::Or(a, b) => values[a.as_usize()] || values[b.as_usize()],
                Term::Xor(a, b) => values[a.as_usize()] ^ values[b.as_usize()],
            };
        }
        values[root.as_usize()]
    }

    /// Decides whether two terms agree on every assignment of the variables
    /// seen so far.
    ///
    /// Returns `None` when the arena has more than `MAX_DECIDED_VARS` variables.
    pub fn equivalent(&self, a: TermId, b: TermId) -> Option<bool> {
        if a == b {
            return Some(true);
        }
        let n = self.var_count;
        if n > MAX_DECIDED_VARS {
            return None;
        }
        let mut assignment = vec![false; n as usize];
        for bits in 0u32..(1u32 << n) {
            for (i, v) in assignment.iter_mut().enumerate() {
                *v = bits >> i & 1 == 1;
            }
            if self.eval(a, &assignment) != self.eval(b, &assignment) {
                return Some(false);
            }
        }
        Some(true)
    }

    /// Renders a term as an infix formula over `names`.
    pub fn render(&self, root: TermId, names: &[&str]) -> String {
        match self.get(root) {
            Term::Const(v) => String::from(if v { "1" } else { "0" }),
            Term::Var(k) => names.get(k as usize).map_or_else(|| format!("v{k}"), |n| n.to_string()),
            Term::Not(a) => format!("NOT({})", self.render(a, names)),
            Term::And(a, b) => format!("({} AND {})", self.render(a, names), self.render(b, names)),
            Term::Or(a, b) => format!("({} OR {})", self.render(a, names), self.render(b, names)),
            Term::Xor(a, b) => format!("({} XOR {})", self.render(a, names), self.render(b, names)),
        }
    }
}

impl BoolAlgebra for TermArena {
    type Value = TermId;

    fn constant(&mut self, value: bool) -> TermId {
        self.intern(Term::Const(value))
    }
    fn not(&mut self, a: &TermId) -> TermId {
        self.mk_not(*a)
    }
    fn and(&mut self, a: &TermId, b: &TermId) -> TermId {
        self.mk_and(*a, *b)
    }
    fn or(&mut self, a: &TermId, b: &TermId) -> TermId {
        self.mk_or(*a, *b)
    }
    fn xor(&mut self, a: &TermId, b: &TermId) -> TermId {
        self.mk_xor(*a, *b)
    }
    fn same(&self, a: &TermId, b: &TermId) -> bool {
        a == b || self.equivalent(*a, *b).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_consing_shares_terms() {
        let mut t = TermArena::new();
        let l = t.var(0);
        let r = t.var(2);
        let x1 = t.mk_xor(l, r);
        let x2 = t.mk_xor(r, l);
        assert_eq!(x1, x2);
        assert_eq!(t.var_count(), 3);
    }

    #[test]
    fn local_simplifications() {
        let mut t = TermArena::new();
        let c = t.var(1);
        let nc = t.mk_not(c);
        assert_eq!(t.mk_not(nc), c);
        assert_eq!(t.mk_and(c, c), c);
        assert_eq!(t.mk_or(c, c), c);
        let zero = t.constant(false);
        assert_eq!(t.mk_xor(c, c), zero);
        let one = t.constant(true);
        assert_eq!(t.mk_and(c, one), c);
        assert_eq!(t.mk_or(c, one), one);
        assert_eq!(t.mk_xor(c, one), nc);
    }

    #[test]
    fn eval_matches_concrete() {
        let mut t = TermArena::new();
        let (l, c, r) = (t.var(0), t.var(1), t.var(2));
        let maj = t.majority(&l, &c, &r);
        let mut k = Concrete;
        for i in 0..8u8 {
            let bits = [i & 4 != 0, i & 2 != 0, i & 1 != 0];
            assert_eq!(t.eval(maj, &bits), k.majority(&bits[0], &bits[1], &bits[2]));
        }
    }

    #[test]
    fn equivalence_is_semantic() {
        let mut t = TermArena::new();
        let (l, c) = (t.var(0), t.var(1));
        let c_or_l = t.mk_or(c, l);
        let absorbed = t.mk_and(c, c_or_l);
        assert_ne!(absorbed, c);
        assert!(t.same(&absorbed, &c));
        assert_eq!(t.equivalent(absorbed, c), Some(true));
        assert!(!t.same(&c_or_l, &c));
        assert_eq!(t.equivalent(c_or_l, l), Some(false));
    }

    #[test]
    fn render_is_readable() {
        let mut t = TermArena::new();
        let (l, r) = (t.var(0), t.var(2));
        let x = t.mk_xor(l, r);
        assert_eq!(t.render(x, &["L", "C", "R"]), "(L XOR R)");
    }
}
