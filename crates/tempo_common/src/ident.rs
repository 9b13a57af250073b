//! Interned names.
//!
//! User names and the `__V`-prefixed names the scheduling passes synthesize
//! share one table, so a lookup by name finds either kind after any pass.

use lasso::{Key, ThreadedRodeo};
use serde::{Deserialize, Serialize};

/// An interned name: an index into an [`Interner`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Ident(u32);

// SAFETY: `try_from_usize` rejects anything that does not fit in a `u32`,
// so `into_usize` hands back exactly what was accepted.
unsafe impl Key for Ident {
    fn into_usize(self) -> usize {
        self.0 as usize
    }

    fn try_from_usize(int: usize) -> Option<Self> {
        u32::try_from(int).ok().map(Ident)
    }
}

/// The name table of a netlist.
///
/// Interning only needs `&self`, so code holding a shared borrow of the
/// netlist can still name what it synthesizes.
pub struct Interner(ThreadedRodeo<Ident>);

impl Interner {
    /// An empty table.
    pub fn new() -> Self {
        Self(ThreadedRodeo::new())
    }

    /// The identifier of `name`, interning it on first use.
    pub fn intern(&self, name: &str) -> Ident {
        self.0.get_or_intern(name)
    }

    /// The identifier of `name` if anything declared it.
    pub fn lookup(&self, name: &str) -> Option<Ident> {
        self.0.get(name)
    }

    /// The text of `ident`.
    ///
    /// # Panics
    ///
    /// Panics if `ident` came from another table.
    pub fn resolve(&self, ident: Ident) -> &str {
        self.0.resolve(&ident)
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Interner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interner({} names)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesized_and_user_names_share_the_table() {
        let names = Interner::new();
        let clk = names.intern("clk");
        let edge = names.intern("__Vposedge__clk");
        assert_ne!(clk, edge);
        assert_eq!(names.intern("clk"), clk);
        assert_eq!(names.lookup("__Vposedge__clk"), Some(edge));
        assert_eq!(names.resolve(edge), "__Vposedge__clk");
    }

    #[test]
    fn lookup_never_interns() {
        let names = Interner::new();
        assert_eq!(names.lookup("__VdlyEvent__"), None);
        assert_eq!(names.lookup("__VdlyEvent__"), None);
        assert_eq!(format!("{names:?}"), "Interner(0 names)");
    }

    #[test]
    fn ident_serializes_as_its_index() {
        let json = serde_json::to_string(&Ident(7)).unwrap();
        assert_eq!(json, "7");
        assert_eq!(serde_json::from_str::<Ident>(&json).unwrap(), Ident(7));
    }
}
