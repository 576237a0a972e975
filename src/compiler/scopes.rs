pub type SlotIndex = usize;

// Coordinates of a local at run time: how many frames up from the innermost,
// and which slot inside that frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocalCoord {
    pub depth: usize,
    pub slot: SlotIndex,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NameRef {
    Local(LocalCoord),
    Global(String),
}

struct Scope {
    locals: Vec<String>,
}

pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    pub fn new() -> Self {
        Self { scopes: Vec::new() }
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(Scope { locals: Vec::new() });
    }

    pub fn exit_scope(&mut self) -> usize {
        self.scopes
            .pop()
            .map(|scope| scope.locals.len())
            .unwrap_or(0)
    }

    // Always allocates a fresh slot; redeclaring a name shadows the earlier
    // slot without error.
    pub fn declare_local(&mut self, name: &str) -> SlotIndex {
        let scope = self
            .scopes
            .last_mut()
            .expect("declare_local called outside any scope");
        let slot = scope.locals.len();
        scope.locals.push(name.to_string());
        slot
    }

    pub fn resolve(&self, name: &str) -> NameRef {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if let Some(slot) = scope.locals.iter().rposition(|local| local == name) {
                return NameRef::Local(LocalCoord { depth, slot });
            }
        }
        NameRef::Global(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_names_fall_back_to_globals() {
        let mut scopes = ScopeStack::new();
        scopes.enter_scope();
        assert_eq!(scopes.resolve("x"), NameRef::Global("x".to_string()));
    }

    #[test]
    fn nearest_scope_wins() {
        let mut scopes = ScopeStack::new();
        scopes.enter_scope();
        scopes.declare_local("x");
        scopes.enter_scope();
        let inner = scopes.declare_local("x");
        assert_eq!(
            scopes.resolve("x"),
            NameRef::Local(LocalCoord {
                depth: 0,
                slot: inner
            })
        );
        scopes.exit_scope();
        assert_eq!(
            scopes.resolve("x"),
            NameRef::Local(LocalCoord { depth: 0, slot: 0 })
        );
    }

    #[test]
    fn shadowing_in_one_scope_allocates_a_new_slot() {
        let mut scopes = ScopeStack::new();
        scopes.enter_scope();
        let first = scopes.declare_local("x");
        let second = scopes.declare_local("x");
        assert_ne!(first, second);
        assert_eq!(
            scopes.resolve("x"),
            NameRef::Local(LocalCoord {
                depth: 0,
                slot: second
            })
        );
    }

    #[test]
    fn outer_locals_resolve_through_depth() {
        let mut scopes = ScopeStack::new();
        scopes.enter_scope();
        scopes.declare_local("outer");
        scopes.enter_scope();
        scopes.enter_scope();
        assert_eq!(
            scopes.resolve("outer"),
            NameRef::Local(LocalCoord { depth: 2, slot: 0 })
        );
    }

    #[test]
    fn exit_scope_reports_slot_count() {
        let mut scopes = ScopeStack::new();
        scopes.enter_scope();
        scopes.declare_local("a");
        scopes.declare_local("b");
        assert_eq!(scopes.exit_scope(), 2);
    }
}
