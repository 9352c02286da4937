use std::collections::BTreeSet;

/// Names of the global variables declared during one decompilation run.
///
/// Owned by the [`Driver`](crate::driver::Driver) and handed to every
/// [`GlobalVariableStatement`](crate::statement::GlobalVariableStatement)
/// constructor. Call [`reset`](Self::reset) between independent stories.
#[derive(Debug, Clone, Default)]
pub struct GlobalRegistry {
    names: BTreeSet<String>,
}

impl GlobalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`. Returns `false` if it was already present.
    pub fn add_global(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(name.into())
    }

    pub fn is_global(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Forget every registered name.
    pub fn reset(&mut self) {
        self.names.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_registration_reports_present() {
        let mut globals = GlobalRegistry::new();
        assert!(globals.add_global("health"));
        assert!(!globals.add_global("health"));
        assert!(globals.is_global("health"));
        assert!(!globals.is_global("mana"));
        assert_eq!(globals.len(), 1);
    }

    #[test]
    fn reset_forgets_names() {
        let mut globals = GlobalRegistry::new();
        globals.add_global("a");
        globals.reset();
        assert!(globals.is_empty());
        assert!(globals.add_global("a"));
    }
}
