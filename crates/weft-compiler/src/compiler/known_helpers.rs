use rustc_hash::FxHashSet;
use smol_str::SmolStr;

/// Helper names known at compile time.
///
/// A bare mustache like `{{name}}` can mean "print this value" or "invoke
/// this zero-arg helper"; classification is normally deferred to render
/// time. Names in this set are classified as helpers eagerly instead. The
/// defaults are the built-in control-flow helpers and the fallback hook
/// names; callers extend the set through `CompileOptions` for helpers they
/// know they will register.
#[derive(Debug, Clone, PartialEq)]
pub struct KnownHelpers {
    names: FxHashSet<SmolStr>,
}

/// The built-in control-flow helpers plus the two fallback hook names the
/// render layer consults when a name does not resolve.
pub(crate) const DEFAULT_HELPERS: [&str; 7] = [
    "if",
    "unless",
    "each",
    "with",
    "log",
    "helper-missing",
    "block-helper-missing",
];

impl Default for KnownHelpers {
    fn default() -> Self {
        let mut known = KnownHelpers::empty();
        known.extend(DEFAULT_HELPERS);
        known
    }
}

impl KnownHelpers {
    /// A set without the built-in names.
    pub fn empty() -> Self {
        KnownHelpers {
            names: FxHashSet::default(),
        }
    }

    pub fn register(&mut self, name: impl Into<SmolStr>) {
        self.names.insert(name.into());
    }

    pub fn extend(&mut self, names: impl IntoIterator<Item = impl Into<SmolStr>>) {
        for name in names {
            self.register(name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}
