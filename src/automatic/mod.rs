//! Automatic variables for a target's recipe.
//!
//! Before a recipe runs (or is echoed in a dry run) the build computes
//! `$@`, `$%`, `$*`, `$<`, `$^`, `$+`, `$?` and `$|` from the target and its
//! prerequisite list, together with their long-form aliases (`.TARGET`,
//! `.SOURCE`, and so on). [`VariableMaterializer`] performs that computation
//! and keeps its output buffers between targets so that large builds do not
//! reallocate them for every recipe.
//!
//! # Examples
//!
//! ```
//! use kumitate::automatic::VariableMaterializer;
//! use kumitate::graph::{Dependency, Target};
//!
//! let mut prog = Target::new("prog");
//! prog.deps = vec![
//!     Dependency::new("main.o").with_changed(true),
//!     Dependency::new("util.o"),
//!     Dependency::new("build").with_order_only(true),
//! ];
//!
//! let mut materializer = VariableMaterializer::new(false);
//! let vars = materializer.compute(&mut prog, None, &[]);
//! assert_eq!(vars.get("@"), Some("prog"));
//! assert_eq!(vars.get("<"), Some("main.o"));
//! assert_eq!(vars.get("^"), Some("main.o util.o"));
//! assert_eq!(vars.get("?"), Some("main.o"));
//! assert_eq!(vars.get("|"), Some("build"));
//! ```

mod escape;

use indexmap::IndexMap;
use tracing::debug;

use crate::archive::{ArchiveNames, ArchiveSyntax, member_or_name};
use crate::graph::Target;

pub use escape::escape_spaces;
use escape::{push_escaped, push_word};

/// Names accepted by [`AutomaticVars::get`], short forms first.
pub const VARIABLE_NAMES: [&str; 14] = [
    "@",
    "%",
    "*",
    "<",
    "^",
    "+",
    "?",
    "|",
    ".TARGET",
    ".STEM",
    ".SOURCE",
    ".SOURCES",
    ".SOURCES+",
    ".NEWSOURCES",
];

/// Values of the automatic variables for one target.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AutomaticVars {
    /// `$@`: the target, or the archive for an archive member.
    pub target: String,
    /// `$%`: the member name for an archive member, otherwise empty.
    pub member: String,
    /// `$*`: the stem.
    pub stem: String,
    /// `$<`: the first normal prerequisite.
    pub source: String,
    /// `$^`: distinct normal prerequisites.
    pub sources: String,
    /// `$+`: every prerequisite, duplicates included.
    pub sources_with_duplicates: String,
    /// `$?`: distinct normal prerequisites newer than the target.
    pub new_sources: String,
    /// `$|`: distinct order-only prerequisites.
    pub order_only: String,
}

impl AutomaticVars {
    /// Look up a variable by its short or long name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        let value = match name {
            "@" | ".TARGET" => &self.target,
            "%" => &self.member,
            "*" | ".STEM" => &self.stem,
            "<" | ".SOURCE" => &self.source,
            "^" | ".SOURCES" => &self.sources,
            "+" | ".SOURCES+" => &self.sources_with_duplicates,
            "?" | ".NEWSOURCES" => &self.new_sources,
            "|" => &self.order_only,
            _ => return None,
        };
        Some(value.as_str())
    }

    /// Iterate over every variable in [`VARIABLE_NAMES`] order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        VARIABLE_NAMES
            .iter()
            .filter_map(move |&name| self.get(name).map(|value| (name, value)))
    }

    fn clear(&mut self) {
        for buf in [
            &mut self.target,
            &mut self.member,
            &mut self.stem,
            &mut self.source,
            &mut self.sources,
            &mut self.sources_with_duplicates,
            &mut self.new_sources,
            &mut self.order_only,
        ] {
            buf.clear();
        }
    }
}

/// Computes [`AutomaticVars`] for targets, reusing its buffers.
pub struct VariableMaterializer {
    always_make: bool,
    archives: Box<dyn ArchiveNames>,
    vars: AutomaticVars,
    first_seen: IndexMap<String, usize>,
}

impl VariableMaterializer {
    /// Create a materializer.
    ///
    /// With `always_make` every normal prerequisite counts as changed.
    #[must_use]
    pub fn new(always_make: bool) -> Self {
        Self::with_archives(always_make, Box::new(ArchiveSyntax))
    }

    /// Create a materializer using a custom archive-name collaborator.
    #[must_use]
    pub fn with_archives(always_make: bool, archives: Box<dyn ArchiveNames>) -> Self {
        Self {
            always_make,
            archives,
            vars: AutomaticVars::default(),
            first_seen: IndexMap::new(),
        }
    }

    /// Compute the automatic variables of `target`.
    ///
    /// `stem_override` is the stem of the pattern rule that matched, if any.
    /// Otherwise the stem cached on the target is used, computing and caching
    /// it from `suffixes` (the `.SUFFIXES` list) the first time. Prerequisites
    /// listed both as order-only and normal are permanently upgraded to
    /// normal.
    pub fn compute(
        &mut self,
        target: &mut Target,
        stem_override: Option<&str>,
        suffixes: &[String],
    ) -> &AutomaticVars {
        self.vars.clear();
        self.fill_target(target);
        self.fill_stem(target, stem_override, suffixes);
        self.fill_source(target);
        self.fill_sources_with_duplicates(target);
        self.upgrade_conflicting_order_only(target);
        self.fill_distinct_lists(target);
        &self.vars
    }

    fn fill_target(&mut self, target: &Target) {
        match self.archives.split_archive(&target.name) {
            Some((archive, member)) => {
                push_escaped(&mut self.vars.target, archive);
                push_escaped(&mut self.vars.member, member);
            }
            None => push_escaped(&mut self.vars.target, &target.name),
        }
    }

    fn fill_stem(&mut self, target: &mut Target, stem_override: Option<&str>, suffixes: &[String]) {
        let stem = match stem_override {
            Some(stem) => stem,
            None => {
                if target.stem.is_none() {
                    let computed = suffix_stem(self.archives.as_ref(), &target.name, suffixes);
                    debug!(target = %target.name, stem = %computed, "computed stem from suffix list");
                    target.stem = Some(computed);
                }
                target.stem.as_deref().unwrap_or_default()
            }
        };
        push_escaped(&mut self.vars.stem, stem);
    }

    fn fill_source(&mut self, target: &Target) {
        if target.recipe_from_default {
            self.vars.source.push_str(&self.vars.target);
            return;
        }
        if let Some(first) = target
            .deps
            .iter()
            .find(|dep| !dep.order_only && dep.is_eligible())
        {
            push_escaped(&mut self.vars.source, &first.name);
        }
    }

    fn fill_sources_with_duplicates(&mut self, target: &Target) {
        for dep in target.deps.iter().filter(|dep| dep.is_eligible()) {
            let word = member_or_name(self.archives.as_ref(), &dep.name);
            push_word(&mut self.vars.sources_with_duplicates, word);
        }
    }

    fn upgrade_conflicting_order_only(&mut self, target: &mut Target) {
        self.first_seen.clear();
        for idx in 0..target.deps.len() {
            let Some(dep) = target.deps.get(idx).filter(|dep| dep.is_eligible()) else {
                continue;
            };
            let Some(&first) = self.first_seen.get(dep.name.as_str()) else {
                self.first_seen.insert(dep.name.clone(), idx);
                continue;
            };
            let conflict = target
                .deps
                .get(first)
                .is_some_and(|earlier| earlier.order_only != dep.order_only);
            if conflict {
                debug!(target = %target.name, prerequisite = %dep.name, "upgrading order-only prerequisite");
                for slot in [first, idx] {
                    if let Some(record) = target.deps.get_mut(slot) {
                        record.order_only = false;
                    }
                }
            }
        }
    }

    fn fill_distinct_lists(&mut self, target: &Target) {
        for &idx in self.first_seen.values() {
            let Some(dep) = target.deps.get(idx) else {
                continue;
            };
            let word = member_or_name(self.archives.as_ref(), &dep.name);
            if dep.order_only {
                push_word(&mut self.vars.order_only, word);
                continue;
            }
            push_word(&mut self.vars.sources, word);
            if dep.changed || self.always_make {
                push_word(&mut self.vars.new_sources, word);
            }
        }
    }
}

/// Stem of `name` under the `.SUFFIXES` list.
///
/// The first suffix that is a strict suffix of the name (the member name for
/// archive members) is removed; without a match the stem is empty.
fn suffix_stem(archives: &dyn ArchiveNames, name: &str, suffixes: &[String]) -> String {
    let base = member_or_name(archives, name);
    suffixes
        .iter()
        .find_map(|suffix| {
            base.strip_suffix(suffix.as_str())
                .filter(|stem| !stem.is_empty())
        })
        .unwrap_or_default()
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Dependency;
    use rstest::rstest;

    fn suffixes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_owned()).collect()
    }

    #[rstest]
    #[case("foo.o", &[".c", ".o"], "foo")]
    #[case("foo.tab.c", &[".c", ".tab.c"], "foo.tab")]
    #[case(".o", &[".o"], "")]
    #[case("README", &[".c"], "")]
    #[case("libx.a(obj.o)", &[".o"], "obj")]
    fn stems_follow_the_suffix_list(#[case] name: &str, #[case] list: &[&str], #[case] stem: &str) {
        assert_eq!(suffix_stem(&ArchiveSyntax, name, &suffixes(list)), stem);
    }

    #[test]
    fn stem_is_computed_once_and_cached() {
        let mut target = Target::new("foo.o");
        let mut materializer = VariableMaterializer::new(false);
        let stem = materializer
            .compute(&mut target, None, &suffixes(&[".o"]))
            .stem
            .clone();
        assert_eq!(stem, "foo");
        assert_eq!(target.stem.as_deref(), Some("foo"));

        let vars = materializer.compute(&mut target, None, &suffixes(&[".c"]));
        assert_eq!(vars.stem, "foo", "cached stem wins over a changed suffix list");
    }

    #[test]
    fn explicit_stem_does_not_touch_the_cache() {
        let mut target = Target::new("foo.o");
        let mut materializer = VariableMaterializer::new(false);
        let vars = materializer.compute(&mut target, Some("f o"), &[]);
        assert_eq!(vars.stem, r"f\ o");
        assert!(target.stem.is_none());
    }

    #[test]
    fn buffers_are_reset_between_targets() {
        let mut materializer = VariableMaterializer::new(false);
        let mut first = Target::new("a");
        first.deps = vec![Dependency::new("x"), Dependency::new("y")];
        materializer.compute(&mut first, None, &[]);

        let mut second = Target::new("b");
        let vars = materializer.compute(&mut second, None, &[]);
        assert_eq!(vars.target, "b");
        assert!(vars.sources.is_empty());
        assert!(vars.sources_with_duplicates.is_empty());
    }

    #[test]
    fn long_names_alias_short_names() {
        let mut target = Target::new("out");
        target.deps = vec![Dependency::new("in").with_changed(true)];
        let mut materializer = VariableMaterializer::new(false);
        let vars = materializer.compute(&mut target, None, &[]);
        for (short, long) in [
            ("@", ".TARGET"),
            ("*", ".STEM"),
            ("<", ".SOURCE"),
            ("^", ".SOURCES"),
            ("+", ".SOURCES+"),
            ("?", ".NEWSOURCES"),
        ] {
            assert_eq!(vars.get(short), vars.get(long), "{short} vs {long}");
        }
        assert_eq!(vars.get("nope"), None);
        assert_eq!(vars.iter().count(), VARIABLE_NAMES.len());
    }
}
