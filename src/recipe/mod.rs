//! Splitting recipes into individually flagged command lines.
//!
//! A recipe is stored as raw text. Before it first runs it is chopped into
//! logical lines: a newline ends a line unless an odd number of backslashes
//! escapes it, in which case the backslash-newline stays inside the line for
//! the shell to handle. Each line's leading `-`, `@` and `+` modifiers become
//! [`LineFlags`]. With `.ONESHELL` the whole recipe is a single line.
//!
//! # Examples
//!
//! ```
//! use kumitate::recipe::{LineFlags, Recipe};
//!
//! let mut recipe = Recipe::new("@echo building\n-rm -f tmp \\\n  scratch\n$(MAKE) -C sub\n");
//! let chopped = recipe.chop(false)?;
//! assert_eq!(chopped.len(), 3);
//! assert!(chopped.lines()[0].flags().contains(LineFlags::SILENT));
//! assert_eq!(chopped.lines()[1].command(), "rm -f tmp \\\n  scratch");
//! assert!(chopped.any_recurse());
//! # Ok::<(), kumitate::recipe::RecipeError>(())
//! ```

mod error;
mod flags;

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};

pub use error::RecipeError;
pub use flags::LineFlags;

/// Most logical lines a recipe may have.
pub const MAX_RECIPE_LINES: usize = u16::MAX as usize;

/// Where a recipe was defined.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceLocation {
    /// Makefile defining the recipe; `None` for built-in rules.
    pub file: Option<Utf8PathBuf>,
    /// Line of the first recipe line.
    pub line: u64,
}

impl SourceLocation {
    /// Location inside a makefile.
    #[must_use]
    pub fn new(file: impl Into<Utf8PathBuf>, line: u64) -> Self {
        Self {
            file: Some(file.into()),
            line,
        }
    }

    /// Location of a built-in rule.
    #[must_use]
    pub const fn builtin() -> Self {
        Self {
            file: None,
            line: 0,
        }
    }

    /// Makefile defining the recipe.
    #[must_use]
    pub fn file(&self) -> Option<&Utf8Path> {
        self.file.as_deref()
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{file}:{}", self.line),
            None => f.write_str("(built-in)"),
        }
    }
}

/// One logical recipe line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandLine {
    text: String,
    prefix_len: usize,
    flags: LineFlags,
}

impl CommandLine {
    fn parse(text: &str) -> Self {
        let mut flags = LineFlags::empty();
        let mut prefix_len = 0;
        for ch in text.chars() {
            if matches!(ch, ' ' | '\t') {
                prefix_len += ch.len_utf8();
                continue;
            }
            let Some(flag) = LineFlags::from_prefix(ch) else {
                break;
            };
            flags |= flag;
            prefix_len += ch.len_utf8();
        }
        let command = text.get(prefix_len..).unwrap_or_default();
        if !flags.contains(LineFlags::RECURSE)
            && (command.contains("$(MAKE)") || command.contains("${MAKE}"))
        {
            flags |= LineFlags::RECURSE;
        }
        Self {
            text: text.to_owned(),
            prefix_len,
            flags,
        }
    }

    /// The line exactly as written, modifiers included.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The line without its leading blanks and modifiers.
    #[must_use]
    pub fn command(&self) -> &str {
        self.text.get(self.prefix_len..).unwrap_or_default()
    }

    /// Modifiers of the line.
    #[must_use]
    pub const fn flags(&self) -> LineFlags {
        self.flags
    }
}

/// A recipe split into command lines.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChoppedRecipe {
    lines: Vec<CommandLine>,
    any_recurse: bool,
}

impl ChoppedRecipe {
    /// Lines in execution order.
    #[must_use]
    pub fn lines(&self) -> &[CommandLine] {
        &self.lines
    }

    /// Number of lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the recipe has no lines at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether any line is recursive.
    #[must_use]
    pub const fn any_recurse(&self) -> bool {
        self.any_recurse
    }
}

/// Chop `raw` into flagged command lines.
///
/// In `one_shell` mode the text, minus one trailing newline, is one line.
///
/// # Errors
///
/// Returns [`RecipeError::TooManyLines`] when the recipe has more than
/// [`MAX_RECIPE_LINES`] lines.
pub fn chop(raw: &str, one_shell: bool, location: &SourceLocation) -> Result<ChoppedRecipe, RecipeError> {
    let texts = if one_shell {
        vec![raw.strip_suffix('\n').unwrap_or(raw)]
    } else {
        logical_lines(raw, location)?
    };
    let lines: Vec<CommandLine> = texts.into_iter().map(CommandLine::parse).collect();
    let any_recurse = lines
        .iter()
        .any(|line| line.flags.contains(LineFlags::RECURSE));
    Ok(ChoppedRecipe { lines, any_recurse })
}

fn logical_lines<'a>(raw: &'a str, location: &SourceLocation) -> Result<Vec<&'a str>, RecipeError> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut backslashes = 0_usize;
    let push = |lines: &mut Vec<&'a str>, line: &'a str| {
        if lines.len() == MAX_RECIPE_LINES {
            return Err(RecipeError::TooManyLines {
                location: location.clone(),
                limit: MAX_RECIPE_LINES,
            });
        }
        lines.push(line);
        Ok(())
    };
    for (idx, ch) in raw.char_indices() {
        match ch {
            '\\' => backslashes += 1,
            '\n' if !backslashes.is_multiple_of(2) => backslashes = 0,
            '\n' => {
                push(&mut lines, raw.get(start..idx).unwrap_or_default())?;
                start = idx + 1;
                backslashes = 0;
            }
            _ => backslashes = 0,
        }
    }
    if let Some(tail) = raw.get(start..).filter(|tail| !tail.is_empty()) {
        push(&mut lines, tail)?;
    }
    Ok(lines)
}

/// Raw recipe text with its chopped form cached.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Recipe {
    text: String,
    location: SourceLocation,
    chopped: Option<ChoppedRecipe>,
}

impl Recipe {
    /// Recipe text from a built-in rule.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_location(text, SourceLocation::builtin())
    }

    /// Recipe text defined at `location`.
    #[must_use]
    pub fn with_location(text: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            text: text.into(),
            location,
            chopped: None,
        }
    }

    /// Raw text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Where the recipe was defined.
    #[must_use]
    pub const fn location(&self) -> &SourceLocation {
        &self.location
    }

    /// Whether the text holds nothing but whitespace and line modifiers.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text
            .chars()
            .all(|ch| ch.is_whitespace() || LineFlags::from_prefix(ch).is_some())
    }

    /// Chop the recipe, reusing the result of an earlier call.
    ///
    /// # Errors
    ///
    /// Returns [`RecipeError::TooManyLines`] when the recipe has more than
    /// [`MAX_RECIPE_LINES`] lines.
    pub fn chop(&mut self, one_shell: bool) -> Result<&ChoppedRecipe, RecipeError> {
        let chopped = match self.chopped.take() {
            Some(done) => done,
            None => chop(&self.text, one_shell, &self.location)?,
        };
        Ok(self.chopped.insert(chopped))
    }

    /// The chopped form, if [`Self::chop`] has run.
    #[must_use]
    pub const fn chopped(&self) -> Option<&ChoppedRecipe> {
        self.chopped.as_ref()
    }

    /// Database listing of the recipe.
    #[must_use]
    pub const fn listing(&self) -> RecipeListing<'_> {
        RecipeListing(self)
    }
}

/// [`fmt::Display`] adapter printing a recipe the way database dumps do.
#[derive(Clone, Copy, Debug)]
pub struct RecipeListing<'a>(&'a Recipe);

impl fmt::Display for RecipeListing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let recipe = self.0;
        match recipe.location.file() {
            Some(file) => writeln!(
                f,
                "#  recipe to execute (from '{file}', line {}):",
                recipe.location.line
            )?,
            None => writeln!(f, "#  recipe to execute (built-in):")?,
        }
        let mut rest = recipe.text.as_str();
        while !rest.is_empty() {
            let end = unescaped_newline(rest).unwrap_or(rest.len());
            let (line, tail) = rest.split_at(end);
            writeln!(f, "    {line}")?;
            rest = tail.strip_prefix('\n').unwrap_or(tail);
        }
        Ok(())
    }
}

fn unescaped_newline(text: &str) -> Option<usize> {
    let mut escaped = false;
    for (idx, ch) in text.char_indices() {
        if ch == '\n' && !escaped {
            return Some(idx);
        }
        escaped = ch == '\\' && !escaped;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn chop_texts(raw: &str) -> Vec<String> {
        chop(raw, false, &SourceLocation::builtin())
            .expect("chop")
            .lines()
            .iter()
            .map(|line| line.text().to_owned())
            .collect()
    }

    #[rstest]
    #[case("", &[])]
    #[case("a", &["a"])]
    #[case("a\n", &["a"])]
    #[case("a\n\nb", &["a", "", "b"])]
    #[case("a \\\nb\nc", &["a \\\nb", "c"])]
    #[case("a \\\\\nb", &["a \\\\", "b"])]
    #[case("a \\\\\\\nb", &["a \\\\\\\nb"])]
    #[case("x\\\n", &["x\\\n"])]
    fn splits_on_unescaped_newlines(#[case] raw: &str, #[case] expected: &[&str]) {
        assert_eq!(chop_texts(raw), expected);
    }

    #[rstest]
    #[case("@echo", LineFlags::SILENT, "echo")]
    #[case("-rm x", LineFlags::IGNORE_ERRORS, "rm x")]
    #[case("+touch", LineFlags::RECURSE, "touch")]
    #[case(" @ - cc", LineFlags::SILENT | LineFlags::IGNORE_ERRORS, "cc")]
    #[case("$(MAKE) all", LineFlags::RECURSE, "$(MAKE) all")]
    #[case("@${MAKE} -C lib", LineFlags::SILENT | LineFlags::RECURSE, "${MAKE} -C lib")]
    #[case("echo $(MAKEFLAGS)", LineFlags::empty(), "echo $(MAKEFLAGS)")]
    fn parses_line_modifiers(#[case] text: &str, #[case] flags: LineFlags, #[case] command: &str) {
        let line = CommandLine::parse(text);
        assert_eq!(line.flags(), flags);
        assert_eq!(line.command(), command);
        assert_eq!(line.text(), text);
    }

    #[test]
    fn one_shell_keeps_a_single_line() {
        let chopped = chop("a\nb\n", true, &SourceLocation::builtin()).expect("chop");
        assert_eq!(chopped.len(), 1);
        assert_eq!(chopped.lines()[0].text(), "a\nb");
    }

    #[test]
    fn enforces_the_line_limit() {
        let at_limit = "x\n".repeat(MAX_RECIPE_LINES);
        let chopped = chop(&at_limit, false, &SourceLocation::builtin()).expect("at the limit");
        assert_eq!(chopped.len(), MAX_RECIPE_LINES);

        let over = format!("{at_limit}y");
        let location = SourceLocation::new("Makefile", 12);
        let err = chop(&over, false, &location).expect_err("over the limit");
        assert_eq!(
            err.to_string(),
            "Makefile:12: Recipe has too many lines (limit 65535)"
        );
    }

    #[test]
    fn chop_result_is_cached() {
        let mut recipe = Recipe::new("a\nb");
        assert!(recipe.chopped().is_none());
        assert_eq!(recipe.chop(false).expect("chop").len(), 2);
        assert_eq!(recipe.chop(true).expect("cached").len(), 2);
    }

    #[rstest]
    #[case(" \t\n", true)]
    #[case("@-+\n", true)]
    #[case("", true)]
    #[case("@true", false)]
    fn detects_blank_recipes(#[case] text: &str, #[case] blank: bool) {
        assert_eq!(Recipe::new(text).is_blank(), blank);
    }

    #[test]
    fn listing_prints_logical_lines() {
        let recipe = Recipe::with_location("cc -c \\\n  x.c\n@echo done", SourceLocation::new("Makefile", 3));
        assert_eq!(
            recipe.listing().to_string(),
            "#  recipe to execute (from 'Makefile', line 3):\n    cc -c \\\n  x.c\n    @echo done\n"
        );
        assert_eq!(
            Recipe::new("true").listing().to_string(),
            "#  recipe to execute (built-in):\n    true\n"
        );
    }
}
