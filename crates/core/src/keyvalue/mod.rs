//! Parser for the engine's `[Section]` / `key=value` text format, used by the
//! options files and the music library. `#` starts a comment that runs to the
//! end of the line; comments and surrounding whitespace are stripped before a
//! line is interpreted.

use std::fs;
use std::path::Path;

use crate::{ArenaError, Result};

pub const COMMENT: char = '#';
pub const SECTION_FRONT: char = '[';
pub const SECTION_BACK: char = ']';
pub const PAIR_SEPARATOR: char = '=';

/// A named group of key-value pairs, sorted by key for binary search.
#[derive(Debug, Clone, Default)]
pub struct Section {
    name: String,
    pairs: Vec<(String, String)>,
}

impl Section {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterates over pairs in key-sorted order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Looks up the raw string value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        // Duplicate keys are allowed; report the first in sorted order.
        let index = self.pairs.partition_point(|(k, _)| k.as_str() < key);
        match self.pairs.get(index) {
            Some((k, value)) if k == key => Some(value),
            _ => None,
        }
    }

    /// Looks up a boolean value. Only case-insensitive `true`/`false` parse;
    /// anything else reads as `None`.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        let value = self.get(key)?;
        if value.eq_ignore_ascii_case("true") {
            Some(true)
        } else if value.eq_ignore_ascii_case("false") {
            Some(false)
        } else {
            None
        }
    }

    /// Looks up an integer value; a partial or failed parse reads as `None`.
    pub fn get_int(&self, key: &str) -> Option<i32> {
        self.get(key)?.parse().ok()
    }

    /// Looks up a floating point value; a partial or failed parse reads as
    /// `None`.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key)?.parse().ok()
    }

    fn add(&mut self, key: String, value: String) {
        self.pairs.push((key, value));
    }

    fn sort(&mut self) {
        self.pairs.sort_by(|(a, _), (b, _)| a.cmp(b));
    }
}

/// A parsed key-value file with its sections sorted by name.
#[derive(Debug, Clone, Default)]
pub struct KeyValueFile {
    sections: Vec<Section>,
}

impl KeyValueFile {
    /// Reads and parses the file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Self::parse(&text, &path.display().to_string())
    }

    /// Parses key-value text. `source` names the origin for diagnostics.
    pub fn parse(text: &str, source: &str) -> Result<Self> {
        let mut sections: Vec<Section> = Vec::new();
        let mut active: Option<usize> = None;

        // Line numbers start at 1 since most users aren't programmers.
        for (line_number, raw_line) in text.lines().enumerate().map(|(i, l)| (i + 1, l)) {
            let mut line = raw_line.trim();
            if let Some(comment_index) = line.find(COMMENT) {
                line = line[..comment_index].trim_end();
            }

            if line.is_empty() {
                continue;
            }

            if line.len() < 3 {
                // Not long enough to be a section or key-value pair.
                return Err(ArenaError::parse(
                    source,
                    line_number,
                    format!("syntax error \"{line}\""),
                ));
            }

            if let Some(front_index) = line.find(SECTION_FRONT) {
                // Section line. The closing bracket must leave room for at
                // least one name character.
                let back_index = line[front_index..]
                    .find(SECTION_BACK)
                    .map(|i| front_index + i)
                    .filter(|&back| back > front_index + 1)
                    .ok_or_else(|| {
                        ArenaError::parse(
                            source,
                            line_number,
                            format!("invalid section \"{line}\""),
                        )
                    })?;

                let name = line[front_index + 1..back_index].trim();
                if sections.iter().any(|section| section.name == name) {
                    return Err(ArenaError::parse(
                        source,
                        line_number,
                        format!("section \"{name}\" already defined"),
                    ));
                }

                sections.push(Section {
                    name: name.to_string(),
                    pairs: Vec::new(),
                });
                active = Some(sections.len() - 1);
            } else if line.contains(PAIR_SEPARATOR) {
                let tokens: Vec<&str> = line.split(PAIR_SEPARATOR).collect();
                if tokens.len() != 2 {
                    return Err(ArenaError::parse(
                        source,
                        line_number,
                        format!("invalid pair \"{line}\""),
                    ));
                }

                let key = tokens[0].trim();
                let value = tokens[1].trim_start();
                if key.is_empty() {
                    return Err(ArenaError::parse(
                        source,
                        line_number,
                        format!("empty key in \"{line}\""),
                    ));
                }

                match active {
                    Some(index) => sections[index].add(key.to_string(), value.to_string()),
                    None => {
                        // All pairs must live inside a section.
                        tracing::warn!(
                            source,
                            line_number,
                            "ignoring \"{line}\", no active section"
                        );
                    }
                }
            } else {
                return Err(ArenaError::parse(
                    source,
                    line_number,
                    format!("invalid line \"{line}\""),
                ));
            }
        }

        for section in &mut sections {
            section.sort();
        }
        sections.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Self { sections })
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Finds a section by exact name.
    pub fn section(&self, name: &str) -> Option<&Section> {
        let index = self
            .sections
            .binary_search_by(|section| section.name.as_str().cmp(name))
            .ok()?;
        Some(&self.sections[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sections_and_pairs() {
        let text = "\
# Leading comment.
[Audio]
MusicVolume=0.8
SoundVolume = 0.5  # trailing comment
MidiConfig=data/eawpats/timidity.cfg

[Graphics]
Fullscreen=True
ScreenWidth=1280
";
        let file = KeyValueFile::parse(text, "test").unwrap();
        assert_eq!(file.sections().len(), 2);

        let audio = file.section("Audio").unwrap();
        assert_eq!(audio.len(), 3);
        assert_eq!(audio.get_f64("MusicVolume"), Some(0.8));
        assert_eq!(audio.get_f64("SoundVolume"), Some(0.5));
        assert_eq!(audio.get("MidiConfig"), Some("data/eawpats/timidity.cfg"));

        let graphics = file.section("Graphics").unwrap();
        assert_eq!(graphics.get_bool("Fullscreen"), Some(true));
        assert_eq!(graphics.get_int("ScreenWidth"), Some(1280));
    }

    #[test]
    fn sections_come_back_sorted() {
        let text = "[Zeta]\na=1\n[Alpha]\nb=2\n";
        let file = KeyValueFile::parse(text, "test").unwrap();
        let names: Vec<_> = file.sections().iter().map(Section::name).collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
    }

    #[test]
    fn type_mismatches_read_as_none() {
        let text = "[S]\nkey=maybe\n";
        let file = KeyValueFile::parse(text, "test").unwrap();
        let section = file.section("S").unwrap();
        assert_eq!(section.get("key"), Some("maybe"));
        assert_eq!(section.get_bool("key"), None);
        assert_eq!(section.get_int("key"), None);
        assert_eq!(section.get_f64("key"), None);
    }

    #[test]
    fn duplicate_sections_are_an_error() {
        let text = "[S]\na=1\n[S]\nb=2\n";
        let error = KeyValueFile::parse(text, "test").unwrap_err();
        assert!(matches!(error, ArenaError::Parse { line: 3, .. }));
    }

    #[test]
    fn pair_outside_section_is_ignored() {
        let text = "stray=1\n[S]\nkept=2\n";
        let file = KeyValueFile::parse(text, "test").unwrap();
        assert_eq!(file.sections().len(), 1);
        assert_eq!(file.section("S").unwrap().get("kept"), Some("2"));
    }

    #[test]
    fn malformed_lines_are_errors() {
        for text in ["ab\n", "[S]\nnot a pair\n", "[S]\na=b=c\n", "[S]\n=value\n", "[]\n"] {
            assert!(
                matches!(KeyValueFile::parse(text, "test"), Err(ArenaError::Parse { .. })),
                "expected parse error for {text:?}"
            );
        }
    }

    #[test]
    fn comment_only_value_lines_are_kept_empty() {
        let text = "[S]\nkey=   # nothing\n";
        let file = KeyValueFile::parse(text, "test").unwrap();
        assert_eq!(file.section("S").unwrap().get("key"), Some(""));
    }
}
