use crate::error::ExtractError;
use regex::Regex;

/// Lines carrying a running page-number marker, e.g. "Confidential - Page 12".
const BOILERPLATE_PATTERN: &str = r"(?m)^.*\bPage\s+\d+.*$";

pub struct Cleaner {
    boilerplate: Regex,
}

impl Cleaner {
    pub fn new() -> Result<Self, ExtractError> {
        Ok(Self {
            boilerplate: Regex::new(BOILERPLATE_PATTERN)?,
        })
    }

    /// Strips boilerplate lines and collapses every interior whitespace run
    /// (newlines included) to a single space. Total: never fails, never
    /// touches the filesystem.
    pub fn clean(&self, text: &str) -> String {
        let stripped = self.boilerplate.replace_all(text, "");
        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_marker_lines_are_removed_and_whitespace_collapsed() {
        let cleaner = Cleaner::new().unwrap();
        let cleaned = cleaner.clean("Report header Page 3 of 9\n\nfoo   bar");

        assert_eq!(cleaned, "foo bar");
        assert!(!cleaned.contains("Page 3"));
    }

    #[test]
    fn marker_is_matched_anywhere_in_the_line() {
        let cleaner = Cleaner::new().unwrap();
        let cleaned = cleaner.clean("keep me\nsomething Page 42 something\nand me");

        assert_eq!(cleaned, "keep me and me");
    }

    #[test]
    fn plain_text_is_untouched_apart_from_whitespace() {
        let cleaner = Cleaner::new().unwrap();
        assert_eq!(cleaner.clean("  a\tb\nc  "), "a b c");
        assert_eq!(cleaner.clean(""), "");
    }

    #[test]
    fn page_word_without_number_survives() {
        let cleaner = Cleaner::new().unwrap();
        let cleaned = cleaner.clean("The next Page describes the setup.");
        assert_eq!(cleaned, "The next Page describes the setup.");
    }
}
