//! WikiText pre-cleaning
//!
//! Strips the parts of MediaWiki markup that the converter handles badly
//! (tables, comments, layout templates) before the structural conversion.
//! Links, emphasis and references are left alone for the converter.

/// Cleans raw wikitext returned by the parse API
#[derive(Debug, Clone)]
pub struct WikiTextCleaner {
    /// Lines starting with any of these are dropped whole
    dropped_prefixes: Vec<String>,
}

impl Default for WikiTextCleaner {
    fn default() -> Self {
        Self {
            dropped_prefixes: ["{|", "|", "<!--", "{{Clear}}"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl WikiTextCleaner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clean wikitext, returning markup ready for conversion
    pub fn clean(&self, wikitext: &str) -> String {
        let text = self.unescape(wikitext);

        let mut kept = String::with_capacity(text.len());
        for line in text.split('\n') {
            if self.dropped_prefixes.iter().any(|p| line.starts_with(p.as_str())) {
                continue;
            }
            kept.push_str(line);
            kept.push('\n');
        }

        let text = self.remove_comments(&kept);
        self.remove_tables_markup(&text)
    }

    /// Decode the escapes some wikis leave in the JSON-decoded markup
    fn unescape(&self, text: &str) -> String {
        text.replace("\\n", "\n")
            .replace("\\u003C", "<")
            .replace("\\u003E", ">")
    }

    /// Remove HTML/XML comments
    fn remove_comments(&self, text: &str) -> String {
        let mut result = String::with_capacity(text.len());
        let mut chars = text.chars().peekable();
        let mut in_comment = false;

        while let Some(c) = chars.next() {
            if !in_comment {
                if c == '<' && chars.peek() == Some(&'!') {
                    let lookahead: String = chars.clone().take(3).collect();
                    if lookahead.starts_with("!--") {
                        in_comment = true;
                        chars.next(); // !
                        chars.next(); // -
                        chars.next(); // -
                        continue;
                    }
                }
                result.push(c);
            } else if c == '-' && chars.peek() == Some(&'-') {
                chars.next();
                if chars.peek() == Some(&'>') {
                    chars.next();
                    in_comment = false;
                }
            }
        }

        result
    }

    /// Remove inline wiki tables {| ... |}
    fn remove_tables_markup(&self, text: &str) -> String {
        let mut result = String::with_capacity(text.len());
        let mut depth = 0;
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '{' && chars.peek() == Some(&'|') {
                depth += 1;
                chars.next(); // consume '|'
            } else if depth > 0 && c == '|' && chars.peek() == Some(&'}') {
                depth -= 1;
                chars.next(); // consume '}'
            } else if depth == 0 {
                result.push(c);
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_table_and_layout_lines() {
        let cleaner = WikiTextCleaner::new();
        let result = cleaner.clean("Intro\n{| class=\"wikitable\"\n|-\n| cell\n|}\n{{Clear}}\nOutro");
        assert_eq!(result, "Intro\nOutro\n");
    }

    #[test]
    fn test_unescapes_literal_sequences() {
        let cleaner = WikiTextCleaner::new();
        let result = cleaner.clean(r"Line one\nLine two<ref>note</ref>");
        assert_eq!(result, "Line one\nLine two<ref>note</ref>\n");
    }

    #[test]
    fn test_strips_inline_comments() {
        let cleaner = WikiTextCleaner::new();
        let result = cleaner.clean("Visible <!-- hidden --> text\n<!-- whole line -->\nEnd");
        assert_eq!(result, "Visible  text\nEnd\n");
    }

    #[test]
    fn test_strips_inline_tables() {
        let cleaner = WikiTextCleaner::new();
        let result = cleaner.clean("Before {| class=\"x\" || a || b |} After");
        assert_eq!(result, "Before  After\n");
    }

    #[test]
    fn test_keeps_links_and_emphasis() {
        let cleaner = WikiTextCleaner::new();
        let text = "[[Helena Petrovna Blavatsky|H. P. Blavatsky]]'s writing room at [[Adyar (campus)|Adyar]] with ''italic'' and '''bold'''.";
        assert_eq!(cleaner.clean(text), format!("{}\n", text));
    }

    #[test]
    fn test_redirect_marker_survives() {
        let cleaner = WikiTextCleaner::new();
        assert_eq!(cleaner.clean("#REDIRECT [[Target Page]]"), "#REDIRECT [[Target Page]]\n");
    }
}
