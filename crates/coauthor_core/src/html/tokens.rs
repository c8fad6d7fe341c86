//! Markup tokenizer.
//!
//! Scans an HTML string into a flat token sequence over an explicit cursor.
//! The grammar is intentionally small: tags, attributes, text, comments and
//! doctype noise. Anything that fails to parse as a tag is kept as text so a
//! malformed document degrades instead of erroring.

use indexmap::IndexMap;

use super::entities::unescape;
use crate::doc::is_void_markup;

/// One markup token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `<tag attr="v">`
    Open {
        tag: String,
        attrs: IndexMap<String, String>,
    },
    /// `</tag>`
    Close { tag: String },
    /// `<tag/>` or a void tag written without the slash (`<br>`)
    SelfClose {
        tag: String,
        attrs: IndexMap<String, String>,
    },
    /// Entity-unescaped character data
    Text(String),
}

/// Cursor over the source string.
struct Tokenizer<'src> {
    src: &'src str,
    pos: usize,
}

impl<'src> Tokenizer<'src> {
    fn new(src: &'src str) -> Self {
        Self { src, pos: 0 }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn rest(&self) -> &'src str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn eat(&mut self, prefix: &str) -> bool {
        if self.rest().starts_with(prefix) {
            self.pos += prefix.len();
            true
        } else {
            false
        }
    }

    /// Advance past `needle`, or to the end if it never appears.
    fn skip_past(&mut self, needle: &str) {
        match self.rest().find(needle) {
            Some(offset) => self.pos += offset + needle.len(),
            None => self.pos = self.src.len(),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.bump();
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'src str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn next_token(&mut self) -> Option<Token> {
        if self.is_at_end() {
            return None;
        }

        if self.rest().starts_with("<!--") {
            self.skip_past("-->");
            return self.next_token();
        }
        if self.rest().starts_with("<!") || self.rest().starts_with("<?") {
            self.skip_past(">");
            return self.next_token();
        }
        if self.rest().starts_with("</") {
            self.pos += 2;
            let tag = self
                .take_while(|c| c.is_ascii_alphanumeric())
                .to_ascii_lowercase();
            self.skip_past(">");
            return Some(Token::Close { tag });
        }
        if self.peek() == Some('<') && self.looks_like_tag() {
            return Some(self.read_tag());
        }

        // Character data up to the next plausible tag.
        let start = self.pos;
        self.bump();
        while let Some(ch) = self.peek() {
            if ch == '<' {
                break;
            }
            self.bump();
        }
        Some(Token::Text(unescape(&self.src[start..self.pos])))
    }

    /// A `<` only opens a tag when followed by an ASCII letter.
    fn looks_like_tag(&self) -> bool {
        self.rest()
            .chars()
            .nth(1)
            .is_some_and(|c| c.is_ascii_alphabetic())
    }

    fn read_tag(&mut self) -> Token {
        self.bump(); // '<'
        let tag = self
            .take_while(|c| c.is_ascii_alphanumeric())
            .to_ascii_lowercase();

        let mut attrs = IndexMap::new();
        let mut self_closed = false;

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => break,
                Some('>') => {
                    self.bump();
                    break;
                }
                Some('/') => {
                    self.bump();
                    if self.eat(">") {
                        self_closed = true;
                        break;
                    }
                }
                Some(_) => {
                    if let Some((name, value)) = self.read_attribute() {
                        attrs.insert(name, value);
                    } else {
                        // Unparseable junk inside the tag; drop one char and retry.
                        self.bump();
                    }
                }
            }
        }

        if self_closed || is_void_markup(&tag) {
            Token::SelfClose { tag, attrs }
        } else {
            Token::Open { tag, attrs }
        }
    }

    fn read_attribute(&mut self) -> Option<(String, String)> {
        let name = self
            .take_while(|c| !c.is_whitespace() && c != '=' && c != '>' && c != '/')
            .to_ascii_lowercase();
        if name.is_empty() {
            return None;
        }

        self.skip_whitespace();
        if !self.eat("=") {
            // Boolean attribute.
            return Some((name, String::new()));
        }
        self.skip_whitespace();

        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let raw = self.take_while(|c| c != quote);
                let value = unescape(raw);
                self.bump(); // closing quote
                value
            }
            _ => unescape(self.take_while(|c| !c.is_whitespace() && c != '>')),
        };
        Some((name, value))
    }
}

/// Tokenize a markup string. Adjacent character data collapses into a single
/// text token.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut tokenizer = Tokenizer::new(source);
    let mut tokens: Vec<Token> = Vec::new();
    while let Some(token) = tokenizer.next_token() {
        if let Token::Text(curr) = &token
            && let Some(Token::Text(prev)) = tokens.last_mut()
        {
            prev.push_str(curr);
            continue;
        }
        tokens.push(token);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(tag: &str) -> Token {
        Token::Open {
            tag: tag.to_string(),
            attrs: IndexMap::new(),
        }
    }

    fn close(tag: &str) -> Token {
        Token::Close {
            tag: tag.to_string(),
        }
    }

    fn text(t: &str) -> Token {
        Token::Text(t.to_string())
    }

    #[test]
    fn test_simple_paragraph() {
        let tokens = tokenize("<p>hello</p>");
        assert_eq!(tokens, vec![open("p"), text("hello"), close("p")]);
    }

    #[test]
    fn test_attributes_quoted_and_bare() {
        let tokens = tokenize(r#"<a href="https://x.dev" target=_blank rel='noopener'>x</a>"#);
        match &tokens[0] {
            Token::Open { tag, attrs } => {
                assert_eq!(tag, "a");
                assert_eq!(attrs.get("href").unwrap(), "https://x.dev");
                assert_eq!(attrs.get("target").unwrap(), "_blank");
                assert_eq!(attrs.get("rel").unwrap(), "noopener");
            }
            other => panic!("expected open tag, got {:?}", other),
        }
    }

    #[test]
    fn test_void_tag_without_slash() {
        let tokens = tokenize("<p>a<br>b</p>");
        assert_eq!(
            tokens,
            vec![
                open("p"),
                text("a"),
                Token::SelfClose {
                    tag: "br".to_string(),
                    attrs: IndexMap::new(),
                },
                text("b"),
                close("p"),
            ]
        );
    }

    #[test]
    fn test_self_closing_img_keeps_attrs() {
        let tokens = tokenize(r#"<img src="cat.png" alt="a cat"/>"#);
        match &tokens[0] {
            Token::SelfClose { tag, attrs } => {
                assert_eq!(tag, "img");
                assert_eq!(attrs.get("src").unwrap(), "cat.png");
                assert_eq!(attrs.get("alt").unwrap(), "a cat");
            }
            other => panic!("expected self-close, got {:?}", other),
        }
    }

    #[test]
    fn test_entities_unescaped_in_text() {
        let tokens = tokenize("<p>a &amp; b</p>");
        assert_eq!(tokens[1], text("a & b"));
    }

    #[test]
    fn test_comments_and_doctype_skipped() {
        let tokens = tokenize("<!DOCTYPE html><!-- note --><p>x</p>");
        assert_eq!(tokens, vec![open("p"), text("x"), close("p")]);
    }

    #[test]
    fn test_tags_lowercased() {
        let tokens = tokenize("<P>x</P>");
        assert_eq!(tokens, vec![open("p"), text("x"), close("p")]);
    }

    #[test]
    fn test_stray_lt_is_text() {
        let tokens = tokenize("<p>2 < 3</p>");
        assert_eq!(tokens, vec![open("p"), text("2 < 3"), close("p")]);
    }

    #[test]
    fn test_boolean_attribute() {
        let tokens = tokenize("<ul data-checked><li>x</li></ul>");
        match &tokens[0] {
            Token::Open { attrs, .. } => {
                assert_eq!(attrs.get("data-checked").unwrap(), "");
            }
            other => panic!("expected open tag, got {:?}", other),
        }
    }
}
