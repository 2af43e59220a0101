//! Address list parsing (RFC 5322 §3.4).
//!
//! The header value is first split into lexical tokens (atoms, quoted
//! strings, domain literals, comments and specials) and then walked with a
//! small recursive-descent parser covering `name-addr`, bare `addr-spec`,
//! and `group` forms. The parser never fails: anything it cannot make sense
//! of is skipped up to the next comma.

use super::encoded_word::decode_encoded_words;
use super::Decoded;
use crate::model::address::Address;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// Atom or dot-atom, possibly an encoded-word.
    Word(String),
    /// Quoted-string content with quoted-pairs resolved.
    Quoted(String),
    /// Domain literal, brackets included.
    Literal(String),
    /// Comment content with quoted-pairs resolved.
    Comment(String),
    /// One of `< > : ; @ ,`.
    Special(char),
}

const SPECIALS: &[char] = &['<', '>', ':', ';', '@', ','];

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '(' {
            chars.next();
            tokens.push(Token::Comment(read_comment(&mut chars)));
        } else if c == '"' {
            chars.next();
            tokens.push(Token::Quoted(read_quoted(&mut chars)));
        } else if c == '[' {
            let mut literal = String::new();
            for ch in chars.by_ref() {
                literal.push(ch);
                if ch == ']' {
                    break;
                }
            }
            tokens.push(Token::Literal(literal));
        } else if SPECIALS.contains(&c) {
            chars.next();
            tokens.push(Token::Special(c));
        } else {
            let mut word = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() || SPECIALS.contains(&ch) || matches!(ch, '(' | '"' | '[') {
                    break;
                }
                word.push(ch);
                chars.next();
            }
            tokens.push(Token::Word(word));
        }
    }

    tokens
}

/// Read a comment body after its opening `(`, honoring nesting and escapes.
/// An unterminated comment runs to the end of the input.
fn read_comment(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut depth = 1;
    let mut text = String::new();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    text.push(escaped);
                }
            }
            '(' => {
                depth += 1;
                text.push(ch);
            }
            ')' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
                text.push(ch);
            }
            _ => text.push(ch),
        }
    }
    text
}

/// Read a quoted-string body after its opening `"`.
fn read_quoted(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut text = String::new();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    text.push(escaped);
                }
            }
            '"' => break,
            _ => text.push(ch),
        }
    }
    text
}

/// A piece of a phrase (display name or local part).
enum PhraseWord {
    Raw(String),
    Quoted(String),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_list(&mut self, out: &mut Vec<Address>, in_group: bool) {
        loop {
            match self.peek() {
                None => return,
                Some(Token::Special(';')) if in_group => {
                    self.pos += 1;
                    return;
                }
                Some(Token::Special(',' | ';' | '>')) | Some(Token::Comment(_)) => {
                    self.pos += 1;
                }
                _ => self.parse_address(out, in_group),
            }
        }
    }

    fn parse_address(&mut self, out: &mut Vec<Address>, in_group: bool) {
        let mut phrase: Vec<PhraseWord> = Vec::new();

        loop {
            match self.next() {
                None => break,
                Some(Token::Word(w)) | Some(Token::Literal(w)) => phrase.push(PhraseWord::Raw(w)),
                Some(Token::Quoted(q)) => phrase.push(PhraseWord::Quoted(q)),
                Some(Token::Comment(_)) => {}
                Some(Token::Special(':')) if !in_group => {
                    // Group: the name is discarded, members are flattened.
                    self.parse_list(out, true);
                    return;
                }
                Some(Token::Special('<')) => {
                    let address = self.read_angle_addr();
                    if !address.is_empty() {
                        out.push(Address::new(decode_phrase(&phrase), address));
                    }
                    self.skip_to_separator();
                    return;
                }
                Some(Token::Special('@')) => {
                    let local = local_part(&phrase);
                    let domain = self.read_domain();
                    let name = self.trailing_comment().unwrap_or_default();
                    if !local.is_empty() || !domain.is_empty() {
                        out.push(Address::new(
                            decode_encoded_words(name.trim()),
                            format!("{local}@{domain}"),
                        ));
                    }
                    self.skip_to_separator();
                    return;
                }
                Some(Token::Special(',' | ';')) => {
                    self.pos -= 1;
                    break;
                }
                Some(Token::Special(_)) => {}
            }
        }

        // No `@` and no angle brackets: keep the text as the address.
        if !phrase.is_empty() {
            out.push(Address::new("", phrase_text(&phrase, " ")));
        }
    }

    /// Read the inside of `<...>`, dropping comments and obsolete routes.
    fn read_angle_addr(&mut self) -> String {
        let mut address = String::new();
        while let Some(token) = self.next() {
            match token {
                Token::Special('>') => break,
                Token::Special(':') => address.clear(), // end of "@a,@b:" route
                Token::Special('@') => address.push('@'),
                Token::Special(_) | Token::Comment(_) => {}
                Token::Word(w) | Token::Literal(w) => address.push_str(&w),
                Token::Quoted(q) => address.push_str(&quote_local(&q)),
            }
        }
        address
    }

    fn read_domain(&mut self) -> String {
        let mut domain = String::new();
        while let Some(token) = self.peek() {
            match token {
                Token::Comment(_) if domain.is_empty() => self.pos += 1,
                Token::Word(w) | Token::Literal(w) => {
                    // "example . com" (obsolete spacing) continues the domain.
                    if domain.is_empty() || w.starts_with('.') || domain.ends_with('.') {
                        domain.push_str(w);
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
        domain
    }

    fn trailing_comment(&mut self) -> Option<String> {
        let mut found = None;
        while let Some(Token::Comment(c)) = self.peek() {
            found = Some(c.clone());
            self.pos += 1;
        }
        found.filter(|c| !c.trim().is_empty())
    }

    fn skip_to_separator(&mut self) {
        while let Some(token) = self.peek() {
            if matches!(token, Token::Special(',' | ';')) {
                return;
            }
            self.pos += 1;
        }
    }
}

/// Display name: words joined by single spaces, then encoded-words decoded,
/// so adjacent encoded-words merge and literal atoms keep their spacing.
fn decode_phrase(phrase: &[PhraseWord]) -> String {
    decode_encoded_words(&phrase_text(phrase, " "))
        .trim()
        .to_string()
}

fn phrase_text(phrase: &[PhraseWord], separator: &str) -> String {
    phrase
        .iter()
        .map(|word| match word {
            PhraseWord::Raw(s) | PhraseWord::Quoted(s) => s.as_str(),
        })
        .collect::<Vec<_>>()
        .join(separator)
}

fn local_part(phrase: &[PhraseWord]) -> String {
    phrase
        .iter()
        .map(|word| match word {
            PhraseWord::Raw(s) => s.clone(),
            PhraseWord::Quoted(s) => quote_local(s),
        })
        .collect()
}

/// Re-quote a quoted local part only when it needs quoting.
fn quote_local(s: &str) -> String {
    let needs_quotes = s.is_empty()
        || s.chars()
            .any(|c| c.is_whitespace() || "()<>[]:;@\\,\"".contains(c));
    if needs_quotes {
        format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        s.to_string()
    }
}

/// Parse one address-list header value into its mailboxes, in order.
///
/// Groups are flattened; comments are ignored except that a comment after a
/// bare `addr-spec` becomes its display name (`a@b.c (Alice)`).
pub fn parse_address_list(input: &str) -> Vec<Address> {
    let mut parser = Parser {
        tokens: tokenize(input),
        pos: 0,
    };
    let mut out = Vec::new();
    parser.parse_list(&mut out, false);
    out
}

/// Like [`parse_address_list`], flagging input that looked like it held an
/// address (`@` present) but yielded none.
pub fn decode_address_list(input: &str) -> Decoded<Vec<Address>> {
    let addresses = parse_address_list(input);
    if addresses.is_empty() && input.contains('@') {
        Decoded::fallback(addresses)
    } else {
        Decoded::parsed(addresses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(input: &str) -> Address {
        let list = parse_address_list(input);
        assert_eq!(list.len(), 1, "expected one address in {input:?}: {list:?}");
        list.into_iter().next().unwrap_or_default()
    }

    #[test]
    fn test_parse_bare_address() {
        assert_eq!(single("user@example.com"), Address::new("", "user@example.com"));
    }

    #[test]
    fn test_parse_angle_address() {
        assert_eq!(single("<user@example.com>"), Address::new("", "user@example.com"));
    }

    #[test]
    fn test_parse_name_and_address() {
        assert_eq!(
            single("User One <user1@example.com>"),
            Address::new("User One", "user1@example.com")
        );
    }

    #[test]
    fn test_parse_quoted_name_with_comma() {
        let list = parse_address_list("\"Last, First\" <a@b.com>, other@c.com");
        assert_eq!(
            list,
            vec![
                Address::new("Last, First", "a@b.com"),
                Address::new("", "other@c.com"),
            ]
        );
    }

    #[test]
    fn test_quoted_escapes_that_look_like_delimiters() {
        let addr = single(r#""Joe \"(the man)\" Q" <joe@example.com>"#);
        assert_eq!(addr.name, r#"Joe "(the man)" Q"#);
        assert_eq!(addr.address, "joe@example.com");
    }

    #[test]
    fn test_nested_comments_are_skipped() {
        let addr = single("Pete(A nice \\) chap (really)) <pete(his account)@silly.test(his host)>");
        assert_eq!(addr, Address::new("Pete", "pete@silly.test"));
    }

    #[test]
    fn test_comment_after_bare_address_becomes_name() {
        assert_eq!(
            single("jdoe@example.org (John Doe)"),
            Address::new("John Doe", "jdoe@example.org")
        );
    }

    #[test]
    fn test_group_is_flattened() {
        let list = parse_address_list(
            "A Group:Ed Jones <c@a.test>,joe@where.test,John <jdoe@one.test>;, after@x.test",
        );
        let addresses: Vec<&str> = list.iter().map(|a| a.address.as_str()).collect();
        assert_eq!(
            addresses,
            ["c@a.test", "joe@where.test", "jdoe@one.test", "after@x.test"]
        );
        assert_eq!(list[0].name, "Ed Jones");
    }

    #[test]
    fn test_empty_group() {
        assert!(parse_address_list("Undisclosed recipients:;").is_empty());
    }

    #[test]
    fn test_encoded_word_display_name() {
        assert_eq!(
            single("=?UTF-8?B?Sm9zw6kgR2FyY8OtYQ==?= <jose@example.com>").name,
            "José García"
        );
    }

    #[test]
    fn test_encoded_words_concatenated_with_atoms() {
        let addr = single("=?ISO-8859-1?Q?J=F6rg?= =?ISO-8859-1?Q?_M=FCller?= Jr. <jm@example.de>");
        assert_eq!(addr.name, "Jörg Müller Jr.");
    }

    #[test]
    fn test_obsolete_route_dropped() {
        assert_eq!(
            single("Route <@relay1.test,@relay2.test:user@final.test>").address,
            "user@final.test"
        );
    }

    #[test]
    fn test_quoted_local_part() {
        assert_eq!(
            single("\"john doe\"@example.com").address,
            "\"john doe\"@example.com"
        );
        assert_eq!(single("\"plain\"@example.com").address, "plain@example.com");
    }

    #[test]
    fn test_empty_elements_skipped() {
        let list = parse_address_list(" , a@b.c,, ,d@e.f ,");
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_lone_word_kept_as_address() {
        assert_eq!(single("Moderator-Address"), Address::new("", "Moderator-Address"));
    }

    #[test]
    fn test_unterminated_angle_is_tolerated() {
        assert_eq!(
            single("Broken <broken@example.com"),
            Address::new("Broken", "broken@example.com")
        );
    }

    #[test]
    fn test_decode_address_list_flags_garbage() {
        assert!(decode_address_list("(only@comment)").defaulted);
        assert!(!decode_address_list("").defaulted);
        assert!(!decode_address_list("a@b.c").defaulted);
    }
}
