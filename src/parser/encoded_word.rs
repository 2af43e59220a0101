//! RFC 2047 encoded-word decoding for header values.

use super::{charset, transfer};

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// Whitespace between two adjacent encoded-words is dropped (RFC 2047 §6.2),
/// and the raw bytes of adjacent words in the same charset are joined before
/// charset conversion, so a multi-byte character split across two words
/// survives. A token that is not a well-formed encoded-word is kept as is.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut pending: Option<PendingWord> = None;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        let after_start = &remaining[start + 2..];

        match parse_word(after_start) {
            Some(word) => {
                let adjacent = pending.is_some() && before.trim().is_empty();
                if !adjacent {
                    flush(&mut pending, &mut result);
                    result.push_str(before);
                }
                let same_charset = pending
                    .as_ref()
                    .is_some_and(|p| p.charset.eq_ignore_ascii_case(word.charset));
                match pending.as_mut() {
                    Some(p) if same_charset => p.bytes.extend_from_slice(&word.bytes),
                    _ => {
                        flush(&mut pending, &mut result);
                        pending = Some(PendingWord {
                            charset: word.charset.to_string(),
                            bytes: word.bytes,
                        });
                    }
                }
                remaining = &after_start[word.consumed..];
            }
            None => {
                flush(&mut pending, &mut result);
                result.push_str(before);
                result.push_str("=?");
                remaining = after_start;
            }
        }
    }

    flush(&mut pending, &mut result);
    result.push_str(remaining);
    result
}

/// Decoded bytes of one or more adjacent words awaiting charset conversion.
struct PendingWord {
    charset: String,
    bytes: Vec<u8>,
}

fn flush(pending: &mut Option<PendingWord>, out: &mut String) {
    if let Some(word) = pending.take() {
        out.push_str(&charset::decode(&word.charset, &word.bytes));
    }
}

struct EncodedWord<'a> {
    charset: &'a str,
    bytes: Vec<u8>,
    consumed: usize, // bytes consumed from the string *after* the initial "=?"
}

fn parse_word(s: &str) -> Option<EncodedWord<'_>> {
    // Format: charset[*language]?encoding?encoded_text?=
    let first_q = s.find('?')?;
    let charset_field = &s[..first_q];

    let rest = &s[first_q + 1..];
    let second_q = rest.find('?')?;
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let end = rest2.find("?=")?;
    let encoded_text = &rest2[..end];

    if charset_field.is_empty()
        || [charset_field, encoding, encoded_text]
            .iter()
            .any(|field| field.contains(|c: char| c.is_whitespace()))
    {
        return None;
    }

    // RFC 2231 §5 allows a language tag: "utf-8*en".
    let charset = charset_field.split('*').next().unwrap_or(charset_field);

    let bytes = match encoding {
        "B" | "b" => transfer::decode_base64(encoded_text.as_bytes()),
        "Q" | "q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    Some(EncodedWord {
        charset,
        bytes,
        consumed: first_q + 1 + second_q + 1 + end + 2,
    })
}

/// Decode Q-encoding (RFC 2047 §4.2): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' => match (
                bytes.get(i + 1).and_then(|&c| transfer::hex_value(c)),
                bytes.get(i + 2).and_then(|&c| transfer::hex_value(c)),
            ) {
                (Some(hi), Some(lo)) => {
                    result.push((hi << 4) | lo);
                    i += 3;
                }
                _ => {
                    result.push(b'=');
                    i += 1;
                }
            },
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_base64_encoded_word() {
        let input = "=?UTF-8?B?SG9sYSBtdW5kbw==?=";
        assert_eq!(decode_encoded_words(input), "Hola mundo");
    }

    #[test]
    fn test_decode_q_encoded_word() {
        let input = "=?ISO-8859-1?Q?caf=E9?=";
        assert_eq!(decode_encoded_words(input), "café");
    }

    #[test]
    fn test_decode_lowercase_encoding_and_language_tag() {
        assert_eq!(decode_encoded_words("=?utf-8*en?q?hi_there?="), "hi there");
    }

    #[test]
    fn test_decode_multiple_encoded_words() {
        let input = "=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?=";
        assert_eq!(decode_encoded_words(input), "Hola mundo");
    }

    #[test]
    fn test_decode_mixed_plain_and_encoded() {
        let input = "Re: =?UTF-8?B?SG9sYQ==?= there";
        assert_eq!(decode_encoded_words(input), "Re: Hola there");
    }

    #[test]
    fn test_folded_words_join_without_whitespace() {
        let input = "=?UTF-8?Q?Gr=C3=BC=C3=9Fe_aus?=\r\n =?UTF-8?Q?_M=C3=BCnchen?=";
        assert_eq!(decode_encoded_words(input), "Grüße aus München");
    }

    #[test]
    fn test_character_split_across_words() {
        // 山田太郎 with the UTF-8 bytes of 田 split between the two words.
        let input = "=?UTF-8?B?5bGx5w==?=\r\n\t=?UTF-8?B?lLDlpKrpg44=?=";
        assert_eq!(decode_encoded_words(input), "山田太郎");
    }

    #[test]
    fn test_adjacent_words_with_different_charsets() {
        let input = "=?ISO-8859-1?Q?caf=E9?= =?UTF-8?Q?_cr=C3=A8me?=";
        assert_eq!(decode_encoded_words(input), "café crème");
    }

    #[test]
    fn test_iso_2022_jp_word() {
        assert_eq!(
            decode_encoded_words("=?ISO-2022-JP?B?GyRCJUYlOSVIGyhC?="),
            "テスト"
        );
    }

    #[test]
    fn test_invalid_word_passed_through() {
        assert_eq!(
            decode_encoded_words("price =?x-unknown-enc?Z?abc?= today"),
            "price =?x-unknown-enc?Z?abc?= today"
        );
        assert_eq!(decode_encoded_words("a =? b"), "a =? b");
        assert_eq!(decode_encoded_words("=?utf-8?q?open"), "=?utf-8?q?open");
    }

    #[test]
    fn test_plain_text_between_words_is_kept() {
        let input = "=?UTF-8?Q?a?= and =?UTF-8?Q?b?=";
        assert_eq!(decode_encoded_words(input), "a and b");
    }

    #[test]
    fn test_q_encoding_bad_escape_kept() {
        assert_eq!(decode_q_encoding("100=_off=ZZ"), b"100= off=ZZ");
    }
}
