//! Charset registry: maps MIME charset labels to byte→Unicode converters.
//!
//! The table is built once on first use and never mutated afterwards.
//! Most converters delegate to `encoding_rs`, including the stateful
//! ISO-2022-JP decoder, which tracks the active character set across
//! `ESC $ B` / `ESC ( B` shift sequences. US-ASCII and ISO-8859-1 get
//! dedicated converters because WHATWG folds both into Windows-1252, and
//! so do ISO-8859-9 and -11, which WHATWG only knows as their Windows
//! supersets. Bare `UTF-16` picks its byte order from the BOM.

use std::collections::HashMap;
use std::sync::LazyLock;

use encoding_rs::Encoding;
use tracing::warn;

/// A resolved charset converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    /// 7-bit US-ASCII. 8-bit input is tolerated (UTF-8 first, then Windows-1252).
    Ascii,
    /// Exact ISO-8859-1: every byte maps to the code point of the same value.
    Latin1,
    /// An ISO-8859 part decoded through its Windows superset, with
    /// 0x80-0x9F kept as C1 controls.
    IsoOverlay {
        name: &'static str,
        superset: &'static Encoding,
    },
    /// UTF-16 of unknown byte order: the BOM decides, big-endian without one.
    Utf16,
    /// Any encoding implemented by `encoding_rs`.
    Encoding(&'static Encoding),
}

impl Charset {
    /// Canonical name of the converter.
    pub fn name(&self) -> &'static str {
        match self {
            Charset::Ascii => "US-ASCII",
            Charset::Latin1 => "ISO-8859-1",
            Charset::IsoOverlay { name, .. } => *name,
            Charset::Utf16 => "UTF-16",
            Charset::Encoding(enc) => enc.name(),
        }
    }

    /// Convert `bytes` to Unicode. Malformed sequences become U+FFFD.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Charset::Ascii => {
                if bytes.is_ascii() {
                    // ASCII is valid UTF-8.
                    String::from_utf8_lossy(bytes).into_owned()
                } else {
                    match std::str::from_utf8(bytes) {
                        Ok(s) => s.to_string(),
                        Err(_) => {
                            let (decoded, _) =
                                encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
                            decoded.into_owned()
                        }
                    }
                }
            }
            Charset::Latin1 => bytes.iter().map(|&b| b as char).collect(),
            Charset::IsoOverlay { superset, .. } => {
                // Single-byte: one char per input byte, so positions line up.
                let (decoded, _) = superset.decode_without_bom_handling(bytes);
                decoded
                    .chars()
                    .zip(bytes)
                    .map(|(c, &b)| if (0x80..0xA0).contains(&b) { b as char } else { c })
                    .collect()
            }
            Charset::Utf16 => {
                let (enc, bom_len) = match Encoding::for_bom(bytes) {
                    Some((enc, len)) if enc == encoding_rs::UTF_16LE => (enc, len),
                    Some((enc, len)) if enc == encoding_rs::UTF_16BE => (enc, len),
                    _ => (encoding_rs::UTF_16BE, 0),
                };
                let (decoded, _) = enc.decode_without_bom_handling(&bytes[bom_len..]);
                decoded.into_owned()
            }
            Charset::Encoding(enc) => {
                let (decoded, _) = enc.decode_with_bom_removal(bytes);
                decoded.into_owned()
            }
        }
    }
}

static REGISTRY: LazyLock<HashMap<String, Charset>> = LazyLock::new(build_registry);

fn build_registry() -> HashMap<String, Charset> {
    use encoding_rs::*;

    let mut table: HashMap<String, Charset> = HashMap::new();
    let mut add = |labels: &[&str], charset: Charset| {
        for label in labels {
            table.insert((*label).to_string(), charset);
        }
    };

    add(
        &["us-ascii", "ascii", "ansi-x3.4-1968", "iso646-us", "us", "646"],
        Charset::Ascii,
    );
    add(&["utf-8", "utf8", "unicode-1-1-utf-8"], Charset::Encoding(UTF_8));
    add(
        &["iso-8859-1", "iso8859-1", "latin1", "latin-1", "l1", "cp819", "iso-ir-100"],
        Charset::Latin1,
    );

    let iso_family: [(u8, &'static Encoding); 12] = [
        (2, ISO_8859_2),
        (3, ISO_8859_3),
        (4, ISO_8859_4),
        (5, ISO_8859_5),
        (6, ISO_8859_6),
        (7, ISO_8859_7),
        (8, ISO_8859_8),
        (10, ISO_8859_10),
        (13, ISO_8859_13),
        (14, ISO_8859_14),
        (15, ISO_8859_15),
        (16, ISO_8859_16),
    ];
    for (n, enc) in iso_family {
        add(
            &[format!("iso-8859-{n}").as_str(), format!("iso8859-{n}").as_str()],
            Charset::Encoding(enc),
        );
    }
    // No WHATWG decoder of their own; the Windows supersets agree with
    // them everywhere outside the C1 range.
    for (n, name, superset) in [(9, "ISO-8859-9", WINDOWS_1254), (11, "ISO-8859-11", WINDOWS_874)] {
        add(
            &[format!("iso-8859-{n}").as_str(), format!("iso8859-{n}").as_str()],
            Charset::IsoOverlay { name, superset },
        );
    }
    add(
        &["latin5", "l5"],
        Charset::IsoOverlay { name: "ISO-8859-9", superset: WINDOWS_1254 },
    );
    add(&["latin2", "l2"], Charset::Encoding(ISO_8859_2));
    add(&["latin9", "l9", "latin-9"], Charset::Encoding(ISO_8859_15));

    let windows: [(u16, &'static Encoding); 9] = [
        (1250, WINDOWS_1250),
        (1251, WINDOWS_1251),
        (1252, WINDOWS_1252),
        (1253, WINDOWS_1253),
        (1254, WINDOWS_1254),
        (1255, WINDOWS_1255),
        (1256, WINDOWS_1256),
        (1257, WINDOWS_1257),
        (1258, WINDOWS_1258),
    ];
    for (n, enc) in windows {
        add(
            &[
                format!("windows-{n}").as_str(),
                format!("cp{n}").as_str(),
                format!("x-cp{n}").as_str(),
            ],
            Charset::Encoding(enc),
        );
    }

    add(&["koi8-r", "koi8r", "koi8"], Charset::Encoding(KOI8_R));
    add(&["koi8-u", "koi8u"], Charset::Encoding(KOI8_U));

    add(
        &["gbk", "gb2312", "gb-2312", "cp936", "x-gbk", "euc-cn", "csgb2312", "chinese"],
        Charset::Encoding(GBK),
    );
    add(&["gb18030"], Charset::Encoding(GB18030));
    add(&["big5", "big5-hkscs", "cp950", "x-x-big5"], Charset::Encoding(BIG5));

    add(&["euc-jp", "eucjp", "x-euc-jp", "cseucpkdfmtjapanese"], Charset::Encoding(EUC_JP));
    add(
        &["shift-jis", "shift_jis", "shiftjis", "sjis", "x-sjis", "ms-kanji", "cp932", "windows-31j", "csshiftjis"],
        Charset::Encoding(SHIFT_JIS),
    );
    // iso-2022-jp-2 is a superset; its extra sets decode to U+FFFD.
    add(
        &["iso-2022-jp", "csiso2022jp", "iso-2022-jp-2", "iso2022jp"],
        Charset::Encoding(ISO_2022_JP),
    );

    add(
        &["euc-kr", "euckr", "ks-c-5601-1987", "ks-c-5601", "ksc5601", "cp949", "windows-949", "uhc"],
        Charset::Encoding(EUC_KR),
    );

    add(&["utf-16le", "utf16le"], Charset::Encoding(UTF_16LE));
    add(&["utf-16be", "utf16be"], Charset::Encoding(UTF_16BE));
    add(&["utf-16", "utf16"], Charset::Utf16);

    table
}

/// Normalize a charset label for table lookup.
///
/// `"ISO_8859-1"` → `"iso-8859-1"`, `" \"UTF-8\" "` → `"utf-8"`.
fn normalize_label(label: &str) -> String {
    label
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_ascii_lowercase()
        .replace('_', "-")
}

/// Resolve a charset label. Returns `None` for unknown labels.
///
/// Lookup is case-insensitive; after the alias table, the WHATWG label
/// set of `encoding_rs` is consulted.
pub fn lookup(label: &str) -> Option<Charset> {
    let normalized = normalize_label(label);
    if normalized.is_empty() {
        return None;
    }
    if let Some(charset) = REGISTRY.get(&normalized) {
        return Some(*charset);
    }
    let raw = label.trim().trim_matches('"').to_ascii_lowercase();
    Encoding::for_label(raw.as_bytes()).map(|enc| {
        // WHATWG maps these to the replacement decoder, which would turn the
        // whole text into a single U+FFFD.
        if enc == encoding_rs::REPLACEMENT {
            Charset::Encoding(encoding_rs::UTF_8)
        } else {
            Charset::Encoding(enc)
        }
    })
}

/// Decode `bytes` in the named charset.
///
/// An empty label means UTF-8. An unknown label falls back to lossy UTF-8
/// and logs a warning; this never fails.
pub fn decode(label: &str, bytes: &[u8]) -> String {
    if label.trim().is_empty() {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    match lookup(label) {
        Some(charset) => charset.decode(bytes),
        None => {
            warn!(
                charset = label,
                "Unknown charset, falling back to UTF-8 lossy"
            );
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(label: &str, sample: &str) {
        let charset = lookup(label).unwrap_or_else(|| panic!("{label} should resolve"));
        let bytes: Vec<u8> = match charset {
            Charset::Ascii => sample.as_bytes().to_vec(),
            Charset::Latin1 => sample.chars().map(|c| c as u32 as u8).collect(),
            Charset::Utf16 => sample.encode_utf16().flat_map(u16::to_be_bytes).collect(),
            Charset::IsoOverlay { superset: enc, .. } | Charset::Encoding(enc) => {
                let (encoded, _, had_errors) = enc.encode(sample);
                assert!(!had_errors, "{label} cannot represent {sample}");
                encoded.into_owned()
            }
        };
        assert_eq!(decode(label, &bytes), sample, "round trip via {label}");
    }

    #[test]
    fn test_roundtrip_supported_charsets() {
        roundtrip("us-ascii", "Plain old text, 100% ASCII.");
        roundtrip("utf-8", "Grüße, 世界, привет");
        roundtrip("iso-8859-1", "Café résumé naïve ¿qué?");
        roundtrip("iso-8859-2", "Zażółć gęślą jaźń");
        roundtrip("iso-8859-5", "Привет мир");
        roundtrip("iso-8859-7", "Καλημέρα κόσμε");
        roundtrip("iso-8859-9", "Günaydın dünya");
        roundtrip("iso-8859-11", "สวัสดีครับ");
        roundtrip("utf-16", "Grüße, 世界");
        roundtrip("iso-8859-15", "Prix: 10 €");
        roundtrip("windows-1252", "“Smart quotes” – dash");
        roundtrip("koi8-r", "Здравствуйте");
        roundtrip("gbk", "中文邮件测试");
        roundtrip("gb18030", "中文邮件测试");
        roundtrip("big5", "繁體中文");
        roundtrip("euc-jp", "日本語のメール");
        roundtrip("shift_jis", "日本語のメール");
        roundtrip("iso-2022-jp", "日本語のメール");
        roundtrip("euc-kr", "한국어 메일");
    }

    #[test]
    fn test_lookup_is_case_insensitive_with_aliases() {
        assert_eq!(lookup("UTF-8"), lookup("utf8"));
        assert_eq!(lookup("ISO_8859-1"), Some(Charset::Latin1));
        assert_eq!(lookup("\"Latin1\""), Some(Charset::Latin1));
        assert_eq!(lookup("SJIS"), lookup("Shift_JIS"));
        assert_eq!(lookup("ks_c_5601-1987"), Some(Charset::Encoding(encoding_rs::EUC_KR)));
        assert_eq!(lookup("CP936"), Some(Charset::Encoding(encoding_rs::GBK)));
    }

    #[test]
    fn test_iso_2022_jp_escape_sequences() {
        // ESC $ B switches to JIS X 0208, ESC ( B back to ASCII.
        let bytes = b"Hi \x1b$B$3$s$K$A$O\x1b(B!";
        assert_eq!(decode("ISO-2022-JP", bytes), "Hi こんにちは!");
    }

    #[test]
    fn test_known_multibyte_sequences() {
        assert_eq!(decode("gbk", &[0xD6, 0xD0, 0xCE, 0xC4]), "中文");
        assert_eq!(decode("shift_jis", &[0x93, 0xFA, 0x96, 0x7B]), "日本");
    }

    #[test]
    fn test_latin1_is_exact() {
        // 0x80-0x9F are C1 controls in ISO-8859-1, not Windows-1252 punctuation.
        assert_eq!(decode("iso-8859-1", &[0x93, 0xE9]), "\u{93}é");
    }

    #[test]
    fn test_iso_8859_9_keeps_c1_controls() {
        assert_eq!(decode("iso-8859-9", &[0x93, 0xD0, 0xFD, 0xFE]), "\u{93}Ğış");
        assert_eq!(decode("latin5", &[0x80, b'a']), "\u{80}a");
        assert_eq!(decode("windows-1254", &[0x93]), "\u{201C}");
    }

    #[test]
    fn test_utf16_byte_order_from_bom() {
        assert_eq!(decode("utf-16", &[0xFE, 0xFF, 0x00, b'h', 0x00, b'i']), "hi");
        assert_eq!(decode("utf-16", &[0xFF, 0xFE, b'h', 0x00, b'i', 0x00]), "hi");
        assert_eq!(decode("UTF-16", &[0x00, b'h', 0x00, b'i']), "hi");
        assert_eq!(decode("utf-16le", &[0xFF, 0xFE, b'o', 0x00, b'k', 0x00]), "ok");
    }

    #[test]
    fn test_ascii_tolerates_8bit() {
        assert_eq!(decode("us-ascii", "naïve".as_bytes()), "naïve");
        assert_eq!(decode("us-ascii", &[b'n', b'a', 0xEF, b'v', b'e']), "naïve");
    }

    #[test]
    fn test_unknown_charset_falls_back_to_utf8() {
        assert!(lookup("x-no-such-charset").is_none());
        assert_eq!(decode("x-no-such-charset", "héllo".as_bytes()), "héllo");
        assert_eq!(decode("", b"plain"), "plain");
    }

    #[test]
    fn test_charset_names() {
        assert_eq!(Charset::Ascii.name(), "US-ASCII");
        assert_eq!(lookup("eucjp").map(|c| c.name()), Some("EUC-JP"));
        assert_eq!(lookup("ISO8859-9").map(|c| c.name()), Some("ISO-8859-9"));
        assert_eq!(lookup("utf16").map(|c| c.name()), Some("UTF-16"));
    }
}
