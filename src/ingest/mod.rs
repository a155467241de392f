//! Raw upload ingestion
//!
//! Turns uploaded bytes into a parsed table:
//! - lossy UTF-8 decoding
//! - heuristic header discovery ([`HeaderLocator`])
//! - keyword-driven column resolution ([`ColumnResolver`])

mod header;
mod resolver;

pub use header::{search_header, HeaderLocator, RawTable};
pub use resolver::{
    ColumnProfile, ColumnResolver, Concept, ResolvedColumns, RADIUS_KEYWORDS,
    TEMPERATURE_KEYWORDS,
};

/// Decode bytes as UTF-8, silently dropping undecodable sequences and a
/// leading byte-order mark.
pub fn decode_lossy(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    }
}

/// Lower-case and strip every non-alphanumeric character.
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_drops_invalid_bytes() {
        let bytes = b"koi_\xff\xfedisposition,x\n";
        assert_eq!(decode_lossy(bytes), "koi_disposition,x\n");
    }

    #[test]
    fn test_decode_strips_bom() {
        let bytes = "\u{feff}a,b\n".as_bytes();
        assert_eq!(decode_lossy(bytes), "a,b\n");
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("KOI_Disposition"), "koidisposition");
        assert_eq!(normalize("pl_rade [Earth]"), "plradeearth");
        assert_eq!(normalize("st-teff"), "stteff");
        assert_eq!(normalize("__"), "");
    }
}
