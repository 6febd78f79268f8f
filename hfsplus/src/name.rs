//! Unicode name comparator used to order the catalog B-tree.
//!
//! HFS+ orders names by a canonical (NFD-like) decomposition of each code
//! point followed by an optional case fold, then compares the resulting
//! code-point sequences directly (Apple TN1150's FastUnicodeCompare). This
//! module ships a documented subset of the full decomposition/case-fold
//! tables: Latin-1 Supplement and Latin Extended-A, the block that
//! HFS+ volumes overwhelmingly exercise for accented Western-European
//! filenames. Code points outside the covered ranges decompose and fold to
//! themselves.

use std::cmp::Ordering;

/// Canonical decomposition table: precomposed code point -> (base, mark).
/// Every entry here decomposes to exactly two code points; anything absent
/// decomposes to itself.
static DECOMPOSITION: &[(u32, u32, u32)] = &[
    (0x00C0, 0x0041, 0x0300), // À
    (0x00C1, 0x0041, 0x0301), // Á
    (0x00C2, 0x0041, 0x0302), // Â
    (0x00C3, 0x0041, 0x0303), // Ã
    (0x00C4, 0x0041, 0x0308), // Ä
    (0x00C5, 0x0041, 0x030A), // Å
    (0x00C7, 0x0043, 0x0327), // Ç
    (0x00C8, 0x0045, 0x0300), // È
    (0x00C9, 0x0045, 0x0301), // É
    (0x00CA, 0x0045, 0x0302), // Ê
    (0x00CB, 0x0045, 0x0308), // Ë
    (0x00CC, 0x0049, 0x0300), // Ì
    (0x00CD, 0x0049, 0x0301), // Í
    (0x00CE, 0x0049, 0x0302), // Î
    (0x00CF, 0x0049, 0x0308), // Ï
    (0x00D1, 0x004E, 0x0303), // Ñ
    (0x00D2, 0x004F, 0x0300), // Ò
    (0x00D3, 0x004F, 0x0301), // Ó
    (0x00D4, 0x004F, 0x0302), // Ô
    (0x00D5, 0x004F, 0x0303), // Õ
    (0x00D6, 0x004F, 0x0308), // Ö
    (0x00D9, 0x0055, 0x0300), // Ù
    (0x00DA, 0x0055, 0x0301), // Ú
    (0x00DB, 0x0055, 0x0302), // Û
    (0x00DC, 0x0055, 0x0308), // Ü
    (0x00DD, 0x0059, 0x0301), // Ý
    (0x00E0, 0x0061, 0x0300), // à
    (0x00E1, 0x0061, 0x0301), // á
    (0x00E2, 0x0061, 0x0302), // â
    (0x00E3, 0x0061, 0x0303), // ã
    (0x00E4, 0x0061, 0x0308), // ä
    (0x00E5, 0x0061, 0x030A), // å
    (0x00E7, 0x0063, 0x0327), // ç
    (0x00E8, 0x0065, 0x0300), // è
    (0x00E9, 0x0065, 0x0301), // é
    (0x00EA, 0x0065, 0x0302), // ê
    (0x00EB, 0x0065, 0x0308), // ë
    (0x00EC, 0x0069, 0x0300), // ì
    (0x00ED, 0x0069, 0x0301), // í
    (0x00EE, 0x0069, 0x0302), // î
    (0x00EF, 0x0069, 0x0308), // ï
    (0x00F1, 0x006E, 0x0303), // ñ
    (0x00F2, 0x006F, 0x0300), // ò
    (0x00F3, 0x006F, 0x0301), // ó
    (0x00F4, 0x006F, 0x0302), // ô
    (0x00F5, 0x006F, 0x0303), // õ
    (0x00F6, 0x006F, 0x0308), // ö
    (0x00F9, 0x0075, 0x0300), // ù
    (0x00FA, 0x0075, 0x0301), // ú
    (0x00FB, 0x0075, 0x0302), // û
    (0x00FC, 0x0075, 0x0308), // ü
    (0x00FD, 0x0079, 0x0301), // ý
    (0x00FF, 0x0079, 0x0308), // ÿ
    (0x0100, 0x0041, 0x0304), // Ā
    (0x0101, 0x0061, 0x0304), // ā
    (0x0102, 0x0041, 0x0306), // Ă
    (0x0103, 0x0061, 0x0306), // ă
    (0x0104, 0x0041, 0x0328), // Ą
    (0x0105, 0x0061, 0x0328), // ą
    (0x0106, 0x0043, 0x0301), // Ć
    (0x0107, 0x0063, 0x0301), // ć
    (0x010C, 0x0043, 0x030C), // Č
    (0x010D, 0x0063, 0x030C), // č
    (0x0112, 0x0045, 0x0304), // Ē
    (0x0113, 0x0065, 0x0304), // ē
    (0x011A, 0x0045, 0x030C), // Ě
    (0x011B, 0x0065, 0x030C), // ě
    (0x011E, 0x0047, 0x0306), // Ğ
    (0x011F, 0x0067, 0x0306), // ğ
    (0x012A, 0x0049, 0x0304), // Ī
    (0x012B, 0x0069, 0x0304), // ī
    (0x0147, 0x004E, 0x030C), // Ň
    (0x0148, 0x006E, 0x030C), // ň
    (0x014C, 0x004F, 0x0304), // Ō
    (0x014D, 0x006F, 0x0304), // ō
    (0x0158, 0x0052, 0x030C), // Ř
    (0x0159, 0x0072, 0x030C), // ř
    (0x015A, 0x0053, 0x0301), // Ś
    (0x015B, 0x0073, 0x0301), // ś
    (0x0160, 0x0053, 0x030C), // Š
    (0x0161, 0x0073, 0x030C), // š
    (0x016A, 0x0055, 0x0304), // Ū
    (0x016B, 0x0075, 0x0304), // ū
    (0x0179, 0x005A, 0x0301), // Ź
    (0x017A, 0x007A, 0x0301), // ź
    (0x017D, 0x005A, 0x030C), // Ž
    (0x017E, 0x007A, 0x030C), // ž
];

/// Case-fold table, ported from the simple-fold table used for HFS+
/// FastUnicodeCompare: uppercase code point -> lowercase code point. Only
/// entries that differ from identity are listed.
static CASE_FOLD: &[(u32, u32)] = &[
    (0x0041, 0x0061),
    (0x0042, 0x0062),
    (0x0043, 0x0063),
    (0x0044, 0x0064),
    (0x0045, 0x0065),
    (0x0046, 0x0066),
    (0x0047, 0x0067),
    (0x0048, 0x0068),
    (0x0049, 0x0069),
    (0x004A, 0x006A),
    (0x004B, 0x006B),
    (0x004C, 0x006C),
    (0x004D, 0x006D),
    (0x004E, 0x006E),
    (0x004F, 0x006F),
    (0x0050, 0x0070),
    (0x0051, 0x0071),
    (0x0052, 0x0072),
    (0x0053, 0x0073),
    (0x0054, 0x0074),
    (0x0055, 0x0075),
    (0x0056, 0x0076),
    (0x0057, 0x0077),
    (0x0058, 0x0078),
    (0x0059, 0x0079),
    (0x005A, 0x007A),
    (0x00C0, 0x00E0),
    (0x00C1, 0x00E1),
    (0x00C2, 0x00E2),
    (0x00C3, 0x00E3),
    (0x00C4, 0x00E4),
    (0x00C5, 0x00E5),
    (0x00C6, 0x00E6),
    (0x00C7, 0x00E7),
    (0x00C8, 0x00E8),
    (0x00C9, 0x00E9),
    (0x00CA, 0x00EA),
    (0x00CB, 0x00EB),
    (0x00CC, 0x00EC),
    (0x00CD, 0x00ED),
    (0x00CE, 0x00EE),
    (0x00CF, 0x00EF),
    (0x00D0, 0x00F0),
    (0x00D1, 0x00F1),
    (0x00D2, 0x00F2),
    (0x00D3, 0x00F3),
    (0x00D4, 0x00F4),
    (0x00D5, 0x00F5),
    (0x00D6, 0x00F6),
    (0x00D8, 0x00F8),
    (0x00D9, 0x00F9),
    (0x00DA, 0x00FA),
    (0x00DB, 0x00FB),
    (0x00DC, 0x00FC),
    (0x00DD, 0x00FD),
    (0x00DE, 0x00FE),
    (0x0100, 0x0101),
    (0x0102, 0x0103),
    (0x0104, 0x0105),
    (0x0106, 0x0107),
    (0x0108, 0x0109),
    (0x010A, 0x010B),
    (0x010C, 0x010D),
    (0x010E, 0x010F),
    (0x0110, 0x0111),
    (0x0112, 0x0113),
    (0x0114, 0x0115),
    (0x0116, 0x0117),
    (0x0118, 0x0119),
    (0x011A, 0x011B),
    (0x011C, 0x011D),
    (0x011E, 0x011F),
    (0x0130, 0x0069), // İ -> i, Turkish dotted capital I
    (0x0132, 0x0133),
    (0x0134, 0x0135),
    (0x0136, 0x0137),
    (0x0139, 0x013A),
    (0x013B, 0x013C),
    (0x013D, 0x013E),
    (0x013F, 0x0140),
    (0x0141, 0x0142),
    (0x0143, 0x0144),
    (0x0145, 0x0146),
    (0x0147, 0x0148),
    (0x014A, 0x014B),
    (0x014C, 0x014D),
    (0x014E, 0x014F),
    (0x0150, 0x0151),
    (0x0152, 0x0153),
    (0x0154, 0x0155),
    (0x0156, 0x0157),
    (0x0158, 0x0159),
    (0x015A, 0x015B),
    (0x015C, 0x015D),
    (0x015E, 0x015F),
    (0x0160, 0x0161),
    (0x0162, 0x0163),
    (0x0164, 0x0165),
    (0x0166, 0x0167),
    (0x0168, 0x0169),
    (0x016A, 0x016B),
    (0x016C, 0x016D),
    (0x016E, 0x016F),
    (0x0170, 0x0171),
    (0x0172, 0x0173),
    (0x0174, 0x0175),
    (0x0176, 0x0177),
    (0x0178, 0x00FF),
    (0x0179, 0x017A),
    (0x017B, 0x017C),
    (0x017D, 0x017E),
];

/// Decompose one code point into 1 or 2 replacement code points.
fn decompose_codepoint(cp: u32) -> (u32, Option<u32>) {
    match DECOMPOSITION.binary_search_by_key(&cp, |&(from, _, _)| from) {
        Ok(idx) => {
            let (_, base, mark) = DECOMPOSITION[idx];
            (base, Some(mark))
        }
        Err(_) => (cp, None),
    }
}

fn case_fold_codepoint(cp: u32) -> u32 {
    match CASE_FOLD.binary_search_by_key(&cp, |&(from, _)| from) {
        Ok(idx) => CASE_FOLD[idx].1,
        Err(_) => cp,
    }
}

/// Decode UTF-16BE code units into Unicode code points, combining surrogate
/// pairs.
fn decode_utf16(units: &[u16]) -> impl Iterator<Item = u32> + '_ {
    char::decode_utf16(units.iter().copied()).map(|r| match r {
        Ok(c) => c as u32,
        Err(unpaired) => unpaired.unpaired_surrogate() as u32,
    })
}

/// Produce the normalized (decomposed, optionally folded) code-point
/// sequence used to order or hash a name.
fn normalize(units: &[u16], fold: bool) -> Vec<u32> {
    decode_utf16(units)
        .flat_map(|cp| {
            let (base, mark) = decompose_codepoint(cp);
            std::iter::once(base).chain(mark)
        })
        .map(|cp| if fold { case_fold_codepoint(cp) } else { cp })
        .collect()
}

/// Compare two UTF-16BE names under the HFS+ canonical-decomposition
/// ordering, with optional case folding.
pub fn compare(a: &[u16], b: &[u16], fold: bool) -> Ordering {
    normalize(a, fold).cmp(&normalize(b, fold))
}

/// 32-bit running hash over the same normalized code-point sequence used by
/// `compare`. Two names that compare `Equal` always hash identically.
pub fn hash(units: &[u16], fold: bool) -> u32 {
    normalize(units, fold)
        .into_iter()
        .fold(0u32, |h, cp| h.wrapping_mul(31).wrapping_add(cp))
}

pub fn utf16be_to_units(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect()
}

pub fn units_to_string(units: &[u16]) -> String {
    String::from_utf16_lossy(units)
}

pub fn string_to_units(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

/// Split a path on `/`, dropping empty segments (so a leading or trailing
/// separator, or a run of separators, never produces spurious components).
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}
