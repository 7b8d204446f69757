/// STL format detection
use crate::config::LoadOptions;
use crate::error::{LoadError, Result};

/// Size of the free-form binary header.
pub const HEADER_LEN: usize = 80;
/// Header plus the little-endian facet count.
pub const PREAMBLE_LEN: usize = HEADER_LEN + 4;
/// 12 floats and one u16 per binary facet, no padding.
pub const RECORD_LEN: usize = 50;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// The two STL encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Binary,
    Ascii,
}

impl Format {
    /// Classify a byte stream.
    ///
    /// An exact match between the declared binary size and the buffer length
    /// wins over keyword sniffing, since binary headers may themselves begin
    /// with `solid`. A buffer that is not ASCII but declares more binary
    /// records than it holds is treated as binary, so that decoding reports
    /// the truncation, only when the declared count is within the facet limit
    /// and the preamble is not plain text.
    pub fn detect(data: &[u8], options: &LoadOptions) -> Result<Format> {
        let declared = declared_facet_count(data);

        if let Some(count) = declared {
            if binary_len(count) == data.len() as u64 {
                return Ok(Format::Binary);
            }
        }

        if starts_with_solid(data) {
            return Ok(Format::Ascii);
        }

        match declared {
            Some(count)
                if binary_len(count) > data.len() as u64
                    && count <= options.max_facets
                    && !is_text(&data[..PREAMBLE_LEN]) =>
            {
                Ok(Format::Binary)
            }
            Some(count) => Err(LoadError::Format(format!(
                "{} bytes do not match a binary header declaring {} facets ({} bytes expected) and no `solid` keyword was found",
                data.len(),
                count,
                binary_len(count)
            ))),
            None => Err(LoadError::Format(format!(
                "{} bytes is too short for a binary STL and no `solid` keyword was found",
                data.len()
            ))),
        }
    }
}

/// Facet count from a binary preamble, if the buffer is long enough to hold one.
pub fn declared_facet_count(data: &[u8]) -> Option<u32> {
    let bytes = data.get(HEADER_LEN..PREAMBLE_LEN)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Total byte length of a binary file holding `count` facets.
pub fn binary_len(count: u32) -> u64 {
    PREAMBLE_LEN as u64 + RECORD_LEN as u64 * count as u64
}

/// Drop a leading UTF-8 byte order mark.
pub fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(UTF8_BOM).unwrap_or(data)
}

fn starts_with_solid(data: &[u8]) -> bool {
    let data = strip_bom(data);
    let start = match data.iter().position(|b| !b.is_ascii_whitespace()) {
        Some(start) => start,
        None => return false,
    };
    let rest = &data[start..];
    rest.starts_with(b"solid")
        && rest
            .get(5)
            .map_or(true, |b| b.is_ascii_whitespace())
}

fn is_text(bytes: &[u8]) -> bool {
    let bytes = strip_bom(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.chars().all(|c| !c.is_control() || c.is_whitespace()),
        // The preamble cut may split a multi-byte character.
        Err(e) => e.error_len().is_none() && is_text(&bytes[..e.valid_up_to()]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(data: &[u8]) -> Result<Format> {
        Format::detect(data, &LoadOptions::default())
    }

    fn binary_with(count: u32, records: usize) -> Vec<u8> {
        let mut data = vec![0u8; PREAMBLE_LEN + records * RECORD_LEN];
        data[HEADER_LEN..PREAMBLE_LEN].copy_from_slice(&count.to_le_bytes());
        data
    }

    #[test]
    fn test_exact_size_is_binary() {
        assert_eq!(detect(&binary_with(2, 2)).unwrap(), Format::Binary);
    }

    #[test]
    fn test_solid_header_with_exact_size_is_binary() {
        let mut data = binary_with(1, 1);
        data[..11].copy_from_slice(b"solid cube ");
        assert_eq!(detect(&data).unwrap(), Format::Binary);
    }

    #[test]
    fn test_ascii_keyword() {
        assert_eq!(detect(b"solid x\nendsolid x\n").unwrap(), Format::Ascii);
        assert_eq!(detect(b"\n\t  solid\n").unwrap(), Format::Ascii);
        assert_eq!(detect(b"solid").unwrap(), Format::Ascii);
    }

    #[test]
    fn test_solid_must_be_a_whole_token() {
        assert!(matches!(detect(b"solidity"), Err(LoadError::Format(_))));
    }

    #[test]
    fn test_short_declared_size_is_binary() {
        assert_eq!(detect(&binary_with(5, 3)).unwrap(), Format::Binary);
    }

    #[test]
    fn test_surplus_bytes_unrecognized() {
        let mut data = binary_with(1, 1);
        data.extend_from_slice(&[0u8; 7]);
        assert!(matches!(detect(&data), Err(LoadError::Format(_))));
    }

    #[test]
    fn test_short_garbage_unrecognized() {
        assert!(matches!(detect(b"PK\x03\x04"), Err(LoadError::Format(_))));
        assert!(matches!(detect(b"   "), Err(LoadError::Format(_))));
    }

    #[test]
    fn test_long_text_unrecognized() {
        let readme = b"# stlmesh\n\nLoads binary and ASCII stereolithography files into a shared facet buffer.\nSee DESIGN.md for details.\n";
        assert!(readme.len() > PREAMBLE_LEN);
        assert!(matches!(detect(readme), Err(LoadError::Format(_))));
    }

    #[test]
    fn test_image_unrecognized() {
        let mut png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec();
        png.resize(300, b'A');
        assert!(matches!(detect(&png), Err(LoadError::Format(_))));
    }

    #[test]
    fn test_short_binary_over_limit_unrecognized() {
        let data = binary_with(5, 3);
        let options = LoadOptions::default().with_max_facets(4);
        assert!(matches!(Format::detect(&data, &options), Err(LoadError::Format(_))));
    }

    #[test]
    fn test_byte_order_mark_before_solid() {
        assert_eq!(detect(b"\xEF\xBB\xBFsolid x\nendsolid x\n").unwrap(), Format::Ascii);
    }

    #[test]
    fn test_binary_len_does_not_overflow() {
        assert_eq!(binary_len(u32::MAX), 84 + 50 * u32::MAX as u64);
    }
}
