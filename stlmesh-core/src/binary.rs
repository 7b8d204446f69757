/// Binary STL decoding and encoding
///
/// Layout: 80-byte header, u32 facet count, then one 50-byte record per
/// facet (normal, three vertices, u16 attribute). Always little-endian.
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::config::LoadOptions;
use crate::error::{LoadError, Result};
use crate::facet::Facet;
use crate::format::{binary_len, declared_facet_count, HEADER_LEN, PREAMBLE_LEN, RECORD_LEN};

const HEADER_LABEL: &[u8] = b"binary STL written by stlmesh";

/// Decode a binary STL buffer into facets in file order.
pub fn decode(data: &[u8], options: &LoadOptions) -> Result<Vec<Facet>> {
    let count = declared_facet_count(data).ok_or(LoadError::Truncated {
        declared: 0,
        expected_len: PREAMBLE_LEN as u64,
        actual_len: data.len() as u64,
    })?;

    if count > options.max_facets {
        return Err(LoadError::TooManyFacets {
            declared: count as u64,
            limit: options.max_facets,
        });
    }

    let expected_len = binary_len(count);
    if (data.len() as u64) < expected_len {
        return Err(LoadError::Truncated {
            declared: count,
            expected_len,
            actual_len: data.len() as u64,
        });
    }

    let facets: Vec<Facet> = data[PREAMBLE_LEN..]
        .chunks_exact(RECORD_LEN)
        .take(count as usize)
        .map(decode_record)
        .collect();

    tracing::debug!(facets = facets.len(), "decoded binary STL");
    Ok(facets)
}

fn decode_record(record: &[u8]) -> Facet {
    let mut values = [0f32; 12];
    for (i, value) in values.iter_mut().enumerate() {
        let at = i * 4;
        *value = f32::from_le_bytes([record[at], record[at + 1], record[at + 2], record[at + 3]]);
    }
    let attribute = u16::from_le_bytes([record[48], record[49]]);
    Facet::from_floats(values, attribute)
}

/// Encode facets as binary STL into `writer`.
pub fn write<W: Write>(facets: &[Facet], writer: &mut W) -> io::Result<()> {
    let count = u32::try_from(facets.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} facets do not fit a binary STL count", facets.len()),
        )
    })?;

    let mut header = [0u8; HEADER_LEN];
    header[..HEADER_LABEL.len()].copy_from_slice(HEADER_LABEL);
    writer.write_all(&header)?;
    writer.write_all(&count.to_le_bytes())?;

    let mut record = [0u8; RECORD_LEN];
    for facet in facets {
        for (i, value) in facet.to_floats().iter().enumerate() {
            record[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
        }
        record[48..50].copy_from_slice(&facet.attribute.to_le_bytes());
        writer.write_all(&record)?;
    }

    Ok(())
}

/// Encode facets as an in-memory binary STL.
pub fn to_bytes(facets: &[Facet]) -> io::Result<Vec<u8>> {
    let mut data = Vec::with_capacity(PREAMBLE_LEN + facets.len() * RECORD_LEN);
    write(facets, &mut data)?;
    Ok(data)
}

/// Save facets to `path` as binary STL.
pub fn save<P: AsRef<Path>>(path: P, facets: &[Facet]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write(facets, &mut writer)?;
    writer.flush()?;
    Ok(())
}
