//! Binary layout of the dependency cache file.
//!
//! ```text
//! i32     entry count
//! entry*  string key, string hash, i32 dependency count,
//!         (string path, i64 size)*
//! ```
//!
//! Integers are little-endian. Strings are a 7-bit variable-length byte
//! count followed by UTF-8, so files stay readable by other tooling that
//! uses the same convention.

use std::collections::BTreeMap;

use super::entry::CacheEntry;
use crate::error::{RefGraphError, Result};

pub fn encode(entries: &BTreeMap<String, CacheEntry>) -> Vec<u8> {
    let mut out = Vec::new();
    write_i32(&mut out, entries.len() as i32);
    for (path, entry) in entries {
        write_string(&mut out, path);
        write_string(&mut out, &entry.hash);
        write_i32(&mut out, entry.dependencies.len() as i32);
        for (dependency, size) in entry.dependencies.iter().zip(&entry.file_sizes) {
            write_string(&mut out, dependency);
            write_i64(&mut out, *size);
        }
    }
    out
}

pub fn decode(bytes: &[u8]) -> Result<BTreeMap<String, CacheEntry>> {
    let mut reader = Reader { bytes, pos: 0 };
    let count = reader.read_count()?;

    let mut entries = BTreeMap::new();
    for _ in 0..count {
        let path = reader.read_string()?;
        let hash = reader.read_string()?;
        let dependency_count = reader.read_count()?;

        let mut dependencies = Vec::with_capacity(dependency_count.min(1024));
        let mut file_sizes = Vec::with_capacity(dependency_count.min(1024));
        for _ in 0..dependency_count {
            dependencies.push(reader.read_string()?);
            file_sizes.push(reader.read_i64()?);
        }

        entries.insert(path, CacheEntry::from_parts(hash, dependencies, file_sizes));
    }

    if reader.pos != bytes.len() {
        return Err(RefGraphError::CacheFormat(format!(
            "{} trailing bytes",
            bytes.len() - reader.pos
        )));
    }

    Ok(entries)
}

// ─── Primitives ─────────────────────────────────────────────────

fn write_i32(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn write_i64(out: &mut Vec<u8>, value: i64) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn write_string(out: &mut Vec<u8>, value: &str) {
    let mut len = value.len() as u32;
    while len >= 0x80 {
        out.push((len as u8) | 0x80);
        len >>= 7;
    }
    out.push(len as u8);
    out.extend_from_slice(value.as_bytes());
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn take(&mut self, n: usize) -> Result<&[u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| RefGraphError::CacheFormat(format!("unexpected end at byte {}", self.pos)))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(i32::from_le_bytes(buf))
    }

    fn read_i64(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(i64::from_le_bytes(buf))
    }

    fn read_count(&mut self) -> Result<usize> {
        let value = self.read_i32()?;
        usize::try_from(value)
            .map_err(|_| RefGraphError::CacheFormat(format!("negative count {value}")))
    }

    fn read_string(&mut self) -> Result<String> {
        let mut len: u32 = 0;
        let mut shift = 0;
        loop {
            let byte = self.take(1)?[0];
            if shift > 28 {
                return Err(RefGraphError::CacheFormat("string length overflow".into()));
            }
            len |= u32::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        let raw = self.take(len as usize)?;
        String::from_utf8(raw.to_vec())
            .map_err(|e| RefGraphError::CacheFormat(format!("invalid string: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BTreeMap<String, CacheEntry> {
        let mut entries = BTreeMap::new();
        entries.insert(
            "Assets/Crate.mat".to_string(),
            CacheEntry::from_parts(
                "abc".into(),
                vec!["Assets/Wood.png".into(), "Assets/Lit.shader".into()],
                vec![2048, 17],
            ),
        );
        entries.insert(
            "Assets/Empty.asset".to_string(),
            CacheEntry::from_parts("def".into(), vec![], vec![]),
        );
        entries
    }

    #[test]
    fn test_known_layout() {
        let mut entries = BTreeMap::new();
        entries.insert(
            "a".to_string(),
            CacheEntry::from_parts("h".into(), vec!["b".into()], vec![5]),
        );
        let bytes = encode(&entries);
        assert_eq!(
            bytes,
            vec![
                1, 0, 0, 0, // entry count
                1, b'a', // key
                1, b'h', // hash
                1, 0, 0, 0, // dependency count
                1, b'b', // dependency path
                5, 0, 0, 0, 0, 0, 0, 0, // size
            ]
        );
    }

    #[test]
    fn test_decode_restores_entries() {
        let entries = sample();
        let decoded = decode(&encode(&entries)).unwrap();
        let crate_entry = &decoded["Assets/Crate.mat"];
        assert_eq!(crate_entry.hash, "abc");
        assert_eq!(crate_entry.dependencies, vec!["Assets/Wood.png", "Assets/Lit.shader"]);
        assert_eq!(crate_entry.file_sizes, vec![2048, 17]);
        assert!(decoded["Assets/Empty.asset"].dependencies.is_empty());
    }

    #[test]
    fn test_long_strings_use_multibyte_length() {
        let long = "x".repeat(300);
        let mut out = Vec::new();
        write_string(&mut out, &long);
        assert_eq!(&out[..2], &[0xAC, 0x02]);

        let mut reader = Reader { bytes: &out, pos: 0 };
        assert_eq!(reader.read_string().unwrap(), long);
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let bytes = encode(&sample());
        for cut in [0, 3, 10, bytes.len() - 1] {
            assert!(
                decode(&bytes[..cut]).is_err(),
                "truncation at {cut} should fail"
            );
        }
    }

    #[test]
    fn test_negative_count_is_rejected() {
        assert!(decode(&(-1i32).to_le_bytes()).is_err());
    }
}
