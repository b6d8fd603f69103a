use crate::error::LoadError;
use crate::memory::{Memory, MEMORY_SIZE};
use byteorder::{BigEndian, ReadBytesExt};
use log::info;
use std::fs;
use std::io::BufReader;

/// Reads a big-endian object image from `path` and places it into `memory`.
///
/// The first word is the load origin; every word after it is byte-swapped to
/// host order and written starting at that origin. Loading stops at
/// end-of-stream. An image that would need more than `65536 - origin` words
/// is rejected before any of it is written, rather than silently truncated.
pub fn load(path: &str, memory: &mut Memory) -> Result<(), LoadError> {
    let mut reader = BufReader::new(fs::File::open(path)?);

    let origin = reader.read_u16::<BigEndian>()?;
    let payload = read_words(&mut reader)?;

    let capacity = MEMORY_SIZE - origin as usize;
    if payload.len() > capacity {
        return Err(LoadError::ImageTooLarge {
            origin,
            words: payload.len(),
        });
    }

    info!("loading {} ({} words at {:#06x})", path, payload.len(), origin);

    for (offset, word) in payload.into_iter().enumerate() {
        memory.write(origin.wrapping_add(offset as u16), word);
    }

    Ok(())
}

fn read_words<R: std::io::Read>(reader: &mut R) -> Result<Vec<u16>, LoadError> {
    let mut words = Vec::new();

    loop {
        match reader.read_u16::<BigEndian>() {
            Ok(word) => words.push(word),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(words),
            Err(e) => return Err(e.into()),
        }
    }
}
