//! ID666 tags for SNES SPC dumps
//!
//! Lofty has no SPC support, so the fixed-offset text block at the start of
//! the file is read directly.

use cadence_core::TrackMetadata;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const SIGNATURE: &[u8] = b"SNES-SPC700 Sound File Data";
const HAS_ID666: u8 = 26;
const TAG_FLAG_OFFSET: usize = 0x23;
const SONG_TITLE: (usize, usize) = (0x2E, 32);
const GAME_TITLE: (usize, usize) = (0x4E, 32);
const ARTIST: (usize, usize) = (0xB1, 32);
const HEADER_LEN: usize = 0xB1 + 32;

/// Read the ID666 block of an SPC file
///
/// Returns `None` when the file cannot be opened, is not an SPC dump, or
/// carries no tag block.
pub fn read_id666(path: &Path) -> Option<TrackMetadata> {
    let mut header = Vec::with_capacity(HEADER_LEN);
    File::open(path)
        .ok()?
        .take(HEADER_LEN as u64)
        .read_to_end(&mut header)
        .ok()?;
    parse_id666(&header)
}

/// Parse an ID666 block from the first bytes of an SPC file
pub fn parse_id666(header: &[u8]) -> Option<TrackMetadata> {
    if header.len() < HEADER_LEN || !header.starts_with(SIGNATURE) {
        return None;
    }
    if header[TAG_FLAG_OFFSET] != HAS_ID666 {
        return None;
    }

    let artist = text_field(header, ARTIST);
    Some(TrackMetadata {
        title: text_field(header, SONG_TITLE),
        album: text_field(header, GAME_TITLE),
        performers: artist.into_iter().collect(),
        year: None,
        picture_count: 0,
    })
}

fn text_field(header: &[u8], (offset, len): (usize, usize)) -> Option<String> {
    let raw = &header[offset..offset + len];
    let end = raw.iter().position(|&b| b == 0).unwrap_or(len);
    let text = String::from_utf8_lossy(&raw[..end]).trim().to_string();
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
pub(crate) fn build_header(title: &str, game: &str, artist: &str) -> Vec<u8> {
    let mut header = vec![0u8; HEADER_LEN];
    header[..SIGNATURE.len()].copy_from_slice(SIGNATURE);
    header[0x21] = 26;
    header[0x22] = 26;
    header[TAG_FLAG_OFFSET] = HAS_ID666;
    for ((offset, _), text) in [(SONG_TITLE, title), (GAME_TITLE, game), (ARTIST, artist)] {
        header[offset..offset + text.len()].copy_from_slice(text.as_bytes());
    }
    header
}
