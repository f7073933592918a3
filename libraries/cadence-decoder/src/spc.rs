//! SNES SPC rendering through Game Music Emu
//!
//! An SPC file is a snapshot of the SPC700 sound CPU and its DSP. There is no
//! natural end: the emulated program usually loops forever, so the rendered
//! length comes from the ID666 play time and fade fields, falling back to a
//! fixed length for untagged dumps.

use crate::chiptune::ChiptuneRenderer;
use crate::error::{DecodeError, Result};
use cadence_core::{CHANNELS, SAMPLE_RATE};
use game_music_emu::{EmuType, GameMusicEmu};

const SIGNATURE: &[u8] = b"SNES-SPC700 Sound File Data";
const MIN_FILE_SIZE: usize = 0x10180;
const ID666_FLAG_OFFSET: usize = 0x23;
const ID666_PRESENT: u8 = 26;
const PLAY_SECS_OFFSET: usize = 0xA9;
const PLAY_SECS_LEN: usize = 3;
const FADE_MS_OFFSET: usize = 0xAC;
const FADE_MS_LEN: usize = 5;

/// Samples (both channels) produced per emulator call
const RENDER_BLOCK: usize = 8192;

/// [`ChiptuneRenderer`] for `.spc` dumps
#[derive(Debug, Clone)]
pub struct SpcRenderer {
    default_secs: u32,
}

impl SpcRenderer {
    /// Renderer that plays untagged dumps for `default_secs`
    pub fn new(default_secs: u32) -> Self {
        Self {
            default_secs: default_secs.max(1),
        }
    }

    /// Frames to render for this file
    pub fn length_frames(&self, file: &[u8]) -> usize {
        let millis = tagged_length_ms(file).unwrap_or(u64::from(self.default_secs) * 1000);
        (millis * u64::from(SAMPLE_RATE) / 1000) as usize
    }
}

impl Default for SpcRenderer {
    fn default() -> Self {
        Self::new(180)
    }
}

impl ChiptuneRenderer for SpcRenderer {
    fn render(&self, file: &[u8]) -> Result<Vec<u8>> {
        if file.len() < MIN_FILE_SIZE || !file.starts_with(SIGNATURE) {
            return Err(DecodeError::Renderer("not an SPC700 sound file".to_string()));
        }

        let emu = GameMusicEmu::new(EmuType::Spc, SAMPLE_RATE);
        emu.load_data(file)
            .map_err(|e| DecodeError::Renderer(e.message().to_string()))?;
        emu.start_track(0)
            .map_err(|e| DecodeError::Renderer(e.message().to_string()))?;

        let total = self.length_frames(file) * CHANNELS;
        let mut out = Vec::with_capacity(total * std::mem::size_of::<f32>());
        let mut block = vec![0i16; RENDER_BLOCK];
        let mut rendered = 0;

        while rendered < total {
            // GME fills whole stereo frames
            let count = (total - rendered).min(RENDER_BLOCK);
            emu.play(count, &mut block[..count])
                .map_err(|e| DecodeError::Renderer(e.message().to_string()))?;
            for sample in &block[..count] {
                let value = f32::from(*sample) / 32768.0;
                out.extend_from_slice(&value.to_le_bytes());
            }
            rendered += count;
        }

        tracing::debug!(frames = total / CHANNELS, "Rendered SPC");
        Ok(out)
    }
}

/// Play time plus fade from a text-format ID666 tag
fn tagged_length_ms(file: &[u8]) -> Option<u64> {
    if file.get(ID666_FLAG_OFFSET) != Some(&ID666_PRESENT) {
        return None;
    }
    let secs = ascii_number(file.get(PLAY_SECS_OFFSET..PLAY_SECS_OFFSET + PLAY_SECS_LEN)?)?;
    if secs == 0 {
        return None;
    }
    let fade = file
        .get(FADE_MS_OFFSET..FADE_MS_OFFSET + FADE_MS_LEN)
        .and_then(ascii_number)
        .unwrap_or(0);
    Some(secs * 1000 + fade)
}

fn ascii_number(field: &[u8]) -> Option<u64> {
    let digits: Vec<u8> = field
        .iter()
        .copied()
        .take_while(|b| *b != 0)
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(&digits).ok()?.parse().ok()
}
