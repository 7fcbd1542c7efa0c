//! Pseudo-random sequence XORed over DATA frame payloads.

/// First value of the sequence.
pub const SEED: u8 = 0x42;
/// Feedback applied when the low bit shifts out set.
pub const FEEDBACK: u8 = 0xB8;

/// The 8-bit LFSR keystream.
#[derive(Debug, Clone)]
pub struct Lfsr {
    state: u8,
}

impl Lfsr {
    pub fn new() -> Self {
        Self { state: SEED }
    }
}

impl Default for Lfsr {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for Lfsr {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let current = self.state;
        self.state = if current & 0x01 != 0 {
            (current >> 1) ^ FEEDBACK
        } else {
            current >> 1
        };
        Some(current)
    }
}

/// XOR `data` with the keystream in place. Applying it twice restores
/// the input.
pub fn randomize_in_place(data: &mut [u8]) {
    for (byte, key) in data.iter_mut().zip(Lfsr::new()) {
        *byte ^= key;
    }
}

/// Randomized copy of `data`.
pub fn randomize(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    randomize_in_place(&mut out);
    out
}
