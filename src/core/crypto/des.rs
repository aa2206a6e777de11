//! Triple block cipher used by QQ Music for QRC payloads.
//!
//! This is a DES-shaped Feistel network, but the platform ships modified
//! S-box entries and reads key/block bits through a byte-swapped 32-bit word
//! layout, so a stock DES implementation produces different output. Every
//! table below is reproduced as the platform uses it.

/// Direction a round-key schedule is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Encrypt,
    Decrypt,
}

const ROUND_SHIFTS: [u32; 16] = [1, 1, 2, 2, 2, 2, 2, 2, 1, 2, 2, 2, 2, 2, 2, 1];

const KEY_PERM_C: [usize; 28] = [
    56, 48, 40, 32, 24, 16, 8, 0, 57, 49, 41, 33, 25, 17,
    9, 1, 58, 50, 42, 34, 26, 18, 10, 2, 59, 51, 43, 35,
];

const KEY_PERM_D: [usize; 28] = [
    62, 54, 46, 38, 30, 22, 14, 6, 61, 53, 45, 37, 29, 21,
    13, 5, 60, 52, 44, 36, 28, 20, 12, 4, 27, 19, 11, 3,
];

const KEY_COMPRESSION: [usize; 48] = [
    13, 16, 10, 23, 0, 4, 2, 27, 14, 5, 20, 9,
    22, 18, 11, 3, 25, 7, 15, 6, 26, 19, 12, 1,
    40, 51, 30, 36, 46, 54, 29, 39, 50, 44, 32, 47,
    43, 48, 38, 55, 33, 52, 45, 41, 49, 35, 28, 31,
];

const IP_LEFT: [usize; 32] = [
    57, 49, 41, 33, 25, 17, 9, 1, 59, 51, 43, 35, 27, 19, 11, 3,
    61, 53, 45, 37, 29, 21, 13, 5, 63, 55, 47, 39, 31, 23, 15, 7,
];

const IP_RIGHT: [usize; 32] = [
    56, 48, 40, 32, 24, 16, 8, 0, 58, 50, 42, 34, 26, 18, 10, 2,
    60, 52, 44, 36, 28, 20, 12, 4, 62, 54, 46, 38, 30, 22, 14, 6,
];

/// Output byte position paired with the state column it is gathered from.
const INV_IP_COLUMNS: [(usize, usize); 8] = [
    (3, 7), (2, 6), (1, 5), (0, 4), (7, 3), (6, 2), (5, 1), (4, 0),
];

const EXPANSION: [usize; 48] = [
    31, 0, 1, 2, 3, 4, 3, 4, 5, 6, 7, 8,
    7, 8, 9, 10, 11, 12, 11, 12, 13, 14, 15, 16,
    15, 16, 17, 18, 19, 20, 19, 20, 21, 22, 23, 24,
    23, 24, 25, 26, 27, 28, 27, 28, 29, 30, 31, 0,
];

const P_BOX: [usize; 32] = [
    15, 6, 19, 20, 28, 11, 27, 16, 0, 14, 22, 25, 4, 17, 30, 9,
    1, 7, 23, 13, 31, 26, 2, 8, 18, 12, 29, 5, 21, 10, 3, 24,
];

const SBOXES: [[u8; 64]; 8] = [
    [
        14, 4, 13, 1, 2, 15, 11, 8, 3, 10, 6, 12, 5, 9, 0, 7,
        0, 15, 7, 4, 14, 2, 13, 1, 10, 6, 12, 11, 9, 5, 3, 8,
        4, 1, 14, 8, 13, 6, 2, 11, 15, 12, 9, 7, 3, 10, 5, 0,
        15, 12, 8, 2, 4, 9, 1, 7, 5, 11, 3, 14, 10, 0, 6, 13,
    ],
    [
        15, 1, 8, 14, 6, 11, 3, 4, 9, 7, 2, 13, 12, 0, 5, 10,
        3, 13, 4, 7, 15, 2, 8, 15, 12, 0, 1, 10, 6, 9, 11, 5,
        0, 14, 7, 11, 10, 4, 13, 1, 5, 8, 12, 6, 9, 3, 2, 15,
        13, 8, 10, 1, 3, 15, 4, 2, 11, 6, 7, 12, 0, 5, 14, 9,
    ],
    [
        10, 0, 9, 14, 6, 3, 15, 5, 1, 13, 12, 7, 11, 4, 2, 8,
        13, 7, 0, 9, 3, 4, 6, 10, 2, 8, 5, 14, 12, 11, 15, 1,
        13, 6, 4, 9, 8, 15, 3, 0, 11, 1, 2, 12, 5, 10, 14, 7,
        1, 10, 13, 0, 6, 9, 8, 7, 4, 15, 14, 3, 11, 5, 2, 12,
    ],
    [
        7, 13, 14, 3, 0, 6, 9, 10, 1, 2, 8, 5, 11, 12, 4, 15,
        13, 8, 11, 5, 6, 15, 0, 3, 4, 7, 2, 12, 1, 10, 14, 9,
        10, 6, 9, 0, 12, 11, 7, 13, 15, 1, 3, 14, 5, 2, 8, 4,
        3, 15, 0, 6, 10, 10, 13, 8, 9, 4, 5, 11, 12, 7, 2, 14,
    ],
    [
        2, 12, 4, 1, 7, 10, 11, 6, 8, 5, 3, 15, 13, 0, 14, 9,
        14, 11, 2, 12, 4, 7, 13, 1, 5, 0, 15, 10, 3, 9, 8, 6,
        4, 2, 1, 11, 10, 13, 7, 8, 15, 9, 12, 5, 6, 3, 0, 14,
        11, 8, 12, 7, 1, 14, 2, 13, 6, 15, 0, 9, 10, 4, 5, 3,
    ],
    [
        12, 1, 10, 15, 9, 2, 6, 8, 0, 13, 3, 4, 14, 7, 5, 11,
        10, 15, 4, 2, 7, 12, 9, 5, 6, 1, 13, 14, 0, 11, 3, 8,
        9, 14, 15, 5, 2, 8, 12, 3, 7, 0, 4, 10, 1, 13, 11, 6,
        4, 3, 2, 12, 9, 5, 15, 10, 11, 14, 1, 7, 6, 0, 8, 13,
    ],
    [
        4, 11, 2, 14, 15, 0, 8, 13, 3, 12, 9, 7, 5, 10, 6, 1,
        13, 0, 11, 7, 4, 9, 1, 10, 14, 3, 5, 12, 2, 15, 8, 6,
        1, 4, 11, 13, 12, 3, 7, 14, 10, 15, 6, 8, 0, 5, 9, 2,
        6, 11, 13, 8, 1, 4, 10, 7, 9, 5, 0, 15, 14, 2, 3, 12,
    ],
    [
        13, 2, 8, 4, 6, 15, 11, 1, 10, 9, 3, 14, 5, 0, 12, 7,
        1, 15, 13, 8, 10, 3, 7, 4, 12, 5, 6, 11, 0, 14, 9, 2,
        7, 11, 4, 1, 9, 12, 14, 2, 0, 6, 10, 13, 15, 3, 5, 8,
        2, 1, 14, 7, 4, 10, 8, 13, 15, 12, 9, 0, 3, 5, 6, 11,
    ],
];

/// Reads bit `index` of a block, addressing bytes as little-endian 32-bit words.
fn block_bit(data: &[u8], index: usize) -> u32 {
    let byte = data[index / 32 * 4 + 3 - index % 32 / 8];
    ((byte >> (7 - index % 8)) & 0x01) as u32
}

/// Reads bit `index` of a word, counted from the most significant bit.
fn word_bit(word: u32, index: usize) -> u32 {
    (word >> (31 - index)) & 0x01
}

/// Maps a 6-bit S-box input (outer bits select the row) onto the flat table index.
fn sbox_index(bits: u8) -> usize {
    ((bits & 0x20) | ((bits & 0x1f) >> 1) | ((bits & 0x01) << 4)) as usize
}

/// Derives the 16 round keys (48 bits each, MSB-first in a u64) for one key.
fn key_schedule(key: &[u8], mode: Mode) -> [u64; 16] {
    let mut c = 0u32;
    let mut d = 0u32;
    for (i, (&pc, &pd)) in KEY_PERM_C.iter().zip(KEY_PERM_D.iter()).enumerate() {
        c |= block_bit(key, pc) << (31 - i);
        d |= block_bit(key, pd) << (31 - i);
    }

    let mut schedule = [0u64; 16];
    for (round, &shift) in ROUND_SHIFTS.iter().enumerate() {
        c = ((c << shift) | (c >> (28 - shift))) & 0xffff_fff0;
        d = ((d << shift) | (d >> (28 - shift))) & 0xffff_fff0;

        let mut round_key = 0u64;
        for (j, &pos) in KEY_COMPRESSION.iter().enumerate() {
            let bit = if j < 24 { word_bit(c, pos) } else { word_bit(d, pos - 27) };
            round_key |= (bit as u64) << (47 - j);
        }

        let slot = match mode {
            Mode::Encrypt => round,
            Mode::Decrypt => 15 - round,
        };
        schedule[slot] = round_key;
    }
    schedule
}

fn initial_permutation(block: &[u8]) -> [u32; 2] {
    let mut state = [0u32; 2];
    for i in 0..32 {
        state[0] |= block_bit(block, IP_LEFT[i]) << (31 - i);
        state[1] |= block_bit(block, IP_RIGHT[i]) << (31 - i);
    }
    state
}

fn final_permutation(state: [u32; 2]) -> [u8; 8] {
    let mut out = [0u8; 8];
    for &(byte_pos, column) in INV_IP_COLUMNS.iter() {
        let mut byte = 0u32;
        for j in 0..4 {
            let index = column + 8 * j;
            byte |= word_bit(state[1], index) << (7 - 2 * j);
            byte |= word_bit(state[0], index) << (6 - 2 * j);
        }
        out[byte_pos] = byte as u8;
    }
    out
}

/// Round function: expand to 48 bits, mix the round key, substitute, permute.
fn feistel(half: u32, round_key: u64) -> u32 {
    let mut expanded = 0u64;
    for (i, &pos) in EXPANSION.iter().enumerate() {
        expanded |= (word_bit(half, pos) as u64) << (47 - i);
    }
    expanded ^= round_key;

    let mut substituted = 0u32;
    for (k, sbox) in SBOXES.iter().enumerate() {
        let six = ((expanded >> (42 - 6 * k)) & 0x3f) as u8;
        substituted |= (sbox[sbox_index(six)] as u32) << (28 - 4 * k);
    }

    let mut permuted = 0u32;
    for (i, &pos) in P_BOX.iter().enumerate() {
        permuted |= word_bit(substituted, pos) << (31 - i);
    }
    permuted
}

fn crypt_block(block: &[u8], schedule: &[u64; 16]) -> [u8; 8] {
    let mut state = initial_permutation(block);
    for round_key in schedule.iter().take(15) {
        let previous = state[1];
        state[1] = feistel(state[1], *round_key) ^ state[0];
        state[0] = previous;
    }
    state[0] ^= feistel(state[1], schedule[15]);
    final_permutation(state)
}

/// Three chained single-cipher passes under independent key schedules.
pub struct TripleDes {
    schedules: [[u64; 16]; 3],
}

impl TripleDes {
    /// Builds the EDE (encrypt) or DED (decrypt) schedule set from a 24-byte key.
    pub fn new(key: &[u8; 24], mode: Mode) -> Self {
        let (k1, rest) = key.split_at(8);
        let (k2, k3) = rest.split_at(8);
        let schedules = match mode {
            Mode::Encrypt => [
                key_schedule(k1, Mode::Encrypt),
                key_schedule(k2, Mode::Decrypt),
                key_schedule(k3, Mode::Encrypt),
            ],
            Mode::Decrypt => [
                key_schedule(k3, Mode::Decrypt),
                key_schedule(k2, Mode::Encrypt),
                key_schedule(k1, Mode::Decrypt),
            ],
        };
        Self { schedules }
    }

    pub fn crypt_block(&self, block: &[u8]) -> [u8; 8] {
        let first = crypt_block(block, &self.schedules[0]);
        let second = crypt_block(&first, &self.schedules[1]);
        crypt_block(&second, &self.schedules[2])
    }

    /// ECB over whole 8-byte blocks; a trailing partial block is dropped.
    pub fn crypt_ecb(&self, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len() - data.len() % 8);
        for block in data.chunks_exact(8) {
            out.extend_from_slice(&self.crypt_block(block));
        }
        out
    }
}
