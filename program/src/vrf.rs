// Random word derivation and winner selection
use solana_program::keccak;

use crate::state::RequestId;

/// Reads a random word from the first 8 bytes of a 32 byte result
pub fn word_from_result(result: [u8; 32]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&result[0..8]);
    u64::from_le_bytes(bytes)
}

/// Deterministic words for a request, `keccak(request_id, index)` each.
///
/// This is what a local coordinator delivers when no words are supplied;
/// it is not a source of secure randomness.
pub fn derive_random_words(request_id: RequestId, num_words: u32) -> Vec<u64> {
    (0..num_words)
        .map(|index| {
            let hash = keccak::hashv(&[&request_id.to_le_bytes(), &index.to_le_bytes()]);
            word_from_result(hash.to_bytes())
        })
        .collect()
}

/// Index of the winning entry, `random_word mod player_count`.
///
/// Slightly biased for player counts that are not a power of two.
pub fn winner_index(random_word: u64, player_count: usize) -> Option<usize> {
    if player_count == 0 {
        return None;
    }
    Some((random_word % player_count as u64) as usize)
}
