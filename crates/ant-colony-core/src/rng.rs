use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;

/// Large odd multiplier spreading per-agent seeds across the seed space.
pub const RNG_DERIVATION_PRIME: u64 = 0x9E37_79B9_7F4A_7C15;

/// Create a deterministic RNG from a seed.
pub fn create_rng(seed: u64) -> ChaCha12Rng {
    ChaCha12Rng::seed_from_u64(seed)
}

/// Derive a sub-RNG for a specific agent, ensuring independent streams.
///
/// Agents step in parallel, so each one owns its stream instead of sharing
/// the world RNG.
pub fn derive_agent_rng(base_seed: u64, agent_id: u64) -> ChaCha12Rng {
    ChaCha12Rng::seed_from_u64(
        base_seed.wrapping_add(agent_id.wrapping_add(1).wrapping_mul(RNG_DERIVATION_PRIME)),
    )
}
