use super::sha256d;

/// Compute the merkle root over txids given in internal byte order.
/// Pairwise double SHA-256 with last-element duplication on odd layers;
/// the root is returned in internal byte order.
pub fn merkle_root(txids: &[[u8; 32]]) -> [u8; 32] {
    if txids.is_empty() {
        return [0u8; 32];
    }

    let mut layer: Vec<[u8; 32]> = txids.to_vec();
    while layer.len() > 1 {
        if layer.len() % 2 == 1 {
            layer.push(*layer.last().unwrap());
        }
        layer = layer
            .chunks(2)
            .map(|pair| {
                let mut combined = [0u8; 64];
                combined[..32].copy_from_slice(&pair[0]);
                combined[32..].copy_from_slice(&pair[1]);
                sha256d(&combined)
            })
            .collect();
    }
    layer[0]
}
