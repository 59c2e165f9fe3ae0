use bytes::Bytes;
use rand::RngCore;

/// Payload sizes are the base size scaled by these factors, in selector
/// order.
pub const SCALE_FACTORS: [usize; 4] = [1, 2, 4, 8];

/// Immutable set of synthetic response bodies, built once at server
/// startup and shared by handle with every connection task.
#[derive(Debug, Clone)]
pub struct PayloadStore {
    buffers: Vec<Bytes>,
}

impl PayloadStore {
    pub fn generate(base_size: usize) -> Self {
        let mut rng = rand::thread_rng();
        let buffers = SCALE_FACTORS
            .iter()
            .map(|factor| {
                let mut buf = vec![0u8; base_size * factor];
                rng.fill_bytes(&mut buf);
                Bytes::from(buf)
            })
            .collect();
        Self { buffers }
    }

    /// Selectors are 1-based, matching the request path encoding.
    pub fn get(&self, selector: usize) -> Option<Bytes> {
        if selector == 0 {
            return None;
        }
        self.buffers.get(selector - 1).cloned()
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.buffers.iter().map(Bytes::len).collect()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_the_base_size_per_variant() {
        let store = PayloadStore::generate(100);
        assert_eq!(store.sizes(), vec![100, 200, 400, 800]);
    }

    #[test]
    fn selectors_are_one_based() {
        let store = PayloadStore::generate(100);
        assert_eq!(store.get(1).map(|b| b.len()), Some(100));
        assert_eq!(store.get(3).map(|b| b.len()), Some(400));
        assert!(store.get(0).is_none());
        assert!(store.get(5).is_none());
    }

    #[test]
    fn variants_hold_distinct_random_content() {
        let store = PayloadStore::generate(64);
        let first = store.get(1).expect("variant 1");
        let second = store.get(2).expect("variant 2");
        assert_ne!(&first[..], &second[..64]);
    }
}
