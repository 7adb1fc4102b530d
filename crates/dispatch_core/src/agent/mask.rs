//! Action encoding and the validity mask over zone imbalance states.

/// Flat `from × to` action space over `zones` zones.
///
/// Action `from·zones + to` moves drivers from `from` to `to`. An action is
/// valid in a state only when `from` has surplus (`state[from] < 0`), `to`
/// is short (`state[to] > 0`), and the two differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionSpace {
    zones: usize,
}

impl ActionSpace {
    pub fn new(zones: usize) -> Self {
        Self { zones }
    }

    pub fn zones(&self) -> usize {
        self.zones
    }

    pub fn size(&self) -> usize {
        self.zones * self.zones
    }

    pub fn index(&self, from: usize, to: usize) -> usize {
        from * self.zones + to
    }

    pub fn decode(&self, index: usize) -> (usize, usize) {
        (index / self.zones, index % self.zones)
    }

    pub fn is_valid(&self, state: &[i64], index: usize) -> bool {
        if index >= self.size() {
            return false;
        }
        let (from, to) = self.decode(index);
        from != to && state[from] < 0 && state[to] > 0
    }

    pub fn mask(&self, state: &[i64]) -> Vec<bool> {
        (0..self.size()).map(|idx| self.is_valid(state, idx)).collect()
    }

    /// Valid action indices in ascending order.
    pub fn valid_actions(&self, state: &[i64]) -> Vec<usize> {
        let surplus: Vec<usize> = (0..self.zones).filter(|&z| state[z] < 0).collect();
        let deficit: Vec<usize> = (0..self.zones).filter(|&z| state[z] > 0).collect();
        let mut valid: Vec<usize> = surplus
            .iter()
            .flat_map(|&from| deficit.iter().map(move |&to| self.index(from, to)))
            .collect();
        valid.sort_unstable();
        valid
    }

    /// Drivers a valid action moves: as many as both zones can use.
    pub fn move_count(&self, state: &[i64], index: usize) -> u32 {
        let (from, to) = self.decode(index);
        let count = (-state[from]).min(state[to]).max(0);
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trips() {
        let space = ActionSpace::new(5);
        assert_eq!(space.size(), 25);
        assert_eq!(space.index(3, 1), 16);
        assert_eq!(space.decode(16), (3, 1));
    }

    #[test]
    fn mask_only_admits_surplus_to_deficit() {
        let space = ActionSpace::new(4);
        let state = [-2, 3, 0, -1];
        let valid = space.valid_actions(&state);
        assert_eq!(valid, vec![space.index(0, 1), space.index(3, 1)]);
        let mask = space.mask(&state);
        assert_eq!(mask.iter().filter(|&&ok| ok).count(), 2);
        for idx in valid {
            assert!(mask[idx]);
        }
        assert_eq!(space.move_count(&state, space.index(0, 1)), 2);
        assert_eq!(space.move_count(&state, space.index(3, 1)), 1);
    }

    #[test]
    fn balanced_state_has_no_actions() {
        let space = ActionSpace::new(3);
        assert!(space.valid_actions(&[0, 0, 0]).is_empty());
        assert!(space.valid_actions(&[-1, -1, 0]).is_empty());
    }
}
