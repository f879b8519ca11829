use crate::map::extent::Extent;

/// Screen-space box competing for a spot on the canvas. Candidates are
/// built fresh for every render pass and decided in insertion order.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationCandidate {
    pub bbox: Extent,
    pub visible: bool,
}

impl AnnotationCandidate {
    pub fn new(bbox: Extent) -> Self {
        Self {
            bbox,
            visible: false,
        }
    }
}

/// Greedy first-come-first-served collision avoidance.
///
/// Keeps every accepted box plus their union. A box clear of the union
/// cannot overlap anything and is accepted without a scan. The result is
/// pairwise non-overlapping but not maximal.
#[derive(Clone, Debug, Default)]
pub struct CollisionPlacer {
    placed: Vec<Extent>,
    union: Option<Extent>,
}

impl CollisionPlacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to claim `bbox`; returns whether it was accepted
    pub fn try_place(&mut self, bbox: Extent) -> bool {
        let accepted = match self.union {
            None => true,
            Some(union) if !bbox.intersects(&union) => true,
            Some(_) => !self.placed.iter().any(|p| p.intersects(&bbox)),
        };
        if accepted {
            self.union = Some(match self.union {
                Some(u) => u.union(&bbox),
                None => bbox,
            });
            self.placed.push(bbox);
        }
        accepted
    }

    /// Accepted boxes in placement order
    pub fn placed(&self) -> &[Extent] {
        &self.placed
    }

    pub fn clear(&mut self) {
        self.placed.clear();
        self.union = None;
    }
}

/// Mark each candidate visible or not, in input order
pub fn place(candidates: &mut [AnnotationCandidate]) {
    let mut placer = CollisionPlacer::new();
    for c in candidates.iter_mut() {
        c.visible = placer.try_place(c.bbox);
    }
}

/// Last placement result together with the view epoch it was computed for.
/// Any refit of the view bumps the epoch, which makes the cache stale.
#[derive(Clone, Debug, Default)]
pub struct PlacementCache {
    epoch: Option<u64>,
    visible: Vec<bool>,
}

impl PlacementCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid_for(&self, epoch: u64) -> bool {
        self.epoch == Some(epoch)
    }

    /// Drop the cached result, e.g. when the feature set changes
    pub fn invalidate(&mut self) {
        self.epoch = None;
        self.visible.clear();
    }

    /// Return cached visibility for `epoch`, placing `candidates` anew if stale
    pub fn get_or_place(&mut self, epoch: u64, candidates: &mut [AnnotationCandidate]) -> &[bool] {
        if self.is_valid_for(epoch) && self.visible.len() == candidates.len() {
            for (c, &v) in candidates.iter_mut().zip(&self.visible) {
                c.visible = v;
            }
        } else {
            place(candidates);
            self.visible = candidates.iter().map(|c| c.visible).collect();
            self.epoch = Some(epoch);
        }
        &self.visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic value in [0, 1) from a seed (splitmix64)
    fn unit(seed: u64) -> f64 {
        let mut x = seed.wrapping_mul(0x9e3779b97f4a7c15);
        x ^= x >> 30;
        x = x.wrapping_mul(0xbf58476d1ce4e5b9);
        x ^= x >> 27;
        (x >> 11) as f64 / 9007199254740992.0
    }

    fn boxes(list: &[(f64, f64, f64, f64)]) -> Vec<AnnotationCandidate> {
        list.iter()
            .map(|&(x0, x1, y0, y1)| AnnotationCandidate::new(Extent::new(x0, x1, y0, y1)))
            .collect()
    }

    fn visible(c: &[AnnotationCandidate]) -> Vec<bool> {
        c.iter().map(|c| c.visible).collect()
    }

    #[test]
    fn test_second_overlaps_first() {
        let mut c = boxes(&[
            (0.0, 10.0, 0.0, 10.0),
            (5.0, 15.0, 5.0, 15.0),
            (20.0, 30.0, 0.0, 10.0),
        ]);
        place(&mut c);
        assert_eq!(visible(&c), vec![true, false, true]);
    }

    #[test]
    fn test_inside_union_but_clear_of_boxes() {
        // third box sits in the gap between the first two
        let mut c = boxes(&[
            (0.0, 10.0, 0.0, 10.0),
            (20.0, 30.0, 20.0, 30.0),
            (12.0, 18.0, 12.0, 18.0),
            (9.0, 13.0, 9.0, 13.0),
        ]);
        place(&mut c);
        assert_eq!(visible(&c), vec![true, true, true, false]);
    }

    #[test]
    fn test_empty_input() {
        let mut c: Vec<AnnotationCandidate> = Vec::new();
        place(&mut c);
        assert!(c.is_empty());
    }

    #[test]
    fn test_random_output_is_pairwise_disjoint_and_deterministic() {
        let list: Vec<(f64, f64, f64, f64)> = (0..300u64)
            .map(|i| {
                let x = unit(i * 4) * 500.0;
                let y = unit(i * 4 + 1) * 500.0;
                let w = 5.0 + unit(i * 4 + 2) * 40.0;
                let h = 5.0 + unit(i * 4 + 3) * 20.0;
                (x, x + w, y, y + h)
            })
            .collect();

        let mut a = boxes(&list);
        let mut b = boxes(&list);
        place(&mut a);
        place(&mut b);
        assert_eq!(visible(&a), visible(&b));

        let shown: Vec<&Extent> = a.iter().filter(|c| c.visible).map(|c| &c.bbox).collect();
        assert!(!shown.is_empty());
        for i in 0..shown.len() {
            for j in (i + 1)..shown.len() {
                assert!(!shown[i].intersects(shown[j]));
            }
        }
        // every rejected box hits something that was shown
        for c in a.iter().filter(|c| !c.visible) {
            assert!(shown.iter().any(|s| s.intersects(&c.bbox)));
        }
    }

    #[test]
    fn test_cache_reuses_until_epoch_changes() {
        let mut cache = PlacementCache::new();
        let mut c = boxes(&[(0.0, 10.0, 0.0, 10.0), (5.0, 15.0, 5.0, 15.0)]);
        assert_eq!(cache.get_or_place(1, &mut c), &[true, false]);
        assert!(cache.is_valid_for(1));

        // same epoch: result is reused even though boxes moved
        let mut moved = boxes(&[(0.0, 10.0, 0.0, 10.0), (50.0, 60.0, 5.0, 15.0)]);
        assert_eq!(cache.get_or_place(1, &mut moved), &[true, false]);
        assert!(!moved[1].visible);

        // new epoch: placement reruns
        assert_eq!(cache.get_or_place(2, &mut moved), &[true, true]);
        cache.invalidate();
        assert!(!cache.is_valid_for(2));
    }
}
