//! Uniform rejection sampler over the free part of a rectangular area.

use log::warn;
use rand::{Rng, RngCore};

use crate::common::{AreaBounds, CollisionChecker, FreeSpaceSampler, Point2D};

#[derive(Debug, Clone)]
pub struct UniformFreeSpace {
    bounds: AreaBounds,
    warn_after: usize,
}

impl UniformFreeSpace {
    pub fn new(bounds: AreaBounds) -> Self {
        Self { bounds, warn_after: 10_000 }
    }

    /// Number of consecutive rejections before a stall warning is logged
    pub fn with_warn_after(mut self, warn_after: usize) -> Self {
        self.warn_after = warn_after;
        self
    }

    pub fn bounds(&self) -> &AreaBounds {
        &self.bounds
    }
}

impl FreeSpaceSampler for UniformFreeSpace {
    fn sample_free(&self, cc: &dyn CollisionChecker, rng: &mut dyn RngCore) -> Point2D {
        let mut attempts = 0usize;
        loop {
            let p = Point2D::new(
                rng.gen_range(self.bounds.xmin..=self.bounds.xmax),
                rng.gen_range(self.bounds.ymin..=self.bounds.ymax),
            );
            if cc.is_free(p) {
                return p;
            }
            attempts += 1;
            if attempts == self.warn_after {
                warn!("free-space sampling stalled: {} consecutive rejections", attempts);
            }
        }
    }
}
