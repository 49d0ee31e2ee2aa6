use crate::error::SweepError;

/// Inclusive arithmetic range over one runtime parameter. The enumerated set
/// is `start, start+step, ...` truncated at the last value `<= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridAxis {
    start: u32,
    end: u32,
    step: u32,
}

impl GridAxis {
    pub fn new(axis: &'static str, start: u32, end: u32, step: u32) -> Result<Self, SweepError> {
        if step == 0 {
            return Err(SweepError::InvalidGridSpec {
                axis,
                reason: "step must be positive",
                start,
                end,
                step,
            });
        }
        if start > end {
            // An empty axis would report a zero-point sweep as complete.
            return Err(SweepError::InvalidGridSpec {
                axis,
                reason: "start exceeds end",
                start,
                end,
                step,
            });
        }
        Ok(GridAxis { start, end, step })
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn values(&self) -> impl Iterator<Item = u32> + '_ {
        (self.start..=self.end).step_by(self.step as usize)
    }

    pub fn len(&self) -> usize {
        ((self.end - self.start) / self.step) as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Range string recorded in sweep metadata, e.g. `8192-102400:2048`.
    pub fn describe(&self) -> String {
        format!("{}-{}:{}", self.start, self.end, self.step)
    }
}

/// One `(num_ctx, num_batch)` parameter pair under test. Together the two
/// values form the natural key of a trial outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GridPoint {
    pub num_ctx: u32,
    pub num_batch: u32,
}

impl GridPoint {
    pub fn key(&self) -> (u32, u32) {
        (self.num_ctx, self.num_batch)
    }
}

/// Order in which grid points are visited. Affects progress reporting only,
/// never the point set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraversalOrder {
    /// Fix `num_ctx`, vary `num_batch` in the inner loop.
    #[default]
    ColumnFirst,
    /// Fix `num_batch`, vary `num_ctx` in the inner loop.
    RowFirst,
}

#[derive(Debug, Clone, Copy)]
pub struct GridSpec {
    pub num_ctx: GridAxis,
    pub num_batch: GridAxis,
    pub order: TraversalOrder,
}

impl GridSpec {
    pub fn new(num_ctx: GridAxis, num_batch: GridAxis, order: TraversalOrder) -> Self {
        GridSpec {
            num_ctx,
            num_batch,
            order,
        }
    }

    pub fn len(&self) -> usize {
        self.num_ctx.len() * self.num_batch.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Full cartesian product in the configured traversal order.
    pub fn points(&self) -> Vec<GridPoint> {
        let mut out = Vec::with_capacity(self.len());
        match self.order {
            TraversalOrder::ColumnFirst => {
                for num_ctx in self.num_ctx.values() {
                    for num_batch in self.num_batch.values() {
                        out.push(GridPoint { num_ctx, num_batch });
                    }
                }
            }
            TraversalOrder::RowFirst => {
                for num_batch in self.num_batch.values() {
                    for num_ctx in self.num_ctx.values() {
                        out.push(GridPoint { num_ctx, num_batch });
                    }
                }
            }
        }
        out
    }
}
