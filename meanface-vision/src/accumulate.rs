use crate::error::{Error, Result};
use crate::raster::Canvas;

/// Running intensity sum of warped faces.
#[derive(Debug, Clone)]
pub struct Accumulator {
    sum: Canvas,
    count: usize,
}

impl Accumulator {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            sum: Canvas::new(width, height),
            count: 0,
        }
    }

    pub fn add(&mut self, image: &Canvas) {
        debug_assert_eq!(self.sum.data.dim(), image.data.dim());
        self.sum.data += &image.data;
        self.count += 1;
    }

    /// Combine two partial sums, e.g. from separate worker threads.
    pub fn merge(mut self, other: Accumulator) -> Accumulator {
        if other.count > 0 {
            self.sum.data += &other.sum.data;
            self.count += other.count;
        }
        self
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Mean of everything added so far.
    pub fn finish(self) -> Result<Canvas> {
        if self.count == 0 {
            return Err(Error::Empty);
        }
        let n = self.count as f32;
        let mut mean = self.sum;
        mean.data.mapv_inplace(|v| v / n);
        Ok(mean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_of_identical_images() {
        let img = Canvas::from_fn(5, 4, |x, y| [x as f32 / 5.0, y as f32 / 4.0, 0.3]);
        let mut acc = Accumulator::new(5, 4);
        for _ in 0..7 {
            acc.add(&img);
        }
        let mean = acc.finish().unwrap();
        let diff = (&mean.data - &img.data)
            .iter()
            .fold(0.0f32, |m, v| m.max(v.abs()));
        assert!(diff < 1e-6);
    }

    #[test]
    fn test_merge_partial_sums() {
        let black = Canvas::new(2, 2);
        let white = Canvas::from_fn(2, 2, |_, _| [1.0, 1.0, 1.0]);
        let mut a = Accumulator::new(2, 2);
        a.add(&black);
        let mut b = Accumulator::new(2, 2);
        b.add(&white);
        b.add(&white);
        let merged = a.merge(b).merge(Accumulator::new(2, 2));
        assert_eq!(merged.count(), 3);
        let mean = merged.finish().unwrap();
        assert!((mean.data[[1, 1, 0]] - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_accumulator() {
        assert!(matches!(Accumulator::new(3, 3).finish(), Err(Error::Empty)));
    }
}
