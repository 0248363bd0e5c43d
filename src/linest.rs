use crate::schema::DataPoint;
use crate::schema::Weights;

/// Running sums for the closed-form least-squares line.
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct Linest {
    x_sum: f64,
    x2_sum: f64,
    y_sum: f64,
    y2_sum: f64,
    xy_sum: f64,
    n: usize,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinestResult {
    pub weights: Weights,
    /// Coefficient of determination. NaN when every y is equal.
    pub r2: f64,
}

impl Linest {
    pub fn push(&mut self, point: &DataPoint) {
        let DataPoint { x, y } = *point;
        self.x_sum += x;
        self.x2_sum += x * x;
        self.y_sum += y;
        self.y2_sum += y * y;
        self.xy_sum += x * y;
        self.n += 1;
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// `None` until there are two points with distinct x.
    pub fn estimate(&self) -> Option<LinestResult> {
        if self.n < 2 {
            return None;
        }
        let n = self.n as f64;
        let denom = n * self.x2_sum - self.x_sum * self.x_sum;
        if denom.abs() <= f64::EPSILON * n * self.x2_sum.max(1.0) {
            return None;
        }
        let gue = n * self.xy_sum - self.x_sum * self.y_sum;
        let slope = gue / denom;
        let intercept = (self.x2_sum * self.y_sum - self.xy_sum * self.x_sum) / denom;
        let r2 = gue * gue / denom / (n * self.y2_sum - self.y_sum * self.y_sum);
        Some(LinestResult {
            weights: Weights::new(slope, intercept),
            r2,
        })
    }
}

impl<'a> Extend<&'a DataPoint> for Linest {
    fn extend<I: IntoIterator<Item = &'a DataPoint>>(&mut self, iter: I) {
        iter.into_iter().for_each(|p| self.push(p));
    }
}

#[cfg(test)]
mod test {
    use super::Linest;
    use crate::schema::DataPoint;

    #[test]
    fn exact_line() {
        let mut linest = Linest::default();
        linest.extend(&[
            DataPoint::new(0.0, 1.0),
            DataPoint::new(1.0, 3.0),
            DataPoint::new(2.0, 5.0),
        ]);
        let res = linest.estimate().unwrap();
        assert!((res.weights.slope - 2.0).abs() < 1e-12);
        assert!((res.weights.intercept - 1.0).abs() < 1e-12);
        assert!((res.r2 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn needs_two_distinct_x() {
        let mut linest = Linest::default();
        assert!(linest.estimate().is_none());
        linest.push(&DataPoint::new(1.0, 1.0));
        assert!(linest.estimate().is_none());
        linest.push(&DataPoint::new(1.0, 2.0));
        assert!(linest.estimate().is_none());
        linest.push(&DataPoint::new(2.0, 2.0));
        assert!(linest.estimate().is_some());
        assert_eq!(linest.len(), 3);
    }
}
