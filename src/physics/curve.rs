use std::fmt;
use std::sync::Arc;

use crate::error::FlightError;

// ---------------------------------------------------------------------------
// One-dimensional lookup: y = f(x)
// ---------------------------------------------------------------------------

/// Scalar function of one variable with the evaluation strategy fixed at
/// construction. Used for thrust curves, Mach tables and wind profiles.
///
/// Tables interpolate linearly and hold the end values outside their range.
#[derive(Clone)]
pub enum Curve {
    Constant(f64),
    Table(Table),
    Analytic(Arc<dyn Fn(f64) -> f64 + Send + Sync>),
}

impl Curve {
    pub fn table(points: &[(f64, f64)]) -> Result<Self, FlightError> {
        Table::new(points).map(Curve::Table)
    }

    pub fn analytic(f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        Curve::Analytic(Arc::new(f))
    }

    pub fn eval(&self, x: f64) -> f64 {
        match self {
            Curve::Constant(v) => *v,
            Curve::Table(t) => t.eval(x),
            Curve::Analytic(f) => f(x),
        }
    }
}

impl fmt::Debug for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Curve::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            Curve::Table(t) => f.debug_tuple("Table").field(&t.xs.len()).finish(),
            Curve::Analytic(_) => f.write_str("Analytic(..)"),
        }
    }
}

impl From<f64> for Curve {
    fn from(v: f64) -> Self {
        Curve::Constant(v)
    }
}

/// Piecewise-linear table with strictly increasing abscissae.
#[derive(Debug, Clone)]
pub struct Table {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl Table {
    pub fn new(points: &[(f64, f64)]) -> Result<Self, FlightError> {
        if points.is_empty() {
            return Err(FlightError::Config("lookup table needs at least one point".into()));
        }
        if points.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(FlightError::Config("lookup table contains non-finite values".into()));
        }
        if points.windows(2).any(|w| w[1].0 <= w[0].0) {
            return Err(FlightError::Config("lookup table abscissae must be strictly increasing".into()));
        }
        Ok(Self {
            xs: points.iter().map(|p| p.0).collect(),
            ys: points.iter().map(|p| p.1).collect(),
        })
    }

    pub fn eval(&self, x: f64) -> f64 {
        let n = self.xs.len();
        if x <= self.xs[0] {
            return self.ys[0];
        }
        if x >= self.xs[n - 1] {
            return self.ys[n - 1];
        }
        // First index with xs[i] > x; guaranteed in 1..n here.
        let i = self.xs.partition_point(|&xi| xi <= x);
        let (x0, x1) = (self.xs[i - 1], self.xs[i]);
        let (y0, y1) = (self.ys[i - 1], self.ys[i]);
        y0 + (y1 - y0) * (x - x0) / (x1 - x0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_interpolates_linearly() {
        let c = Curve::table(&[(0.0, 0.0), (1.0, 10.0), (3.0, 30.0)]).unwrap();
        assert!((c.eval(0.5) - 5.0).abs() < 1e-12);
        assert!((c.eval(2.0) - 20.0).abs() < 1e-12);
        assert!((c.eval(1.0) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn table_holds_last_value_outside_range() {
        let c = Curve::table(&[(0.3, 0.4), (1.2, 0.6)]).unwrap();
        assert_eq!(c.eval(-5.0), 0.4);
        assert_eq!(c.eval(25.0), 0.6);
    }

    #[test]
    fn unsorted_table_rejected() {
        assert!(Table::new(&[(1.0, 0.0), (0.5, 1.0)]).is_err());
        assert!(Table::new(&[]).is_err());
    }

    #[test]
    fn analytic_and_constant_strategies() {
        let sq = Curve::analytic(|x| x * x);
        assert_eq!(sq.eval(3.0), 9.0);
        assert_eq!(Curve::from(2.5).eval(100.0), 2.5);
    }
}
