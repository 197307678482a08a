use nalgebra::SVector;
use serde::Serialize;
use tracing::debug;

use crate::error::FlightError;

// ---------------------------------------------------------------------------
// ODE system
// ---------------------------------------------------------------------------

/// First-order system y' = f(t, y).
pub trait OdeSystem<const N: usize> {
    fn rhs(&self, t: f64, y: &SVector<f64, N>) -> Result<SVector<f64, N>, FlightError>;
}

// ---------------------------------------------------------------------------
// Dormand–Prince 5(4) coefficients
// ---------------------------------------------------------------------------

const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;
const A71: f64 = 35.0 / 384.0;
const A73: f64 = 500.0 / 1113.0;
const A74: f64 = 125.0 / 192.0;
const A75: f64 = -2187.0 / 6784.0;
const A76: f64 = 11.0 / 84.0;

// 5th minus 4th order weights
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

// Dense output (Hairer, Nørsett & Wanner, contd5)
const D1: f64 = -12715105075.0 / 11282082432.0;
const D3: f64 = 87487479700.0 / 32700410799.0;
const D4: f64 = -10690763975.0 / 1880347072.0;
const D5: f64 = 701980252875.0 / 199316789632.0;
const D6: f64 = -1453857185.0 / 822651844.0;
const D7: f64 = 69997945.0 / 29380423.0;

const SAFETY: f64 = 0.9;
const FACTOR_MIN: f64 = 0.2;
const FACTOR_MAX: f64 = 5.0;

// ---------------------------------------------------------------------------
// Step results
// ---------------------------------------------------------------------------

/// 4th-order continuous extension over one accepted step.
#[derive(Debug, Clone)]
pub struct Dense<const N: usize> {
    t0: f64,
    t1: f64,
    h: f64,
    r: [SVector<f64, N>; 5],
}

impl<const N: usize> Dense<N> {
    pub fn t0(&self) -> f64 {
        self.t0
    }

    pub fn t1(&self) -> f64 {
        self.t1
    }

    /// Interpolated solution at `t` in [t0, t1].
    pub fn eval(&self, t: f64) -> SVector<f64, N> {
        if t >= self.t1 {
            return self.r[0] + self.r[1];
        }
        let s = (t - self.t0) / self.h;
        let s1 = 1.0 - s;
        let [r1, r2, r3, r4, r5] = &self.r;
        r1 + (r2 + (r3 + (r4 + r5 * s1) * s) * s1) * s
    }
}

#[derive(Debug, Clone)]
pub struct Accepted<const N: usize> {
    pub t0: f64,
    pub t1: f64,
    pub y0: SVector<f64, N>,
    pub y1: SVector<f64, N>,
    /// Derivative at the start of the step.
    pub k1: SVector<f64, N>,
    pub dense: Dense<N>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepStats {
    pub accepted: usize,
    pub rejected: usize,
    pub evaluations: usize,
    pub restarts: usize,
}

impl StepStats {
    pub fn attempts(&self) -> usize {
        self.accepted + self.rejected
    }
}

/// Result of one Runge–Kutta stage sweep.
struct Trial<const N: usize> {
    y1: SVector<f64, N>,
    k: [SVector<f64, N>; 7],
}

// ---------------------------------------------------------------------------
// Adaptive integrator
// ---------------------------------------------------------------------------

/// Embedded Dormand–Prince 5(4) with FSAL and dense output.
#[derive(Debug, Clone)]
pub struct DormandPrince<const N: usize> {
    atol: SVector<f64, N>,
    rtol: f64,
    h_min: f64,
    h_max: f64,
    max_steps: usize,
    h: f64,
    /// Derivative at the end of the last accepted step (first same as last).
    fsal: Option<(f64, SVector<f64, N>)>,
    stats: StepStats,
}

impl<const N: usize> DormandPrince<N> {
    pub fn new(atol: SVector<f64, N>, rtol: f64, initial_step: f64, min_step: f64, max_step: f64, max_steps: usize) -> Self {
        Self {
            atol,
            rtol,
            h_min: min_step,
            h_max: max_step,
            max_steps,
            h: initial_step.clamp(min_step, max_step),
            fsal: None,
            stats: StepStats::default(),
        }
    }

    pub fn stats(&self) -> StepStats {
        self.stats
    }

    /// Forget the cached derivative: the right-hand side changed.
    pub fn restart(&mut self) {
        self.fsal = None;
        self.stats.restarts += 1;
        debug!(restarts = self.stats.restarts, h = self.h, "integrator restarted");
    }

    fn eval<S: OdeSystem<N>>(&mut self, sys: &S, t: f64, y: &SVector<f64, N>) -> Result<SVector<f64, N>, FlightError> {
        self.stats.evaluations += 1;
        sys.rhs(t, y)
    }

    fn sweep<S: OdeSystem<N>>(
        &mut self,
        sys: &S,
        t: f64,
        y: &SVector<f64, N>,
        k1: SVector<f64, N>,
        h: f64,
    ) -> Result<Trial<N>, FlightError> {
        let k2 = self.eval(sys, t + C2 * h, &(y + k1 * (h * A21)))?;
        let k3 = self.eval(sys, t + C3 * h, &(y + (k1 * A31 + k2 * A32) * h))?;
        let k4 = self.eval(sys, t + C4 * h, &(y + (k1 * A41 + k2 * A42 + k3 * A43) * h))?;
        let k5 = self.eval(sys, t + C5 * h, &(y + (k1 * A51 + k2 * A52 + k3 * A53 + k4 * A54) * h))?;
        let k6 = self.eval(sys, t + h, &(y + (k1 * A61 + k2 * A62 + k3 * A63 + k4 * A64 + k5 * A65) * h))?;
        let y1 = y + (k1 * A71 + k3 * A73 + k4 * A74 + k5 * A75 + k6 * A76) * h;
        let k7 = self.eval(sys, t + h, &y1)?;
        Ok(Trial { y1, k: [k1, k2, k3, k4, k5, k6, k7] })
    }

    /// Scaled max-norm of the embedded error estimate.
    fn error_norm(&self, y0: &SVector<f64, N>, trial: &Trial<N>, h: f64) -> f64 {
        let [k1, _, k3, k4, k5, k6, k7] = &trial.k;
        let err = (k1 * E1 + k3 * E3 + k4 * E4 + k5 * E5 + k6 * E6 + k7 * E7) * h;
        let mut norm: f64 = 0.0;
        for i in 0..N {
            let scale = self.atol[i] + self.rtol * y0[i].abs().max(trial.y1[i].abs());
            norm = norm.max(err[i].abs() / scale);
        }
        norm
    }

    fn start_derivative<S: OdeSystem<N>>(&mut self, sys: &S, t: f64, y: &SVector<f64, N>) -> Result<SVector<f64, N>, FlightError> {
        match self.fsal {
            Some((tf, k)) if tf == t => Ok(k),
            _ => self.eval(sys, t, y),
        }
    }

    /// Advance one accepted step from `(t, y)` without passing `t_stop`.
    ///
    /// A step clipped to `t_stop` ends exactly on it.
    pub fn step<S: OdeSystem<N>>(
        &mut self,
        sys: &S,
        t: f64,
        y: &SVector<f64, N>,
        t_stop: f64,
    ) -> Result<Accepted<N>, FlightError> {
        let k1 = self.start_derivative(sys, t, y)?;
        let mut h = self.h.min(self.h_max);

        loop {
            if self.stats.attempts() >= self.max_steps {
                return Err(FlightError::IntegrationFailure {
                    time: t,
                    step: h,
                    reason: format!("exceeded the step budget of {}", self.max_steps),
                });
            }

            let remaining = t_stop - t;
            let clipped = h >= remaining;
            let h_try = if clipped { remaining } else { h };

            let trial = self.sweep(sys, t, y, k1, h_try)?;
            if trial.y1.iter().any(|v| !v.is_finite()) {
                return Err(FlightError::IntegrationFailure {
                    time: t,
                    step: h_try,
                    reason: "non-finite state".into(),
                });
            }

            let err = self.error_norm(y, &trial, h_try);
            let factor = if err == 0.0 { FACTOR_MAX } else { (SAFETY * err.powf(-0.2)).clamp(FACTOR_MIN, FACTOR_MAX) };

            if err <= 1.0 {
                self.stats.accepted += 1;
                let t1 = if clipped { t_stop } else { t + h_try };
                let next = (h_try * factor).min(self.h_max);
                // Keep the unclipped proposal when the step was only shortened to land on t_stop.
                self.h = if clipped { next.max(h.min(self.h_max)) } else { next }.max(self.h_min);

                let k7 = trial.k[6];
                self.fsal = Some((t1, k7));
                let dense = self.dense(t, t1, h_try, y, &trial);
                return Ok(Accepted { t0: t, t1, y0: *y, y1: trial.y1, k1, dense });
            }

            self.stats.rejected += 1;
            if h_try <= self.h_min {
                return Err(FlightError::IntegrationFailure {
                    time: t,
                    step: h_try,
                    reason: format!("error estimate {err:.3e} with step at the minimum {:.3e}", self.h_min),
                });
            }
            debug!(t, h = h_try, err, "step rejected");
            h = (h_try * factor).max(self.h_min);
        }
    }

    /// Single step of fixed size from the start of an accepted step, used to
    /// land exactly on an event time inside it.
    pub fn land<S: OdeSystem<N>>(&mut self, sys: &S, step: &Accepted<N>, t_end: f64) -> Result<SVector<f64, N>, FlightError> {
        if t_end >= step.t1 {
            return Ok(step.y1);
        }
        let h = t_end - step.t0;
        if h <= 0.0 {
            return Ok(step.y0);
        }
        Ok(self.sweep(sys, step.t0, &step.y0, step.k1, h)?.y1)
    }

    fn dense(&self, t0: f64, t1: f64, h: f64, y0: &SVector<f64, N>, trial: &Trial<N>) -> Dense<N> {
        let [k1, _, k3, k4, k5, k6, k7] = &trial.k;
        let ydiff = trial.y1 - y0;
        let bspl = k1 * h - ydiff;
        let r4 = ydiff - k7 * h - bspl;
        let r5 = (k1 * D1 + k3 * D3 + k4 * D4 + k5 * D5 + k6 * D6 + k7 * D7) * h;
        Dense { t0, t1, h, r: [*y0, ydiff, bspl, r4, r5] }
    }
}
