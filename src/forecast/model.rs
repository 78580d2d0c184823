use super::types::{ForecastError, ForecastRow, ForecastTable, SeasonalProfiles, TrainingSeries};
use crate::config::ForecastConfig;
use chrono::{Datelike, NaiveDate};
use std::f64::consts::PI;

const YEARLY_PERIOD: f64 = 365.25;
const WEEKLY_PERIOD: f64 = 7.0;
const YEARLY_MIN_SPAN_DAYS: i64 = 730;
const WEEKLY_MIN_SPAN_DAYS: i64 = 14;
const MIN_RIDGE: f64 = 1e-9;
/// Lower bound on the noise estimate, in scaled units. Keeps the seasonal and
/// changepoint penalties well above the unpenalized level and slope.
const MIN_NOISE: f64 = 1e-4;
const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// A model that can be fitted on `(ds, y)` and evaluated on arbitrary dates.
pub trait ForecastModel: Send {
    fn fit(&mut self, series: &TrainingSeries) -> Result<(), ForecastError>;

    fn predict(&self, dates: &[NaiveDate]) -> Result<ForecastTable, ForecastError>;

    fn profiles(&self) -> Result<SeasonalProfiles, ForecastError>;
}

/// Piecewise-linear trend plus Fourier seasonalities, fitted by penalized
/// least squares.
pub struct AdditiveModel {
    settings: ForecastConfig,
    fitted: Option<Fitted>,
}

struct Fitted {
    start: NaiveDate,
    span_days: f64,
    y_scale: f64,
    changepoints: Vec<f64>,
    yearly_order: usize,
    weekly_order: usize,
    beta: Vec<f64>,
    /// Residual standard deviation, original units.
    sigma: f64,
    mean_abs_delta: f64,
    z: f64,
}

impl AdditiveModel {
    pub fn new(settings: ForecastConfig) -> Self {
        Self {
            settings,
            fitted: None,
        }
    }

    fn fitted(&self) -> Result<&Fitted, ForecastError> {
        self.fitted
            .as_ref()
            .ok_or_else(|| ForecastError::FitFailure("model has not been fitted".to_string()))
    }
}

impl Fitted {
    fn scaled_time(&self, date: NaiveDate) -> f64 {
        (date - self.start).num_days() as f64 / self.span_days
    }

    fn n_columns(&self) -> usize {
        2 + self.changepoints.len() + 2 * self.yearly_order + 2 * self.weekly_order
    }

    fn yearly_offset(&self) -> usize {
        2 + self.changepoints.len()
    }

    fn weekly_offset(&self) -> usize {
        self.yearly_offset() + 2 * self.yearly_order
    }

    fn trend(&self, t: f64) -> f64 {
        let mut value = self.beta[0] + self.beta[1] * t;
        for (j, c) in self.changepoints.iter().enumerate() {
            value += self.beta[2 + j] * (t - c).max(0.0);
        }
        value * self.y_scale
    }

    fn seasonal(&self, date: NaiveDate, offset: usize, order: usize, period: f64) -> f64 {
        let mut features = Vec::with_capacity(2 * order);
        fourier(date, period, order, &mut features);
        features
            .iter()
            .zip(&self.beta[offset..offset + 2 * order])
            .map(|(x, b)| x * b)
            .sum::<f64>()
            * self.y_scale
    }

    /// Trend spread at scaled time `t`: zero over history, then growing with
    /// the mean changepoint magnitude for every unit of time past the end.
    fn trend_sigma(&self, t: f64) -> f64 {
        self.mean_abs_delta * (t - 1.0).max(0.0) * self.y_scale
    }

    fn row(&self, ds: NaiveDate) -> ForecastRow {
        let t = self.scaled_time(ds);
        let trend = self.trend(t);
        let yearly = if self.yearly_order > 0 {
            self.seasonal(ds, self.yearly_offset(), self.yearly_order, YEARLY_PERIOD)
        } else {
            0.0
        };
        let weekly = if self.weekly_order > 0 {
            self.seasonal(ds, self.weekly_offset(), self.weekly_order, WEEKLY_PERIOD)
        } else {
            0.0
        };
        let additive_terms = weekly + yearly;
        let yhat = trend + additive_terms;

        let trend_sigma = self.trend_sigma(t);
        let total_sigma = (self.sigma.powi(2) + trend_sigma.powi(2)).sqrt();

        ForecastRow {
            ds,
            trend,
            trend_lower: trend - self.z * trend_sigma,
            trend_upper: trend + self.z * trend_sigma,
            weekly,
            yearly,
            additive_terms,
            yhat_lower: yhat - self.z * total_sigma,
            yhat_upper: yhat + self.z * total_sigma,
            yhat,
        }
    }

    fn design_row(&self, date: NaiveDate, out: &mut Vec<f64>) {
        out.clear();
        let t = self.scaled_time(date);
        out.push(1.0);
        out.push(t);
        for c in &self.changepoints {
            out.push((t - c).max(0.0));
        }
        fourier(date, YEARLY_PERIOD, self.yearly_order, out);
        fourier(date, WEEKLY_PERIOD, self.weekly_order, out);
    }
}

impl ForecastModel for AdditiveModel {
    fn fit(&mut self, series: &TrainingSeries) -> Result<(), ForecastError> {
        let (Some(start), Some(end)) = (series.first_date(), series.last_date()) else {
            return Err(ForecastError::EmptyInput("training series is empty".to_string()));
        };
        let span = (end - start).num_days();
        if series.len() < 2 || span == 0 {
            return Err(ForecastError::FitFailure(
                "need observations on at least two distinct dates".to_string(),
            ));
        }

        let y_scale = series
            .points
            .iter()
            .map(|p| p.y.abs())
            .fold(0.0_f64, f64::max);
        let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };

        let mut fitted = Fitted {
            start,
            span_days: span as f64,
            y_scale,
            changepoints: Vec::new(),
            yearly_order: if span >= YEARLY_MIN_SPAN_DAYS {
                self.settings.yearly_order
            } else {
                0
            },
            weekly_order: if span >= WEEKLY_MIN_SPAN_DAYS {
                self.settings.weekly_order
            } else {
                0
            },
            beta: Vec::new(),
            sigma: 0.0,
            mean_abs_delta: 0.0,
            z: normal_quantile(0.5 + self.settings.interval_width / 2.0),
        };
        let times: Vec<f64> = series
            .points
            .iter()
            .map(|p| fitted.scaled_time(p.ds))
            .collect();
        fitted.changepoints = changepoints(&times, &self.settings);

        let targets: Vec<f64> = series.points.iter().map(|p| p.y / y_scale).collect();
        let p = fitted.n_columns();

        // Accumulate the normal equations once; only the penalty changes between passes.
        let mut xtx = vec![vec![0.0; p]; p];
        let mut xty = vec![0.0; p];
        let mut row = Vec::with_capacity(p);
        for (point, y) in series.points.iter().zip(&targets) {
            fitted.design_row(point.ds, &mut row);
            for i in 0..p {
                xty[i] += row[i] * y;
                for j in i..p {
                    xtx[i][j] += row[i] * row[j];
                }
            }
        }
        for i in 0..p {
            for j in 0..i {
                xtx[i][j] = xtx[j][i];
            }
        }

        // First pass estimates the noise level, second pass applies the priors against it.
        let n_cp = fitted.changepoints.len();
        let beta = solve_penalized(&xtx, &xty, &penalties(p, n_cp, 1e-6, 1e-6))?;
        let noise = residual_variance(&fitted, &beta, series, &targets).max(MIN_NOISE);

        let cp_penalty = noise / self.settings.changepoint_prior_scale.powi(2);
        let season_penalty = noise / self.settings.seasonality_prior_scale.powi(2);
        fitted.beta = solve_penalized(&xtx, &xty, &penalties(p, n_cp, cp_penalty, season_penalty))?;

        fitted.sigma = residual_variance(&fitted, &fitted.beta, series, &targets).sqrt() * y_scale;
        fitted.mean_abs_delta = if n_cp > 0 {
            fitted.beta[2..2 + n_cp].iter().map(|d| d.abs()).sum::<f64>() / n_cp as f64
        } else {
            0.0
        };

        tracing::debug!(
            "Fitted additive model: {} points, {} changepoints, yearly order {}, weekly order {}, sigma {:.4}",
            series.len(),
            n_cp,
            fitted.yearly_order,
            fitted.weekly_order,
            fitted.sigma
        );

        self.fitted = Some(fitted);
        Ok(())
    }

    fn predict(&self, dates: &[NaiveDate]) -> Result<ForecastTable, ForecastError> {
        let fitted = self.fitted()?;
        let rows: Vec<ForecastRow> = dates.iter().map(|ds| fitted.row(*ds)).collect();

        if rows
            .iter()
            .any(|r| !(r.yhat.is_finite() && r.yhat_lower.is_finite() && r.yhat_upper.is_finite()))
        {
            return Err(ForecastError::FitFailure(
                "model produced non-finite predictions".to_string(),
            ));
        }

        Ok(ForecastTable {
            rows,
            weekly_enabled: fitted.weekly_order > 0,
            yearly_enabled: fitted.yearly_order > 0,
            interval_width: self.settings.interval_width,
        })
    }

    fn profiles(&self) -> Result<SeasonalProfiles, ForecastError> {
        let fitted = self.fitted()?;
        let mut profiles = SeasonalProfiles::default();

        if fitted.weekly_order > 0 {
            // 2017-01-01 was a Sunday, and 2017 is not a leap year.
            let sunday = NaiveDate::from_ymd_opt(2017, 1, 1)
                .ok_or_else(|| ForecastError::FitFailure("invalid reference date".to_string()))?;
            profiles.weekly = sunday
                .iter_days()
                .take(7)
                .map(|d| {
                    let value =
                        fitted.seasonal(d, fitted.weekly_offset(), fitted.weekly_order, WEEKLY_PERIOD);
                    (WEEKDAYS[d.weekday().num_days_from_sunday() as usize].to_string(), value)
                })
                .collect();
        }

        if fitted.yearly_order > 0 {
            let jan1 = NaiveDate::from_ymd_opt(2017, 1, 1)
                .ok_or_else(|| ForecastError::FitFailure("invalid reference date".to_string()))?;
            profiles.yearly = jan1
                .iter_days()
                .take_while(|d| d.year() == 2017)
                .map(|d| {
                    let value =
                        fitted.seasonal(d, fitted.yearly_offset(), fitted.yearly_order, YEARLY_PERIOD);
                    (d, value)
                })
                .collect();
        }

        Ok(profiles)
    }
}

/// Changepoints at evenly spaced rows of the first `changepoint_range` of history.
fn changepoints(times: &[f64], settings: &ForecastConfig) -> Vec<f64> {
    let hist_size = (times.len() as f64 * settings.changepoint_range).floor() as usize;
    let n = settings.n_changepoints.min(hist_size.saturating_sub(1));
    if n == 0 {
        return Vec::new();
    }

    let mut points: Vec<f64> = (1..=n)
        .map(|k| {
            let idx = (k as f64 * (hist_size - 1) as f64 / n as f64).round() as usize;
            times[idx]
        })
        .filter(|t| *t > 0.0)
        .collect();
    points.dedup();
    points
}

fn fourier(date: NaiveDate, period: f64, order: usize, out: &mut Vec<f64>) {
    let days = (date - NaiveDate::default()).num_days() as f64;
    for k in 1..=order {
        let x = 2.0 * PI * k as f64 * days / period;
        out.push(x.sin());
        out.push(x.cos());
    }
}

fn penalties(p: usize, n_changepoints: usize, changepoint: f64, seasonal: f64) -> Vec<f64> {
    (0..p)
        .map(|i| match i {
            0 | 1 => MIN_RIDGE,
            i if i < 2 + n_changepoints => changepoint.max(MIN_RIDGE),
            _ => seasonal.max(MIN_RIDGE),
        })
        .collect()
}

fn residual_variance(fitted: &Fitted, beta: &[f64], series: &TrainingSeries, targets: &[f64]) -> f64 {
    let mut row = Vec::with_capacity(beta.len());
    let sum: f64 = series
        .points
        .iter()
        .zip(targets)
        .map(|(point, y)| {
            fitted.design_row(point.ds, &mut row);
            let prediction: f64 = row.iter().zip(beta).map(|(x, b)| x * b).sum();
            (y - prediction).powi(2)
        })
        .sum();
    sum / series.len() as f64
}

/// Solve `(XᵀX + diag(penalty)) β = Xᵀy` by Gaussian elimination with partial pivoting.
fn solve_penalized(xtx: &[Vec<f64>], xty: &[f64], penalty: &[f64]) -> Result<Vec<f64>, ForecastError> {
    let p = xty.len();
    let mut a: Vec<Vec<f64>> = xtx
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut row = row.clone();
            row[i] += penalty[i];
            row.push(xty[i]);
            row
        })
        .collect();

    for col in 0..p {
        let pivot = (col..p)
            .max_by(|x, y| a[*x][col].abs().total_cmp(&a[*y][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            return Err(ForecastError::FitFailure("design matrix is singular".to_string()));
        }
        a.swap(col, pivot);

        for row in col + 1..p {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..=p {
                a[row][k] -= factor * a[col][k];
            }
        }
    }

    let mut beta = vec![0.0; p];
    for row in (0..p).rev() {
        let tail: f64 = (row + 1..p).map(|k| a[row][k] * beta[k]).sum();
        beta[row] = (a[row][p] - tail) / a[row][row];
    }

    if beta.iter().any(|b| !b.is_finite()) {
        return Err(ForecastError::FitFailure("coefficients are not finite".to_string()));
    }
    Ok(beta)
}

/// Inverse of the standard normal CDF (Acklam's rational approximation).
pub fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}
