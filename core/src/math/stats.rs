use ndarray::Array2;

/// Summary of the finite gates of a field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSummary {
    pub count: usize,
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    pub rms: f32,
}

pub struct StatsHelper;

impl StatsHelper {
    pub fn rms(samples: &[f32]) -> f32 {
        Self::finite_rms(samples.iter())
    }

    /// RMS over finite values only; NaN gates are treated as missing.
    pub fn finite_rms<'a>(values: impl IntoIterator<Item = &'a f32>) -> f32 {
        let (count, sum_sq) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold((0usize, 0.0f64), |(n, acc), &v| (n + 1, acc + f64::from(v * v)));
        if count == 0 {
            return 0.0;
        }
        (sum_sq / count as f64).sqrt() as f32
    }

    /// `None` when the field has no finite gate.
    pub fn summarize(data: &Array2<f32>) -> Option<FieldSummary> {
        let mut count = 0usize;
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        for &v in data.iter().filter(|v| v.is_finite()) {
            count += 1;
            min = min.min(v);
            max = max.max(v);
            sum += f64::from(v);
            sum_sq += f64::from(v) * f64::from(v);
        }
        if count == 0 {
            return None;
        }
        Some(FieldSummary {
            count,
            min,
            max,
            mean: (sum / count as f64) as f32,
            rms: (sum_sq / count as f64).sqrt() as f32,
        })
    }
}
