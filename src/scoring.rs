//! Turns a pair of stereo recordings into a scalar similarity: mono
//! downmix, peak normalization, an MFCC front end, and DTW alignment over
//! the resulting coefficient sequences.

const MEL_COUNT: usize = 13;
const LOW_FREQ: f64 = 133.33;
const FRAME_SIZE: usize = 1024;
const HOP_SIZE: usize = 512;

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Sums left and right channels (not an average). `stereo` is interleaved
/// L,R.
pub fn downmix_mono(stereo: &[f32]) -> Vec<f64> {
    stereo
        .chunks_exact(2)
        .map(|pair| pair[0] as f64 + pair[1] as f64)
        .collect()
}

/// Divides by the signal's peak absolute value. A silent (all-zero) input
/// normalizes to all zeros and is flagged for the caller to filter out.
pub fn peak_normalize(mono: &[f64]) -> (Vec<f64>, bool) {
    let peak = mono.iter().fold(0.0f64, |m, &v| m.max(v.abs()));
    if peak == 0.0 {
        return (vec![0.0; mono.len()], true);
    }
    (mono.iter().map(|&v| v / peak).collect(), false)
}

/// Hz to mel and back, using the standard O'Shaughnessy formula.
fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// A triangular mel filterbank spanning `[low_freq, sample_rate/2]`.
fn mel_filterbank(num_filters: usize, fft_size: usize, sample_rate: u32, low_freq: f64) -> Vec<Vec<f64>> {
    let nyquist = sample_rate as f64 / 2.0;
    let mel_low = hz_to_mel(low_freq);
    let mel_high = hz_to_mel(nyquist);
    let mel_points: Vec<f64> = (0..num_filters + 2)
        .map(|i| mel_low + (mel_high - mel_low) * i as f64 / (num_filters + 1) as f64)
        .collect();
    let bin_freqs: Vec<usize> = mel_points
        .iter()
        .map(|&m| ((fft_size as f64 + 1.0) * mel_to_hz(m) / sample_rate as f64).floor() as usize)
        .collect();

    let bins = fft_size / 2 + 1;
    let mut filters = vec![vec![0.0; bins]; num_filters];
    for f in 0..num_filters {
        let (left, center, right) = (bin_freqs[f], bin_freqs[f + 1], bin_freqs[f + 2]);
        for bin in left..center.min(bins) {
            if center > left {
                filters[f][bin] = (bin - left) as f64 / (center - left) as f64;
            }
        }
        for bin in center..right.min(bins) {
            if right > center {
                filters[f][bin] = (right - bin) as f64 / (right - center) as f64;
            }
        }
    }
    filters
}

/// Type-II DCT over `input`, keeping all `MEL_COUNT` coefficients.
fn dct(input: &[f64]) -> Vec<f64> {
    let n = input.len();
    (0..n)
        .map(|k| {
            let sum: f64 = input
                .iter()
                .enumerate()
                .map(|(i, &x)| x * (std::f64::consts::PI / n as f64 * (i as f64 + 0.5) * k as f64).cos())
                .sum();
            sum * 2.0
        })
        .collect()
}

fn hamming_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.54 - 0.46 * (2.0 * std::f64::consts::PI * i as f64 / (size - 1) as f64).cos())
        .collect()
}

/// Computes one `MEL_COUNT`-dimensional MFCC vector per analysis frame,
/// hopping every [`HOP_SIZE`] samples over [`FRAME_SIZE`]-sample windows.
pub fn mfcc(signal: &[f64], sample_rate: u32) -> Vec<Vec<f64>> {
    if signal.len() < FRAME_SIZE {
        return Vec::new();
    }
    let window = hamming_window(FRAME_SIZE);
    let filters = mel_filterbank(MEL_COUNT, FRAME_SIZE, sample_rate, LOW_FREQ);

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(FRAME_SIZE);

    let mut out = Vec::new();
    let mut start = 0;
    while start + FRAME_SIZE <= signal.len() {
        let mut buf: Vec<Complex<f64>> = signal[start..start + FRAME_SIZE]
            .iter()
            .zip(&window)
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();
        fft.process(&mut buf);

        let bins = FRAME_SIZE / 2 + 1;
        let power: Vec<f64> = buf[..bins].iter().map(|c| c.norm_sqr()).collect();

        let energies: Vec<f64> = filters
            .iter()
            .map(|filter| {
                let e: f64 = filter.iter().zip(&power).map(|(&w, &p)| w * p).sum();
                (e.max(1e-10)).ln()
            })
            .collect();

        out.push(dct(&energies));
        start += HOP_SIZE;
    }
    out
}

/// Euclidean distance between two equal-length coefficient vectors.
fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(&x, &y)| (x - y) * (x - y)).sum::<f64>().sqrt()
}

/// Dynamic time warping over two coefficient sequences, returning the
/// total accumulated path cost normalized by the path's length so that
/// identical sequences score a cost of exactly `0.0`.
pub fn dtw_distance(a: &[Vec<f64>], b: &[Vec<f64>]) -> f64 {
    let (n, m) = (a.len(), b.len());
    if n == 0 || m == 0 {
        return 0.0;
    }
    let mut cost = vec![vec![f64::INFINITY; m + 1]; n + 1];
    let mut steps = vec![vec![0u32; m + 1]; n + 1];
    cost[0][0] = 0.0;
    for i in 1..=n {
        for j in 1..=m {
            let d = euclidean(&a[i - 1], &b[j - 1]);
            let (best, best_steps) = [
                (cost[i - 1][j], steps[i - 1][j]),
                (cost[i][j - 1], steps[i][j - 1]),
                (cost[i - 1][j - 1], steps[i - 1][j - 1]),
            ]
            .into_iter()
            .min_by(|x, y| x.0.partial_cmp(&y.0).unwrap())
            .unwrap();
            cost[i][j] = d + best;
            steps[i][j] = best_steps + 1;
        }
    }
    let total_steps = steps[n][m].max(1) as f64;
    cost[n][m] / total_steps
}

/// Scores how closely `captured` resembles `reference`: `1 - avg DTW cost`
/// over mono-downmixed, peak-normalized MFCC sequences. Either input being
/// silent short-circuits to `(0.0, true)` — comparing against silence is
/// meaningless.
pub fn score_recording(reference: &[f32], captured: &[f32], sample_rate: u32) -> (f64, bool) {
    let (ref_mono, ref_silent) = peak_normalize(&downmix_mono(reference));
    let (cap_mono, cap_silent) = peak_normalize(&downmix_mono(captured));
    if ref_silent || cap_silent {
        return (0.0, true);
    }
    let ref_mfcc = mfcc(&ref_mono, sample_rate);
    let cap_mfcc = mfcc(&cap_mono, sample_rate);
    let distance = dtw_distance(&ref_mfcc, &cap_mfcc);
    (1.0 - distance, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_sums_not_averages() {
        let stereo = vec![1.0f32, 1.0, -0.5, 0.5];
        let mono = downmix_mono(&stereo);
        assert_eq!(mono, vec![2.0, 0.0]);
    }

    #[test]
    fn normalize_peak_is_one_unless_silent() {
        let (out, silent) = peak_normalize(&[0.5, -2.0, 1.0]);
        assert!(!silent);
        assert!((out.iter().cloned().fold(0.0f64, |m, v| m.max(v.abs())) - 1.0).abs() < 1e-12);

        let (out, silent) = peak_normalize(&[0.0, 0.0, 0.0]);
        assert!(silent);
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn identical_recordings_score_one() {
        let sample_rate = 8000;
        let n = sample_rate as usize * 2;
        let mut stereo = Vec::with_capacity(n * 2);
        for i in 0..n {
            let s = (i as f32 * 0.05).sin() * 0.8;
            stereo.push(s);
            stereo.push(s);
        }
        let (score, filtered) = score_recording(&stereo, &stereo, sample_rate);
        assert!(!filtered);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn silent_recording_is_filtered() {
        let silence = vec![0.0f32; 4096];
        let (score, filtered) = score_recording(&silence, &silence, 8000);
        assert!(filtered);
        assert_eq!(score, 0.0);
    }
}
