//! Per-individual WAV recording: 32-bit float PCM at the reference
//! sample rate, one file per evaluated patch under
//! `<tmpdir>/<gen>/<idx>.wav`.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};

/// An open 32-bit float WAV file being written.
pub struct WavOutput {
    writer: Option<WavWriter<BufWriter<File>>>,
}

impl WavOutput {
    /// Creates `path`, truncating any existing file, with `channels`
    /// interleaved 32-bit float channels at `sample_rate`.
    pub fn create(path: &Path, sample_rate: u32, channels: u16) -> Result<Self> {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let writer = WavWriter::create(path, spec)
            .with_context(|| format!("creating WAV file {}", path.display()))?;
        Ok(Self { writer: Some(writer) })
    }

    /// Appends interleaved float samples.
    pub fn write_samples(&mut self, samples: &[f32]) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| anyhow!("WAV writer is closed"))?;
        for &sample in samples {
            writer.write_sample(sample).context("writing WAV sample")?;
        }
        Ok(())
    }

    /// Flushes and closes the file.
    pub fn finalize(mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().context("finalizing WAV file")?;
        }
        Ok(())
    }
}

impl Drop for WavOutput {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            let _ = writer.finalize();
        }
    }
}

/// Writes one individual's captured recording to
/// `<tmpdir>/<generation>/<index>.wav`, creating the generation
/// subdirectory if needed.
pub fn write_individual(
    tmpdir: &Path,
    generation: i64,
    index: usize,
    samples: &[f32],
    sample_rate: u32,
    channels: u16,
) -> Result<()> {
    let gen_dir = tmpdir.join(generation.to_string());
    std::fs::create_dir_all(&gen_dir).with_context(|| format!("creating {}", gen_dir.display()))?;
    let path = gen_dir.join(format!("{}.wav", index));
    let mut out = WavOutput::create(&path, sample_rate, channels)?;
    out.write_samples(samples)?;
    out.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_and_reads_back_samples() {
        let dir = std::env::temp_dir().join(format!("fevolver-wav-test-{}", std::process::id()));
        let path = dir.join("0").join("0.wav");
        write_individual(&dir, 0, 0, &[0.1, -0.2, 0.3, -0.4], 44100, 2).unwrap();
        assert!(path.exists());

        let mut reader = hound::WavReader::open(&path).unwrap();
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 4);
        assert!((samples[0] - 0.1).abs() < 1e-6);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
