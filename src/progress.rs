//! Progress-reporting reader wrapper for objhash.
//!
//! A thin newtype around the object reader that advances a byte progress bar
//! as data is consumed, so the digest loop stays unaware of the display.

use std::io::{self, Read};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Reader that reports consumed bytes to a progress bar.
///
/// # Examples
///
/// ```no_run
/// use std::io::Read;
/// use objhash::progress::ProgressReader;
///
/// let mut reader = ProgressReader::new(&b"data"[..], 4, true);
/// let mut out = Vec::new();
/// reader.read_to_end(&mut out).unwrap();
/// reader.finish();
/// ```
pub struct ProgressReader<R> {
    inner: R,
    bar: ProgressBar,
}

impl<R: Read> ProgressReader<R> {
    /// Wraps `inner`, expecting `length` bytes in total.
    ///
    /// With `visible` false the bar is never drawn.
    pub fn new(inner: R, length: u64, visible: bool) -> Self {
        let bar = if visible {
            let bar = ProgressBar::new(length);
            bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(5));
            bar
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::with_template(concat!(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] ",
            "{bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
        )) {
            bar.set_style(style);
        }
        Self { inner, bar }
    }

    /// Clears the bar and hands back the wrapped reader.
    pub fn finish(self) -> R {
        self.bar.finish_and_clear();
        self.inner
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bar.inc(n as u64);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passes_bytes_through() {
        let data: Vec<u8> = (0..10_000u32).map(|i| i as u8).collect();
        let mut reader = ProgressReader::new(&data[..], data.len() as u64, false);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(reader.bar.position(), data.len() as u64);
        assert_eq!(out, data);
        reader.finish();
    }
}
