use super::{ChannelView, RecordLayout, SignalSource};
use crate::diagnostics::Diagnostic;
use crate::error::{Error, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// An open BSR recording backed by a read-only memory map.
///
/// The file is never read into process memory as a whole; pages are faulted
/// in by the OS as channel views are scanned.
pub struct SignalFile {
    path: PathBuf,
    file: File,
    mmap: Mmap,
    layout: RecordLayout,
    samples: usize,
    truncation: Option<Diagnostic>,
}

impl SignalFile {
    /// Open with the default four-channel layout.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, RecordLayout::default())
    }

    pub fn open_with(path: impl AsRef<Path>, layout: RecordLayout) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        let record_bytes = layout.record_bytes();

        let samples = (size / record_bytes as u64) as usize;
        if samples == 0 {
            return Err(Error::Format {
                path: path.to_path_buf(),
                size,
                record_bytes,
            });
        }

        let remainder = size % record_bytes as u64;
        let truncation = (remainder != 0).then_some(Diagnostic::TruncationWarning {
            dropped_bytes: remainder,
            samples,
        });
        if let Some(diagnostic) = &truncation {
            diagnostic.log();
        }

        let mmap = unsafe { Mmap::map(&file) }?;

        // Mappings are page aligned, so this only fails on a broken platform.
        bytemuck::try_cast_slice::<u8, i32>(&mmap[..samples * record_bytes])
            .map_err(|e| io::Error::other(format!("unaligned mapping: {e}")))?;

        log::debug!(
            "Mapped {} ({} bytes, {} samples x {} channels)",
            path.display(),
            size,
            samples,
            layout.channels()
        );

        Ok(SignalFile {
            path: path.to_path_buf(),
            file,
            mmap,
            layout,
            samples,
            truncation,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layout(&self) -> RecordLayout {
        self.layout
    }

    /// Size of the complete records, excluding any dropped remainder.
    pub fn mapped_bytes(&self) -> usize {
        self.samples * self.layout.record_bytes()
    }

    /// The truncation warning raised at open time, if any.
    pub fn truncation(&self) -> Option<&Diagnostic> {
        self.truncation.as_ref()
    }

    /// Zero-copy view of `channel` over `[start, end)`; out-of-range indices are clamped.
    pub fn raw_slice(&self, channel: usize, start: usize, end: usize) -> Result<ChannelView<'_>> {
        self.channel(channel, start, end)
    }

    /// Fail with a retryable I/O error if the file shrank under the mapping.
    ///
    /// Touching a page past the new end of file would fault the process.
    pub fn check_backing(&self) -> Result<()> {
        let len = self.file.metadata()?.len();
        if len < self.mapped_bytes() as u64 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "{} shrank to {} bytes while mapped ({} expected)",
                    self.path.display(),
                    len,
                    self.mapped_bytes()
                ),
            )));
        }
        Ok(())
    }

    /// Release the mapping.
    pub fn close(self) {
        log::debug!("Unmapping {}", self.path.display());
    }

    fn records(&self) -> &[i32] {
        bytemuck::try_cast_slice(&self.mmap[..self.mapped_bytes()]).unwrap_or(&[])
    }
}

impl SignalSource for SignalFile {
    fn channel_count(&self) -> usize {
        self.layout.channels()
    }

    fn sample_count(&self) -> usize {
        self.samples
    }

    fn channel(&self, channel: usize, start: usize, end: usize) -> Result<ChannelView<'_>> {
        if channel >= self.layout.channels() {
            return Err(Error::ChannelUnavailable {
                channel,
                channels: self.layout.channels(),
            });
        }
        self.check_backing()?;

        let s = start.min(self.samples);
        let e = end.clamp(s, self.samples);
        let stride = self.layout.channels();
        Ok(ChannelView::interleaved(
            &self.records()[s * stride..e * stride],
            stride,
            channel,
            s,
        ))
    }
}

impl std::fmt::Debug for SignalFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalFile")
            .field("path", &self.path)
            .field("channels", &self.layout.channels())
            .field("samples", &self.samples)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_rows(rows: &[[i32; 4]], extra: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for row in rows {
            for v in row {
                file.write_all(&v.to_le_bytes()).unwrap();
            }
        }
        file.write_all(extra).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_open_exact_multiple() {
        let file = write_rows(&[[1, 2, 3, 4], [5, 6, 7, 8], [9, 10, 11, 12]], &[]);
        let signal = SignalFile::open(file.path()).unwrap();
        assert_eq!(signal.sample_count(), 3);
        assert_eq!(signal.channel_count(), 4);
        assert!(signal.truncation().is_none());
        assert_eq!(signal.raw_slice(2, 0, 3).unwrap().to_vec(), vec![3, 7, 11]);
        assert_eq!(signal.raw_slice(0, 1, 2).unwrap().to_vec(), vec![5]);
        signal.close();

        let reopened = SignalFile::open(file.path()).unwrap();
        assert_eq!(reopened.mapped_bytes(), 48);
    }

    #[test]
    fn test_partial_record_is_dropped_with_warning() {
        for r in 1..16 {
            let file = write_rows(&[[1, 2, 3, 4], [-5, -6, -7, -8]], &vec![0xAB; r]);
            let signal = SignalFile::open(file.path()).unwrap();
            assert_eq!(signal.sample_count(), 2);
            assert_eq!(
                signal.truncation(),
                Some(&Diagnostic::TruncationWarning {
                    dropped_bytes: r as u64,
                    samples: 2
                })
            );
            assert_eq!(signal.raw_slice(3, 0, 10).unwrap().to_vec(), vec![4, -8]);
        }
    }

    #[test]
    fn test_no_complete_record_fails() {
        for r in [0usize, 1, 15] {
            let file = write_rows(&[], &vec![0; r]);
            let err = SignalFile::open(file.path()).unwrap_err();
            assert!(matches!(err, Error::Format { size, record_bytes: 16, .. } if size == r as u64));
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = SignalFile::open("/nonexistent/recording.bsr").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_out_of_range_reads_are_clamped() {
        let file = write_rows(&[[1, 2, 3, 4], [5, 6, 7, 8]], &[]);
        let signal = SignalFile::open(file.path()).unwrap();
        assert!(signal.raw_slice(0, 5, 10).unwrap().is_empty());
        assert_eq!(signal.raw_slice(1, 1, usize::MAX).unwrap().to_vec(), vec![6]);
        assert!(signal.raw_slice(1, 2, 1).unwrap().is_empty());
        assert!(matches!(
            signal.raw_slice(4, 0, 1),
            Err(Error::ChannelUnavailable { .. })
        ));
    }

    #[test]
    fn test_custom_layout() {
        let file = write_rows(&[[1, 2, 3, 4], [5, 6, 7, 8]], &[]);
        let signal = SignalFile::open_with(file.path(), RecordLayout::new(2)).unwrap();
        assert_eq!(signal.sample_count(), 4);
        assert_eq!(signal.raw_slice(1, 0, 4).unwrap().to_vec(), vec![2, 4, 6, 8]);
    }

    #[test]
    fn test_shrunk_file_is_retryable_io() {
        let file = write_rows(&[[1, 2, 3, 4], [5, 6, 7, 8]], &[]);
        let signal = SignalFile::open(file.path()).unwrap();
        file.as_file().set_len(16).unwrap();
        let err = signal.raw_slice(0, 0, 2).unwrap_err();
        assert!(err.is_retryable());
    }
}
