use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

/// Serializes completed records to an append-only text stream.
///
/// One writer lock is shared by every branch, so lines are never interleaved
/// or partial; relative ordering of records from different branches is
/// unspecified.
pub struct RecordSink<W> {
    writer: Mutex<W>,
}

impl<W: Write> RecordSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Appends one record as tab-joined fields plus a newline.
    pub fn append(&self, fields: &[String]) -> io::Result<()> {
        let mut line = fields.join("\t");
        line.push('\n');
        let mut writer = self.writer.lock().unwrap();
        writer.write_all(line.as_bytes())
    }

    pub fn flush(&self) -> io::Result<()> {
        self.writer.lock().unwrap().flush()
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap()
    }
}

impl RecordSink<BufWriter<File>> {
    /// Opens (truncating) an output file behind a buffered writer.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}
