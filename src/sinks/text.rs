use super::{NodeRow, RowSink};
use anyhow::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes one line per node: `lat, lon, <tags>[ #,<distance>]`.
///
/// Tags are written as ` key:value` in table order, so a tagged row has two
/// spaces after the second comma. Values are not escaped.
pub struct TextRowSink {
    writer: BufWriter<Box<dyn Write + Send>>,
}

impl TextRowSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::from_writer(Box::new(file)))
    }

    pub fn stdout() -> Self {
        Self::from_writer(Box::new(std::io::stdout()))
    }

    pub fn from_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }
}

impl RowSink for TextRowSink {
    fn add_row(&mut self, row: NodeRow) -> Result<()> {
        write!(self.writer, "{:.6}, {:.6}, ", row.lat, row.lon)?;
        for (key, value) in &row.tags {
            write!(self.writer, " {key}:{value}")?;
        }
        match row.distance_km {
            Some(distance) => writeln!(self.writer, " #,{distance:.2}")?,
            None => writeln!(self.writer)?,
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
