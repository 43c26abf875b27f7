//! Writes signals as CSV rows to a file or stdout.

use crate::domain::error::AlphaLabError;
use crate::domain::signal::{Signal, SignalRecord};
use crate::ports::signal_port::SignalSink;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

pub struct CsvSignalWriter<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl CsvSignalWriter<File> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, AlphaLabError> {
        let path = path.as_ref();
        let writer = csv::Writer::from_path(path).map_err(|e| AlphaLabError::Output {
            reason: format!("failed to create {}: {}", path.display(), e),
        })?;
        Ok(Self { writer, rows: 0 })
    }
}

impl CsvSignalWriter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::from_writer(io::stdout())
    }
}

impl<W: Write> CsvSignalWriter<W> {
    pub fn from_writer(inner: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(inner),
            rows: 0,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> Result<W, AlphaLabError> {
        self.writer.into_inner().map_err(|e| AlphaLabError::Output {
            reason: e.to_string(),
        })
    }
}

impl<W: Write> SignalSink for CsvSignalWriter<W> {
    fn write(&mut self, engine: &str, signals: &[Signal]) -> Result<(), AlphaLabError> {
        for signal in signals {
            self.writer
                .serialize(SignalRecord::from_signal(engine, signal))
                .map_err(|e| AlphaLabError::Output {
                    reason: format!("failed to write signal: {}", e),
                })?;
            self.rows += 1;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), AlphaLabError> {
        self.writer.flush()?;
        Ok(())
    }
}
