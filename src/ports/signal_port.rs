//! Output port for emitted signals.

use crate::domain::error::AlphaLabError;
use crate::domain::signal::Signal;

pub trait SignalSink {
    fn write(&mut self, engine: &str, signals: &[Signal]) -> Result<(), AlphaLabError>;

    fn finish(&mut self) -> Result<(), AlphaLabError> {
        Ok(())
    }
}
