//! Test data builders for creating test objects

use cmeasure_rs::backend::MockInstrument;
use cmeasure_rs::config::ClientConfig;
use cmeasure_rs::types::CalibrationRow;

/// Builder for scripted instruments
pub struct InstrumentBuilder {
    cells: usize,
    connected: bool,
    values: Option<Vec<f64>>,
    connect_delay: Option<usize>,
    tests: Vec<(String, Vec<f64>)>,
}

impl InstrumentBuilder {
    pub fn new(cells: usize) -> Self {
        Self {
            cells,
            connected: false,
            values: None,
            connect_delay: None,
            tests: Vec::new(),
        }
    }

    pub fn connected(mut self) -> Self {
        self.connected = true;
        self
    }

    pub fn values(mut self, values: &[f64]) -> Self {
        self.values = Some(values.to_vec());
        self
    }

    /// Status polls a connect takes to settle
    pub fn connect_delay(mut self, polls: usize) -> Self {
        self.connect_delay = Some(polls);
        self
    }

    /// Cells never finish connecting
    pub fn stuck_connecting(self) -> Self {
        self.connect_delay(usize::MAX)
    }

    pub fn saved_test(mut self, file: &str, values: &[f64]) -> Self {
        self.tests.push((file.to_string(), values.to_vec()));
        self
    }

    pub fn build(self) -> MockInstrument {
        let mut instrument = if self.connected {
            MockInstrument::connected(self.cells)
        } else {
            MockInstrument::new(self.cells)
        };
        if let Some(values) = self.values {
            instrument = instrument.with_values(&values);
        }
        if let Some(polls) = self.connect_delay {
            instrument = instrument.with_connect_delay(polls);
        }
        for (file, values) in &self.tests {
            instrument.add_test(file, values);
        }
        instrument
    }
}

/// Builder for client configs
pub struct ConfigBuilder {
    config: ClientConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn connect_retry_attempts(mut self, attempts: u32) -> Self {
        self.config.polling.connect_retry_attempts = attempts;
        self
    }

    pub fn status_ms(mut self, ms: u64) -> Self {
        self.config.polling.status_ms = ms;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Calibration rows with zero offset and unit gain
pub fn unit_calibration(cells: usize) -> Vec<CalibrationRow> {
    (0..cells).map(|i| CalibrationRow::new(i, 0.0, 1.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .connect_retry_attempts(5)
            .status_ms(250)
            .build();

        assert_eq!(config.polling.connect_retry_attempts, 5);
        assert_eq!(config.polling.status_ms, 250);
    }
}
