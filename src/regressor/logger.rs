use crate::errors::Result;
use crate::regressor::Regressor;
use log::debug;
use serde::{Deserialize, Serialize};

/// Errors reported while training: on coefficients (MSE) and on reconstructed
/// fields (RE), for the fitting set and the validation set if any.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationErrors {
    /// mean squared error on the fitting coefficients
    pub mse: f64,
    /// mean squared error on the validation coefficients
    pub mse_v: Option<f64>,
    /// relative error on the fitting fields
    pub re: f64,
    /// relative error on the validation fields
    pub re_v: Option<f64>,
}

/// One training log entry
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// epoch counted from 1
    pub epoch: usize,
    /// training loss
    pub loss: f64,
    /// errors computed by the validation function if any
    pub errors: Option<ValidationErrors>,
}

/// Collected training logs
pub type TrainingLogs = Vec<LogEntry>;

type ValidationFn<'a> = Box<dyn Fn(&dyn Regressor) -> Result<ValidationErrors> + 'a>;

/// Training progress logger: an entry is recorded every `freq` epochs and at the last one.
pub struct Logger<'a> {
    epochs: usize,
    freq: usize,
    val_err_fn: Option<ValidationFn<'a>>,
    logs: TrainingLogs,
}

impl<'a> Logger<'a> {
    /// Constructor, `freq == 0` disables logging
    pub fn new(epochs: usize, freq: usize) -> Self {
        Logger {
            epochs,
            freq,
            val_err_fn: None,
            logs: Vec::new(),
        }
    }

    /// A logger recording nothing
    pub fn silent(epochs: usize) -> Self {
        Self::new(epochs, 0)
    }

    /// Sets the function computing errors of the regressor under training
    pub fn set_val_err_fn(&mut self, f: impl Fn(&dyn Regressor) -> Result<ValidationErrors> + 'a) {
        self.val_err_fn = Some(Box::new(f));
    }

    /// Epoch budget
    pub fn epochs(&self) -> usize {
        self.epochs
    }

    /// Whether the given epoch (counted from 1) is logged
    pub fn should_log(&self, epoch: usize) -> bool {
        self.freq > 0 && (epoch % self.freq == 0 || epoch >= self.epochs)
    }

    /// Records the epoch if it is a logged one
    pub fn log_epoch(&mut self, epoch: usize, loss: f64, regressor: &dyn Regressor) -> Result<()> {
        if !self.should_log(epoch) {
            return Ok(());
        }
        let errors = match &self.val_err_fn {
            Some(f) => Some(f(regressor)?),
            None => None,
        };
        match &errors {
            Some(err) => debug!(
                "Epoch {epoch}/{} - loss {loss:e} - MSE {:e} - MSE_V {:?} - RE {:e} - RE_V {:?}",
                self.epochs, err.mse, err.mse_v, err.re, err.re_v
            ),
            None => debug!("Epoch {epoch}/{} - loss {loss:e}", self.epochs),
        }
        self.logs.push(LogEntry { epoch, loss, errors });
        Ok(())
    }

    /// Records the last epoch, used by regressors without iterations
    pub fn log_final(&mut self, loss: f64, regressor: &dyn Regressor) -> Result<()> {
        self.log_epoch(self.epochs.max(1), loss, regressor)
    }

    /// Recorded entries
    pub fn logs(&self) -> &TrainingLogs {
        &self.logs
    }

    /// Consumes the logger and returns its entries
    pub fn into_logs(self) -> TrainingLogs {
        self.logs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regressor::LinearRegressor;

    #[test]
    fn test_logger_frequency() {
        let regressor = LinearRegressor::params().build().unwrap();
        let mut logger = Logger::new(10, 4);
        logger.set_val_err_fn(|_| {
            Ok(ValidationErrors {
                mse: 1.,
                mse_v: None,
                re: 0.5,
                re_v: Some(0.25),
            })
        });
        for epoch in 1..=10 {
            logger.log_epoch(epoch, 1. / epoch as f64, &regressor).unwrap();
        }
        let epochs: Vec<usize> = logger.logs().iter().map(|e| e.epoch).collect();
        assert_eq!(epochs, vec![4, 8, 10]);
        assert_eq!(logger.logs()[0].errors.unwrap().re_v, Some(0.25));

        let mut silent = Logger::silent(10);
        silent.log_final(0., &regressor).unwrap();
        assert!(silent.into_logs().is_empty());
    }
}
