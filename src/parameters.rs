use crate::errors::{PodromError, Result};
use linfa::ParamGuard;
use ndarray::{Array1, ArrayBase, Data, Ix1};
use podrom_doe::LhsKind;
use podrom_pod::PodParams;
use serde::{Deserialize, Serialize};

/// An enumeration of the training data checkpoint file formats
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileFormat {
    /// Human readable format
    Json,
    /// Binary format
    #[default]
    Binary,
}

impl FileFormat {
    /// File extension of the format
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Json => "json",
            FileFormat::Binary => "bin",
        }
    }
}

/// Train/validation/test ratios of a dataset
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SplitRatios {
    /// fraction used to fit the regressor
    pub train: f64,
    /// fraction used to validate the regressor during training
    pub val: f64,
    /// fraction held out for testing
    pub test: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        SplitRatios {
            train: 0.8,
            val: 0.1,
            test: 0.1,
        }
    }
}

impl SplitRatios {
    /// Constructor
    pub fn new(train: f64, val: f64, test: f64) -> Self {
        SplitRatios { train, val, test }
    }

    /// Validation fraction of the train+validation part: `val / (train + val)`
    pub fn val_fraction(&self) -> f64 {
        self.val / (self.train + self.val)
    }

    /// Checks ratios are non negative, train is positive and the sum is one.
    pub fn check(&self) -> Result<()> {
        let SplitRatios { train, val, test } = *self;
        if !(train > 0. && val >= 0. && test >= 0.) {
            return Err(PodromError::InvalidValueError(format!(
                "split ratios should be non negative with a positive train ratio, got {self:?}"
            )));
        }
        if ((train + val + test) - 1.).abs() > 1e-6 {
            return Err(PodromError::InvalidValueError(format!(
                "split ratios should sum to 1, got {}",
                train + val + test
            )));
        }
        Ok(())
    }
}

/// A set of validated dataset generation parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetValidParams {
    /// Lower bounds of the parameters
    pub(crate) mu_min: Array1<f64>,
    /// Upper bounds of the parameters
    pub(crate) mu_max: Array1<f64>,
    /// Number of parameter samples
    pub(crate) n_s: usize,
    /// Split ratios, only the test ratio is used at generation
    pub(crate) split: SplitRatios,
    /// Basis extraction parameters
    pub(crate) pod: PodParams<f64>,
    /// Time range of time-dependent fields
    pub(crate) t_min: f64,
    pub(crate) t_max: f64,
    /// Relative noise level on the snapshots
    pub(crate) u_noise: f64,
    /// Relative noise level on the parameters
    pub(crate) x_noise: f64,
    /// Kind of latin hypercube
    pub(crate) lhs_kind: LhsKind,
    /// Reuse the training checkpoint when it exists
    pub(crate) use_cache: bool,
    /// Training checkpoint file format
    pub(crate) format: FileFormat,
}

impl DatasetValidParams {
    /// Get parameters lower bounds
    pub fn mu_min(&self) -> &Array1<f64> {
        &self.mu_min
    }

    /// Get parameters upper bounds
    pub fn mu_max(&self) -> &Array1<f64> {
        &self.mu_max
    }

    /// Get number of samples
    pub fn n_s(&self) -> usize {
        self.n_s
    }

    /// Get split ratios
    pub fn split(&self) -> &SplitRatios {
        &self.split
    }

    /// Get basis extraction parameters
    pub fn pod(&self) -> &PodParams<f64> {
        &self.pod
    }

    /// Get time range
    pub fn time_range(&self) -> (f64, f64) {
        (self.t_min, self.t_max)
    }

    /// Get (u_noise, x_noise) noise levels
    pub fn noise(&self) -> (f64, f64) {
        (self.u_noise, self.x_noise)
    }

    /// Get kind of latin hypercube
    pub fn lhs_kind(&self) -> LhsKind {
        self.lhs_kind
    }

    /// Whether the training checkpoint is reused
    pub fn use_cache(&self) -> bool {
        self.use_cache
    }

    /// Get checkpoint file format
    pub fn format(&self) -> FileFormat {
        self.format
    }
}

/// The set of parameters of [dataset generation](crate::PodModel::generate_dataset).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetParams(pub(crate) DatasetValidParams);

impl DatasetParams {
    /// Constructor given parameters bounds and number of samples
    pub fn new(
        mu_min: &ArrayBase<impl Data<Elem = f64>, Ix1>,
        mu_max: &ArrayBase<impl Data<Elem = f64>, Ix1>,
        n_s: usize,
    ) -> DatasetParams {
        DatasetParams(DatasetValidParams {
            mu_min: mu_min.to_owned(),
            mu_max: mu_max.to_owned(),
            n_s,
            split: SplitRatios::default(),
            pod: PodParams::default(),
            t_min: 0.,
            t_max: 0.,
            u_noise: 0.,
            x_noise: 0.,
            lhs_kind: LhsKind::default(),
            use_cache: false,
            format: FileFormat::default(),
        })
    }

    /// Set split ratios
    pub fn split(mut self, split: SplitRatios) -> Self {
        self.0.split = split;
        self
    }

    /// Set basis extraction parameters
    pub fn pod(mut self, pod: PodParams<f64>) -> Self {
        self.0.pod = pod;
        self
    }

    /// Set time range, ignored for steady fields
    pub fn time_range(mut self, t_min: f64, t_max: f64) -> Self {
        self.0.t_min = t_min;
        self.0.t_max = t_max;
        self
    }

    /// Set relative noise levels of snapshots and parameters of the training samples
    pub fn noise(mut self, u_noise: f64, x_noise: f64) -> Self {
        self.0.u_noise = u_noise;
        self.0.x_noise = x_noise;
        self
    }

    /// Set kind of latin hypercube, [LhsKind::Centered] by default.
    ///
    /// Use [LhsKind::Classic] to draw parameters uniformly inside their strata.
    pub fn lhs_kind(mut self, lhs_kind: LhsKind) -> Self {
        self.0.lhs_kind = lhs_kind;
        self
    }

    /// Reuse the training checkpoint when it exists
    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.0.use_cache = use_cache;
        self
    }

    /// Set checkpoint file format
    pub fn format(mut self, format: FileFormat) -> Self {
        self.0.format = format;
        self
    }
}

impl ParamGuard for DatasetParams {
    type Checked = DatasetValidParams;
    type Error = PodromError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        let p = &self.0;
        if p.mu_min.is_empty() || p.mu_min.len() != p.mu_max.len() {
            return Err(PodromError::ShapeError(format!(
                "parameters bounds should be non empty with the same length, got {} and {}",
                p.mu_min.len(),
                p.mu_max.len()
            )));
        }
        if p.mu_min.iter().zip(p.mu_max.iter()).any(|(lo, up)| !(lo <= up)) {
            return Err(PodromError::InvalidValueError(format!(
                "parameters bounds should satisfy mu_min <= mu_max, got {} and {}",
                p.mu_min, p.mu_max
            )));
        }
        if p.n_s == 0 {
            return Err(PodromError::InvalidValueError(
                "number of samples should be positive".to_string(),
            ));
        }
        if !(p.t_min <= p.t_max) {
            return Err(PodromError::InvalidValueError(format!(
                "time range should satisfy t_min <= t_max, got [{}, {}]",
                p.t_min, p.t_max
            )));
        }
        if !(p.u_noise >= 0. && p.x_noise >= 0.) {
            return Err(PodromError::InvalidValueError(format!(
                "noise levels should be non negative, got u_noise={}, x_noise={}",
                p.u_noise, p.x_noise
            )));
        }
        p.split.check()?;
        p.pod.check_ref()?;
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

/// A set of validated dataset conversion parameters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvertValidParams {
    pub(crate) split: SplitRatios,
    pub(crate) pod: PodParams<f64>,
    pub(crate) use_cache: bool,
    pub(crate) save_cache: bool,
    pub(crate) format: FileFormat,
}

impl ConvertValidParams {
    /// Get split ratios
    pub fn split(&self) -> &SplitRatios {
        &self.split
    }

    /// Get basis extraction parameters
    pub fn pod(&self) -> &PodParams<f64> {
        &self.pod
    }

    /// Whether the training checkpoint is reused
    pub fn use_cache(&self) -> bool {
        self.use_cache
    }

    /// Whether the converted dataset is saved
    pub fn save_cache(&self) -> bool {
        self.save_cache
    }

    /// Get checkpoint file format
    pub fn format(&self) -> FileFormat {
        self.format
    }
}

/// The set of parameters of [dataset conversion](crate::PodModel::convert_dataset).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvertParams(pub(crate) ConvertValidParams);

impl ConvertParams {
    /// Constructor with default split ratios and basis extraction parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Set split ratios
    pub fn split(mut self, split: SplitRatios) -> Self {
        self.0.split = split;
        self
    }

    /// Set basis extraction parameters
    pub fn pod(mut self, pod: PodParams<f64>) -> Self {
        self.0.pod = pod;
        self
    }

    /// Reuse the training checkpoint when it exists
    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.0.use_cache = use_cache;
        self
    }

    /// Save the converted dataset as training checkpoint
    pub fn save_cache(mut self, save_cache: bool) -> Self {
        self.0.save_cache = save_cache;
        self
    }

    /// Set checkpoint file format
    pub fn format(mut self, format: FileFormat) -> Self {
        self.0.format = format;
        self
    }
}

impl ParamGuard for ConvertParams {
    type Checked = ConvertValidParams;
    type Error = PodromError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        self.0.split.check()?;
        self.0.pod.check_ref()?;
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_split_ratios() {
        assert!(SplitRatios::default().check().is_ok());
        assert!(SplitRatios::new(0.5, 0.5, 0.).check().is_ok());
        assert!(SplitRatios::new(0.5, 0.2, 0.).check().is_err());
        assert!(SplitRatios::new(0., 0.5, 0.5).check().is_err());
        assert!(SplitRatios::new(1.2, -0.2, 0.).check().is_err());
        assert!((SplitRatios::new(0.6, 0.2, 0.2).val_fraction() - 0.25).abs() < 1e-15);
    }

    #[test]
    fn test_dataset_params_check() {
        let params = DatasetParams::new(&array![0., 1.], &array![1., 2.], 10);
        assert!(params.clone().check().is_ok());
        assert!(params.clone().noise(-0.1, 0.).check().is_err());
        assert!(params.clone().time_range(1., 0.).check().is_err());
        assert!(params.clone().pod(PodParams::new(2.)).check().is_err());
        assert!(matches!(
            DatasetParams::new(&array![0., 1.], &array![1.], 10).check(),
            Err(PodromError::ShapeError(_))
        ));
        assert!(DatasetParams::new(&array![2.], &array![1.], 10).check().is_err());
        assert!(DatasetParams::new(&array![0.], &array![1.], 0).check().is_err());
    }

    #[test]
    fn test_lhs_kind() {
        let params = DatasetParams::new(&array![0.], &array![1.], 5);
        assert_eq!(params.clone().check().unwrap().lhs_kind(), LhsKind::Centered);
        let params = params.lhs_kind(LhsKind::Classic).check().unwrap();
        assert_eq!(params.lhs_kind(), LhsKind::Classic);
    }

    #[test]
    fn test_params_serialization() {
        let params = DatasetParams::new(&array![0.], &array![1.], 5)
            .noise(0.1, 0.)
            .format(FileFormat::Json)
            .check()
            .unwrap();
        let json = serde_json::to_string(&params).unwrap();
        let loaded: DatasetValidParams = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, params);
        assert!(ConvertParams::new().split(SplitRatios::new(0.7, 0.2, 0.2)).check().is_err());
    }
}
