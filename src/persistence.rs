//! Checkpoints of a reduced-order model stored in its results directory:
//! * `setup_data.json`: mesh and field description,
//! * `train_data.bin` or `train_data.json`: basis, residual signature, inputs bounds and dataset,
//! * `model.json`: trained regressor tagged with the basis it was trained against.
use crate::dataset::PodDataset;
use crate::errors::{PodromError, Result};
use crate::mesh::Mesh;
use crate::parameters::FileFormat;
use crate::regressor::Regressor;
use log::info;
use ndarray::{Array1, Array2};
use podrom_pod::PodBasis;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) const SETUP_DATA_NAME: &str = "setup_data.json";
pub(crate) const TRAIN_DATA_STEM: &str = "train_data";
pub(crate) const MODEL_NAME: &str = "model.json";

/// Identification of a basis: dimensions and FNV-1a hash of its values
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasisTag {
    /// number of degrees of freedom
    pub n_h: usize,
    /// number of modes
    pub n_l: usize,
    /// hash of the basis values
    pub checksum: u64,
}

impl BasisTag {
    /// Tag of the given (n_h, n_L) basis
    pub fn new(basis: &Array2<f64>) -> Self {
        const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
        let checksum = basis.iter().fold(FNV_OFFSET, |hash, v| {
            v.to_bits()
                .to_le_bytes()
                .iter()
                .fold(hash, |h, &b| (h ^ b as u64).wrapping_mul(FNV_PRIME))
        });
        BasisTag {
            n_h: basis.nrows(),
            n_l: basis.ncols(),
            checksum,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct SetupData {
    pub n_v: usize,
    pub mesh: Mesh,
    pub n_t: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct TrainData {
    pub n_l: usize,
    pub n_d: usize,
    pub pod: PodBasis<f64>,
    pub pod_sig: Array1<f64>,
    pub input_bounds: Array2<f64>,
    pub dataset: PodDataset,
}

#[derive(Serialize)]
pub(crate) struct ModelCheckpoint<'a> {
    pub basis_tag: BasisTag,
    pub regressor: &'a dyn Regressor,
}

#[derive(Deserialize)]
pub(crate) struct LoadedModel {
    pub basis_tag: BasisTag,
    pub regressor: Box<dyn Regressor>,
}

pub(crate) fn train_data_path(resdir: &Path, format: FileFormat) -> PathBuf {
    resdir.join(format!("{TRAIN_DATA_STEM}.{}", format.extension()))
}

/// Existing training checkpoint, the preferred format being looked up first
pub(crate) fn find_train_data(resdir: &Path, preferred: FileFormat) -> Option<(PathBuf, FileFormat)> {
    let other = match preferred {
        FileFormat::Json => FileFormat::Binary,
        FileFormat::Binary => FileFormat::Json,
    };
    [preferred, other]
        .into_iter()
        .map(|format| (train_data_path(resdir, format), format))
        .find(|(path, _)| path.exists())
}

pub(crate) fn save<T: Serialize + ?Sized>(value: &T, path: &Path, format: FileFormat) -> Result<()> {
    let bytes = match format {
        FileFormat::Json => serde_json::to_vec(value)?,
        FileFormat::Binary => bincode::serialize(value)?,
    };
    fs::write(path, bytes)?;
    info!("Checkpoint written in {}", path.display());
    Ok(())
}

pub(crate) fn load<T: DeserializeOwned>(path: &Path, format: FileFormat) -> Result<T> {
    if !path.exists() {
        return Err(PodromError::MissingArtifactError(format!(
            "can't find {}",
            path.display()
        )));
    }
    let data = fs::read(path)?;
    let value = match format {
        FileFormat::Json => serde_json::from_slice(&data)?,
        FileFormat::Binary => bincode::deserialize(&data)?,
    };
    info!("Checkpoint loaded from {}", path.display());
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_basis_tag() {
        let basis = array![[1., 0.], [0., 1.], [0., 0.]];
        let tag = BasisTag::new(&basis);
        assert_eq!((tag.n_h, tag.n_l), (3, 2));
        assert_eq!(tag, BasisTag::new(&basis.clone()));
        let mut other = basis.clone();
        other[[2, 1]] = 1e-300;
        assert_ne!(tag.checksum, BasisTag::new(&other).checksum);
    }

    #[test]
    fn test_missing_checkpoint() {
        let res: Result<SetupData> = load(Path::new("target/tests/nowhere/setup.json"), FileFormat::Json);
        assert!(matches!(res, Err(PodromError::MissingArtifactError(_))));
    }

    #[test]
    fn test_setup_data_round_trip() {
        let test_dir = Path::new("target/tests/persistence");
        fs::create_dir_all(test_dir).unwrap();
        let setup = SetupData {
            n_v: 2,
            mesh: Mesh::linear((0., 1., 4), None, None).unwrap(),
            n_t: 0,
        };
        for format in [FileFormat::Json, FileFormat::Binary] {
            let path = test_dir.join(format!("setup.{}", format.extension()));
            save(&setup, &path, format).unwrap();
            let loaded: SetupData = load(&path, format).unwrap();
            assert_eq!(loaded, setup);
        }
    }
}
