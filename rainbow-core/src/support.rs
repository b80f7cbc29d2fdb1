//! Fixed support of categorical value distributions.
use crate::error::RainbowError;
use anyhow::Result;
use ndarray::{Array1, Array2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};

/// Configuration of a [`CategoricalSupport`].
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct CategoricalConfig {
    /// The number of atoms.
    pub n_atoms: usize,

    /// The smallest atom.
    pub v_min: f32,

    /// The largest atom.
    pub v_max: f32,
}

impl Default for CategoricalConfig {
    fn default() -> Self {
        Self {
            n_atoms: 51,
            v_min: 0.0,
            v_max: 20.0,
        }
    }
}

impl CategoricalConfig {
    /// Sets the number of atoms.
    pub fn n_atoms(mut self, v: usize) -> Self {
        self.n_atoms = v;
        self
    }

    /// Sets the range of the support.
    pub fn range(mut self, v_min: f32, v_max: f32) -> Self {
        self.v_min = v_min;
        self.v_max = v_max;
        self
    }
}

/// Atoms `z_i = v_min + i * delta_z`, `delta_z = (v_max - v_min) / (n_atoms - 1)`.
#[derive(Clone, Debug, PartialEq)]
pub struct CategoricalSupport {
    v_min: f32,
    v_max: f32,
    delta_z: f32,
    atoms: Array1<f32>,
}

impl CategoricalSupport {
    /// Builds the support.
    pub fn build(config: &CategoricalConfig) -> Result<Self> {
        if config.n_atoms < 2 || !(config.v_max > config.v_min) {
            return Err(RainbowError::ShapeMismatch(format!(
                "invalid categorical support: {:?}",
                config
            ))
            .into());
        }
        let delta_z = (config.v_max - config.v_min) / (config.n_atoms - 1) as f32;
        let atoms = (0..config.n_atoms)
            .map(|i| config.v_min + i as f32 * delta_z)
            .collect();

        Ok(Self {
            v_min: config.v_min,
            v_max: config.v_max,
            delta_z,
            atoms,
        })
    }

    /// The number of atoms.
    pub fn n_atoms(&self) -> usize {
        self.atoms.len()
    }

    /// The smallest atom.
    pub fn v_min(&self) -> f32 {
        self.v_min
    }

    /// The largest atom.
    pub fn v_max(&self) -> f32 {
        self.v_max
    }

    /// Distance between adjacent atoms.
    pub fn delta_z(&self) -> f32 {
        self.delta_z
    }

    /// The atoms.
    pub fn atoms(&self) -> &Array1<f32> {
        &self.atoms
    }

    /// Expected values of distributions of shape `[batch, n_actions, n_atoms]`.
    pub fn expectation(&self, probs: ArrayView3<f32>) -> Array2<f32> {
        probs.map_axis(Axis(2), |p| p.dot(&self.atoms))
    }
}
