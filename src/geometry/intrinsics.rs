use serde::{Deserialize, Serialize};

/// Lens distortion model of a stream.
///
/// Coefficient layout follows the camera vendor: Brown-Conrady variants use
/// `[k1, k2, p1, p2, k3]`, F-Theta uses `coeffs[0]` as the field-of-view term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistortionModel {
    #[default]
    None,
    ModifiedBrownConrady,
    InverseBrownConrady,
    Ftheta,
    BrownConrady,
    KannalaBrandt4,
}

/// Per-stream pinhole camera model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub width: u32,
    pub height: u32,
    /// Principal point, pixels from the left edge
    pub ppx: f32,
    /// Principal point, pixels from the top edge
    pub ppy: f32,
    /// Focal length as a multiple of pixel width
    pub fx: f32,
    /// Focal length as a multiple of pixel height
    pub fy: f32,
    pub model: DistortionModel,
    pub coeffs: [f32; 5],
}

impl Intrinsics {
    /// Distortion-free intrinsics with the principal point at the image center.
    pub fn pinhole(width: u32, height: u32, fx: f32, fy: f32) -> Self {
        Self {
            width,
            height,
            ppx: width as f32 / 2.0,
            ppy: height as f32 / 2.0,
            fx,
            fy,
            model: DistortionModel::None,
            coeffs: [0.0; 5],
        }
    }

    pub fn with_distortion(mut self, model: DistortionModel, coeffs: [f32; 5]) -> Self {
        self.model = model;
        self.coeffs = coeffs;
        self
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether the two models share resolution, principal point, focal
    /// lengths and distortion model. Coefficients are not compared.
    pub fn same_geometry(&self, other: &Intrinsics) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.ppx == other.ppx
            && self.ppy == other.ppy
            && self.fx == other.fx
            && self.fy == other.fy
            && self.model == other.model
    }
}

/// Rigid transform between two streams' coordinate frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extrinsics {
    /// 3x3 rotation, column-major
    pub rotation: [f32; 9],
    /// Translation in meters
    pub translation: [f32; 3],
}

impl Extrinsics {
    pub fn identity() -> Self {
        Self {
            rotation: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            translation: [0.0; 3],
        }
    }

    pub fn from_translation(translation: [f32; 3]) -> Self {
        Self {
            translation,
            ..Self::identity()
        }
    }

    /// The reverse transform, for rotation matrices that are orthonormal.
    pub fn inverse(&self) -> Self {
        let r = glam::Mat3::from_cols_array(&self.rotation).transpose();
        let t = -(r * glam::Vec3::from_array(self.translation));
        Self {
            rotation: r.to_cols_array(),
            translation: t.to_array(),
        }
    }
}

impl Default for Extrinsics {
    fn default() -> Self {
        Self::identity()
    }
}
