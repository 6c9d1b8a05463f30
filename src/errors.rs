//! Error types with diagnostics using miette
//!
//! Only document-level problems abort a run. Calibration stages report a
//! typed absence through [`FitError`] so the pipeline can fall back.

use miette::Diagnostic;
use thiserror::Error;

// ============================================================================
// Run Errors
// ============================================================================

/// Errors that abort a flatten or reproject run
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("no <svg> root element (found <{found}>)")]
    #[diagnostic(
        code(mapflat::no_root),
        help("the document passed in must be rooted at an `svg` element")
    )]
    NoRoot { found: String },

    #[error("too few points to calibrate: found {found}, need at least {required}")]
    #[diagnostic(
        code(mapflat::insufficient_points),
        help("the drawing must contain path, polygon or polyline geometry")
    )]
    InsufficientPoints { found: usize, required: usize },

    /// Even the bounding box fallback produced no usable calibration.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Calibration(#[from] FitError),
}

// ============================================================================
// Calibration Absence
// ============================================================================

/// Why a calibration stage produced no result.
///
/// None of these abort a run: the caller falls back to the bounding box
/// strategy or to an isotropic scale.
#[derive(Error, Diagnostic, Debug, Clone, Copy, PartialEq)]
pub enum FitError {
    #[error("no equator marker segment found")]
    #[diagnostic(code(mapflat::fit::no_marker))]
    NoMarker,

    #[error("unit projection has no usable extent at 180°")]
    #[diagnostic(code(mapflat::fit::degenerate_projection))]
    DegenerateProjection,

    #[error("meridian group not found")]
    #[diagnostic(code(mapflat::fit::no_meridian_group))]
    NoMeridianGroup,

    #[error("too few usable meridians: found {found}, need {required}")]
    #[diagnostic(
        code(mapflat::fit::too_few_meridians),
        help("meridians must cross the equator and extend away from it")
    )]
    TooFewMeridians { found: usize, required: usize },

    #[error("too few samples for a finite residual")]
    #[diagnostic(code(mapflat::fit::too_few_samples))]
    TooFewSamples,

    #[error("fitted scale is not positive and finite")]
    #[diagnostic(code(mapflat::fit::non_finite_scale))]
    NonFiniteScale,
}
