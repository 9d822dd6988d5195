// filter.rs — depth pre-filter strategy.
//
// The vertex-map builder applies one of these to the raw depth sample
// before unprojection. Only `None` is implemented; Gaussian and bilateral
// smoothing are declared extension points. Selecting an unimplemented
// variant FAILS FAST instead of silently running the unfiltered path —
// a missing feature must not masquerade as a correctness success.

use std::fmt;

/// Depth pre-filter applied before unprojection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DepthFilter {
    /// Raw depth, no smoothing.
    None,
    /// Gaussian smoothing of the depth image. Extension point, not yet
    /// implemented.
    Gaussian { sigma: f32 },
    /// Edge-preserving bilateral filter: `sigma_s` spatial, `sigma_r`
    /// range (depth-difference) bandwidth. Extension point, not yet
    /// implemented.
    Bilateral { sigma_s: f32, sigma_r: f32 },
}

impl DepthFilter {
    /// Err for the declared-but-unimplemented variants. Builders call this
    /// before touching any buffer, so an unimplemented selection does no
    /// work at all.
    pub fn ensure_implemented(&self) -> Result<(), FilterError> {
        match self {
            DepthFilter::None => Ok(()),
            DepthFilter::Gaussian { .. } => Err(FilterError::Unimplemented("gaussian")),
            DepthFilter::Bilateral { .. } => Err(FilterError::Unimplemented("bilateral")),
        }
    }
}

/// Errors from depth-filter selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterError {
    /// The selected filter is a declared extension point with no
    /// implementation. No buffer was written.
    Unimplemented(&'static str),
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::Unimplemented(name) => {
                write!(f, "depth filter '{name}' is not implemented")
            }
        }
    }
}

impl std::error::Error for FilterError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_implemented() {
        assert!(DepthFilter::None.ensure_implemented().is_ok());
    }

    #[test]
    fn test_unimplemented_variants_fail_fast() {
        assert_eq!(
            DepthFilter::Gaussian { sigma: 1.0 }.ensure_implemented(),
            Err(FilterError::Unimplemented("gaussian"))
        );
        assert_eq!(
            DepthFilter::Bilateral { sigma_s: 4.0, sigma_r: 0.05 }.ensure_implemented(),
            Err(FilterError::Unimplemented("bilateral"))
        );
    }
}
