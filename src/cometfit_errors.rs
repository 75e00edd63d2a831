use thiserror::Error;

/// Reason for which the Gauss initial orbit determination rejected a triplet.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IODFailure {
    #[error("observation epochs are not strictly increasing")]
    NonIncreasingEpochs,

    #[error("observation epochs are closer together than the minimum time separation")]
    InsufficientTimeSpan,

    #[error("degenerate geometry: lines of sight are coplanar (|D0| below threshold)")]
    DegenerateGeometry,

    #[error("unit direction matrix is singular (cannot be inverted)")]
    SingularDirectionMatrix,

    #[error("Aberth–Ehrlich method failed to find the roots of the distance polynomial")]
    PolynomialRootFindingFailed,

    #[error("no positive real root of the distance polynomial is admissible")]
    NoAdmissibleRoot,

    #[error("several admissible roots below the observer distance, solution is ambiguous")]
    AmbiguousSolution,

    #[error("non-physical root (non-finite or non-positive distance)")]
    NonPhysicalRoot,

    #[error("heliocentric transfer angle between first and last position is close to 180°")]
    NearOppositeGeometry,

    #[error("orbital plane is undefined (vanishing angular momentum)")]
    DegenerateOrbitalPlane,

    #[error("implausible orbit (eccentricity above the configured maximum)")]
    ImplausibleOrbit,

    #[error("did not converge")]
    DidNotConverge,
}

#[derive(Error, Debug)]
pub enum CometFitError {
    #[error("Domain error: {0}")]
    Domain(String),

    #[error("IOD error: {0}")]
    IOD(#[from] IODFailure),

    #[error("Propagation error: {0}")]
    Propagation(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Ephemeris error: {0}")]
    Ephemeris(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("ROOTS finding error: {0}")]
    RootFinding(#[from] roots::SearchError),
}

impl PartialEq for CometFitError {
    fn eq(&self, other: &Self) -> bool {
        use CometFitError::*;
        match (self, other) {
            (Domain(a), Domain(b)) => a == b,
            (IOD(a), IOD(b)) => a == b,
            (Propagation(a), Propagation(b)) => a == b,
            (Search(a), Search(b)) => a == b,
            (Ephemeris(a), Ephemeris(b)) => a == b,
            (InvalidParameter(a), InvalidParameter(b)) => a == b,
            (RootFinding(a), RootFinding(b)) => a == b,
            _ => false,
        }
    }
}
