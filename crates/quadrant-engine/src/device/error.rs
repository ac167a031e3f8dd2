use thiserror::Error;

/// Failure to present a frame.
///
/// Reported to the caller of `Renderer::do_frame`. Recovery (usually recreating
/// the surface) is the host's decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresentError {
    /// The surface is gone; it must be recreated before the next frame.
    #[error("surface lost")]
    SurfaceLost,
    /// The surface no longer matches the window and must be reconfigured.
    #[error("surface outdated")]
    Outdated,
    /// Acquiring the next image timed out; the frame was dropped.
    #[error("timed out acquiring the next surface image")]
    Timeout,
    /// The platform ran out of memory while presenting.
    #[error("out of memory while presenting")]
    OutOfMemory,
    #[error("presentation rejected: {0}")]
    Other(String),
}

impl PresentError {
    /// Returns `true` when the host should call `recreate_surface` before
    /// rendering again.
    pub fn requires_surface_recreation(&self) -> bool {
        matches!(self, Self::SurfaceLost | Self::Outdated)
    }

    /// Returns `true` when continuing to render makes no sense.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::OutOfMemory)
    }
}

impl From<wgpu::SurfaceError> for PresentError {
    fn from(err: wgpu::SurfaceError) -> Self {
        match err {
            wgpu::SurfaceError::Lost => Self::SurfaceLost,
            wgpu::SurfaceError::Outdated => Self::Outdated,
            wgpu::SurfaceError::Timeout => Self::Timeout,
            wgpu::SurfaceError::OutOfMemory => Self::OutOfMemory,
            other => Self::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lost_and_outdated_require_recreation() {
        assert!(PresentError::SurfaceLost.requires_surface_recreation());
        assert!(PresentError::Outdated.requires_surface_recreation());
        assert!(!PresentError::Timeout.requires_surface_recreation());
        assert!(!PresentError::OutOfMemory.requires_surface_recreation());
    }

    #[test]
    fn only_oom_is_fatal() {
        assert!(PresentError::OutOfMemory.is_fatal());
        assert!(!PresentError::SurfaceLost.is_fatal());
        assert!(!PresentError::Other("x".into()).is_fatal());
    }

    #[test]
    fn maps_wgpu_surface_errors() {
        assert_eq!(PresentError::from(wgpu::SurfaceError::Lost), PresentError::SurfaceLost);
        assert_eq!(PresentError::from(wgpu::SurfaceError::Outdated), PresentError::Outdated);
        assert_eq!(PresentError::from(wgpu::SurfaceError::Timeout), PresentError::Timeout);
        assert_eq!(
            PresentError::from(wgpu::SurfaceError::OutOfMemory),
            PresentError::OutOfMemory
        );
    }
}
