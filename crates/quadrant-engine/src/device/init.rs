/// Device and surface options for [`Gpu::new`](super::Gpu::new).
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Graphics APIs the instance may pick from.
    pub backends: wgpu::Backends,

    /// Adapter selection hint. A sprite renderer rarely needs the discrete GPU.
    pub power_preference: wgpu::PowerPreference,

    /// Use an sRGB surface when the platform offers one.
    ///
    /// Off by default so that texture bytes reach the framebuffer unconverted
    /// and the clear color matches its 8-bit value exactly.
    pub prefer_srgb: bool,

    /// FIFO (vsync) is the only mode every platform must support.
    pub present_mode: wgpu::PresentMode,

    /// Requested compositing alpha mode; falls back to the first supported one.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    pub required_limits: wgpu::Limits,

    /// Frames the surface may queue ahead. A hint.
    pub desired_maximum_frame_latency: u32,
}

impl GpuInit {
    /// Presents immediately when the platform allows it, for profiling.
    pub fn unpaced() -> Self {
        Self {
            present_mode: wgpu::PresentMode::AutoNoVsync,
            desired_maximum_frame_latency: 1,
            ..Self::default()
        }
    }
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::LowPower,
            prefer_srgb: false,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_vsynced_linear_output() {
        let init = GpuInit::default();
        assert_eq!(init.present_mode, wgpu::PresentMode::Fifo);
        assert!(!init.prefer_srgb);
    }

    #[test]
    fn unpaced_only_changes_pacing() {
        let init = GpuInit::unpaced();
        assert_eq!(init.present_mode, wgpu::PresentMode::AutoNoVsync);
        assert_eq!(init.power_preference, GpuInit::default().power_preference);
    }
}
