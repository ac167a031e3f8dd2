//! Quadrant demo host.
//!
//! Usage: `quadrant-demo [ASSET_DIR [IMAGE]]`. Without arguments a generated
//! checkerboard is drawn; with an asset directory, `IMAGE` (default
//! `sprite.png`) is loaded from it and drawn alongside.
//!
//! Set `QUADRANT_UNPACED=1` to present without vsync.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use glam::{Mat4, Quat, Vec3};
use quadrant_engine::asset::DirAssetStore;
use quadrant_engine::device::GpuInit;
use quadrant_engine::logging::{init_logging, LoggingConfig};
use quadrant_engine::{DrawCommand, Renderer, RendererConfig, Texture, WgpuBackend};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

const CHECKER_SIZE: u32 = 8;
const DEFAULT_IMAGE: &str = "sprite.png";
const UNPACED_ENV: &str = "QUADRANT_UNPACED";

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let mut args = std::env::args().skip(1);
    let asset = args.next().map(|dir| SpriteAsset {
        store: DirAssetStore::new(dir),
        path: args.next().unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
    });

    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
    let mut host = DemoHost::new(asset);
    event_loop
        .run_app(&mut host)
        .context("winit event loop terminated with error")?;

    host.failure.map_or(Ok(()), Err)
}

struct SpriteAsset {
    store: DirAssetStore,
    path: String,
}

/// Everything that lives as long as the window.
struct Scene {
    window: Arc<Window>,
    checker: Texture<WgpuBackend>,
    sprite: Option<Texture<WgpuBackend>>,
    renderer: Renderer<WgpuBackend>,
}

impl Scene {
    fn create(event_loop: &ActiveEventLoop, asset: Option<&SpriteAsset>) -> Result<Self> {
        let attrs = Window::default_attributes()
            .with_title("quadrant")
            .with_inner_size(LogicalSize::new(960.0, 540.0));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );

        let renderer = Renderer::for_window(
            Arc::clone(&window),
            gpu_init(),
            RendererConfig::default(),
        )?;

        let checker = renderer
            .create_texture(CHECKER_SIZE, CHECKER_SIZE, &checkerboard(CHECKER_SIZE))
            .context("failed to create checkerboard texture")?;

        // A missing sprite is not fatal; the demo still runs with the checkerboard.
        let sprite = asset.and_then(|asset| {
            renderer
                .load_texture(&asset.store, &asset.path)
                .inspect_err(|e| log::error!("failed to load `{}`: {e}", asset.path))
                .ok()
        });

        Ok(Self {
            window,
            checker,
            sprite,
            renderer,
        })
    }
}

struct DemoHost {
    asset: Option<SpriteAsset>,
    scene: Option<Scene>,
    started: Instant,
    failure: Option<anyhow::Error>,
}

impl DemoHost {
    fn new(asset: Option<SpriteAsset>) -> Self {
        Self {
            asset,
            scene: None,
            started: Instant::now(),
            failure: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        self.failure = Some(error);
        self.scene = None;
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(scene) = self.scene.as_mut() else {
            return;
        };

        let t = self.started.elapsed().as_secs_f32();
        let commands = frame_commands(&scene.checker, scene.sprite.as_ref(), t);
        let result = scene.renderer.do_frame(&commands);

        match result {
            Ok(()) => {}
            Err(e) if e.requires_surface_recreation() => {
                if let Err(e) = scene.renderer.recreate_surface() {
                    self.fail(event_loop, anyhow::Error::new(e));
                }
            }
            Err(e) if e.is_fatal() => self.fail(event_loop, anyhow::Error::new(e)),
            // Timeouts and the like: try again next frame.
            Err(_) => {}
        }
    }
}

impl ApplicationHandler for DemoHost {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.scene.is_some() {
            return;
        }

        match Scene::create(event_loop, self.asset.as_ref()) {
            Ok(scene) => {
                scene.window.request_redraw();
                self.scene = Some(scene);
            }
            Err(e) => self.fail(event_loop, e.context("failed to start the renderer")),
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);
        if let Some(scene) = &self.scene {
            scene.window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.scene = None;
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(scene) = &self.scene {
                    scene.renderer.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }
}

fn gpu_init() -> GpuInit {
    match std::env::var(UNPACED_ENV) {
        Ok(value) if !value.is_empty() && value != "0" => {
            log::info!("{UNPACED_ENV} set; presenting without vsync");
            GpuInit::unpaced()
        }
        _ => GpuInit::default(),
    }
}

fn frame_commands<'a>(
    checker: &'a Texture<WgpuBackend>,
    sprite: Option<&'a Texture<WgpuBackend>>,
    t: f32,
) -> Vec<DrawCommand<'a, WgpuBackend>> {
    let spin = Mat4::from_rotation_translation(Quat::from_rotation_z(t), Vec3::new(-0.5, 0.0, 0.0));
    let bob = Mat4::from_scale_rotation_translation(
        Vec3::splat(0.5),
        Quat::IDENTITY,
        Vec3::new(0.5, 0.2 * (t * 2.0).sin(), 0.0),
    );

    let mut commands = vec![
        DrawCommand::textured(Mat4::from_scale(Vec3::splat(1.8)), checker),
        DrawCommand::new(spin * Mat4::from_scale(Vec3::splat(0.4))),
        DrawCommand::textured(bob, checker),
    ];
    if let Some(sprite) = sprite {
        let aspect = sprite.width() as f32 / sprite.height().max(1) as f32;
        commands.push(DrawCommand::textured(
            Mat4::from_scale(Vec3::new(0.6 * aspect, 0.6, 1.0)),
            sprite,
        ));
    }
    commands
}

/// Two-tone RGBA8 checkerboard with one-texel cells.
fn checkerboard(size: u32) -> Vec<u8> {
    (0..size * size)
        .flat_map(|i| {
            let (x, y) = (i % size, i / size);
            if (x + y) % 2 == 0 {
                [40, 40, 48, 255]
            } else {
                [220, 220, 228, 255]
            }
        })
        .collect()
}
