//! Object lifetimes: every GPU object is released exactly once, in order.

use std::rc::Rc;

use glam::Mat4;
use quadrant_engine::backend::{ResourceKind, SoftwareBackend};
use quadrant_engine::{DrawCommand, Renderer, RendererConfig};

fn shared_renderer() -> (Rc<SoftwareBackend>, Renderer<SoftwareBackend>) {
    let backend = Rc::new(SoftwareBackend::new(32, 32));
    let renderer = Renderer::with_shared(Rc::clone(&backend), RendererConfig::default()).unwrap();
    (backend, renderer)
}

#[test]
fn renderer_owns_program_mesh_and_fallback_texture() {
    let (backend, _renderer) = shared_renderer();
    let stats = backend.stats();
    assert_eq!(stats.live(ResourceKind::Shader), 0);
    assert_eq!(stats.live(ResourceKind::Program), 1);
    assert_eq!(stats.live(ResourceKind::Mesh), 1);
    assert_eq!(stats.live(ResourceKind::Texture), 1);
}

#[test]
fn dropping_the_renderer_releases_everything_in_order() {
    let (backend, renderer) = shared_renderer();
    drop(renderer);

    let stats = backend.stats();
    assert_eq!(stats.total_live(), 0);
    assert_eq!(stats.invalid_releases(), 0);
    assert_eq!(
        stats.release_order(),
        [
            ResourceKind::Shader,
            ResourceKind::Shader,
            ResourceKind::Program,
            ResourceKind::Mesh,
            ResourceKind::Texture,
        ]
    );
}

#[test]
fn user_textures_are_released_by_their_owner() {
    let (backend, mut renderer) = shared_renderer();
    let texture = renderer.create_texture(2, 1, &[9; 8]).unwrap();

    for _ in 0..3 {
        renderer
            .do_frame(&[DrawCommand::textured(Mat4::IDENTITY, &texture)])
            .unwrap();
    }
    assert_eq!(backend.stats().live(ResourceKind::Texture), 2);

    drop(texture);
    let stats = backend.stats();
    assert_eq!(stats.live(ResourceKind::Texture), 1);
    assert_eq!(stats.release_order().last(), Some(&ResourceKind::Texture));

    drop(renderer);
    let stats = backend.stats();
    assert_eq!(stats.total_live(), 0);
    assert_eq!(stats.released(ResourceKind::Texture), 2);
    assert_eq!(stats.invalid_releases(), 0);
}

#[test]
fn frames_do_not_allocate() {
    let (backend, mut renderer) = shared_renderer();
    let before = backend.stats();
    for _ in 0..10 {
        renderer.do_frame(&[DrawCommand::new(Mat4::IDENTITY); 4]).unwrap();
    }
    assert_eq!(backend.stats(), before);
    assert_eq!(backend.frames_presented(), 10);
    assert_eq!(backend.draw_calls(), 40);
}

#[test]
fn failed_texture_creation_leaks_nothing() {
    let (backend, renderer) = shared_renderer();
    assert!(renderer.create_texture(4, 4, &[0; 10]).is_err());
    assert!(renderer.create_texture(0, 0, &[]).is_err());
    drop(renderer);
    assert_eq!(backend.stats().total_live(), 0);
    assert_eq!(backend.stats().created(ResourceKind::Texture), 1);
}
