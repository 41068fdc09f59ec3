use cgmath::{One, Point3, Quaternion, Vector3};
use flow_skytile::{
    config::Config,
    control::ScalarControl,
    data_structures::{
        material::Side,
        scene_graph::{Scene, SceneGraph},
    },
    error::{LoadError, SkyboxError},
    resources::{ResourceKind, ResourceManager},
    skybox::{BarrierStep, CubemapUrls, Face, FaceBarrier, Skybox, SkyboxState},
};
use futures::executor::LocalPool;

use crate::common::test_utils::{CountingBackend, DeferredLoader, MemoryLoader, solid_image};

mod common;

fn loader_for(urls: &[&CubemapUrls]) -> MemoryLoader {
    let mut loader = MemoryLoader::new();
    for urls in urls {
        for (face, url) in urls.iter() {
            loader = loader.with(url, solid_image(4, 4, 40 * face.index() as u8));
        }
    }
    loader
}

fn mount(
    config: &Config,
    urls: CubemapUrls,
    loader: &dyn flow_skytile::resources::texture::TextureLoader,
    pool: &LocalPool,
    resources: &mut ResourceManager<CountingBackend>,
) -> (Skybox, ScalarControl) {
    Skybox::mount(config, urls, loader, &pool.spawner(), resources).unwrap()
}

#[test]
fn cubemap_urls_follow_face_order() {
    let urls = CubemapUrls::from_name("assets/", "day");
    assert_eq!(urls.get(Face::PosX), "assets/day/posx.jpg");
    assert_eq!(urls.get(Face::NegY), "assets/day/negy.jpg");
    let stems: Vec<_> = urls.iter().map(|(face, _)| face.file_stem()).collect();
    assert_eq!(stems, ["posx", "negx", "posy", "negy", "posz", "negz"]);
}

#[test]
fn ready_skybox_follows_the_camera() {
    let config = Config::default();
    let urls = CubemapUrls::from_name("sky", "day");
    let loader = loader_for(&[&urls]);
    let mut pool = LocalPool::new();
    let mut resources = ResourceManager::new(CountingBackend::new());
    let mut scene = SceneGraph::new();

    let (mut skybox, _control) = mount(&config, urls, &loader, &pool, &mut resources);
    assert_eq!(skybox.state(), SkyboxState::Loading);
    assert!(scene.is_empty());

    pool.run_until_stalled();
    skybox
        .on_frame(Point3::new(10.0, 20.0, 30.0), &mut scene, &mut resources)
        .unwrap();
    assert_eq!(skybox.state(), SkyboxState::Ready);
    assert_eq!(scene.len(), 1);

    let node = skybox.node().unwrap();
    let mesh = scene.mesh(node).unwrap();
    assert_eq!(mesh.materials.len(), 6);
    assert_eq!(mesh.transform.position, Vector3::new(10.0, 20.0, 30.0));
    assert_eq!(mesh.transform.scale, Vector3::new(1000.0, 1000.0, 1000.0));
    assert_eq!(mesh.transform.rotation, Quaternion::one());

    skybox
        .on_frame(Point3::new(-5.0, 0.0, 2.0), &mut scene, &mut resources)
        .unwrap();
    let mesh = scene.mesh(node).unwrap();
    assert_eq!(mesh.transform.position, Vector3::new(-5.0, 0.0, 2.0));
    assert_eq!(mesh.transform.scale, Vector3::new(1000.0, 1000.0, 1000.0));

    let backend = resources.backend();
    assert_eq!(backend.created(ResourceKind::Geometry), 1);
    assert_eq!(backend.created(ResourceKind::Texture), 6);
    assert_eq!(backend.created(ResourceKind::Material), 6);
    assert!(backend.materials.values().all(|m| m.side == Side::Back));
    assert!(backend.textures.values().all(|t| t.wrap == wgpu::AddressMode::ClampToEdge && !t.has_mips()));

    skybox.unmount(&mut scene, &mut resources);
    assert!(scene.is_empty());
    assert_eq!(resources.live_count(), 0);
}

#[test]
fn z_offset_updates_apply_on_the_next_tick_and_are_clamped() {
    let config = Config::default().with_z_offset(100.0);
    let urls = CubemapUrls::from_name("sky", "day");
    let loader = loader_for(&[&urls]);
    let mut pool = LocalPool::new();
    let mut resources = ResourceManager::new(CountingBackend::new());
    let mut scene = SceneGraph::new();
    let camera = Point3::new(0.0, 0.0, 0.0);

    let (mut skybox, control) = mount(&config, urls, &loader, &pool, &mut resources);
    pool.run_until_stalled();
    skybox.on_frame(camera, &mut scene, &mut resources).unwrap();
    let node = skybox.node().unwrap();
    assert_eq!(scene.mesh(node).unwrap().transform.position, Vector3::new(0.0, 0.0, 100.0));

    assert!(control.set(-250.0));
    assert_eq!(skybox.z_offset(), 100.0);
    skybox.on_frame(camera, &mut scene, &mut resources).unwrap();
    assert_eq!(skybox.z_offset(), -250.0);
    assert_eq!(scene.mesh(node).unwrap().transform.position, Vector3::new(0.0, 0.0, -250.0));

    control.set(700.0);
    skybox.on_frame(camera, &mut scene, &mut resources).unwrap();
    assert_eq!(skybox.z_offset(), 500.0);
    assert_eq!(scene.mesh(node).unwrap().transform.position, Vector3::new(0.0, 0.0, 500.0));

    assert!(!control.set(f32::NAN));
    skybox.on_frame(camera, &mut scene, &mut resources).unwrap();
    assert_eq!(skybox.z_offset(), 500.0);

    skybox.unmount(&mut scene, &mut resources);
}

#[test]
fn a_failed_face_is_reported_once_and_keeps_loading() {
    let config = Config::default();
    let urls = CubemapUrls::from_name("sky", "day");
    let mut loader = MemoryLoader::new();
    for (face, url) in urls.iter() {
        if face != Face::NegZ {
            loader = loader.with(url, solid_image(4, 4, 200));
        }
    }
    let mut pool = LocalPool::new();
    let mut resources = ResourceManager::new(CountingBackend::new());
    let mut scene = SceneGraph::new();

    let (mut skybox, _control) = mount(&config, urls, &loader, &pool, &mut resources);
    pool.run_until_stalled();

    let camera = Point3::new(0.0, 0.0, 0.0);
    match skybox.on_frame(camera, &mut scene, &mut resources) {
        Err(SkyboxError::Load(LoadError::Face { face, url, .. })) => {
            assert_eq!(face, Face::NegZ);
            assert_eq!(url, "sky/day/negz.jpg");
        }
        other => panic!("expected a face load error, got {other:?}"),
    }
    for _ in 0..3 {
        assert!(skybox.on_frame(camera, &mut scene, &mut resources).is_ok());
    }
    assert_eq!(skybox.state(), SkyboxState::Loading);
    assert!(skybox.load_failed());
    assert!(scene.is_empty());
    assert_eq!(resources.live_count(), 0);

    skybox.unmount(&mut scene, &mut resources);
    assert_eq!(skybox.state(), SkyboxState::Disposed);
}

#[test]
fn faces_may_arrive_in_any_order() {
    let config = Config::default();
    let urls = CubemapUrls::from_name("sky", "day");
    let loader = DeferredLoader::new();
    let mut pool = LocalPool::new();
    let mut resources = ResourceManager::new(CountingBackend::new());
    let mut scene = SceneGraph::new();
    let camera = Point3::new(1.0, 2.0, 3.0);

    let (mut skybox, _control) = mount(&config, urls.clone(), &loader, &pool, &mut resources);
    pool.run_until_stalled();
    assert_eq!(loader.pending(), 6);

    for face in [Face::NegZ, Face::PosY, Face::NegX, Face::PosZ, Face::PosX] {
        assert!(loader.complete(urls.get(face), Ok(solid_image(2, 2, 10))));
        pool.run_until_stalled();
        skybox.on_frame(camera, &mut scene, &mut resources).unwrap();
        assert_eq!(skybox.state(), SkyboxState::Loading);
        assert!(scene.is_empty());
    }

    // a stalled face keeps the skybox loading
    for _ in 0..3 {
        skybox.on_frame(camera, &mut scene, &mut resources).unwrap();
    }
    assert_eq!(skybox.state(), SkyboxState::Loading);

    loader.complete(urls.get(Face::NegY), Ok(solid_image(2, 2, 10)));
    pool.run_until_stalled();
    skybox.on_frame(camera, &mut scene, &mut resources).unwrap();
    assert_eq!(skybox.state(), SkyboxState::Ready);
    assert_eq!(scene.len(), 1);

    skybox.unmount(&mut scene, &mut resources);
}

#[test]
fn loads_finishing_after_unmount_are_dropped() {
    let config = Config::default();
    let urls = CubemapUrls::from_name("sky", "day");
    let loader = DeferredLoader::new();
    let mut pool = LocalPool::new();
    let mut resources = ResourceManager::new(CountingBackend::new());
    let mut scene = SceneGraph::new();
    let camera = Point3::new(0.0, 0.0, 0.0);

    let (mut skybox, _control) = mount(&config, urls.clone(), &loader, &pool, &mut resources);
    pool.run_until_stalled();
    for face in [Face::PosX, Face::NegX, Face::PosY] {
        loader.complete(urls.get(face), Ok(solid_image(2, 2, 10)));
    }
    pool.run_until_stalled();

    skybox.unmount(&mut scene, &mut resources);
    for face in [Face::NegY, Face::PosZ, Face::NegZ] {
        loader.complete(urls.get(face), Ok(solid_image(2, 2, 10)));
    }
    pool.run_until_stalled();
    skybox.on_frame(camera, &mut scene, &mut resources).unwrap();

    assert_eq!(skybox.state(), SkyboxState::Disposed);
    assert!(scene.is_empty());
    assert_eq!(resources.backend().created(ResourceKind::Texture), 0);
    assert_eq!(resources.live_count(), 0);
}

#[test]
fn new_urls_replace_the_previous_instance() {
    let config = Config::default();
    let day = CubemapUrls::from_name("sky", "day");
    let night = CubemapUrls::from_name("sky", "night");
    let loader = loader_for(&[&day, &night]);
    let mut pool = LocalPool::new();
    let mut resources = ResourceManager::new(CountingBackend::new());
    let mut scene = SceneGraph::new();
    let camera = Point3::new(0.0, 0.0, 0.0);

    let (mut skybox, _control) = mount(&config, day.clone(), &loader, &pool, &mut resources);
    pool.run_until_stalled();
    skybox.on_frame(camera, &mut scene, &mut resources).unwrap();
    let first = skybox.node().unwrap();

    // same set: nothing happens
    skybox.set_urls(day, &loader, &pool.spawner(), &mut scene, &mut resources);
    assert_eq!(skybox.state(), SkyboxState::Ready);
    assert_eq!(skybox.node(), Some(first));
    assert_eq!(loader.requests().len(), 6);

    skybox.set_urls(night.clone(), &loader, &pool.spawner(), &mut scene, &mut resources);
    assert_eq!(skybox.state(), SkyboxState::Loading);
    assert!(scene.is_empty());
    assert_eq!(resources.live_count(), 0);
    assert_eq!(resources.backend().destroyed(ResourceKind::Material), 6);

    pool.run_until_stalled();
    skybox.on_frame(camera, &mut scene, &mut resources).unwrap();
    assert_eq!(skybox.state(), SkyboxState::Ready);
    assert_eq!(skybox.urls(), Some(&night));
    assert_eq!(scene.len(), 1);
    assert_eq!(resources.live_count_for(skybox.owner()), 13);

    skybox.unmount(&mut scene, &mut resources);
    skybox.unmount(&mut scene, &mut resources);
    assert_eq!(resources.live_count(), 0);
    assert_eq!(resources.backend().outstanding(), 0);
}

#[test]
fn a_disposed_skybox_can_load_again() {
    let config = Config::default();
    let urls = CubemapUrls::from_name("sky", "day");
    let loader = loader_for(&[&urls]);
    let mut pool = LocalPool::new();
    let mut resources = ResourceManager::new(CountingBackend::new());
    let mut scene = SceneGraph::new();

    let (mut skybox, _control) = mount(&config, urls.clone(), &loader, &pool, &mut resources);
    skybox.unmount(&mut scene, &mut resources);
    assert_eq!(skybox.state(), SkyboxState::Disposed);

    skybox.set_urls(urls, &loader, &pool.spawner(), &mut scene, &mut resources);
    pool.run_until_stalled();
    skybox
        .on_frame(Point3::new(0.0, 0.0, 0.0), &mut scene, &mut resources)
        .unwrap();
    assert_eq!(skybox.state(), SkyboxState::Ready);
    skybox.unmount(&mut scene, &mut resources);
}

#[test]
fn failing_backend_leaves_nothing_behind() {
    let config = Config::default();
    let urls = CubemapUrls::from_name("sky", "day");
    let loader = loader_for(&[&urls]);
    let mut pool = LocalPool::new();
    let mut backend = CountingBackend::new();
    backend.fail_on = Some(ResourceKind::Material);
    let mut resources = ResourceManager::new(backend);
    let mut scene = SceneGraph::new();

    let (mut skybox, _control) = mount(&config, urls, &loader, &pool, &mut resources);
    pool.run_until_stalled();
    let result = skybox.on_frame(Point3::new(0.0, 0.0, 0.0), &mut scene, &mut resources);
    assert!(matches!(result, Err(SkyboxError::Resources(_))));
    assert_eq!(skybox.state(), SkyboxState::Loading);
    assert!(scene.is_empty());
    assert_eq!(resources.live_count(), 0);
    assert_eq!(resources.backend().outstanding(), 0);
}

#[test]
fn barrier_completes_only_with_all_six_faces() {
    let mut barrier = FaceBarrier::new();
    for face in &Face::ALL[..5] {
        assert!(matches!(barrier.record(*face, Ok(solid_image(1, 1, 0))), BarrierStep::Pending));
    }
    assert_eq!(barrier.arrived(), 5);
    match barrier.record(Face::NegZ, Ok(solid_image(1, 1, 0))) {
        BarrierStep::Complete(images) => assert_eq!(images.len(), 6),
        other => panic!("expected completion, got {other:?}"),
    }
    assert!(matches!(barrier.record(Face::PosX, Ok(solid_image(1, 1, 0))), BarrierStep::Ignored));
}

#[test]
fn barrier_reports_the_first_failure_only() {
    let mut barrier = FaceBarrier::new();
    barrier.record(Face::PosX, Ok(solid_image(1, 1, 0)));
    assert!(matches!(
        barrier.record(Face::NegX, Err(anyhow::anyhow!("boom"))),
        BarrierStep::Failed(_)
    ));
    assert!(matches!(
        barrier.record(Face::PosY, Err(anyhow::anyhow!("boom again"))),
        BarrierStep::Ignored
    ));
    for face in Face::ALL {
        assert!(matches!(barrier.record(face, Ok(solid_image(1, 1, 0))), BarrierStep::Ignored));
    }
}

#[test]
fn moving_camera_with_fixed_offset() {
    let config = Config::default().with_z_offset(5.0);
    let urls = CubemapUrls::from_name("sky", "day");
    let loader = loader_for(&[&urls]);
    let mut pool = LocalPool::new();
    let mut resources = ResourceManager::new(CountingBackend::new());
    let mut scene = SceneGraph::new();

    let (mut skybox, _control) = mount(&config, urls, &loader, &pool, &mut resources);
    pool.run_until_stalled();
    skybox
        .on_frame(Point3::new(0.0, 0.0, 0.0), &mut scene, &mut resources)
        .unwrap();
    skybox
        .on_frame(Point3::new(10.0, 0.0, 0.0), &mut scene, &mut resources)
        .unwrap();

    let mesh = scene.mesh(skybox.node().unwrap()).unwrap();
    assert_eq!(mesh.transform.position, Vector3::new(10.0, 0.0, 5.0));
    assert_eq!(mesh.transform.rotation, Quaternion::one());
    assert_eq!(mesh.transform.scale, Vector3::new(1000.0, 1000.0, 1000.0));
    skybox.unmount(&mut scene, &mut resources);
}

#[test]
fn z_offset_is_bounded_by_the_configured_range() {
    let config = Config::default().with_z_offset_range(-50.0..=50.0);
    let urls = CubemapUrls::from_name("sky", "day");
    let loader = loader_for(&[&urls]);
    let mut pool = LocalPool::new();
    let mut resources = ResourceManager::new(CountingBackend::new());
    let mut scene = SceneGraph::new();
    let camera = Point3::new(0.0, 0.0, 0.0);

    let (mut skybox, control) = mount(&config, urls, &loader, &pool, &mut resources);
    pool.run_until_stalled();
    skybox.on_frame(camera, &mut scene, &mut resources).unwrap();

    control.set(900.0);
    skybox.on_frame(camera, &mut scene, &mut resources).unwrap();
    assert_eq!(skybox.z_offset(), 50.0);
    let node = skybox.node().unwrap();
    assert_eq!(scene.mesh(node).unwrap().transform.position, Vector3::new(0.0, 0.0, 50.0));

    control.set(-900.0);
    skybox.on_frame(camera, &mut scene, &mut resources).unwrap();
    assert_eq!(scene.mesh(node).unwrap().transform.position, Vector3::new(0.0, 0.0, -50.0));
    skybox.unmount(&mut scene, &mut resources);
}

#[test]
fn switching_urls_while_loading_drops_the_old_faces() {
    let config = Config::default();
    let day = CubemapUrls::from_name("sky", "day");
    let night = CubemapUrls::from_name("sky", "night");
    let loader = DeferredLoader::new();
    let mut pool = LocalPool::new();
    let mut resources = ResourceManager::new(CountingBackend::new());
    let mut scene = SceneGraph::new();
    let camera = Point3::new(0.0, 0.0, 0.0);

    let (mut skybox, _control) = mount(&config, day.clone(), &loader, &pool, &mut resources);
    pool.run_until_stalled();
    for face in [Face::PosX, Face::NegX, Face::PosY] {
        loader.complete(day.get(face), Ok(solid_image(2, 2, 10)));
    }
    pool.run_until_stalled();
    skybox.on_frame(camera, &mut scene, &mut resources).unwrap();
    assert_eq!(skybox.state(), SkyboxState::Loading);

    skybox.set_urls(night.clone(), &loader, &pool.spawner(), &mut scene, &mut resources);
    assert_eq!(skybox.state(), SkyboxState::Loading);
    pool.run_until_stalled();

    for face in [Face::NegY, Face::PosZ, Face::NegZ] {
        loader.complete(day.get(face), Ok(solid_image(2, 2, 10)));
    }
    for face in Face::ALL {
        loader.complete(night.get(face), Ok(solid_image(4, 4, 200)));
    }
    pool.run_until_stalled();
    skybox.on_frame(camera, &mut scene, &mut resources).unwrap();

    assert_eq!(skybox.state(), SkyboxState::Ready);
    assert_eq!(skybox.urls(), Some(&night));
    assert_eq!(scene.len(), 1);
    let backend = resources.backend();
    assert_eq!(backend.created(ResourceKind::Texture), 6);
    assert!(backend.textures.values().all(|t| t.width == 4 && t.height == 4));
    let mesh = scene.mesh(skybox.node().unwrap()).unwrap();
    assert!(mesh.materials.iter().all(|m| backend.materials.contains_key(m)));

    skybox.unmount(&mut scene, &mut resources);
    assert_eq!(resources.live_count(), 0);
}
