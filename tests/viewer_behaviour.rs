use std::collections::HashMap;
use std::sync::mpsc::Sender;

use image::RgbaImage;
use panorama_viewer::camera::CameraState;
use panorama_viewer::input::Key;
use panorama_viewer::streamer::{LoadReply, SourceLoader, StreamEvent, TextureSink};
use panorama_viewer::{PanoramaViewer, Result, ViewMode, ViewerConfig, ViewerError};

/// Answers every request immediately with a blank image of the listed size.
#[derive(Default)]
struct MemoryLoader {
    sizes: HashMap<String, (u32, u32)>,
    requests: Vec<String>,
}

impl MemoryLoader {
    fn with(mut self, name: &str, w: u32, h: u32) -> Self {
        self.sizes.insert(name.to_string(), (w, h));
        self
    }
}

impl SourceLoader for MemoryLoader {
    fn request(&mut self, index: usize, source: &str, reply: Sender<LoadReply>) {
        self.requests.push(source.to_string());
        let result = match self.sizes.get(source) {
            Some(&(w, h)) => Ok(RgbaImage::new(w, h)),
            None => Err(ViewerError::resource(source, "missing")),
        };
        let _ = reply.send(LoadReply { index, result });
    }
}

struct Sink {
    max: u32,
    uploads: Vec<(u32, u32)>,
}

impl Sink {
    fn new(max: u32) -> Self {
        Self {
            max,
            uploads: Vec::new(),
        }
    }
}

impl TextureSink for Sink {
    fn max_texture_dimension(&self) -> u32 {
        self.max
    }

    fn upload(&mut self, image: &RgbaImage) -> Result<()> {
        self.uploads.push(image.dimensions());
        Ok(())
    }
}

fn viewer(loader: MemoryLoader) -> PanoramaViewer<MemoryLoader> {
    let mut v = PanoramaViewer::with_loader(ViewerConfig::default(), loader);
    v.resize(1280, 720);
    v
}

#[test]
fn pose_stays_clamped_under_mixed_input() {
    let mut v = viewer(MemoryLoader::default());
    let mut sink = Sink::new(4096);
    let mut t = 0.0;

    // 简单的伪随机序列
    let mut seed: u32 = 12345;
    let mut next = || {
        seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
        (seed >> 8) as f32 / (1u32 << 24) as f32
    };

    for step in 0..400 {
        let r = next();
        match step % 5 {
            0 => v.on_wheel((r - 0.5) * 4000.0),
            1 => {
                v.on_pointer_down(0.0, 0.0, t);
                v.on_pointer_move((r - 0.5) * 3000.0, (r - 0.3) * 5000.0, t + 10.0);
                v.on_pointer_up();
            }
            2 => v.on_key_down(if r > 0.5 { Key::ArrowUp } else { Key::Minus }),
            3 => v.release_all_keys(),
            _ => {
                v.set_attribute("pitch", &format!("{}", (r - 0.5) * 1000.0));
            }
        }
        t += 16.0;
        v.frame(t, &mut sink);

        assert!(v.pitch().abs() <= 89.0, "pitch {}", v.pitch());
        assert!((0.6..=10.0).contains(&v.zoom()), "zoom {}", v.zoom());
    }
}

#[test]
fn free_motion_decays_to_rest() {
    let mut cam = CameraState::default();
    cam.yaw_velocity = 5.0;
    cam.pitch_velocity = -3.0;
    cam.zoom_velocity = 1.0;

    // 0.95^n * 5 < 0.001  ⇒  n ≈ 167
    for _ in 0..200 {
        cam.integrate();
    }
    assert!(!cam.is_moving());

    // 总位移有上界 v / (1 - 0.95)
    assert!(cam.yaw() <= 5.0 / 0.05 + 1e-3);
}

#[test]
fn flick_threshold_is_exclusive() {
    for (dx, expect_flick) in [(499.0, false), (501.0, true)] {
        let mut v = viewer(MemoryLoader::default());
        v.on_pointer_down(0.0, 0.0, 0.0);
        v.on_pointer_move(dx, 0.0, 1000.0);
        v.on_pointer_up();

        let vel = v.camera().yaw_velocity;
        if expect_flick {
            // 501 units/s · 0.002 · (1 / zoom 2)
            assert!((vel - 501.0 * 0.002 * 0.5).abs() < 1e-4, "vel {vel}");
        } else {
            assert_eq!(vel, 0.0);
        }
    }
}

#[test]
fn pitch_and_zoom_round_trip_through_attributes() {
    let mut v = viewer(MemoryLoader::default());
    for p in [-89.0f32, -30.5, 0.0, 12.25, 89.0] {
        v.set_pitch(p);
        let text = v.attribute("pitch").unwrap();
        let mut w = viewer(MemoryLoader::default());
        w.set_attribute("pitch", &text);
        assert_eq!(w.pitch(), p);
    }
    for z in [0.6f32, 1.6, 2.0, 2.4, 10.0] {
        v.set_zoom(z);
        assert_eq!(v.attribute("zoom").unwrap().parse::<f32>().unwrap(), z);
    }
}

#[test]
fn sources_stream_lowest_first() {
    let loader = MemoryLoader::default()
        .with("low.jpg", 64, 32)
        .with("mid.jpg", 256, 128)
        .with("high.jpg", 1024, 512);
    let mut v = viewer(loader);
    v.set_sources("low.jpg mid.jpg high.jpg");
    let mut sink = Sink::new(4096);

    let mut loaded = Vec::new();
    for i in 0..5 {
        for ev in v.frame(i as f64 * 16.0, &mut sink).events {
            if let StreamEvent::Loaded { index, .. } = ev {
                loaded.push(index);
            }
        }
    }
    assert_eq!(loaded, vec![0, 1, 2]);
    assert_eq!(sink.uploads, vec![(64, 32), (256, 128), (1024, 512)]);
    assert_eq!(
        v.streamer().loader().requests,
        vec!["low.jpg", "mid.jpg", "high.jpg"]
    );
    assert!(v.streamer().is_finished());
}

#[test]
fn oversized_source_is_skipped() {
    let loader = MemoryLoader::default()
        .with("a", 64, 32)
        .with("huge", 8192, 4096)
        .with("b", 128, 64);
    let mut v = viewer(loader);
    v.set_sources("a huge b");
    let mut sink = Sink::new(2048);

    let events: Vec<_> = (0..4)
        .flat_map(|i| v.frame(i as f64 * 16.0, &mut sink).events)
        .collect();
    assert!(events
        .iter()
        .any(|e| matches!(e, StreamEvent::Skipped { index: 1, .. })));
    assert_eq!(sink.uploads, vec![(64, 32), (128, 64)]);
}

#[test]
fn failed_source_keeps_lower_resolution() {
    let loader = MemoryLoader::default().with("a", 64, 32).with("c", 128, 64);
    let mut v = viewer(loader);
    v.set_sources("a missing c");
    let mut sink = Sink::new(4096);

    for i in 0..4 {
        v.frame(i as f64 * 16.0, &mut sink);
    }
    assert_eq!(sink.uploads, vec![(64, 32)]);
    assert!(v.is_ready());
    assert!(v.streamer().is_halted());
    assert!(!v.streamer().loader().requests.contains(&"c".to_string()));
}

#[test]
fn held_key_runs_until_released() {
    let loader = MemoryLoader::default().with("a", 64, 32);
    let mut v = viewer(loader);
    v.set_sources("a");
    let mut sink = Sink::new(4096);

    v.on_key_down(Key::ArrowLeft);
    for i in 0..10 {
        v.frame(i as f64 * 16.0, &mut sink);
    }
    assert_eq!(v.mode(), ViewMode::UserDriven);
    let turned = v.yaw();
    assert!(turned > 0.0);

    v.on_key_up(Key::ArrowLeft);
    for i in 10..400 {
        v.frame(i as f64 * 16.0, &mut sink);
    }
    assert_eq!(v.mode(), ViewMode::Idle);
    assert!(!v.frame(400.0 * 16.0, &mut sink).redraw);
}

#[test]
fn animation_lands_on_target() {
    let mut v = viewer(MemoryLoader::default().with("a", 64, 32));
    v.set_sources("a");
    let mut sink = Sink::new(4096);
    v.frame(0.0, &mut sink);

    v.animate_to(120.0, -20.0, 4.0, Some(500.0), 0.0);
    let mut t = 0.0;
    while v.mode() == ViewMode::Animating {
        t += 16.0;
        v.frame(t, &mut sink);
        assert!(t < 1000.0, "animation never finished");
    }
    assert_eq!((v.yaw(), v.pitch(), v.zoom()), (120.0, -20.0, 4.0));
}
