// main.rs — 窗口 / 事件循环 / 命令行入口

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // 在 Release 模式下隐藏控制台窗口

use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::Vec2;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use winit::{
    dpi::{LogicalSize, PhysicalPosition},
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::{Fullscreen, WindowBuilder},
};

use panorama_viewer::cubemap::{self, ConvertOptions, CubeFace, Interpolation};
use panorama_viewer::input::Key;
use panorama_viewer::render_loop::FrameScheduler;
use panorama_viewer::renderer::Renderer;
use panorama_viewer::software::render_view;
use panorama_viewer::streamer::{decode_file, StreamEvent};
use panorama_viewer::{PanoramaViewer, ViewMode, ViewParams, ViewerConfig};

#[derive(Parser, Debug)]
#[command(name = "panorama_viewer", version, about = "360° equirectangular panorama viewer")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Panorama files, lowest resolution first
    sources: Vec<String>,

    /// JSON file with tuning constants (falls back to $PANORAMA_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, allow_hyphen_values = true)]
    yaw: Option<f32>,

    #[arg(long, allow_hyphen_values = true)]
    pitch: Option<f32>,

    #[arg(long)]
    zoom: Option<f32>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split an equirectangular image into six cube faces
    Cubemap {
        input: PathBuf,
        out_dir: PathBuf,
        /// Face edge in pixels (default: power of two near width / 4)
        #[arg(long, value_parser = cubemap::parse_face_size)]
        face_size: Option<u32>,
        #[arg(long)]
        flip_theta: bool,
        #[arg(long, default_value = "bilinear")]
        interpolation: Interpolation,
    },
    /// Render one view on the CPU and save it
    Render {
        input: PathBuf,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        yaw: f32,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        pitch: f32,
        #[arg(long, default_value_t = 2.0)]
        zoom: f32,
        #[arg(long, default_value_t = 1280)]
        width: u32,
        #[arg(long, default_value_t = 720)]
        height: u32,
        #[arg(short, long, default_value = "view.png")]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Some(Command::Cubemap {
            input,
            out_dir,
            face_size,
            flip_theta,
            interpolation,
        }) => run_cubemap(
            &input,
            &out_dir,
            face_size,
            ConvertOptions {
                flip_theta,
                interpolation,
            },
        ),
        Some(Command::Render {
            input,
            yaw,
            pitch,
            zoom,
            width,
            height,
            output,
        }) => run_render(&input, ViewParams::new(yaw, pitch, zoom, 1.0), width, height, &output),
        None => {
            let config = ViewerConfig::resolve(cli.config.as_deref())?;
            run_viewer(config, cli.sources, cli.yaw, cli.pitch, cli.zoom)
        }
    }
}

fn run_cubemap(
    input: &std::path::Path,
    out_dir: &std::path::Path,
    face_size: Option<u32>,
    options: ConvertOptions,
) -> anyhow::Result<()> {
    let src = decode_file(&input.to_string_lossy())?;
    let faces = cubemap::convert(&src, face_size, &options)?;

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;
    for face in CubeFace::ALL {
        let path = out_dir.join(format!("{}.png", face.name()));
        faces[face.index()]
            .save(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        log::info!("wrote {}", path.display());
    }
    Ok(())
}

fn run_render(
    input: &std::path::Path,
    view: ViewParams,
    width: u32,
    height: u32,
    output: &std::path::Path,
) -> anyhow::Result<()> {
    let src = decode_file(&input.to_string_lossy())?;
    let img = render_view(&src, &view, width, height);
    img.save(output)
        .with_context(|| format!("writing {}", output.display()))?;
    log::info!("wrote {}x{} view to {}", width, height, output.display());
    Ok(())
}

fn run_viewer(
    config: ViewerConfig,
    sources: Vec<String>,
    yaw: Option<f32>,
    pitch: Option<f32>,
    zoom: Option<f32>,
) -> anyhow::Result<()> {
    let event_loop = EventLoop::new();
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Panorama Viewer")
            .with_inner_size(LogicalSize::new(1280, 720))
            .build(&event_loop)
            .context("creating window")?,
    );

    let mut renderer = pollster::block_on(Renderer::new(window.clone(), config.force_power_of_two))?;

    let start = Instant::now();
    let mut scheduler = FrameScheduler::new(config.frame_interval_ms, start);
    let mut show_status_bar = config.show_status_bar;

    let mut viewer = PanoramaViewer::new(config);
    let size = window.inner_size();
    viewer.resize(size.width, size.height);
    if let Some(v) = yaw {
        viewer.set_yaw(v);
    }
    if let Some(v) = pitch {
        viewer.set_pitch(v);
    }
    if let Some(v) = zoom {
        viewer.set_zoom(v);
    }
    if sources.is_empty() {
        log::info!("no sources given; press O or drop a file");
    } else {
        viewer.set_source_list(sources);
    }

    // 交互状态
    let mut cursor = PhysicalPosition::new(0.0f64, 0.0f64);
    let mut touches: Vec<(u64, Vec2)> = Vec::new();

    let now_ms = move |t: Instant| t.duration_since(start).as_secs_f64() * 1000.0;

    event_loop.run(move |event, _, control_flow| {
        match event {
            Event::WindowEvent { event, .. } => {
                // 状态栏只做显示，但 egui 仍需要窗口事件
                let _ = renderer.egui_state.on_event(&renderer.egui_ctx, &event);

                match event {
                    WindowEvent::CloseRequested => {
                        *control_flow = ControlFlow::Exit;
                    }

                    WindowEvent::Resized(new_size) => {
                        renderer.resize(new_size);
                        viewer.resize(new_size.width, new_size.height);
                    }

                    WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                        renderer.resize(*new_inner_size);
                        viewer.resize(new_inner_size.width, new_inner_size.height);
                    }

                    WindowEvent::Focused(false) => viewer.release_all_keys(),

                    // 键盘
                    WindowEvent::KeyboardInput { input, .. } => {
                        let Some(code) = input.virtual_keycode else {
                            return;
                        };
                        let pressed = input.state == ElementState::Pressed;

                        if let Some(key) = map_key(code) {
                            if pressed {
                                viewer.on_key_down(key);
                            } else {
                                viewer.on_key_up(key);
                            }
                            return;
                        }
                        if !pressed {
                            return;
                        }
                        match code {
                            VirtualKeyCode::O => {
                                if let Some(files) = pick_sources() {
                                    viewer.set_source_list(files);
                                    window.request_redraw();
                                }
                            }
                            VirtualKeyCode::F1 => {
                                show_status_bar = !show_status_bar;
                                viewer.invalidate();
                                window.request_redraw();
                            }
                            VirtualKeyCode::F11 => {
                                if window.fullscreen().is_some() {
                                    window.set_fullscreen(None);
                                } else {
                                    window.set_fullscreen(Some(Fullscreen::Borderless(None)));
                                }
                            }
                            _ => {}
                        }
                    }

                    // 鼠标
                    WindowEvent::MouseInput {
                        state,
                        button: MouseButton::Left,
                        ..
                    } => match state {
                        ElementState::Pressed => viewer.on_pointer_down(
                            cursor.x as f32,
                            cursor.y as f32,
                            now_ms(Instant::now()),
                        ),
                        ElementState::Released => viewer.on_pointer_up(),
                    },

                    WindowEvent::CursorMoved { position, .. } => {
                        cursor = position;
                        viewer.on_pointer_move(
                            position.x as f32,
                            position.y as f32,
                            now_ms(Instant::now()),
                        );
                    }

                    WindowEvent::CursorLeft { .. } => viewer.on_pointer_leave(),

                    // winit 的 y 向上为正，与 DOM deltaY 相反
                    WindowEvent::MouseWheel { delta, .. } => match delta {
                        MouseScrollDelta::LineDelta(_, y) => viewer.on_wheel_lines(-y),
                        MouseScrollDelta::PixelDelta(pos) => viewer.on_wheel(-pos.y as f32),
                    },

                    // 触摸
                    WindowEvent::Touch(touch) => {
                        let t = now_ms(Instant::now());
                        let pos = Vec2::new(touch.location.x as f32, touch.location.y as f32);
                        match touch.phase {
                            TouchPhase::Started => {
                                touches.push((touch.id, pos));
                                viewer.on_touch_start(&positions(&touches), t);
                            }
                            TouchPhase::Moved => {
                                if let Some(entry) = touches.iter_mut().find(|(id, _)| *id == touch.id) {
                                    entry.1 = pos;
                                }
                                viewer.on_touch_move(&positions(&touches), t);
                            }
                            TouchPhase::Ended | TouchPhase::Cancelled => {
                                touches.retain(|(id, _)| *id != touch.id);
                                viewer.on_touch_end(&positions(&touches), t);
                            }
                        }
                    }

                    WindowEvent::DroppedFile(path) => {
                        log::info!("dropped {}", path.display());
                        viewer.set_source_list(vec![path.to_string_lossy().into_owned()]);
                        window.request_redraw();
                    }

                    _ => {}
                }
            }

            Event::MainEventsCleared => {
                let now = Instant::now();
                if scheduler.tick_due(now) {
                    let outcome = viewer.frame(now_ms(now), &mut renderer);
                    let stream_changed = !outcome.events.is_empty();
                    for ev in &outcome.events {
                        if let StreamEvent::Loaded { index, width, height, .. } = ev {
                            window.set_title(&format!("Panorama Viewer - {width}x{height} (#{index})"));
                        }
                    }
                    if outcome.redraw || (show_status_bar && stream_changed) {
                        window.request_redraw();
                    }
                }
                if *control_flow != ControlFlow::Exit {
                    *control_flow = ControlFlow::WaitUntil(scheduler.next_deadline());
                }
            }

            Event::RedrawRequested(_) => {
                renderer.update_camera(&viewer.view_params());

                let render_result = renderer.render_with_ui(&window, |ctx| {
                    if show_status_bar {
                        draw_status_bar(ctx, &viewer);
                    }
                });

                match render_result {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => {
                        log::warn!("surface lost, reconfiguring");
                        renderer.resize(renderer.size);
                        viewer.invalidate();
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("GPU out of memory");
                        *control_flow = ControlFlow::Exit;
                    }
                    Err(e) => log::warn!("render error: {:?}", e),
                }
            }

            _ => {}
        }
    });
}

fn map_key(code: VirtualKeyCode) -> Option<Key> {
    Some(match code {
        VirtualKeyCode::Left => Key::ArrowLeft,
        VirtualKeyCode::Right => Key::ArrowRight,
        VirtualKeyCode::Up => Key::ArrowUp,
        VirtualKeyCode::Down => Key::ArrowDown,
        VirtualKeyCode::A => Key::A,
        VirtualKeyCode::D => Key::D,
        VirtualKeyCode::W => Key::W,
        VirtualKeyCode::S => Key::S,
        VirtualKeyCode::Plus | VirtualKeyCode::NumpadAdd => Key::Plus,
        VirtualKeyCode::Equals => Key::Equals,
        VirtualKeyCode::Minus | VirtualKeyCode::NumpadSubtract => Key::Minus,
        _ => return None,
    })
}

fn positions(touches: &[(u64, Vec2)]) -> Vec<Vec2> {
    touches.iter().map(|(_, p)| *p).collect()
}

/// Open-file dialog. Picked files are ordered by size so the smallest streams first.
fn pick_sources() -> Option<Vec<String>> {
    let mut files = rfd::FileDialog::new()
        .add_filter("Images", &["jpg", "jpeg", "png", "bmp", "webp"])
        .pick_files()?;
    files.sort_by_key(|p| std::fs::metadata(p).map(|m| m.len()).unwrap_or(u64::MAX));
    Some(
        files
            .into_iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect(),
    )
}

fn draw_status_bar(ctx: &egui::Context, viewer: &PanoramaViewer) {
    let streamer = viewer.streamer();
    egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            if streamer.is_loading() {
                ui.label(egui::RichText::new("Loading…").color(egui::Color32::YELLOW));
                ui.label("|");
            } else if streamer.is_halted() {
                ui.label(egui::RichText::new("Load failed").color(egui::Color32::RED));
                ui.label("|");
            }

            match streamer.current() {
                Some((index, w, h)) => ui.label(format!(
                    "{}x{} ({}/{})",
                    w,
                    h,
                    index + 1,
                    streamer.sources().len()
                )),
                None => ui.label("No image"),
            };
            ui.label("|");
            ui.label(format!("Yaw: {:.1}°", viewer.yaw()));
            ui.label("|");
            ui.label(format!("Pitch: {:.1}°", viewer.pitch()));
            ui.label("|");
            ui.label(format!("Zoom: {:.2}", viewer.zoom()));

            let mode = match viewer.mode() {
                ViewMode::Idle => "idle",
                ViewMode::UserDriven => "user",
                ViewMode::Animating => "animating",
            };
            ui.label("|");
            ui.label(mode);
        });
    });
}
