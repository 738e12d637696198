//! Renders a grid of quads headlessly and reports batching statistics.
//!
//! Usage: `quad_stats [QUADS] [TEXTURES] [--gpu] [--frames N] [--out FILE]`
//!
//! Without `--gpu` the CPU recording backend is used, which makes the tool
//! usable on machines without a graphics adapter. `--out` writes the final
//! frame as a PNG and needs `--gpu`.

use std::rc::Rc;

use anyhow::{Context as _, bail};
use cgmath::{Vector2, Vector3};
use dg_engine::{
    QuadSpec, Renderer,
    gpu::{Context, ContextSettings, WgpuBackend},
    graphics::{
        FrameBuffer, FrameBufferSpecification, GraphicsBackend, TextureSpecification,
        recording::{RecordingBackend, RecordingShader},
    },
    math::{self, color},
};
use instant::Instant;

struct Options {
    quads: usize,
    textures: usize,
    frames: usize,
    gpu: bool,
    out: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            quads: 60_000,
            textures: 20,
            frames: 3,
            gpu: false,
            out: None,
        }
    }
}

fn parse_options() -> anyhow::Result<Options> {
    let mut options = Options::default();
    let mut positional = 0;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--gpu" => options.gpu = true,
            "--frames" => {
                options.frames = args.next().context("--frames needs a value")?.parse()?;
            }
            "--out" => options.out = Some(args.next().context("--out needs a file name")?),
            value => {
                match positional {
                    0 => options.quads = value.parse()?,
                    1 => options.textures = value.parse()?,
                    _ => bail!("unexpected argument {value}"),
                }
                positional += 1;
            }
        }
    }
    if options.out.is_some() && !options.gpu {
        bail!("--out needs --gpu");
    }
    Ok(options)
}

/// 2x2 checkerboard in a color derived from `index`.
fn checker_pixels(index: usize) -> Vec<u8> {
    let hue = (index * 47 % 255) as u8;
    let dark = [hue, 255 - hue, 128, 255];
    let light = [255, 255, 255, 255];
    [dark, light, light, dark].concat()
}

/// Submits `options.quads` quads on a square grid filling clip space, one
/// scene per frame, and logs what each scene cost.
fn render_frames<B: GraphicsBackend>(
    renderer: &mut Renderer<B>,
    options: &Options,
    target: Option<&B::FrameBuffer>,
) -> anyhow::Result<()> {
    let mut textures = Vec::with_capacity(options.textures);
    for index in 0..options.textures {
        let texture = renderer.backend_mut().create_texture(
            &format!("checker {index}"),
            &TextureSpecification::with_size(2, 2),
            &checker_pixels(index),
        )?;
        textures.push(Rc::new(texture));
    }

    let columns = (options.quads as f32).sqrt().ceil().max(1.0) as usize;
    let cell = 2.0 / columns as f32;
    let camera = math::orthographic_bounds(-1.0, 1.0, -1.0, 1.0, -1.0, 1.0);

    for frame in 0..options.frames {
        if let Some(target) = target {
            target.clear(&color::from_rgba8(24, 24, 32, 255))?;
        }
        let started = Instant::now();
        renderer.begin_scene_2d(&camera)?;
        for index in 0..options.quads {
            let (row, column) = (index / columns, index % columns);
            let position = Vector3::new(
                -1.0 + cell * (column as f32 + 0.5),
                -1.0 + cell * (row as f32 + 0.5),
                0.0,
            );
            let spec = match textures.get(index % (options.textures + 1)) {
                Some(texture) => QuadSpec::textured(Rc::clone(texture)),
                None => QuadSpec::colored(color::from_rgb5(
                    (index % 32) as i32,
                    (row % 32) as i32,
                    (column % 32) as i32,
                )),
            };
            renderer.submit_quad_2d_at(
                position,
                Vector2::new(cell * 0.9, cell * 0.9),
                0.0,
                &spec.with_entity_id(index as i32),
            )?;
        }
        renderer.end_scene_2d()?;
        let elapsed = started.elapsed();

        log::info!(
            "frame {frame}: {} quads, {} vertices, {} indices, {} batches in {:.2?}",
            options.quads,
            renderer.vertex_count_2d(),
            renderer.index_count_2d(),
            renderer.batch_count_2d(),
            elapsed
        );
    }
    println!(
        "{} quads with {} textures: {} draw calls per frame",
        options.quads,
        options.textures,
        renderer.batch_count_2d()
    );
    Ok(())
}

fn run_recording(options: &Options) -> anyhow::Result<()> {
    let mut renderer = Renderer::new(RecordingBackend::default())?;
    renderer.use_quad_shader_2d(Rc::new(RecordingShader::quad("quad")))?;
    let frame_buffer = Rc::new(
        renderer
            .backend_mut()
            .create_frame_buffer("stats", &FrameBufferSpecification::default()),
    );
    renderer.use_frame_buffer_2d(Some(Rc::clone(&frame_buffer)))?;
    render_frames(&mut renderer, options, Some(frame_buffer.as_ref()))?;

    let (width, height) = frame_buffer.size();
    let picked = frame_buffer.read_entity_id(width / 2, height / 2)?;
    println!("entity under the centre pixel: {picked}");
    Ok(())
}

async fn run_gpu(options: &Options) -> anyhow::Result<()> {
    let ctx = Context::headless(&ContextSettings::default()).await?;
    let backend = WgpuBackend::new(ctx);
    let spec = FrameBufferSpecification::default();
    let frame_buffer = Rc::new(backend.create_frame_buffer("stats", &spec)?);
    let shader = Rc::new(backend.create_quad_shader(&spec));

    let mut renderer = Renderer::new(backend)?;
    renderer.use_quad_shader_2d(shader)?;
    renderer.use_frame_buffer_2d(Some(Rc::clone(&frame_buffer)))?;
    render_frames(&mut renderer, options, Some(frame_buffer.as_ref()))?;

    let (width, height) = frame_buffer.size();
    let picked = frame_buffer.read_entity_id(width / 2, height / 2)?;
    println!("entity under the centre pixel: {picked}");

    if let Some(path) = &options.out {
        frame_buffer.read_pixels()?.save(path)?;
        println!("wrote {path}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let options = parse_options()?;
    if options.gpu {
        run_gpu(&options).await
    } else {
        run_recording(&options)
    }
}
