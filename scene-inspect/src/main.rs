//! Scene description inspector.
//!
//! Imports one or more JSON scene descriptions into a headless viewer,
//! prints merge statistics and optionally replays a pointer script.
//!
//! Usage: cargo run -p scene-inspect -- <scene.json>... [--event click@X,Y]...

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use clap::Parser;
use unionview::common::Aabb;
use unionview::scene::{ModelContainer, RenderObject, SceneSink, SourceNode};
use unionview::{Camera, ModifierKey, Modifiers, PointerEvent, Viewer, ViewerConfig, Viewport};

#[derive(Parser)]
#[command(name = "scene-inspect")]
#[command(about = "Import scene descriptions, report merge statistics and replay pick scripts")]
#[command(version)]
struct Cli {
    /// Scene description files (.json), loaded in order
    #[arg(required = true)]
    scenes: Vec<PathBuf>,

    /// Viewer configuration (.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pointer event as KIND@X,Y, where KIND is click, shift-click, alt-click
    /// or double-click. Repeatable; replayed in order.
    #[arg(short, long = "event")]
    events: Vec<ScriptEvent>,

    /// Viewport width in pixels
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Viewport height in pixels
    #[arg(long, default_value_t = 720)]
    height: u32,
}

#[derive(Debug, Clone)]
struct ScriptEvent {
    label: String,
    event: PointerEvent,
}

impl FromStr for ScriptEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, position) = s
            .split_once('@')
            .ok_or_else(|| format!("expected KIND@X,Y, got `{s}`"))?;
        let (x, y) = position
            .split_once(',')
            .ok_or_else(|| format!("expected X,Y, got `{position}`"))?;
        let x: f32 = x.trim().parse().map_err(|e| format!("bad x `{x}`: {e}"))?;
        let y: f32 = y.trim().parse().map_err(|e| format!("bad y `{y}`: {e}"))?;

        let event = match kind {
            "click" => PointerEvent::click(x, y),
            "shift-click" => PointerEvent::click(x, y).with_modifiers(Modifiers::only(ModifierKey::Shift)),
            "alt-click" => PointerEvent::click(x, y).with_modifiers(Modifiers::only(ModifierKey::Alt)),
            "double-click" => PointerEvent::double_click(x, y),
            other => return Err(format!("unknown event kind `{other}`")),
        };
        Ok(Self {
            label: s.to_string(),
            event,
        })
    }
}

/// Reports render objects instead of uploading them.
struct LogSink;

impl SceneSink for LogSink {
    fn on_objects_added(&mut self, objects: &[RenderObject]) {
        for object in objects {
            log::debug!("render object {} added: {:?}", object.id, object.kind);
        }
    }

    fn on_objects_removed(&mut self, objects: &[RenderObject]) {
        for object in objects {
            log::debug!("render object {} removed: {:?}", object.id, object.kind);
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ViewerConfig::from_path(path)?,
        None => ViewerConfig::default(),
    };
    let mut viewer = Viewer::new(config, Box::new(LogSink));

    for path in &cli.scenes {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let source: SourceNode = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        eprintln!("Loading {}...", path.display());
        let model = viewer
            .import_scene(source)
            .with_context(|| format!("failed to import {}", path.display()))?;
        if let Some(container) = viewer.index().model(model) {
            print_stats(container);
        }
    }

    if cli.events.is_empty() {
        return Ok(());
    }

    let viewport = Viewport::new(cli.width, cli.height);
    let mut camera = Camera {
        aspect: viewport.aspect(),
        ..Camera::default()
    };
    let Some(bounds) = scene_bounds(&viewer) else {
        bail!("nothing visible to pick against");
    };
    camera.fit_to_bounds(&bounds);

    println!();
    println!("Events:");
    for script in &cli.events {
        let picked = viewer.handle_pointer(&script.event, &camera, viewport);
        println!(
            "  {:<24} picked {:<6} scope {:<6} selection {:?}",
            script.label,
            picked.map_or("-".to_string(), |id| id.to_string()),
            viewer
                .scope()
                .group()
                .map_or("world".to_string(), |id| id.to_string()),
            viewer.selection().as_slice(),
        );
    }

    Ok(())
}

fn scene_bounds(viewer: &Viewer) -> Option<Aabb> {
    viewer
        .index()
        .models()
        .map(ModelContainer::bounds)
        .fold(None, Aabb::merge_opt)
}

fn print_stats(container: &ModelContainer) {
    let tree = container.tree();
    println!("Model {}:", container.id());
    println!("  Entities:        {}", tree.len());

    let Some(merger) = container.merger() else {
        println!("  Merged slots:    0 (no mesh leaves, not pickable)");
        return;
    };
    let vertices: usize = merger.fragments().iter().map(|f| f.vertex_count()).sum();
    let bvh = merger.collision().bvh();

    println!("  Merged slots:    {}", merger.slot_count());
    println!("  Fragments:       {} ({} vertices)", merger.fragments().len(), vertices);
    println!("  Outline points:  {}", merger.outline().positions().len());
    println!("  Collision tris:  {}", merger.collision().triangle_count());
    println!("  BVH nodes:       {} (depth {})", bvh.node_count(), bvh.depth());
    if !merger.dropped_attributes().is_empty() {
        println!("  Dropped attribs: {}", merger.dropped_attributes().join(", "));
    }
    println!("  Render objects:  {}", container.render_objects().len());
}
