// Subcommand implementations for the vidmark CLI

use anyhow::{anyhow, bail, Context};
use std::io::Read;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use vidmark_annotate::models::image_to_tensor;
use vidmark_annotate::processing::ingestion::parse_response_str;
use vidmark_annotate::tracking::{HttpTrackingBackend, TrackingBackend, TrackingRequest};
use vidmark_annotate::{
    compress_mask, decompress_mask, Annotation, Bitmap, DirectoryFrameSource, FrameSource,
    IngestReport, Mask, Video, VideoInfo,
};
use vidmark_core::{AnnotatorConfig, Point};

/// Literal value, `@path` for a file, or `-` for stdin.
pub fn read_input(arg: &str) -> anyhow::Result<String> {
    if arg == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path)),
        None => Ok(arg.to_string()),
    }
}

pub fn decode_mask(
    input: &str,
    upscale: Option<(usize, usize)>,
    csv_out: Option<&Path>,
) -> anyhow::Result<Bitmap> {
    let encoded = read_input(input)?;
    let mut bitmap = decompress_mask(encoded.trim())?;
    if let Some((width, height)) = upscale {
        debug!(
            "Upscaling {}x{} mask to {}x{}",
            bitmap.width(),
            bitmap.height(),
            width,
            height
        );
        bitmap = bitmap.resize(width, height)?;
    }

    if let Some(path) = csv_out {
        let file = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        bitmap.write_csv(std::io::BufWriter::new(file))?;
        info!("Wrote mask CSV to {}", path.display());
    }
    Ok(bitmap)
}

pub fn print_bitmap_summary(bitmap: &Bitmap) {
    println!("size: {}x{}", bitmap.width(), bitmap.height());
    println!(
        "foreground: {} ({:.2}%)",
        bitmap.foreground_count(),
        bitmap.foreground_ratio() * 100.0
    );
    match bitmap.bounding_box() {
        Some(bbox) => println!("bbox: {}", bbox),
        None => println!("bbox: none"),
    }
}

/// Read a CSV bitmap and produce its transport encoding, optionally
/// resampled to `width x height` first.
pub fn encode_mask(
    csv_path: &Path,
    width: Option<usize>,
    height: Option<usize>,
) -> anyhow::Result<String> {
    let bitmap = read_bitmap(csv_path)?;
    let bitmap = match (width, height) {
        (Some(w), Some(h)) => bitmap.resize(w, h)?,
        (None, None) => bitmap,
        _ => bail!("--width and --height must be given together"),
    };
    Ok(compress_mask(&Mask::from(&bitmap))?)
}

fn read_bitmap(csv_path: &Path) -> anyhow::Result<Bitmap> {
    let content = std::fs::read_to_string(csv_path)
        .with_context(|| format!("reading {}", csv_path.display()))?;
    Ok(Bitmap::read_csv(&content)?)
}

/// Load a frame listing: either the backend's JSON video document or one
/// label per line.
pub fn load_video(path: &Path, name: Option<&str>) -> anyhow::Result<Video> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;

    if let Ok(mut info) = serde_json::from_str::<VideoInfo>(&content) {
        if let Some(name) = name {
            info.name = name.to_string();
        }
        return Ok(Video::from_info(info)?);
    }

    let frames: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect();
    let name = name.ok_or_else(|| anyhow!("--video is required for plain frame lists"))?;
    Ok(Video::new(name, frames)?)
}

/// Split an annotation id like `Front Desk_2` into type and index.
pub fn parse_object_id(id: &str) -> anyhow::Result<(String, usize)> {
    let (object_type, index) = id
        .rsplit_once('_')
        .ok_or_else(|| anyhow!("object id '{}' is not of the form <type>_<n>", id))?;
    let index: usize = index
        .parse()
        .with_context(|| format!("object id '{}' has a non-numeric index", id))?;
    if object_type.is_empty() || index == 0 {
        bail!("object id '{}' is not of the form <type>_<n>", id);
    }
    Ok((object_type.to_string(), index))
}

/// Replay a saved tracking response against a frame listing. With
/// `object_id`, the boxes are attributed to that annotation instead of the
/// response's own id.
pub fn ingest(
    video: &Video,
    response_path: &Path,
    object_id: Option<&str>,
    initial_frame: usize,
) -> anyhow::Result<IngestReport> {
    let body = std::fs::read_to_string(response_path)
        .with_context(|| format!("reading {}", response_path.display()))?;
    let mut result = parse_response_str(&body)?;
    if let Some(id) = object_id {
        debug!("Attributing {} to {}", result.object_id, id);
        result.object_id = id.to_string();
    }

    let (object_type, type_index) = parse_object_id(&result.object_id)?;
    let mut annotation = Annotation::new(
        initial_frame,
        object_type,
        video.annotation_count(),
        type_index,
        "#808080",
    );
    annotation.add_point(Point::positive(0.5, 0.5))?;
    annotation.confirm()?;
    video.add_annotation(annotation)?;

    Ok(video.apply_tracking(&result, Duration::ZERO)?)
}

pub fn print_boxes(video: &Video) -> anyhow::Result<()> {
    for index in 0..video.frame_count() {
        for entry in video.boxes_for_frame(index) {
            println!(
                "{}\t{}\t{}\t{}",
                index,
                video.frame_label(index)?,
                entry.annotation_id,
                entry.bbox
            );
        }
    }
    Ok(())
}

/// Submit a CSV mask to the configured tracking endpoint and print the reply.
pub async fn submit(
    config: &AnnotatorConfig,
    request: TrackingRequest,
) -> anyhow::Result<serde_json::Value> {
    let backend = HttpTrackingBackend::new(&config.tracking);
    let started = Instant::now();
    let response = backend.submit(&request).await?;
    info!(
        "Tracking backend answered in {:.2}s",
        started.elapsed().as_secs_f64()
    );
    Ok(response)
}

pub fn build_request(
    video: &str,
    frame: &str,
    object_id: &str,
    description: Option<&str>,
    csv_path: &Path,
) -> anyhow::Result<TrackingRequest> {
    let (object_type, _) = parse_object_id(object_id)?;
    let bitmap = read_bitmap(csv_path)?;
    Ok(TrackingRequest {
        space_name: video.to_string(),
        frame_name: frame.to_string(),
        object_id: object_id.to_string(),
        mask: compress_mask(&Mask::from(&bitmap))?,
        description: description.map(str::to_string).unwrap_or(object_type),
    })
}

/// Summary of a frame as the encoder would see it.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInspection {
    pub width: u32,
    pub height: u32,
    pub tensor_shape: Vec<usize>,
    pub tensor_mean: f32,
}

pub async fn inspect_frame(
    config: &AnnotatorConfig,
    dir: &Path,
    label: &str,
) -> anyhow::Result<FrameInspection> {
    let source = DirectoryFrameSource::new(dir);
    let image = source.fetch(label).await?;
    let tensor = image_to_tensor(&image, config.models.encoder_input_size)?;
    let data = tensor.data();
    let mean = data.iter().sum::<f32>() / data.len().max(1) as f32;

    Ok(FrameInspection {
        width: image.width(),
        height: image.height(),
        tensor_shape: tensor.shape().to_vec(),
        tensor_mean: mean,
    })
}

pub fn render_config(config: &AnnotatorConfig, format: &str) -> anyhow::Result<String> {
    match format {
        "json" => Ok(config.to_json()?),
        "toml" => Ok(config.to_toml()?),
        other => bail!("unknown format '{}', expected json or toml", other),
    }
}
