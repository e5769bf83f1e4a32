//! Command implementations. Each returns the process exit code.

use crate::context::Context;
use anyhow::Context as _;
use serde_json::json;
use slimsnap_cli::output::{format_count, format_dimensions, format_reduction, format_size, Status};
use slimsnap_cli::progress::{finish_error, finish_success, hidden, image_progress, progress_sink};
use slimsnap_core::error::exit_codes;
use slimsnap_image::{detect_format, extract_metadata, is_allowed_mime, recommend_settings, CompressionSettings, ImageFormat, UseCase};
use slimsnap_quota::clock::format_millis;
use slimsnap_session::{unsupported, ItemOutcome, SourceFile, WorkingSet, OUTPUT_PREFIX};
use slimsnap_telemetry::{metrics, names, Event, Timer};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub struct CompressArgs {
    pub paths: Vec<PathBuf>,
    pub quality: u8,
    pub max_width: u32,
    pub max_height: u32,
    pub out_dir: Option<PathBuf>,
    pub parallel: bool,
    pub metrics: bool,
    pub json: bool,
}

/// Output paths handed out during one run, so no two images share a file.
#[derive(Debug, Default)]
struct OutputPaths {
    claimed: HashSet<PathBuf>,
}

impl OutputPaths {
    /// `dir/name`, or `dir/<stem>-<n>.<ext>` when an earlier image took it.
    fn claim(&mut self, dir: &Path, name: &str) -> PathBuf {
        let candidate = dir.join(name);
        if self.claimed.insert(candidate.clone()) {
            return candidate;
        }

        let file = Path::new(name);
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        let ext = file
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        (1u32..)
            .map(|n| dir.join(format!("{stem}-{n}{ext}")))
            .find(|path| self.claimed.insert(path.clone()))
            .unwrap_or(candidate)
    }
}

/// Expand directories into the image files beneath them, leaving out
/// earlier `compressed_*` outputs.
fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(
                WalkDir::new(path)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .filter(|e| !e.file_name().to_string_lossy().starts_with(OUTPUT_PREFIX))
                    .filter(|e| {
                        e.path()
                            .extension()
                            .and_then(|ext| ext.to_str())
                            .and_then(ImageFormat::from_extension)
                            .is_some()
                    })
                    .map(|e| e.into_path()),
            );
        } else {
            files.push(path.clone());
        }
    }
    files
}

pub fn compress(ctx: &Context, args: &CompressArgs) -> anyhow::Result<i32> {
    let settings = CompressionSettings {
        quality: args.quality,
        max_width: args.max_width,
        max_height: args.max_height,
    };
    settings.validate().map_err(slimsnap_core::Error::from)?;

    let paths = collect_files(&args.paths);
    if paths.is_empty() {
        Status::warning("No image files found");
        return Ok(exit_codes::FAILURE);
    }

    let mut sources = Vec::with_capacity(paths.len());
    let mut source_dirs = Vec::new();
    for path in &paths {
        let file = SourceFile::from_path(path)?;
        if is_allowed_mime(&file.mime) {
            source_dirs.push(path.parent().map(Path::to_path_buf).unwrap_or_default());
        }
        sources.push(file);
    }

    let mut set = WorkingSet::new(ctx.tracker(), ctx.tier)
        .with_policy(ctx.policy())
        .with_engine(ctx.engine())
        .with_parallel(args.parallel);

    let added = set.add_files(sources)?;
    for file in &added.rejected {
        Status::warning(&unsupported(file).message);
    }
    if set.is_empty() {
        Status::warning("No supported images to compress");
        return Ok(exit_codes::FAILURE);
    }
    let out_dirs: HashMap<String, PathBuf> = added.added.into_iter().zip(source_dirs).collect();

    metrics().gauge(names::BATCH_SIZE, set.len() as u64);
    let pb = if args.json { hidden() } else { image_progress(set.len()) };
    let timer = Timer::start("batch_ms");
    let outcomes = match set.process(&settings, progress_sink(&pb)) {
        Ok(outcomes) => outcomes,
        Err(e) => {
            finish_error(&pb, "Not allowed");
            return Err(e.into());
        }
    };
    let elapsed = timer.stop();
    finish_success(&pb, "Done");

    if let Some(dir) = &args.out_dir {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let mut report = Vec::with_capacity(outcomes.len());
    let mut output_paths = OutputPaths::default();
    let mut failed = 0;
    for (record, outcome) in set.records().iter().zip(&outcomes) {
        let mut output_path = None;
        match outcome {
            ItemOutcome::Compressed {
                original_bytes,
                compressed_bytes,
                elapsed_ms,
            } => {
                let m = metrics();
                m.increment(names::IMAGES_COMPRESSED);
                m.increment_by(
                    names::BYTES_SAVED,
                    original_bytes.saturating_sub(*compressed_bytes) as u64,
                );
                m.histogram(names::COMPRESS_MS, *elapsed_ms as f64);

                if let Some(processed) = record.processed() {
                    let dir = args
                        .out_dir
                        .clone()
                        .or_else(|| out_dirs.get(record.id()).cloned())
                        .unwrap_or_default();
                    let path = output_paths.claim(&dir, &record.output_name());
                    std::fs::write(&path, &processed.payload.bytes)
                        .with_context(|| format!("Failed to write {}", path.display()))?;

                    if !args.json {
                        Status::success(&format!(
                            "{} {} {}",
                            record.name(),
                            format_reduction(*original_bytes as u64, *compressed_bytes as u64),
                            format_dimensions(processed.width, processed.height),
                        ));
                    }
                    output_path = Some(path);
                }
            }
            ItemOutcome::Failed { reason } => {
                failed += 1;
                metrics().increment(names::IMAGES_FAILED);
                if !args.json {
                    Status::error(&format!("{}: {}", record.name(), reason));
                }
            }
            ItemOutcome::Skipped | ItemOutcome::Cancelled => {}
        }

        report.push(json!({
            "id": record.id(),
            "name": record.name(),
            "output": output_path,
            "result": outcome,
        }));
    }

    let summary = set.summary();
    let remaining = set.tracker().remaining_processing(ctx.tier);
    Event::new("batch_completed", json!({ "summary": summary, "elapsed_ms": elapsed.as_millis() as u64 })).log();

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "images": report,
                "summary": summary,
                "remaining": remaining,
            }))?
        );
    } else {
        Status::header("Summary");
        Status::field("Compressed", &format_count(summary.processed, "image", "images"));
        Status::field(
            "Size",
            &format_reduction(summary.original_bytes, summary.compressed_bytes),
        );
        Status::field("Remaining quota", &remaining.to_string());
    }

    if args.metrics {
        println!("{}", serde_json::to_string_pretty(&metrics().export_json())?);
    }

    Ok(if failed > 0 {
        exit_codes::PARTIAL_FAILURE
    } else {
        exit_codes::SUCCESS
    })
}

pub fn usage(ctx: &Context, json: bool) -> anyhow::Result<i32> {
    let tracker = ctx.tracker();
    let usage = tracker.usage();
    let remaining = tracker.remaining_processing(ctx.tier);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "scope": ctx.scope.to_string(),
                "tier": ctx.tier,
                "usage": usage,
                "remaining": remaining,
                "limits": tracker.limits(),
            }))?
        );
        return Ok(exit_codes::SUCCESS);
    }

    Status::header("Usage");
    Status::field("Scope", &ctx.scope.to_string());
    Status::field("Tier", if ctx.tier.is_premium() { "premium" } else { "free" });
    Status::field("Processed today", &usage.images_processed.to_string());
    Status::field("Remaining", &remaining.to_string());
    Status::field("Session started", &format_millis(usage.session_start));
    Status::field("Resets at", &format_millis(usage.daily_reset_time));
    Ok(exit_codes::SUCCESS)
}

pub fn check(
    ctx: &Context,
    count: usize,
    quality: u8,
    max_width: u32,
    max_height: u32,
    json: bool,
) -> anyhow::Result<i32> {
    let mut decision = ctx
        .policy()
        .evaluate(count, quality, max_width, max_height, ctx.tier);
    if decision.allowed {
        decision = ctx.tracker().can_process(ctx.tier, count);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
    } else if decision.allowed {
        Status::success(&format!("{} allowed", format_count(count, "image", "images")));
    } else {
        Status::error(&decision.reason);
    }

    Ok(if decision.allowed {
        exit_codes::SUCCESS
    } else {
        exit_codes::POLICY_DENIED
    })
}

pub fn recommend(path: &Path, use_case: UseCase, json: bool) -> anyhow::Result<i32> {
    let size = std::fs::metadata(path)
        .with_context(|| format!("Failed to read {}", path.display()))?
        .len();
    let settings = recommend_settings(size as usize, use_case);

    if json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(exit_codes::SUCCESS);
    }

    let cap = |v: u32| if v == 0 { "no cap".to_string() } else { format!("{v}px") };
    Status::header(&format!("Recommended for {use_case}"));
    Status::field("File size", &format_size(size));
    Status::field("Quality", &format!("{}%", settings.quality));
    Status::field("Max width", &cap(settings.max_width));
    Status::field("Max height", &cap(settings.max_height));
    Ok(exit_codes::SUCCESS)
}

pub fn detect(path: &Path, json: bool) -> anyhow::Result<i32> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let format = detect_format(&data).map_err(slimsnap_core::Error::from)?;
    let meta = extract_metadata(&data);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "format": format,
                "mime": format.mime_type(),
                "width": meta.as_ref().map(|m| m.width),
                "height": meta.as_ref().map(|m| m.height),
                "size_bytes": data.len(),
                "upload_allowed": format.is_upload_allowed(),
            }))?
        );
        return Ok(exit_codes::SUCCESS);
    }

    Status::field("Format", &format!("{format:?}"));
    Status::field("MIME", format.mime_type());
    Status::field("Extensions", &format.extensions().join(", "));
    if let Some(meta) = &meta {
        Status::field("Dimensions", &format_dimensions(meta.width, meta.height));
    }
    Status::field("Size", &format_size(data.len() as u64));
    Status::field("Upload allowed", if format.is_upload_allowed() { "yes" } else { "no" });
    Ok(exit_codes::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_paths_disambiguate() {
        let mut paths = OutputPaths::default();
        let dir = Path::new("out");

        assert_eq!(paths.claim(dir, "compressed_a.jpg"), dir.join("compressed_a.jpg"));
        assert_eq!(paths.claim(dir, "compressed_a.jpg"), dir.join("compressed_a-1.jpg"));
        assert_eq!(paths.claim(dir, "compressed_a.jpg"), dir.join("compressed_a-2.jpg"));
        assert_eq!(paths.claim(Path::new("other"), "compressed_a.jpg"), Path::new("other").join("compressed_a.jpg"));
    }
}
