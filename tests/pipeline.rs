//! End-to-end batch conversion tests.
//!
//! Real images are generated on the fly; scenarios that need an input format
//! this build cannot decode use a stub converter instead.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use fastconvert::{
    BatchConverter, ChannelObserver, Config, ConversionRequest, Converter, FailureReason,
    NameAllocator, NoopObserver, ProgressEvent, StopSignal, TargetFormat,
};

fn write_png(path: &Path, width: u32, height: u32) {
    let image = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 90])
    });
    image.save(path).expect("Failed to write PNG fixture");
}

fn write_jpeg(path: &Path, width: u32, height: u32) {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([10, 120, 200]));
    image.save(path).expect("Failed to write JPEG fixture");
}

fn config(format: TargetFormat, recursive: bool, workers: usize) -> Config {
    let mut config = Config::default();
    config.conversion.format = format;
    config.processing.recursive = recursive;
    config.processing.workers = Some(workers);
    config
}

fn files_in(dir: &Path) -> HashSet<String> {
    fs::read_dir(dir)
        .expect("Failed to list directory")
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

/// Writes a placeholder instead of decoding
struct StubConverter {
    names: NameAllocator,
}

impl Converter for StubConverter {
    fn convert(&self, input: &Path, request: &ConversionRequest) -> Result<PathBuf, FailureReason> {
        let desired = request.desired_output_path(input)?;
        let output = self.names.claim(&desired);
        fs::write(&output, b"converted")?;
        Ok(output)
    }
}

#[tokio::test]
async fn test_flat_directory_to_jpg() {
    let dir = TempDir::new().unwrap();
    write_png(&dir.path().join("a.png"), 8, 8);
    fs::write(dir.path().join("b.heic"), b"heic payload").unwrap();
    fs::write(dir.path().join("c.txt"), b"notes").unwrap();

    let batch = BatchConverter::new(dir.path(), config(TargetFormat::Jpg, false, 2)).unwrap();

    let discovered: HashSet<_> = batch
        .discover()
        .unwrap()
        .into_iter()
        .map(|t| t.path().file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(discovered, HashSet::from(["a.png".to_string(), "b.heic".to_string()]));

    let converter = Arc::new(StubConverter {
        names: NameAllocator::new(),
    });
    let summary = batch
        .run_with_converter(converter, Arc::new(NoopObserver), &StopSignal::new())
        .await
        .unwrap();

    assert_eq!(summary.success_count, 2);
    assert_eq!(summary.failure_count, 0);
    assert!(summary.is_complete());
    assert_eq!(
        files_in(&batch.output_dir()),
        HashSet::from(["a.jpg".to_string(), "b.jpg".to_string()])
    );
}

#[tokio::test]
async fn test_same_name_in_two_subdirectories() {
    let dir = TempDir::new().unwrap();
    for sub in ["first", "second"] {
        fs::create_dir(dir.path().join(sub)).unwrap();
        write_png(&dir.path().join(sub).join("img.png"), 12, 6);
    }

    let batch = BatchConverter::new(dir.path(), config(TargetFormat::Png, true, 4)).unwrap();
    let summary = batch
        .run(Arc::new(NoopObserver), &StopSignal::new())
        .await
        .unwrap();

    assert_eq!(summary.success_count, 2);
    let outputs: HashSet<_> = summary.converted.iter().map(|c| c.output.clone()).collect();
    assert_eq!(outputs.len(), 2);
    assert_eq!(
        files_in(&batch.output_dir()),
        HashSet::from(["img.png".to_string(), "img_1.png".to_string()])
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_dangling_link_fails_alone() {
    let dir = TempDir::new().unwrap();
    write_png(&dir.path().join("good.png"), 8, 8);
    std::os::unix::fs::symlink(dir.path().join("gone.png"), dir.path().join("link.png")).unwrap();

    let batch = BatchConverter::new(dir.path(), config(TargetFormat::Jpg, false, 2)).unwrap();
    let summary = batch
        .run(Arc::new(NoopObserver), &StopSignal::new())
        .await
        .unwrap();

    assert_eq!(summary.success_count, 1);
    assert_eq!(summary.failure_count, 1);
    assert!(summary.is_complete());
    assert!(summary.failures[0].path.ends_with("link.png"));
    assert!(matches!(summary.failures[0].reason, FailureReason::Io { .. }));
}

#[tokio::test]
async fn test_corrupt_file_is_the_only_failure() {
    let dir = TempDir::new().unwrap();
    write_png(&dir.path().join("one.png"), 16, 16);
    write_png(&dir.path().join("two.png"), 16, 16);
    write_jpeg(&dir.path().join("three.jpg"), 16, 16);
    fs::write(dir.path().join("broken.jpg"), b"\xFF\xD8\xFF\xE0 not a real jpeg").unwrap();

    let batch = BatchConverter::new(dir.path(), config(TargetFormat::Webp, false, 3)).unwrap();
    let summary = batch
        .run(Arc::new(NoopObserver), &StopSignal::new())
        .await
        .unwrap();

    assert_eq!(summary.success_count, 3);
    assert_eq!(summary.failure_count, 1);
    assert!(summary.is_complete());

    let failed: Vec<_> = summary.failed_paths().collect();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].ends_with("broken.jpg"));

    let outputs = files_in(&batch.output_dir());
    assert_eq!(outputs.len(), 3);
    assert!(!outputs.contains("broken.webp"));
}

#[tokio::test]
async fn test_worker_count_does_not_change_results() {
    let mut counts = Vec::new();
    for workers in [1, 4] {
        let dir = TempDir::new().unwrap();
        for i in 0..6 {
            write_png(&dir.path().join(format!("photo{i}.png")), 10, 10);
        }
        fs::write(dir.path().join("bad.png"), b"garbage").unwrap();

        let batch = BatchConverter::new(dir.path(), config(TargetFormat::Jpg, false, workers)).unwrap();
        let summary = batch
            .run(Arc::new(NoopObserver), &StopSignal::new())
            .await
            .unwrap();
        counts.push((summary.success_count, summary.failure_count));
    }

    assert_eq!(counts[0], counts[1]);
    assert_eq!(counts[0], (6, 1));
}

#[tokio::test]
async fn test_downscale_and_no_limit() {
    let dir = TempDir::new().unwrap();
    write_png(&dir.path().join("wide.png"), 200, 100);

    let mut bounded = config(TargetFormat::Png, false, 1);
    bounded.conversion.max_dimension = 64;
    let batch = BatchConverter::new(dir.path(), bounded.clone()).unwrap();
    let summary = batch
        .run(Arc::new(NoopObserver), &StopSignal::new())
        .await
        .unwrap();
    let resized = image::open(&summary.converted[0].output).unwrap();
    assert_eq!((resized.width(), resized.height()), (64, 32));

    let mut unbounded = bounded;
    unbounded.conversion.no_limit = true;
    let batch = BatchConverter::new(dir.path(), unbounded).unwrap();
    let summary = batch
        .run(Arc::new(NoopObserver), &StopSignal::new())
        .await
        .unwrap();
    let kept = image::open(&summary.converted[0].output).unwrap();
    assert_eq!((kept.width(), kept.height()), (200, 100));
    assert!(summary.converted[0].output.ends_with("wide_1.png"));
}

#[tokio::test]
async fn test_rerun_ignores_previous_output() {
    let dir = TempDir::new().unwrap();
    write_png(&dir.path().join("a.png"), 8, 8);
    write_png(&dir.path().join("b.png"), 8, 8);

    let batch = BatchConverter::new(dir.path(), config(TargetFormat::Png, true, 2)).unwrap();
    let first = batch.run(Arc::new(NoopObserver), &StopSignal::new()).await.unwrap();
    let second = batch.run(Arc::new(NoopObserver), &StopSignal::new()).await.unwrap();

    assert_eq!(first.total_files, 2);
    assert_eq!(second.total_files, 2);
    assert_eq!(files_in(&batch.output_dir()).len(), 4);
}

#[tokio::test]
async fn test_stopped_run_is_incomplete() {
    let dir = TempDir::new().unwrap();
    for i in 0..3 {
        write_png(&dir.path().join(format!("{i}.png")), 8, 8);
    }

    let stop = StopSignal::new();
    stop.cancel();

    let batch = BatchConverter::new(dir.path(), config(TargetFormat::Jpg, false, 2)).unwrap();
    let summary = batch.run(Arc::new(NoopObserver), &stop).await.unwrap();

    assert!(!summary.is_complete());
    assert_eq!(summary.not_dispatched, 3);
    assert!(files_in(&batch.output_dir()).is_empty());
}

#[tokio::test]
async fn test_observer_sees_every_file_then_summary() {
    let dir = TempDir::new().unwrap();
    for i in 0..4 {
        write_png(&dir.path().join(format!("{i}.png")), 8, 8);
    }

    let (observer, mut events) = ChannelObserver::new();
    let batch = BatchConverter::new(dir.path(), config(TargetFormat::Webp, false, 2)).unwrap();
    batch.run(Arc::new(observer), &StopSignal::new()).await.unwrap();

    let mut finished = 0;
    let mut saw_summary = false;
    while let Ok(event) = events.try_recv() {
        assert!(!saw_summary, "event after the final summary");
        match event {
            ProgressEvent::Started { total_files } => assert_eq!(total_files, 4),
            ProgressEvent::FileFinished { .. } => finished += 1,
            ProgressEvent::Finished { summary } => {
                assert_eq!(summary.success_count, 4);
                saw_summary = true;
            }
        }
    }
    assert_eq!(finished, 4);
    assert!(saw_summary);
}

#[tokio::test]
async fn test_failed_originals_copied_to_errors() {
    let dir = TempDir::new().unwrap();
    write_png(&dir.path().join("good.png"), 8, 8);
    fs::write(dir.path().join("bad.png"), b"nope").unwrap();

    let mut cfg = config(TargetFormat::Jpg, false, 2);
    cfg.processing.copy_failures = true;
    let batch = BatchConverter::new(dir.path(), cfg).unwrap();
    let summary = batch.run(Arc::new(NoopObserver), &StopSignal::new()).await.unwrap();
    let report = batch.copy_failures(&summary).unwrap();

    assert!(report.is_clean());
    assert_eq!(report.copied.len(), 1);
    assert_eq!(
        fs::read(batch.errors_dir().join("bad.png")).unwrap(),
        b"nope"
    );
}
