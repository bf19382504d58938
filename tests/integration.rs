#[cfg(test)]
mod tests {
    use assert_fs::prelude::*;
    use assert_fs::TempDir;
    use image::{GenericImageView, Rgb, RgbImage};
    use imgbatch::{
        BatchConfig, BatchRunner, CancelToken, FileError, FileStatus, FilterKind, ImageCodec, Operation,
        OperationRegistry, PreflightError, SupportedFormat, SuperResolutionEngine,
    };
    use imgbatch::{ModelConfig, OnnxModelLoader};
    use std::fs;
    use std::path::{Path, PathBuf};

    fn write_image(dir: &TempDir, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.child(name).path().to_path_buf();
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x * 20) as u8, (y * 20) as u8, 128]));
        img.save(&path).unwrap();
        path
    }

    fn offline_engine() -> SuperResolutionEngine {
        SuperResolutionEngine::new(Box::new(OnnxModelLoader::new(ModelConfig {
            path: PathBuf::from("does-not-exist/model.onnx"),
            url: None,
            ..ModelConfig::default()
        })))
    }

    fn run(dir: &Path, config: BatchConfig, operation: Operation) -> Result<imgbatch::BatchResult, PreflightError> {
        let mut engine = offline_engine();
        let mut runner = BatchRunner::new(config, &mut engine, CancelToken::new());
        runner.execute(dir, operation, |_, _| {})
    }

    #[test]
    fn test_resize_sets_exact_dimensions() {
        let temp_dir = TempDir::new().unwrap();
        let wide = write_image(&temp_dir, "wide.png", 30, 10);
        let tall = write_image(&temp_dir, "tall.jpg", 8, 40);

        let result = run(temp_dir.path(), BatchConfig::default(), Operation::Resize { width: 7, height: 13 }).unwrap();

        assert_eq!(result.succeeded, 2);
        assert_eq!(image::open(&wide).unwrap().dimensions(), (7, 13));
        assert_eq!(image::open(&tall).unwrap().dimensions(), (7, 13));
    }

    #[test]
    fn test_resize_skips_images_already_at_size() {
        let temp_dir = TempDir::new().unwrap();
        let same = write_image(&temp_dir, "same.png", 12, 12);
        write_image(&temp_dir, "other.png", 20, 12);
        let before = fs::read(&same).unwrap();

        let result = run(temp_dir.path(), BatchConfig::default(), Operation::Resize { width: 12, height: 12 }).unwrap();

        assert_eq!((result.succeeded, result.skipped, result.failed), (1, 1, 0));
        assert_eq!(fs::read(&same).unwrap(), before);
    }

    #[test]
    fn test_corrupt_file_does_not_stop_batch() {
        let temp_dir = TempDir::new().unwrap();
        write_image(&temp_dir, "a.png", 4, 4);
        temp_dir.child("b.jpg").write_str("definitely not a jpeg").unwrap();
        write_image(&temp_dir, "c.bmp", 4, 4);

        let result = run(temp_dir.path(), BatchConfig::default(), Operation::Resize { width: 2, height: 2 }).unwrap();

        assert_eq!(result.outcomes.len(), 3);
        assert_eq!(result.succeeded + result.failed + result.skipped, result.scanned);
        assert_eq!((result.succeeded, result.failed), (2, 1));

        let failed = &result.outcomes[1];
        assert_eq!(failed.status, FileStatus::Failed);
        assert!(failed.path.ends_with("b.jpg"));
        assert!(matches!(failed.error, Some(FileError::UnreadableFile { .. })));
        temp_dir.child("b.jpg").assert("definitely not a jpeg");
    }

    #[test]
    fn test_outcomes_follow_lexicographic_scan_order() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["c.png", "a.png", "b.png"] {
            write_image(&temp_dir, name, 3, 3);
        }

        let result = run(temp_dir.path(), BatchConfig::default(), Operation::Filter(FilterKind::Grayscale)).unwrap();

        let names: Vec<_> = result
            .outcomes
            .iter()
            .map(|o| o.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.png", "b.png", "c.png"]);
    }

    #[test]
    fn test_convert_skips_files_already_in_target_format() {
        let temp_dir = TempDir::new().unwrap();
        write_image(&temp_dir, "a.png", 4, 4);
        write_image(&temp_dir, "b.jpg", 4, 4);
        write_image(&temp_dir, "c.bmp", 4, 4);

        let result = run(temp_dir.path(), BatchConfig::default(), Operation::Convert(SupportedFormat::Png)).unwrap();

        assert_eq!((result.succeeded, result.skipped, result.failed), (2, 1, 0));
        assert_eq!(result.outcomes[0].status, FileStatus::Skipped);
        temp_dir.child("b.png").assert(predicates::path::exists());
        temp_dir.child("c.png").assert(predicates::path::exists());
        // originals are kept by default
        temp_dir.child("b.jpg").assert(predicates::path::exists());
        assert_eq!(image::ImageFormat::from_path(temp_dir.child("c.png").path()).unwrap(), image::ImageFormat::Png);
        assert_eq!(image::open(temp_dir.child("c.png").path()).unwrap().dimensions(), (4, 4));
    }

    #[test]
    fn test_convert_jpeg_extension_counts_as_jpg() {
        let temp_dir = TempDir::new().unwrap();
        write_image(&temp_dir, "photo.jpeg", 4, 4);

        let result = run(temp_dir.path(), BatchConfig::default(), Operation::Convert(SupportedFormat::Jpg)).unwrap();

        assert_eq!(result.skipped, 1);
        temp_dir.child("photo.jpg").assert(predicates::path::missing());
    }

    #[test]
    fn test_convert_can_remove_originals() {
        let temp_dir = TempDir::new().unwrap();
        write_image(&temp_dir, "a.png", 4, 4);
        let config = BatchConfig { keep_originals: false, ..Default::default() };

        let result = run(temp_dir.path(), config, Operation::Convert(SupportedFormat::Bmp)).unwrap();

        assert_eq!(result.succeeded, 1);
        temp_dir.child("a.png").assert(predicates::path::missing());
        temp_dir.child("a.bmp").assert(predicates::path::exists());
    }

    fn write_solid(dir: &TempDir, name: &str, color: [u8; 3]) -> PathBuf {
        let path = dir.child(name).path().to_path_buf();
        RgbImage::from_pixel(4, 4, Rgb(color)).save(&path).unwrap();
        path
    }

    #[test]
    fn test_convert_never_replaces_another_image_with_the_same_stem() {
        let temp_dir = TempDir::new().unwrap();
        write_solid(&temp_dir, "a.jpg", [255, 0, 0]);
        let blue = write_solid(&temp_dir, "a.png", [0, 0, 255]);
        let blue_bytes = fs::read(&blue).unwrap();
        let config = BatchConfig { keep_originals: false, ..Default::default() };

        let result = run(temp_dir.path(), config, Operation::Convert(SupportedFormat::Bmp)).unwrap();

        assert_eq!((result.succeeded, result.failed), (1, 1));
        assert!(result.outcomes[1].path.ends_with("a.png"));
        assert!(matches!(result.outcomes[1].error, Some(FileError::UnwritableTarget { .. })));

        // a.jpg became a.bmp; a.png was neither converted nor removed
        temp_dir.child("a.jpg").assert(predicates::path::missing());
        assert_eq!(fs::read(&blue).unwrap(), blue_bytes);
        let converted = image::open(temp_dir.child("a.bmp").path()).unwrap().to_rgb8();
        let pixel = converted.get_pixel(1, 1).0;
        assert!(pixel[0] > 200 && pixel[2] < 60, "a.bmp holds {:?}", pixel);
    }

    #[test]
    fn test_convert_keeps_existing_file_at_target_name() {
        let temp_dir = TempDir::new().unwrap();
        let jpg = write_solid(&temp_dir, "a.jpg", [255, 0, 0]);
        let png = write_solid(&temp_dir, "a.png", [0, 0, 255]);
        let png_bytes = fs::read(&png).unwrap();

        let result = run(temp_dir.path(), BatchConfig::default(), Operation::Convert(SupportedFormat::Png)).unwrap();

        assert_eq!((result.succeeded, result.skipped, result.failed), (0, 1, 1));
        assert_eq!(result.outcomes[0].status, FileStatus::Failed);
        assert_eq!(fs::read(&png).unwrap(), png_bytes);
        assert!(jpg.exists());
    }

    #[test]
    fn test_organize_moves_files_by_format_without_touching_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let a = write_image(&temp_dir, "a.jpg", 5, 5);
        let b = write_image(&temp_dir, "b.png", 5, 5);
        let c = write_image(&temp_dir, "c.png", 6, 6);
        let originals: Vec<Vec<u8>> = [&a, &b, &c].iter().map(|p| fs::read(p).unwrap()).collect();

        let result = run(temp_dir.path(), BatchConfig::default(), Operation::Organize).unwrap();

        assert_eq!(result.succeeded, 3);
        assert_eq!(fs::read(temp_dir.child("jpg/a.jpg").path()).unwrap(), originals[0]);
        assert_eq!(fs::read(temp_dir.child("png/b.png").path()).unwrap(), originals[1]);
        assert_eq!(fs::read(temp_dir.child("png/c.png").path()).unwrap(), originals[2]);
        temp_dir.child("a.jpg").assert(predicates::path::missing());
        temp_dir.child("bmp").assert(predicates::path::missing());
    }

    #[test]
    fn test_organize_refuses_to_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        write_image(&temp_dir, "a.png", 4, 4);
        temp_dir.child("png").create_dir_all().unwrap();
        temp_dir.child("png/a.png").write_str("already here").unwrap();

        let result = run(temp_dir.path(), BatchConfig::default(), Operation::Organize).unwrap();

        assert_eq!(result.failed, 1);
        assert!(matches!(result.outcomes[0].error, Some(FileError::MoveFailed { .. })));
        temp_dir.child("a.png").assert(predicates::path::exists());
        temp_dir.child("png/a.png").assert("already here");
    }

    #[test]
    fn test_organize_files_jpeg_extension_under_jpg() {
        let temp_dir = TempDir::new().unwrap();
        let photo = write_image(&temp_dir, "photo.jpeg", 4, 4);
        let bytes = fs::read(&photo).unwrap();

        let result = run(temp_dir.path(), BatchConfig::default(), Operation::Organize).unwrap();

        assert_eq!(result.succeeded, 1);
        assert_eq!(fs::read(temp_dir.child("jpg/photo.jpeg").path()).unwrap(), bytes);
        temp_dir.child("jpeg").assert(predicates::path::missing());
    }

    #[test]
    fn test_recursive_organize_skips_already_organized_files() {
        let temp_dir = TempDir::new().unwrap();
        temp_dir.child("png").create_dir_all().unwrap();
        write_image(&temp_dir, "png/done.png", 4, 4);
        write_image(&temp_dir, "new.png", 4, 4);
        let config = BatchConfig { recursive: true, ..Default::default() };

        let result = run(temp_dir.path(), config, Operation::Organize).unwrap();

        assert_eq!((result.succeeded, result.skipped), (1, 1));
        temp_dir.child("png/new.png").assert(predicates::path::exists());
    }

    #[test]
    fn test_scan_is_not_recursive_by_default() {
        let temp_dir = TempDir::new().unwrap();
        temp_dir.child("nested").create_dir_all().unwrap();
        write_image(&temp_dir, "nested/deep.png", 4, 4);
        write_image(&temp_dir, "top.png", 4, 4);

        let flat = run(temp_dir.path(), BatchConfig::default(), Operation::Filter(FilterKind::Grayscale)).unwrap();
        assert_eq!(flat.scanned, 1);

        let config = BatchConfig { recursive: true, ..Default::default() };
        let deep = run(temp_dir.path(), config, Operation::Filter(FilterKind::Grayscale)).unwrap();
        assert_eq!(deep.scanned, 2);
    }

    #[test]
    fn test_filter_grayscale_and_brightness() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_image(&temp_dir, "a.png", 4, 4);

        run(temp_dir.path(), BatchConfig::default(), Operation::Filter(FilterKind::Brightness(0.0))).unwrap();
        let dark = image::open(&path).unwrap().to_rgb8();
        assert!(dark.pixels().all(|p| p.0 == [0, 0, 0]));

        run(temp_dir.path(), BatchConfig::default(), Operation::Filter(FilterKind::Grayscale)).unwrap();
        assert_eq!(image::open(&path).unwrap().color(), image::ColorType::L8);
    }

    #[test]
    fn test_out_of_range_filter_fails_preflight() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_image(&temp_dir, "a.png", 4, 4);
        let before = fs::read(&path).unwrap();

        let err = OperationRegistry::new().resolve("filter", &["brightness", "3.0"]).unwrap_err();

        assert!(matches!(err, PreflightError::InvalidParameter { ref name, .. } if name == "value"));
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_missing_directory_fails_preflight() {
        let err = run(Path::new("/no/such/dir"), BatchConfig::default(), Operation::Organize).unwrap_err();
        assert!(matches!(err, PreflightError::DirectoryNotFound(_)));
    }

    #[test]
    fn test_directory_without_images_fails_preflight() {
        let temp_dir = TempDir::new().unwrap();
        temp_dir.child("notes.txt").write_str("hello").unwrap();
        temp_dir.child("anim.gif").write_str("GIF89a").unwrap();

        let err = run(temp_dir.path(), BatchConfig::default(), Operation::Organize).unwrap_err();
        assert!(matches!(err, PreflightError::NoImagesFound(_)));
        temp_dir.child("notes.txt").assert("hello");
    }

    #[test]
    fn test_interrupt_keeps_partial_result() {
        let temp_dir = TempDir::new().unwrap();
        let paths: Vec<PathBuf> = (0..5)
            .map(|i| write_image(&temp_dir, &format!("img{}.png", i), 4, 4))
            .collect();
        let untouched = fs::read(&paths[2]).unwrap();

        let cancel = CancelToken::new();
        let mut engine = offline_engine();
        let mut runner = BatchRunner::new(BatchConfig::default(), &mut engine, cancel.clone());
        let mut reported = Vec::new();

        let result = runner
            .execute(temp_dir.path(), Operation::Resize { width: 2, height: 2 }, |done, total| {
                reported.push((done, total));
                if done == 2 {
                    cancel.cancel();
                }
            })
            .unwrap();

        assert!(result.interrupted);
        assert_eq!(result.outcomes.len(), 2);
        assert_eq!(result.scanned, 5);
        assert_eq!(reported, [(1, 5), (2, 5)]);
        assert_eq!(image::open(&paths[1]).unwrap().dimensions(), (2, 2));
        assert_eq!(fs::read(&paths[2]).unwrap(), untouched);
    }

    #[test]
    fn test_progress_reported_for_every_file() {
        let temp_dir = TempDir::new().unwrap();
        write_image(&temp_dir, "a.png", 4, 4);
        temp_dir.child("b.png").write_str("broken").unwrap();
        write_image(&temp_dir, "c.png", 4, 4);

        let mut engine = offline_engine();
        let mut runner = BatchRunner::new(BatchConfig::default(), &mut engine, CancelToken::new());
        let mut reported = Vec::new();
        let result = runner
            .execute(temp_dir.path(), Operation::Convert(SupportedFormat::Png), |done, total| {
                reported.push((done, total))
            })
            .unwrap();

        assert_eq!(reported, [(1, 3), (2, 3), (3, 3)]);
        assert_eq!(result.skipped, 3);
        assert!(!result.interrupted);
    }

    #[test]
    fn test_codec_rejects_non_images() {
        let temp_dir = TempDir::new().unwrap();
        let fake = temp_dir.child("fake.png");
        fake.write_str("plain text").unwrap();

        let err = ImageCodec::default().load(fake.path()).unwrap_err();
        assert!(matches!(err, FileError::UnreadableFile { .. }));
    }

    #[test]
    fn test_codec_save_reports_unwritable_target() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_image(&temp_dir, "a.png", 4, 4);
        let codec = ImageCodec::default();
        let handle = codec.load(&path).unwrap();
        assert_eq!(handle.format, SupportedFormat::Png);

        let target = temp_dir.child("missing/dir/out.png");
        let err = codec.save(&handle.image, target.path(), SupportedFormat::Png).unwrap_err();
        assert!(matches!(err, FileError::UnwritableTarget { .. }));
    }

    #[test]
    fn test_codec_writes_alpha_images_as_jpeg() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.child("out.jpg");
        let rgba = image::DynamicImage::ImageRgba8(image::RgbaImage::new(3, 3));

        ImageCodec::new(80).save(&rgba, target.path(), SupportedFormat::Jpg).unwrap();

        assert_eq!(image::open(target.path()).unwrap().dimensions(), (3, 3));
    }

    #[test]
    fn test_codec_save_replaces_existing_file_without_leftovers() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_image(&temp_dir, "a.png", 4, 4);
        let replacement = image::DynamicImage::ImageRgb8(RgbImage::new(9, 2));

        ImageCodec::default().save(&replacement, &path, SupportedFormat::Png).unwrap();

        assert_eq!(image::open(&path).unwrap().dimensions(), (9, 2));
        let entries: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().filter_map(|e| e.ok()).collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_codec_failed_replace_keeps_existing_target() {
        let temp_dir = TempDir::new().unwrap();
        // a non-empty directory cannot be replaced by a file
        temp_dir.child("busy.png").create_dir_all().unwrap();
        temp_dir.child("busy.png/keep.txt").write_str("keep").unwrap();
        let blank = image::DynamicImage::ImageRgb8(RgbImage::new(2, 2));

        let err = ImageCodec::default()
            .save(&blank, temp_dir.child("busy.png").path(), SupportedFormat::Png)
            .unwrap_err();

        assert!(matches!(err, FileError::UnwritableTarget { .. }));
        temp_dir.child("busy.png/keep.txt").assert("keep");
        let entries: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().filter_map(|e| e.ok()).collect();
        assert_eq!(entries.len(), 1);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_in_place_save_leaves_original_intact() {
        use std::io::Write;
        use std::process::{Command, Stdio};

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.child("noise.png").path().to_path_buf();
        let mut seed: u32 = 12345;
        RgbImage::from_fn(200, 200, |_, _| {
            let mut channel = || {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
                (seed >> 16) as u8
            };
            Rgb([channel(), channel(), channel()])
        })
        .save(&path)
        .unwrap();
        let before = fs::read(&path).unwrap();
        assert!(before.len() > 64 * 1024);

        // Cap file writes at 16 blocks so the re-encoded image cannot be written.
        let mut child = Command::new("sh")
            .arg("-c")
            .arg("trap '' XFSZ; ulimit -f 16; exec \"$0\" --directory \"$1\"")
            .arg(env!("CARGO_BIN_EXE_imgbatch"))
            .arg(temp_dir.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        child
            .stdin
            .take()
            .unwrap()
            .write_all(b"filter brightness 1.5\nexit\n")
            .unwrap();
        let output = child.wait_with_output().unwrap();

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("1 failed"), "stdout: {}", stdout);
        assert_eq!(fs::read(&path).unwrap(), before);
        let entries: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().filter_map(|e| e.ok()).collect();
        assert_eq!(entries.len(), 1);
    }
}
