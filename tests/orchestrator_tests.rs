#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use phonescan::recognition::{EngineEvent, EnginePhase, TextRecognizer};
    use phonescan::{ImageFile, JobState, Orchestrator, PipelineConfig};

    /// One scripted engine call: optional Recognizing-phase progress events
    /// followed by a success or failure.
    enum MockCall {
        Succeed { text: String, progress: Vec<f32> },
        Fail { message: String, progress: Vec<f32> },
    }

    impl MockCall {
        fn text(text: &str) -> Self {
            MockCall::Succeed {
                text: text.to_string(),
                progress: vec![0.5, 1.0],
            }
        }
    }

    /// Recognition engine substitute driven by a per-call script queue.
    ///
    /// Also asserts it is never invoked concurrently: the orchestrator must
    /// hold the engine exclusively for one job's recognition step at a time.
    /// A violated exclusivity check panics inside the call, which surfaces as
    /// a Failed job.
    struct MockRecognizer {
        script: Mutex<VecDeque<MockCall>>,
        in_call: AtomicBool,
        calls: AtomicUsize,
        delay: std::time::Duration,
    }

    impl MockRecognizer {
        fn new(script: Vec<MockCall>) -> Arc<Self> {
            Self::with_delay(script, 0)
        }

        /// A non-zero delay keeps each call in flight long enough for an
        /// unserialized second caller to overlap with it.
        fn with_delay(script: Vec<MockCall>, delay_ms: u64) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                in_call: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
                delay: std::time::Duration::from_millis(delay_ms),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TextRecognizer for MockRecognizer {
        fn recognize_raw(
            &self,
            _image: &[u8],
            events: &mut dyn FnMut(EngineEvent),
        ) -> anyhow::Result<String> {
            assert!(
                !self.in_call.swap(true, Ordering::SeqCst),
                "recognition engine invoked concurrently"
            );
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }

            events(EngineEvent {
                phase: EnginePhase::Initializing,
                progress: 0.0,
            });

            let call = self.script.lock().unwrap().pop_front();
            let result = match call {
                Some(MockCall::Succeed { text, progress }) => {
                    for fraction in progress {
                        events(EngineEvent {
                            phase: EnginePhase::Recognizing,
                            progress: fraction,
                        });
                    }
                    Ok(text)
                }
                Some(MockCall::Fail { message, progress }) => {
                    for fraction in progress {
                        events(EngineEvent {
                            phase: EnginePhase::Recognizing,
                            progress: fraction,
                        });
                    }
                    Err(anyhow::anyhow!("{}", message))
                }
                None => Err(anyhow::anyhow!("recognition engine unavailable")),
            };

            self.in_call.store(false, Ordering::SeqCst);
            result
        }
    }

    fn png_file(name: &str) -> ImageFile {
        let image = RgbaImage::from_pixel(4, 4, Rgba([100, 100, 100, 255]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image)
            .write_to(&mut out, ImageFormat::Png)
            .expect("PNG encoding should succeed in tests");
        ImageFile::new(name, out.into_inner())
    }

    fn orchestrator(engine: Arc<MockRecognizer>, config: PipelineConfig) -> Orchestrator {
        Orchestrator::new(engine, config).expect("config should be valid")
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let engine = MockRecognizer::new(vec![]);
        let config = PipelineConfig {
            max_images: 0,
            ..Default::default()
        };
        assert!(Orchestrator::new(engine, config).is_err());
    }

    #[test]
    fn test_submit_publishes_pending_placeholders_immediately() {
        let engine = MockRecognizer::new(vec![]);
        let orch = orchestrator(engine, PipelineConfig::default());

        let ids = orch.submit(vec![png_file("a.png"), png_file("b.png"), png_file("c.png")]);
        assert_eq!(ids.len(), 3);

        let snapshots = orch.snapshots();
        assert_eq!(snapshots.len(), 3);
        assert_eq!(snapshots[0].source_name, "a.png");
        assert_eq!(snapshots[1].source_name, "b.png");
        assert_eq!(snapshots[2].source_name, "c.png");
        for (id, snap) in ids.iter().zip(&snapshots) {
            assert_eq!(*id, snap.id);
            assert_eq!(snap.state, JobState::Pending);
            assert_eq!(snap.progress, 0);
            assert!(snap.recognized_text.is_none());
            assert!(snap.numbers.is_empty());
            assert!(snap.failure_reason.is_none());
        }
    }

    #[test]
    fn test_submit_truncates_excess_files_silently() {
        let engine = MockRecognizer::new(vec![]);
        let config = PipelineConfig {
            max_images: 2,
            ..Default::default()
        };
        let orch = orchestrator(engine, config);

        let ids = orch.submit(vec![png_file("1.png"), png_file("2.png"), png_file("3.png")]);
        assert_eq!(ids.len(), 2);
        assert_eq!(orch.snapshots().len(), 2);
        assert_eq!(orch.snapshots()[1].source_name, "2.png");
    }

    #[tokio::test]
    async fn test_batch_completes_in_submission_order() {
        let engine = MockRecognizer::new(vec![
            MockCall::text("Contact: 9876543210"),
            MockCall::text("+91 8123456789"),
            MockCall::text("office 09998887776"),
        ]);
        let orch = orchestrator(engine.clone(), PipelineConfig::default());

        orch.submit(vec![png_file("a.png"), png_file("b.png"), png_file("c.png")]);
        let processed = orch.process_pending().await;
        assert_eq!(processed, 3);
        assert_eq!(engine.call_count(), 3);

        let snapshots = orch.snapshots();
        // Scripted texts are consumed in call order, so per-job numbers prove
        // processing happened in submission order.
        assert_eq!(snapshots[0].numbers, vec!["919876543210"]);
        assert_eq!(snapshots[1].numbers, vec!["918123456789"]);
        assert_eq!(snapshots[2].numbers, vec!["919998887776"]);
        for snap in &snapshots {
            assert_eq!(snap.state, JobState::Completed);
            assert_eq!(snap.progress, 100);
            assert!(snap.recognized_text.is_some());
            assert!(snap.failure_reason.is_none());
        }
    }

    #[tokio::test]
    async fn test_completed_job_may_have_zero_numbers() {
        let engine = MockRecognizer::new(vec![MockCall::text("no numbers in this scan")]);
        let orch = orchestrator(engine, PipelineConfig::default());

        orch.submit(vec![png_file("empty.png")]);
        orch.process_pending().await;

        let snap = &orch.snapshots()[0];
        assert_eq!(snap.state, JobState::Completed);
        assert_eq!(
            snap.recognized_text.as_deref(),
            Some("no numbers in this scan")
        );
        assert!(snap.numbers.is_empty());
    }

    #[tokio::test]
    async fn test_sibling_failure_does_not_abort_batch() {
        // Job 2 carries undecodable bytes and fails in enhancement, so the
        // engine script only serves jobs 1 and 3.
        let engine = MockRecognizer::new(vec![
            MockCall::text("9876543210"),
            MockCall::text("8123456789"),
        ]);
        let orch = orchestrator(engine.clone(), PipelineConfig::default());

        orch.submit(vec![
            png_file("good-1.png"),
            ImageFile::new("broken.bin", b"not an image at all".to_vec()),
            png_file("good-2.png"),
        ]);
        let processed = orch.process_pending().await;
        assert_eq!(processed, 3);
        assert_eq!(engine.call_count(), 2);

        let snapshots = orch.snapshots();
        assert_eq!(snapshots[0].state, JobState::Completed);
        assert_eq!(snapshots[2].state, JobState::Completed);

        let failed = &snapshots[1];
        assert_eq!(failed.state, JobState::Failed);
        let reason = failed.failure_reason.as_deref().unwrap();
        assert!(reason.starts_with("[DECODE]"), "reason: {}", reason);
        assert!(failed.recognized_text.is_none());
        assert!(failed.numbers.is_empty());
    }

    #[tokio::test]
    async fn test_recognition_failure_keeps_last_known_progress() {
        let engine = MockRecognizer::new(vec![
            MockCall::Fail {
                message: "model crashed".to_string(),
                progress: vec![0.2, 0.9, 0.4],
            },
            MockCall::text("8123456789"),
        ]);
        let orch = orchestrator(engine, PipelineConfig::default());

        orch.submit(vec![png_file("a.png"), png_file("b.png")]);
        orch.process_pending().await;

        let snapshots = orch.snapshots();
        let failed = &snapshots[0];
        assert_eq!(failed.state, JobState::Failed);
        // Progress is monotonic: the trailing 0.4 event must not pull the
        // recorded value back below 90.
        assert_eq!(failed.progress, 90);
        assert_eq!(
            failed.failure_reason.as_deref(),
            Some("[RECOGNITION] model crashed")
        );
        assert!(failed.recognized_text.is_none());

        assert_eq!(snapshots[1].state, JobState::Completed);
        assert_eq!(snapshots[1].numbers, vec!["918123456789"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_overlapping_process_calls_are_serialized() {
        let engine = MockRecognizer::with_delay(
            vec![
                MockCall::text("9876543210"),
                MockCall::text("8123456789"),
                MockCall::text("7012345678"),
                MockCall::text("6012345678"),
            ],
            25,
        );
        let orch = Arc::new(orchestrator(engine.clone(), PipelineConfig::default()));
        orch.submit(vec![
            png_file("a.png"),
            png_file("b.png"),
            png_file("c.png"),
            png_file("d.png"),
        ]);

        let first = tokio::spawn({
            let orch = Arc::clone(&orch);
            async move { orch.process_pending().await }
        });
        let second = tokio::spawn({
            let orch = Arc::clone(&orch);
            async move { orch.process_pending().await }
        });
        let total = first.await.unwrap() + second.await.unwrap();

        // Between them the two callers drain the queue exactly once, and the
        // engine's exclusivity check confirms the calls never overlapped; a
        // violation would panic the call and leave a Failed job behind.
        assert_eq!(total, 4);
        assert_eq!(engine.call_count(), 4);
        for snap in orch.snapshots() {
            assert_eq!(snap.state, JobState::Completed, "{}", snap.source_name);
        }
    }

    #[tokio::test]
    async fn test_systemic_engine_failure_fails_jobs_individually() {
        // Empty script: every recognition call errors out, as if the engine
        // could not be constructed at all. The batch must not abort.
        let engine = MockRecognizer::new(vec![]);
        let orch = orchestrator(engine, PipelineConfig::default());

        orch.submit(vec![png_file("a.png"), png_file("b.png"), png_file("c.png")]);
        let processed = orch.process_pending().await;
        assert_eq!(processed, 3);

        for snap in orch.snapshots() {
            assert_eq!(snap.state, JobState::Failed);
            assert!(snap
                .failure_reason
                .as_deref()
                .unwrap()
                .starts_with("[RECOGNITION]"));
        }
    }

    #[tokio::test]
    async fn test_combined_numbers_dedup_across_jobs() {
        let engine = MockRecognizer::new(vec![
            MockCall::text("9876543210"),
            MockCall::text("+91 9876543210 and 8123456789"),
        ]);
        let orch = orchestrator(engine, PipelineConfig::default());

        orch.submit(vec![png_file("a.png"), png_file("b.png")]);
        orch.process_pending().await;

        // Per-job lists keep their own dedup scope; the combined view merges
        // in job order, first seen wins.
        let snapshots = orch.snapshots();
        assert_eq!(snapshots[0].numbers, vec!["919876543210"]);
        assert_eq!(
            snapshots[1].numbers,
            vec!["919876543210", "918123456789"]
        );
        assert_eq!(
            orch.combined_numbers(),
            vec!["919876543210", "918123456789"]
        );
    }

    #[tokio::test]
    async fn test_clear_drops_all_jobs() {
        let engine = MockRecognizer::new(vec![MockCall::text("9876543210")]);
        let orch = orchestrator(engine, PipelineConfig::default());

        let ids = orch.submit(vec![png_file("a.png")]);
        orch.process_pending().await;
        assert_eq!(orch.snapshots().len(), 1);

        orch.clear();
        assert!(orch.snapshots().is_empty());
        assert!(orch.snapshot(ids[0]).is_none());
        assert!(orch.combined_numbers().is_empty());
    }

    #[tokio::test]
    async fn test_process_pending_with_empty_queue_is_a_noop() {
        let engine = MockRecognizer::new(vec![]);
        let orch = orchestrator(engine.clone(), PipelineConfig::default());
        assert_eq!(orch.process_pending().await, 0);
        assert_eq!(engine.call_count(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_serializes_for_export_boundary() {
        let engine = MockRecognizer::new(vec![MockCall::text("9876543210")]);
        let orch = orchestrator(engine, PipelineConfig::default());

        orch.submit(vec![png_file("a.png")]);
        orch.process_pending().await;

        let json = serde_json::to_string(&orch.snapshots())
            .expect("snapshots should serialize to JSON");
        assert!(json.contains("\"Completed\""));
        assert!(json.contains("919876543210"));
    }
}
