//! Pipeline tests
//! Producer/consumer pairs over real channels, with file and in-memory endpoints

use std::{fs, thread, time::Duration};

use framebind::{
    buffers::CacheMode,
    workers::{ChecksumSink, FileSink, FileSource, MemorySource, NullSink, SyntheticSource},
    ChannelAttr, ChannelId, ChannelState, CodecId, FrameBindError, FrameInfo, MediaSystem, PixelFormat, Pipeline,
    PipelineConfig, RetryPolicy, StopSignal, SystemConfig,
};
use tempfile::TempDir;

#[cfg(test)]
mod pipeline_tests {
    use super::*;

    const VPSS: ChannelId = ChannelId::process(0, 0);
    const VENC: ChannelId = ChannelId::encode(0);

    fn system() -> MediaSystem {
        MediaSystem::new(SystemConfig::default().with_poll_interval(Duration::from_millis(5))).unwrap()
    }

    fn frame() -> FrameInfo {
        FrameInfo::new(64, 32, PixelFormat::Yuv420Sp).with_codec(CodecId::Avc)
    }

    fn bound_config(name: &str) -> PipelineConfig {
        PipelineConfig::new(name, VPSS, ChannelAttr::process(64, 32), frame())
            .with_output(VENC, ChannelAttr::encode(CodecId::Avc, 64, 32))
    }

    /// Test: Every frame sent through a bound pair is received, ending with end of stream
    #[test]
    fn test_bound_pipeline_reaches_eos() {
        let system = system();
        let size = frame().buffer_size();
        let source = SyntheticSource::new(size, Some(12));

        let handle = Pipeline::spawn(
            &system,
            bound_config("bound"),
            Box::new(source),
            Box::new(NullSink::default()),
            StopSignal::new(),
        )
        .unwrap();
        let report = handle.join().unwrap();

        // Twelve full frames and an empty end-of-stream frame
        assert_eq!(report.frames_sent, 13);
        assert_eq!(report.frames_received, 13);
        assert_eq!(report.bytes_written, 12 * size as u64);
        assert!(report.reached_eos);
        assert_eq!(report.checksum_mismatches, 0);

        // Everything the pipeline created is gone again
        assert_eq!(system.channels().channel_count(), 0);
        assert_eq!(system.graph().edge_count(), 0);
        assert_eq!(system.pools().pool_count(), 0);
        let stats = system.stats();
        assert_eq!((stats.binds, stats.unbinds), (1, 1));
        assert_eq!((stats.channels_created, stats.channels_destroyed), (2, 2));
    }

    /// Test: A file copied through the pipeline comes out byte for byte
    #[test]
    fn test_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("input.yuv");
        let output = temp_dir.path().join("test_0.bin");

        // Two and a half frames; the partial frame carries end of stream
        let size = frame().buffer_size();
        let data: Vec<u8> = (0..size * 5 / 2).map(|i| (i * 7 % 256) as u8).collect();
        fs::write(&input, &data).unwrap();

        let system = system();
        let handle = Pipeline::spawn(
            &system,
            bound_config("file").with_cache_mode(CacheMode::Cached),
            Box::new(FileSource::open(&input).unwrap()),
            Box::new(FileSink::create(&output).unwrap()),
            StopSignal::new(),
        )
        .unwrap();
        let report = handle.join().unwrap();

        assert_eq!(report.frames_sent, 3);
        assert!(report.reached_eos);
        assert_eq!(fs::read(&output).unwrap(), data);
    }

    /// Test: Payload checksums arrive in send order
    #[test]
    fn test_checksums_in_order() {
        let system = system();
        let size = frame().buffer_size();
        let sink = ChecksumSink::new();

        let handle = Pipeline::spawn(
            &system,
            PipelineConfig::new("checksums", VPSS, ChannelAttr::process(64, 32), frame()).with_pool_blocks(2),
            Box::new(SyntheticSource::new(size, Some(5))),
            Box::new(sink.clone()),
            StopSignal::new(),
        )
        .unwrap();
        handle.join().unwrap();

        let expected: Vec<u32> = (0..5u64)
            .map(|n| {
                let bytes: Vec<u8> = (0..size).map(|i| SyntheticSource::pattern_byte(n, i)).collect();
                crc32fast::hash(&bytes)
            })
            .chain(std::iter::once(crc32fast::hash(&[])))
            .collect();
        assert_eq!(sink.checksums(), expected);
        assert!(sink.is_finished());
    }

    /// Test: A loop count replays the source before end of stream
    #[test]
    fn test_loop_count() {
        let system = system();
        let size = frame().buffer_size();
        let data: Vec<u8> = (0..size * 3).map(|i| i as u8).collect();

        let handle = Pipeline::spawn(
            &system,
            bound_config("loops").with_loop_count(2),
            Box::new(MemorySource::new(data)),
            Box::new(NullSink::default()),
            StopSignal::new(),
        )
        .unwrap();
        let report = handle.join().unwrap();

        // Two passes of three frames plus the end-of-stream frame
        assert_eq!(report.frames_sent, 7);
        assert_eq!(report.frames_received, 7);
        assert_eq!(report.bytes_written, 6 * size as u64);
    }

    /// Test: A snap count cuts an endless source short
    #[test]
    fn test_snap_count() {
        let system = system();
        let size = frame().buffer_size();

        let handle = Pipeline::spawn(
            &system,
            bound_config("snap").with_loop_count(-1).with_snap_count(4),
            Box::new(SyntheticSource::new(size, None)),
            Box::new(NullSink::default()),
            StopSignal::new(),
        )
        .unwrap();
        let report = handle.join().unwrap();

        assert_eq!(report.frames_sent, 4);
        assert_eq!(report.frames_received, 4);
        assert_eq!(report.bytes_written, 4 * size as u64);
        assert!(report.reached_eos);
    }

    /// Test: The stop signal ends an endless pipeline and still tears it down
    #[test]
    fn test_stop_signal() {
        let system = system();
        let size = frame().buffer_size();
        let stop = StopSignal::new();

        let handle = Pipeline::spawn(
            &system,
            bound_config("endless")
                .with_loop_count(-1)
                .with_retry(RetryPolicy {
                    send_timeout_ms: 5,
                    backoff_ms: 1,
                    max_attempts: None,
                }),
            Box::new(SyntheticSource::new(size, None)),
            Box::new(NullSink::default()),
            stop.clone(),
        )
        .unwrap();

        thread::sleep(Duration::from_millis(100));
        stop.stop();
        let report = handle.join().unwrap();

        assert!(report.frames_sent > 0);
        assert!(!report.reached_eos);
        assert!(report.frames_received <= report.frames_sent);
        assert_eq!(system.channels().channel_count(), 0);
        assert_eq!(system.pools().pool_count(), 0);
    }

    /// Test: An endless loop over a source with no full frame still ends with end of stream
    #[test]
    fn test_short_source_does_not_spin() {
        let system = system();
        let size = frame().buffer_size();

        for data in [Vec::new(), vec![0x42u8; size / 2]] {
            let len = data.len();
            let handle = Pipeline::spawn(
                &system,
                bound_config("short").with_loop_count(-1),
                Box::new(MemorySource::new(data)),
                Box::new(NullSink::default()),
                StopSignal::new(),
            )
            .unwrap();
            let report = handle.join().unwrap();

            assert_eq!(report.frames_sent, 1);
            assert_eq!(report.frames_received, 1);
            assert_eq!(report.bytes_written, len as u64);
            assert!(report.reached_eos);
        }
    }

    /// Test: A failed setup leaves no pool and does not touch channels it did not create
    #[test]
    fn test_failed_spawn_on_existing_input_rolls_back() {
        let system = system();
        system.create_channel(VPSS, ChannelAttr::process(64, 32)).unwrap();

        let result = Pipeline::spawn(
            &system,
            bound_config("clash"),
            Box::new(MemorySource::new(Vec::new())),
            Box::new(NullSink::default()),
            StopSignal::new(),
        );
        assert!(matches!(result, Err(FrameBindError::DuplicateChannel { .. })));

        assert_eq!(system.pools().pool_count(), 0);
        assert_eq!(system.channels().channel_count(), 1);
        assert_eq!(system.channel_state(VPSS), ChannelState::Created);
        assert_eq!(system.channel_state(VENC), ChannelState::Unconfigured);
    }

    /// Test: A clash on the output channel destroys the input created before it
    #[test]
    fn test_failed_spawn_on_existing_output_rolls_back() {
        let system = system();
        system
            .create_channel(VENC, ChannelAttr::encode(CodecId::Avc, 64, 32))
            .unwrap();

        let result = Pipeline::spawn(
            &system,
            bound_config("clash"),
            Box::new(MemorySource::new(Vec::new())),
            Box::new(NullSink::default()),
            StopSignal::new(),
        );
        assert!(matches!(result, Err(FrameBindError::DuplicateChannel { .. })));

        assert_eq!(system.pools().pool_count(), 0);
        assert_eq!(system.graph().edge_count(), 0);
        assert_eq!(system.channel_state(VPSS), ChannelState::Unconfigured);
        assert_eq!(system.channel_state(VENC), ChannelState::Created);

        // The same pipeline runs once the clash is cleared
        system.start_receiving(VENC, -1).unwrap();
        system.stop_receiving(VENC).unwrap();
        system.destroy_channel(VENC).unwrap();
        let handle = Pipeline::spawn(
            &system,
            bound_config("clash"),
            Box::new(SyntheticSource::new(frame().buffer_size(), Some(2))),
            Box::new(NullSink::default()),
            StopSignal::new(),
        )
        .unwrap();
        assert_eq!(handle.join().unwrap().frames_received, 3);
    }

    /// Test: Two pipelines share one system without interfering
    #[test]
    fn test_parallel_pipelines() {
        let system = system();
        let size = frame().buffer_size();

        let handles: Vec<_> = (0..2u32)
            .map(|i| {
                let config = PipelineConfig::new(
                    format!("pipe{}", i),
                    ChannelId::process(i, 0),
                    ChannelAttr::process(64, 32),
                    frame(),
                )
                .with_output(ChannelId::encode(i), ChannelAttr::encode(CodecId::Hevc, 64, 32));
                Pipeline::spawn(
                    &system,
                    config,
                    Box::new(SyntheticSource::new(size, Some(8))),
                    Box::new(NullSink::default()),
                    StopSignal::new(),
                )
                .unwrap()
            })
            .collect();

        for handle in handles {
            let report = handle.join().unwrap();
            assert_eq!(report.frames_received, 9);
            assert!(report.reached_eos);
        }
        assert_eq!(system.stats().pools_created, 2);
    }
}
