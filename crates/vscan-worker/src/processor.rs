//! Analysis pipeline orchestration.
//!
//! One call to [`process_job`] drives a job from `uploaded` to a terminal
//! state: open the video, sample frames, run detection, render and persist
//! an overlay per frame, describe the scene, and finally write the result
//! document. Frames are handled strictly in order. Any failure stops the
//! loop and is recorded on the job; nothing is retried.

use std::sync::Arc;
use std::time::Instant;

use tracing::{warn, Instrument};
use vscan_media::{
    encode_jpeg, FrameExtractor, FrameSample, FrameStream, MediaResult, ObjectDetector,
    OverlayRenderer, VideoOpener,
};
use vscan_models::{FrameResult, JobRecord, JobTransition, ResultDocument};
use vscan_queue::{AnalysisJob, JobHandle, JobRegistry};
use vscan_storage::FsResultStore;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::scene_description::describe_scene;

/// Everything a job needs, shared across jobs.
pub struct ProcessingContext {
    pub config: WorkerConfig,
    pub registry: Arc<JobRegistry>,
    pub store: FsResultStore,
    pub opener: Arc<dyn VideoOpener>,
    pub detector: Arc<dyn ObjectDetector>,
    pub renderer: Arc<dyn OverlayRenderer>,
}

impl ProcessingContext {
    pub fn new(
        config: WorkerConfig,
        registry: Arc<JobRegistry>,
        store: FsResultStore,
        opener: Arc<dyn VideoOpener>,
        detector: Arc<dyn ObjectDetector>,
        renderer: Arc<dyn OverlayRenderer>,
    ) -> Self {
        Self {
            config,
            registry,
            store,
            opener,
            detector,
            renderer,
        }
    }
}

/// Run one job to a terminal state and return its final record.
///
/// Fails only if the job is no longer registered (it was deleted before a
/// worker picked it up); pipeline failures are recorded on the job instead.
pub async fn process_job(ctx: &ProcessingContext, job: &AnalysisJob) -> WorkerResult<JobRecord> {
    let handle = ctx.registry.handle(&job.job_id)?;
    let logger = JobLogger::new(&job.job_id, &job.video_name);
    let span = logger.span();

    run_job(ctx, &handle, job, &logger).instrument(span).await
}

async fn run_job(
    ctx: &ProcessingContext,
    handle: &JobHandle,
    job: &AnalysisJob,
    logger: &JobLogger,
) -> WorkerResult<JobRecord> {
    let started = Instant::now();
    logger.started(&job.video_path);

    handle.apply(JobTransition::StartExtraction)?;

    match run_pipeline(ctx, handle, job, logger).await {
        Ok(()) => {
            let record = handle.apply(JobTransition::Complete)?;
            metrics::record_job_completed(started.elapsed().as_secs_f64());
            logger.completed(record.processed_frames, started.elapsed());
            Ok(record)
        }
        Err(e) => {
            let code = e.code();
            logger.failed(&e);
            metrics::record_job_failed(code);
            Ok(handle.apply(JobTransition::fail(code, e.to_string()))?)
        }
    }
}

async fn run_pipeline(
    ctx: &ProcessingContext,
    handle: &JobHandle,
    job: &AnalysisJob,
    logger: &JobLogger,
) -> WorkerResult<()> {
    check_cancelled(handle)?;

    let source = ctx
        .opener
        .open(&job.video_path)
        .await
        .map_err(|e| WorkerError::source_unavailable(e.to_string()))?;

    let mut stream = FrameExtractor::start(
        source,
        ctx.config.frame_interval_secs,
        ctx.config.frame_buffer,
    )
    .map_err(WorkerError::from_extraction)?;
    let plan = *stream.plan();

    // Stay in `extracting` until the source has produced at least one frame.
    let first = next_sample(&mut stream).await?.ok_or(WorkerError::EmptyExtraction)?;

    handle.apply(JobTransition::ExtractionComplete {
        total_frames: plan.expected_samples,
    })?;
    logger.sampling(&plan);

    let mut frames = Vec::with_capacity(plan.expected_samples as usize);
    let mut pending = Some(first);
    while let Some(sample) = pending.take() {
        check_cancelled(handle)?;

        let result = analyze_frame(ctx, &job.video_name, sample).await?;
        logger.frame(&result);
        handle.apply(JobTransition::FrameAnalyzed {
            frame_id: result.frame_id,
        })?;
        frames.push(result);

        pending = next_sample(&mut stream).await?;
    }

    if frames.len() != plan.expected_samples as usize {
        logger.frame_count_mismatch(plan.expected_samples, frames.len());
    }

    check_cancelled(handle)?;
    let doc = ResultDocument::new(
        job.video_name.clone(),
        job.job_id.clone(),
        ctx.config.frame_interval_secs,
        frames,
    );
    ctx.store.write_results(&doc).await?;
    Ok(())
}

async fn next_sample(stream: &mut FrameStream) -> WorkerResult<Option<FrameSample>> {
    match stream.next().await {
        Some(Ok(sample)) => Ok(Some(sample)),
        Some(Err(e)) => Err(WorkerError::source_unavailable(e.to_string())),
        None => Ok(None),
    }
}

/// Detect, render, persist and describe a single frame.
async fn analyze_frame(
    ctx: &ProcessingContext,
    video_name: &str,
    sample: FrameSample,
) -> WorkerResult<FrameResult> {
    let started = Instant::now();
    let FrameSample {
        frame_id,
        source_index,
        timestamp,
        image,
    } = sample;

    let detector = Arc::clone(&ctx.detector);
    let renderer = Arc::clone(&ctx.renderer);
    let quality = ctx.config.jpeg_quality;

    let (detections, jpeg) = tokio::task::spawn_blocking(move || -> MediaResult<_> {
        let detections = detector.detect(&image)?;
        let overlay = renderer.render(&image, &detections)?;
        let jpeg = encode_jpeg(&overlay, quality)?;
        Ok((detections, jpeg))
    })
    .await
    .map_err(|e| {
        warn!(frame_id, "Frame analysis task failed: {}", e);
        WorkerError::analysis_failed(format!("frame {} analysis task failed: {}", frame_id, e))
    })?
    .map_err(|e| WorkerError::analysis_failed(format!("frame {}: {}", frame_id, e)))?;

    let path = ctx
        .store
        .write_frame_artifact(video_name, frame_id, &jpeg)
        .await?;
    let description = describe_scene(&detections);

    metrics::record_frame_analyzed(detections.len(), started.elapsed().as_secs_f64());

    Ok(FrameResult::new(
        frame_id,
        source_index,
        timestamp,
        detections,
        description,
        path.to_string_lossy(),
    ))
}

fn check_cancelled(handle: &JobHandle) -> WorkerResult<()> {
    if handle.is_cancelled() {
        return Err(WorkerError::Cancelled);
    }
    Ok(())
}
