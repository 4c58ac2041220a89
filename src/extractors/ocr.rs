//! Local OCR through the Tesseract command-line engine.
//!
//! One worker task owns the engine. It is started on first use, under an
//! async mutex so that concurrent first calls start exactly one worker, and
//! it handles jobs from an mpsc queue one at a time. Pages submitted
//! concurrently therefore queue up in front of a single engine instead of
//! spawning one Tesseract process per page at once.
//!
//! The per-page time limit is applied by the worker around each Tesseract
//! run, so a page's clock starts when the engine picks it up rather than when
//! it joins the queue. A run that overruns is killed and reported as
//! [`ExtractorError::Timeout`]. Jobs whose caller has gone away are skipped.
//!
//! [`OcrExtractor::shutdown`] closes the queue and waits for the worker to
//! drain. A later call to `extract` starts a fresh worker.

use crate::config::ExtractionConfig;
use crate::error::ExtractorError;
use crate::extractors::PageTextExtractor;
use crate::pipeline::encode;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const JOB_QUEUE_DEPTH: usize = 64;

/// Engine settings captured from [`ExtractionConfig`].
#[derive(Debug, Clone)]
struct TesseractSettings {
    binary: PathBuf,
    language: String,
    psm: u8,
    max_width: u32,
    max_height: u32,
    job_timeout: Option<Duration>,
}

struct OcrJob {
    image: Vec<u8>,
    reply: oneshot::Sender<Result<String, ExtractorError>>,
}

struct WorkerHandle {
    jobs: mpsc::Sender<OcrJob>,
    task: JoinHandle<()>,
}

/// [`PageTextExtractor`] backed by a lazily started Tesseract worker.
pub struct OcrExtractor {
    settings: TesseractSettings,
    worker: Mutex<Option<WorkerHandle>>,
}

impl OcrExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            settings: TesseractSettings {
                binary: config.tesseract_binary.clone(),
                language: config.ocr_language.clone(),
                psm: config.ocr_psm,
                max_width: config.ocr_profile.max_width,
                max_height: config.ocr_profile.max_height,
                job_timeout: config.page_timeout_secs.map(Duration::from_secs),
            },
            worker: Mutex::new(None),
        }
    }

    /// Queue handle of the running worker, starting it if needed.
    async fn job_sender(&self) -> Result<mpsc::Sender<OcrJob>, ExtractorError> {
        let mut guard = self.worker.lock().await;
        if let Some(handle) = guard.as_ref() {
            if !handle.jobs.is_closed() {
                return Ok(handle.jobs.clone());
            }
        }

        verify_engine(&self.settings).await?;

        let (tx, rx) = mpsc::channel(JOB_QUEUE_DEPTH);
        let task = tokio::spawn(run_worker(self.settings.clone(), rx));
        *guard = Some(WorkerHandle {
            jobs: tx.clone(),
            task,
        });
        Ok(tx)
    }
}

#[async_trait]
impl PageTextExtractor for OcrExtractor {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    async fn extract(&self, image: &[u8], _model: Option<&str>) -> Result<String, ExtractorError> {
        let jobs = self.job_sender().await?;
        let (reply, response) = oneshot::channel();

        jobs.send(OcrJob {
            image: image.to_vec(),
            reply,
        })
        .await
        .map_err(|_| ExtractorError::Internal("OCR worker stopped".into()))?;

        response
            .await
            .map_err(|_| ExtractorError::Internal("OCR worker dropped the job".into()))?
    }

    fn enforces_timeout(&self) -> bool {
        true
    }

    async fn shutdown(&self) {
        let handle = self.worker.lock().await.take();
        if let Some(WorkerHandle { jobs, task }) = handle {
            drop(jobs);
            if let Err(e) = task.await {
                warn!("OCR worker ended abnormally: {}", e);
            }
            info!("OCR worker shut down");
        }
    }
}

/// Check the binary runs and warn about missing language data.
async fn verify_engine(settings: &TesseractSettings) -> Result<(), ExtractorError> {
    let version = Command::new(&settings.binary)
        .arg("--version")
        .output()
        .await
        .map_err(|e| {
            ExtractorError::EngineUnavailable(format!("{}: {}", settings.binary.display(), e))
        })?;
    if !version.status.success() {
        return Err(ExtractorError::EngineUnavailable(format!(
            "{} --version exited with {}",
            settings.binary.display(),
            version.status
        )));
    }
    let banner = String::from_utf8_lossy(&version.stdout);
    info!(
        "Starting OCR worker: {} (lang={}, psm={})",
        banner.lines().next().unwrap_or("tesseract").trim(),
        settings.language,
        settings.psm
    );

    match Command::new(&settings.binary).arg("--list-langs").output().await {
        Ok(out) => {
            let listed = String::from_utf8_lossy(&out.stdout);
            let installed: Vec<&str> = listed.lines().skip(1).map(str::trim).collect();
            for lang in missing_languages(&settings.language, &installed) {
                warn!("Tesseract language data '{}' is not installed", lang);
            }
        }
        Err(e) => debug!("Could not list Tesseract languages: {}", e),
    }
    Ok(())
}

/// Languages in a `eng+spa` style spec that are not in `installed`.
fn missing_languages<'a>(spec: &'a str, installed: &[&str]) -> Vec<&'a str> {
    spec.split('+')
        .map(str::trim)
        .filter(|l| !l.is_empty() && !installed.contains(l))
        .collect()
}

async fn run_worker(settings: TesseractSettings, mut jobs: mpsc::Receiver<OcrJob>) {
    debug!("OCR worker started");
    while let Some(OcrJob { image, mut reply }) = jobs.recv().await {
        if reply.is_closed() {
            debug!("OCR caller went away while queued; skipping job");
            continue;
        }

        let result = tokio::select! {
            result = recognise_within(&settings, image) => result,
            _ = reply.closed() => {
                debug!("OCR caller went away mid-run; Tesseract stopped");
                continue;
            }
        };
        if reply.send(result).is_err() {
            debug!("OCR caller went away before the result was ready");
        }
    }
    debug!("OCR worker stopped: queue closed");
}

/// [`recognise`] bounded by the job time limit. Dropping the run on expiry
/// kills the Tesseract child.
async fn recognise_within(
    settings: &TesseractSettings,
    image: Vec<u8>,
) -> Result<String, ExtractorError> {
    let Some(limit) = settings.job_timeout else {
        return recognise(settings, image).await;
    };
    match tokio::time::timeout(limit, recognise(settings, image)).await {
        Ok(result) => result,
        Err(_) => {
            warn!("Tesseract did not finish within {:?}; killed", limit);
            Err(ExtractorError::Timeout {
                secs: limit.as_secs(),
            })
        }
    }
}

async fn recognise(settings: &TesseractSettings, image: Vec<u8>) -> Result<String, ExtractorError> {
    let (max_w, max_h) = (settings.max_width, settings.max_height);
    let png = tokio::task::spawn_blocking(move || encode::prepare_for_ocr(&image, max_w, max_h))
        .await
        .map_err(|e| ExtractorError::Internal(format!("preprocessing task panicked: {}", e)))?
        .map_err(|e| ExtractorError::Decode(e.to_string()))?;

    let mut child = Command::new(&settings.binary)
        .arg("stdin")
        .arg("stdout")
        .arg("-l")
        .arg(&settings.language)
        .arg("--psm")
        .arg(settings.psm.to_string())
        .arg("-c")
        .arg("preserve_interword_spaces=1")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ExtractorError::EngineUnavailable(e.to_string()))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| ExtractorError::Internal("tesseract stdin not captured".into()))?;
    let writer = tokio::spawn(async move {
        stdin.write_all(&png).await?;
        stdin.shutdown().await
    });

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| ExtractorError::Engine(e.to_string()))?;

    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(ExtractorError::Engine(format!("writing image: {}", e))),
        Err(e) => return Err(ExtractorError::Internal(format!("stdin task panicked: {}", e))),
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExtractorError::Engine(format!(
            "tesseract exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(clean_ocr_output(&String::from_utf8_lossy(&output.stdout)))
}

/// Drop form feeds Tesseract appends at page end, then trim.
fn clean_ocr_output(raw: &str) -> String {
    raw.replace('\x0c', "").trim().to_string()
}
