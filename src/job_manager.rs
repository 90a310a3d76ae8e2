use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use url_scraper_lib::{exporter, input_loader, pipeline};
use url_scraper_lib::{ColumnSelection, ScrapeClient, ScrapeConfig, ScrapeStatus};

const MAX_LOG_LINES: usize = 50;

#[derive(Clone, serde::Serialize)]
pub struct JobStatus {
    pub id: String,
    pub status: String, // "queued", "processing", "stopped", "completed", "failed"
    pub total_urls: usize,
    pub processed_count: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub current_url: String,
    pub logs: Vec<String>,
    #[serde(skip)]
    cancel: Arc<AtomicBool>,
}

pub struct JobManager {
    pub jobs: Arc<Mutex<HashMap<String, JobStatus>>>,
}

impl JobManager {
    pub fn new() -> Self {
        JobManager {
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Registers the job and runs it on its own thread. Within the thread the
    /// pipeline is strictly sequential, so each job has at most one vendor
    /// request in flight.
    pub fn start_job(
        &self,
        job_id: String,
        input_path: PathBuf,
        output_dir: PathBuf,
        config: ScrapeConfig,
    ) -> String {
        let cancel = Arc::new(AtomicBool::new(false));
        let initial_status = JobStatus {
            id: job_id.clone(),
            status: "queued".to_string(),
            total_urls: 0,
            processed_count: 0,
            success_count: 0,
            failure_count: 0,
            current_url: "Initializing...".to_string(),
            logs: vec!["Job started.".to_string()],
            cancel: cancel.clone(),
        };

        self.jobs
            .lock()
            .unwrap()
            .insert(job_id.clone(), initial_status);

        let jobs_arc = self.jobs.clone();
        let id_clone = job_id.clone();

        thread::spawn(move || {
            Self::run_job(id_clone, jobs_arc, input_path, output_dir, config, cancel);
        });

        job_id
    }

    /// Asks the job to stop after the URL currently being scraped. A request
    /// already in flight always finishes.
    pub fn request_stop(&self, job_id: &str) -> bool {
        let mut guard = self.jobs.lock().unwrap();
        if let Some(job) = guard.get_mut(job_id) {
            job.cancel.store(true, Ordering::Relaxed);
            job.logs
                .push("Stop requested; finishing the current URL.".to_string());
            true
        } else {
            false
        }
    }

    pub fn snapshot(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.lock().unwrap().get(job_id).cloned()
    }

    fn run_job(
        job_id: String,
        jobs: Arc<Mutex<HashMap<String, JobStatus>>>,
        input_path: PathBuf,
        output_dir: PathBuf,
        config: ScrapeConfig,
        cancel: Arc<AtomicBool>,
    ) {
        let update_status = |status: &str, url: &str, log: Option<String>| {
            let mut guard = jobs.lock().unwrap();
            if let Some(job) = guard.get_mut(&job_id) {
                if !status.is_empty() {
                    job.status = status.to_string();
                }
                if !url.is_empty() {
                    job.current_url = url.to_string();
                }
                if let Some(msg) = log {
                    job.logs.push(msg);
                    if job.logs.len() > MAX_LOG_LINES {
                        job.logs.remove(0);
                    }
                }
            }
        };

        let loaded = match input_loader::load_urls(&input_path) {
            Ok(loaded) => loaded,
            Err(e) => {
                update_status("failed", "", Some(format!("Could not load input: {}", e)));
                return;
            }
        };
        if let Some(ColumnSelection::FirstColumnFallback(name)) = &loaded.column {
            update_status(
                "",
                "",
                Some(format!(
                    "No 'url' column found. Using first column {:?} instead.",
                    name
                )),
            );
        }
        if loaded.skipped_rows > 0 {
            update_status(
                "",
                "",
                Some(format!(
                    "{} rows skipped (empty or not a URL).",
                    loaded.skipped_rows
                )),
            );
        }

        {
            let mut guard = jobs.lock().unwrap();
            if let Some(job) = guard.get_mut(&job_id) {
                job.total_urls = loaded.records.len();
                job.status = "processing".to_string();
            }
        }

        let client = match ScrapeClient::new(&config.api_key) {
            Ok(client) => client,
            Err(e) => {
                update_status("failed", "", Some(e.to_string()));
                return;
            }
        };

        let result = pipeline::run(&loaded.records, &client, &config, &cancel, |progress| {
            let mut guard = jobs.lock().unwrap();
            if let Some(job) = guard.get_mut(&job_id) {
                job.processed_count = progress.completed;
                job.current_url = progress.url.clone();
                match progress.status {
                    ScrapeStatus::Success => job.success_count += 1,
                    ScrapeStatus::Failure => job.failure_count += 1,
                }
                job.logs.push(format!(
                    "{} of {}: {} [{}]",
                    progress.completed,
                    progress.total,
                    progress.url,
                    progress.status.as_str()
                ));
                if job.logs.len() > MAX_LOG_LINES {
                    job.logs.remove(0);
                }
            }
        });

        let exports = [
            (
                output_dir.join(format!("summary_{}.csv", job_id)),
                exporter::summary_csv(&result),
            ),
            (
                output_dir.join(format!("errors_{}.csv", job_id)),
                exporter::errors_csv(&result),
            ),
            (
                output_dir.join(format!("results_{}.json", job_id)),
                exporter::full_report_json(&result),
            ),
        ];
        for (path, contents) in exports {
            let body = match contents {
                Ok(body) => body,
                Err(e) => {
                    update_status("failed", "", Some(format!("Export failed: {}", e)));
                    return;
                }
            };
            if let Err(e) = std::fs::write(&path, body) {
                update_status(
                    "failed",
                    "",
                    Some(format!("Could not write {:?}: {}", path, e)),
                );
                return;
            }
        }

        let tally = format!(
            "{} total, {} succeeded, {} failed.",
            result.total(),
            result.success_count(),
            result.failure_count()
        );
        if cancel.load(Ordering::Relaxed) {
            update_status("stopped", "Stopped", Some(format!("Job stopped by user. {}", tally)));
        } else {
            update_status("completed", "Done", Some(format!("All URLs processed. {}", tally)));
        }
    }
}
