use actix_cors::Cors;
use actix_multipart::Multipart;
use actix_web::{get, post, web, App, HttpResponse, HttpServer, Responder};
use futures::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use url_scraper_lib::{delay_manager, logger, pipeline, ScrapeConfig};

mod job_manager;
use job_manager::JobManager;

const UPLOAD_DIR: &str = "uploads";
const OUTPUT_DIR: &str = "outputs";

const SAMPLE_CSV: &str = "URL\nhttps://example.com\nhttps://www.rust-lang.org\nhttps://crates.io\n";

struct AppState {
    job_manager: Arc<JobManager>,
}

async fn field_text(field: &mut actix_multipart::Field) -> String {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        if let Ok(data) = chunk {
            bytes.extend_from_slice(&data);
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

#[get("/api/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json("Server is running")
}

#[post("/api/upload")]
async fn upload_file(mut payload: Multipart, data: web::Data<AppState>) -> impl Responder {
    let upload_dir = PathBuf::from(UPLOAD_DIR);
    if let Err(e) = std::fs::create_dir_all(&upload_dir) {
        return HttpResponse::InternalServerError().json(serde_json::json!({
            "status": "error",
            "message": format!("Could not create upload directory: {}", e)
        }));
    }

    let job_id = Uuid::new_v4().to_string();

    let mut saved_path: Option<PathBuf> = None;
    let mut api_key_field = String::new();
    let mut include_markdown = false;
    let mut delay_seconds = delay_manager::DEFAULT_DELAY_SECS;

    while let Some(Ok(mut field)) = payload.next().await {
        let name = field
            .content_disposition()
            .get_name()
            .unwrap_or("")
            .to_string();
        match name.as_str() {
            "file" => {
                // Keep the original extension so the loader can route on it.
                let mut extension = "csv".to_string();
                if let Some(original_name) = field.content_disposition().get_filename() {
                    let lower = original_name.to_lowercase();
                    if lower.ends_with(".xlsx") {
                        extension = "xlsx".to_string();
                    } else if lower.ends_with(".xls") {
                        extension = "xls".to_string();
                    }
                }

                let file_path = upload_dir.join(format!("{}.{}", job_id, extension));
                let mut file = match std::fs::File::create(&file_path) {
                    Ok(file) => file,
                    Err(e) => {
                        return HttpResponse::InternalServerError().json(serde_json::json!({
                            "status": "error",
                            "message": format!("Could not save upload: {}", e)
                        }));
                    }
                };
                while let Some(chunk) = field.next().await {
                    let bytes = match chunk {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            return HttpResponse::BadRequest().json(serde_json::json!({
                                "status": "error",
                                "message": format!("Upload interrupted: {}", e)
                            }));
                        }
                    };
                    if let Err(e) = file.write_all(&bytes) {
                        return HttpResponse::InternalServerError().json(serde_json::json!({
                            "status": "error",
                            "message": format!("Could not save upload: {}", e)
                        }));
                    }
                }
                saved_path = Some(file_path);
            }
            "api_key" => api_key_field = field_text(&mut field).await,
            "include_markdown" => {
                let value = field_text(&mut field).await;
                include_markdown = matches!(value.trim(), "true" | "1" | "on" | "yes");
            }
            "delay_seconds" => {
                let value = field_text(&mut field).await;
                delay_seconds = value.trim().parse().unwrap_or(delay_manager::DEFAULT_DELAY_SECS);
            }
            _ => {}
        }
    }

    let Some(input_path) = saved_path else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "status": "error",
            "message": "No file field in the upload."
        }));
    };

    let api_key = if api_key_field.trim().is_empty() {
        std::env::var(pipeline::API_KEY_ENV).unwrap_or_default()
    } else {
        api_key_field
    };
    let config = match ScrapeConfig::new(api_key) {
        Ok(config) => config
            .with_markdown(include_markdown)
            .with_delay(delay_seconds),
        Err(e) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "status": "error",
                "message": e.to_string()
            }));
        }
    };

    let output_dir = PathBuf::from(OUTPUT_DIR);
    if let Err(e) = std::fs::create_dir_all(&output_dir) {
        return HttpResponse::InternalServerError().json(serde_json::json!({
            "status": "error",
            "message": format!("Could not create output directory: {}", e)
        }));
    }

    data.job_manager
        .start_job(job_id.clone(), input_path, output_dir, config);

    HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "job_id": job_id,
        "message": "File uploaded and job queued."
    }))
}

#[get("/api/status/{job_id}")]
async fn get_status(path: web::Path<String>, data: web::Data<AppState>) -> impl Responder {
    let job_id = path.into_inner();

    if let Some(job) = data.job_manager.snapshot(&job_id) {
        HttpResponse::Ok().json(job)
    } else {
        HttpResponse::NotFound().json("Job not found")
    }
}

#[get("/api/download/{job_id}/{kind}")]
async fn download_result(path: web::Path<(String, String)>) -> impl Responder {
    let (job_id, kind) = path.into_inner();

    let (stored_name, download_name, content_type) = match kind.as_str() {
        "summary" => (
            format!("summary_{}.csv", job_id),
            format!("scraping_summary_{}.csv", job_id),
            "text/csv",
        ),
        "errors" => (
            format!("errors_{}.csv", job_id),
            format!("scraping_errors_{}.csv", job_id),
            "text/csv",
        ),
        "results" => (
            format!("results_{}.json", job_id),
            format!("all_results_{}.json", job_id),
            "application/json",
        ),
        _ => {
            return HttpResponse::BadRequest()
                .json("Unknown download kind, expected summary, errors or results")
        }
    };

    let output_path = PathBuf::from(OUTPUT_DIR).join(stored_name);
    match std::fs::read_to_string(&output_path) {
        Ok(content) => HttpResponse::Ok()
            .content_type(content_type)
            .append_header((
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", download_name),
            ))
            .body(content),
        Err(_) => HttpResponse::NotFound().body("Result file not generated yet."),
    }
}

#[post("/api/stop/{job_id}")]
async fn stop_job(path: web::Path<String>, data: web::Data<AppState>) -> impl Responder {
    let job_id = path.into_inner();
    if data.job_manager.request_stop(&job_id) {
        HttpResponse::Ok().json("Job will stop after the current URL")
    } else {
        HttpResponse::NotFound().json("Job not found")
    }
}

#[get("/api/sample")]
async fn sample_file() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/csv")
        .append_header((
            "Content-Disposition",
            "attachment; filename=\"sample_urls.csv\"",
        ))
        .body(SAMPLE_CSV)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    logger::init();

    let job_manager = Arc::new(JobManager::new());
    let state = web::Data::new(AppState { job_manager });

    log::info!("Starting web server at http://0.0.0.0:8080");

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .service(health_check)
            .service(upload_file)
            .service(get_status)
            .service(download_result)
            .service(stop_job)
            .service(sample_file)
    })
    .bind(("0.0.0.0", 8080))?
    .run()
    .await
}
