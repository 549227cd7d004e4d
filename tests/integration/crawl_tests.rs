//! Integration tests for the harvester
//!
//! These tests use wiremock to serve a search form and result pages and
//! run the full harvest cycle end-to-end against real output files.

use inpres_harvest::config::{
    Config, CrawlerConfig, OutputConfig, OutputFormat, PackageConfig, SiteConfig, UserAgentConfig,
};
use inpres_harvest::crawler::Coordinator;
use inpres_harvest::storage::{open_store, CsvStore, PriorOutput};
use inpres_harvest::HarvestError;
use std::path::Path;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEARCH_FORM: &str = r#"<html><body>
    <form name="form1" method="post" action="buscar_sismo">
        <input type="text" name="datepicker" value="">
        <input type="text" name="datepicker2" value="">
        <input type="checkbox" name="tilde1" value="checkbox">
        <input type="hidden" name="sesion" value="xyz">
        <input type="submit" name="Submit" value="Buscar">
    </form></body></html>"#;

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, format: OutputFormat, output: &Path) -> Config {
    Config {
        site: SiteConfig {
            base_url: base_url.to_string(),
            search_path: "formulario".to_string(),
            ..SiteConfig::default()
        },
        crawler: CrawlerConfig {
            max_concurrent_pages: 2,
            request_timeout_secs: 5,
            max_retries: 0,
            retry_delay_ms: 10,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            format,
            path: output.to_path_buf(),
            package: None,
        },
    }
}

fn event_row(id: u32, date: &str, time: &str, felt: bool) -> String {
    let date_cell = if felt {
        format!(r##"<div><font color="#FF0000">{}</font></div>"##, date)
    } else {
        date.to_string()
    };
    format!(
        r#"<tr class="Estilo68"><td><img src="punto.gif"></td><td>{date_cell}</td><td>{time}</td>
        <td>-31.52</td><td>-68.61</td><td>33 Km</td><td>4.2</td><td>III</td><td>San Juan</td>
        <td><a href="ver/{id}/detalle">ver</a></td></tr>"#
    )
}

/// A row whose detail link is missing
fn broken_row() -> String {
    r#"<tr class="Estilo68"><td></td><td>01/05/2023</td><td>11:00:00</td><td>-31.5</td>
    <td>-68.6</td><td>10 Km</td><td>2.0</td><td></td><td>Mendoza</td><td></td></tr>"#
        .to_string()
}

fn results_page(rows: &[String], pages: &[u32]) -> String {
    let mut html = String::from(
        r#"<html><body><table id="sismos">
        <tr class="Estilo68"><td></td><td>Fecha</td><td>Hora</td><td>Latitud</td><td>Longitud</td>
        <td>Profundidad</td><td>Magnitud</td><td>Intensidad</td><td>Provincia</td><td></td></tr>"#,
    );
    for row in rows {
        html.push_str(row);
    }
    html.push_str(r#"</table><table><tr><td class="Estilo68">"#);
    for page in pages {
        html.push_str(&format!(
            r#"<a href="buscar_sismo?pagina={page}"> {page} </a>"#
        ));
    }
    html.push_str(r#"<a href="buscar_sismo?pagina=99">Última</a></td></tr></table></body></html>"#);
    html
}

async fn mount_form(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/formulario"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SEARCH_FORM))
        .mount(server)
        .await;
}

async fn mount_results(server: &MockServer, body: String) {
    Mock::given(method("POST"))
        .and(path("/buscar_sismo"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, page: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/buscar_sismo"))
        .and(query_param("pagina", page))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Serves a two-page result set: 3 rows (one broken) then 2 rows
async fn mount_two_pages(server: &MockServer) {
    mount_form(server).await;
    mount_results(
        server,
        results_page(
            &[
                event_row(101, "01/05/2023", "08:10:00", false),
                broken_row(),
                event_row(103, "01/05/2023", "14:32:10", true),
            ],
            &[2],
        ),
    )
    .await;
    mount_page(
        server,
        "2",
        ResponseTemplate::new(200).set_body_string(results_page(
            &[
                event_row(201, "02/05/2023", "03:00:00", false),
                event_row(202, "02/05/2023", "07:45:30", false),
            ],
            &[2],
        )),
    )
    .await;
}

#[tokio::test]
async fn test_full_harvest_two_pages() {
    let mock_server = MockServer::start().await;
    mount_two_pages(&mock_server).await;

    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("inpres").join("inpres.csv");
    let config = create_test_config(&mock_server.uri(), OutputFormat::Csv, &csv_path);

    let mut store = open_store(&config.output, "hash").unwrap();
    let mut coordinator = Coordinator::from_config(config).unwrap();
    let report = coordinator.run(store.as_mut()).await.unwrap();

    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.rows_seen, 5);
    assert_eq!(report.records, 4);
    assert_eq!(report.row_errors.len(), 1);
    assert_eq!(report.row_errors[0].page, "1");
    assert_eq!(report.row_errors[0].cells[8], "Mendoza");
    assert!(report.is_complete());
    assert_eq!(report.window.form_from(), "29/07/1998");

    let records = CsvStore::new(csv_path.clone(), None).load_all().unwrap();
    let ids: Vec<i64> = records.iter().map(|r| r.id()).collect();
    assert_eq!(ids, vec![101, 103, 201, 202]);
    assert!(records[1].felt());
    assert!(!records[0].felt());
    assert_eq!(records[1].depth_km(), 33);
    assert_eq!(
        records[1].detail_url().as_str(),
        format!("{}/ver/103/detalle", mock_server.uri())
    );

    let content = std::fs::read_to_string(&csv_path).unwrap();
    assert!(content.starts_with("id,timestamp,"));
    assert!(content.contains("103,2023-05-01 14:32:10,-31.52,-68.61,true,33,4.2,III,San Juan,"));
}

#[tokio::test]
async fn test_form_submission_fields() {
    let mock_server = MockServer::start().await;
    mount_form(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/buscar_sismo"))
        .and(body_string_contains("datepicker=29%2F07%2F1998"))
        .and(body_string_contains("tilde1=checkbox"))
        .and(body_string_contains("sesion=xyz"))
        .and(body_string_contains("Submit=Buscar"))
        .respond_with(ResponseTemplate::new(200).set_body_string(results_page(&[], &[])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(
        &mock_server.uri(),
        OutputFormat::Csv,
        &dir.path().join("inpres.csv"),
    );

    let mut store = open_store(&config.output, "hash").unwrap();
    let mut coordinator = Coordinator::from_config(config).unwrap();
    let report = coordinator.run(store.as_mut()).await.unwrap();

    assert_eq!(report.records, 0);
    assert_eq!(report.pages_fetched, 1);
}

#[tokio::test]
async fn test_search_page_failure_is_fatal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/formulario"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("inpres.csv");
    let config = create_test_config(&mock_server.uri(), OutputFormat::Csv, &csv_path);

    let mut store = open_store(&config.output, "hash").unwrap();
    let mut coordinator = Coordinator::from_config(config).unwrap();
    let result = coordinator.run(store.as_mut()).await;

    assert!(matches!(result, Err(HarvestError::Fetch(_))));
    assert!(!csv_path.exists());
}

#[tokio::test]
async fn test_lost_follow_page_is_not_fatal() {
    let mock_server = MockServer::start().await;
    mount_form(&mock_server).await;
    mount_results(
        &mock_server,
        results_page(&[event_row(1, "01/05/2023", "10:00:00", false)], &[2, 3]),
    )
    .await;
    mount_page(&mock_server, "2", ResponseTemplate::new(500)).await;
    mount_page(
        &mock_server,
        "3",
        ResponseTemplate::new(200).set_body_string(results_page(
            &[event_row(3, "02/05/2023", "10:00:00", false)],
            &[],
        )),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("inpres.csv");
    let config = create_test_config(&mock_server.uri(), OutputFormat::Csv, &csv_path);

    let mut store = open_store(&config.output, "hash").unwrap();
    let mut coordinator = Coordinator::from_config(config).unwrap();
    let report = coordinator.run(store.as_mut()).await.unwrap();

    assert_eq!(report.records, 2);
    assert_eq!(report.lost_pages.len(), 1);
    assert_eq!(report.lost_pages[0].label, "2");
    assert!(report.lost_pages[0].error.contains("500"));
    assert!(!report.is_complete());
    assert_eq!(store.load_all().unwrap().len(), 2);
}

#[tokio::test]
async fn test_second_run_resumes_from_latest_event() {
    let mock_server = MockServer::start().await;
    mount_two_pages(&mock_server).await;

    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("inpres.csv");
    let config = create_test_config(&mock_server.uri(), OutputFormat::Csv, &csv_path);

    let mut store = open_store(&config.output, "hash").unwrap();
    let first = Coordinator::from_config(config.clone())
        .unwrap()
        .run(store.as_mut())
        .await
        .unwrap();

    let mut store = open_store(&config.output, "hash").unwrap();
    let second = Coordinator::from_config(config)
        .unwrap()
        .run(store.as_mut())
        .await
        .unwrap();

    assert_eq!(first.window.form_from(), "29/07/1998");
    assert_eq!(second.window.form_from(), "02/05/2023");
    assert!(second.window.date_from() >= first.window.date_from());

    // Overlapping windows must not duplicate stored events
    assert_eq!(store.load_all().unwrap().len(), 4);
}

#[tokio::test]
async fn test_corrupt_prior_csv_is_set_aside() {
    let mock_server = MockServer::start().await;
    mount_two_pages(&mock_server).await;

    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("inpres.csv");
    std::fs::write(&csv_path, "id,timestamp\n1,ayer\n").unwrap();
    let config = create_test_config(&mock_server.uri(), OutputFormat::Csv, &csv_path);

    let mut store = open_store(&config.output, "hash").unwrap();
    let mut coordinator = Coordinator::from_config(config).unwrap();
    let report = coordinator.run(store.as_mut()).await.unwrap();

    assert_eq!(report.window.form_from(), "29/07/1998");
    assert_eq!(report.records, 4);

    let records = CsvStore::new(csv_path.clone(), None).load_all().unwrap();
    let ids: Vec<i64> = records.iter().map(|r| r.id()).collect();
    assert_eq!(ids, vec![101, 103, 201, 202]);

    let aside: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("inpres.csv.corrupt-"))
        .collect();
    assert_eq!(aside.len(), 1);
    assert_eq!(
        std::fs::read_to_string(dir.path().join(&aside[0])).unwrap(),
        "id,timestamp\n1,ayer\n"
    );
}

#[tokio::test]
async fn test_harvest_into_sqlite() {
    let mock_server = MockServer::start().await;
    mount_two_pages(&mock_server).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("inpres.db");
    let config = create_test_config(&mock_server.uri(), OutputFormat::Sqlite, &db_path);

    let mut store = open_store(&config.output, "hash").unwrap();
    let mut coordinator = Coordinator::from_config(config).unwrap();
    coordinator.run(store.as_mut()).await.unwrap();

    let records = store.load_all().unwrap();
    assert_eq!(records.len(), 4);
    let latest = store.latest_timestamp().unwrap().unwrap();
    assert_eq!(latest.format("%d/%m/%Y %H:%M:%S").to_string(), "02/05/2023 07:45:30");
}

#[tokio::test]
async fn test_data_package_written_with_csv() {
    let mock_server = MockServer::start().await;
    mount_two_pages(&mock_server).await;

    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("inpres.csv");
    let mut config = create_test_config(&mock_server.uri(), OutputFormat::Csv, &csv_path);
    config.output.package = Some(PackageConfig {
        name: "inpres".to_string(),
        title: "Sismos INPRES".to_string(),
        description: String::new(),
        resource_name: String::new(),
    });

    let mut store = open_store(&config.output, "hash").unwrap();
    Coordinator::from_config(config)
        .unwrap()
        .run(store.as_mut())
        .await
        .unwrap();

    let manifest = std::fs::read_to_string(dir.path().join("datapackage.json")).unwrap();
    let manifest: serde_json::Value = serde_json::from_str(&manifest).unwrap();
    assert_eq!(manifest["name"], "inpres");
    assert_eq!(manifest["resources"][0]["path"], "inpres.csv");
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/formulario"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    mount_form(&mock_server).await;
    mount_results(
        &mock_server,
        results_page(&[event_row(7, "01/05/2023", "10:00:00", false)], &[]),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(
        &mock_server.uri(),
        OutputFormat::Csv,
        &dir.path().join("inpres.csv"),
    );
    config.crawler.max_retries = 1;

    let mut store = open_store(&config.output, "hash").unwrap();
    let report = Coordinator::from_config(config)
        .unwrap()
        .run(store.as_mut())
        .await
        .unwrap();

    assert_eq!(report.records, 1);
}
