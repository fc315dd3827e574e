//! Report content tests
//!
//! One completed assessment rendered in all four formats, cross-checked
//! for agreement: the same VMs in the same order, the same exact totals,
//! and byte-identical output when the same result is rendered again.

mod helpers;

use std::io::{Cursor, Read};
use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;
use zip::ZipArchive;

use helpers::{archive, dec, manager, wait_until_terminal};
use vmbom::models::{AssessmentResult, CostComponent, SessionState};
use vmbom::reports::{self, ReportFormat};
use vmbom::SessionManager;

/// Exact fleet total under the built-in catalogs; see [`fixture_archive`]
const FLEET_MONTHLY: &str = "470.89248";

/// Fleet used throughout: two priced VMs, one powered off, one broken.
///
/// Expected monthly costs under the built-in catalogs:
///   web-01    2 OCPU + 16 GiB + 100 GiB higher-performance =  69.19014
///   db-01     4 OCPU + 32 GiB + 500 GiB balanced + license  = 401.70234
///   old-app   powered off, priced at zero
///   broken-vm unparseable CPU count, recorded as a failure
fn fixture_archive() -> Vec<u8> {
    let cpu = "VM;VM UUID;CPUs\n\
               web-01;u-web;4\n\
               db-01;u-db;8\n\
               old-app;u-old;2\n\
               broken-vm;u-broken;two\n";
    let memory = "VM;VM UUID;Size MiB\n\
                  web-01;u-web;16384\n\
                  db-01;u-db;32768\n\
                  old-app;u-old;4096\n\
                  broken-vm;u-broken;2048\n";
    let disk = "VM;VM UUID;Disk;Capacity MiB\n\
                web-01;u-web;Hard disk 1;102400\n\
                db-01;u-db;Hard disk 1;512000\n\
                old-app;u-old;Hard disk 1;51200\n";
    let info = "VM;VM UUID;OS according to the configuration file;Powerstate\n\
                web-01;u-web;Ubuntu Linux (64-bit);poweredOn\n\
                db-01;u-db;Microsoft Windows Server 2019 (64-bit);poweredOn\n\
                old-app;u-old;CentOS 7 (64-bit);poweredOff\n\
                broken-vm;u-broken;Debian GNU/Linux 11 (64-bit);poweredOn\n";
    archive(&[
        ("RVTools_tabvCPU.csv", cpu),
        ("RVTools_tabvMemory.csv", memory),
        ("RVTools_tabvDisk.csv", disk),
        ("RVTools_tabvInfo.csv", info),
    ])
}

/// Run the fixture fleet to completion with all four formats requested
async fn completed_session() -> (Arc<SessionManager>, Uuid) {
    let manager = manager();
    let session_id = manager
        .submit("fixture.zip", fixture_archive(), &ReportFormat::ALL)
        .await
        .unwrap();
    let status = wait_until_terminal(&manager, session_id).await;
    assert_eq!(
        status.state,
        SessionState::Completed,
        "pipeline failed: {:?}",
        status.error
    );
    (manager, session_id)
}

fn csv_rows(bytes: &[u8]) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(bytes);
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

/// Concatenated XML of every file inside a rendered workbook
fn workbook_text(bytes: &[u8]) -> String {
    let mut archive = ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    let mut text = String::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).unwrap();
        text.push_str(&String::from_utf8_lossy(&buf));
    }
    text
}

#[tokio::test]
async fn all_four_formats_are_rendered_and_stored() {
    let (manager, session_id) = completed_session().await;

    for format in ReportFormat::ALL {
        let bytes = manager.get_artifact(session_id, format).await.unwrap();
        assert!(!bytes.is_empty(), "empty artifact for {format}");
    }

    let xlsx = manager
        .get_artifact(session_id, ReportFormat::Spreadsheet)
        .await
        .unwrap();
    assert!(xlsx.starts_with(b"PK"));

    let json = manager
        .get_artifact(session_id, ReportFormat::StructuredData)
        .await
        .unwrap();
    assert!(serde_json::from_slice::<AssessmentResult>(&json).is_ok());
}

#[tokio::test]
async fn formats_agree_on_the_grand_total() {
    let (manager, session_id) = completed_session().await;
    let expected = dec(FLEET_MONTHLY);

    // Structured data carries the exact decimals
    let json = manager
        .get_artifact(session_id, ReportFormat::StructuredData)
        .await
        .unwrap();
    let parsed: AssessmentResult = serde_json::from_slice(&json).unwrap();
    assert_eq!(parsed.totals.monthly_cost, expected);
    assert_eq!(parsed.totals.annual_cost, expected * Decimal::from(12));
    assert_eq!(parsed.totals.vm_count, 4);
    assert_eq!(parsed.totals.assessed, 3);
    assert_eq!(parsed.totals.failed, 1);
    assert_eq!(parsed.totals.total_ocpus, 7);
    assert_eq!(parsed.totals.total_storage_gib, 650);

    // The delimited grand-total row carries the same exact amount
    let csv = manager
        .get_artifact(session_id, ReportFormat::DelimitedText)
        .await
        .unwrap();
    let rows = csv_rows(&csv);
    let total_row = rows.last().unwrap();
    assert_eq!(total_row[0], "GRAND_TOTAL");
    assert_eq!(dec(&total_row[14]), expected);

    // The text summary shows the same amount, rounded for display
    let txt = String::from_utf8(
        manager
            .get_artifact(session_id, ReportFormat::Summary)
            .await
            .unwrap(),
    )
    .unwrap();
    assert!(txt.contains("\u{20ac}470.89"));
    assert!(txt.contains("\u{20ac}5,650.71"));

    // The workbook carries the exact amount in its sheet XML
    let xlsx = manager
        .get_artifact(session_id, ReportFormat::Spreadsheet)
        .await
        .unwrap();
    assert!(workbook_text(&xlsx).contains(FLEET_MONTHLY));
}

#[tokio::test]
async fn formats_agree_on_per_vm_costs() {
    let (manager, session_id) = completed_session().await;

    let json = manager
        .get_artifact(session_id, ReportFormat::StructuredData)
        .await
        .unwrap();
    let parsed: AssessmentResult = serde_json::from_slice(&json).unwrap();
    let monthly = |name: &str| {
        parsed
            .vms
            .iter()
            .find(|vm| vm.record.name == name)
            .and_then(|vm| vm.cost.as_ref())
            .map(|cost| cost.monthly_total)
            .unwrap()
    };
    assert_eq!(monthly("web-01"), dec("69.19014"));
    assert_eq!(monthly("db-01"), dec("401.70234"));
    assert_eq!(monthly("old-app"), Decimal::ZERO);

    // The delimited rows for one VM sum to the structured total
    let csv = manager
        .get_artifact(session_id, ReportFormat::DelimitedText)
        .await
        .unwrap();
    let rows = csv_rows(&csv);
    let db_rows: Vec<_> = rows.iter().filter(|r| r[0] == "db-01").collect();
    assert_eq!(db_rows.len(), 4);
    assert!(db_rows.iter().any(|r| r[9] == "OS License"));
    let db_sum: Decimal = db_rows.iter().map(|r| dec(&r[14])).sum();
    assert_eq!(db_sum, dec("401.70234"));

    // The text summary shows the same subtotals, rounded for display
    let txt = String::from_utf8(
        manager
            .get_artifact(session_id, ReportFormat::Summary)
            .await
            .unwrap(),
    )
    .unwrap();
    assert!(txt.contains("\u{20ac}69.19"));
    assert!(txt.contains("\u{20ac}401.70"));
}

#[tokio::test]
async fn formats_list_vms_in_the_same_order() {
    let (manager, session_id) = completed_session().await;
    let names = ["web-01", "db-01", "old-app", "broken-vm"];

    let json = manager
        .get_artifact(session_id, ReportFormat::StructuredData)
        .await
        .unwrap();
    let parsed: AssessmentResult = serde_json::from_slice(&json).unwrap();
    let json_names: Vec<&str> = parsed
        .vms
        .iter()
        .map(|vm| vm.record.name.as_str())
        .collect();
    assert_eq!(json_names, names);

    // First appearance in the delimited export follows the same order
    let csv = manager
        .get_artifact(session_id, ReportFormat::DelimitedText)
        .await
        .unwrap();
    let rows = csv_rows(&csv);
    let mut csv_names: Vec<String> = Vec::new();
    for row in &rows[1..] {
        if row[0] != "GRAND_TOTAL" && !csv_names.iter().any(|n| n == &row[0]) {
            csv_names.push(row[0].clone());
        }
    }
    assert_eq!(csv_names, names);

    // So does the first mention of each VM in the text summary
    let txt = String::from_utf8(
        manager
            .get_artifact(session_id, ReportFormat::Summary)
            .await
            .unwrap(),
    )
    .unwrap();
    let positions: Vec<usize> = names.iter().map(|n| txt.find(n).unwrap()).collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn failures_and_notes_reach_every_format() {
    let (manager, session_id) = completed_session().await;

    let csv = String::from_utf8(
        manager
            .get_artifact(session_id, ReportFormat::DelimitedText)
            .await
            .unwrap(),
    )
    .unwrap();
    assert!(csv.contains("broken-vm"));
    assert!(csv.contains("not numeric"));
    assert!(csv.contains("poweredOff"));

    let txt = String::from_utf8(
        manager
            .get_artifact(session_id, ReportFormat::Summary)
            .await
            .unwrap(),
    )
    .unwrap();
    assert!(txt.contains("FAILURES"));
    assert!(txt.contains("WARNINGS (1)"));
    assert!(txt.contains("broken-vm"));

    let xlsx = manager
        .get_artifact(session_id, ReportFormat::Spreadsheet)
        .await
        .unwrap();
    let sheet_text = workbook_text(&xlsx);
    for needle in ["web-01", "db-01", "old-app", "broken-vm", "not numeric"] {
        assert!(sheet_text.contains(needle), "workbook missing {needle:?}");
    }

    let json = manager
        .get_artifact(session_id, ReportFormat::StructuredData)
        .await
        .unwrap();
    let parsed: AssessmentResult = serde_json::from_slice(&json).unwrap();
    assert_eq!(parsed.failures.len(), 1);
    assert_eq!(parsed.failures[0].vm_name, "broken-vm");
    assert_eq!(parsed.warnings.len(), 1);
}

#[tokio::test]
async fn license_component_appears_only_for_the_windows_vm() {
    let (manager, session_id) = completed_session().await;
    let json = manager
        .get_artifact(session_id, ReportFormat::StructuredData)
        .await
        .unwrap();
    let parsed: AssessmentResult = serde_json::from_slice(&json).unwrap();

    let has_license = |name: &str| {
        parsed
            .vms
            .iter()
            .find(|vm| vm.record.name == name)
            .and_then(|vm| vm.cost.as_ref())
            .map(|cost| {
                cost.lines
                    .iter()
                    .any(|l| l.component == CostComponent::License)
            })
            .unwrap()
    };
    assert!(has_license("db-01"));
    assert!(!has_license("web-01"));
}

#[tokio::test]
async fn stored_artifacts_match_a_fresh_render_of_the_same_result() {
    let (manager, session_id) = completed_session().await;
    let result = manager.get_result(session_id).await.unwrap();

    for format in ReportFormat::ALL {
        let stored = manager.get_artifact(session_id, format).await.unwrap();
        let fresh = reports::render(&result, format).unwrap();
        assert_eq!(stored, fresh, "{format} render is not deterministic");
    }
}
