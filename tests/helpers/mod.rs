//! Shared fixtures for the integration suites
//!
//! Builds in-memory inventory archives and session managers backed by a
//! memory artifact store, so the suites never touch the filesystem.

use std::io::{Cursor, Write};
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use uuid::Uuid;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use vmbom::artifacts::MemoryArtifactStore;
use vmbom::catalog::{PricingCatalog, ShapeCatalog};
use vmbom::models::SessionStatus;
use vmbom::{PipelineConfig, SessionManager};

/// OS configuration string for a Linux guest, as export tools spell it
pub const LINUX: &str = "Ubuntu Linux (64-bit)";

/// OS configuration string for a Windows Server guest
pub const WINDOWS: &str = "Microsoft Windows Server 2019 (64-bit)";

/// Zip the given (file name, body) pairs into an in-memory archive
pub fn archive(sheets: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::<()>::default().compression_method(CompressionMethod::Stored);
    for (name, body) in sheets {
        writer.start_file(*name, options).unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Inventory archive with one row per VM: name, vCPU count, memory MiB,
/// OS string, power state. Numeric cells are passed as strings so tests
/// can inject malformed values. The disk sheet is present but empty;
/// disk-bearing fixtures build their sheets by hand with [`archive`].
pub fn inventory(vms: &[(&str, &str, &str, &str, &str)]) -> Vec<u8> {
    let mut cpu = String::from("VM;VM UUID;CPUs\n");
    let mut memory = String::from("VM;VM UUID;Size MiB\n");
    let mut info = String::from("VM;VM UUID;OS according to the configuration file;Powerstate\n");
    for (name, cpus, mib, os, power) in vms {
        cpu.push_str(&format!("{name};u-{name};{cpus}\n"));
        memory.push_str(&format!("{name};u-{name};{mib}\n"));
        info.push_str(&format!("{name};u-{name};{os};{power}\n"));
    }
    archive(&[
        ("RVTools_tabvCPU.csv", cpu.as_str()),
        ("RVTools_tabvMemory.csv", memory.as_str()),
        ("RVTools_tabvDisk.csv", "VM;VM UUID;Disk;Capacity MiB\n"),
        ("RVTools_tabvInfo.csv", info.as_str()),
    ])
}

/// Default configuration with the minimum upload size dropped, so the
/// small fixtures used here clear the size check
pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        min_upload_bytes: 1,
        ..PipelineConfig::default()
    }
}

/// Manager over the default catalogs and an in-memory artifact store
pub fn manager() -> Arc<SessionManager> {
    manager_with(
        test_config(),
        ShapeCatalog::default(),
        PricingCatalog::default(),
    )
}

/// Manager over explicit configuration and catalogs
pub fn manager_with(
    config: PipelineConfig,
    shapes: ShapeCatalog,
    pricing: PricingCatalog,
) -> Arc<SessionManager> {
    init_test_logging();
    let store = Arc::new(MemoryArtifactStore::new());
    Arc::new(SessionManager::new(config, shapes, pricing, store).unwrap())
}

/// Route pipeline logs to the test output when `RUST_LOG` asks for them.
/// Safe to call repeatedly; only the first call installs the subscriber.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vmbom=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Poll a session until it reaches a terminal state
pub async fn wait_until_terminal(manager: &SessionManager, session_id: Uuid) -> SessionStatus {
    for _ in 0..1000 {
        let status = manager.get_status(session_id).await.unwrap();
        if status.state.is_terminal() {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("session {session_id} never reached a terminal state");
}

/// Exact decimal from a literal
pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}
