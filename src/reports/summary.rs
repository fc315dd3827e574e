//! Text summary report
//!
//! 80-column plain text for reading in a terminal or pasting into a
//! ticket: executive summary, per-VM cost breakdown with the sizing rules
//! that fired, then failures and warnings so nothing silent leaves the
//! pipeline.

use crate::error::ReportError;
use crate::models::{AssessmentResult, VmAssessment};
use crate::pricing::currency;

const WIDTH: usize = 80;

pub fn render(result: &AssessmentResult) -> Result<Vec<u8>, ReportError> {
    let heavy = "=".repeat(WIDTH);
    let light = "-".repeat(40);
    let wide = "-".repeat(WIDTH);
    let mut out: Vec<String> = Vec::new();

    out.push(heavy.clone());
    out.push(center("CLOUD MIGRATION ASSESSMENT REPORT"));
    out.push(heavy.clone());
    out.push(String::new());
    out.push(format!(
        "Generated: {}",
        result.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push(format!("Source:    {}", result.source_name));
    out.push(format!(
        "Catalogs:  shapes {} / pricing {}",
        result.shape_catalog_version, result.pricing_catalog_version
    ));
    out.push(format!("Currency:  {}", result.currency));
    out.push(String::new());

    out.push("EXECUTIVE SUMMARY".to_string());
    out.push(light.clone());
    let totals = &result.totals;
    out.push(stat("Virtual machines analyzed:", totals.vm_count));
    out.push(stat("  Powered on:", totals.powered_on));
    out.push(stat("  Powered off / suspended:", totals.powered_off));
    out.push(stat("  Fully assessed:", totals.assessed));
    out.push(stat("  Failed:", totals.failed));
    out.push(stat("Source vCPUs:", totals.source_vcpus));
    out.push(format!(
        "{:<28}{:.1} GiB",
        "Source memory:", totals.source_memory_gib
    ));
    out.push(stat("Allocated OCPUs:", totals.total_ocpus));
    out.push(format!(
        "{:<28}{} GiB",
        "Allocated storage:", totals.total_storage_gib
    ));
    out.push(format!(
        "{:<28}{}",
        "Estimated monthly cost:",
        currency::format_amount(totals.monthly_cost, &result.currency)
    ));
    out.push(format!(
        "{:<28}{}",
        "Estimated annual cost:",
        currency::format_amount(totals.annual_cost, &result.currency)
    ));
    out.push(String::new());

    out.push("OS DISTRIBUTION".to_string());
    out.push(light.clone());
    for (os, count) in &result.os_distribution {
        out.push(format!("  {os}: {count} VMs"));
    }
    out.push(String::new());

    out.push("DETAILED COST BREAKDOWN BY VM".to_string());
    out.push(wide);
    for vm in &result.vms {
        out.push(String::new());
        push_vm(&mut out, result, vm);
    }
    out.push(String::new());

    if !result.failures.is_empty() {
        out.push("FAILURES".to_string());
        out.push(light.clone());
        for failure in &result.failures {
            out.push(format!(
                "  {} ({}): {}",
                failure.vm_name, failure.stage, failure.reason
            ));
        }
        out.push(String::new());
    }

    if !result.warnings.is_empty() {
        out.push(format!("WARNINGS ({})", result.warnings.len()));
        out.push(light);
        for warning in &result.warnings {
            out.push(format!("  - {warning}"));
        }
        out.push(String::new());
    }

    out.push(heavy.clone());
    out.push(format!(
        "{:<24}{}",
        "GRAND TOTAL (monthly):",
        currency::format_amount(totals.monthly_cost, &result.currency)
    ));
    out.push(format!(
        "{:<24}{}",
        "GRAND TOTAL (annual):",
        currency::format_amount(totals.annual_cost, &result.currency)
    ));
    out.push(heavy);
    out.push(String::new());

    // Free-text lines (warnings, rules, OS strings) carry arbitrary
    // inventory text; clamp every line to the report width
    let text = out
        .iter()
        .map(|line| fit(line, WIDTH))
        .collect::<Vec<_>>()
        .join("\n");
    Ok(text.into_bytes())
}

fn push_vm(out: &mut Vec<String>, result: &AssessmentResult, vm: &VmAssessment) {
    let record = &vm.record;
    out.push(format!("VM: {}", record.name));
    let os = if record.os_edition.is_empty() {
        record.os_family.to_string()
    } else {
        record.os_edition.clone()
    };
    out.push(format!("  OS: {}, Power: {}", os, record.power_state));
    if record.cluster.is_some() || record.host.is_some() {
        out.push(format!(
            "  Cluster: {}, Host: {}",
            record.cluster.as_deref().unwrap_or("-"),
            record.host.as_deref().unwrap_or("-")
        ));
    }

    if let Some(sizing) = &vm.sizing {
        out.push(format!(
            "  Sized: {}, {} OCPU, {} GiB memory, {} GiB storage",
            sizing.shape,
            sizing.ocpus,
            sizing.memory_gib,
            sizing.total_storage_gib()
        ));
        for rule in &sizing.rules_applied {
            out.push(format!("  Rule: {rule}"));
        }
    }

    match &vm.cost {
        Some(cost) => {
            for line in &cost.lines {
                let description = match &line.note {
                    Some(note) => format!("{} ({note})", line.description),
                    None => line.description.clone(),
                };
                out.push(format!(
                    "  {:<12} {:<40} {:>24}",
                    line.component.to_string(),
                    fit(&description, 40),
                    currency::format_amount(line.monthly_cost, &cost.currency)
                ));
            }
            for note in &cost.notes {
                out.push(format!("  Note: {note}"));
            }
            out.push(format!(
                "  {:<53} {:>24}",
                "VM SUBTOTAL",
                currency::format_amount(cost.monthly_total, &cost.currency)
            ));
        }
        None => {
            let reason = result.failure_reason(vm).unwrap_or("not assessed");
            out.push(format!("  Error: {reason}"));
        }
    }
}

fn stat(label: &str, value: impl std::fmt::Display) -> String {
    format!("{label:<28}{value}")
}

fn center(text: &str) -> String {
    let len = text.chars().count();
    if len >= WIDTH {
        return text.to_string();
    }
    format!("{}{}", " ".repeat((WIDTH - len) / 2), text)
}

/// Truncate to `width` display characters, marking the cut with `...`
fn fit(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}
