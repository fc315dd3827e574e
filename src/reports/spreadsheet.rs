//! Spreadsheet report: a six-sheet workbook
//!
//! Two audiences share the file. The first three sheets are the sales
//! view (executive summary, per-component cost summary, savings
//! scenarios); the last three are the technical view (per-VM sizing,
//! the full cost breakdown, and failures/warnings).
//!
//! The workbook creation date is pinned to the result's generation
//! timestamp so rendering the same result twice yields identical bytes.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{
    DocProperties, ExcelDateTime, Format, FormatBorder, Workbook, Worksheet, XlsxError,
};

use crate::error::ReportError;
use crate::models::{AssessmentResult, CostComponent, VmAssessment};

/// Savings scenarios offered to every customer: label, percent of the
/// monthly total, and the pitch. Powered-off VMs already price at zero,
/// so eliminating them saves nothing on the cloud bill.
const SAVINGS_SCENARIOS: [(&str, u32, &str); 5] = [
    (
        "Right-sizing VMs (10% reduction)",
        10,
        "Optimize VM sizes based on actual usage",
    ),
    (
        "Reserved Instances (20% discount)",
        20,
        "Commit to 1-3 year terms for predictable workloads",
    ),
    (
        "Automated Scaling (15% reduction)",
        15,
        "Implement auto-scaling for variable workloads",
    ),
    (
        "Storage Optimization (8% reduction)",
        8,
        "Implement tiered storage and compression",
    ),
    (
        "Eliminate Powered-Off VMs",
        0,
        "Remove or consolidate inactive virtual machines",
    ),
];

struct Styles {
    title: Format,
    section: Format,
    header: Format,
    bold: Format,
    money: Format,
    money_total: Format,
    percent: Format,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Format::new().set_bold().set_font_size(16),
            section: Format::new().set_bold().set_font_size(12),
            header: Format::new()
                .set_bold()
                .set_border_bottom(FormatBorder::Thin),
            bold: Format::new().set_bold(),
            money: Format::new().set_num_format("#,##0.00"),
            money_total: Format::new().set_bold().set_num_format("#,##0.00"),
            percent: Format::new().set_num_format("0.0%"),
        }
    }
}

pub fn render(result: &AssessmentResult) -> Result<Vec<u8>, ReportError> {
    let mut workbook = Workbook::new();
    let created = ExcelDateTime::from_timestamp(result.generated_at.timestamp())?;
    workbook.set_properties(&DocProperties::new().set_creation_datetime(&created));

    let styles = Styles::new();
    executive_summary(
        workbook.add_worksheet().set_name("Executive Summary")?,
        result,
        &styles,
    )?;
    cost_summary(
        workbook.add_worksheet().set_name("Cost Summary")?,
        result,
        &styles,
    )?;
    savings(
        workbook.add_worksheet().set_name("Savings Opportunities")?,
        result,
        &styles,
    )?;
    vm_sizing(
        workbook.add_worksheet().set_name("VM Sizing")?,
        result,
        &styles,
    )?;
    cost_breakdown(
        workbook.add_worksheet().set_name("Cost Breakdown")?,
        result,
        &styles,
    )?;
    errors_and_warnings(
        workbook.add_worksheet().set_name("Errors & Warnings")?,
        result,
        &styles,
    )?;

    Ok(workbook.save_to_buffer()?)
}

fn executive_summary(
    sheet: &mut Worksheet,
    result: &AssessmentResult,
    styles: &Styles,
) -> Result<(), XlsxError> {
    sheet.set_column_width(0, 32)?;
    sheet.set_column_width(1, 26)?;
    sheet.merge_range(0, 0, 0, 5, "Cloud Migration Assessment Report", &styles.title)?;

    let mut row = 2;
    let meta = [
        (
            "Generated",
            result
                .generated_at
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string(),
        ),
        ("Source file", result.source_name.clone()),
        ("Shape catalog", result.shape_catalog_version.clone()),
        ("Pricing catalog", result.pricing_catalog_version.clone()),
        ("Currency", result.currency.clone()),
    ];
    for (label, value) in meta {
        sheet.write_string_with_format(row, 0, label, &styles.bold)?;
        sheet.write_string(row, 1, value)?;
        row += 1;
    }

    row += 1;
    sheet.write_string_with_format(row, 0, "Fleet overview", &styles.section)?;
    row += 1;
    let totals = &result.totals;
    let counts = [
        ("Virtual machines", totals.vm_count as f64),
        ("Powered on", totals.powered_on as f64),
        ("Powered off / suspended", totals.powered_off as f64),
        ("Fully assessed", totals.assessed as f64),
        ("Failed", totals.failed as f64),
        ("Source vCPUs", totals.source_vcpus as f64),
        ("Source memory (GiB)", totals.source_memory_gib),
        ("Allocated OCPUs", totals.total_ocpus as f64),
        ("Allocated storage (GiB)", totals.total_storage_gib as f64),
    ];
    for (label, value) in counts {
        sheet.write_string(row, 0, label)?;
        sheet.write_number(row, 1, value)?;
        row += 1;
    }
    sheet.write_string(
        row,
        0,
        format!("Estimated monthly cost ({})", result.currency),
    )?;
    sheet.write_number_with_format(row, 1, money(totals.monthly_cost), &styles.money)?;
    row += 1;
    sheet.write_string(
        row,
        0,
        format!("Estimated annual cost ({})", result.currency),
    )?;
    sheet.write_number_with_format(row, 1, money(totals.annual_cost), &styles.money)?;
    row += 2;

    sheet.write_string_with_format(row, 0, "OS distribution", &styles.section)?;
    row += 1;
    header_row(sheet, row, &["OS", "VMs", "Share"], &styles.header)?;
    row += 1;
    for (os, count) in &result.os_distribution {
        sheet.write_string(row, 0, os)?;
        sheet.write_number(row, 1, *count as f64)?;
        let share = if totals.vm_count == 0 {
            0.0
        } else {
            *count as f64 / totals.vm_count as f64
        };
        sheet.write_number_with_format(row, 2, share, &styles.percent)?;
        row += 1;
    }
    Ok(())
}

fn cost_summary(
    sheet: &mut Worksheet,
    result: &AssessmentResult,
    styles: &Styles,
) -> Result<(), XlsxError> {
    sheet.set_column_width(0, 18)?;
    sheet.set_column_width(1, 22)?;
    sheet.set_column_width(2, 22)?;
    let headers = [
        "Component".to_string(),
        format!("Monthly Cost ({})", result.currency),
        format!("Annual Cost ({})", result.currency),
    ];
    for (i, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, i as u16, header, &styles.header)?;
    }

    let mut row = 1;
    for component in [
        CostComponent::Compute,
        CostComponent::Memory,
        CostComponent::Storage,
        CostComponent::License,
    ] {
        let monthly: Decimal = result
            .vms
            .iter()
            .filter_map(|v| v.cost.as_ref())
            .flat_map(|c| &c.lines)
            .filter(|l| l.component == component)
            .map(|l| l.monthly_cost)
            .sum();
        sheet.write_string(row, 0, component.to_string())?;
        sheet.write_number_with_format(row, 1, money(monthly), &styles.money)?;
        sheet.write_number_with_format(
            row,
            2,
            money(monthly * Decimal::from(12u32)),
            &styles.money,
        )?;
        row += 1;
    }
    sheet.write_string_with_format(row, 0, "TOTAL", &styles.bold)?;
    sheet.write_number_with_format(row, 1, money(result.totals.monthly_cost), &styles.money_total)?;
    sheet.write_number_with_format(row, 2, money(result.totals.annual_cost), &styles.money_total)?;
    Ok(())
}

fn savings(
    sheet: &mut Worksheet,
    result: &AssessmentResult,
    styles: &Styles,
) -> Result<(), XlsxError> {
    sheet.set_column_width(0, 34)?;
    sheet.set_column_width(1, 18)?;
    sheet.set_column_width(2, 18)?;
    sheet.set_column_width(3, 48)?;
    sheet.merge_range(0, 0, 0, 3, "Potential Savings Opportunities", &styles.title)?;
    header_row(
        sheet,
        2,
        &[
            "Optimization Opportunity",
            "Monthly Savings",
            "Annual Savings",
            "Description",
        ],
        &styles.header,
    )?;

    let monthly = result.totals.monthly_cost;
    let twelve = Decimal::from(12u32);
    let mut row = 3;
    let mut total_savings = Decimal::ZERO;
    for (label, percent, description) in SAVINGS_SCENARIOS {
        let saving = monthly * Decimal::new(percent.into(), 2);
        total_savings += saving;
        sheet.write_string(row, 0, label)?;
        sheet.write_number_with_format(row, 1, money(saving), &styles.money)?;
        sheet.write_number_with_format(row, 2, money(saving * twelve), &styles.money)?;
        sheet.write_string(row, 3, description)?;
        row += 1;
    }
    sheet.write_string_with_format(row, 0, "TOTAL POTENTIAL SAVINGS", &styles.bold)?;
    sheet.write_number_with_format(row, 1, money(total_savings), &styles.money_total)?;
    sheet.write_number_with_format(row, 2, money(total_savings * twelve), &styles.money_total)?;
    row += 2;

    sheet.write_string_with_format(row, 0, "ROI Analysis", &styles.section)?;
    row += 1;
    let annual = result.totals.annual_cost;
    let annual_savings = total_savings * twelve;
    for (label, value) in [
        ("Original Annual Cost", annual),
        ("Optimized Annual Cost", annual - annual_savings),
        ("Total Annual Savings", annual_savings),
    ] {
        sheet.write_string(row, 0, label)?;
        sheet.write_number_with_format(row, 1, money(value), &styles.money)?;
        row += 1;
    }
    sheet.write_string(row, 0, "ROI Percentage")?;
    let roi = if annual.is_zero() {
        0.0
    } else {
        money(annual_savings) / money(annual) * 100.0
    };
    sheet.write_string(row, 1, format!("{roi:.1}%"))?;
    Ok(())
}

fn vm_sizing(
    sheet: &mut Worksheet,
    result: &AssessmentResult,
    styles: &Styles,
) -> Result<(), XlsxError> {
    sheet.set_column_width(0, 24)?;
    sheet.set_column_width(1, 38)?;
    sheet.set_column_width(2, 34)?;
    sheet.set_column_width(7, 22)?;
    sheet.set_column_width(11, 44)?;
    header_row(
        sheet,
        0,
        &[
            "VM Name",
            "UUID",
            "OS",
            "Power State",
            "vCPUs",
            "Memory (GiB)",
            "Disk (GiB)",
            "Shape",
            "OCPUs",
            "Allocated Memory (GiB)",
            "Allocated Storage (GiB)",
            "Status",
        ],
        &styles.header,
    )?;

    let mut row = 1;
    for vm in &result.vms {
        let record = &vm.record;
        sheet.write_string(row, 0, &record.name)?;
        sheet.write_string(row, 1, &record.id)?;
        let os = if record.os_edition.is_empty() {
            record.os_family.to_string()
        } else {
            record.os_edition.clone()
        };
        sheet.write_string(row, 2, os)?;
        sheet.write_string(row, 3, record.power_state.to_string())?;
        sheet.write_number(row, 4, record.vcpus as f64)?;
        sheet.write_number(row, 5, record.memory_gib())?;
        sheet.write_number(row, 6, record.total_disk_gib())?;
        if let Some(sizing) = &vm.sizing {
            sheet.write_string(row, 7, &sizing.shape)?;
            sheet.write_number(row, 8, sizing.ocpus as f64)?;
            sheet.write_number(row, 9, sizing.memory_gib as f64)?;
            sheet.write_number(row, 10, sizing.total_storage_gib() as f64)?;
        }
        sheet.write_string(row, 11, status_of(result, vm))?;
        row += 1;
    }
    Ok(())
}

fn status_of(result: &AssessmentResult, vm: &VmAssessment) -> String {
    match &vm.cost {
        Some(cost) if !cost.lines.is_empty() => "Priced".to_string(),
        Some(cost) => cost
            .notes
            .first()
            .cloned()
            .unwrap_or_else(|| "Excluded from cost".to_string()),
        None => format!(
            "Error: {}",
            result.failure_reason(vm).unwrap_or("not assessed")
        ),
    }
}

fn cost_breakdown(
    sheet: &mut Worksheet,
    result: &AssessmentResult,
    styles: &Styles,
) -> Result<(), XlsxError> {
    sheet.set_column_width(0, 24)?;
    sheet.set_column_width(2, 46)?;
    sheet.set_column_width(5, 18)?;
    sheet.set_column_width(6, 18)?;
    sheet.set_column_width(7, 18)?;
    let headers = [
        "VM Name".to_string(),
        "Component".to_string(),
        "Description".to_string(),
        "Quantity".to_string(),
        "Unit".to_string(),
        format!("Unit Price ({})", result.currency),
        format!("Monthly Cost ({})", result.currency),
        format!("Annual Cost ({})", result.currency),
    ];
    for (i, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, i as u16, header, &styles.header)?;
    }

    let twelve = Decimal::from(12u32);
    let mut row = 1;
    for vm in &result.vms {
        let name = &vm.record.name;
        match &vm.cost {
            Some(cost) => {
                for line in &cost.lines {
                    sheet.write_string(row, 0, name)?;
                    sheet.write_string(row, 1, line.component.to_string())?;
                    let description = match &line.note {
                        Some(note) => format!("{} ({note})", line.description),
                        None => line.description.clone(),
                    };
                    sheet.write_string(row, 2, description)?;
                    sheet.write_number(row, 3, money(line.quantity))?;
                    sheet.write_string(row, 4, &line.unit)?;
                    sheet.write_number_with_format(row, 5, money(line.unit_price), &styles.money)?;
                    sheet.write_number_with_format(
                        row,
                        6,
                        money(line.monthly_cost),
                        &styles.money,
                    )?;
                    sheet.write_number_with_format(
                        row,
                        7,
                        money(line.monthly_cost * twelve),
                        &styles.money,
                    )?;
                    row += 1;
                }
                for note in &cost.notes {
                    sheet.write_string(row, 0, name)?;
                    sheet.write_string(row, 1, "Note")?;
                    sheet.write_string(row, 2, note)?;
                    row += 1;
                }
                if !cost.lines.is_empty() {
                    sheet.write_string(row, 0, name)?;
                    sheet.write_string_with_format(row, 1, "Subtotal", &styles.bold)?;
                    sheet.write_number_with_format(
                        row,
                        6,
                        money(cost.monthly_total),
                        &styles.money_total,
                    )?;
                    sheet.write_number_with_format(
                        row,
                        7,
                        money(cost.annual_total()),
                        &styles.money_total,
                    )?;
                    row += 1;
                }
            }
            None => {
                sheet.write_string(row, 0, name)?;
                sheet.write_string(row, 1, "Error")?;
                sheet.write_string(row, 2, result.failure_reason(vm).unwrap_or("not assessed"))?;
                row += 1;
            }
        }
    }

    row += 1;
    sheet.write_string_with_format(row, 0, "GRAND TOTAL", &styles.bold)?;
    sheet.write_number_with_format(row, 6, money(result.totals.monthly_cost), &styles.money_total)?;
    sheet.write_number_with_format(row, 7, money(result.totals.annual_cost), &styles.money_total)?;
    Ok(())
}

fn errors_and_warnings(
    sheet: &mut Worksheet,
    result: &AssessmentResult,
    styles: &Styles,
) -> Result<(), XlsxError> {
    sheet.set_column_width(0, 10)?;
    sheet.set_column_width(1, 24)?;
    sheet.set_column_width(2, 10)?;
    sheet.set_column_width(3, 70)?;
    header_row(sheet, 0, &["Type", "VM", "Stage", "Detail"], &styles.header)?;

    let mut row = 1;
    for failure in &result.failures {
        sheet.write_string(row, 0, "Failure")?;
        sheet.write_string(row, 1, &failure.vm_name)?;
        sheet.write_string(row, 2, failure.stage.to_string())?;
        sheet.write_string(row, 3, &failure.reason)?;
        row += 1;
    }
    for warning in &result.warnings {
        sheet.write_string(row, 0, "Warning")?;
        sheet.write_string(row, 3, warning)?;
        row += 1;
    }
    if result.failures.is_empty() && result.warnings.is_empty() {
        sheet.write_string(row, 0, "None")?;
        sheet.write_string(row, 3, "No failures or warnings recorded")?;
    }
    Ok(())
}

fn header_row(
    sheet: &mut Worksheet,
    row: u32,
    headers: &[&str],
    style: &Format,
) -> Result<(), XlsxError> {
    for (i, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(row, i as u16, *header, style)?;
    }
    Ok(())
}

fn money(amount: Decimal) -> f64 {
    amount.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use zip::ZipArchive;

    use super::*;
    use crate::reports::fixtures::sample_result;

    /// Concatenated text of every file in the workbook archive
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

    #[test]
    fn workbook_has_all_six_sheets() {
        let text = workbook_text(&render(&sample_result()).unwrap());
        for name in [
            "Executive Summary",
            "Cost Summary",
            "Savings Opportunities",
            "VM Sizing",
            "Cost Breakdown",
            "Errors &amp; Warnings",
        ] {
            assert!(text.contains(name), "missing sheet {name:?}");
        }
    }

    #[test]
    fn savings_sheet_lists_scenarios_and_roi() {
        let text = workbook_text(&render(&sample_result()).unwrap());
        assert!(text.contains("Right-sizing VMs (10% reduction)"));
        assert!(text.contains("Reserved Instances (20% discount)"));
        assert!(text.contains("Eliminate Powered-Off VMs"));
        assert!(text.contains("TOTAL POTENTIAL SAVINGS"));
        assert!(text.contains("ROI Percentage"));
    }

    #[test]
    fn failures_and_warnings_reach_their_sheet() {
        let text = workbook_text(&render(&sample_result()).unwrap());
        assert!(text.contains("is not numeric"));
        assert!(text.contains("excluded from monthly cost"));
    }

    #[test]
    fn rendering_twice_yields_identical_bytes() {
        let result = sample_result();
        assert_eq!(render(&result).unwrap(), render(&result).unwrap());
    }

    #[test]
    fn renders_an_empty_fleet() {
        let result = AssessmentResult::new(
            "empty.zip",
            "built-in",
            "built-in",
            "EUR",
            Vec::new(),
            Vec::new(),
            Vec::new(),
        );
        let bytes = render(&result).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }
}
