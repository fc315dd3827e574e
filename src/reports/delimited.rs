//! Delimited-text report: one comma-separated row per cost line
//!
//! Flat shape for pivot tables and downstream analysis, so VM attributes
//! are repeated on every row. Monetary cells carry the exact decimal
//! amounts; rounding is left to the consumer. VMs without a cost breakdown
//! still appear, as `Note` rows (powered off) or `Error` rows (invalid or
//! failed), so the export always covers the whole inventory.

use csv::WriterBuilder;

use crate::error::ReportError;
use crate::models::{AssessmentResult, VmAssessment};

const VM_COLUMNS: [&str; 9] = [
    "VM_Name",
    "VM_UUID",
    "OS_Type",
    "Power_State",
    "CPU_Cores",
    "Memory_GiB",
    "Storage_GiB",
    "Shape",
    "OCPUs",
];

pub fn render(result: &AssessmentResult) -> Result<Vec<u8>, ReportError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());

    let mut header: Vec<String> = VM_COLUMNS.iter().map(|c| c.to_string()).collect();
    header.extend([
        "Component_Type".to_string(),
        "Description".to_string(),
        "Quantity".to_string(),
        "Unit".to_string(),
        format!("Unit_Price_{}", result.currency),
        format!("Monthly_Cost_{}", result.currency),
        "Note".to_string(),
    ]);
    writer.write_record(&header)?;

    for vm in &result.vms {
        let prefix = vm_columns(vm);
        match &vm.cost {
            Some(cost) => {
                for line in &cost.lines {
                    let mut row = prefix.to_vec();
                    row.extend([
                        line.component.to_string(),
                        line.description.clone(),
                        line.quantity.to_string(),
                        line.unit.clone(),
                        line.unit_price.to_string(),
                        line.monthly_cost.to_string(),
                        line.note.clone().unwrap_or_default(),
                    ]);
                    writer.write_record(&row)?;
                }
                for note in &cost.notes {
                    let mut row = prefix.to_vec();
                    row.extend([
                        "Note".to_string(),
                        note.clone(),
                        String::new(),
                        String::new(),
                        String::new(),
                        "0".to_string(),
                        String::new(),
                    ]);
                    writer.write_record(&row)?;
                }
            }
            None => {
                let reason = result
                    .failure_reason(vm)
                    .unwrap_or("not assessed")
                    .to_string();
                let mut row = prefix.to_vec();
                row.extend([
                    "Error".to_string(),
                    reason,
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                ]);
                writer.write_record(&row)?;
            }
        }
    }

    let mut total_row = vec![String::new(); header.len()];
    total_row[0] = "GRAND_TOTAL".to_string();
    total_row[9] = "Total".to_string();
    total_row[10] = format!("Total monthly cost for {} VMs", result.totals.vm_count);
    total_row[14] = result.totals.monthly_cost.to_string();
    writer.write_record(&total_row)?;

    writer
        .into_inner()
        .map_err(|e| ReportError::Buffer(e.to_string()))
}

fn vm_columns(vm: &VmAssessment) -> [String; 9] {
    let record = &vm.record;
    let os = if record.os_edition.is_empty() {
        record.os_family.to_string()
    } else {
        record.os_edition.clone()
    };
    // Allocated storage once sized, source storage otherwise
    let storage_gib = match &vm.sizing {
        Some(sizing) => sizing.total_storage_gib().to_string(),
        None => record.total_disk_gib().to_string(),
    };
    let (shape, ocpus) = match &vm.sizing {
        Some(sizing) => (sizing.shape.clone(), sizing.ocpus.to_string()),
        None => (String::new(), String::new()),
    };
    [
        record.name.clone(),
        record.id.clone(),
        os,
        record.power_state.to_string(),
        record.vcpus.to_string(),
        record.memory_gib().to_string(),
        storage_gib,
        shape,
        ocpus,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::fixtures::sample_result;

    fn rows(bytes: &[u8]) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(bytes);
        reader
            .records()
            .map(|r| r.unwrap().iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn header_embeds_result_currency() {
        let bytes = render(&sample_result()).unwrap();
        let rows = rows(&bytes);
        assert_eq!(rows[0][13], "Unit_Price_EUR");
        assert_eq!(rows[0][14], "Monthly_Cost_EUR");
    }

    #[test]
    fn one_row_per_cost_line_with_vm_attributes_repeated() {
        let bytes = render(&sample_result()).unwrap();
        let rows = rows(&bytes);
        let web: Vec<_> = rows.iter().filter(|r| r[0] == "web-01").collect();
        assert_eq!(web.len(), 3);
        for row in &web {
            assert_eq!(row[1], "uuid-web-01");
            assert_eq!(row[7], "VM.Standard.E4.Flex");
            assert_eq!(row[8], "2");
        }
        assert_eq!(web[0][9], "Compute");
        assert_eq!(web[2][9], "Storage");
        assert_eq!(web[2][14], "3.9525");
    }

    #[test]
    fn powered_off_vm_appears_as_zero_cost_note_row() {
        let bytes = render(&sample_result()).unwrap();
        let rows = rows(&bytes);
        let db: Vec<_> = rows.iter().filter(|r| r[0] == "db-01").collect();
        assert_eq!(db.len(), 1);
        assert_eq!(db[0][9], "Note");
        assert!(db[0][10].contains("poweredOff"));
        assert_eq!(db[0][14], "0");
    }

    #[test]
    fn failed_vm_appears_as_error_row() {
        let bytes = render(&sample_result()).unwrap();
        let rows = rows(&bytes);
        let legacy: Vec<_> = rows.iter().filter(|r| r[0] == "legacy-app").collect();
        assert_eq!(legacy.len(), 1);
        assert_eq!(legacy[0][9], "Error");
        assert!(legacy[0][10].contains("not numeric"));
    }

    #[test]
    fn grand_total_row_closes_the_export() {
        let bytes = render(&sample_result()).unwrap();
        let rows = rows(&bytes);
        let last = rows.last().unwrap();
        assert_eq!(last[0], "GRAND_TOTAL");
        assert_eq!(last[14], "67.60914");
    }

    #[test]
    fn rendering_twice_yields_identical_bytes() {
        let result = sample_result();
        assert_eq!(render(&result).unwrap(), render(&result).unwrap());
    }
}
