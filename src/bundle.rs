use crate::report::{BulkOutcome, BulkReports};
use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const SUMMARY_ENTRY: &str = "GENERATION_SUMMARY.txt";
const REPORTS_DIR: &str = "reports";
pub const BUNDLE_FORMAT_V1: &str = "gradebook-report-bundle-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub report_count: usize,
}

#[derive(Debug, Clone)]
pub struct VerifySummary {
    pub bundle_format: String,
    pub verified_entries: usize,
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn file_safe(s: &str) -> String {
    let cleaned: String = s
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

pub fn report_entry_name(student_id: &str, last_name: &str, term_label: &str) -> String {
    format!(
        "{}/Report_{}_{}_{}.json",
        REPORTS_DIR,
        file_safe(student_id),
        file_safe(last_name),
        term_label
    )
}

/// Distinct ids can sanitise to the same name; later ones get `_2`, `_3`...
fn claim_entry_name(name: String, used: &mut HashSet<String>) -> String {
    if used.insert(name.clone()) {
        return name;
    }
    let stem = name.strip_suffix(".json").unwrap_or(&name);
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}.json", stem, n);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn generation_summary(bulk: &BulkReports, generated_at: &DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str("Report Generation Summary\n");
    out.push_str("========================\n");
    out.push_str(&format!("Form: {}\n", bulk.form));
    out.push_str(&format!("Term: {}\n", bulk.term.file_label()));
    out.push_str(&format!("Total Students: {}\n", bulk.summary.total));
    out.push_str(&format!(
        "Successfully Generated: {}\n",
        bulk.summary.successful
    ));
    out.push_str(&format!("Failed: {}\n", bulk.summary.failed));
    out.push_str(&format!(
        "Generated on: {}\n",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    let failures: Vec<_> = bulk
        .entries
        .iter()
        .filter_map(|e| match &e.outcome {
            BulkOutcome::Failed { message } => Some((e, message)),
            BulkOutcome::Generated { .. } => None,
        })
        .collect();
    if !failures.is_empty() {
        out.push_str("\nFailures:\n");
        for (e, message) in failures {
            out.push_str(&format!("- {} {}: {}\n", e.student_id, e.last_name, message));
        }
    }
    out
}

/// Writes one JSON report per generated student plus a summary and a
/// manifest carrying a SHA-256 for every other entry.
pub fn export_report_bundle(
    bulk: &BulkReports,
    school: &serde_json::Value,
    out_path: &Path,
    generated_at: DateTime<Utc>,
) -> anyhow::Result<ExportSummary> {
    let mut entries: Vec<(String, Option<String>, Vec<u8>)> = Vec::new();
    let mut used_names = HashSet::new();
    for e in &bulk.entries {
        let BulkOutcome::Generated { report } = &e.outcome else {
            continue;
        };
        let body = serde_json::to_vec_pretty(&json!({
            "school": school,
            "report": report,
        }))
        .with_context(|| format!("failed to serialize report for {}", e.student_id))?;
        entries.push((
            claim_entry_name(
                report_entry_name(&e.student_id, &e.last_name, bulk.term.file_label()),
                &mut used_names,
            ),
            Some(e.student_id.clone()),
            body,
        ));
    }
    let report_count = entries.len();
    entries.push((
        SUMMARY_ENTRY.to_string(),
        None,
        generation_summary(bulk, &generated_at).into_bytes(),
    ));

    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "form": bulk.form,
        "term": bulk.term,
        "generatedAt": generated_at.to_rfc3339(),
        "summary": bulk.summary,
        "entries": entries
            .iter()
            .map(|(name, student_id, bytes)| json!({
                "name": name,
                "studentId": student_id,
                "sha256": sha256_hex(bytes),
            }))
            .collect::<Vec<_>>(),
    });

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    for (name, _, bytes) in &entries {
        zip.start_file(name.as_str(), opts)
            .with_context(|| format!("failed to start entry {}", name))?;
        zip.write_all(bytes)
            .with_context(|| format!("failed to write entry {}", name))?;
    }

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: entries.len() + 1,
        report_count,
    })
}

/// Re-hashes every entry listed in the manifest.
pub fn verify_report_bundle(in_path: &Path) -> anyhow::Result<VerifySummary> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }

    let listed = manifest
        .get("entries")
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow!("manifest.json has no entries"))?;
    for entry in listed {
        let name = entry
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("manifest entry without name"))?;
        let expected = entry.get("sha256").and_then(|v| v.as_str()).unwrap_or("");
        let mut bytes = Vec::new();
        archive
            .by_name(name)
            .with_context(|| format!("bundle missing {}", name))?
            .read_to_end(&mut bytes)
            .with_context(|| format!("failed to read {}", name))?;
        if sha256_hex(&bytes) != expected {
            return Err(anyhow!("checksum mismatch for {}", name));
        }
    }

    Ok(VerifySummary {
        bundle_format: format.to_string(),
        verified_entries: listed.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Form, Term};
    use crate::report::{BulkEntry, BulkSummary};

    fn failed_only() -> BulkReports {
        BulkReports {
            form: Form::F2,
            term: Term::T3,
            entries: vec![BulkEntry {
                student_id: "S9".into(),
                last_name: "O'Neil".into(),
                outcome: BulkOutcome::Failed {
                    message: "invalid score: 140 is outside 0..=100".into(),
                },
            }],
            summary: BulkSummary {
                total: 1,
                successful: 0,
                failed: 1,
            },
        }
    }

    #[test]
    fn entry_names_are_file_safe() {
        assert_eq!(
            report_entry_name("S001", "van der Berg", "Term1"),
            "reports/Report_S001_van_der_Berg_Term1.json"
        );
        assert_eq!(report_entry_name("S2", "", "Term2"), "reports/Report_S2___Term2.json");
    }

    #[test]
    fn ids_that_sanitise_alike_get_distinct_entries() {
        use crate::model::{Student, Subject};
        use crate::store::{CohortMember, CohortSnapshot};

        let otieno = |id: &str| CohortMember {
            student: Student {
                student_id: id.to_string(),
                first_name: "Test".into(),
                last_name: "Otieno".into(),
                form: Form::F1,
            },
            grades: Ok(Vec::new()),
        };
        let snapshot = CohortSnapshot {
            form: Form::F1,
            term: Term::T1,
            members: vec![otieno("S.1"), otieno("S/1")],
            graded_subjects: Vec::<Subject>::new(),
            catalog: Vec::new(),
        };
        let bulk = crate::report::build_bulk_reports(&snapshot);

        let dir = std::env::temp_dir().join(format!("gradebook-bundle-{}", uuid::Uuid::new_v4()));
        let out = dir.join("collide.zip");
        let summary =
            export_report_bundle(&bulk, &json!({}), &out, Utc::now()).expect("export");
        assert_eq!(summary.report_count, 2);

        let verified = verify_report_bundle(&out).expect("verify");
        assert_eq!(verified.verified_entries, 3);

        let archive = ZipArchive::new(File::open(&out).expect("open")).expect("zip");
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort_unstable();
        assert_eq!(
            names,
            vec![
                "GENERATION_SUMMARY.txt",
                "manifest.json",
                "reports/Report_S_1_Otieno_Term1.json",
                "reports/Report_S_1_Otieno_Term1_2.json",
            ]
        );
    }

    #[test]
    fn summary_lists_failures() {
        let at = DateTime::parse_from_rfc3339("2024-05-01T08:30:00Z")
            .expect("date")
            .with_timezone(&Utc);
        let text = generation_summary(&failed_only(), &at);
        assert!(text.contains("Form: F2\n"));
        assert!(text.contains("Term: Term3\n"));
        assert!(text.contains("Successfully Generated: 0\n"));
        assert!(text.contains("Generated on: 2024-05-01 08:30:00\n"));
        assert!(text.contains("- S9 O'Neil: invalid score"));
    }

    #[test]
    fn export_then_verify() {
        let dir = std::env::temp_dir().join(format!("gradebook-bundle-{}", uuid::Uuid::new_v4()));
        let out = dir.join("bundle.zip");
        let summary = export_report_bundle(
            &failed_only(),
            &json!({ "schoolName": "Test" }),
            &out,
            Utc::now(),
        )
        .expect("export");
        assert_eq!(summary.report_count, 0);
        assert_eq!(summary.entry_count, 2);

        let verified = verify_report_bundle(&out).expect("verify");
        assert_eq!(verified.bundle_format, BUNDLE_FORMAT_V1);
        assert_eq!(verified.verified_entries, 1);
    }
}
