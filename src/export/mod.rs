//! Export encoders for the roster.
//!
//! Pure transforms: rows in, file bytes out. Nothing here touches the cache or the store.

mod pdf;

use std::fmt::Display;
use std::str::FromStr;

use chrono::TimeZone;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::Member;

/// Base name shared by every export file.
pub const EXPORT_BASENAME: &str = "member_list";

/// Shown in the role column when a member has no role.
const ROLE_PLACEHOLDER: &str = "-";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Printable PDF table
    Document,
    /// CSV sheet
    Spreadsheet,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Document => "document",
            ExportFormat::Spreadsheet => "spreadsheet",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Document => "pdf",
            ExportFormat::Spreadsheet => "csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Document => "application/pdf",
            ExportFormat::Spreadsheet => "text/csv; charset=utf-8",
        }
    }

    pub fn filename(&self) -> String {
        format!("{}.{}", EXPORT_BASENAME, self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "document" | "pdf" => Ok(ExportFormat::Document),
            "spreadsheet" | "csv" => Ok(ExportFormat::Spreadsheet),
            other => Err(AppError::BadRequest(format!(
                "Unknown export format '{}'",
                other
            ))),
        }
    }
}

impl Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoded export ready for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Column selection for exports.
#[derive(Debug, Clone, Copy)]
pub struct ExportLayout {
    /// Include role and team membership columns
    pub team_role_fields: bool,
}

/// Encode `rows` in the given format, preserving their order.
///
/// Timestamps are rendered in `tz`, normally the viewer's local zone.
pub fn export_rows<Tz>(
    rows: &[&Member],
    format: ExportFormat,
    layout: ExportLayout,
    tz: &Tz,
) -> Result<ExportFile, AppError>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let bytes = match format {
        ExportFormat::Document => encode_document(rows, layout, tz)?,
        ExportFormat::Spreadsheet => encode_spreadsheet(rows, layout, tz)?,
    };

    tracing::info!("Exported {} rows as {}", rows.len(), format);

    Ok(ExportFile {
        filename: format.filename(),
        content_type: format.content_type(),
        bytes,
    })
}

fn render_timestamp<Tz>(member: &Member, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    member
        .created_at
        .with_timezone(tz)
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

fn encode_document<Tz>(
    rows: &[&Member],
    layout: ExportLayout,
    tz: &Tz,
) -> Result<Vec<u8>, AppError>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut columns = vec![
        pdf::Column::new("Full Name", 3.0),
        pdf::Column::new("Phone", 2.0),
        pdf::Column::new("Address", 4.0),
    ];
    if layout.team_role_fields {
        columns.push(pdf::Column::new("Team Member", 1.5));
        columns.push(pdf::Column::new("Role", 2.0));
    }
    columns.push(pdf::Column::new("Date Added", 2.2));

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|member| {
            let mut row = vec![
                member.full_name.clone(),
                member.phone.clone(),
                member.address.clone(),
            ];
            if layout.team_role_fields {
                row.push(yes_no(member.is_team_member).to_string());
                row.push(
                    member
                        .effective_role()
                        .unwrap_or(ROLE_PLACEHOLDER)
                        .to_string(),
                );
            }
            row.push(render_timestamp(member, tz));
            row
        })
        .collect();

    pdf::render_table("Member List", &columns, &cells)
}

fn encode_spreadsheet<Tz>(
    rows: &[&Member],
    layout: ExportLayout,
    tz: &Tz,
) -> Result<Vec<u8>, AppError>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["Full Name", "Phone", "Address"];
    if layout.team_role_fields {
        header.extend(["Team Member", "Role"]);
    }
    header.push("Created At");
    writer.write_record(&header)?;

    for member in rows {
        let mut record = vec![
            member.full_name.clone(),
            member.phone.clone(),
            member.address.clone(),
        ];
        if layout.team_role_fields {
            record.push(yes_no(member.is_team_member).to_string());
            record.push(member.effective_role().unwrap_or_default().to_string());
        }
        record.push(render_timestamp(member, tz));
        writer.write_record(&record)?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("Spreadsheet flush failed: {}", e)))
}
