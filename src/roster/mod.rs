//! Roster synchronization and mutation controller.
//!
//! Keeps a local view of the member collection consistent across add, list,
//! delete, search and export, and gates destructive actions behind a passphrase.

mod cache;
mod controller;
mod filter;
mod gate;
mod view;

pub use cache::*;
pub use controller::*;
pub use filter::*;
pub use gate::*;
pub use view::*;

use std::collections::BTreeSet;

use crate::export::ExportFormat;

/// Behavior switches that used to be separate copies of the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterFeatures {
    /// Offer the team checkbox and role select; off forces plain members
    pub team_role_fields: bool,
    /// Formats the export button may produce
    pub export_formats: BTreeSet<ExportFormat>,
    /// Require the passphrase before deleting
    pub delete_gated: bool,
    /// Require the passphrase before a document export
    pub document_export_gated: bool,
    /// Require the passphrase before a spreadsheet export
    pub spreadsheet_export_gated: bool,
}

impl RosterFeatures {
    pub fn is_export_gated(&self, format: ExportFormat) -> bool {
        match format {
            ExportFormat::Document => self.document_export_gated,
            ExportFormat::Spreadsheet => self.spreadsheet_export_gated,
        }
    }
}

impl Default for RosterFeatures {
    fn default() -> Self {
        Self {
            team_role_fields: true,
            export_formats: [ExportFormat::Document, ExportFormat::Spreadsheet]
                .into_iter()
                .collect(),
            delete_gated: true,
            document_export_gated: true,
            spreadsheet_export_gated: false,
        }
    }
}
