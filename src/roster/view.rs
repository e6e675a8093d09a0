//! Read-only projection of controller state and the intents that drive it.

use std::fmt::Display;

use chrono::TimeZone;
use serde::{Deserialize, Serialize};

use super::{Notice, RosterController};
use crate::errors::AppError;
use crate::export::{ExportFile, ExportFormat};
use crate::models::{DraftPatch, FormDraft, Member};

const EMPTY_MESSAGE: &str = "No members found.";
const ADDED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One rendered table row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowView {
    pub id: String,
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub is_team_member: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// `created_at` in the viewer's zone
    pub added_on: String,
}

impl RowView {
    fn render<Tz>(member: &Member, tz: &Tz) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        Self {
            id: member.id.clone(),
            full_name: member.full_name.clone(),
            phone: member.phone.clone(),
            address: member.address.clone(),
            is_team_member: member.is_team_member,
            role: member.effective_role().map(str::to_string),
            added_on: member
                .created_at
                .with_timezone(tz)
                .format(ADDED_FORMAT)
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteModalView {
    pub target_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,
    pub attempts: u32,
    pub passphrase_entered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportModalView {
    pub format: ExportFormat,
    pub attempts: u32,
    pub passphrase_entered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything the presentation layer needs to draw the roster screen.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub rows: Vec<RowView>,
    pub total_count: usize,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<&'static str>,
    pub loading: bool,
    pub saving: bool,
    pub draft: FormDraft,
    pub team_role_fields: bool,
    pub role_select_visible: bool,
    pub export_formats: Vec<ExportFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_modal: Option<DeleteModalView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_modal: Option<ExportModalView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<RowView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}

impl ViewState {
    pub fn project<Tz>(controller: &RosterController, tz: &Tz) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let features = controller.features();
        let rows: Vec<RowView> = controller
            .filtered()
            .into_iter()
            .map(|member| RowView::render(member, tz))
            .collect();

        let delete_modal = controller.delete_state().pending().map(|pending| DeleteModalView {
            target_id: pending.target.clone(),
            target_name: controller
                .cache()
                .get(&pending.target)
                .map(|m| m.full_name.clone()),
            attempts: pending.attempts,
            passphrase_entered: !pending.passphrase.is_empty(),
            error: pending.error.clone(),
        });

        let export_modal = controller.export_state().pending().map(|pending| ExportModalView {
            format: pending.target,
            attempts: pending.attempts,
            passphrase_entered: !pending.passphrase.is_empty(),
            error: pending.error.clone(),
        });

        let draft = controller.draft().clone();
        let role_select_visible = features.team_role_fields && draft.is_team_member;

        Self {
            empty_message: rows.is_empty().then_some(EMPTY_MESSAGE),
            rows,
            total_count: controller.cache().members().len(),
            query: controller.cache().query().to_string(),
            loading: controller.is_loading(),
            saving: controller.is_saving(),
            draft,
            team_role_fields: features.team_role_fields,
            role_select_visible,
            export_formats: features.export_formats.iter().copied().collect(),
            delete_modal,
            export_modal,
            selected: controller.selected().map(|m| RowView::render(m, tz)),
            notice: controller.notice().cloned(),
        }
    }
}

/// A user action coming from the presentation layer.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Intent {
    Refresh,
    SetQuery {
        query: String,
    },
    UpdateDraft {
        #[serde(flatten)]
        patch: DraftPatch,
    },
    SubmitDraft {
        #[serde(default)]
        draft: Option<FormDraft>,
    },
    RequestDelete {
        id: String,
    },
    TypeDeletePassphrase {
        value: String,
    },
    ConfirmDelete {
        #[serde(default)]
        passphrase: Option<String>,
    },
    CancelDelete,
    RequestExport {
        format: ExportFormat,
    },
    TypeExportPassphrase {
        value: String,
    },
    ConfirmExport {
        #[serde(default)]
        passphrase: Option<String>,
    },
    CancelExport,
    Select {
        id: String,
    },
    ClearSelection,
    DismissNotice,
}

/// Apply one intent, translating it into exactly one controller call, then
/// publish the resulting view.
///
/// Returns the export file when the intent produced one.
pub async fn dispatch(
    controller: &mut RosterController,
    intent: Intent,
) -> Result<Option<ExportFile>, AppError> {
    let outcome = apply(controller, intent).await;
    controller.publish();
    outcome
}

async fn apply(
    controller: &mut RosterController,
    intent: Intent,
) -> Result<Option<ExportFile>, AppError> {
    match intent {
        Intent::Refresh => controller.refresh().await?,
        Intent::SetQuery { query } => controller.set_query(query),
        Intent::UpdateDraft { patch } => controller.update_draft(patch),
        Intent::SubmitDraft { draft } => {
            let draft = draft.unwrap_or_else(|| controller.draft().clone());
            controller.submit_draft(draft).await?;
        }
        Intent::RequestDelete { id } => controller.request_delete(&id).await?,
        Intent::TypeDeletePassphrase { value } => controller.type_delete_passphrase(value),
        Intent::ConfirmDelete { passphrase } => controller.confirm_delete(passphrase).await?,
        Intent::CancelDelete => controller.cancel_delete(),
        Intent::RequestExport { format } => return controller.request_export(format),
        Intent::TypeExportPassphrase { value } => controller.type_export_passphrase(value),
        Intent::ConfirmExport { passphrase } => {
            return controller.confirm_export(passphrase).await.map(Some)
        }
        Intent::CancelExport => controller.cancel_export(),
        Intent::Select { id } => controller.select(&id)?,
        Intent::ClearSelection => controller.clear_selection(),
        Intent::DismissNotice => controller.dismiss_notice(),
    }
    Ok(None)
}
