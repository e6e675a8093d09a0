//! Roster controller: the single owner of roster state.
//!
//! All methods take `&mut self`, so intents are applied one at a time on
//! whichever task owns the controller. Every completion path clears the
//! `loading` and `saving` flags, including a store call whose future is
//! dropped part way.
//!
//! The controller also publishes its [`ViewState`] on a watch channel, so
//! readers see `loading`/`saving` while a store call is in flight without
//! waiting for the controller.

use std::sync::Arc;

use chrono::Local;
use serde::Serialize;
use tokio::sync::watch;

use super::{AuthorizationCheck, GateState, GatedAction, RosterCache, RosterFeatures, ViewState};
use crate::errors::{codes, AppError};
use crate::export::{export_rows, ExportFile, ExportFormat, ExportLayout};
use crate::models::{DraftPatch, FormDraft, Member};
use crate::store::RecordStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Info,
    Error,
}

/// Transient, dismissible message for the view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub kind: NoticeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    pub message: String,
}

impl Notice {
    fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            code: None,
            message: message.into(),
        }
    }

    fn error(err: &AppError) -> Self {
        Self {
            kind: NoticeKind::Error,
            code: Some(err.error_code()),
            message: err.message(),
        }
    }
}

/// A raised busy flag, lowered again however the owning future ends.
struct BusyFlag<'a> {
    flag: &'a mut bool,
    snapshot: &'a watch::Sender<ViewState>,
    field: fn(&mut ViewState) -> &mut bool,
}

impl<'a> BusyFlag<'a> {
    fn raise(
        flag: &'a mut bool,
        snapshot: &'a watch::Sender<ViewState>,
        field: fn(&mut ViewState) -> &mut bool,
    ) -> Self {
        *flag = true;
        snapshot.send_modify(|view| *field(view) = true);
        Self {
            flag,
            snapshot,
            field,
        }
    }
}

impl Drop for BusyFlag<'_> {
    fn drop(&mut self) {
        *self.flag = false;
        let field = self.field;
        self.snapshot.send_modify(|view| *field(view) = false);
    }
}

fn loading_field(view: &mut ViewState) -> &mut bool {
    &mut view.loading
}

fn saving_field(view: &mut ViewState) -> &mut bool {
    &mut view.saving
}

pub struct RosterController {
    store: Arc<dyn RecordStore>,
    authorizer: Arc<dyn AuthorizationCheck>,
    features: RosterFeatures,
    cache: RosterCache,
    draft: FormDraft,
    loading: bool,
    saving: bool,
    delete_gate: GateState<String>,
    export_gate: GateState<ExportFormat>,
    selected: Option<String>,
    notice: Option<Notice>,
    snapshot: watch::Sender<ViewState>,
}

impl RosterController {
    pub fn new(
        store: Arc<dyn RecordStore>,
        authorizer: Arc<dyn AuthorizationCheck>,
        features: RosterFeatures,
    ) -> Self {
        let (snapshot, _) = watch::channel(ViewState::default());
        let controller = Self {
            store,
            authorizer,
            features,
            cache: RosterCache::new(),
            draft: FormDraft::default(),
            loading: false,
            saving: false,
            delete_gate: GateState::Idle,
            export_gate: GateState::Idle,
            selected: None,
            notice: None,
            snapshot,
        };
        controller.publish();
        controller
    }

    /// Receiver for the published view. It always holds the latest projection.
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.snapshot.subscribe()
    }

    /// Project the current state and hand it to every subscriber.
    pub fn publish(&self) {
        self.snapshot.send_replace(ViewState::project(self, &Local));
    }

    pub fn features(&self) -> &RosterFeatures {
        &self.features
    }

    pub fn cache(&self) -> &RosterCache {
        &self.cache
    }

    pub fn filtered(&self) -> Vec<&Member> {
        self.cache.filtered()
    }

    pub fn draft(&self) -> &FormDraft {
        &self.draft
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn delete_state(&self) -> &GateState<String> {
        &self.delete_gate
    }

    pub fn export_state(&self) -> &GateState<ExportFormat> {
        &self.export_gate
    }

    pub fn selected(&self) -> Option<&Member> {
        self.selected.as_deref().and_then(|id| self.cache.get(id))
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    // ==================== SYNC ====================

    /// Re-fetch the whole collection and replace the cache.
    ///
    /// On failure the cache keeps its last good contents.
    pub async fn refresh(&mut self) -> Result<(), AppError> {
        let ticket = self.cache.begin_refresh();
        let result = {
            let _busy = BusyFlag::raise(&mut self.loading, &self.snapshot, loading_field);
            self.store.list().await
        };

        match result {
            Ok(members) => {
                let count = members.len();
                if self.cache.apply(ticket, members) {
                    tracing::debug!("Roster refreshed with {} members", count);
                    if self.selected.as_deref().is_some_and(|id| !self.cache.contains(id)) {
                        self.selected = None;
                    }
                }
                Ok(())
            }
            Err(e) => Err(self.surface(e)),
        }
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.cache.set_query(query);
    }

    // ==================== ADD ====================

    pub fn update_draft(&mut self, patch: DraftPatch) {
        self.draft.apply(patch);
    }

    /// Validate and insert `draft`, then refresh.
    ///
    /// The draft is kept in the form buffer so a failed insert can be retried
    /// as-is; it is reset only after the store accepts it.
    pub async fn submit_draft(&mut self, draft: FormDraft) -> Result<Member, AppError> {
        self.draft = draft;

        let payload = match self.draft.to_new_member(self.features.team_role_fields) {
            Ok(payload) => payload,
            Err(e) => return Err(self.surface(e)),
        };

        let result = {
            let _busy = BusyFlag::raise(&mut self.saving, &self.snapshot, saving_field);
            self.store.insert(&payload).await
        };

        let created = match result {
            Ok(created) => created,
            Err(e) => return Err(self.surface(e)),
        };

        tracing::info!("Added member {}", created.id);
        self.draft = FormDraft::default();
        self.notice = Some(Notice::info(format!("Added {}", created.full_name)));

        // The insert already happened; a failed re-fetch only leaves the list stale.
        let _ = self.refresh().await;

        Ok(created)
    }

    // ==================== DELETE ====================

    /// Start deleting `id`, or delete right away when deletes are not gated.
    pub async fn request_delete(&mut self, id: &str) -> Result<(), AppError> {
        if !self.cache.contains(id) {
            return Err(self.surface(AppError::NotFound(format!("Member {} not found", id))));
        }

        if !self.features.delete_gated {
            return self.remove_and_refresh(id).await;
        }

        self.delete_gate.open(id.to_string());
        Ok(())
    }

    pub fn type_delete_passphrase(&mut self, value: impl Into<String>) {
        self.delete_gate.type_passphrase(value);
    }

    pub fn cancel_delete(&mut self) {
        self.delete_gate.close();
    }

    /// Check the passphrase and, on a match, remove the pending target.
    pub async fn confirm_delete(&mut self, passphrase: Option<String>) -> Result<(), AppError> {
        let Some((target, attempt)) = self.delete_gate.attempt(passphrase) else {
            return Err(AppError::BadRequest(
                "No delete is awaiting confirmation".to_string(),
            ));
        };

        if let Err(e) = self
            .authorizer
            .authorize(GatedAction::Delete, &attempt)
            .await
        {
            self.delete_gate.record_mismatch();
            return Err(self.surface(e));
        }

        match self.remove_and_refresh(&target).await {
            Ok(()) => {
                self.delete_gate.close();
                Ok(())
            }
            Err(e) => {
                self.delete_gate.record_failure(e.message());
                Err(e)
            }
        }
    }

    async fn remove_and_refresh(&mut self, id: &str) -> Result<(), AppError> {
        if let Err(e) = self.store.remove(id).await {
            return Err(self.surface(e));
        }

        tracing::info!("Removed member {}", id);
        self.notice = Some(Notice::info("Member removed"));
        let _ = self.refresh().await;
        Ok(())
    }

    // ==================== EXPORT ====================

    /// Export the filtered view, or open the confirmation modal for gated formats.
    pub fn request_export(&mut self, format: ExportFormat) -> Result<Option<ExportFile>, AppError> {
        if !self.features.export_formats.contains(&format) {
            return Err(self.surface(AppError::BadRequest(format!(
                "Export format {} is not enabled",
                format
            ))));
        }

        if self.features.is_export_gated(format) {
            self.export_gate.open(format);
            return Ok(None);
        }

        self.encode(format).map(Some)
    }

    pub fn type_export_passphrase(&mut self, value: impl Into<String>) {
        self.export_gate.type_passphrase(value);
    }

    pub fn cancel_export(&mut self) {
        self.export_gate.close();
    }

    /// Check the passphrase and encode the filtered view as it is now.
    pub async fn confirm_export(&mut self, passphrase: Option<String>) -> Result<ExportFile, AppError> {
        let Some((format, attempt)) = self.export_gate.attempt(passphrase) else {
            return Err(AppError::BadRequest(
                "No export is awaiting confirmation".to_string(),
            ));
        };

        if let Err(e) = self
            .authorizer
            .authorize(GatedAction::Export(format), &attempt)
            .await
        {
            self.export_gate.record_mismatch();
            return Err(self.surface(e));
        }

        match self.encode(format) {
            Ok(file) => {
                self.export_gate.close();
                Ok(file)
            }
            Err(e) => {
                self.export_gate.record_failure(e.message());
                Err(e)
            }
        }
    }

    fn encode(&mut self, format: ExportFormat) -> Result<ExportFile, AppError> {
        let layout = ExportLayout {
            team_role_fields: self.features.team_role_fields,
        };
        let result = export_rows(&self.cache.filtered(), format, layout, &Local);
        result.map_err(|e| self.surface(e))
    }

    // ==================== VIEW-ONLY STATE ====================

    /// Open the detail popup for a cached member.
    pub fn select(&mut self, id: &str) -> Result<(), AppError> {
        if !self.cache.contains(id) {
            return Err(self.surface(AppError::NotFound(format!("Member {} not found", id))));
        }
        self.selected = Some(id.to_string());
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Record a failure for display and hand it back to the caller.
    fn surface(&mut self, err: AppError) -> AppError {
        if err.error_code() == codes::STORE_ERROR {
            tracing::warn!("Collection failure: {}", err.message());
        }
        self.notice = Some(Notice::error(&err));
        err
    }
}
