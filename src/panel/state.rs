use log::{debug, warn};

use super::{DnsRecord, PanelError, RecordForm, RecordInput, RelayApi, Zone};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Closed,
    Create,
    Edit(DnsRecord),
}

/// State of the record editor.
///
/// The record list is a cache of the selected zone as last fetched from the relay; every
/// successful mutation refetches it instead of patching it locally. Failures land in a
/// single error banner and never touch the list.
pub struct Panel<C> {
    relay: C,
    zones: Vec<Zone>,
    selected_zone: Option<Zone>,
    records: Vec<DnsRecord>,
    error: Option<String>,
    form: FormMode,
}

impl<C: RelayApi> Panel<C> {
    pub fn new(relay: C) -> Self {
        Self {
            relay,
            zones: Vec::new(),
            selected_zone: None,
            records: Vec::new(),
            error: None,
            form: FormMode::Closed,
        }
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn selected_zone(&self) -> Option<&Zone> {
        self.selected_zone.as_ref()
    }

    pub fn records(&self) -> &[DnsRecord] {
        &self.records
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn form_mode(&self) -> &FormMode {
        &self.form
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Initial load: fetch the zone list with nothing selected.
    pub async fn load(&mut self) {
        self.selected_zone = None;
        self.records.clear();
        self.error = None;

        match self.relay.list_zones().await {
            Ok(zones) => {
                debug!("Loaded {} zone(s)", zones.len());
                self.zones = zones;
            }
            Err(e) => self.fail(e),
        }
    }

    /// Selects a zone by id and fetches its records. `None`, or an id that is not in the
    /// zone list, clears the selection and the list without a fetch.
    pub async fn select_zone(&mut self, zone_id: Option<&str>) {
        self.selected_zone =
            zone_id.and_then(|id| self.zones.iter().find(|z| z.id == id).cloned());

        if self.selected_zone.is_some() {
            self.refresh_records().await;
        } else {
            self.records.clear();
        }
    }

    pub async fn refresh_records(&mut self) {
        let Some(zone) = self.selected_zone.clone() else {
            return;
        };
        self.error = None;

        match self.relay.list_records(&zone.id).await {
            Ok(records) => {
                debug!("Loaded {} record(s) for {}", records.len(), zone.name);
                self.records = records;
            }
            Err(e) => self.fail(e),
        }
    }

    pub fn open_create_form(&mut self) -> RecordForm {
        self.form = FormMode::Create;
        RecordForm::new()
    }

    /// Opens the form pre-populated with the given record. Fails for unknown ids and for
    /// record types the editor cannot handle.
    pub fn open_edit_form(&mut self, record_id: &str) -> Option<RecordForm> {
        let record = self.records.iter().find(|r| r.id == record_id)?.clone();

        match RecordForm::edit(&record) {
            Some(form) => {
                self.form = FormMode::Edit(record);
                Some(form)
            }
            None => {
                self.error = Some(format!(
                    "Editing {} records is not supported",
                    record.record_type
                ));
                None
            }
        }
    }

    pub fn close_form(&mut self) {
        self.form = FormMode::Closed;
    }

    /// Sends a validated form payload as a create or update depending on the form mode.
    /// On success the form closes and the list is refetched; on failure the form stays open.
    pub async fn submit(&mut self, input: RecordInput) -> bool {
        let Some(zone_id) = self.selected_zone.as_ref().map(|z| z.id.clone()) else {
            self.error = Some("No zone selected".to_string());
            return false;
        };

        let result = match &self.form {
            FormMode::Create => self.relay.create_record(&zone_id, &input).await,
            FormMode::Edit(record) => {
                self.relay
                    .update_record(&zone_id, &record.id, &input)
                    .await
            }
            FormMode::Closed => {
                self.error = Some("No record form is open".to_string());
                return false;
            }
        };

        match result {
            Ok(record) => {
                debug!("Saved record {} ({})", record.name, record.id);
                self.form = FormMode::Closed;
                self.refresh_records().await;
                true
            }
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }

    /// Deletes a record after `confirm` approves it. A declined confirmation issues no request.
    pub async fn delete_record<F>(&mut self, record_id: &str, confirm: F) -> bool
    where
        F: FnOnce(&DnsRecord) -> bool,
    {
        let Some(zone_id) = self.selected_zone.as_ref().map(|z| z.id.clone()) else {
            self.error = Some("No zone selected".to_string());
            return false;
        };
        let Some(record) = self.records.iter().find(|r| r.id == record_id) else {
            self.error = Some("Record not found".to_string());
            return false;
        };
        if !confirm(record) {
            return false;
        }

        match self.relay.delete_record(&zone_id, record_id).await {
            Ok(()) => {
                self.refresh_records().await;
                true
            }
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }

    fn fail(&mut self, error: PanelError) {
        warn!("{}", error);
        self.error = Some(error.message().to_string());
    }
}
