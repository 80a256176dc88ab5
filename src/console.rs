//! Interactive terminal front-end for the record editor.
//!
//! Prompts block on stdin, so the loop runs on a blocking thread and only enters the
//! runtime through [`Handle::block_on`] for relay calls.

use std::fmt;

use anyhow::Result;
use inquire::{Confirm, InquireError, Select, Text};
use tokio::runtime::Handle;

use crate::panel::form::TTL_PRESETS;
use crate::panel::{DnsRecord, Field, FormMode, Panel, RecordForm, RecordType, RelayApi, Zone};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Add,
    Edit,
    Delete,
    Refresh,
    SwitchZone,
    Quit,
}

impl Action {
    const ALL: [Action; 6] = [
        Action::Add,
        Action::Edit,
        Action::Delete,
        Action::Refresh,
        Action::SwitchZone,
        Action::Quit,
    ];
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::Add => "Add record",
            Action::Edit => "Edit record",
            Action::Delete => "Delete record",
            Action::Refresh => "Refresh",
            Action::SwitchZone => "Switch zone",
            Action::Quit => "Quit",
        };
        f.write_str(label)
    }
}

struct ZoneChoice<'a>(&'a Zone);

impl fmt::Display for ZoneChoice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.name)
    }
}

struct RecordChoice<'a>(&'a DnsRecord);

impl fmt::Display for RecordChoice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<6} {} -> {}", self.0.record_type, self.0.name, self.0.content)
    }
}

/// Escape and Ctrl-C back out of the current prompt instead of failing.
fn optional<T>(result: Result<T, InquireError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled) | Err(InquireError::OperationInterrupted) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Runs the editor until the user quits. Must be called off the async executor, e.g. from
/// `tokio::task::spawn_blocking`.
pub fn run<C: RelayApi>(mut panel: Panel<C>, runtime: Handle) -> Result<()> {
    runtime.block_on(panel.load());

    loop {
        print_banner(&mut panel);

        if panel.selected_zone().is_none() {
            if panel.zones().is_empty() {
                println!("No zones available.");
                return Ok(());
            }
            let choices: Vec<ZoneChoice> = panel.zones().iter().map(ZoneChoice).collect();
            let Some(choice) = optional(Select::new("Select a zone", choices).prompt())? else {
                return Ok(());
            };
            let zone_id = choice.0.id.clone();
            runtime.block_on(panel.select_zone(Some(&zone_id)));
            continue;
        }

        print_records(&panel);

        let action = optional(Select::new("Action", Action::ALL.to_vec()).prompt())?
            .unwrap_or(Action::Quit);

        match action {
            Action::Add => {
                let form = panel.open_create_form();
                edit_record(&mut panel, form, &runtime)?;
            }
            Action::Edit => {
                if let Some(record_id) = choose_record(&panel, "Record to edit")? {
                    if let Some(form) = panel.open_edit_form(&record_id) {
                        edit_record(&mut panel, form, &runtime)?;
                    }
                }
            }
            Action::Delete => {
                if let Some(record_id) = choose_record(&panel, "Record to delete")? {
                    runtime.block_on(panel.delete_record(&record_id, confirm_delete));
                }
            }
            Action::Refresh => runtime.block_on(panel.refresh_records()),
            Action::SwitchZone => runtime.block_on(panel.select_zone(None)),
            Action::Quit => return Ok(()),
        }
    }
}

/// Shows the error banner once; the next fetch would clear it anyway.
fn print_banner<C: RelayApi>(panel: &mut Panel<C>) {
    if let Some(error) = panel.error() {
        eprintln!("\n[error] {}\n", error);
    }
    panel.dismiss_error();
}

fn print_records<C: RelayApi>(panel: &Panel<C>) {
    let Some(zone) = panel.selected_zone() else {
        return;
    };
    println!("\nDNS records for {}", zone.name);

    if panel.records().is_empty() {
        println!("  (no records)\n");
        return;
    }

    let rows: Vec<[String; 5]> = panel
        .records()
        .iter()
        .map(|r| {
            [
                r.record_type.clone(),
                r.name.clone(),
                r.content.clone(),
                r.ttl_label(),
                r.proxy_label().to_string(),
            ]
        })
        .collect();

    let header = ["TYPE", "NAME", "CONTENT", "TTL", "PROXY"];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: [&str; 5]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect();
        println!("  {}", padded.join("  "));
    };

    line(header);
    for row in &rows {
        line([
            row[0].as_str(),
            row[1].as_str(),
            row[2].as_str(),
            row[3].as_str(),
            row[4].as_str(),
        ]);
    }
    println!();
}

fn choose_record<C: RelayApi>(panel: &Panel<C>, message: &str) -> Result<Option<String>> {
    let choices: Vec<RecordChoice> = panel.records().iter().map(RecordChoice).collect();
    if choices.is_empty() {
        println!("No records in this zone.");
        return Ok(None);
    }
    Ok(optional(Select::new(message, choices).prompt())?.map(|c| c.0.id.clone()))
}

fn confirm_delete(record: &DnsRecord) -> bool {
    let message = format!("Delete {} record {}?", record.record_type, record.name);
    matches!(
        optional(Confirm::new(&message).with_default(false).prompt()),
        Ok(Some(true))
    )
}

fn edit_record<C: RelayApi>(
    panel: &mut Panel<C>,
    mut form: RecordForm,
    runtime: &Handle,
) -> Result<()> {
    match panel.form_mode() {
        FormMode::Edit(record) => println!("\nEdit {} record {}", record.record_type, record.name),
        _ => println!("\nAdd a new DNS record"),
    }

    loop {
        if !fill_form(&mut form)? {
            panel.close_form();
            return Ok(());
        }

        let Some(input) = form.submit() else {
            for message in form.errors().values() {
                eprintln!("  - {}", message);
            }
            continue;
        };

        if runtime.block_on(panel.submit(input)) {
            println!("Saved.");
            return Ok(());
        }

        print_banner(panel);
        let retry = optional(Confirm::new("Edit and try again?").with_default(true).prompt())?;
        if retry != Some(true) {
            panel.close_form();
            return Ok(());
        }
    }
}

/// Prompts for every field, showing the previous validation message as help.
/// Returns `false` when the user backs out.
fn fill_form(form: &mut RecordForm) -> Result<bool> {
    let cursor = RecordType::ALL
        .iter()
        .position(|t| *t == form.record_type())
        .unwrap_or(0);
    let Some(record_type) = optional(
        Select::new("Type", RecordType::ALL.to_vec())
            .with_starting_cursor(cursor)
            .prompt(),
    )?
    else {
        return Ok(false);
    };
    form.set_type(record_type);

    let Some(name) = prompt_text("Name", form.name(), form.error(Field::Name))? else {
        return Ok(false);
    };
    form.set_name(name);

    let Some(content) = prompt_text("Content", form.content(), form.error(Field::Content))? else {
        return Ok(false);
    };
    form.set_content(content);

    let presets = TTL_PRESETS
        .iter()
        .map(|(secs, label)| format!("{} ({})", secs, label))
        .collect::<Vec<_>>()
        .join(", ");
    let ttl_help = form
        .error(Field::Ttl)
        .map(str::to_string)
        .unwrap_or(presets);
    let Some(ttl) = prompt_text("TTL (seconds)", form.ttl(), Some(ttl_help.as_str()))? else {
        return Ok(false);
    };
    form.set_ttl(ttl);

    if record_type.is_proxiable() {
        let Some(proxied) = optional(
            Confirm::new("Proxy through Cloudflare?")
                .with_default(form.proxied())
                .prompt(),
        )?
        else {
            return Ok(false);
        };
        form.set_proxied(proxied);
    }

    Ok(true)
}

fn prompt_text(message: &str, initial: &str, help: Option<&str>) -> Result<Option<String>> {
    let mut prompt = Text::new(message).with_initial_value(initial);
    if let Some(help) = help {
        prompt = prompt.with_help_message(help);
    }
    optional(prompt.prompt())
}
